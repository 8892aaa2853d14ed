use std::time::Duration;

/// Accumulated timing of one named operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEntry {
    pub name: String,
    pub calls: u64,
    pub total: Duration,
}

/// Call counter and wall-clock accumulator for the expensive round trips of the manager
/// (node refresh, dispatch, whole allocation calls).
///
/// Entries keep the order in which an operation was first recorded, so reports are stable.
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    entries: Vec<ProfileEntry>,
}

impl Profiler {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn record(&mut self, name: &str, elapsed: Duration) {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => {
                entry.calls += 1;
                entry.total += elapsed;
            }
            None => self.entries.push(ProfileEntry { name: name.to_string(), calls: 1, total: elapsed }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ProfileEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn calls(&self, name: &str) -> u64 {
        self.get(name).map(|entry| entry.calls).unwrap_or(0)
    }

    pub fn entries(&self) -> &[ProfileEntry] {
        &self.entries
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Renders one `name: Xms (N calls)` line per operation.
    pub fn report(&self) -> String {
        let mut report = String::new();
        for entry in self.entries.iter() {
            report.push_str(&format!("{}: {}ms ({} calls)\n", entry.name, entry.total.as_millis(), entry.calls));
        }
        return report;
    }
}
