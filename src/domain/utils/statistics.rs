use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::sync::{Mutex, OnceLock, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

/// Target used by `tracing` events that end up in the analytics trace file.
pub const ANALYTICS_TARGET: &str = "analytics";

/// Columns of the statistics CSV. An event fills some of them, the rest stay empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatParameter {
    /// Time in seconds since the collector was started.
    Time,

    /// Free text saying what happened.
    LogDescription,

    /// Name of the target a batch was generated for
    Target,

    /// assign, map, fill or prepare
    Operation,

    /// Power the caller asked for
    PowerRequested,

    /// Power the pool actually granted
    PowerDelivered,

    /// Satisfied, Exhausted or TimedOut
    Outcome,

    /// Time to process the operation in microseconds
    ProcessingTime,

    /// Cached available capacity of the pool after the operation
    AvailableCapacity,

    /// Total capacity of the pool
    TotalCapacity,
}

impl StatParameter {
    /// Column order of the CSV file.
    pub const ALL: [StatParameter; 10] = [
        StatParameter::Time,
        StatParameter::LogDescription,
        StatParameter::Target,
        StatParameter::Operation,
        StatParameter::PowerRequested,
        StatParameter::PowerDelivered,
        StatParameter::Outcome,
        StatParameter::ProcessingTime,
        StatParameter::AvailableCapacity,
        StatParameter::TotalCapacity,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            StatParameter::Time => "Time",
            StatParameter::LogDescription => "LogDescription",
            StatParameter::Target => "Target",
            StatParameter::Operation => "Operation",
            StatParameter::PowerRequested => "PowerRequested",
            StatParameter::PowerDelivered => "PowerDelivered",
            StatParameter::Outcome => "Outcome",
            StatParameter::ProcessingTime => "ProcessingTime",
            StatParameter::AvailableCapacity => "AvailableCapacity",
            StatParameter::TotalCapacity => "TotalCapacity",
        }
    }

    pub fn headers() -> Vec<&'static str> {
        Self::ALL.iter().map(|param| param.header()).collect()
    }
}

/// Values are kept in their native format and only formatted when the row is written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl StatValue {
    fn to_cell(&self) -> String {
        match self {
            StatValue::Integer(i) => i.to_string(),
            StatValue::Float(f) => format!("{:.3}", f),
            StatValue::Text(t) => t.clone(),
            StatValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<i64> for StatValue {
    fn from(v: i64) -> Self {
        StatValue::Integer(v)
    }
}

impl From<u64> for StatValue {
    fn from(v: u64) -> Self {
        StatValue::Integer(v as i64)
    }
}

impl From<f64> for StatValue {
    fn from(v: f64) -> Self {
        StatValue::Float(v)
    }
}

impl From<String> for StatValue {
    fn from(v: String) -> Self {
        StatValue::Text(v)
    }
}

impl From<&str> for StatValue {
    fn from(v: &str) -> Self {
        StatValue::Text(v.to_string())
    }
}

impl From<bool> for StatValue {
    fn from(v: bool) -> Self {
        StatValue::Bool(v)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatisticEvent {
    data: HashMap<StatParameter, StatValue>,
}

impl StatisticEvent {
    pub fn new() -> Self {
        Self { data: HashMap::new() }
    }

    pub fn set<V: Into<StatValue>>(&mut self, param: StatParameter, value: V) -> &mut Self {
        self.data.insert(param, value.into());
        self
    }

    pub fn get(&self, param: StatParameter) -> Option<&StatValue> {
        self.data.get(&param)
    }

    /// Cells in column order, `NA` where the event carries no value.
    pub fn to_row(&self) -> Vec<String> {
        StatParameter::ALL.iter().map(|param| self.data.get(param).map(StatValue::to_cell).unwrap_or_else(|| "NA".to_string())).collect()
    }
}

enum StatsMessage {
    Log(StatisticEvent),
    Flush,
    Shutdown,
}

/// Handle used to log statistic events. Rows are written by a background thread.
pub struct StatsCollector {
    sender: mpsc::Sender<StatsMessage>,
    start_time: u64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StatsCollector {
    /// Spawns the writer thread. Without a file name rows go to stdout.
    pub fn init(filename: Option<String>) -> crate::error::Result<Self> {
        let writer: Box<dyn Write + Send> = match filename {
            Some(f) => Box::new(File::create(f)?),
            None => Box::new(io::stdout()),
        };

        let (tx, rx) = mpsc::channel();
        let start_time = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);

        let worker = thread::spawn(move || {
            Self::worker_loop(rx, writer);
        });

        Ok(StatsCollector { sender: tx, start_time, worker: Mutex::new(Some(worker)) })
    }

    fn worker_loop(rx: mpsc::Receiver<StatsMessage>, writer: Box<dyn Write + Send>) {
        let mut csv_wtr = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);

        if let Err(e) = csv_wtr.write_record(StatParameter::headers()) {
            log::error!("Statistics header could not be written: {}", e);
        }

        for msg in rx {
            match msg {
                StatsMessage::Log(event) => {
                    if let Err(e) = csv_wtr.write_record(event.to_row()) {
                        log::error!("Stats Error: Failed to write record: {}", e);
                    }
                }
                StatsMessage::Flush => {
                    let _ = csv_wtr.flush();
                }
                StatsMessage::Shutdown => {
                    let _ = csv_wtr.flush();
                    break;
                }
            }
        }
    }

    /// Non-blocking, the row is handed to the writer thread.
    pub fn add_event(&self, mut event: StatisticEvent) {
        if event.get(StatParameter::Time).is_none() {
            let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(self.start_time);
            event.set(StatParameter::Time, now.saturating_sub(self.start_time));
        }

        // A dead writer thread must not take the scheduler down with it.
        let _ = self.sender.send(StatsMessage::Log(event));
    }

    pub fn flush(&self) {
        let _ = self.sender.send(StatsMessage::Flush);
    }

    /// Flushes pending rows and waits for the writer thread to finish.
    pub fn shutdown(&self) {
        let _ = self.sender.send(StatsMessage::Shutdown);
        if let Ok(mut guard) = self.worker.lock() {
            if let Some(handle) = guard.take() {
                let _ = handle.join();
            }
        }
    }
}

static GLOBAL_STATS: OnceLock<StatsCollector> = OnceLock::new();

/// Starts the process-wide collector, writing to `filename` or to stdout.
pub fn init_global(filename: Option<String>) -> crate::error::Result<()> {
    let collector = StatsCollector::init(filename)?;
    if GLOBAL_STATS.set(collector).is_err() {
        log::warn!("Statistics collector was already initialized, keeping the first one.");
    }
    Ok(())
}

pub fn is_global_enabled() -> bool {
    GLOBAL_STATS.get().is_some()
}

/// Safe to call from anywhere. Events are dropped silently while no collector is installed.
pub fn add_global_event(event: StatisticEvent) {
    if let Some(collector) = GLOBAL_STATS.get() {
        collector.add_event(event);
    } else {
        log::trace!("Statistics event dropped, no global collector installed.");
    }
}

pub fn shutdown_global() {
    if let Some(collector) = GLOBAL_STATS.get() {
        collector.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cells_are_written_as_na() {
        let mut event = StatisticEvent::new();
        event.set(StatParameter::Operation, "assign").set(StatParameter::PowerDelivered, 12_i64);

        let row = event.to_row();
        assert_eq!(row.len(), StatParameter::ALL.len());
        assert_eq!(row[0], "NA");
        assert_eq!(row[3], "assign");
        assert_eq!(row[5], "12");
        assert_eq!(row[9], "NA");
    }

    #[test]
    fn collector_writes_header_and_rows() {
        let path = std::env::temp_dir().join(format!("fleet_scheduler_stats_{}.csv", std::process::id()));
        let collector = StatsCollector::init(Some(path.to_string_lossy().to_string())).unwrap();

        let mut event = StatisticEvent::new();
        event.set(StatParameter::Target, "n00dles").set(StatParameter::AvailableCapacity, 12.5);
        collector.add_event(event);
        collector.shutdown();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), StatParameter::headers().join(";"));
        let row: Vec<&str> = lines.next().unwrap().split(';').collect();
        assert!(row[0].parse::<i64>().unwrap() <= 1);
        assert_eq!(row[2], "n00dles");
        assert_eq!(row[8], "12.500");

        let _ = std::fs::remove_file(path);
    }
}
