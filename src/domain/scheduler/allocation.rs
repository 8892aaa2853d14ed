use std::fmt;
use std::str::FromStr;

use crate::domain::utils::id::NodeName;
use crate::error::Error;

/// Why an allocation call stopped. Ordered by severity so that merging keeps the worst one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AllocationOutcome {
    /// Every leaf task received at least the power it asked for.
    Satisfied,
    /// No eligible node with enough free capacity was left.
    Exhausted,
    /// The allocation deadline passed before the task was satisfied.
    TimedOut,
}

impl fmt::Display for AllocationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AllocationOutcome::Satisfied => "Satisfied",
            AllocationOutcome::Exhausted => "Exhausted",
            AllocationOutcome::TimedOut => "TimedOut",
        };
        write!(f, "{}", name)
    }
}

/// One successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub node: NodeName,
    pub concurrency: i64,
    pub power: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationResult {
    /// Execution tag written to every node this call dispatched to.
    pub generation: u64,
    pub power_delivered: i64,
    pub outcome: AllocationOutcome,
    pub placements: Vec<Placement>,
}

impl AllocationResult {
    pub fn new(generation: u64) -> Self {
        AllocationResult { generation, power_delivered: 0, outcome: AllocationOutcome::Satisfied, placements: Vec::new() }
    }

    pub fn with_outcome(generation: u64, outcome: AllocationOutcome) -> Self {
        AllocationResult { outcome, ..Self::new(generation) }
    }

    pub fn place(&mut self, node: NodeName, concurrency: i64, power: i64) {
        self.power_delivered += power;
        self.placements.push(Placement { node, concurrency, power });
    }

    /// Folds a child result into this one: power adds up, placements are appended and the worse
    /// outcome wins.
    pub fn merge(&mut self, child: AllocationResult) {
        self.power_delivered += child.power_delivered;
        self.outcome = self.outcome.max(child.outcome);
        self.placements.extend(child.placements);
    }

    pub fn is_satisfied(&self) -> bool {
        self.outcome == AllocationOutcome::Satisfied
    }
}

/// How the manager keeps its cached available capacity in sync during an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookkeepingMode {
    /// Subtract the declared cost of every dispatch from the cached value.
    #[default]
    Optimistic,
    /// Re-read every node before each scan.
    Strict,
}

impl FromStr for BookkeepingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "optimistic" => Ok(BookkeepingMode::Optimistic),
            "strict" => Ok(BookkeepingMode::Strict),
            _ => Err(Error::UnknownBookkeepingMode(s.to_string())),
        }
    }
}
