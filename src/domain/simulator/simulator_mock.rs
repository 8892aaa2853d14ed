use crate::domain::simulator::simulator::SystemSimulator;

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct MockSimulator {
    pub time: Arc<AtomicI64>,
}

impl MockSimulator {
    pub fn new(time_ms: i64) -> MockSimulator {
        MockSimulator { time: Arc::new(AtomicI64::new(time_ms)) }
    }

    pub fn set_current_time(&self, time_ms: i64) {
        self.time.store(time_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.time.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl SystemSimulator for MockSimulator {
    fn get_current_time_in_s(&self) -> i64 {
        self.get_current_time_in_ms() / 1000
    }

    fn get_current_time_in_ms(&self) -> i64 {
        self.time.load(Ordering::SeqCst)
    }
}

/// Clock that advances by a fixed step every time it is read.
#[derive(Debug, Clone)]
pub struct StepSimulator {
    time: Arc<AtomicI64>,
    step_ms: i64,
}

impl StepSimulator {
    pub fn new(start_ms: i64, step_ms: i64) -> StepSimulator {
        StepSimulator { time: Arc::new(AtomicI64::new(start_ms)), step_ms }
    }
}

impl SystemSimulator for StepSimulator {
    fn get_current_time_in_s(&self) -> i64 {
        self.get_current_time_in_ms() / 1000
    }

    fn get_current_time_in_ms(&self) -> i64 {
        self.time.fetch_add(self.step_ms, Ordering::SeqCst)
    }
}
