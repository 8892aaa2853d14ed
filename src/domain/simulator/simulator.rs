use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::api::config_dto::SimulatorDto;

/// Clock used by the scheduler for deadlines and busy windows.
pub trait SystemSimulator: std::fmt::Debug + Send + Sync {
    fn get_current_time_in_s(&self) -> i64;
    fn get_current_time_in_ms(&self) -> i64;
}

#[derive(Debug)]
struct SimulatorState {
    is_simulation: bool,
    simulation_base_timestamp: i64,
    real_time_base_timestamp: i64,
}

/// Wall clock, or a clock starting at `0` when running as a simulation.
#[derive(Debug, Clone)]
pub struct Simulator {
    state: Arc<Mutex<SimulatorState>>,
}

impl Simulator {
    pub fn new(dto: SimulatorDto) -> Simulator {
        let state = SimulatorState {
            is_simulation: dto.is_simulation,
            simulation_base_timestamp: dto.start_time_ms,
            real_time_base_timestamp: Self::get_system_time_ms(),
        };

        Simulator { state: Arc::new(Mutex::new(state)) }
    }

    pub fn real_time() -> Simulator {
        Self::new(SimulatorDto { is_simulation: false, start_time_ms: 0 })
    }

    fn get_system_time_ms() -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_millis() as i64
    }
}

impl SystemSimulator for Simulator {
    fn get_current_time_in_s(&self) -> i64 {
        self.get_current_time_in_ms() / 1000
    }

    fn get_current_time_in_ms(&self) -> i64 {
        let state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        if state.is_simulation {
            let current_real = Self::get_system_time_ms();
            state.simulation_base_timestamp + (current_real - state.real_time_base_timestamp)
        } else {
            Self::get_system_time_ms()
        }
    }
}
