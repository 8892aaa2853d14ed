use crate::api::config_dto::SchedulerConfigDto;
use crate::domain::scheduler::allocation::BookkeepingMode;
use crate::domain::utils::id::NodeName;
use crate::error::Error;

/// Validated scheduler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub root_node: NodeName,
    pub assign_timeout_ms: i64,
    pub bookkeeping: BookkeepingMode,
    pub privileged_reserve_fraction: f64,
    pub tick_interval_ms: u64,
    pub target_cooldown_ms: i64,
    pub refresh_every_ticks: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            root_node: NodeName::new("home"),
            assign_timeout_ms: 2000,
            bookkeeping: BookkeepingMode::Optimistic,
            privileged_reserve_fraction: 0.2,
            tick_interval_ms: 1,
            target_cooldown_ms: 333,
            refresh_every_ticks: 100,
        }
    }
}

impl TryFrom<SchedulerConfigDto> for SchedulerConfig {
    type Error = Error;

    fn try_from(dto: SchedulerConfigDto) -> Result<Self, Self::Error> {
        if dto.assign_timeout_ms < 0 {
            return Err(Error::InvalidConfiguration(format!("assignTimeoutMs must not be negative, got {}", dto.assign_timeout_ms)));
        }

        if !(0.0..1.0).contains(&dto.privileged_reserve_fraction) {
            return Err(Error::InvalidConfiguration(format!(
                "privilegedReserveFraction must be in [0, 1), got {}",
                dto.privileged_reserve_fraction
            )));
        }

        if dto.refresh_every_ticks == 0 {
            return Err(Error::InvalidConfiguration("refreshEveryTicks must be at least 1".to_string()));
        }

        if dto.root_node.is_empty() {
            return Err(Error::InvalidConfiguration("rootNode must not be empty".to_string()));
        }

        Ok(SchedulerConfig {
            root_node: NodeName::new(dto.root_node),
            assign_timeout_ms: dto.assign_timeout_ms,
            bookkeeping: dto.bookkeeping.parse()?,
            privileged_reserve_fraction: dto.privileged_reserve_fraction,
            tick_interval_ms: dto.tick_interval_ms,
            target_cooldown_ms: dto.target_cooldown_ms.max(0),
            refresh_every_ticks: dto.refresh_every_ticks,
        })
    }
}
