use std::time::Duration;

use crate::config::Config;

/// Global margins applied to jobs that carry none of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub start_margin: Duration,
    pub end_margin: Duration,
}

impl SchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            start_margin: Duration::from_secs(config.margins.start_seconds),
            end_margin: Duration::from_secs(config.margins.end_seconds),
        }
    }
}
