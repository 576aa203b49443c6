//! Graph engine configuration

use crate::error::{Error, Result};
use ilgraph_common::config::EngineSettings;
use std::time::Duration;

/// Settings a graph instance runs with
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    /// Upper bound on each batched transition wait
    pub transition_timeout: Duration,
    /// Name of the dispatch thread
    pub worker_thread_name: String,
    /// Capacity of the graph event bus
    pub event_capacity: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig::from(&EngineSettings::default())
    }
}

impl From<&EngineSettings> for GraphConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            transition_timeout: settings.transition_timeout(),
            worker_thread_name: settings.worker_thread_name.clone(),
            event_capacity: settings.event_capacity,
        }
    }
}

impl GraphConfig {
    /// Same configuration with a different transition timeout
    pub fn with_transition_timeout(mut self, timeout: Duration) -> Self {
        self.transition_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.transition_timeout.is_zero() {
            return Err(Error::Config(
                "transition timeout must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config(
                "event capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
