//! Configuration validation.
//!
//! Empty groups are deliberately not rejected here: the registry drops
//! them with a warning so one bad group never takes down the rest.

use crate::config::schema::RouterConfig;

/// A single validation failure.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("limbo_server must be set")]
    MissingLimboServer,
    #[error("task_interval_ms must be greater than zero")]
    ZeroTaskInterval,
    #[error("queue_notify_interval_secs must be greater than zero")]
    ZeroNotifyInterval,
}

/// Validate a loaded configuration, collecting every failure.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.limbo_server.trim().is_empty() {
        errors.push(ValidationError::MissingLimboServer);
    }
    if config.task_interval_ms == 0 {
        errors.push(ValidationError::ZeroTaskInterval);
    }
    if config.queue_notify_interval_secs == 0 {
        errors.push(ValidationError::ZeroNotifyInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
