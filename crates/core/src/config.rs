//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process
//! startup and then passed into core services. The intent is to avoid reading
//! process-wide environment variables during event handling, which can lead
//! to inconsistent behaviour in multi-threaded runtimes and test harnesses.

use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// Default idle session lifetime: 30 minutes.
pub const DEFAULT_SESSION_DURATION_SECS: u32 = 30 * 60;
/// Default expiry warning threshold: 5 minutes remaining.
pub const DEFAULT_WARNING_THRESHOLD_SECS: u32 = 5 * 60;
/// Default channel heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Default delay between channel reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);
/// Default ceiling on channel reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    session_duration_secs: u32,
    warning_threshold_secs: u32,
    heartbeat_interval: Duration,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` if the session duration is zero,
    /// the warning threshold is not strictly below the session duration, or
    /// the heartbeat/reconnect intervals are zero.
    pub fn new(
        session_duration_secs: u32,
        warning_threshold_secs: u32,
        heartbeat_interval: Duration,
        reconnect_delay: Duration,
        max_reconnect_attempts: u32,
    ) -> CoreResult<Self> {
        if session_duration_secs == 0 {
            return Err(CoreError::InvalidConfig(
                "session duration must be at least one second".into(),
            ));
        }
        if warning_threshold_secs >= session_duration_secs {
            return Err(CoreError::InvalidConfig(
                "warning threshold must be below the session duration".into(),
            ));
        }
        if heartbeat_interval.is_zero() {
            return Err(CoreError::InvalidConfig(
                "heartbeat interval cannot be zero".into(),
            ));
        }
        if reconnect_delay.is_zero() {
            return Err(CoreError::InvalidConfig(
                "reconnect delay cannot be zero".into(),
            ));
        }

        Ok(Self {
            session_duration_secs,
            warning_threshold_secs,
            heartbeat_interval,
            reconnect_delay,
            max_reconnect_attempts,
        })
    }

    pub fn session_duration_secs(&self) -> u32 {
        self.session_duration_secs
    }

    pub fn warning_threshold_secs(&self) -> u32 {
        self.warning_threshold_secs
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            session_duration_secs: DEFAULT_SESSION_DURATION_SECS,
            warning_threshold_secs: DEFAULT_WARNING_THRESHOLD_SECS,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Parse a seconds value from an optional environment string.
///
/// If `value` is `None` or empty/whitespace, returns `default`. This takes
/// the already-resolved value rather than reading the environment itself so
/// that tests never have to mutate process state.
pub fn seconds_from_env_value(value: Option<String>, default: u32) -> CoreResult<u32> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| CoreError::InvalidConfig(format!("not a seconds value: {raw:?}"))),
    }
}
