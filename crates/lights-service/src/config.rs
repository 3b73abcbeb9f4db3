//! Referee lights configuration.
//!
//! Configuration is loaded from environment variables. Every value has a
//! default; a value that is present but unparseable (or zero) is rejected at
//! startup rather than silently replaced.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default timer tick interval in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Default Platform-Ready countdown length in seconds.
pub const DEFAULT_PLATFORM_READY_SECONDS: u64 = 60;

/// Default Next-Attempt countdown length in seconds.
pub const DEFAULT_NEXT_ATTEMPT_SECONDS: u64 = 60;

/// Default time results stay on the display before `clearResults`.
pub const DEFAULT_RESULTS_DISPLAY_SECONDS: u64 = 15;

/// Default number of distinct positions that complete a round.
pub const DEFAULT_REQUIRED_REFEREES: usize = 3;

/// Default per-connection outbound queue capacity.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Default capacity of the broadcast distribution queue.
pub const DEFAULT_BROADCAST_QUEUE_CAPACITY: usize = 1024;

/// Default keepalive ping period in seconds.
pub const DEFAULT_KEEPALIVE_SECONDS: u64 = 54;

/// Default read idle timeout in seconds.
pub const DEFAULT_PONG_WAIT_SECONDS: u64 = 60;

/// Default maximum inbound frame size in bytes.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 2048;

/// Countdown and round timing.
///
/// Split out of [`Config`] so the timer engine and decision coordinator can
/// be built in tests with compressed timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    /// Interval between countdown ticks.
    pub tick_interval: Duration,
    /// Platform-Ready countdown length.
    pub platform_ready: Duration,
    /// Next-Attempt countdown length (whole seconds are counted down).
    pub next_attempt_seconds: u64,
    /// Delay between `displayResults` and `clearResults`.
    pub results_display: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            platform_ready: Duration::from_secs(DEFAULT_PLATFORM_READY_SECONDS),
            next_attempt_seconds: DEFAULT_NEXT_ATTEMPT_SECONDS,
            results_display: Duration::from_secs(DEFAULT_RESULTS_DISPLAY_SECONDS),
        }
    }
}

/// Per-connection transport limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub outbound_queue_capacity: usize,
    pub keepalive_interval: Duration,
    pub read_timeout: Duration,
    pub max_message_bytes: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            keepalive_interval: Duration::from_secs(DEFAULT_KEEPALIVE_SECONDS),
            read_timeout: Duration::from_secs(DEFAULT_PONG_WAIT_SECONDS),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// Referee lights configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP/WebSocket bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Decisions needed to complete a round (default: 3).
    pub required_referees: usize,

    /// Capacity of the broadcast distribution queue (default: 1024).
    pub broadcast_queue_capacity: usize,

    pub timers: TimerSettings,

    pub connection: ConnectionSettings,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            required_referees: DEFAULT_REQUIRED_REFEREES,
            broadcast_queue_capacity: DEFAULT_BROADCAST_QUEUE_CAPACITY,
            timers: TimerSettings::default(),
            connection: ConnectionSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("LIGHTS_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let tick_interval_ms =
            parse_positive(vars, "LIGHTS_TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL_MS)?;
        let platform_ready_seconds = parse_positive(
            vars,
            "LIGHTS_PLATFORM_READY_SECONDS",
            DEFAULT_PLATFORM_READY_SECONDS,
        )?;
        let next_attempt_seconds = parse_positive(
            vars,
            "LIGHTS_NEXT_ATTEMPT_SECONDS",
            DEFAULT_NEXT_ATTEMPT_SECONDS,
        )?;
        let results_display_seconds = parse_positive(
            vars,
            "LIGHTS_RESULTS_DISPLAY_SECONDS",
            DEFAULT_RESULTS_DISPLAY_SECONDS,
        )?;
        let required_referees =
            parse_positive(vars, "LIGHTS_REQUIRED_REFEREES", DEFAULT_REQUIRED_REFEREES)?;
        let outbound_queue_capacity = parse_positive(
            vars,
            "LIGHTS_OUTBOUND_QUEUE_CAPACITY",
            DEFAULT_OUTBOUND_QUEUE_CAPACITY,
        )?;
        let broadcast_queue_capacity = parse_positive(
            vars,
            "LIGHTS_BROADCAST_QUEUE_CAPACITY",
            DEFAULT_BROADCAST_QUEUE_CAPACITY,
        )?;
        let keepalive_seconds =
            parse_positive(vars, "LIGHTS_KEEPALIVE_SECONDS", DEFAULT_KEEPALIVE_SECONDS)?;
        let pong_wait_seconds =
            parse_positive(vars, "LIGHTS_PONG_WAIT_SECONDS", DEFAULT_PONG_WAIT_SECONDS)?;
        let max_message_bytes =
            parse_positive(vars, "LIGHTS_MAX_MESSAGE_BYTES", DEFAULT_MAX_MESSAGE_BYTES)?;

        // A ping must go out before the peer's read deadline lapses
        if keepalive_seconds >= pong_wait_seconds {
            return Err(ConfigError::InvalidValue(format!(
                "LIGHTS_KEEPALIVE_SECONDS ({keepalive_seconds}) must be less than \
                 LIGHTS_PONG_WAIT_SECONDS ({pong_wait_seconds})"
            )));
        }

        Ok(Config {
            bind_address,
            required_referees,
            broadcast_queue_capacity,
            timers: TimerSettings {
                tick_interval: Duration::from_millis(tick_interval_ms),
                platform_ready: Duration::from_secs(platform_ready_seconds),
                next_attempt_seconds,
                results_display: Duration::from_secs(results_display_seconds),
            },
            connection: ConnectionSettings {
                outbound_queue_capacity,
                keepalive_interval: Duration::from_secs(keepalive_seconds),
                read_timeout: Duration::from_secs(pong_wait_seconds),
                max_message_bytes,
            },
        })
    }
}

/// Parse an optional numeric variable, rejecting garbage and zero.
fn parse_positive<T>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let Some(raw) = vars.get(key) else {
        return Ok(default);
    };
    let value: T = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{key}={raw} is not a number")))?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(value)
}
