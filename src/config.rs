//! Session tuning knobs, loaded from environment variables.

use std::time::Duration;

const DEFAULT_HEARTBEAT_MS: u64 = 3_000;
const DEFAULT_DEPARTURE_GRACE_MS: u64 = 5_000;
const DEFAULT_CATCHUP_DELAY_MS: u64 = 1_000;
const DEFAULT_UNDO_LIMIT: usize = 20;
const DEFAULT_JOIN_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Interval for re-broadcasting the local presence. `None` disables it.
    pub heartbeat: Option<Duration>,
    /// How long a `peer-left` waits for counter-evidence before removal.
    pub departure_grace: Duration,
    /// Delay between observing a join and re-broadcasting the board.
    pub catchup_delay: Duration,
    /// Maximum undo (and redo) depth.
    pub undo_limit: usize,
    /// Upper bound on opening the transport.
    pub join_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat: Some(Duration::from_millis(DEFAULT_HEARTBEAT_MS)),
            departure_grace: Duration::from_millis(DEFAULT_DEPARTURE_GRACE_MS),
            catchup_delay: Duration::from_millis(DEFAULT_CATCHUP_DELAY_MS),
            undo_limit: DEFAULT_UNDO_LIMIT,
            join_timeout: Duration::from_millis(DEFAULT_JOIN_TIMEOUT_MS),
        }
    }
}

impl SessionConfig {
    /// Read `COZY_*` overrides. `COZY_HEARTBEAT_MS=0` disables the heartbeat.
    #[must_use]
    pub fn from_env() -> Self {
        let heartbeat_ms = env_parse("COZY_HEARTBEAT_MS", DEFAULT_HEARTBEAT_MS);
        Self {
            heartbeat: (heartbeat_ms > 0).then(|| Duration::from_millis(heartbeat_ms)),
            departure_grace: Duration::from_millis(env_parse("COZY_DEPARTURE_GRACE_MS", DEFAULT_DEPARTURE_GRACE_MS)),
            catchup_delay: Duration::from_millis(env_parse("COZY_CATCHUP_DELAY_MS", DEFAULT_CATCHUP_DELAY_MS)),
            undo_limit: env_parse("COZY_UNDO_LIMIT", DEFAULT_UNDO_LIMIT).max(1),
            join_timeout: Duration::from_millis(env_parse("COZY_JOIN_TIMEOUT_MS", DEFAULT_JOIN_TIMEOUT_MS)),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
