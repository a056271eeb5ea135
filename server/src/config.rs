//! Relay settings, loaded from environment variables.

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CLIENT_QUEUE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    pub port: u16,
    /// Outbound frames buffered per client before new ones are dropped.
    pub client_queue: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, client_queue: DEFAULT_CLIENT_QUEUE }
    }
}

impl RelayConfig {
    /// Read `PORT` and `RELAY_CLIENT_QUEUE`, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            client_queue: env_parse("RELAY_CLIENT_QUEUE", DEFAULT_CLIENT_QUEUE).max(1),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
