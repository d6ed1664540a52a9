use std::time::Duration;

use shared::DEFAULT_PORT;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_CONNECTIONS: usize = 256;

/// Upper bound on how late an idle connection is noticed.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// A connection with no inbound data for this long is closed
    pub idle_timeout: Duration,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// How often the idle sweep runs.
    pub fn sweep_interval(&self) -> Duration {
        (self.idle_timeout / 4).clamp(Duration::from_millis(1), MAX_SWEEP_INTERVAL)
    }
}
