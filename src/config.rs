use std::env;

/// Application configuration loaded from environment variables
///
/// Every value is optional; an unset or unparsable variable silently falls
/// back to its default so a misconfigured environment never prevents startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the HTTP/WebSocket server (default: 8080)
    pub port: u16,
    /// Log level when RUST_LOG is not set (default: info)
    pub log_level: String,
    /// Transport read buffer size in bytes (default: 1024)
    pub read_buffer_size: usize,
    /// Transport write buffer size in bytes (default: 1024)
    pub write_buffer_size: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Config {
            port: get_env_as("PORT", 8080),
            log_level: get_env_or("LOG_LEVEL", "info"),
            read_buffer_size: get_env_as("READ_BUFFER_SIZE", 1024),
            write_buffer_size: get_env_as("WRITE_BUFFER_SIZE", 1024),
        }
    }

    /// Get the server bind address
    pub fn addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            log_level: "info".to_string(),
            read_buffer_size: 1024,
            write_buffer_size: 1024,
        }
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get environment variable parsed as T, falling back to the default
fn get_env_as<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
