use std::{env, sync::Arc};

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// This struct holds the parameters required to run the HTTP server
/// and the request monitor that ships per-request snapshots to the
/// remote collector.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// Minimum level written by the process logger.
    pub log_level: log::LevelFilter,
    /// Optional file the process logger writes to, next to stdout.
    pub log_file: Option<String>,
    /// Secret used to validate bearer tokens when extracting the principal.
    /// Principal extraction is skipped when empty.
    pub jwt_secret: String,
    /// Request monitor configuration.
    pub monitor: MonitorConfig,
}

#[derive(Clone, Debug)]
/// Options consumed by the request monitor pipeline.
///
/// The master switch turns the whole pipeline into a no-op; every other
/// `enable_monitor_*` flag toggles one enrichment section of the payload.
pub struct MonitorConfig {
    /// Master on/off switch.
    pub enable_ned_monitor: bool,
    /// Include the rendered exception section.
    pub enable_monitor_exceptions: bool,
    /// Include outgoing HTTP call logs.
    pub enable_monitor_http_requests: bool,
    /// Include domain notifications.
    pub enable_monitor_notifications: bool,
    /// Include structured log entries.
    pub enable_monitor_logs: bool,
    /// Include the DB query tally.
    pub enable_monitor_db_queries: bool,
    /// Bodies larger than this are replaced by a placeholder.
    pub max_response_body_size_in_mb: u64,
    /// Collector base address, e.g. `https://collector.internal`.
    pub base_address: String,
    /// Collector path appended to `base_address`.
    pub path: String,
    /// Per-delivery timeout in seconds.
    pub timeout_secs: u64,
    /// User agent sent when the captured request carried none.
    pub user_agent: String,
    /// Masking configuration, `None` disables masking.
    pub masking: Option<MaskingConfig>,
}

#[derive(Clone, Debug, Default)]
/// Sensitive key and pattern lists applied before a payload is shipped.
pub struct MaskingConfig {
    /// Exact key names, matched case-insensitively.
    pub keys: Vec<String>,
    /// Regular expressions matched case-insensitively against keys.
    pub patterns: Vec<String>,
    /// Replacement written in place of sensitive values.
    pub marker: String,
    /// When set, `keys` replaces the built-in key list instead of extending it.
    pub replace_default_keys: bool,
}

pub const DEFAULT_MASK_MARKER: &str = "***REDACTED***";

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            enable_ned_monitor: true,
            enable_monitor_exceptions: true,
            enable_monitor_http_requests: true,
            enable_monitor_notifications: true,
            enable_monitor_logs: true,
            enable_monitor_db_queries: true,
            max_response_body_size_in_mb: 4,
            base_address: "http://localhost:5000".to_string(),
            path: "/api/v1/logs".to_string(),
            timeout_secs: 10,
            user_agent: concat!("ned-monitor/", env!("CARGO_PKG_VERSION")).to_string(),
            masking: Some(MaskingConfig {
                marker: DEFAULT_MASK_MARKER.to_string(),
                ..Default::default()
            }),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v.trim().to_lowercase() == "true")
        .unwrap_or(default)
}

fn env_list(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl MonitorConfig {
    /// Creates a new `MonitorConfig` instance from environment variables.
    ///
    /// Every value is optional and falls back to [`MonitorConfig::default`]:
    /// - `ENABLE_NED_MONITOR`, `ENABLE_MONITOR_EXCEPTIONS`, `ENABLE_MONITOR_HTTP_REQUESTS`,
    ///   `ENABLE_MONITOR_NOTIFICATIONS`, `ENABLE_MONITOR_LOGS`, `ENABLE_MONITOR_DB_QUERIES`
    /// - `MAX_RESPONSE_BODY_SIZE_IN_MB`
    /// - `NED_MONITOR_BASE_ADDRESS`, `NED_MONITOR_PATH`, `NED_MONITOR_TIMEOUT_SECS`,
    ///   `NED_MONITOR_USER_AGENT`
    /// - `ENABLE_MONITOR_MASKING`, `MONITOR_SENSITIVE_KEYS`, `MONITOR_SENSITIVE_PATTERNS`,
    ///   `MONITOR_MASK_MARKER`, `MONITOR_REPLACE_DEFAULT_KEYS`
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = MonitorConfig::default();

        let masking = if env_flag("ENABLE_MONITOR_MASKING", true) {
            Some(MaskingConfig {
                keys: env_list("MONITOR_SENSITIVE_KEYS"),
                patterns: env_list("MONITOR_SENSITIVE_PATTERNS"),
                marker: env::var("MONITOR_MASK_MARKER")
                    .unwrap_or_else(|_| DEFAULT_MASK_MARKER.to_string()),
                replace_default_keys: env_flag("MONITOR_REPLACE_DEFAULT_KEYS", false),
            })
        } else {
            None
        };

        MonitorConfig {
            enable_ned_monitor: env_flag("ENABLE_NED_MONITOR", defaults.enable_ned_monitor),
            enable_monitor_exceptions: env_flag(
                "ENABLE_MONITOR_EXCEPTIONS",
                defaults.enable_monitor_exceptions,
            ),
            enable_monitor_http_requests: env_flag(
                "ENABLE_MONITOR_HTTP_REQUESTS",
                defaults.enable_monitor_http_requests,
            ),
            enable_monitor_notifications: env_flag(
                "ENABLE_MONITOR_NOTIFICATIONS",
                defaults.enable_monitor_notifications,
            ),
            enable_monitor_logs: env_flag("ENABLE_MONITOR_LOGS", defaults.enable_monitor_logs),
            enable_monitor_db_queries: env_flag(
                "ENABLE_MONITOR_DB_QUERIES",
                defaults.enable_monitor_db_queries,
            ),
            max_response_body_size_in_mb: env::var("MAX_RESPONSE_BODY_SIZE_IN_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_response_body_size_in_mb),
            base_address: env::var("NED_MONITOR_BASE_ADDRESS").unwrap_or(defaults.base_address),
            path: env::var("NED_MONITOR_PATH").unwrap_or(defaults.path),
            timeout_secs: env::var("NED_MONITOR_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            user_agent: env::var("NED_MONITOR_USER_AGENT").unwrap_or(defaults.user_agent),
            masking,
        }
    }
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// # Environment Variables
    ///
    /// Optional (with defaults):
    /// - `ENVIRONMENT`: development or production (default: "development")
    /// - `IP`: Server host (default: "127.0.0.1")
    /// - `PORT`: Server port (default: 8080)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `ENABLE_CONSOLE_LOGGING`: Whether to enable console logging (default: true)
    /// - `LOG_LEVEL`: Process log level (default: "debug")
    /// - `LOG_FILE`: File the process logger also writes to (default: none)
    /// - `JWT_SECRET`: Bearer token secret for principal extraction (default: empty)
    /// - Monitor settings, see [`MonitorConfig::from_env`]
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        Arc::new(Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            server_host: env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            num_workers: env::var("WORKERS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            console_logging_enabled: env_flag("ENABLE_CONSOLE_LOGGING", true),
            log_level: env::var("LOG_LEVEL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(log::LevelFilter::Debug),
            log_file: env::var("LOG_FILE").ok().filter(|s| !s.trim().is_empty()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_default(),
            monitor: MonitorConfig::from_env(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_monitor_config_enables_every_section() {
        let config = MonitorConfig::default();
        assert!(config.enable_ned_monitor);
        assert!(config.enable_monitor_exceptions);
        assert!(config.enable_monitor_http_requests);
        assert!(config.enable_monitor_notifications);
        assert!(config.enable_monitor_logs);
        assert!(config.enable_monitor_db_queries);
        assert_eq!(
            config.masking.map(|m| m.marker),
            Some(DEFAULT_MASK_MARKER.to_string())
        );
    }

    #[test]
    fn unset_list_variable_is_empty() {
        assert!(env_list("NED_MONITOR_TEST_UNSET_LIST").is_empty());
        assert!(env_flag("NED_MONITOR_TEST_UNSET_FLAG", true));
    }
}
