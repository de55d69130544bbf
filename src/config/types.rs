use std::time::Duration;

/// All the configuration for the gateway, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address, e.g. `:8080` or `0.0.0.0:8080`.
    pub listen: String,

    /// Log level for the tracing subscriber.
    pub log_level: String,

    /// Prefix for relative origin paths.
    pub origin_host: String,

    /// Public hostname of this gateway, used when rewriting variant URIs.
    pub hostname: String,

    /// Token callers must present unless the gateway runs as localhost.
    pub origin_token: String,

    pub client: ClientConfig,

    pub propeller: PropellerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_level: default_log_level(),
            origin_host: String::new(),
            hostname: default_hostname(),
            origin_token: String::new(),
            client: ClientConfig::default(),
            propeller: PropellerConfig::default(),
        }
    }
}

/// Configuration for the shared origin-fetch HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub enable_xray: bool,
    pub enable_xray_plugins: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            enable_xray: false,
            enable_xray_plugins: false,
        }
    }
}

/// Credentials for the Propeller API. Both fields empty means the
/// propeller origin kind is disabled.
#[derive(Debug, Clone, Default)]
pub struct PropellerConfig {
    pub host: String,
    pub creds: String,
}

impl PropellerConfig {
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.creds.is_empty()
    }
}

pub(super) fn default_listen() -> String {
    ":8080".to_string()
}

pub(super) fn default_log_level() -> String {
    "debug".to_string()
}

pub(super) fn default_hostname() -> String {
    "localhost".to_string()
}

pub(super) fn default_timeout() -> Duration {
    Duration::from_secs(5)
}
