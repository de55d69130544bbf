mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Load configuration from the process environment.
pub fn load_config() -> Result<Config> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Load configuration from an arbitrary variable source. `load_config` is
/// this over `std::env::var`; tests inject a map instead.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let get = |key: &str, default: String| lookup(key).unwrap_or(default);

    let timeout = match lookup("CLIENT_TIMEOUT") {
        Some(raw) => parse_duration(&raw)
            .with_context(|| format!("parsing CLIENT_TIMEOUT {raw:?}"))?,
        None => default_timeout(),
    };

    let config = Config {
        listen: get("HTTP_PORT", default_listen()),
        log_level: get("LOG_LEVEL", default_log_level()),
        origin_host: get("ORIGIN_HOST", String::new()),
        hostname: get("HOSTNAME", default_hostname()),
        origin_token: get("ORIGIN_TOKEN", String::new()),
        client: ClientConfig {
            timeout,
            enable_xray: parse_bool(&get("ENABLE_XRAY", "false".to_string()))
                .context("parsing ENABLE_XRAY")?,
            enable_xray_plugins: parse_bool(&get("ENABLE_XRAY_PLUGINS", "false".to_string()))
                .context("parsing ENABLE_XRAY_PLUGINS")?,
        },
        propeller: PropellerConfig {
            host: get("PROPELLER_HOST", String::new()),
            creds: get("PROPELLER_CREDS", String::new()),
        },
    };

    Ok(config)
}

impl Config {
    /// True when the gateway runs as localhost, which bypasses request
    /// authentication.
    pub fn is_localhost(&self) -> bool {
        self.hostname == "localhost"
    }

    /// Validate a caller-provided origin token.
    pub fn authenticate(&self, token: &str) -> bool {
        self.is_localhost() || token == self.origin_token
    }

    /// Shared HTTP client for origin fetches, carrying the configured
    /// per-request timeout.
    pub fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(self.client.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            })
    }

    /// Listen address in a form `TcpListener::bind` accepts. The
    /// environment convention allows a bare `:8080`.
    pub fn bind_addr(&self) -> String {
        match self.listen.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.listen.clone(),
        }
    }
}

/// Durations in the environment use the compact `5s` / `500ms` / `2m` form.
fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();

    if let Some(ms) = raw.strip_suffix("ms") {
        return Ok(Duration::from_millis(ms.parse()?));
    }
    if let Some(secs) = raw.strip_suffix('s') {
        return Ok(Duration::from_secs(secs.parse()?));
    }
    if let Some(mins) = raw.strip_suffix('m') {
        return Ok(Duration::from_secs(mins.parse::<u64>()? * 60));
    }

    Ok(Duration::from_secs(raw.parse()?))
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = load(&[]).unwrap();
        assert_eq!(config.listen, ":8080");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.hostname, "localhost");
        assert_eq!(config.client.timeout, Duration::from_secs(5));
        assert!(!config.client.enable_xray);
        assert!(!config.propeller.is_configured());
    }

    #[test]
    fn variables_override_defaults() {
        let config = load(&[
            ("HTTP_PORT", ":9000"),
            ("LOG_LEVEL", "info"),
            ("ORIGIN_HOST", "https://origin.test"),
            ("HOSTNAME", "bakery.test"),
            ("ORIGIN_TOKEN", "secret"),
            ("CLIENT_TIMEOUT", "2s"),
            ("PROPELLER_HOST", "https://propeller.test"),
            ("PROPELLER_CREDS", "user:pass"),
        ])
        .unwrap();

        assert_eq!(config.listen, ":9000");
        assert_eq!(config.origin_host, "https://origin.test");
        assert_eq!(config.hostname, "bakery.test");
        assert_eq!(config.client.timeout, Duration::from_secs(2));
        assert!(config.propeller.is_configured());
    }

    #[test]
    fn duration_forms() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("7").unwrap(), Duration::from_secs(7));
        assert!(parse_duration("fast").is_err());
    }

    #[test]
    fn localhost_bypasses_authentication() {
        let config = load(&[("ORIGIN_TOKEN", "secret")]).unwrap();
        assert!(config.is_localhost());
        assert!(config.authenticate("anything"));

        let config = load(&[("HOSTNAME", "bakery.test"), ("ORIGIN_TOKEN", "secret")]).unwrap();
        assert!(!config.authenticate("anything"));
        assert!(config.authenticate("secret"));
    }

    #[test]
    fn bind_addr_accepts_bare_port() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");

        let config = load(&[("HTTP_PORT", "127.0.0.1:8081")]).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:8081");
    }
}
