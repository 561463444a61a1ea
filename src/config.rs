//! Environment-driven settings for the generation gateway and the HTTP endpoint.
//!
//! `.env` is read first (if present), then the process environment.

use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a positive number of seconds, got \"{value}\"")]
    InvalidTimeout { name: &'static str, value: String },
    #[error("{name} is not a valid socket address: \"{value}\"")]
    InvalidAddr { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// `None` is allowed here; the gateway refuses to build without it.
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; tests pass a closure over a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout = match lookup("CARE_REPORT_TIMEOUT_SECS") {
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        name: "CARE_REPORT_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
        };

        Ok(Self {
            api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            api_base: lookup("CARE_REPORT_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()),
            model: lookup("CARE_REPORT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            timeout,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub gateway: GatewayConfig,
}

impl ServerConfig {
    /// `addr_override` comes from the command line and wins over `CARE_REPORT_ADDR`.
    pub fn from_env(addr_override: Option<String>) -> Result<Self, ConfigError> {
        let raw = addr_override
            .or_else(|| std::env::var("CARE_REPORT_ADDR").ok())
            .unwrap_or_else(|| DEFAULT_ADDR.into());

        let addr = raw.parse().map_err(|_| ConfigError::InvalidAddr {
            name: "CARE_REPORT_ADDR",
            value: raw.clone(),
        })?;

        Ok(Self {
            addr,
            gateway: GatewayConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = GatewayConfig::from_lookup(lookup(&[])).unwrap();
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.timeout, Duration::from_secs(60));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let cfg = GatewayConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        for bad in ["0", "soon", "-3"] {
            let err = GatewayConfig::from_lookup(lookup(&[("CARE_REPORT_TIMEOUT_SECS", bad)]));
            assert!(matches!(err, Err(ConfigError::InvalidTimeout { .. })), "{bad}");
        }

        let cfg = GatewayConfig::from_lookup(lookup(&[("CARE_REPORT_TIMEOUT_SECS", "15")])).unwrap();
        assert_eq!(cfg.timeout, Duration::from_secs(15));
    }

    #[test]
    fn addr_override_wins() {
        let cfg = ServerConfig::from_env(Some("127.0.0.1:8080".into())).unwrap();
        assert_eq!(cfg.addr.port(), 8080);

        assert!(ServerConfig::from_env(Some("not-an-addr".into())).is_err());
    }
}
