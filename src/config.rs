//! Service configuration from environment variables.

use std::{env::VarError, net::SocketAddr, path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// `None` keeps carts in memory only.
    pub cart_storage_dir: Option<PathBuf>,
    pub storefront_api_url: String,
    pub storefront_site: Option<String>,
    pub settings_refresh: Duration,
    pub http_timeout_secs: u64,
    /// Payment widget key used until the storefront reports one.
    pub payment_public_key: Option<String>,
    /// Live carts untouched this long are evicted from memory.
    pub cart_idle: Duration,
}

/// Loads `.env` (if present) and then reads the process environment.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but does not parse.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_app_config(|key| std::env::var(key))
}

fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let bind_addr = or_default("BIND_ADDR", "0.0.0.0:8000")
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "BIND_ADDR".to_string(),
            reason: e.to_string(),
        })?;

    let parse_positive_secs = |var: &str, default: &str| -> Result<Duration, ConfigError> {
        match parse_u64(var, default)? {
            0 => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            }),
            secs => Ok(Duration::from_secs(secs)),
        }
    };

    Ok(AppConfig {
        bind_addr,
        log_level: or_default("LOG_LEVEL", "info"),
        cart_storage_dir: optional("CART_STORAGE_DIR").map(PathBuf::from),
        storefront_api_url: or_default("STOREFRONT_API_URL", "http://localhost:8001/api/"),
        storefront_site: optional("STOREFRONT_SITE"),
        settings_refresh: parse_positive_secs("SETTINGS_REFRESH_SECS", "300")?,
        http_timeout_secs: parse_u64("HTTP_TIMEOUT_SECS", "15")?,
        payment_public_key: optional("PAYMENT_PUBLIC_KEY"),
        cart_idle: parse_positive_secs("CART_IDLE_SECS", "1800")?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let map = HashMap::new();

        let config = build_app_config(lookup_from_map(&map)).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.cart_storage_dir, None);
        assert_eq!(config.storefront_site, None);
        assert_eq!(config.settings_refresh, Duration::from_secs(300));
        assert_eq!(config.http_timeout_secs, 15);
        assert_eq!(config.payment_public_key, None);
        assert_eq!(config.cart_idle, Duration::from_secs(1800));
    }

    #[test]
    fn overrides_are_applied() {
        let map = HashMap::from([
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("CART_STORAGE_DIR", "/var/lib/carts"),
            ("STOREFRONT_API_URL", "https://api.shop.test/api"),
            ("STOREFRONT_SITE", "burbuja"),
            ("SETTINGS_REFRESH_SECS", "60"),
            ("PAYMENT_PUBLIC_KEY", "TEST-key"),
            ("CART_IDLE_SECS", "600"),
        ]);

        let config = build_app_config(lookup_from_map(&map)).unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.cart_storage_dir, Some(PathBuf::from("/var/lib/carts")));
        assert_eq!(config.storefront_api_url, "https://api.shop.test/api");
        assert_eq!(config.storefront_site.as_deref(), Some("burbuja"));
        assert_eq!(config.settings_refresh, Duration::from_secs(60));
        assert_eq!(config.payment_public_key.as_deref(), Some("TEST-key"));
        assert_eq!(config.cart_idle, Duration::from_secs(600));
    }

    #[test]
    fn blank_site_is_treated_as_unset() {
        let map = HashMap::from([("STOREFRONT_SITE", "  ")]);

        let config = build_app_config(lookup_from_map(&map)).unwrap();

        assert_eq!(config.storefront_site, None);
    }

    #[test]
    fn invalid_bind_addr_fails() {
        let map = HashMap::from([("BIND_ADDR", "nowhere")]);

        let result = build_app_config(lookup_from_map(&map));

        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "BIND_ADDR"),
            "expected InvalidEnvVar(BIND_ADDR), got: {result:?}"
        );
    }

    #[test]
    fn zero_refresh_interval_fails() {
        let map = HashMap::from([("SETTINGS_REFRESH_SECS", "0")]);

        let result = build_app_config(lookup_from_map(&map));

        assert!(matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "SETTINGS_REFRESH_SECS"));
    }

    #[test]
    fn zero_idle_timeout_fails() {
        let map = HashMap::from([("CART_IDLE_SECS", "0")]);

        let result = build_app_config(lookup_from_map(&map));

        assert!(matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "CART_IDLE_SECS"));
    }
}
