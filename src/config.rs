//! Runtime configuration
//!
//! Layered the usual way: serialized defaults, then `lms_autoflow.toml`,
//! then `LMS_AUTOFLOW_`-prefixed environment variables.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Address the HTTP API binds to.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Directory for the sled-backed stores.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Base64-encoded 32-byte AES key protecting environment passwords.
    pub encryption_key_b64: String,
    /// Timeout applied to every outbound LMS call, in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// How long an authenticated LMS client stays reusable, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub client_cache_ttl_secs: u64,
    /// Optional path to a JSON array overriding the built-in KPI table.
    #[serde(default)]
    pub kpi_table_path: Option<String>,
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_http_timeout() -> u64 {
    30
}

fn default_cache_ttl() -> u64 {
    30 * 60
}

#[derive(Serialize)]
struct AppConfigDefaults {
    listen: String,
    data_dir: String,
    http_timeout_secs: u64,
    client_cache_ttl_secs: u64,
}

fn base_figment(path: Option<&str>) -> Figment {
    Figment::from(Serialized::defaults(AppConfigDefaults {
        listen: default_listen(),
        data_dir: default_data_dir(),
        http_timeout_secs: default_http_timeout(),
        client_cache_ttl_secs: default_cache_ttl(),
    }))
    .merge(Toml::file(path.unwrap_or("lms_autoflow.toml")))
    .merge(Env::prefixed("LMS_AUTOFLOW_"))
}

fn extract_config(figment: Figment) -> Result<AppConfig, figment::Error> {
    let config: AppConfig = figment.extract()?;

    if config.encryption_key_b64.trim().is_empty() {
        return Err(figment::Error::from(
            "encryption_key_b64 must be set".to_string(),
        ));
    }

    Ok(config)
}

pub fn load_config(path: Option<&str>) -> Result<AppConfig, figment::Error> {
    extract_config(base_figment(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_fields() {
        let figment = Figment::from(Serialized::defaults(AppConfigDefaults {
            listen: default_listen(),
            data_dir: default_data_dir(),
            http_timeout_secs: default_http_timeout(),
            client_cache_ttl_secs: default_cache_ttl(),
        }))
        .merge(Toml::string("encryption_key_b64 = \"abc\""));

        let cfg = extract_config(figment).expect("config should load");
        assert_eq!(cfg.listen, "0.0.0.0:3000");
        assert_eq!(cfg.http_timeout_secs, 30);
        assert_eq!(cfg.client_cache_ttl_secs, 1800);
        assert!(cfg.kpi_table_path.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let figment = Figment::from(Serialized::defaults(AppConfigDefaults {
            listen: default_listen(),
            data_dir: default_data_dir(),
            http_timeout_secs: default_http_timeout(),
            client_cache_ttl_secs: default_cache_ttl(),
        }))
        .merge(Toml::string(
            r#"
            listen = "127.0.0.1:9999"
            encryption_key_b64 = "abc"
            client_cache_ttl_secs = 60
            "#,
        ));

        let cfg = extract_config(figment).expect("config should load");
        assert_eq!(cfg.listen, "127.0.0.1:9999");
        assert_eq!(cfg.client_cache_ttl_secs, 60);
    }

    #[test]
    fn empty_key_is_rejected() {
        let figment = Figment::from(Serialized::defaults(AppConfigDefaults {
            listen: default_listen(),
            data_dir: default_data_dir(),
            http_timeout_secs: default_http_timeout(),
            client_cache_ttl_secs: default_cache_ttl(),
        }))
        .merge(Toml::string("encryption_key_b64 = \"  \""));

        assert!(extract_config(figment).is_err());
    }
}
