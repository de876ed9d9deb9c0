//! Typed configuration surface (SPEC_FULL.md §11), loaded the way
//! `synctv-core::config::Config` is: a `config::Config` builder layering an
//! optional file under environment variables, deserialized into a typed
//! struct with `Default` per section.

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use streamproxy_core::backend::{DefaultBackendConfig, RedisBackendConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoadBalancerType {
    #[default]
    Memory,
    Redis,
}

/// Top-level configuration, flattened per spec.md §6's environment-variable
/// table. `__` (not `_`) is the nesting separator so the already-underscored
/// option names (`PROXY_REDIS_HOST`, `PROXY_DEFAULT_BACKEND_ENABLED`, ...)
/// stay flat fields rather than being split into nested sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rtmp_server: String,
    pub http_server: String,
    pub http_api: String,
    pub webrtc_server: String,
    pub srt_server: String,
    pub system_api: String,

    pub load_balancer_type: LoadBalancerType,

    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: Option<String>,
    pub redis_db: i64,

    pub default_backend_enabled: bool,
    pub default_backend_ip: Option<String>,
    pub default_backend_rtmp: Option<String>,
    pub default_backend_http: Option<String>,
    pub default_backend_api: Option<String>,
    pub default_backend_rtc: Option<String>,
    pub default_backend_srt: Option<String>,

    pub grace_quit_timeout_secs: u64,
    pub force_quit_timeout_secs: u64,

    pub log_level: String,
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rtmp_server: "1935".to_string(),
            http_server: "8080".to_string(),
            http_api: "8081".to_string(),
            webrtc_server: "8000".to_string(),
            srt_server: "10080".to_string(),
            system_api: "1985".to_string(),

            load_balancer_type: LoadBalancerType::Memory,

            redis_host: "127.0.0.1".to_string(),
            redis_port: 6379,
            redis_password: None,
            redis_db: 0,

            default_backend_enabled: false,
            default_backend_ip: None,
            default_backend_rtmp: None,
            default_backend_http: None,
            default_backend_api: None,
            default_backend_rtc: None,
            default_backend_srt: None,

            grace_quit_timeout_secs: 30,
            force_quit_timeout_secs: 60,

            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from (in ascending priority) defaults, an
    /// optional file, and `PROXY_`-prefixed environment variables.
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, config::FileFormat::Yaml));
            }
        }

        builder = builder.add_source(Environment::with_prefix("PROXY").separator("__").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    pub fn redis_backend_config(&self) -> RedisBackendConfig {
        RedisBackendConfig {
            host: self.redis_host.clone(),
            port: self.redis_port,
            password: self.redis_password.clone(),
            db: self.redis_db,
        }
    }

    pub fn default_backend_config(&self) -> DefaultBackendConfig {
        DefaultBackendConfig {
            enabled: self.default_backend_enabled,
            ip: self.default_backend_ip.as_deref().and_then(|s| s.parse().ok()),
            rtmp: self.default_backend_rtmp.clone(),
            http: self.default_backend_http.clone(),
            api: self.default_backend_api.clone(),
            rtc: self.default_backend_rtc.clone(),
            srt: self.default_backend_srt.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_memory_backend() {
        let config = Config::default();
        assert_eq!(config.load_balancer_type, LoadBalancerType::Memory);
        assert!(!config.default_backend_enabled);
    }
}
