use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Fallback inference server address when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "http://192.168.1.183:1234";
/// Environment variable that overrides the default server address.
pub const SERVER_URL_ENV: &str = "LM_STUDIO_URL";
/// Bearer token LM Studio accepts when no key is configured.
pub const DEFAULT_API_KEY: &str = "lm-studio";

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerCfg {
    #[serde(default = "default_server_url")]
    pub default_url: String,
    /// Name of the environment variable that contains the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            default_url: default_server_url(),
            api_key_env: None,
        }
    }
}

impl ServerCfg {
    /// Default address, with `LM_STUDIO_URL` taking precedence when set.
    pub fn resolved_default_url(&self) -> String {
        std::env::var(SERVER_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.default_url.clone())
    }

    pub fn api_key(&self) -> String {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .unwrap_or_else(|| DEFAULT_API_KEY.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total request timeout in milliseconds. Unset by default: a generation
    /// stream may legitimately run for minutes.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Optional per-host idle connection pool cap (None = reqwest default)
    #[serde(default)]
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: None,
            pool_max_idle_per_host: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ListenCfg {
    #[serde(default = "default_listen_addr")]
    pub addr: String,
}

impl Default for ListenCfg {
    fn default() -> Self {
        Self {
            addr: default_listen_addr(),
        }
    }
}

fn default_settings_path() -> String {
    ".lmchat/settings.json".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SettingsCfg {
    #[serde(default = "default_settings_path")]
    pub path: String,
}

impl Default for SettingsCfg {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

fn default_channel_capacity() -> usize {
    64
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionCfg {
    /// Events buffered between the decoder and a slow consumer.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Every section is optional; missing sections take their defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerCfg,
    #[serde(default)]
    pub http: HttpCfg,
    #[serde(default)]
    pub listen: ListenCfg,
    #[serde(default)]
    pub settings: SettingsCfg,
    #[serde(default)]
    pub session: SessionCfg,
}

impl Config {
    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::error::CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(crate::error::RelayError::from)?;
        let s =
            std::str::from_utf8(&bytes).map_err(|e| crate::error::RelayError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::RelayError::Other(e.into()))?,
            Some("toml") => toml::from_str::<Self>(s)
                .map_err(|e| crate::error::RelayError::Other(e.into()))?,
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::RelayError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s)
                        .map_err(|e| crate::error::RelayError::Other(e.into()))
                })?,
        };
        Ok(cfg)
    }
}
