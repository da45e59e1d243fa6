use serde::Deserialize;
use std::{env, fmt, fs, io, path::Path, time::Duration};

use crate::domain::AuthorizationOptions;
use crate::interface_adapters::clients::{FIREBASE_IDENTITY_TOOLKIT_URL, GOOGLE_DISCOVERY_URL};
use crate::use_cases::{SessionSettings, DEFAULT_EXCHANGE_TIMEOUT};

// Runtime configuration: optional TOML file, then environment overrides.

pub const DEFAULT_CONFIG_PATH: &str = "signin.toml";
const DEFAULT_HTTP_PORT: u16 = 3003;
const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REDIRECT_URI: &str = "http://localhost:3003/callback";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http_port: u16,
    // Google OAuth client id (the "server client id" of the Android app).
    pub client_id: String,
    pub redirect_uri: String,
    pub discovery_url: String,
    pub firebase_api_key: String,
    pub firebase_base_url: String,
    pub exchange_timeout_ms: u64,
    pub provider_timeout_ms: u64,
    pub options: AuthorizationOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            client_id: String::new(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            discovery_url: GOOGLE_DISCOVERY_URL.to_string(),
            firebase_api_key: String::new(),
            firebase_base_url: FIREBASE_IDENTITY_TOOLKIT_URL.to_string(),
            exchange_timeout_ms: DEFAULT_EXCHANGE_TIMEOUT.as_millis() as u64,
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
            options: AuthorizationOptions::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read { path: String, source: io::Error },
    Parse { path: String, source: toml::de::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => write!(f, "failed to read {path}: {source}"),
            ConfigError::Parse { path, source } => write!(f, "failed to parse {path}: {source}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var("SIGNIN_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            // The default file is optional.
            Err(_) => match Self::from_file(Path::new(DEFAULT_CONFIG_PATH)) {
                Err(ConfigError::Read { source, .. })
                    if source.kind() == io::ErrorKind::NotFound =>
                {
                    Self::default()
                }
                other => other?,
            },
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    // Secrets and deployment knobs come from the environment when set.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("GOOGLE_CLIENT_ID") {
            self.client_id = value;
        }
        if let Some(value) = lookup("FIREBASE_API_KEY") {
            self.firebase_api_key = value;
        }
        if let Some(value) = lookup("SIGNIN_REDIRECT_URI") {
            self.redirect_uri = value;
        }
        if let Some(port) = lookup("SIGNIN_HTTP_PORT").and_then(|v| v.parse().ok()) {
            self.http_port = port;
        }
        if let Some(millis) = lookup("SIGNIN_EXCHANGE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.exchange_timeout_ms = millis;
        }
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            client_id: self.client_id.clone(),
            options: self.options,
            exchange_timeout: self.exchange_timeout(),
        }
    }
}
