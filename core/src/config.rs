use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::{ServiceAccountKey, CREDENTIALS_ENV};
use crate::client::GEMINI_API_BASE;
use crate::errors::{ConfigError, ConfigResult};

/// Name used for the config directory under `~/.config`
pub const APP_NAME: &str = "nova-proxy";

/// Environment variable holding the Gemini API key
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// Spreadsheet every conversation turn is appended to
pub const SPREADSHEET_NAME: &str = "Chatbot Conversations";
/// Worksheet inside [`SPREADSHEET_NAME`] holding the turns
pub const WORKSHEET_NAME: &str = "Chats";

/// Persona preamble placed in front of every user message
pub const DEFAULT_CONTEXT: &str = "You are NOVA, a proactive and adaptable customer service \
agent for Nexobotics. Your role is to guide users, particularly business owners, on how \
Nexobotics can transform their customer service by handling all customer interactions \
efficiently and attentively while maximizing customer satisfaction.";

/// Settings for the Gemini API client
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model_name: String,
    /// Root of the REST API, without a trailing slash
    pub base_url: String,
}

impl GeminiConfig {
    /// Settings targeting the public Gemini endpoint
    pub fn new(api_key: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model_name: model_name.into(),
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Settings as read from the config file and environment, before validation.
///
/// Field names are the lowercased environment variable names.
#[derive(Debug, Default, Deserialize)]
pub struct RawSettings {
    pub port: Option<u16>,
    pub google_api_key: Option<String>,
    pub google_credentials_json: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_api_base: Option<String>,
    pub chat_context: Option<String>,
    pub session_ttl_secs: Option<u64>,
}

/// Validated configuration of the chat proxy
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    pub gemini: GeminiConfig,
    pub credentials: ServiceAccountKey,
    pub context: String,
    pub session_ttl: Duration,
}

impl ProxyConfig {
    /// Load configuration from `.env`, the config file and the process environment.
    ///
    /// With no explicit `config_file` the default file under `~/.config` is used
    /// when it exists. Environment variables override file values.
    pub fn load(config_file: Option<&Path>) -> ConfigResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => debug!(error = %e, "Ignoring unreadable .env file"),
        }

        let file = match config_file {
            Some(path) => Some(path.to_path_buf()),
            None => get_default_config_file(APP_NAME)
                .ok()
                .filter(|path| path.exists()),
        };

        Self::load_from_sources(file.as_deref(), ::config::Environment::default())
    }

    /// Layer an optional TOML file under the given environment source
    pub fn load_from_sources(
        file: Option<&Path>,
        env: ::config::Environment,
    ) -> ConfigResult<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = file {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let raw: RawSettings = builder.add_source(env).build()?.try_deserialize()?;
        Self::from_settings(raw)
    }

    /// Apply defaults and validate. Missing or malformed credentials are fatal.
    pub fn from_settings(raw: RawSettings) -> ConfigResult<Self> {
        let api_key = raw
            .google_api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::CredentialMissing(API_KEY_ENV))?;

        let credentials_json = raw
            .google_credentials_json
            .filter(|json| !json.trim().is_empty())
            .ok_or(ConfigError::CredentialMissing(CREDENTIALS_ENV))?;
        let credentials = ServiceAccountKey::from_json(&credentials_json)?;

        let ttl_secs = raw.session_ttl_secs.unwrap_or(DEFAULT_SESSION_TTL_SECS);
        if ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SESSION_TTL_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        let model_name = raw
            .gemini_model
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let mut gemini = GeminiConfig::new(api_key, model_name);
        if let Some(base_url) = raw.gemini_api_base.filter(|url| !url.trim().is_empty()) {
            gemini = gemini.with_base_url(base_url.trim());
        }

        Ok(Self {
            port: raw.port.unwrap_or(DEFAULT_PORT),
            gemini,
            credentials,
            context: raw
                .chat_context
                .unwrap_or_else(|| DEFAULT_CONTEXT.to_string()),
            session_ttl: Duration::from_secs(ttl_secs),
        })
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> ConfigResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> ConfigResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}
