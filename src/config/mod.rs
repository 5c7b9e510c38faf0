//! Configuration loading for the picker proxy.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `PICKER_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Prefix every recognised environment key must carry.
pub const ENV_PREFIX: &str = "PICKER_";

/// Application configuration derived from `PICKER_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_client_secret: Option<String>,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,
}

/// OAuth redirect and endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct OAuthConfig {
    /// The one redirect URI registered with Google; used for every platform.
    #[serde(default = "default_oauth_redirect_uri")]
    pub redirect_uri: String,
    /// Base URL of the web frontend (`<frontend>/oauth-callback`).
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    /// Deep-link scheme of the mobile app (`<scheme>://oauth-callback`).
    #[serde(default = "default_app_scheme")]
    pub app_scheme: String,
    #[serde(default = "default_oauth_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_google_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_google_token_url")]
    pub token_url: String,
}

/// Upstream Google API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct UpstreamConfig {
    #[serde(default = "default_photos_picker_api_base")]
    pub photos_picker_api_base: String,
    #[serde(default = "default_drive_api_base")]
    pub drive_api_base: String,
    /// Base URL clients use to reach this service; prefixes every `proxyUrl`.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Host suffixes the image proxy may send a bearer token to.
    #[serde(default = "default_media_host_allowlist")]
    pub media_host_allowlist: Vec<String>,
    #[serde(default = "default_upstream_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Session store retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SessionConfig {
    /// Pending sessions older than this are swept.
    #[serde(default = "default_session_idle_ttl_seconds")]
    pub idle_ttl_seconds: u64,
    #[serde(default = "default_session_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            google_client_id: None,
            google_client_secret: None,
            oauth: OAuthConfig::default(),
            upstream: UpstreamConfig::default(),
            sessions: SessionConfig::default(),
            cors_allowed_origins: default_cors_allowed_origins(),
        }
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            redirect_uri: default_oauth_redirect_uri(),
            frontend_url: default_frontend_url(),
            app_scheme: default_app_scheme(),
            scopes: default_oauth_scopes(),
            auth_url: default_google_auth_url(),
            token_url: default_google_token_url(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            photos_picker_api_base: default_photos_picker_api_base(),
            drive_api_base: default_drive_api_base(),
            public_base_url: default_public_base_url(),
            media_host_allowlist: default_media_host_allowlist(),
            timeout_seconds: default_upstream_timeout_seconds(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_seconds: default_session_idle_ttl_seconds(),
            sweep_interval_seconds: default_session_sweep_interval_seconds(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl SessionConfig {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Validate retention bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_ttl_seconds == 0 {
            return Err(ConfigError::InvalidSessionIdleTtl {
                value: self.idle_ttl_seconds,
            });
        }

        if self.sweep_interval_seconds == 0 || self.sweep_interval_seconds > self.idle_ttl_seconds
        {
            return Err(ConfigError::InvalidSweepInterval {
                value: self.sweep_interval_seconds,
                idle_ttl: self.idle_ttl_seconds,
            });
        }

        Ok(())
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    fn is_dev_profile(&self) -> bool {
        matches!(self.profile.as_str(), "local" | "test")
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.google_client_secret.is_some() {
            config.google_client_secret = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_dev_profile() {
            if self.google_client_id.is_none() {
                return Err(ConfigError::MissingGoogleClientId);
            }
            if self.google_client_secret.is_none() {
                return Err(ConfigError::MissingGoogleClientSecret);
            }
        }

        for (field, value) in [
            ("OAUTH_REDIRECT_URI", &self.oauth.redirect_uri),
            ("FRONTEND_URL", &self.oauth.frontend_url),
            ("GOOGLE_AUTH_URL", &self.oauth.auth_url),
            ("GOOGLE_TOKEN_URL", &self.oauth.token_url),
            ("PHOTOS_PICKER_API_BASE", &self.upstream.photos_picker_api_base),
            ("DRIVE_API_BASE", &self.upstream.drive_api_base),
            ("PUBLIC_BASE_URL", &self.upstream.public_base_url),
        ] {
            Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
                field: field.to_string(),
                value: value.clone(),
                source,
            })?;
        }

        if self.oauth.app_scheme.is_empty()
            || !self
                .oauth
                .app_scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(ConfigError::InvalidAppScheme {
                value: self.oauth.app_scheme.clone(),
            });
        }

        if self.oauth.scopes.is_empty() {
            return Err(ConfigError::MissingScopes);
        }

        if self.upstream.timeout_seconds == 0 {
            return Err(ConfigError::InvalidUpstreamTimeout {
                value: self.upstream.timeout_seconds,
            });
        }

        self.sessions.validate()?;

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_oauth_redirect_uri() -> String {
    "http://localhost:3000/api/oauth/callback".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_app_scheme() -> String {
    "mediapicker".to_string()
}

fn default_oauth_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/photospicker.mediaitems.readonly".to_string(),
        "https://www.googleapis.com/auth/drive.readonly".to_string(),
        "https://www.googleapis.com/auth/drive.metadata.readonly".to_string(),
    ]
}

fn default_google_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_google_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_photos_picker_api_base() -> String {
    "https://photospicker.googleapis.com/v1".to_string()
}

fn default_drive_api_base() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_media_host_allowlist() -> Vec<String> {
    vec!["googleusercontent.com".to_string()]
}

fn default_upstream_timeout_seconds() -> u64 {
    30
}

fn default_session_idle_ttl_seconds() -> u64 {
    3600 // 1 hour
}

fn default_session_sweep_interval_seconds() -> u64 {
    600 // 10 minutes
}

fn default_cors_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:8081".to_string(),
        "http://localhost:19006".to_string(),
    ]
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("Google client ID is missing; set PICKER_GOOGLE_CLIENT_ID")]
    MissingGoogleClientId,
    #[error("Google client secret is missing; set PICKER_GOOGLE_CLIENT_SECRET")]
    MissingGoogleClientSecret,
    #[error("no OAuth scopes configured; set PICKER_OAUTH_SCOPES")]
    MissingScopes,
    #[error("{field} is not a valid URL '{value}': {source}")]
    InvalidUrl {
        field: String,
        value: String,
        source: url::ParseError,
    },
    #[error("app scheme '{value}' is not a valid URI scheme")]
    InvalidAppScheme { value: String },
    #[error("upstream timeout must be positive, got {value}")]
    InvalidUpstreamTimeout { value: u64 },
    #[error("session idle TTL must be positive, got {value}")]
    InvalidSessionIdleTtl { value: u64 },
    #[error("session sweep interval must be between 1 and the idle TTL ({idle_ttl}), got {value}")]
    InvalidSweepInterval { value: u64, idle_ttl: u64 },
}

/// Split a comma or whitespace separated list, dropping empty entries
fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Loads configuration using layered `.env` files and `PICKER_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration from env files and the process environment.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let mut take = |key: &str| layered.remove(key).filter(|v| !v.trim().is_empty());

        let profile = take("PROFILE").unwrap_or(profile_hint);
        let api_bind_addr = take("API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take("LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format = take("LOG_FORMAT").unwrap_or_else(default_log_format);
        let google_client_id = take("GOOGLE_CLIENT_ID").map(|v| v.trim().to_string());
        let google_client_secret = take("GOOGLE_CLIENT_SECRET").map(|v| v.trim().to_string());

        let oauth = OAuthConfig {
            redirect_uri: take("OAUTH_REDIRECT_URI").unwrap_or_else(default_oauth_redirect_uri),
            frontend_url: take("FRONTEND_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(default_frontend_url),
            app_scheme: take("APP_SCHEME").unwrap_or_else(default_app_scheme),
            scopes: take("OAUTH_SCOPES")
                .map(|v| split_list(&v))
                .unwrap_or_else(default_oauth_scopes),
            auth_url: take("GOOGLE_AUTH_URL").unwrap_or_else(default_google_auth_url),
            token_url: take("GOOGLE_TOKEN_URL").unwrap_or_else(default_google_token_url),
        };

        let upstream = UpstreamConfig {
            photos_picker_api_base: take("PHOTOS_PICKER_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(default_photos_picker_api_base),
            drive_api_base: take("DRIVE_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(default_drive_api_base),
            public_base_url: take("PUBLIC_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(default_public_base_url),
            media_host_allowlist: take("MEDIA_HOST_ALLOWLIST")
                .map(|v| split_list(&v))
                .unwrap_or_else(default_media_host_allowlist),
            timeout_seconds: take("UPSTREAM_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_upstream_timeout_seconds),
        };

        let sessions = SessionConfig {
            idle_ttl_seconds: take("SESSION_IDLE_TTL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_session_idle_ttl_seconds),
            sweep_interval_seconds: take("SESSION_SWEEP_INTERVAL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_session_sweep_interval_seconds),
        };

        let cors_allowed_origins = take("CORS_ALLOWED_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or_else(default_cors_allowed_origins);

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            google_client_id,
            google_client_secret,
            oauth,
            upstream,
            sessions,
            cors_allowed_origins,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
