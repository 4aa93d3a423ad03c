//! Configuration management for IdeaBox services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Moderator session configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Attachment upload configuration
    #[serde(default)]
    pub uploads: UploadConfig,

    /// Outbound mail configuration
    #[serde(default)]
    pub mail: MailConfig,

    /// Listing configuration
    #[serde(default)]
    pub listing: ListingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Accounts and categories created on first start
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (postgres:// or sqlite://)
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Secret used to sign session tokens. A random one is generated per
    /// process when unset, which logs every moderator out on restart.
    pub session_secret: Option<String>,

    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Session cookie name
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Mark the session cookie `Secure` (HTTPS only)
    #[serde(default)]
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Directory attachments are written to
    #[serde(default = "default_upload_dir")]
    pub dir: String,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Accepted file extensions (lowercase, without the dot)
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    /// Send real mail; when false notifications are only logged
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    pub username: Option<String>,

    pub password: Option<String>,

    #[serde(default = "default_from_email")]
    pub from_email: String,

    /// Recipient of new-idea notifications
    pub moderator_email: Option<String>,

    /// Upgrade the connection with STARTTLS
    #[serde(default = "default_enabled")]
    pub starttls: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingConfig {
    /// Ideas per page on the public listing and the moderator dashboard
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub moderators: Vec<ModeratorSeed>,

    #[serde(default)]
    pub categories: Vec<CategorySeed>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModeratorSeed {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Inline password; prefer `password_env` outside development
    pub password: Option<String>,
    /// Name of an environment variable holding the password
    pub password_env: Option<String>,
    #[serde(default)]
    pub can_manage_categories: bool,
    #[serde(default)]
    pub is_super_moderator: bool,
}

impl ModeratorSeed {
    /// The inline password, else the value of `password_env`; blank counts as unset
    pub fn resolve_password(&self) -> Option<String> {
        self.password
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| {
                self.password_env
                    .as_deref()
                    .and_then(|var| std::env::var(var).ok())
            })
            .filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategorySeed {
    pub name: String,
    pub description: Option<String>,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_database_url() -> String { "sqlite://ideabox.db?mode=rwc".to_string() }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_session_ttl() -> u64 { 8 * 3600 }
fn default_cookie_name() -> String { "ideabox_session".to_string() }
fn default_upload_dir() -> String { "uploads".to_string() }
fn default_max_content_length() -> usize { 16 * 1024 * 1024 }
fn default_allowed_extensions() -> Vec<String> {
    ["jpg", "png", "pdf", "doc", "docx", "xls", "xlsx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_smtp_host() -> String { "localhost".to_string() }
fn default_smtp_port() -> u16 { 587 }
fn default_from_email() -> String { "ideabox@localhost".to_string() }
fn default_page_size() -> u64 { 6 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "ideabox".to_string() }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: None,
            session_ttl_secs: default_session_ttl(),
            cookie_name: default_cookie_name(),
            secure_cookies: false,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            max_content_length: default_max_content_length(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from_email: default_from_email(),
            moderator_email: None,
            starttls: default_enabled(),
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self { page_size: default_page_size() }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            uploads: UploadConfig::default(),
            mail: MailConfig::default(),
            listing: ListingConfig::default(),
            observability: ObservabilityConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.listing.page_size, 6);
        assert_eq!(config.uploads.max_content_length, 16 * 1024 * 1024);
        assert!(!config.mail.enabled);
    }

    #[test]
    fn test_default_extensions() {
        let config = AppConfig::default();
        for ext in ["jpg", "png", "pdf", "doc", "docx", "xls", "xlsx"] {
            assert!(config.uploads.allowed_extensions.iter().any(|e| e == ext));
        }
    }

    #[test]
    fn test_partial_source_fills_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("listing.page_size", 10)
            .unwrap()
            .set_override("database.url", "sqlite::memory:")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.listing.page_size, 10);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.auth.cookie_name, "ideabox_session");
    }

    #[test]
    fn test_seed_password_resolution() {
        let mut seed = ModeratorSeed {
            username: "olga".to_string(),
            first_name: "Ольга".to_string(),
            last_name: "Власюк".to_string(),
            password: Some("inline".to_string()),
            password_env: Some("IDEABOX_TEST_UNSET_PASSWORD_VAR".to_string()),
            can_manage_categories: true,
            is_super_moderator: false,
        };
        assert_eq!(seed.resolve_password().as_deref(), Some("inline"));

        seed.password = Some(String::new());
        assert_eq!(seed.resolve_password(), None);
    }
}
