//! Application configuration structures.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::library_key;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Polling behaviour
    #[serde(default)]
    pub general: GeneralConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Notification settings
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Catalog URLs keyed by label
    #[serde(default)]
    pub urls: BTreeMap<String, String>,

    /// Account used for login, rent and reserve
    pub credentials: Credentials,

    /// Auto-rent settings
    #[serde(default)]
    pub rent: RentConfig,

    /// Auto-reserve settings
    #[serde(default)]
    pub reservation: ReservationConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let interval = self.general.poll_interval_secs;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(AppError::validation("general.poll_interval_secs must be > 0"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.notification.timeout_secs == 0 {
            return Err(AppError::validation("notification.timeout_secs must be > 0"));
        }
        if self.http.max_concurrent == 0 {
            return Err(AppError::validation("http.max_concurrent must be > 0"));
        }
        if self.http.page_size == 0 {
            return Err(AppError::validation("http.page_size must be > 0"));
        }
        url::Url::parse(&self.http.base_url)
            .map_err(|e| AppError::validation(format!("http.base_url: {e}")))?;
        if self.urls.is_empty() {
            return Err(AppError::validation("No catalog urls defined"));
        }
        for (label, url) in &self.urls {
            library_key(url)
                .map_err(|e| AppError::validation(format!("urls.{label}: {e}")))?;
        }
        if self.credentials.username.trim().is_empty() {
            return Err(AppError::validation("credentials.username is empty"));
        }
        if self.credentials.library.trim().is_empty() {
            return Err(AppError::validation("credentials.library is empty"));
        }
        if self.rent.lend_period_days == 0 {
            return Err(AppError::validation("rent.lend_period_days must be > 0"));
        }
        if let Some(email) = &self.reservation.notify_email {
            if !email.contains('@') {
                return Err(AppError::validation(
                    "reservation.notify_email is not an email address",
                ));
            }
        }
        Ok(())
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.general.poll_interval_secs)
    }
}

/// Polling behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Seconds to sleep between poll cycles
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_secs: f64,

    /// File with auto-rent keywords, one per line
    #[serde(default)]
    pub auto_rent_keywords_path: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: defaults::poll_interval(),
            auto_rent_keywords_path: None,
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Origin of the lending platform, used for session actions and
    /// notification links
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Number of items requested per catalog page
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Maximum catalog pages fetched concurrently
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            page_size: defaults::page_size(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Apprise configuration file; notifications are only logged when unset
    #[serde(default)]
    pub apprise_config_path: Option<PathBuf>,

    /// Notification title
    #[serde(default = "defaults::notification_title")]
    pub title: String,

    /// Drop one random item after priming so the next cycle notifies about it
    #[serde(default)]
    pub test_notification: bool,

    /// Seconds a single dispatch may take before it is killed
    #[serde(default = "defaults::notification_timeout")]
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            apprise_config_path: None,
            title: defaults::notification_title(),
            test_notification: false,
            timeout_secs: defaults::notification_timeout(),
        }
    }
}

/// Library account.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Tenant key, e.g. `berlin`
    pub library: String,
    /// Numeric library id used by the login page
    #[serde(rename = "library-id", alias = "library_id")]
    pub library_id: u32,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("library", &self.library)
            .field("library_id", &self.library_id)
            .finish()
    }
}

/// Auto-rent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentConfig {
    #[serde(default = "defaults::lend_period")]
    pub lend_period_days: u32,
}

impl Default for RentConfig {
    fn default() -> Self {
        Self {
            lend_period_days: defaults::lend_period(),
        }
    }
}

/// Auto-reserve settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReservationConfig {
    /// Reserve unavailable items that match a keyword
    #[serde(default)]
    pub enabled: bool,

    /// Address the backend notifies once a reserved item is ready
    #[serde(default)]
    pub notify_email: Option<String>,
}

mod defaults {
    pub fn poll_interval() -> f64 {
        300.0
    }
    pub fn base_url() -> String {
        crate::models::ONLEIHE_BASE_URL.into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; onleihe-watch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn page_size() -> u32 {
        100
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn notification_title() -> String {
        "Onleihe: New media".into()
    }
    pub fn notification_timeout() -> u64 {
        30
    }
    pub fn lend_period() -> u32 {
        2
    }
}
