//! Process-wide application context: resolved client configuration, the
//! session credential and the theme preference. Built once at startup and
//! handed to whoever needs it.

use std::{fmt, str::FromStr, sync::Arc, sync::RwLock, time::Duration};

use tracing::info;

use crate::{
    auth::{capture_bearer_token, BearerToken},
    store::{KeyValueStore, StoreError},
};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5678";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(3);
pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub notification_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(format!("unknown theme '{other}'")),
        }
    }
}

pub struct AppContext {
    config: ClientConfig,
    token: Option<BearerToken>,
    theme: RwLock<Theme>,
    preferences: Arc<dyn KeyValueStore>,
}

impl AppContext {
    pub fn initialize(
        config: ClientConfig,
        launch_token: Option<BearerToken>,
        session: &dyn KeyValueStore,
        preferences: Arc<dyn KeyValueStore>,
    ) -> Result<Self, StoreError> {
        let token = capture_bearer_token(launch_token, session)?;
        let theme = preferences
            .get(THEME_KEY)?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();
        info!(
            base_url = %config.base_url,
            authenticated = token.is_some(),
            theme = %theme,
            "context: initialized"
        );
        Ok(Self {
            config,
            token,
            theme: RwLock::new(theme),
            preferences,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }

    pub fn theme(&self) -> Theme {
        *self.theme.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), StoreError> {
        self.preferences.set(THEME_KEY, theme.as_str())?;
        *self
            .theme
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = theme;
        Ok(())
    }

    pub fn toggle_theme(&self) -> Result<Theme, StoreError> {
        let next = self.theme().toggled();
        self.set_theme(next)?;
        info!(theme = %next, "context: theme switched");
        Ok(next)
    }
}
