use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use client_core::ClientConfig;
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "newsdesk.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    base_url: Option<String>,
    poll_interval_ms: Option<u64>,
    notification_ttl_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub client: ClientConfig,
    pub data_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl Settings {
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    /// Command-line flags win over the file and the environment.
    pub fn apply_flags(
        &mut self,
        base_url: Option<&str>,
        data_dir: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        if let Some(raw) = base_url {
            self.client.base_url = normalize_base_url(raw)?;
        }
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newsdesk")
}

/// Loads `newsdesk.toml` (or the explicit `path`), then applies environment
/// overrides. A missing default file is fine; a missing explicit one is not.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

fn load_settings_with(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let file_cfg = read_file_config(path)?;
    let mut settings = Settings::default();

    if let Some(v) = file_cfg.base_url {
        settings.client.base_url = normalize_base_url(&v)?;
    }
    if let Some(ms) = file_cfg.poll_interval_ms {
        settings.client.poll_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = file_cfg.notification_ttl_ms {
        settings.client.notification_ttl = Duration::from_millis(ms);
    }
    if let Some(secs) = file_cfg.request_timeout_secs {
        settings.client.request_timeout = Some(Duration::from_secs(secs));
    }
    if let Some(dir) = file_cfg.data_dir {
        settings.data_dir = dir;
    }

    if let Some(v) = env("NEWSDESK_BASE_URL") {
        settings.client.base_url = normalize_base_url(&v)?;
    }
    if let Some(v) = env("APP__BASE_URL") {
        settings.client.base_url = normalize_base_url(&v)?;
    }

    if let Some(ms) = parse_env_number(&env, "APP__POLL_INTERVAL_MS") {
        settings.client.poll_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = parse_env_number(&env, "APP__NOTIFICATION_TTL_MS") {
        settings.client.notification_ttl = Duration::from_millis(ms);
    }
    if let Some(secs) = parse_env_number(&env, "APP__REQUEST_TIMEOUT_SECS") {
        settings.client.request_timeout = Some(Duration::from_secs(secs));
    }

    if let Some(v) = env("NEWSDESK_DATA_DIR") {
        settings.data_dir = PathBuf::from(v);
    }
    if let Some(v) = env("APP__DATA_DIR") {
        settings.data_dir = PathBuf::from(v);
    }

    if settings.client.poll_interval.is_zero() {
        bail!("poll interval must be greater than zero");
    }

    Ok(settings)
}

fn read_file_config(path: Option<&Path>) -> anyhow::Result<FileConfig> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(FileConfig::default())
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    };
    toml::from_str(&raw).with_context(|| format!("invalid config file '{}'", path.display()))
}

fn parse_env_number(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = env(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "config: ignoring non-numeric override");
            None
        }
    }
}

fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    let url = Url::parse(raw).with_context(|| format!("invalid base url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("base url '{raw}' must use http or https");
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("newsdesk-config-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("dir");
        let path = dir.join(name);
        fs::write(&path, contents).expect("write");
        path
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let settings = load_settings_with(None, env_from(&[])).expect("settings");
        assert_eq!(settings.client, ClientConfig::default());
        assert!(settings.data_dir.ends_with("newsdesk"));
    }

    #[test]
    fn file_values_are_read_then_env_overrides_them() {
        let path = temp_file(
            "layered.toml",
            r#"
base_url = "http://backend.local:5678/"
poll_interval_ms = 2500
request_timeout_secs = 30
data_dir = "/var/lib/newsdesk"
"#,
        );
        let settings = load_settings_with(
            Some(&path),
            env_from(&[
                ("APP__BASE_URL", "https://news.example"),
                ("APP__NOTIFICATION_TTL_MS", "1500"),
            ]),
        )
        .expect("settings");

        assert_eq!(settings.client.base_url, "https://news.example");
        assert_eq!(settings.client.poll_interval, Duration::from_millis(2500));
        assert_eq!(settings.client.notification_ttl, Duration::from_millis(1500));
        assert_eq!(settings.client.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.data_dir, PathBuf::from("/var/lib/newsdesk"));
    }

    #[test]
    fn prefixed_env_wins_over_plain_name() {
        let settings = load_settings_with(
            None,
            env_from(&[
                ("NEWSDESK_BASE_URL", "http://plain.local"),
                ("APP__BASE_URL", "http://prefixed.local"),
                ("NEWSDESK_DATA_DIR", "/tmp/plain"),
            ]),
        )
        .expect("settings");
        assert_eq!(settings.client.base_url, "http://prefixed.local");
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/plain"));
    }

    #[test]
    fn non_numeric_override_is_ignored() {
        let settings = load_settings_with(None, env_from(&[("APP__POLL_INTERVAL_MS", "soon")]))
            .expect("settings");
        assert_eq!(settings.client.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("newsdesk-no-such-config.toml");
        assert!(load_settings_with(Some(&path), env_from(&[])).is_err());
    }

    #[test]
    fn bad_base_url_and_zero_interval_are_rejected() {
        assert!(load_settings_with(None, env_from(&[("APP__BASE_URL", "ftp://x")])).is_err());
        assert!(load_settings_with(None, env_from(&[("APP__POLL_INTERVAL_MS", "0")])).is_err());
    }

    #[test]
    fn flags_override_loaded_settings() {
        let mut settings = Settings::default();
        settings
            .apply_flags(Some("http://flag.local/"), Some(PathBuf::from("/srv/desk")))
            .expect("flags");
        assert_eq!(settings.client.base_url, "http://flag.local");
        assert_eq!(settings.session_path(), PathBuf::from("/srv/desk/session.json"));
    }
}
