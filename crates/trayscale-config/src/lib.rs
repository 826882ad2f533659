//! Persistent preferences for Trayscale.
//!
//! The user-facing preferences (tray icon, polling interval, control
//! server) plus daemon connection settings, layered from defaults,
//! `settings.toml` and `TRAYSCALE_*` environment variables, and translated
//! to `trayscale_core::DaemonConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use trayscale_core::config::{DEFAULT_COMMAND, DEFAULT_CONTROL_URL, DEFAULT_SOCKET};
use trayscale_core::poller::{DEFAULT_INTERVAL, MIN_INTERVAL};
use trayscale_core::{DaemonConfig, Endpoint};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Everything persisted between runs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Run the tray.
    #[serde(default = "default_tray_icon")]
    pub tray_icon: bool,

    /// Seconds between polls. Read through [`Settings::polling_interval`].
    #[serde(default = "default_polling_interval")]
    pub polling_interval: f64,

    /// Control server URL; empty means the public one.
    #[serde(default)]
    pub control_plane_server: String,

    #[serde(default)]
    pub daemon: DaemonSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tray_icon: default_tray_icon(),
            polling_interval: default_polling_interval(),
            control_plane_server: String::new(),
            daemon: DaemonSettings::default(),
        }
    }
}

fn default_tray_icon() -> bool {
    true
}
fn default_polling_interval() -> f64 {
    DEFAULT_INTERVAL.as_secs_f64()
}

/// How to reach the local daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DaemonSettings {
    /// Local API socket.
    #[serde(default = "default_socket")]
    pub socket: PathBuf,

    /// Plain HTTP base URL used instead of the socket when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// CLI binary.
    #[serde(default = "default_command")]
    pub command: String,

    /// Seconds allowed for one local API request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            socket: default_socket(),
            url: None,
            command: default_command(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_socket() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET)
}
fn default_command() -> String {
    DEFAULT_COMMAND.into()
}
fn default_request_timeout() -> u64 {
    30
}

impl Settings {
    /// The polling interval, never shorter than one second. Negative, NaN
    /// and overflowing values read as the minimum.
    pub fn polling_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.polling_interval)
            .unwrap_or(MIN_INTERVAL)
            .max(MIN_INTERVAL)
    }

    pub fn set_polling_interval(&mut self, interval: Duration) {
        self.polling_interval = interval.max(MIN_INTERVAL).as_secs_f64();
    }

    /// The control server the daemon should use.
    pub fn control_url(&self) -> &str {
        match self.control_plane_server.trim() {
            "" => DEFAULT_CONTROL_URL,
            url => url,
        }
    }

    /// Check a control server entered by the user. Empty is accepted and
    /// means the default.
    pub fn validate_control_url(raw: &str) -> Result<(), ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(());
        }
        let url: url::Url = raw.parse().map_err(|e| ConfigError::Validation {
            field: "control-plane-server".into(),
            reason: format!("{raw:?} is not a URL: {e}"),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                field: "control-plane-server".into(),
                reason: format!("expected an http or https URL, got {raw:?}"),
            });
        }
        Ok(())
    }

    /// Connection settings for `trayscale_core::LocalDaemon`.
    pub fn daemon_config(&self) -> Result<DaemonConfig, ConfigError> {
        let endpoint = match &self.daemon.url {
            Some(raw) => Endpoint::Http(raw.parse().map_err(|_| ConfigError::Validation {
                field: "daemon.url".into(),
                reason: format!("invalid URL: {raw}"),
            })?),
            None => Endpoint::UnixSocket(self.daemon.socket.clone()),
        };

        if self.daemon.command.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "daemon.command".into(),
                reason: "must not be empty".into(),
            });
        }

        Ok(DaemonConfig {
            endpoint,
            command: self.daemon.command.clone(),
            request_timeout: Duration::from_secs(self.daemon.request_timeout.max(1)),
        })
    }
}

// ── Settings file path ──────────────────────────────────────────────

/// Resolve the settings file path via XDG / platform conventions.
pub fn settings_path() -> PathBuf {
    ProjectDirs::from("dev", "deedles", "Trayscale").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("settings.toml");
            p
        },
        |dirs| dirs.config_dir().join("settings.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("trayscale");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load settings from the canonical path and the environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&settings_path())
}

/// Load settings from `path` and the environment. A missing file is not
/// an error.
///
/// `TRAYSCALE_POLLING_INTERVAL=2` sets `polling-interval`; nested keys use a
/// double underscore, as in `TRAYSCALE_DAEMON__COMMAND`.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed("TRAYSCALE_")
                .split("__")
                .map(|key| key.as_str().replace('_', "-").into()),
        );

    let settings: Settings = figment.extract()?;
    Ok(settings)
}

// ── Saving ──────────────────────────────────────────────────────────

/// Serialize settings to TOML and write to the canonical path.
pub fn save_settings(settings: &Settings) -> Result<(), ConfigError> {
    save_settings_to(&settings_path(), settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(settings)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_| {
            let settings = load_settings_from(Path::new("absent.toml")).map_err(|e| e.to_string())?;
            assert_eq!(settings, Settings::default());
            assert!(settings.tray_icon);
            assert_eq!(settings.polling_interval(), Duration::from_secs(5));
            assert_eq!(settings.control_url(), DEFAULT_CONTROL_URL);
            Ok(())
        });
    }

    #[test]
    fn file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "settings.toml",
                r#"
                    tray-icon = false
                    polling-interval = 10.0
                    control-plane-server = "https://headscale.example.com"

                    [daemon]
                    command = "/usr/local/bin/tailscale"
                "#,
            )?;
            jail.set_env("TRAYSCALE_POLLING_INTERVAL", "2");
            jail.set_env("TRAYSCALE_DAEMON__REQUEST_TIMEOUT", "7");

            let settings =
                load_settings_from(Path::new("settings.toml")).map_err(|e| e.to_string())?;
            assert!(!settings.tray_icon);
            assert_eq!(settings.polling_interval(), Duration::from_secs(2));
            assert_eq!(settings.control_url(), "https://headscale.example.com");
            assert_eq!(settings.daemon.command, "/usr/local/bin/tailscale");
            assert_eq!(settings.daemon.request_timeout, 7);
            assert_eq!(settings.daemon.socket, PathBuf::from(DEFAULT_SOCKET));
            Ok(())
        });
    }

    #[test]
    fn polling_interval_is_clamped() {
        let mut settings = Settings {
            polling_interval: 0.25,
            ..Settings::default()
        };
        assert_eq!(settings.polling_interval(), MIN_INTERVAL);

        settings.polling_interval = -3.0;
        assert_eq!(settings.polling_interval(), MIN_INTERVAL);

        settings.polling_interval = f64::NAN;
        assert_eq!(settings.polling_interval(), MIN_INTERVAL);

        settings.set_polling_interval(Duration::from_millis(1500));
        assert!((settings.polling_interval - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let settings = Settings {
            tray_icon: false,
            polling_interval: 3.0,
            control_plane_server: "https://headscale.example.com".into(),
            daemon: DaemonSettings {
                url: Some("http://127.0.0.1:41112".into()),
                ..DaemonSettings::default()
            },
        };

        save_settings_to(&path, &settings).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("polling-interval = 3.0"));
        assert!(text.contains("[daemon]"));

        Jail::expect_with(|_| {
            let loaded = load_settings_from(&path).map_err(|e| e.to_string())?;
            assert_eq!(loaded, settings);
            Ok(())
        });
    }

    #[test]
    fn daemon_config_prefers_http_url() {
        let mut settings = Settings::default();
        let config = settings.daemon_config().unwrap();
        assert_eq!(
            config.endpoint,
            Endpoint::UnixSocket(PathBuf::from(DEFAULT_SOCKET))
        );
        assert_eq!(config.request_timeout, Duration::from_secs(30));

        settings.daemon.url = Some("http://127.0.0.1:41112".into());
        let config = settings.daemon_config().unwrap();
        assert!(matches!(config.endpoint, Endpoint::Http(ref url) if url.port() == Some(41112)));

        settings.daemon.url = Some("not a url".into());
        assert!(matches!(
            settings.daemon_config(),
            Err(ConfigError::Validation { ref field, .. }) if field == "daemon.url"
        ));
    }

    #[test]
    fn control_url_validation() {
        assert!(Settings::validate_control_url("").is_ok());
        assert!(Settings::validate_control_url(" https://headscale.example.com ").is_ok());
        assert!(Settings::validate_control_url("headscale").is_err());
        assert!(Settings::validate_control_url("ftp://example.com").is_err());
    }
}
