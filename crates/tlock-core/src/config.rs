use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{TlockError, TlockResult};

/// Floor for PBKDF2 rounds accepted from configuration.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Top-level configuration (loaded from tlock.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlockConfig {
    pub store: StoreConfig,
    pub crypto: CryptoConfig,
    pub lifecycle: LifecycleConfig,
    pub log: LogConfig,
    /// Warn if the config file is world-readable (default: true)
    pub config_file_mode_check: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON note file (default: ~/.local/share/tlock/notes.json)
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 rounds (default: 100000, minimum 100000).
    /// Notes only open with the count they were locked with.
    pub pbkdf2_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long a revealed note stays readable (default: 1200 = 20 minutes)
    pub view_window_secs: u64,
    /// Re-evaluation cadence in watch mode (default: 1000)
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for TlockConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            crypto: CryptoConfig::default(),
            lifecycle: LifecycleConfig::default(),
            log: LogConfig::default(),
            config_file_mode_check: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/tlock/notes.json"),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: MIN_PBKDF2_ITERATIONS,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            view_window_secs: 20 * 60,
            tick_interval_ms: 1000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl TlockConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> TlockResult<Self> {
        if !path.exists() {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: TlockConfig = toml::from_str(&content)
            .map_err(|e| TlockError::Config(format!("parsing {}: {e}", path.display())))?;

        if config.config_file_mode_check {
            warn_if_world_readable(path);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TlockResult<()> {
        if self.crypto.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            return Err(TlockError::Config(format!(
                "crypto.pbkdf2_iterations must be at least {MIN_PBKDF2_ITERATIONS}, got {}",
                self.crypto.pbkdf2_iterations
            )));
        }
        if self.lifecycle.view_window_secs == 0 {
            return Err(TlockError::Config(
                "lifecycle.view_window_secs must be positive".into(),
            ));
        }
        if self.lifecycle.tick_interval_ms == 0 {
            return Err(TlockError::Config(
                "lifecycle.tick_interval_ms must be positive".into(),
            ));
        }
        match self.log.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(TlockError::Config(format!(
                "log.format must be \"json\" or \"text\", got {other:?}"
            ))),
        }
    }

    /// Store path with a leading `~` expanded against `$HOME`.
    pub fn store_path(&self) -> PathBuf {
        expand_tilde(&self.store.path)
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(unix)]
fn warn_if_world_readable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(meta) = std::fs::metadata(path) {
        if meta.permissions().mode() & 0o004 != 0 {
            tracing::warn!(path = %path.display(), "config file is world-readable");
        }
    }
}

#[cfg(not(unix))]
fn warn_if_world_readable(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
config_file_mode_check = false

[store]
path = "/var/lib/tlock/notes.json"

[crypto]
pbkdf2_iterations = 250000

[lifecycle]
view_window_secs = 600
tick_interval_ms = 500

[log]
level = "debug"
format = "json"
"#;
        let config: TlockConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.store.path, PathBuf::from("/var/lib/tlock/notes.json"));
        assert_eq!(config.crypto.pbkdf2_iterations, 250_000);
        assert_eq!(config.lifecycle.view_window_secs, 600);
        assert_eq!(config.lifecycle.tick_interval_ms, 500);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
        assert!(!config.config_file_mode_check);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_defaults() {
        let config: TlockConfig = toml::from_str("").unwrap();

        assert_eq!(config.crypto.pbkdf2_iterations, 100_000);
        assert_eq!(config.lifecycle.view_window_secs, 1200);
        assert_eq!(config.lifecycle.tick_interval_ms, 1000);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "text");
        assert!(config.config_file_mode_check);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_weak_kdf_rejected() {
        let config: TlockConfig = toml::from_str("[crypto]\npbkdf2_iterations = 1000\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pbkdf2_iterations"));
    }

    #[test]
    fn test_bad_log_format_rejected() {
        let config: TlockConfig = toml::from_str("[log]\nformat = \"xml\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = TlockConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.lifecycle.view_window_secs, 1200);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("tlock.toml");
        std::fs::write(&path, "[crypto\npbkdf2_iterations = ").unwrap();
        assert!(matches!(
            TlockConfig::load(&path),
            Err(TlockError::Config(_))
        ));
    }

    #[test]
    fn test_expand_tilde() {
        let plain = expand_tilde(Path::new("/tmp/notes.json"));
        assert_eq!(plain, PathBuf::from("/tmp/notes.json"));

        if let Some(home) = std::env::var_os("HOME") {
            let expanded = expand_tilde(Path::new("~/notes.json"));
            assert_eq!(expanded, PathBuf::from(home).join("notes.json"));
        }
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = TlockConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: TlockConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.store.path, parsed.store.path);
        assert_eq!(config.crypto.pbkdf2_iterations, parsed.crypto.pbkdf2_iterations);
    }
}
