use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_HERMES_CONFIG: &str = "HERMES_CONFIG";
pub const ENV_HERMES_BIN_DIR: &str = "HERMES_BIN_DIR";

const APP_DIR_NAME: &str = "hermes";
const CONFIG_FILE_NAME: &str = "config.toml";
const HISTORY_FILE_NAME: &str = "transfers.json";
const LOG_FILE_NAME: &str = "hermes.log";
const DEFAULT_BIN_DIR_NAME: &str = "bin";
const DEFAULT_RECEIVE_PORT: u16 = 7654;
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 600;
const DEFAULT_SAVE_DIR_NAME: &str = "Downloads";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HermesConfig {
    #[serde(default = "default_bin_dir")]
    pub bin_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zend_binary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zenc_binary: Option<String>,
    #[serde(default = "default_history_path")]
    pub history_path: String,
    #[serde(default = "default_log_path")]
    pub log_path: String,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    #[serde(default)]
    pub receive: ReceiveConfigToml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceiveConfigToml {
    #[serde(default = "default_receive_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(default = "default_save_dir")]
    pub default_save_dir: String,
}

/// Resolved engine locations: explicit per-binary paths win over `bin_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRuntimeConfig {
    pub bin_dir: PathBuf,
    pub zend_binary: Option<PathBuf>,
    pub zenc_binary: Option<PathBuf>,
    pub send_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRuntimeConfig {
    pub port: u16,
    pub output_dir: Option<PathBuf>,
    pub default_save_dir: PathBuf,
}

impl HermesConfig {
    pub fn engine_runtime(&self) -> EngineRuntimeConfig {
        EngineRuntimeConfig {
            bin_dir: PathBuf::from(&self.bin_dir),
            zend_binary: non_blank_path(self.zend_binary.as_deref()),
            zenc_binary: non_blank_path(self.zenc_binary.as_deref()),
            send_timeout_secs: self.send_timeout_secs,
        }
    }

    pub fn receive_runtime(&self) -> ReceiveRuntimeConfig {
        ReceiveRuntimeConfig {
            port: self.receive.port,
            output_dir: non_blank_path(self.receive.output_dir.as_deref()),
            default_save_dir: PathBuf::from(&self.receive.default_save_dir),
        }
    }

    pub fn history_path(&self) -> PathBuf {
        PathBuf::from(&self.history_path)
    }

    pub fn log_path(&self) -> PathBuf {
        PathBuf::from(&self.log_path)
    }

    /// Applies `HERMES_BIN_DIR` when it is set to a non-blank value.
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        match std::env::var(ENV_HERMES_BIN_DIR) {
            Ok(raw) if !raw.trim().is_empty() => {
                self.bin_dir = raw.trim().to_owned();
                Ok(())
            }
            Ok(_) | Err(std::env::VarError::NotPresent) => Ok(()),
            Err(_) => Err(ConfigError::configuration(
                "HERMES_BIN_DIR contained invalid UTF-8",
            )),
        }
    }
}

pub fn load_from_env() -> ConfigResult<HermesConfig> {
    let path = config_path_from_env()?;
    load_from_path(path)
}

/// Loads the file at `path`, writing a default config there first when it is missing.
pub fn load_from_path(path: impl AsRef<Path>) -> ConfigResult<HermesConfig> {
    let mut config = load_or_create_config(path.as_ref())?;
    config.apply_env_overrides()?;
    Ok(config)
}

pub fn default_config_path() -> ConfigResult<PathBuf> {
    Ok(hermes_config_dir()?.join(CONFIG_FILE_NAME))
}

/// `~/.config/hermes`, shared by the config, history, log and identity exports.
pub fn hermes_config_dir() -> ConfigResult<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::configuration("Unable to resolve home directory")
    })?;
    Ok(home.join(".config").join(APP_DIR_NAME))
}

fn config_path_from_env() -> ConfigResult<PathBuf> {
    match std::env::var(ENV_HERMES_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::configuration(
            "HERMES_CONFIG contained invalid UTF-8",
        )),
    }
}

fn non_blank_path(value: Option<&str>) -> Option<PathBuf> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn fallback_config_dir() -> PathBuf {
    hermes_config_dir().unwrap_or_else(|_| std::env::temp_dir().join(APP_DIR_NAME))
}

fn default_bin_dir() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_BIN_DIR_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BIN_DIR_NAME))
        .to_string_lossy()
        .to_string()
}

fn default_history_path() -> String {
    fallback_config_dir()
        .join(HISTORY_FILE_NAME)
        .to_string_lossy()
        .to_string()
}

fn default_log_path() -> String {
    fallback_config_dir()
        .join(LOG_FILE_NAME)
        .to_string_lossy()
        .to_string()
}

fn default_send_timeout_secs() -> u64 {
    DEFAULT_SEND_TIMEOUT_SECS
}

fn default_receive_port() -> u16 {
    DEFAULT_RECEIVE_PORT
}

fn default_save_dir() -> String {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_SAVE_DIR_NAME))
        .or_else(dirs::download_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_DIR_NAME))
        .to_string_lossy()
        .to_string()
}

impl Default for ReceiveConfigToml {
    fn default() -> Self {
        Self {
            port: default_receive_port(),
            output_dir: None,
            default_save_dir: default_save_dir(),
        }
    }
}

impl Default for HermesConfig {
    fn default() -> Self {
        Self {
            bin_dir: default_bin_dir(),
            zend_binary: None,
            zenc_binary: None,
            history_path: default_history_path(),
            log_path: default_log_path(),
            send_timeout_secs: default_send_timeout_secs(),
            receive: ReceiveConfigToml::default(),
        }
    }
}

fn persist_config(path: &Path, config: &HermesConfig) -> ConfigResult<()> {
    let rendered = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to serialize HERMES_CONFIG for {}: {err}",
            path.display()
        ))
    })?;

    std::fs::write(path, rendered.as_bytes()).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to write HERMES_CONFIG to {}: {err}",
            path.display()
        ))
    })
}

fn load_or_create_config(path: &Path) -> ConfigResult<HermesConfig> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        ConfigError::configuration(format!(
                            "Failed to create parent directory {} for HERMES_CONFIG: {err}",
                            parent.display()
                        ))
                    })?;
                }
            }

            let default_config = HermesConfig::default();
            persist_config(path, &default_config)?;
            return Ok(default_config);
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read HERMES_CONFIG from {}: {err}",
                path.display()
            )));
        }
    };

    let mut config: HermesConfig = toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse HERMES_CONFIG from {}: {err}",
            path.display()
        ))
    })?;

    if normalize_config(&mut config) {
        persist_config(path, &config)?;
    }

    Ok(config)
}

fn normalize_config(config: &mut HermesConfig) -> bool {
    let mut changed = false;
    changed |= normalize_non_empty_string(&mut config.bin_dir, default_bin_dir());
    changed |= normalize_non_empty_string(&mut config.history_path, default_history_path());
    changed |= normalize_non_empty_string(&mut config.log_path, default_log_path());
    changed |= normalize_non_empty_string(&mut config.receive.default_save_dir, default_save_dir());
    if config.send_timeout_secs == 0 {
        config.send_timeout_secs = DEFAULT_SEND_TIMEOUT_SECS;
        changed = true;
    }
    if config.receive.port == 0 {
        config.receive.port = DEFAULT_RECEIVE_PORT;
        changed = true;
    }
    changed
}

fn normalize_non_empty_string(value: &mut String, default: String) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        *value = default;
        return true;
    }
    if trimmed.len() != value.len() {
        *value = trimmed.to_owned();
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn with_env_vars<F>(vars: &[(&str, Option<&str>)], test: F)
    where
        F: FnOnce(),
    {
        let _guard = env_lock().lock().unwrap_or_else(|poison| poison.into_inner());
        let backup = vars
            .iter()
            .map(|(name, _)| ((*name).to_owned(), std::env::var(name).ok()))
            .collect::<Vec<_>>();

        for (name, value) in vars {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }

        test();

        for (name, value) in backup {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }

    fn write_config_file(path: &Path, raw: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture config parent");
        }
        std::fs::write(path, raw.as_bytes()).expect("write fixture config");
    }

    #[test]
    fn load_from_env_creates_default_config_when_missing() {
        let home = TempDir::new().expect("home dir");
        let expected = home.path().join(".config").join("hermes").join("config.toml");

        with_env_vars(
            &[
                ("HOME", Some(home.path().to_str().expect("home path"))),
                (ENV_HERMES_CONFIG, None),
                (ENV_HERMES_BIN_DIR, None),
            ],
            || {
                let config = load_from_env().expect("load defaults");
                assert_eq!(config.receive.port, 7654);
                assert_eq!(config.send_timeout_secs, 600);
                assert!(config.history_path.ends_with("transfers.json"));
                assert!(expected.exists());
            },
        );
    }

    #[test]
    fn load_from_env_honors_explicit_path_and_treats_blank_as_unset() {
        let home = TempDir::new().expect("home dir");
        let explicit = home.path().join("custom").join("hermes.toml");
        write_config_file(&explicit, "bin_dir = \"/opt/hermes/bin\"\n");

        with_env_vars(
            &[
                ("HOME", Some(home.path().to_str().expect("home path"))),
                (ENV_HERMES_CONFIG, Some(explicit.to_str().expect("explicit path"))),
                (ENV_HERMES_BIN_DIR, None),
            ],
            || {
                let config = load_from_env().expect("load explicit");
                assert_eq!(config.bin_dir, "/opt/hermes/bin");
            },
        );

        with_env_vars(
            &[
                ("HOME", Some(home.path().to_str().expect("home path"))),
                (ENV_HERMES_CONFIG, Some("  ")),
                (ENV_HERMES_BIN_DIR, None),
            ],
            || {
                load_from_env().expect("load default path");
                assert!(home
                    .path()
                    .join(".config")
                    .join("hermes")
                    .join("config.toml")
                    .exists());
            },
        );
    }

    #[test]
    fn bin_dir_env_override_wins_over_file() {
        let root = TempDir::new().expect("root");
        let path = root.path().join("config.toml");
        write_config_file(&path, "bin_dir = \"/from/file\"\n");

        with_env_vars(&[(ENV_HERMES_BIN_DIR, Some("/from/env"))], || {
            let config = load_from_path(&path).expect("load");
            assert_eq!(config.bin_dir, "/from/env");
        });
    }

    #[test]
    fn runtime_slices_resolve_optional_paths() {
        let root = TempDir::new().expect("root");
        let path = root.path().join("config.toml");
        write_config_file(
            &path,
            r#"
bin_dir = "/opt/bin"
zend_binary = "/usr/local/bin/zend"
zenc_binary = "  "
send_timeout_secs = 30

[receive]
port = 9000
output_dir = "/srv/inbox"
default_save_dir = "/home/me/Downloads"
"#,
        );

        with_env_vars(&[(ENV_HERMES_BIN_DIR, None)], || {
            let config = load_from_path(&path).expect("load");
            let engine = config.engine_runtime();
            assert_eq!(engine.bin_dir, PathBuf::from("/opt/bin"));
            assert_eq!(engine.zend_binary, Some(PathBuf::from("/usr/local/bin/zend")));
            assert_eq!(engine.zenc_binary, None);
            assert_eq!(engine.send_timeout_secs, 30);

            let receive = config.receive_runtime();
            assert_eq!(receive.port, 9000);
            assert_eq!(receive.output_dir, Some(PathBuf::from("/srv/inbox")));
            assert_eq!(receive.default_save_dir, PathBuf::from("/home/me/Downloads"));
        });
    }

    #[test]
    fn load_from_path_normalizes_and_persists_invalid_values() {
        let root = TempDir::new().expect("root");
        let path = root.path().join("config.toml");
        write_config_file(
            &path,
            "bin_dir = \"  /opt/bin  \"\nsend_timeout_secs = 0\n[receive]\nport = 0\n",
        );

        with_env_vars(&[(ENV_HERMES_BIN_DIR, None)], || {
            let config = load_from_path(&path).expect("load");
            assert_eq!(config.bin_dir, "/opt/bin");
            assert_eq!(config.send_timeout_secs, 600);
            assert_eq!(config.receive.port, 7654);

            let persisted = std::fs::read_to_string(&path).expect("read persisted");
            assert!(persisted.contains("send_timeout_secs = 600"));
        });
    }

    #[test]
    fn load_from_path_returns_parse_error_for_invalid_toml() {
        let root = TempDir::new().expect("root");
        let path = root.path().join("config.toml");
        write_config_file(&path, "bin_dir = [\n");

        let err = load_from_path(&path).expect_err("invalid toml");
        assert!(err.to_string().starts_with("Failed to parse HERMES_CONFIG"));
    }
}
