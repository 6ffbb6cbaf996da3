//! Settings file – reads/writes `~/.palace/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted user configuration stored in `~/.palace/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database holding saved palaces and quiz results.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// How long a quiz verdict stays on screen, in milliseconds.
    #[serde(default = "default_result_delay_ms")]
    pub result_delay_ms: u64,

    /// Room template used by `/new` when none is named.
    #[serde(default = "default_template")]
    pub default_template: String,

    /// Directory `/export` writes palace files into.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

fn default_data_path() -> PathBuf {
    palace_dir_for_home(&home_dir()).join("palace.db")
}
fn default_result_delay_ms() -> u64 {
    2000
}
fn default_template() -> String {
    "ancient-library".to_string()
}
fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            result_delay_ms: default_result_delay_ms(),
            default_template: default_template(),
            export_dir: default_export_dir(),
        }
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn palace_dir_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".palace")
}

/// Return the path to `~/.palace/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    palace_dir_for_home(home).join("config.toml")
}

/// Load the config from disk with environment overrides applied.
/// Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Load the config from a specific path, as written.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `PALACE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `PALACE_DATA_PATH` | `data_path` |
/// | `PALACE_RESULT_DELAY_MS` | `result_delay_ms` |
/// | `PALACE_DEFAULT_TEMPLATE` | `default_template` |
/// | `PALACE_EXPORT_DIR` | `export_dir` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("PALACE_DATA_PATH") {
        cfg.data_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("PALACE_RESULT_DELAY_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.result_delay_ms = ms;
    }
    if let Ok(v) = std::env::var("PALACE_DEFAULT_TEMPLATE") {
        cfg.default_template = v;
    }
    if let Ok(v) = std::env::var("PALACE_EXPORT_DIR") {
        cfg.export_dir = PathBuf::from(v);
    }
}

/// Save the config to disk, creating `~/.palace/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner-only directory (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_custom_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config {
            data_path: dir.path().join("custom.db"),
            result_delay_ms: 500,
            default_template: "zen-garden".to_string(),
            export_dir: dir.path().join("exports"),
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.data_path, cfg.data_path);
        assert_eq!(loaded.result_delay_ms, 500);
        assert_eq!(loaded.default_template, "zen-garden");
        assert_eq!(loaded.export_dir, cfg.export_dir);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "result_delay_ms = 750\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.result_delay_ms, 750);
        assert_eq!(loaded.default_template, "ancient-library");
        assert_eq!(loaded.export_dir, PathBuf::from("."));
        assert!(loaded.data_path.ends_with(".palace/palace.db"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "result_delay_ms = \"soon\"\n").unwrap();
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn config_path_points_to_palace_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.palace/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    // Each override test touches a distinct variable so parallel tests do
    // not observe each other.

    #[test]
    fn apply_env_overrides_changes_data_path() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("PALACE_DATA_PATH", "/tmp/elsewhere.db") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.data_path, PathBuf::from("/tmp/elsewhere.db"));
        unsafe { std::env::remove_var("PALACE_DATA_PATH") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_delay() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("PALACE_RESULT_DELAY_MS", "later") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.result_delay_ms, 2000);
        unsafe { std::env::set_var("PALACE_RESULT_DELAY_MS", "250") };
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.result_delay_ms, 250);
        unsafe { std::env::remove_var("PALACE_RESULT_DELAY_MS") };
    }

    #[test]
    fn apply_env_overrides_changes_template() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("PALACE_DEFAULT_TEMPLATE", "modern-office") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.default_template, "modern-office");
        unsafe { std::env::remove_var("PALACE_DEFAULT_TEMPLATE") };
    }

    #[test]
    fn apply_env_overrides_changes_export_dir() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("PALACE_EXPORT_DIR", "/tmp/exports") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.export_dir, PathBuf::from("/tmp/exports"));
        unsafe { std::env::remove_var("PALACE_EXPORT_DIR") };
    }
}
