//! Configuration for the cartridge sync agent.
//!
//! The agent reads a JSON configuration file (`sync.json` by default) that
//! describes the remote instance, the local cartridge root, and the watch
//! behavior:
//!
//! ```json
//! {
//!     "hostname": "dev01.example.demandware.net",
//!     "username": "deploy",
//!     "password": "secret",
//!     "code-version": "v1",
//!     "cartridges": "app/cartridge",
//!     "watch": {
//!         "ignored_dirs": ["app/cartridge/static"],
//!         "build_exceptions": [
//!             { "pattern": "scss", "command": "npx gulp css" }
//!         ]
//!     }
//! }
//! ```
//!
//! The `watch.ignored_dirs` and `watch.build_exceptions` fields go through a
//! lenient normalization pass: an absent, null, or non-array value becomes an
//! empty list, and array entries that do not match the expected shape are
//! skipped. This pass never fails — only an unreadable file or invalid JSON
//! is a configuration error. Other missing fields (cartridge root, code
//! version, hostname) are surfaced later, when the watch session or the
//! transport is built.
//!
//! The WebDAV password may be supplied via the `CARTSYNC_PASSWORD`
//! environment variable, which takes precedence over the config file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

/// Environment variable overriding the config-file password.
pub const PASSWORD_ENV_VAR: &str = "CARTSYNC_PASSWORD";

/// Default configuration file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "sync.json";

/// Errors that can occur while loading the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A build-exception rule: a path pattern and the command to run instead of
/// uploading.
///
/// Matching is substring containment of `pattern` within the changed file's
/// relative path — deliberately not glob and not regex, for compatibility
/// with existing configurations. Short patterns will match many paths.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildExceptionRule {
    /// Substring matched against the changed file's relative path.
    pub pattern: String,
    /// Shell command executed inside the builder directory on a match.
    pub command: String,
}

/// Raw `watch` section as it appears in the file.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawWatchSection {
    #[serde(default, deserialize_with = "lenient_seq")]
    ignored_dirs: Vec<PathBuf>,
    #[serde(default, deserialize_with = "lenient_seq")]
    build_exceptions: Vec<BuildExceptionRule>,
}

/// Raw configuration file shape. Every field defaults so that shape problems
/// beyond invalid JSON never fail the load.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default, rename = "code-version")]
    code_version: String,
    #[serde(default)]
    cartridges: PathBuf,
    #[serde(default)]
    watch: Option<RawWatchSection>,
}

/// Normalized watch configuration. Constructed once at startup and immutable
/// thereafter.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Local cartridge root to watch, relative to the working directory.
    pub cartridges_path: PathBuf,

    /// Remote code version the uploads are organized under.
    pub code_version: String,

    /// Remote instance hostname.
    pub hostname: String,

    /// WebDAV username.
    pub username: String,

    /// WebDAV password (config file, or `CARTSYNC_PASSWORD` if set).
    pub password: String,

    /// Local directories excluded from watching, relative to the working
    /// directory. Always a sequence after normalization.
    pub ignored_dirs: Vec<PathBuf>,

    /// Ordered build-exception rules. Always a sequence after normalization.
    pub build_exceptions: Vec<BuildExceptionRule>,

    /// Suppress file-changed / file-uploaded notifications.
    pub silent: bool,

    /// Show the persistent status line.
    pub show_progress: bool,
}

impl WatchConfig {
    /// Loads and normalizes the configuration from a JSON file.
    ///
    /// `silent` and `show_progress` come from the CLI rather than the file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or is not valid
    /// JSON. Malformed `watch` lists are normalized, never an error.
    pub fn load(path: &Path, silent: bool, show_progress: bool) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let raw: RawConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self::from_raw(raw, silent, show_progress))
    }

    fn from_raw(raw: RawConfig, silent: bool, show_progress: bool) -> Self {
        let watch = raw.watch.unwrap_or_default();

        let password = match env::var(PASSWORD_ENV_VAR) {
            Ok(value) if !value.is_empty() => {
                debug!("using password from {PASSWORD_ENV_VAR}");
                value
            }
            _ => raw.password,
        };

        Self {
            cartridges_path: raw.cartridges,
            code_version: raw.code_version,
            hostname: raw.hostname,
            username: raw.username,
            password,
            ignored_dirs: watch.ignored_dirs,
            build_exceptions: watch.build_exceptions,
            silent,
            show_progress,
        }
    }
}

/// Deserializes a sequence leniently: absent, null, or any non-array value
/// becomes an empty vector, and array entries of the wrong shape are
/// skipped. Never fails.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(json: &str) -> WatchConfig {
        let raw: RawConfig = serde_json::from_str(json).expect("valid JSON");
        WatchConfig::from_raw(raw, false, true)
    }

    #[test]
    fn full_config_parses() {
        let config = parse(
            r#"{
                "hostname": "dev01.example.demandware.net",
                "username": "deploy",
                "password": "secret",
                "code-version": "v1",
                "cartridges": "app/cartridge",
                "watch": {
                    "ignored_dirs": ["app/cartridge/static"],
                    "build_exceptions": [
                        { "pattern": "scss", "command": "npx gulp css" }
                    ]
                }
            }"#,
        );

        assert_eq!(config.hostname, "dev01.example.demandware.net");
        assert_eq!(config.code_version, "v1");
        assert_eq!(config.cartridges_path, PathBuf::from("app/cartridge"));
        assert_eq!(
            config.ignored_dirs,
            vec![PathBuf::from("app/cartridge/static")]
        );
        assert_eq!(
            config.build_exceptions,
            vec![BuildExceptionRule {
                pattern: "scss".to_string(),
                command: "npx gulp css".to_string(),
            }]
        );
    }

    #[test]
    fn missing_watch_section_normalizes_to_empty() {
        let config = parse(r#"{ "hostname": "h", "code-version": "v1" }"#);
        assert!(config.ignored_dirs.is_empty());
        assert!(config.build_exceptions.is_empty());
    }

    #[test]
    fn non_array_lists_normalize_to_empty() {
        let config = parse(
            r#"{
                "watch": {
                    "ignored_dirs": "not-an-array",
                    "build_exceptions": 42
                }
            }"#,
        );
        assert!(config.ignored_dirs.is_empty());
        assert!(config.build_exceptions.is_empty());
    }

    #[test]
    fn null_lists_normalize_to_empty() {
        let config = parse(
            r#"{
                "watch": {
                    "ignored_dirs": null,
                    "build_exceptions": null
                }
            }"#,
        );
        assert!(config.ignored_dirs.is_empty());
        assert!(config.build_exceptions.is_empty());
    }

    #[test]
    fn malformed_array_entries_are_skipped() {
        let config = parse(
            r#"{
                "watch": {
                    "build_exceptions": [
                        { "pattern": "scss", "command": "npx gulp css" },
                        "bogus",
                        { "pattern": 1 }
                    ]
                }
            }"#,
        );
        assert_eq!(config.build_exceptions.len(), 1);
        assert_eq!(config.build_exceptions[0].pattern, "scss");
    }

    #[test]
    fn missing_identity_fields_default_without_error() {
        let config = parse("{}");
        assert!(config.hostname.is_empty());
        assert!(config.code_version.is_empty());
        assert_eq!(config.cartridges_path, PathBuf::new());
    }

    #[test]
    fn load_reports_unreadable_file() {
        let result = WatchConfig::load(Path::new("/nonexistent/sync.json"), false, true);
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn load_reports_invalid_json() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "{{ not json").expect("write");

        let result = WatchConfig::load(file.path(), false, true);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn load_reads_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{ "hostname": "h", "code-version": "v2", "cartridges": "app/cartridge" }}"#
        )
        .expect("write");

        let config = WatchConfig::load(file.path(), true, false).expect("load");
        assert_eq!(config.code_version, "v2");
        assert!(config.silent);
        assert!(!config.show_progress);
    }

    #[test]
    #[serial]
    fn env_password_overrides_file() {
        env::set_var(PASSWORD_ENV_VAR, "from-env");
        let config = parse(r#"{ "password": "from-file" }"#);
        env::remove_var(PASSWORD_ENV_VAR);

        assert_eq!(config.password, "from-env");
    }

    #[test]
    #[serial]
    fn file_password_used_without_env() {
        env::remove_var(PASSWORD_ENV_VAR);
        let config = parse(r#"{ "password": "from-file" }"#);
        assert_eq!(config.password, "from-file");
    }

    #[test]
    #[serial]
    fn empty_env_password_ignored() {
        env::set_var(PASSWORD_ENV_VAR, "");
        let config = parse(r#"{ "password": "from-file" }"#);
        env::remove_var(PASSWORD_ENV_VAR);

        assert_eq!(config.password, "from-file");
    }
}
