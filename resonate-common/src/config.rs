//! Configuration loading and root folder resolution
//!
//! Resolution order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or malformed TOML file is never fatal: a warning is logged and
//! the compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "RESONATE_ROOT_FOLDER";

/// Environment variable pointing at an explicit TOML config file
pub const CONFIG_FILE_ENV: &str = "RESONATE_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "resonate.db";

/// Longest accepted session lifetime (ten years)
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. "info" or "resonate_web=debug"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// On-disk TOML configuration. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub session_ttl_hours: Option<i64>,
    pub debug: Option<bool>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
    }

    /// Parse a TOML config file, falling back to defaults on any failure
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let (config, problem) = Self::load_or_report(path);
        if let Some(problem) = problem {
            warn!("{}", problem);
        }
        config
    }

    /// Like `load_or_default`, but hands the fallback reason to the caller
    ///
    /// Used before the tracing subscriber exists, when a `warn!` would be lost.
    pub fn load_or_report(path: Option<&Path>) -> (Self, Option<String>) {
        let Some(path) = path else {
            debug!("No config file found, using compiled defaults");
            return (Self::default(), None);
        };

        match Self::load(path) {
            Ok(config) => {
                debug!("Loaded config file {}", path.display());
                (config, None)
            }
            Err(e) => (
                Self::default(),
                Some(format!("Ignoring config file {}: {}", path.display(), e)),
            ),
        }
    }
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub session_ttl_hours: i64,
    pub debug: bool,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "linux") {
            // ~/.local/share/resonate
            dirs::data_local_dir()
                .map(|d| d.join("resonate"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/resonate"))
        } else if cfg!(target_os = "macos") {
            // ~/Library/Application Support/resonate
            dirs::data_dir()
                .map(|d| d.join("resonate"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/resonate"))
        } else if cfg!(target_os = "windows") {
            // %LOCALAPPDATA%\resonate
            dirs::data_local_dir()
                .map(|d| d.join("resonate"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\resonate"))
        } else {
            PathBuf::from("./resonate_data")
        };

        Self {
            root_folder,
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
            session_ttl_hours: 24 * 14,
            debug: true,
            log_level: default_log_level(),
        }
    }
}

/// Locate the TOML config file for a module
///
/// `RESONATE_CONFIG` wins; otherwise `<config_dir>/resonate/<module>.toml`,
/// then `/etc/resonate/<module>.toml` on Linux.
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    let file_name = format!("{}.toml", module_name);
    let user_config = dirs::config_dir().map(|d| d.join("resonate").join(&file_name));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/resonate").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolves the root folder (holding the database) for a module
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
        }
    }

    /// Supply the `--root-folder` command-line value, if any
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // Priority 2: Environment variables
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            return PathBuf::from(path);
        }

        // Priority 3: TOML config file
        let config = TomlConfig::load_or_default(config_file_path(&self.module_name).as_deref());
        if let Some(root_folder) = config.root_folder {
            return root_folder;
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Prepares the resolved root folder for use
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}

/// Values supplied on the command line (or their clap `env` fallbacks)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

/// Fully resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub session_ttl_hours: i64,
    pub debug: bool,
    pub log_level: String,
    /// Fallbacks taken while loading, for the caller to log once tracing is up
    pub warnings: Vec<String>,
}

impl ServerConfig {
    /// Merge overrides, the module's TOML file and compiled defaults
    ///
    /// Nothing is logged here; problems with the file or its values end up in
    /// `warnings`.
    pub fn load(module_name: &str, overrides: ConfigOverrides) -> Self {
        let (toml, problem) = TomlConfig::load_or_report(config_file_path(module_name).as_deref());
        let mut config = Self::merge(module_name, overrides, toml);
        if let Some(problem) = problem {
            config.warnings.insert(0, problem);
        }
        config
    }

    pub fn merge(module_name: &str, overrides: ConfigOverrides, toml: TomlConfig) -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        let mut warnings = Vec::new();

        let root_folder = match overrides.root_folder {
            Some(path) => path,
            None if std::env::var(ROOT_FOLDER_ENV).is_ok() => RootFolderResolver::new(module_name).resolve(),
            None => toml.root_folder.unwrap_or(defaults.root_folder),
        };

        let session_ttl_hours = match toml.session_ttl_hours {
            Some(hours) if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) => hours,
            Some(hours) => {
                warnings.push(format!(
                    "Ignoring session_ttl_hours = {}: must be between 1 and {}; using {}",
                    hours, MAX_SESSION_TTL_HOURS, defaults.session_ttl_hours
                ));
                defaults.session_ttl_hours
            }
            None => defaults.session_ttl_hours,
        };

        Self {
            root_folder,
            bind_address: overrides
                .bind_address
                .or(toml.bind_address)
                .unwrap_or(defaults.bind_address),
            port: overrides.port.or(toml.port).unwrap_or(defaults.port),
            session_ttl_hours,
            debug: toml.debug.unwrap_or(defaults.debug),
            log_level: overrides.log_level.unwrap_or(toml.logging.level),
            warnings,
        }
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
