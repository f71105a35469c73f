//! Operator configuration file handling
//!
//! TOML file holding deployment settings: logging, the contract version
//! registry and the default snapshot location. Nothing here changes how
//! events are interpreted beyond choosing the ABI generation per address.

use govledger::chain::{ContractVersion, VersionEntry, VersionRegistry, DEFAULT_VERSION_TAG};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Default snapshot file name, relative to the data directory.
const DEFAULT_SNAPSHOT_FILE: &str = "govledger.snapshot";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub contracts: ContractsConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

/// Contract generations, keyed by address membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    #[serde(default = "default_version_tag")]
    pub default_version: String,

    #[serde(default)]
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_version_tag() -> String {
    DEFAULT_VERSION_TAG.to_string()
}

fn default_snapshot_path() -> PathBuf {
    default_data_dir().join(DEFAULT_SNAPSHOT_FILE)
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            default_version: default_version_tag(),
            versions: Vec::new(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

impl ContractsConfig {
    pub fn registry(&self) -> VersionRegistry {
        VersionRegistry::from_entries(
            ContractVersion::new(self.default_version.clone()),
            &self.versions,
        )
    }
}

impl LedgerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: LedgerConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Load `path` if given, else the default path if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::load(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(snapshot_path: &Path) -> String {
        format!(
            r#"# Governance ledger configuration

[logging]
# Log level: trace, debug, info, warn, error
# RUST_LOG overrides this when set.
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/govledger/govledger.log"

[contracts]
# Generation assumed for any address not listed below
default_version = "{default_version}"

# One entry per contract generation. Controller addresses listed here are
# read with that generation's ABI.
# [[contracts.versions]]
# tag = "0.0.1-rc.16"
# addresses = ["0x0000000000000000000000000000000000000000"]

[snapshot]
# CBOR snapshot written by `replay` and read by `show`
path = "{snapshot_path}"
"#,
            default_version = DEFAULT_VERSION_TAG,
            snapshot_path = snapshot_path.display()
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(
        config_path: &Path,
        snapshot_path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml(snapshot_path);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

/// `<data_dir>/govledger`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("govledger")
}

/// `<data_dir>/govledger/config.toml`
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}
