//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `lodestone-config.yaml` next to the
//! engine binary. Every field has a default, so a missing file or a partial
//! file both load.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lodestone_db::StoreConfig;
use lodestone_world::PlacementSettings;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `lodestone-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LodestoneConfig {
    /// Key store location and pool settings.
    #[serde(default)]
    pub store: StoreSection,

    /// Region generation settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Delta and announcement feed settings.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Background worker pool settings.
    #[serde(default)]
    pub workers: WorkerConfig,

    /// Administrative HTTP API settings.
    #[serde(default)]
    pub admin: AdminConfig,
}

impl LodestoneConfig {
    /// Load configuration from a YAML file, then apply environment overrides:
    /// - `LODESTONE_DB_PATH` overrides `store.path`
    /// - `LODESTONE_ADMIN_PORT` overrides `admin.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML and
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides are
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Apply `LODESTONE_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `LODESTONE_ADMIN_PORT` is not a port.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("LODESTONE_DB_PATH") {
            self.store.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("LODESTONE_ADMIN_PORT") {
            self.admin.port = val
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("LODESTONE_ADMIN_PORT: {e}")))?;
        }
        Ok(())
    }

    /// Reject values the engines cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.max_connections == 0 {
            return Err(ConfigError::Invalid("store.max_connections must be >= 1".to_owned()));
        }
        if self.feed.line_budget == 0 {
            return Err(ConfigError::Invalid("feed.line_budget must be >= 1".to_owned()));
        }
        if self.feed.retention == 0 {
            return Err(ConfigError::Invalid("feed.retention must be >= 1".to_owned()));
        }
        if self.workers.io_workers == 0 {
            return Err(ConfigError::Invalid("workers.io_workers must be >= 1".to_owned()));
        }
        if self.workers.lane_capacity == 0 {
            return Err(ConfigError::Invalid("workers.lane_capacity must be >= 1".to_owned()));
        }
        self.generation
            .placement
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("generation: {e}")))?;
        Ok(())
    }
}

/// Key store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreSection {
    /// SQLite database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Lock wait in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreSection {
    /// Convert into the key store's own configuration type.
    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.path)
            .with_max_connections(self.max_connections)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }
}

/// Region generation configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationConfig {
    /// The only realm whose regions are claimed.
    #[serde(default = "default_realm")]
    pub realm: String,

    /// Vein placement tunables.
    #[serde(flatten)]
    pub placement: PlacementSettings,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            placement: PlacementSettings::default(),
        }
    }
}

/// Delta and announcement feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    /// Delay between a reconnect and the delta computation, in milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Maximum lines per reconnect message set, summary line included.
    #[serde(default = "default_line_budget")]
    pub line_budget: u32,

    /// Number of announcements kept in the feed.
    #[serde(default = "default_retention")]
    pub retention: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            line_budget: default_line_budget(),
            retention: default_retention(),
        }
    }
}

impl FeedConfig {
    /// The settle delay as a [`Duration`].
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Background worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerConfig {
    /// Maximum concurrent background store operations.
    #[serde(default = "default_io_workers")]
    pub io_workers: usize,

    /// Jobs the mutation lane queues before submitters wait.
    #[serde(default = "default_lane_capacity")]
    pub lane_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            io_workers: default_io_workers(),
            lane_capacity: default_lane_capacity(),
        }
    }
}

/// Administrative HTTP API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdminConfig {
    /// Whether the admin API is served at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind host.
    #[serde(default = "default_admin_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_admin_port")]
    pub port: u16,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_admin_host(),
            port: default_admin_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_store_path() -> PathBuf {
    PathBuf::from("lodestone.db")
}

const fn default_max_connections() -> u32 {
    4
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_realm() -> String {
    "overworld".to_owned()
}

const fn default_settle_delay_ms() -> u64 {
    10_000
}

const fn default_line_budget() -> u32 {
    10
}

const fn default_retention() -> u32 {
    10
}

const fn default_io_workers() -> usize {
    4
}

const fn default_lane_capacity() -> usize {
    1_024
}

const fn default_true() -> bool {
    true
}

fn default_admin_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_admin_port() -> u16 {
    8085
}

#[cfg(test)]
mod tests {
    use lodestone_types::Material;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = LodestoneConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.generation.realm, "overworld");
        assert_eq!(config.feed.settle_delay(), Duration::from_secs(10));
        assert_eq!(config.feed.line_budget, 10);
        assert_eq!(config.generation.placement.surface_samples, 12);
        assert_eq!(config.generation.placement.buried_samples, 24);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
store:
  path: /var/lib/lodestone/claims.db
  max_connections: 2
  busy_timeout_ms: 250

generation:
  realm: world
  substrate: deepslate
  surface_chance: 0.1
  surface_samples: 6
  buried_samples: 30

feed:
  settle_delay_ms: 2500
  line_budget: 5
  retention: 20

workers:
  io_workers: 8
  lane_capacity: 32

admin:
  enabled: false
  host: 0.0.0.0
  port: 9000
";
        let config = LodestoneConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.unwrap_or_default();
        assert_eq!(config.store.path, PathBuf::from("/var/lib/lodestone/claims.db"));
        assert_eq!(config.store.max_connections, 2);
        assert_eq!(config.generation.realm, "world");
        assert_eq!(config.generation.placement.substrate, Material::Deepslate);
        assert_eq!(config.generation.placement.marker, Material::Lodestone);
        assert_eq!(config.generation.placement.surface_samples, 6);
        assert_eq!(config.feed.retention, 20);
        assert_eq!(config.workers.io_workers, 8);
        assert_eq!(config.workers.lane_capacity, 32);
        assert!(!config.admin.enabled);
        assert_eq!(config.admin.port, 9000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let config = LodestoneConfig::parse("feed:\n  line_budget: 3\n").unwrap_or_default();
        assert_eq!(config.feed.line_budget, 3);
        assert_eq!(config.feed.retention, 10);
        assert_eq!(config.store.path, PathBuf::from("lodestone.db"));
        assert_eq!(config.workers.lane_capacity, 1_024);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let zero_budget = LodestoneConfig::parse("feed:\n  line_budget: 0\n").unwrap_or_default();
        assert!(matches!(zero_budget.validate(), Err(ConfigError::Invalid(_))));

        let bad_chance =
            LodestoneConfig::parse("generation:\n  surface_chance: 2.0\n").unwrap_or_default();
        assert!(bad_chance.validate().is_err());

        let no_workers = LodestoneConfig::parse("workers:\n  io_workers: 0\n").unwrap_or_default();
        assert!(no_workers.validate().is_err());

        let no_queue =
            LodestoneConfig::parse("workers:\n  lane_capacity: 0\n").unwrap_or_default();
        assert!(no_queue.validate().is_err());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = LodestoneConfig::parse("feed: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn store_section_converts() {
        let section = StoreSection::default();
        let store = section.to_store_config();
        assert_eq!(store.max_connections, 4);
        assert_eq!(store.busy_timeout, Duration::from_secs(5));
    }
}
