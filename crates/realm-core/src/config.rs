//! Configuration loading and typed config structures for the realm client.
//!
//! The canonical configuration lives in `realm-config.yaml`. An optional
//! local file (`realm-config.local.yaml` by convention) is merged over it
//! key by key, so a developer can override a single nested value without
//! copying the whole document. Every field has a default matching the
//! values the client ships with, so an empty document is a valid config.
//!
//! Backend credentials can be supplied through the environment:
//! - `REALM_BACKEND_URL` overrides `backend.url`
//! - `REALM_BACKEND_ANON_KEY` overrides `backend.anon_key`

use std::collections::BTreeMap;
use std::path::Path;

use realm_types::Rarity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Environment variable overriding `backend.url`.
pub const ENV_BACKEND_URL: &str = "REALM_BACKEND_URL";
/// Environment variable overriding `backend.anon_key`.
pub const ENV_BACKEND_ANON_KEY: &str = "REALM_BACKEND_ANON_KEY";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a configuration file from disk.
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

    /// The merged document does not match the config structure.
    #[error("invalid config structure: {source}")]
    Shape {
        /// The underlying deserialization error.
        source: serde_json::Error,
    },

    /// A value is out of its allowed range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(source: serde_json::Error) -> Self {
        Self::Shape { source }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend endpoint and public key.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Version string shown in the shell.
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Feature toggles.
    #[serde(default)]
    pub features: FeatureFlags,

    /// Static copy shown by the dashboard.
    #[serde(default)]
    pub ui_copy: UiCopy,

    /// Currency rules.
    #[serde(default)]
    pub economy: EconomyRules,

    /// Marketplace filter options.
    #[serde(default)]
    pub marketplace: MarketplaceFilters,

    /// Daily quest rules.
    #[serde(default)]
    pub quests: QuestRules,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Connectivity probing.
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            app_version: default_app_version(),
            features: FeatureFlags::default(),
            ui_copy: UiCopy::default(),
            economy: EconomyRules::default(),
            marketplace: MarketplaceFilters::default(),
            quests: QuestRules::default(),
            logging: LoggingConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load the base file at `path`, merge `local` over it when that file
    /// exists, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the base file cannot be read,
    /// [`ConfigError::Yaml`] if either file is not valid YAML, and
    /// [`ConfigError::Shape`] or [`ConfigError::Invalid`] if the merged
    /// document is not a valid configuration.
    pub fn load(path: &Path, local: Option<&Path>) -> Result<Self, ConfigError> {
        let base = std::fs::read_to_string(path)?;
        let local = match local {
            Some(local) if local.exists() => Some(std::fs::read_to_string(local)?),
            _ => None,
        };
        let mut config = Self::parse_layered(&base, local.as_deref())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string, without environment
    /// overrides.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse_layered(yaml, None)
    }

    /// Parse `base`, deep-merge `local` over it and validate the result.
    pub fn parse_layered(base: &str, local: Option<&str>) -> Result<Self, ConfigError> {
        let mut document = yaml_document(base)?;
        if let Some(local) = local {
            merge_values(&mut document, yaml_document(local)?);
        }
        let config: Self = serde_json::from_value(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `REALM_BACKEND_URL` and `REALM_BACKEND_ANON_KEY`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup; empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.is_empty()) {
            self.backend.url = url;
        }
        if let Some(key) = lookup(ENV_BACKEND_ANON_KEY).filter(|v| !v.is_empty()) {
            self.backend.anon_key = key;
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.economy.stipend_interval_hours <= 0 {
            return Err(ConfigError::Invalid {
                field: "economy.stipend_interval_hours",
                reason: "must be positive".to_owned(),
            });
        }
        if self.economy.marketplace_fee_percent > 100 {
            return Err(ConfigError::Invalid {
                field: "economy.marketplace_fee_percent",
                reason: format!("{} exceeds 100", self.economy.marketplace_fee_percent),
            });
        }
        if self.quests.refresh_hour_utc > 23 {
            return Err(ConfigError::Invalid {
                field: "quests.refresh_hour_utc",
                reason: format!("{} is not an hour of the day", self.quests.refresh_hour_utc),
            });
        }
        if self.logging.history_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "logging.history_capacity",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// An empty document parses as an empty mapping.
fn yaml_document(yaml: &str) -> Result<Value, ConfigError> {
    if yaml.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    let value: Value = serde_yml::from_str(yaml)?;
    Ok(match value {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    })
}

/// Merge `overlay` into `base`: mappings merge recursively, every other
/// value replaces the base value.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://project.supabase.co`.
    #[serde(default)]
    pub url: String,

    /// Public anonymous API key.
    #[serde(default)]
    pub anon_key: String,
}

impl BackendConfig {
    /// Whether both url and key are set.
    pub const fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.anon_key.is_empty()
    }
}

/// Feature toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[expect(clippy::struct_excessive_bools, reason = "one flag per feature")]
pub struct FeatureFlags {
    /// Player-to-player trading.
    #[serde(default = "default_true")]
    pub marketplace: bool,

    /// Daily quests.
    #[serde(default = "default_true")]
    pub quests: bool,

    /// Achievements.
    #[serde(default = "default_true")]
    pub achievements: bool,

    /// Command palette.
    #[serde(default = "default_true")]
    pub command_palette: bool,

    /// Wallet and ledger.
    #[serde(default = "default_true")]
    pub economy: bool,

    /// Seasonal spotlights.
    #[serde(default = "default_true")]
    pub seasonal_events: bool,

    /// Live activity feed.
    #[serde(default)]
    pub realtime_activity: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            marketplace: true,
            quests: true,
            achievements: true,
            command_palette: true,
            economy: true,
            seasonal_events: true,
            realtime_activity: false,
        }
    }
}

/// Static copy shown by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiCopy {
    /// Dashboard heading.
    #[serde(default = "default_welcome_title")]
    pub welcome_title: String,

    /// Dashboard subheading.
    #[serde(default = "default_welcome_subtitle")]
    pub welcome_subtitle: String,
}

impl Default for UiCopy {
    fn default() -> Self {
        Self {
            welcome_title: default_welcome_title(),
            welcome_subtitle: default_welcome_subtitle(),
        }
    }
}

/// Gold and gems granted for converting one duplicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReward {
    /// Gold credited.
    #[serde(default)]
    pub gold: i64,

    /// Gems credited.
    #[serde(default)]
    pub gems: i64,
}

/// Currency rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyRules {
    /// Hours between two daily stipends.
    #[serde(default = "default_stipend_interval_hours")]
    pub stipend_interval_hours: i64,

    /// Gold granted per stipend.
    #[serde(default = "default_stipend_gold")]
    pub stipend_gold_amount: i64,

    /// Gems granted per stipend.
    #[serde(default = "default_stipend_gems")]
    pub stipend_gem_amount: i64,

    /// Reward per rarity for converting a duplicate.
    #[serde(default = "default_duplicate_conversion")]
    pub duplicate_conversion: BTreeMap<Rarity, ConversionReward>,

    /// Marketplace fee, in percent of the price.
    #[serde(default = "default_marketplace_fee_percent")]
    pub marketplace_fee_percent: u32,
}

impl EconomyRules {
    /// Conversion reward for `rarity`; unlisted rarities convert to nothing.
    pub fn conversion_for(&self, rarity: Rarity) -> ConversionReward {
        self.duplicate_conversion
            .get(&rarity)
            .copied()
            .unwrap_or_default()
    }
}

impl Default for EconomyRules {
    fn default() -> Self {
        Self {
            stipend_interval_hours: default_stipend_interval_hours(),
            stipend_gold_amount: default_stipend_gold(),
            stipend_gem_amount: default_stipend_gems(),
            duplicate_conversion: default_duplicate_conversion(),
            marketplace_fee_percent: default_marketplace_fee_percent(),
        }
    }
}

/// A marketplace sort option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOption {
    /// Key, e.g. `priceAsc`.
    pub id: String,

    /// Label shown in the picker.
    pub label: String,
}

/// Marketplace filter options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceFilters {
    /// Rarities offered in the filter.
    #[serde(default = "default_filter_rarities")]
    pub rarities: Vec<Rarity>,

    /// Sort options offered in the picker.
    #[serde(default = "default_sort_options")]
    pub sort_options: Vec<SortOption>,
}

impl Default for MarketplaceFilters {
    fn default() -> Self {
        Self {
            rarities: default_filter_rarities(),
            sort_options: default_sort_options(),
        }
    }
}

/// Daily quest rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestRules {
    /// Maximum number of concurrently assigned quests.
    #[serde(default = "default_max_active_quests")]
    pub max_active_quests: u32,

    /// Quest categories the backend may assign.
    #[serde(default = "default_quest_types")]
    pub quest_types: Vec<String>,

    /// UTC hour at which daily quests roll over.
    #[serde(default = "default_refresh_hour_utc")]
    pub refresh_hour_utc: u32,
}

impl Default for QuestRules {
    fn default() -> Self {
        Self {
            max_active_quests: default_max_active_quests(),
            quest_types: default_quest_types(),
            refresh_hour_utc: default_refresh_hour_utc(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Number of log records retained in memory.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            history_capacity: default_history_capacity(),
        }
    }
}

/// Connectivity probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Seconds between background health probes; 0 disables them.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: default_probe_interval_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (required by serde's `default = "..."` attribute)
// ---------------------------------------------------------------------------

fn default_app_version() -> String {
    "2.0.0".to_owned()
}

const fn default_true() -> bool {
    true
}

fn default_welcome_title() -> String {
    "Welcome back to the Realm".to_owned()
}

fn default_welcome_subtitle() -> String {
    "Claim quests, redeem codes, and dominate the multiversal marketplace.".to_owned()
}

const fn default_stipend_interval_hours() -> i64 {
    24
}

const fn default_stipend_gold() -> i64 {
    500
}

const fn default_stipend_gems() -> i64 {
    5
}

fn default_duplicate_conversion() -> BTreeMap<Rarity, ConversionReward> {
    [
        (Rarity::Common, 25, 0),
        (Rarity::Uncommon, 45, 0),
        (Rarity::Rare, 90, 1),
        (Rarity::Epic, 180, 3),
        (Rarity::Legendary, 350, 6),
        (Rarity::Mythic, 600, 10),
    ]
    .into_iter()
    .map(|(rarity, gold, gems)| (rarity, ConversionReward { gold, gems }))
    .collect()
}

const fn default_marketplace_fee_percent() -> u32 {
    3
}

fn default_filter_rarities() -> Vec<Rarity> {
    Rarity::ALL.to_vec()
}

fn default_sort_options() -> Vec<SortOption> {
    [
        ("newest", "Newest"),
        ("priceAsc", "Price: Low to High"),
        ("priceDesc", "Price: High to Low"),
        ("rarity", "Rarity"),
    ]
    .into_iter()
    .map(|(id, label)| SortOption {
        id: id.to_owned(),
        label: label.to_owned(),
    })
    .collect()
}

const fn default_max_active_quests() -> u32 {
    3
}

fn default_quest_types() -> Vec<String> {
    ["redeem", "collect", "marketplace", "login"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

const fn default_refresh_hour_utc() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_history_capacity() -> usize {
    500
}

const fn default_probe_interval_secs() -> u64 {
    60
}
