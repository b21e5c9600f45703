//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CANTINA_PAYMENT_TOLERANCE_CENTS=1                                  │
//! │     CANTINA_LOG=debug                                                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/cantina-pos/cantina.toml (Linux)                         │
//! │     ~/Library/Application Support/com.cantina.pos/cantina.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [settlement]
//! payment_tolerance_cents = 1
//! max_cart_lines = 100
//! max_line_quantity = 999
//!
//! [logging]
//! filter = "info,cantina=debug"
//! ```

use cantina_core::{Money, MAX_CART_LINES, MAX_LINE_QUANTITY, PAYMENT_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Settlement Settings
// =============================================================================

/// Limits applied to carts and payment sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSettings {
    /// Largest allowed |Σ payments − total|, in cents.
    #[serde(default = "default_tolerance")]
    pub payment_tolerance_cents: i64,

    /// Maximum number of lines in one cart.
    #[serde(default = "default_max_cart_lines")]
    pub max_cart_lines: usize,

    /// Per-line quantity ceiling; larger requests are clamped.
    #[serde(default = "default_max_line_quantity")]
    pub max_line_quantity: i64,
}

fn default_tolerance() -> i64 {
    PAYMENT_TOLERANCE.cents()
}

fn default_max_cart_lines() -> usize {
    MAX_CART_LINES
}

fn default_max_line_quantity() -> i64 {
    MAX_LINE_QUANTITY
}

impl Default for SettlementSettings {
    fn default() -> Self {
        SettlementSettings {
            payment_tolerance_cents: default_tolerance(),
            max_cart_lines: default_max_cart_lines(),
            max_line_quantity: default_max_line_quantity(),
        }
    }
}

impl SettlementSettings {
    pub fn payment_tolerance(&self) -> Money {
        Money::from_cents(self.payment_tolerance_cents)
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when RUST_LOG is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info,cantina=debug".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_filter(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub settlement: SettlementSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (cantina.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        let s = &self.settlement;

        if s.payment_tolerance_cents < 0 {
            return Err(EngineError::InvalidConfig(
                "payment_tolerance_cents must not be negative".into(),
            ));
        }
        if s.max_cart_lines == 0 {
            return Err(EngineError::InvalidConfig(
                "max_cart_lines must be greater than 0".into(),
            ));
        }
        if s.max_line_quantity <= 0 {
            return Err(EngineError::InvalidConfig(
                "max_line_quantity must be greater than 0".into(),
            ));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(EngineError::InvalidConfig("logging filter is empty".into()));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CANTINA_PAYMENT_TOLERANCE_CENTS") {
            match v.parse::<i64>() {
                Ok(cents) => {
                    debug!(cents, "Overriding payment tolerance from environment");
                    self.settlement.payment_tolerance_cents = cents;
                }
                Err(_) => warn!(value = %v, "Ignoring invalid CANTINA_PAYMENT_TOLERANCE_CENTS"),
            }
        }

        if let Ok(v) = std::env::var("CANTINA_MAX_CART_LINES") {
            match v.parse::<usize>() {
                Ok(n) => self.settlement.max_cart_lines = n,
                Err(_) => warn!(value = %v, "Ignoring invalid CANTINA_MAX_CART_LINES"),
            }
        }

        if let Ok(v) = std::env::var("CANTINA_MAX_LINE_QUANTITY") {
            match v.parse::<i64>() {
                Ok(n) => self.settlement.max_line_quantity = n,
                Err(_) => warn!(value = %v, "Ignoring invalid CANTINA_MAX_LINE_QUANTITY"),
            }
        }

        if let Ok(filter) = std::env::var("CANTINA_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "cantina", "pos")
            .map(|dirs| dirs.config_dir().join("cantina.toml"))
    }
}
