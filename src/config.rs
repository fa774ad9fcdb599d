//! Engine configuration.
//!
//! Every field has a default, so a partial `engine.toml` only overrides what
//! it names.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::TanyaError;
use crate::models::settings::Settings;
use crate::services::classifier::ClassifierConfig;
use crate::services::dispatcher::DispatcherConfig;
use crate::services::fact_check::FactCheckOptions;
use crate::services::index::SearchConfig;
use crate::session::context::ContextConfig;

/// Name of the config file inside the data path.
pub const CONFIG_FILE: &str = "engine.toml";
/// Environment variable holding a JSON config override.
pub const CONFIG_ENV: &str = "TANYA_ENGINE_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub context: ContextConfig,
    pub fact_check: FactCheckOptions,
    pub search: SearchConfig,
    pub dispatcher: DispatcherConfig,
    /// Settings used when the caller supplies none.
    pub settings: Settings,
}

impl EngineConfig {
    /// Reject values that would make scoring meaningless.
    pub fn validate(&self) -> Result<(), TanyaError> {
        let c = &self.classifier;
        let unit = [
            ("classifier.short_circuit_threshold", c.short_circuit_threshold),
            ("classifier.context_threshold", c.context_threshold),
            ("classifier.entity_threshold", c.entity_threshold),
            ("classifier.unknown_threshold", c.unknown_threshold),
            ("classifier.complexity_threshold", c.complexity_threshold),
            ("classifier.fuzzy_threshold", c.fuzzy_threshold),
            ("fact_check.threshold", self.fact_check.threshold),
            ("search.min_score", self.search.min_score),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(TanyaError::Validation(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        let weights = [
            c.pattern_weight,
            c.entity_weight,
            c.context_weight,
            c.complexity_weight,
        ];
        if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(TanyaError::Validation(
                "classifier weights must be non-negative with a positive sum".into(),
            ));
        }

        if self.context.capacity == 0 || self.context.ttl_minutes <= 0 {
            return Err(TanyaError::Validation(
                "context.capacity and context.ttl_minutes must be positive".into(),
            ));
        }
        if self.search.top_n == 0 || self.fact_check.top_n == 0 || self.fact_check.max_n == 0 {
            return Err(TanyaError::Validation(
                "search.top_n, fact_check.top_n and fact_check.max_n must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Read and validate a TOML config file.
pub fn read_engine_config(path: &Path) -> Result<EngineConfig, TanyaError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        TanyaError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let config: EngineConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

fn parse_env_config(json: &str) -> Result<EngineConfig, TanyaError> {
    let config: EngineConfig = serde_json::from_str(json)
        .map_err(|e| TanyaError::Config(format!("Failed to parse {}: {}", CONFIG_ENV, e)))?;
    config.validate()?;
    Ok(config)
}

/// Load engine config with priority:
/// 1. `{data_path}/engine.toml` file
/// 2. `TANYA_ENGINE_CONFIG` env var (JSON)
/// 3. Defaults
///
/// An unreadable or invalid source is logged and skipped.
pub fn load_engine_config(data_path: &Path) -> EngineConfig {
    let config_path = data_path.join(CONFIG_FILE);
    if config_path.exists() {
        match read_engine_config(&config_path) {
            Ok(config) => {
                info!("Loaded engine config from {}", config_path.display());
                return config;
            }
            Err(e) => warn!("{}. Using default.", e),
        }
    }

    if let Ok(json) = std::env::var(CONFIG_ENV) {
        match parse_env_config(&json) {
            Ok(config) => {
                info!("Loaded engine config from {} env", CONFIG_ENV);
                return config;
            }
            Err(e) => warn!("{}. Using default.", e),
        }
    }

    EngineConfig::default()
}
