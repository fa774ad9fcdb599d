use serde::{Deserialize, Serialize};

use crate::math::Precision;

/// Caller-supplied behaviour switches for a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Rounding applied to calculation results.
    pub calculation_precision: Precision,
    /// Append a related-topic hint to knowledge answers.
    pub creative_mode: bool,
    /// Capture a training example for every turn.
    pub auto_training_trigger: bool,
}

impl Settings {
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.calculation_precision = precision;
        self
    }

    pub fn with_creative_mode(mut self, enabled: bool) -> Self {
        self.creative_mode = enabled;
        self
    }

    pub fn with_training(mut self, enabled: bool) -> Self {
        self.auto_training_trigger = enabled;
        self
    }
}
