use serde::{Deserialize, Serialize};

/// Numeric and strictness settings for CIF output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CifSettings {
    /// Layout units to CIF units; coordinates are multiplied then truncated.
    pub multiplier: f64,
    /// Length of the `R` direction vector in calls.
    pub rotation_multiplier: f64,
    /// Fail instead of steamrolling an edge whose transform a call cannot carry.
    pub strict: bool,
}

impl Default for CifSettings {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            rotation_multiplier: 1000.0,
            strict: false,
        }
    }
}

impl CifSettings {
    pub fn new(multiplier: f64, rotation_multiplier: f64, strict: bool) -> Self {
        Self {
            multiplier,
            rotation_multiplier,
            strict,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
