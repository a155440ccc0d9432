use crate::core::geometry::bonds::{DEFAULT_BAD_BOND_COEFFICIENT, DEFAULT_BOND_TOLERANCE};
use crate::core::geometry::clusters::NaturalCutoffs;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Coefficient applied to covalent radius sums when judging whether a frame
/// is physically reasonable.
pub const DEFAULT_REASONABLE_COEFFICIENT: f64 = 0.7;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid value {value} for parameter '{name}'")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Thresholds used by the dataset screening workflow.
///
/// Every field is optional in TOML; missing ones take their defaults:
///
/// ```toml
/// reasonable_coefficient = 0.7
/// bad_bond_coefficient = 0.8
/// bond_tolerance = 1.15
/// organic_only = false
///
/// [cutoffs]
/// mult = 1.0
/// skin = 0.3
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreeningConfig {
    pub reasonable_coefficient: f64,
    pub bad_bond_coefficient: f64,
    pub bond_tolerance: f64,
    pub cutoffs: NaturalCutoffs,
    /// Only report bad bonds between atoms of organic clusters.
    pub organic_only: bool,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            reasonable_coefficient: DEFAULT_REASONABLE_COEFFICIENT,
            bad_bond_coefficient: DEFAULT_BAD_BOND_COEFFICIENT,
            bond_tolerance: DEFAULT_BOND_TOLERANCE,
            cutoffs: NaturalCutoffs::default(),
            organic_only: false,
        }
    }
}

impl ScreeningConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that coefficients and cutoff multipliers are positive and the
    /// skin is non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("reasonable_coefficient", self.reasonable_coefficient),
            ("bad_bond_coefficient", self.bad_bond_coefficient),
            ("bond_tolerance", self.bond_tolerance),
            ("cutoffs.mult", self.cutoffs.mult),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }
        let skin = self.cutoffs.skin;
        if !skin.is_finite() || skin < 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "cutoffs.skin",
                value: skin,
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct ScreeningConfigBuilder {
    reasonable_coefficient: Option<f64>,
    bad_bond_coefficient: Option<f64>,
    bond_tolerance: Option<f64>,
    cutoffs: Option<NaturalCutoffs>,
    organic_only: Option<bool>,
}

impl ScreeningConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reasonable_coefficient(mut self, coefficient: f64) -> Self {
        self.reasonable_coefficient = Some(coefficient);
        self
    }
    pub fn bad_bond_coefficient(mut self, coefficient: f64) -> Self {
        self.bad_bond_coefficient = Some(coefficient);
        self
    }
    pub fn bond_tolerance(mut self, tolerance: f64) -> Self {
        self.bond_tolerance = Some(tolerance);
        self
    }
    pub fn cutoffs(mut self, cutoffs: NaturalCutoffs) -> Self {
        self.cutoffs = Some(cutoffs);
        self
    }
    pub fn organic_only(mut self, organic_only: bool) -> Self {
        self.organic_only = Some(organic_only);
        self
    }

    pub fn build(self) -> Result<ScreeningConfig, ConfigError> {
        let defaults = ScreeningConfig::default();
        let config = ScreeningConfig {
            reasonable_coefficient: self
                .reasonable_coefficient
                .unwrap_or(defaults.reasonable_coefficient),
            bad_bond_coefficient: self
                .bad_bond_coefficient
                .unwrap_or(defaults.bad_bond_coefficient),
            bond_tolerance: self.bond_tolerance.unwrap_or(defaults.bond_tolerance),
            cutoffs: self.cutoffs.unwrap_or(defaults.cutoffs),
            organic_only: self.organic_only.unwrap_or(defaults.organic_only),
        };
        config.validate()?;
        Ok(config)
    }
}
