//! Model order selection.
//!
//! The order decides which derived quantities a reconstructed model exposes.
//! It is derived from which optional shaping fields a configuration row
//! carries, and this module holds the only rule for doing so.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::record::ConfigurationRecord;

/// Expansion order of a reconstructed configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelOrder {
    /// Basic first-order model ("r1").
    #[serde(rename = "r1")]
    First,
    /// Second-order model ("r2"), needs `B2c`.
    #[serde(rename = "r2")]
    Second,
    /// Third-order model ("r3"), needs `B2c` and `p2`.
    #[serde(rename = "r3")]
    Third,
}

impl ModelOrder {
    pub const ALL: [ModelOrder; 3] = [ModelOrder::First, ModelOrder::Second, ModelOrder::Third];

    pub fn label(self) -> &'static str {
        match self {
            ModelOrder::First => "r1",
            ModelOrder::Second => "r2",
            ModelOrder::Third => "r3",
        }
    }

    /// True when a model of this order exposes everything `required` needs.
    pub fn at_least(self, required: ModelOrder) -> bool {
        self >= required
    }
}

impl fmt::Display for ModelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelOrder {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "r1" => Ok(ModelOrder::First),
            "r2" => Ok(ModelOrder::Second),
            "r3" => Ok(ModelOrder::Third),
            other => Err(CoreError::UnknownOrder(other.to_string())),
        }
    }
}

/// Select the model order for a configuration.
///
/// | `B2c`   | `p2`    | order |
/// |---------|---------|-------|
/// | absent  | absent  | r1    |
/// | present | absent  | r2    |
/// | present | present | r3    |
/// | absent  | present | r1    |
///
/// A pressure coefficient without `B2c` cannot drive a higher-order model,
/// so the row falls back to first order and the mismatch is logged.
pub fn determine_order(record: &ConfigurationRecord) -> ModelOrder {
    match (record.b2c, record.p2) {
        (None, None) => ModelOrder::First,
        (Some(_), None) => ModelOrder::Second,
        (Some(_), Some(_)) => ModelOrder::Third,
        (None, Some(_)) => {
            tracing::warn!(
                config_id = %record.id,
                "p2 present without B2c, building first-order model"
            );
            ModelOrder::First
        }
    }
}
