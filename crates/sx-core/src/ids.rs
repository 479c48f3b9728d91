use core::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of one configuration row.
///
/// Wraps the integer primary key of the configuration table. The value is
/// also used verbatim as the artifact file stem, so it never changes once a
/// row exists.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(i64);

impl ConfigId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for ConfigId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigId({})", self.0)
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
