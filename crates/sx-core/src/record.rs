//! Configuration rows.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::ids::ConfigId;

/// One row of the configuration table.
///
/// Read-only for everything downstream: the pipeline never writes rows back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationRecord {
    pub id: ConfigId,
    /// Axis cosine coefficients `rc1..rc3` (the `rc0 = 1` term is implied).
    pub rc: [f64; 3],
    /// Axis sine coefficients `zs1..zs3` (the `zs0 = 0` term is implied).
    pub zs: [f64; 3],
    /// Number of field periods.
    pub nfp: u32,
    pub etabar: f64,
    /// Second-order shaping coefficient.
    #[serde(rename = "B2c")]
    pub b2c: Option<f64>,
    /// Pressure coefficient used by the third-order model.
    pub p2: Option<f64>,
    pub axis_length: Option<f64>,
    pub iota: Option<f64>,
}

impl ConfigurationRecord {
    /// A plain circular axis with only `etabar` set, handy as a baseline.
    pub fn circular_axis(id: ConfigId, nfp: u32, etabar: f64) -> Self {
        Self {
            id,
            rc: [0.0; 3],
            zs: [0.0; 3],
            nfp,
            etabar,
            b2c: None,
            p2: None,
            axis_length: None,
            iota: None,
        }
    }

    /// Full cosine series including the leading unit major radius.
    pub fn rc_series(&self) -> [f64; 4] {
        [1.0, self.rc[0], self.rc[1], self.rc[2]]
    }

    /// Full sine series including the leading zero.
    pub fn zs_series(&self) -> [f64; 4] {
        [0.0, self.zs[0], self.zs[1], self.zs[2]]
    }

    /// Reject rows that no model could be built from.
    pub fn validate(&self) -> CoreResult<()> {
        if self.nfp == 0 {
            return Err(CoreError::InvalidNfp {
                id: self.id.get(),
                nfp: 0,
            });
        }
        let named = [
            ("rc1", self.rc[0]),
            ("rc2", self.rc[1]),
            ("rc3", self.rc[2]),
            ("zs1", self.zs[0]),
            ("zs2", self.zs[1]),
            ("zs3", self.zs[2]),
            ("etabar", self.etabar),
        ];
        for (what, value) in named {
            if !value.is_finite() {
                return Err(CoreError::NonFinite {
                    id: self.id.get(),
                    what,
                    value,
                });
            }
        }
        for (what, value) in [("B2c", self.b2c), ("p2", self.p2)] {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                return Err(CoreError::NonFinite {
                    id: self.id.get(),
                    what,
                    value,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_include_implied_terms() {
        let mut rec = ConfigurationRecord::circular_axis(ConfigId::new(1), 2, 1.1);
        rec.rc = [0.1, 0.01, 0.001];
        rec.zs = [0.2, 0.02, 0.002];
        assert_eq!(rec.rc_series(), [1.0, 0.1, 0.01, 0.001]);
        assert_eq!(rec.zs_series(), [0.0, 0.2, 0.02, 0.002]);
    }

    #[test]
    fn validate_rejects_bad_rows() {
        let mut rec = ConfigurationRecord::circular_axis(ConfigId::new(3), 0, 1.0);
        assert!(matches!(rec.validate(), Err(CoreError::InvalidNfp { .. })));

        rec.nfp = 2;
        rec.etabar = f64::NAN;
        assert!(matches!(
            rec.validate(),
            Err(CoreError::NonFinite { what: "etabar", .. })
        ));

        rec.etabar = 0.8;
        rec.b2c = Some(f64::INFINITY);
        assert!(matches!(
            rec.validate(),
            Err(CoreError::NonFinite { what: "B2c", .. })
        ));

        rec.b2c = Some(0.1);
        assert!(rec.validate().is_ok());
    }

    #[test]
    fn b2c_uses_database_column_name() {
        let mut rec = ConfigurationRecord::circular_axis(ConfigId::new(9), 4, 1.2);
        rec.b2c = Some(0.5);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["B2c"], 0.5);
        assert_eq!(json["id"], 9);
    }
}
