//! Catalog of diagnostic curves and the model order each one needs.
//!
//! The catalog is the declared schema of "which curves exist for which
//! order". Generators iterate it instead of probing models for attributes.

use sx_core::ModelOrder;

/// Values above this magnitude are treated as undefined.
pub const UNDEFINED_MAGNITUDE: f64 = 1.0e20;

/// One named scalar-per-toroidal-angle quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticCurve {
    R0,
    Z0,
    Curvature,
    Torsion,
    Sigma,
    Elongation,
    LGradB,
    InvLGradB,
    LGradGradB,
    B20,
    InvLGradGradB,
    RSingularity,
    X3c1,
    Y3c1,
    Y3s1,
}

/// Post-processing applied to a raw series before plotting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeriesTransform {
    None,
    /// Replace values whose magnitude exceeds the threshold with NaN.
    MaskAbove(f64),
}

impl SeriesTransform {
    pub fn apply(self, values: &mut [f64]) {
        match self {
            SeriesTransform::None => {}
            SeriesTransform::MaskAbove(limit) => {
                for v in values.iter_mut() {
                    if v.abs() > limit {
                        *v = f64::NAN;
                    }
                }
            }
        }
    }
}

pub const CATALOG: [DiagnosticCurve; 15] = [
    DiagnosticCurve::R0,
    DiagnosticCurve::Z0,
    DiagnosticCurve::Curvature,
    DiagnosticCurve::Torsion,
    DiagnosticCurve::Sigma,
    DiagnosticCurve::Elongation,
    DiagnosticCurve::LGradB,
    DiagnosticCurve::InvLGradB,
    DiagnosticCurve::LGradGradB,
    DiagnosticCurve::B20,
    DiagnosticCurve::InvLGradGradB,
    DiagnosticCurve::RSingularity,
    DiagnosticCurve::X3c1,
    DiagnosticCurve::Y3c1,
    DiagnosticCurve::Y3s1,
];

impl DiagnosticCurve {
    /// Display name, also used as the curve's file stem and JSON key.
    pub fn name(self) -> &'static str {
        match self {
            DiagnosticCurve::R0 => "R0",
            DiagnosticCurve::Z0 => "Z0",
            DiagnosticCurve::Curvature => "curvature",
            DiagnosticCurve::Torsion => "torsion",
            DiagnosticCurve::Sigma => "sigma",
            DiagnosticCurve::Elongation => "elongation",
            DiagnosticCurve::LGradB => "L_grad_B",
            DiagnosticCurve::InvLGradB => "1/L_grad_B",
            DiagnosticCurve::LGradGradB => "L_grad_grad_B",
            DiagnosticCurve::B20 => "B20",
            DiagnosticCurve::InvLGradGradB => "1/L_grad_grad_B",
            DiagnosticCurve::RSingularity => "r_singularity",
            DiagnosticCurve::X3c1 => "X3c1",
            DiagnosticCurve::Y3c1 => "Y3c1",
            DiagnosticCurve::Y3s1 => "Y3s1",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        CATALOG.iter().copied().find(|c| c.name() == name)
    }

    /// Lowest model order that exposes this quantity.
    pub fn min_order(self) -> ModelOrder {
        match self {
            DiagnosticCurve::R0
            | DiagnosticCurve::Z0
            | DiagnosticCurve::Curvature
            | DiagnosticCurve::Torsion
            | DiagnosticCurve::Sigma
            | DiagnosticCurve::Elongation
            | DiagnosticCurve::LGradB
            | DiagnosticCurve::InvLGradB => ModelOrder::First,
            DiagnosticCurve::LGradGradB
            | DiagnosticCurve::B20
            | DiagnosticCurve::InvLGradGradB
            | DiagnosticCurve::RSingularity => ModelOrder::Second,
            DiagnosticCurve::X3c1 | DiagnosticCurve::Y3c1 | DiagnosticCurve::Y3s1 => {
                ModelOrder::Third
            }
        }
    }

    /// Whether the plot's y axis should start at zero.
    pub fn nonnegative(self) -> bool {
        matches!(
            self,
            DiagnosticCurve::Curvature
                | DiagnosticCurve::Elongation
                | DiagnosticCurve::LGradB
                | DiagnosticCurve::InvLGradB
                | DiagnosticCurve::RSingularity
        )
    }

    pub fn transform(self) -> SeriesTransform {
        match self {
            DiagnosticCurve::RSingularity => SeriesTransform::MaskAbove(UNDEFINED_MAGNITUDE),
            _ => SeriesTransform::None,
        }
    }
}

/// Catalog subset valid for `order`, in catalog order.
pub fn curves_for(order: ModelOrder) -> Vec<DiagnosticCurve> {
    CATALOG
        .iter()
        .copied()
        .filter(|c| order.at_least(c.min_order()))
        .collect()
}
