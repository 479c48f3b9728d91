//! Model traits.

use sx_core::{ConfigId, ConfigurationRecord, ModelOrder};

use crate::catalog::DiagnosticCurve;
use crate::error::ModelResult;
use crate::mesh::{AxisCurve, BoundarySurface, Grid, SurfaceMesh};

/// A reconstructed configuration.
///
/// A handle is owned by the worker that built it and is used on that
/// worker's thread only. Implementations are not required to be `Send` or
/// `Sync`, and nothing in the workspace caches or shares handles.
pub trait NearAxisModel {
    fn config_id(&self) -> ConfigId;

    fn order(&self) -> ModelOrder;

    /// Number of field periods.
    fn nfp(&self) -> u32;

    /// Toroidal angle samples over one field period; the domain of every
    /// diagnostic series.
    fn phi(&self) -> &[f64];

    /// Magnetic axis over the full torus.
    fn axis(&self) -> ModelResult<AxisCurve>;

    /// Boundary surface at minor radius `r`.
    ///
    /// Fails with [`crate::ModelError::NoSignChange`] when the surface
    /// root-find cannot bracket a solution at this radius.
    fn boundary(&self, r: f64, mesh: &SurfaceMesh) -> ModelResult<BoundarySurface>;

    /// Field strength |B| on the surface at `r`, shaped like the mesh.
    fn field_magnitude(&self, r: f64, mesh: &SurfaceMesh) -> ModelResult<Grid>;

    /// Capability query: does this model expose `curve` at all?
    fn supports(&self, curve: DiagnosticCurve) -> bool {
        self.order().at_least(curve.min_order())
    }

    /// Raw values of `curve` on [`NearAxisModel::phi`].
    ///
    /// `Ok(None)` means the model does not provide the quantity.
    fn series(&self, curve: DiagnosticCurve) -> ModelResult<Option<Vec<f64>>>;
}

/// Builds a fresh model from a configuration row.
///
/// Builders are shared across worker threads; the handles they return are
/// not.
pub trait ModelBuilder: Send + Sync {
    /// Builder name (for logging).
    fn name(&self) -> &str;

    fn build(&self, record: &ConfigurationRecord) -> ModelResult<Box<dyn NearAxisModel>>;
}
