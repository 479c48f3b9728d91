//! sx-model: the contract between the precomputation pipeline and the
//! physics model of a configuration.
//!
//! Provides:
//! - `NearAxisModel` trait: what a reconstructed configuration exposes
//! - `ModelBuilder` trait: record → fresh model handle
//! - `DiagnosticCurve` catalog with the curves valid for each model order
//! - `ReferenceAxisModel`: a closed-form stand-in used by the CLI and tests
//!
//! # Architecture
//!
//! The pipeline only talks to `ModelBuilder` and `NearAxisModel`. A real
//! near-axis solver plugs in by implementing both traits; the reference
//! model here reproduces the shape of that contract (order-dependent curve
//! sets, a boundary sampler that can fail to bracket its root) with simple
//! axis geometry and surrogate higher-order series.
//!
//! # Example
//!
//! ```
//! use sx_core::{ConfigId, ConfigurationRecord};
//! use sx_model::{ModelBuilder, ReferenceModelBuilder, SurfaceMesh};
//!
//! let record = ConfigurationRecord::circular_axis(ConfigId::new(1), 3, 0.9);
//! let model = ReferenceModelBuilder::default().build(&record).unwrap();
//! let mesh = SurfaceMesh::for_nfp(model.nfp());
//! let surface = model.boundary(0.1, &mesh).unwrap();
//! assert_eq!(surface.x.len(), mesh.ntheta);
//! ```

pub mod catalog;
pub mod error;
pub mod mesh;
pub mod model;
pub mod reference;

pub use catalog::{CATALOG, DiagnosticCurve, SeriesTransform, curves_for};
pub use error::{ModelError, ModelResult};
pub use mesh::{AxisCurve, BoundarySurface, Grid, SurfaceMesh, linspace};
pub use model::{ModelBuilder, NearAxisModel};
pub use reference::{ReferenceAxisModel, ReferenceModelBuilder};
