//! Boundary and diagnostics generation for one model.

use std::collections::BTreeMap;

use serde_json::Value;
use sx_model::{BoundarySurface, CATALOG, NearAxisModel, SurfaceMesh};
use tracing::{debug, error, warn};

use crate::error::{ArtifactError, ArtifactResult};
use crate::plotly;
use crate::render;
use crate::types::{BOUNDARY_DEGRADED_MESSAGE, BoundaryArtifact, DiagnosticsArtifact};

/// Candidate minor radii, tried in order.
pub const DEFAULT_RADII: [f64; 5] = [0.1, 0.05, 0.15, 0.2, 0.025];

#[derive(Debug, Clone)]
pub struct ArtifactGenerator {
    radii: Vec<f64>,
    mesh: Option<SurfaceMesh>,
}

impl Default for ArtifactGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_RADII.to_vec())
    }
}

impl ArtifactGenerator {
    pub fn new(radii: Vec<f64>) -> Self {
        Self { radii, mesh: None }
    }

    /// Use a fixed mesh instead of [`SurfaceMesh::for_nfp`].
    pub fn with_mesh(mut self, mesh: SurfaceMesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    fn mesh_for(&self, model: &dyn NearAxisModel) -> SurfaceMesh {
        self.mesh.unwrap_or_else(|| SurfaceMesh::for_nfp(model.nfp()))
    }

    /// Render the boundary surface.
    ///
    /// Radii are tried in order; only the "no sign change" root-find failure
    /// moves on to the next one. If every radius fails the artifact degrades
    /// to an axis-only image. Never panics and never returns an error: any
    /// other failure yields [`BoundaryArtifact::failed`].
    pub fn generate_boundary(&self, model: &dyn NearAxisModel) -> BoundaryArtifact {
        match self.try_boundary(model) {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(config = %model.config_id(), error = %e, "boundary generation failed");
                BoundaryArtifact::failed()
            }
        }
    }

    fn try_boundary(&self, model: &dyn NearAxisModel) -> ArtifactResult<BoundaryArtifact> {
        let mesh = self.mesh_for(model);
        let Some(surface) = self.search_radius(model, &mesh)? else {
            warn!(
                config = %model.config_id(),
                radii = ?self.radii,
                "no radius produced a boundary surface, rendering axis only"
            );
            let axis = model.axis()?;
            return Ok(BoundaryArtifact {
                image: Some(render::axis_png(&axis)?),
                interactive: None,
                radius: None,
                error: Some(BOUNDARY_DEGRADED_MESSAGE.to_string()),
            });
        };

        let bmag = model.field_magnitude(surface.r, &mesh)?;
        let image = render::surface_png(&surface, &bmag)?;
        let interactive = plotly::surface_figure(model.config_id(), &surface, &bmag);
        Ok(BoundaryArtifact {
            image: Some(image),
            interactive: Some(interactive),
            radius: Some(surface.r),
            error: None,
        })
    }

    fn search_radius(
        &self,
        model: &dyn NearAxisModel,
        mesh: &SurfaceMesh,
    ) -> ArtifactResult<Option<BoundarySurface>> {
        for &r in &self.radii {
            match model.boundary(r, mesh) {
                Ok(surface) => return Ok(Some(surface)),
                Err(e) if e.is_no_sign_change() => {
                    debug!(config = %model.config_id(), r, "no boundary at radius");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Build one line figure per diagnostic the model's order supports.
    ///
    /// A curve whose value is missing or fails to compute is skipped. Only
    /// when no curve at all can be built does the artifact fall back to a
    /// whole-model rendering.
    pub fn generate_diagnostics(&self, model: &dyn NearAxisModel) -> DiagnosticsArtifact {
        match self.build_curves(model) {
            Ok(curves) if !curves.is_empty() => DiagnosticsArtifact {
                image: None,
                curves,
                error: None,
            },
            Ok(_) => self.diagnostics_fallback(model, None),
            Err(e) => self.diagnostics_fallback(model, Some(e)),
        }
    }

    fn build_curves(&self, model: &dyn NearAxisModel) -> ArtifactResult<BTreeMap<String, Value>> {
        let phi = model.phi();
        if phi.is_empty() {
            return Err(ArtifactError::Empty {
                what: "toroidal grid",
            });
        }

        let mut curves = BTreeMap::new();
        for curve in CATALOG.into_iter().filter(|c| model.supports(*c)) {
            let mut values = match model.series(curve) {
                Ok(Some(values)) => values,
                Ok(None) => {
                    debug!(config = %model.config_id(), curve = curve.name(), "not provided");
                    continue;
                }
                Err(e) => {
                    warn!(config = %model.config_id(), curve = curve.name(), error = %e, "skipping curve");
                    continue;
                }
            };
            if values.len() != phi.len() {
                warn!(
                    config = %model.config_id(),
                    curve = curve.name(),
                    len = values.len(),
                    expected = phi.len(),
                    "skipping curve with mismatched length"
                );
                continue;
            }
            curve.transform().apply(&mut values);
            curves.insert(
                curve.name().to_string(),
                plotly::line_figure(curve, phi, &values),
            );
        }
        Ok(curves)
    }

    fn diagnostics_fallback(
        &self,
        model: &dyn NearAxisModel,
        cause: Option<ArtifactError>,
    ) -> DiagnosticsArtifact {
        match &cause {
            Some(e) => warn!(config = %model.config_id(), error = %e, "diagnostics failed, using model plot"),
            None => warn!(config = %model.config_id(), "no diagnostic curves, using model plot"),
        }
        let image = model
            .axis()
            .map_err(ArtifactError::from)
            .and_then(|axis| render::axis_png(&axis));
        match image {
            Ok(image) => DiagnosticsArtifact {
                image: Some(image),
                curves: BTreeMap::new(),
                error: None,
            },
            Err(e) => {
                error!(config = %model.config_id(), error = %e, "diagnostics generation failed");
                DiagnosticsArtifact::failed()
            }
        }
    }
}
