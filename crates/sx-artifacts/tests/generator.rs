use std::cell::RefCell;
use std::collections::BTreeSet;

use sx_artifacts::{ArtifactGenerator, BOUNDARY_DEGRADED_MESSAGE, GENERIC_FAILURE_MESSAGE};
use sx_core::{ConfigId, ConfigurationRecord, ModelOrder};
use sx_model::{
    AxisCurve, BoundarySurface, DiagnosticCurve, Grid, ModelBuilder, ModelError, ModelResult,
    NearAxisModel, ReferenceModelBuilder, SurfaceMesh, curves_for, linspace,
};

fn small_mesh() -> SurfaceMesh {
    SurfaceMesh {
        ntheta: 8,
        nphi: 16,
        ntheta_fourier: 8,
        mpol: 3,
        ntor: 3,
    }
}

/// Scripted model: a plain torus whose boundary root-find fails for the
/// first `bracket_failures` radii.
struct ScriptedModel {
    order: ModelOrder,
    phi: Vec<f64>,
    bracket_failures: usize,
    backend_error: bool,
    missing: Vec<DiagnosticCurve>,
    broken: Vec<DiagnosticCurve>,
    attempts: RefCell<Vec<f64>>,
}

impl ScriptedModel {
    fn new(order: ModelOrder) -> Self {
        Self {
            order,
            phi: linspace(0.0, 2.0, 20),
            bracket_failures: 0,
            backend_error: false,
            missing: Vec::new(),
            broken: Vec::new(),
            attempts: RefCell::new(Vec::new()),
        }
    }

    fn grid(mesh: &SurfaceMesh, f: impl Fn(f64, f64) -> f64) -> Grid {
        let phi = mesh.phi();
        mesh.theta()
            .iter()
            .map(|&t| phi.iter().map(|&p| f(t, p)).collect())
            .collect()
    }
}

impl NearAxisModel for ScriptedModel {
    fn config_id(&self) -> ConfigId {
        ConfigId::new(7)
    }

    fn order(&self) -> ModelOrder {
        self.order
    }

    fn nfp(&self) -> u32 {
        2
    }

    fn phi(&self) -> &[f64] {
        &self.phi
    }

    fn axis(&self) -> ModelResult<AxisCurve> {
        let phi = linspace(0.0, std::f64::consts::TAU, 32);
        Ok(AxisCurve {
            x: phi.iter().map(|p| p.cos()).collect(),
            y: phi.iter().map(|p| p.sin()).collect(),
            z: vec![0.0; phi.len()],
            phi,
        })
    }

    fn boundary(&self, r: f64, mesh: &SurfaceMesh) -> ModelResult<BoundarySurface> {
        let mut attempts = self.attempts.borrow_mut();
        attempts.push(r);
        if self.backend_error {
            return Err(ModelError::Backend {
                message: "solver diverged".into(),
            });
        }
        if attempts.len() <= self.bracket_failures {
            return Err(ModelError::NoSignChange { r });
        }
        Ok(BoundarySurface {
            r,
            x: Self::grid(mesh, |t, p| (1.0 + r * t.cos()) * p.cos()),
            y: Self::grid(mesh, |t, p| (1.0 + r * t.cos()) * p.sin()),
            z: Self::grid(mesh, |t, _| r * t.sin()),
        })
    }

    fn field_magnitude(&self, r: f64, mesh: &SurfaceMesh) -> ModelResult<Grid> {
        Ok(Self::grid(mesh, |t, _| 1.0 + r * t.cos()))
    }

    fn series(&self, curve: DiagnosticCurve) -> ModelResult<Option<Vec<f64>>> {
        if self.broken.contains(&curve) {
            return Err(ModelError::Numerical {
                what: "scripted failure",
            });
        }
        if self.missing.contains(&curve) || !self.supports(curve) {
            return Ok(None);
        }
        Ok(Some(self.phi.iter().map(|p| 1.0 + p).collect()))
    }
}

fn names(curves: impl IntoIterator<Item = DiagnosticCurve>) -> BTreeSet<String> {
    curves.into_iter().map(|c| c.name().to_string()).collect()
}

#[test]
fn boundary_walks_radii_in_order() {
    let mut model = ScriptedModel::new(ModelOrder::First);
    model.bracket_failures = 2;
    let generator = ArtifactGenerator::default().with_mesh(small_mesh());

    let artifact = generator.generate_boundary(&model);

    assert_eq!(*model.attempts.borrow(), vec![0.1, 0.05, 0.15]);
    assert_eq!(artifact.radius, Some(0.15));
    assert!(artifact.error.is_none());
    assert!(artifact.image.is_some());
    let fig = artifact.interactive.expect("interactive figure");
    assert_eq!(fig["data"][0]["x"].as_array().map(Vec::len), Some(8));
}

#[test]
fn boundary_degrades_to_axis_when_every_radius_fails() {
    let mut model = ScriptedModel::new(ModelOrder::First);
    model.bracket_failures = usize::MAX;
    let generator = ArtifactGenerator::default().with_mesh(small_mesh());

    let artifact = generator.generate_boundary(&model);

    assert_eq!(model.attempts.borrow().len(), 5);
    assert!(artifact.image.is_some());
    assert!(artifact.interactive.is_none());
    assert!(artifact.radius.is_none());
    assert_eq!(artifact.error.as_deref(), Some(BOUNDARY_DEGRADED_MESSAGE));
    assert!(artifact.is_persistable());
}

#[test]
fn other_boundary_errors_stop_the_search() {
    let mut model = ScriptedModel::new(ModelOrder::Second);
    model.backend_error = true;
    let generator = ArtifactGenerator::default().with_mesh(small_mesh());

    let artifact = generator.generate_boundary(&model);

    assert_eq!(*model.attempts.borrow(), vec![0.1]);
    assert_eq!(artifact.error.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
    assert!(!artifact.is_persistable());
}

#[test]
fn first_order_diagnostics_match_catalog_subset() {
    let model = ScriptedModel::new(ModelOrder::First);
    let artifact = ArtifactGenerator::default().generate_diagnostics(&model);

    let got: BTreeSet<String> = artifact.curves.keys().cloned().collect();
    assert_eq!(got, names(curves_for(ModelOrder::First)));
    assert!(artifact.image.is_none());
    assert!(artifact.error.is_none());
}

#[test]
fn missing_and_failing_curves_are_skipped() {
    let mut model = ScriptedModel::new(ModelOrder::Third);
    model.missing = vec![DiagnosticCurve::Y3s1];
    model.broken = vec![DiagnosticCurve::Torsion];

    let artifact = ArtifactGenerator::default().generate_diagnostics(&model);

    assert_eq!(artifact.curves.len(), 13);
    assert!(!artifact.curves.contains_key("Y3s1"));
    assert!(!artifact.curves.contains_key("torsion"));
    assert!(artifact.curves.contains_key("X3c1"));
}

#[test]
fn diagnostics_fall_back_to_model_plot() {
    let mut model = ScriptedModel::new(ModelOrder::First);
    model.phi.clear();

    let artifact = ArtifactGenerator::default().generate_diagnostics(&model);

    assert!(artifact.curves.is_empty());
    assert!(artifact.image.is_some());
    assert!(artifact.is_persistable());
}

#[test]
fn second_order_reference_configuration() {
    let mut record = ConfigurationRecord::circular_axis(ConfigId::new(42), 3, 0.9);
    record.rc = [0.045, 0.0, 0.0];
    record.zs = [-0.045, 0.0, 0.0];
    record.b2c = Some(0.3);

    let model = ReferenceModelBuilder::default()
        .build(&record)
        .expect("build model");
    assert_eq!(model.order(), ModelOrder::Second);

    let generator = ArtifactGenerator::default().with_mesh(small_mesh());
    let boundary = generator.generate_boundary(model.as_ref());
    assert!(boundary.error.is_none(), "{:?}", boundary.error);
    assert_eq!(boundary.radius, Some(0.1));
    assert_eq!(
        boundary.interactive.expect("figure")["layout"]["title"]["text"],
        "Stellarator Configuration 42"
    );

    let diagnostics = generator.generate_diagnostics(model.as_ref());
    let got: BTreeSet<String> = diagnostics.curves.keys().cloned().collect();
    assert_eq!(got, names(curves_for(ModelOrder::Second)));
    for third_only in ["X3c1", "Y3c1", "Y3s1"] {
        assert!(!got.contains(third_only));
    }
}
