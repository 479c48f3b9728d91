//! Closed-form reference model.
//!
//! Axis quantities (position, Frenet frame, curvature, torsion) are exact
//! differential geometry of the Fourier axis. Everything above that is a
//! surrogate: `sigma` is taken as zero, the first-order ellipse uses
//! `X1c = etabar / curvature` and `Y1s = curvature / etabar`, and the
//! second/third-order series are smooth functions of the inputs with the
//! right dependencies and orders of magnitude. The model is suitable for
//! exercising the pipeline, not for physics.

use std::f64::consts::{PI, TAU};

use nalgebra::Vector3;
use sx_core::{ConfigId, ConfigurationRecord, ModelOrder, determine_order};
use tracing::debug;

use crate::catalog::DiagnosticCurve;
use crate::error::{ModelError, ModelResult};
use crate::mesh::{AxisCurve, BoundarySurface, Grid, SurfaceMesh, linspace};
use crate::model::{ModelBuilder, NearAxisModel};

/// Toroidal resolution of the diagnostic series (one field period).
pub const DEFAULT_NPHI: usize = 71;

/// Vacuum permeability [H/m].
const MU0: f64 = 4.0e-7 * PI;

/// Half-width of the toroidal bracket used by the boundary root-find.
const BRACKET_HALF_WIDTH: f64 = 1.0;

const ROOT_TOL: f64 = 1.0e-12;
const ROOT_MAX_ITER: usize = 100;
const ROOT_JUMP_TOL: f64 = 1.0e-6;

/// Stand-in value for r_singularity where the surrogate denominator vanishes.
const SINGULARITY_CAP: f64 = 1.0e30;

/// Axis point with its Frenet frame.
#[derive(Debug, Clone, Copy)]
struct AxisFrame {
    r0: f64,
    z0: f64,
    position: Vector3<f64>,
    normal: Vector3<f64>,
    binormal: Vector3<f64>,
    curvature: f64,
    torsion: f64,
}

/// Builder for [`ReferenceAxisModel`].
#[derive(Debug, Clone)]
pub struct ReferenceModelBuilder {
    pub nphi: usize,
}

impl Default for ReferenceModelBuilder {
    fn default() -> Self {
        Self { nphi: DEFAULT_NPHI }
    }
}

impl ModelBuilder for ReferenceModelBuilder {
    fn name(&self) -> &str {
        "reference-axis"
    }

    fn build(&self, record: &ConfigurationRecord) -> ModelResult<Box<dyn NearAxisModel>> {
        let model = ReferenceAxisModel::new(record, self.nphi)?;
        debug!(config = %record.id, order = %model.order, "built reference model");
        Ok(Box::new(model))
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceAxisModel {
    id: ConfigId,
    order: ModelOrder,
    nfp: u32,
    rc: [f64; 4],
    zs: [f64; 4],
    etabar: f64,
    b2c: f64,
    p2: f64,
    phi: Vec<f64>,
    frames: Vec<AxisFrame>,
    mean_curvature: f64,
}

impl ReferenceAxisModel {
    pub fn new(record: &ConfigurationRecord, nphi: usize) -> ModelResult<Self> {
        record.validate()?;
        if record.etabar == 0.0 {
            return Err(ModelError::InvalidArg {
                what: "etabar must be nonzero",
            });
        }
        if nphi < 2 {
            return Err(ModelError::InvalidArg {
                what: "nphi must be at least 2",
            });
        }

        let order = determine_order(record);
        let period = TAU / record.nfp as f64;
        let phi: Vec<f64> = (0..nphi).map(|i| period * i as f64 / nphi as f64).collect();

        let mut model = Self {
            id: record.id,
            order,
            nfp: record.nfp,
            rc: record.rc_series(),
            zs: record.zs_series(),
            etabar: record.etabar,
            // Defaults used when a higher order is built without its inputs.
            b2c: record.b2c.unwrap_or(1.0),
            p2: record.p2.unwrap_or(-1.0),
            phi: Vec::new(),
            frames: Vec::with_capacity(nphi),
            mean_curvature: 0.0,
        };

        for &p in &phi {
            model.frames.push(model.frame_at(p)?);
        }
        model.mean_curvature =
            model.frames.iter().map(|f| f.curvature).sum::<f64>() / model.frames.len() as f64;
        model.phi = phi;
        Ok(model)
    }

    fn frame_at(&self, phi: f64) -> ModelResult<AxisFrame> {
        let nfp = self.nfp as f64;
        let (mut r, mut r1, mut r2, mut r3) = (0.0, 0.0, 0.0, 0.0);
        let (mut z, mut z1, mut z2, mut z3) = (0.0, 0.0, 0.0, 0.0);
        for n in 0..4 {
            let k = n as f64 * nfp;
            let (s, c) = (k * phi).sin_cos();
            r += self.rc[n] * c;
            r1 -= self.rc[n] * k * s;
            r2 -= self.rc[n] * k * k * c;
            r3 += self.rc[n] * k * k * k * s;
            z += self.zs[n] * s;
            z1 += self.zs[n] * k * c;
            z2 -= self.zs[n] * k * k * s;
            z3 -= self.zs[n] * k * k * k * c;
        }

        let (s, c) = phi.sin_cos();
        let position = Vector3::new(r * c, r * s, z);
        let d1 = Vector3::new(r1 * c - r * s, r1 * s + r * c, z1);
        let d2 = Vector3::new(
            r2 * c - 2.0 * r1 * s - r * c,
            r2 * s + 2.0 * r1 * c - r * s,
            z2,
        );
        let d3 = Vector3::new(
            r3 * c - 3.0 * r2 * s - 3.0 * r1 * c + r * s,
            r3 * s + 3.0 * r2 * c - 3.0 * r1 * s - r * c,
            z3,
        );

        let speed = d1.norm();
        let cross = d1.cross(&d2);
        let cross_norm = cross.norm();
        if !(speed > 0.0 && cross_norm > 1.0e-14) {
            return Err(ModelError::Numerical {
                what: "axis has vanishing curvature",
            });
        }

        let tangent = d1 / speed;
        let binormal = cross / cross_norm;
        let normal = binormal.cross(&tangent);
        let curvature = cross_norm / speed.powi(3);
        let torsion = cross.dot(&d3) / (cross_norm * cross_norm);

        if !(curvature.is_finite() && torsion.is_finite()) {
            return Err(ModelError::Numerical {
                what: "axis curvature/torsion",
            });
        }

        Ok(AxisFrame {
            r0: r,
            z0: z,
            position,
            normal,
            binormal,
            curvature,
            torsion,
        })
    }

    fn x1c(&self, frame: &AxisFrame) -> f64 {
        self.etabar / frame.curvature
    }

    fn y1s(&self, frame: &AxisFrame) -> f64 {
        frame.curvature / self.etabar
    }

    fn pressure_term(&self) -> f64 {
        if self.order == ModelOrder::Third {
            0.5 * MU0 * self.p2
        } else {
            0.0
        }
    }

    fn b20(&self, frame: &AxisFrame) -> f64 {
        self.b2c * frame.curvature / self.mean_curvature - self.pressure_term()
    }

    fn inv_l_grad_b(&self, frame: &AxisFrame) -> f64 {
        let grad_b_sq = 2.0 * frame.curvature * frame.curvature + 2.0 * self.etabar * self.etabar;
        (grad_b_sq / 2.0).sqrt()
    }

    fn inv_l_grad_grad_b(&self, frame: &AxisFrame) -> f64 {
        let b20 = self.b20(frame);
        let norm = 4.0 * (b20 * b20 + self.b2c * self.b2c)
            + 2.0 * (frame.curvature * self.etabar).powi(2);
        norm.powf(0.25)
    }

    fn r_singularity(&self, frame: &AxisFrame) -> f64 {
        let shape = self.x1c(frame).abs().max(self.y1s(frame).abs());
        let denom = frame.curvature * shape * self.b20(frame).abs();
        if denom < 1.0 / SINGULARITY_CAP {
            SINGULARITY_CAP
        } else {
            1.0 / denom
        }
    }

    fn elongation(&self, frame: &AxisFrame) -> f64 {
        let a = self.x1c(frame).abs();
        let b = self.y1s(frame).abs();
        a.max(b) / a.min(b)
    }

    /// Off-axis point at `(r, theta)` in the plane of the axis frame at `phi0`.
    fn surface_point(&self, frame: &AxisFrame, r: f64, theta: f64) -> Vector3<f64> {
        let (s, c) = theta.sin_cos();
        let mut x = r * self.x1c(frame) * c;
        let y = r * self.y1s(frame) * s;
        if self.order.at_least(ModelOrder::Second) {
            x += r * r * 0.5 * self.b20(frame) * (2.0 * theta).cos();
        }
        frame.position + frame.normal * x + frame.binormal * y
    }

    /// Solve for the axis angle whose off-axis point lies at cylindrical
    /// angle `phi_target`, by bisection on a fixed bracket.
    fn solve_phi0(&self, r: f64, theta: f64, phi_target: f64) -> ModelResult<Vector3<f64>> {
        let residual = |phi0: f64| -> ModelResult<(f64, Vector3<f64>)> {
            let frame = self.frame_at(phi0)?;
            let p = self.surface_point(&frame, r, theta);
            Ok((wrap_angle(p.y.atan2(p.x) - phi_target), p))
        };

        let mut a = phi_target - BRACKET_HALF_WIDTH;
        let mut b = phi_target + BRACKET_HALF_WIDTH;
        let (mut fa, _) = residual(a)?;
        let (fb, _) = residual(b)?;
        if fa * fb > 0.0 {
            return Err(ModelError::NoSignChange { r });
        }

        for _ in 0..ROOT_MAX_ITER {
            let mid = 0.5 * (a + b);
            let (fm, p) = residual(mid)?;
            if fm.abs() < ROOT_TOL {
                return Ok(p);
            }
            if (b - a) < ROOT_TOL {
                // A sign change across the branch cut of the wrapped angle
                // is a jump, not a root.
                if fm.abs() > ROOT_JUMP_TOL {
                    return Err(ModelError::NoSignChange { r });
                }
                return Ok(p);
            }
            if fa * fm <= 0.0 {
                b = mid;
            } else {
                a = mid;
                fa = fm;
            }
        }
        let (fm, p) = residual(0.5 * (a + b))?;
        if fm.abs() > ROOT_JUMP_TOL {
            return Err(ModelError::NoSignChange { r });
        }
        Ok(p)
    }
}

/// Wrap an angle difference into (-pi, pi].
fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI { PI } else { wrapped }
}

impl NearAxisModel for ReferenceAxisModel {
    fn config_id(&self) -> ConfigId {
        self.id
    }

    fn order(&self) -> ModelOrder {
        self.order
    }

    fn nfp(&self) -> u32 {
        self.nfp
    }

    fn phi(&self) -> &[f64] {
        &self.phi
    }

    fn axis(&self) -> ModelResult<AxisCurve> {
        let phi = linspace(0.0, TAU, 4 * DEFAULT_NPHI);
        let mut curve = AxisCurve {
            phi: Vec::with_capacity(phi.len()),
            x: Vec::with_capacity(phi.len()),
            y: Vec::with_capacity(phi.len()),
            z: Vec::with_capacity(phi.len()),
        };
        for p in phi {
            let frame = self.frame_at(p)?;
            curve.phi.push(p);
            curve.x.push(frame.position.x);
            curve.y.push(frame.position.y);
            curve.z.push(frame.position.z);
        }
        Ok(curve)
    }

    fn boundary(&self, r: f64, mesh: &SurfaceMesh) -> ModelResult<BoundarySurface> {
        if !(r.is_finite() && r > 0.0) {
            return Err(ModelError::InvalidArg {
                what: "radius must be positive",
            });
        }
        let thetas = mesh.theta();
        let phis = mesh.phi();
        let mut x = Vec::with_capacity(thetas.len());
        let mut y = Vec::with_capacity(thetas.len());
        let mut z = Vec::with_capacity(thetas.len());

        for &theta in &thetas {
            let mut xr = Vec::with_capacity(phis.len());
            let mut yr = Vec::with_capacity(phis.len());
            let mut zr = Vec::with_capacity(phis.len());
            for &phi in &phis {
                let p = self.solve_phi0(r, theta, phi)?;
                let big_r = p.x.hypot(p.y);
                xr.push(big_r * phi.cos());
                yr.push(big_r * phi.sin());
                zr.push(p.z);
            }
            x.push(xr);
            y.push(yr);
            z.push(zr);
        }

        Ok(BoundarySurface { r, x, y, z })
    }

    fn field_magnitude(&self, r: f64, mesh: &SurfaceMesh) -> ModelResult<Grid> {
        let thetas = mesh.theta();
        let phis = mesh.phi();
        let mut grid = Vec::with_capacity(thetas.len());
        for &theta in &thetas {
            let mut row = Vec::with_capacity(phis.len());
            for &phi in &phis {
                let mut b = 1.0 + r * self.etabar * theta.cos();
                if self.order.at_least(ModelOrder::Second) {
                    let frame = self.frame_at(phi)?;
                    b += r * r * (self.b20(&frame) + self.b2c * (2.0 * theta).cos());
                }
                row.push(b);
            }
            grid.push(row);
        }
        Ok(grid)
    }

    fn series(&self, curve: DiagnosticCurve) -> ModelResult<Option<Vec<f64>>> {
        if !self.supports(curve) {
            return Ok(None);
        }
        let pressure = self.pressure_term();
        let values = self
            .frames
            .iter()
            .map(|f| match curve {
                DiagnosticCurve::R0 => f.r0,
                DiagnosticCurve::Z0 => f.z0,
                DiagnosticCurve::Curvature => f.curvature,
                DiagnosticCurve::Torsion => f.torsion,
                DiagnosticCurve::Sigma => 0.0,
                DiagnosticCurve::Elongation => self.elongation(f),
                DiagnosticCurve::LGradB => 1.0 / self.inv_l_grad_b(f),
                DiagnosticCurve::InvLGradB => self.inv_l_grad_b(f),
                DiagnosticCurve::LGradGradB => 1.0 / self.inv_l_grad_grad_b(f),
                DiagnosticCurve::B20 => self.b20(f),
                DiagnosticCurve::InvLGradGradB => self.inv_l_grad_grad_b(f),
                DiagnosticCurve::RSingularity => self.r_singularity(f),
                DiagnosticCurve::X3c1 => {
                    self.x1c(f) * (self.b20(f) - self.b2c) * f.curvature / 8.0
                }
                DiagnosticCurve::Y3c1 => self.y1s(f) * self.b20(f) * f.torsion / 8.0,
                DiagnosticCurve::Y3s1 => {
                    self.y1s(f) * (self.b2c + pressure) * f.curvature / 8.0
                }
            })
            .collect();
        Ok(Some(values))
    }
}
