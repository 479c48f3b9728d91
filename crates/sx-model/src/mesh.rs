//! Sampling meshes and sampled geometry.

use std::f64::consts::TAU;

/// Row-major grid indexed `[theta][phi]`.
pub type Grid = Vec<Vec<f64>>;

/// Resolution of a boundary-surface evaluation.
///
/// `ntheta_fourier`, `mpol` and `ntor` are forwarded to backends that refit
/// the surface in Fourier space; samplers that work directly on the mesh may
/// ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceMesh {
    pub ntheta: usize,
    pub nphi: usize,
    pub ntheta_fourier: usize,
    pub mpol: usize,
    pub ntor: usize,
}

impl SurfaceMesh {
    /// Plot resolution used for precomputed artifacts: 20 toroidal points
    /// per half period.
    pub fn for_nfp(nfp: u32) -> Self {
        Self {
            ntheta: 30,
            nphi: (nfp as usize) * 2 * 20,
            ntheta_fourier: 20,
            mpol: 5,
            ntor: 5,
        }
    }

    /// Poloidal angles, endpoints included.
    pub fn theta(&self) -> Vec<f64> {
        linspace(0.0, TAU, self.ntheta)
    }

    /// Toroidal angles over the full torus, endpoints included.
    pub fn phi(&self) -> Vec<f64> {
        linspace(0.0, TAU, self.nphi)
    }
}

/// Cartesian boundary surface on a [`SurfaceMesh`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySurface {
    pub r: f64,
    pub x: Grid,
    pub y: Grid,
    pub z: Grid,
}

/// Magnetic axis sampled over the full torus.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisCurve {
    pub phi: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

/// `n` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}
