//! Static PNG rendering.
//!
//! A fixed oblique projection with painter's ordering: points are drawn far
//! to near so the front of the torus covers the back.

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use sx_model::{AxisCurve, BoundarySurface, Grid};

use crate::error::{ArtifactError, ArtifactResult};

pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 600;
const MARGIN: f64 = 40.0;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS_COLOR: Rgb<u8> = Rgb([200, 30, 30]);

/// Viridis control points, low to high.
const VIRIDIS: [[f64; 3]; 5] = [
    [68.0, 1.0, 84.0],
    [59.0, 82.0, 139.0],
    [33.0, 145.0, 140.0],
    [94.0, 201.0, 98.0],
    [253.0, 231.0, 37.0],
];

/// Map `t` in [0, 1] onto the viridis ramp.
pub fn viridis(t: f64) -> Rgb<u8> {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (VIRIDIS.len() - 1) as f64;
    let lo = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - lo as f64;
    let mut px = [0u8; 3];
    for (c, out) in px.iter_mut().enumerate() {
        let v = VIRIDIS[lo][c] + (VIRIDIS[lo + 1][c] - VIRIDIS[lo][c]) * frac;
        *out = v.round() as u8;
    }
    Rgb(px)
}

/// Oblique view: 30° elevation, 35° azimuth. Returns (u, v, depth).
fn project(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let (sa, ca) = 35f64.to_radians().sin_cos();
    let (se, ce) = 30f64.to_radians().sin_cos();
    let xr = x * ca - y * sa;
    let yr = x * sa + y * ca;
    let u = xr;
    let v = z * ce - yr * se;
    let depth = yr * ce + z * se;
    (u, v, depth)
}

struct Viewport {
    u0: f64,
    v0: f64,
    scale: f64,
}

impl Viewport {
    fn fit(points: &[(f64, f64, f64)]) -> ArtifactResult<Self> {
        let (mut umin, mut umax) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut vmin, mut vmax) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(u, v, _) in points {
            umin = umin.min(u);
            umax = umax.max(u);
            vmin = vmin.min(v);
            vmax = vmax.max(v);
        }
        if !umin.is_finite() || !vmin.is_finite() {
            return Err(ArtifactError::Empty {
                what: "no finite points",
            });
        }
        let span = (umax - umin).max(vmax - vmin).max(f64::EPSILON);
        let avail = (WIDTH.min(HEIGHT) as f64) - 2.0 * MARGIN;
        Ok(Self {
            u0: 0.5 * (umin + umax),
            v0: 0.5 * (vmin + vmax),
            scale: avail / span,
        })
    }

    fn pixel(&self, u: f64, v: f64) -> (i64, i64) {
        let px = WIDTH as f64 / 2.0 + (u - self.u0) * self.scale;
        let py = HEIGHT as f64 / 2.0 - (v - self.v0) * self.scale;
        (px.round() as i64, py.round() as i64)
    }
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn dot(img: &mut RgbImage, x: i64, y: i64, radius: i64, color: Rgb<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            put(img, x + dx, y + dy, color);
        }
    }
}

fn line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).max(1);
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let x = from.0 as f64 + (to.0 - from.0) as f64 * t;
        let y = from.1 as f64 + (to.1 - from.1) as f64 * t;
        dot(img, x.round() as i64, y.round() as i64, 1, color);
    }
}

fn encode(img: &RgbImage) -> ArtifactResult<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

/// Boundary surface colored by |B|.
pub fn surface_png(surface: &BoundarySurface, bmag: &Grid) -> ArtifactResult<Vec<u8>> {
    let mut points = Vec::new();
    let mut values = Vec::new();
    for (i, row) in surface.x.iter().enumerate() {
        for (j, &x) in row.iter().enumerate() {
            let (Some(y), Some(z)) = (
                surface.y.get(i).and_then(|r| r.get(j)),
                surface.z.get(i).and_then(|r| r.get(j)),
            ) else {
                continue;
            };
            let b = bmag.get(i).and_then(|r| r.get(j)).copied().unwrap_or(f64::NAN);
            if x.is_finite() && y.is_finite() && z.is_finite() {
                points.push(project(x, *y, *z));
                values.push(b);
            }
        }
    }
    if points.is_empty() {
        return Err(ArtifactError::Empty {
            what: "boundary surface",
        });
    }

    let viewport = Viewport::fit(&points)?;
    let (bmin, bmax) = values
        .iter()
        .filter(|b| b.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &b| {
            (lo.min(b), hi.max(b))
        });
    let brange = (bmax - bmin).max(f64::EPSILON);

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| points[a].2.total_cmp(&points[b].2));

    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    for idx in order {
        let (u, v, _) = points[idx];
        let (px, py) = viewport.pixel(u, v);
        let color = viridis((values[idx] - bmin) / brange);
        dot(&mut img, px, py, 2, color);
    }
    encode(&img)
}

/// Axis-only rendering used when no boundary surface can be computed.
pub fn axis_png(axis: &AxisCurve) -> ArtifactResult<Vec<u8>> {
    let points: Vec<_> = axis
        .x
        .iter()
        .zip(&axis.y)
        .zip(&axis.z)
        .filter(|((x, y), z)| x.is_finite() && y.is_finite() && z.is_finite())
        .map(|((x, y), z)| project(*x, *y, *z))
        .collect();
    if points.len() < 2 {
        return Err(ArtifactError::Empty {
            what: "magnetic axis",
        });
    }

    let viewport = Viewport::fit(&points)?;
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    for pair in points.windows(2) {
        let a = viewport.pixel(pair[0].0, pair[0].1);
        let b = viewport.pixel(pair[1].0, pair[1].1);
        line(&mut img, a, b, AXIS_COLOR);
    }
    encode(&img)
}
