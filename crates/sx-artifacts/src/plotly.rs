//! Plotly figure documents.
//!
//! Figures are plain `serde_json::Value` trees in Plotly's schema. Non-finite
//! samples become `null`, which Plotly renders as gaps.

use serde_json::{Value, json};
use sx_core::ConfigId;
use sx_model::{BoundarySurface, DiagnosticCurve, Grid};

pub const LINE_WIDTH: u32 = 700;
pub const LINE_HEIGHT: u32 = 500;

fn sample(v: f64) -> Value {
    if v.is_finite() { json!(v) } else { Value::Null }
}

fn series(values: &[f64]) -> Value {
    Value::Array(values.iter().copied().map(sample).collect())
}

fn grid(values: &Grid) -> Value {
    Value::Array(values.iter().map(|row| series(row)).collect())
}

fn hidden_axis() -> Value {
    json!({
        "visible": false,
        "showgrid": false,
        "zeroline": false,
        "showticklabels": false,
    })
}

/// 3-D surface of the boundary colored by |B|.
pub fn surface_figure(id: ConfigId, surface: &BoundarySurface, bmag: &Grid) -> Value {
    json!({
        "data": [{
            "type": "surface",
            "x": grid(&surface.x),
            "y": grid(&surface.y),
            "z": grid(&surface.z),
            "surfacecolor": grid(bmag),
            "colorscale": "Viridis",
            "colorbar": { "title": { "text": "|B| [T]" } },
            "showscale": true,
        }],
        "layout": {
            "title": { "text": format!("Stellarator Configuration {id}") },
            "scene": {
                "xaxis": hidden_axis(),
                "yaxis": hidden_axis(),
                "zaxis": hidden_axis(),
                "aspectmode": "data",
            },
            "margin": { "l": 0, "r": 0, "t": 40, "b": 0 },
        },
    })
}

/// Line plot of one diagnostic curve against the toroidal angle.
pub fn line_figure(curve: DiagnosticCurve, phi: &[f64], values: &[f64]) -> Value {
    let name = curve.name();
    let mut yaxis = json!({ "title": { "text": name } });
    if curve.nonnegative() {
        yaxis["rangemode"] = json!("nonnegative");
    }
    json!({
        "data": [{
            "type": "scatter",
            "mode": "lines",
            "name": name,
            "x": series(phi),
            "y": series(values),
        }],
        "layout": {
            "title": { "text": format!("{name} vs φ") },
            "xaxis": { "title": { "text": "φ" } },
            "yaxis": yaxis,
            "template": "plotly_white",
            "width": LINE_WIDTH,
            "height": LINE_HEIGHT,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_samples_become_null() {
        let fig = line_figure(
            DiagnosticCurve::RSingularity,
            &[0.0, 1.0, 2.0],
            &[0.5, f64::NAN, f64::INFINITY],
        );
        let y = &fig["data"][0]["y"];
        assert_eq!(y[0], json!(0.5));
        assert!(y[1].is_null());
        assert!(y[2].is_null());
        assert_eq!(fig["layout"]["yaxis"]["rangemode"], json!("nonnegative"));
        assert_eq!(fig["layout"]["title"]["text"], json!("r_singularity vs φ"));
    }

    #[test]
    fn signed_curves_have_free_range() {
        let fig = line_figure(DiagnosticCurve::Torsion, &[0.0], &[-1.0]);
        assert!(fig["layout"]["yaxis"].get("rangemode").is_none());
    }

    #[test]
    fn surface_title_names_the_configuration() {
        let surface = BoundarySurface {
            r: 0.1,
            x: vec![vec![1.0, 0.0]],
            y: vec![vec![0.0, 1.0]],
            z: vec![vec![0.0, 0.0]],
        };
        let fig = surface_figure(ConfigId::new(42), &surface, &vec![vec![1.0, 1.1]]);
        assert_eq!(
            fig["layout"]["title"]["text"],
            json!("Stellarator Configuration 42")
        );
        assert_eq!(fig["data"][0]["colorscale"], json!("Viridis"));
        assert_eq!(fig["layout"]["scene"]["aspectmode"], json!("data"));
    }
}
