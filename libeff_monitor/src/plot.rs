use plotters::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};

use super::constants::SINGLE_PLOT_DIR;
use super::efficiency::{CurveKind, EfficiencyCurve};
use super::error::PlotError;
use super::series::RunRange;

const PLOT_SIZE: (u32, u32) = (900, 700);
const MARKER_SIZE: u32 = 3;

// One color per step, cycled; the total is always drawn in black
const STEP_COLORS: [RGBColor; 12] = [
    RGBColor(204, 0, 0),
    RGBColor(0, 0, 204),
    RGBColor(0, 153, 0),
    RGBColor(255, 102, 0),
    RGBColor(153, 51, 255),
    RGBColor(0, 204, 204),
    RGBColor(204, 0, 204),
    RGBColor(51, 102, 204),
    RGBColor(255, 51, 153),
    RGBColor(0, 153, 153),
    RGBColor(102, 204, 0),
    RGBColor(77, 77, 77),
];

fn curve_color(curve: &EfficiencyCurve) -> RGBColor {
    match curve.kind {
        CurveKind::Step(idx) => STEP_COLORS[idx % STEP_COLORS.len()],
        CurveKind::Total => BLACK,
    }
}

/// Lower y bound shared by all curves of an overlay: 90% of the smallest non-zero value
pub fn overlay_y_floor(curves: &[EfficiencyCurve]) -> f64 {
    let y_min = curves
        .iter()
        .filter_map(|c| c.min_positive())
        .fold(1.0, f64::min);
    y_min * 0.9
}

/// Upper y bound: 1, unless some error bar reaches past it
fn y_ceiling(curves: &[&EfficiencyCurve]) -> f64 {
    curves
        .iter()
        .flat_map(|c| c.points.values())
        .map(|p| p.high())
        .filter(|v| v.is_finite())
        .fold(1.0, f64::max)
}

fn draw_curves(
    path: &Path,
    title: &str,
    y_desc: &str,
    range: &RunRange,
    y_range: Range<f64>,
    curves: &[&EfficiencyCurve],
) -> Result<(), PlotError> {
    if range.width() == 0 {
        return Err(PlotError::EmptyRange);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let root = SVGBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(range.floor as f64..range.ceiling as f64, y_range)?;

    chart
        .configure_mesh()
        .x_desc("Run")
        .y_desc(y_desc)
        .x_label_formatter(&|x| format!("{x:.0}"))
        .draw()?;

    for curve in curves.iter() {
        let color = curve_color(curve);
        chart
            .draw_series(curve.points.iter().map(move |(run, p)| {
                ErrorBar::new_vertical(*run as f64, p.low(), p.value, p.high(), color.filled(), 4)
            }))?
            .label(curve.display_label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));
        chart.draw_series(
            curve
                .points
                .iter()
                .map(move |(run, p)| Circle::new((*run as f64, p.value), MARKER_SIZE, color.filled())),
        )?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Draw every curve of a region on one canvas
pub fn draw_overlay(
    curves: &[EfficiencyCurve],
    range: &RunRange,
    title: &str,
    path: &Path,
) -> Result<(), PlotError> {
    let refs: Vec<&EfficiencyCurve> = curves.iter().collect();
    let y_range = overlay_y_floor(curves)..y_ceiling(&refs);
    draw_curves(path, title, "Filter Efficiency", range, y_range, &refs)
}

/// Draw a single step efficiency, on a full [0, 1] scale
pub fn draw_single(
    curve: &EfficiencyCurve,
    range: &RunRange,
    title: &str,
    path: &Path,
) -> Result<(), PlotError> {
    let y_range = 0.0..y_ceiling(&[curve]);
    draw_curves(path, title, "Step Efficiency", range, y_range, &[curve])
}

/// Render the overlay and the per-step plots of one region into a directory.
///
/// Returns the paths of the files written.
pub fn render_region(
    region: &str,
    curves: &[EfficiencyCurve],
    range: &RunRange,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, PlotError> {
    let mut written: Vec<PathBuf> = Vec::new();
    if curves.is_empty() {
        log::warn!("{region}: no efficiency curves to draw");
        return Ok(written);
    }

    let overlay_path = out_dir.join(format!("step_efficiency_{region}.svg"));
    draw_overlay(
        curves,
        range,
        &format!("{region}: Filter Efficiency vs Run"),
        &overlay_path,
    )?;
    written.push(overlay_path);

    for curve in curves.iter().filter(|c| matches!(c.kind, CurveKind::Step(_))) {
        let single_path = out_dir
            .join(SINGLE_PLOT_DIR)
            .join(format!("{region}_{}.svg", curve.label));
        draw_single(
            curve,
            range,
            &format!("{region}: {} Efficiency vs Run", curve.display_label()),
            &single_path,
        )?;
        written.push(single_path);
    }
    for path in written.iter() {
        log::debug!("Saved: {}", path.to_string_lossy());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::RatioPoint;
    use crate::trend::Trend;
    use std::collections::BTreeMap;

    fn curve(kind: CurveKind, label: &str, values: &[(u32, f64)]) -> EfficiencyCurve {
        let points: BTreeMap<u32, RatioPoint> = values
            .iter()
            .map(|(run, v)| (*run, RatioPoint::symmetric(*v, 0.005)))
            .collect();
        EfficiencyCurve {
            label: label.to_string(),
            kind,
            points,
            trend: None,
        }
    }

    #[test]
    fn test_overlay_y_floor_ignores_zero() {
        let curves = vec![
            curve(CurveKind::Step(1), "HE", &[(100001, 0.98), (100002, 0.0)]),
            curve(CurveKind::Total, "Total", &[(100001, 0.8)]),
        ];
        assert!((overlay_y_floor(&curves) - 0.72).abs() < 1e-12);
        assert_eq!(overlay_y_floor(&[]), 0.9);
    }

    #[test]
    fn test_render_region_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let range = RunRange::from_runs([100001, 100002]).unwrap();
        let mut step = curve(CurveKind::Step(1), "HE", &[(100001, 0.98), (100002, 0.99)]);
        step.trend = Some(Trend::Up);
        let curves = vec![
            step,
            curve(CurveKind::Total, "Total", &[(100001, 0.8), (100002, 0.82)]),
        ];
        let written = render_region("EB", &curves, &range, dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("step_efficiency_EB.svg").exists());
        assert!(dir.path().join("single").join("EB_HE.svg").exists());
        let svg = std::fs::read_to_string(dir.path().join("step_efficiency_EB.svg")).unwrap();
        assert!(svg.contains("HE (up)"));
    }

    #[test]
    fn test_render_region_without_curves() {
        let dir = tempfile::tempdir().unwrap();
        let range = RunRange::from_runs([100001]).unwrap();
        assert!(render_region("EB", &[], &range, dir.path()).unwrap().is_empty());
    }
}
