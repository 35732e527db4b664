//! PNG chart renderers on the plotters bitmap backend
//!
//! Text is drawn with DejaVu Sans, bundled and registered on first use, so
//! no system font libraries are needed. The `system-fonts` feature switches
//! plotters to the host's fonts instead.

use std::ops::Range;
use std::path::Path;

use lazy_static::lazy_static;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::register_font;

use super::ChartError;

const WIDE: (u32, u32) = (1200, 600);
const SQUARE: (u32, u32) = (1000, 700);
const FONT: &str = "sans-serif";

const STEEL_BLUE: RGBColor = RGBColor(70, 130, 180);
const DARK_GREEN: RGBColor = RGBColor(0, 100, 0);
const PURPLE: RGBColor = RGBColor(128, 0, 128);
const CORAL: RGBColor = RGBColor(255, 127, 80);

const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

lazy_static! {
    static ref FONT_REGISTERED: bool =
        register_font(FONT, FontStyle::Normal, BUNDLED_FONT).is_ok();
}

/// Register the bundled font under the family the charts use
///
/// Returns false if the font data could not be parsed; text then fails with
/// a render error instead of drawing.
pub fn ensure_font() -> bool {
    *FONT_REGISTERED
}

/// White canvas of `size` backed by a PNG file at `path`
fn canvas(path: &Path, size: (u32, u32)) -> Result<DrawingArea<BitMapBackend<'_>, Shift>, ChartError> {
    if !ensure_font() {
        return Err(ChartError::Render("bundled font could not be loaded".to_string()));
    }
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    Ok(root)
}

fn render_err<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Render(e.to_string())
}

/// Axis range covering `values`, padded so a constant series is drawable
fn value_range<'a>(values: impl IntoIterator<Item = &'a f64>, include_zero: bool) -> Range<f64> {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values.into_iter().filter(|v| v.is_finite()) {
        lo = lo.min(*v);
        hi = hi.max(*v);
    }
    if !lo.is_finite() {
        return 0.0..1.0;
    }
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
    (lo - pad)..(hi + pad)
}

fn label_at(labels: &[String], pos: f64) -> String {
    let idx = pos.round();
    if idx < 0.0 || (idx - pos).abs() > 0.01 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

/// Vertical bars, one per `(label, value)`, in the given order
pub fn bar_chart(
    path: &Path,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    bars: &[(String, f64)],
) -> Result<(), ChartError> {
    if bars.is_empty() {
        return Err(ChartError::NoSuitableColumn("no bars to draw".to_string()));
    }
    let labels: Vec<String> = bars.iter().map(|(l, _)| l.clone()).collect();

    let root = canvas(path, WIDE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 28).into_font())
        .margin(20)
        .x_label_area_size(80)
        .y_label_area_size(80)
        .build_cartesian_2d(
            -0.5..(bars.len() as f64 - 0.5),
            value_range(bars.iter().map(|(_, v)| v), true),
        )
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len())
        .x_label_formatter(&|x| label_at(&labels, *x))
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, (_, v))| {
            let x = i as f64;
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, *v)], STEEL_BLUE.mix(0.7).filled())
        }))
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}

/// Horizontal bars, first entry at the bottom
pub fn horizontal_bar_chart(
    path: &Path,
    title: &str,
    x_desc: &str,
    bars: &[(String, f64)],
) -> Result<(), ChartError> {
    if bars.is_empty() {
        return Err(ChartError::NoSuitableColumn("no bars to draw".to_string()));
    }
    let labels: Vec<String> = bars.iter().map(|(l, _)| l.clone()).collect();

    let root = canvas(path, WIDE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 28).into_font())
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(180)
        .build_cartesian_2d(
            value_range(bars.iter().map(|(_, v)| v), true),
            -0.5..(bars.len() as f64 - 0.5),
        )
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(bars.len())
        .y_label_formatter(&|y| label_at(&labels, *y))
        .x_desc(x_desc)
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, (_, v))| {
            let y = i as f64;
            Rectangle::new([(0.0, y - 0.4), (*v, y + 0.4)], CORAL.mix(0.7).filled())
        }))
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}

/// Equal-width histogram of the finite values
pub fn histogram(
    path: &Path,
    title: &str,
    x_desc: &str,
    values: &[f64],
    bins: usize,
) -> Result<(), ChartError> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Err(ChartError::NoSuitableColumn(format!("{} has no values", x_desc)));
    }

    let lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };

    let mut counts = vec![0u32; bins];
    for v in &finite {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let max_count = counts.iter().copied().max().unwrap_or(1) as f64;

    let root = canvas(path, WIDE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 28).into_font())
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(lo..(lo + width * bins as f64), 0.0..(max_count * 1.05))
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("Frequency")
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(counts.iter().enumerate().map(|(i, n)| {
            let x0 = lo + width * i as f64;
            Rectangle::new([(x0, 0.0), (x0 + width, *n as f64)], STEEL_BLUE.mix(0.7).filled())
        }))
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}

/// Line over positional x with optional tick labels, markers on each point
pub fn line_chart(
    path: &Path,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    labels: &[String],
    values: &[f64],
) -> Result<(), ChartError> {
    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, v)| (i as f64, *v))
        .collect();
    if points.is_empty() {
        return Err(ChartError::NoSuitableColumn(format!("{} has no values", y_desc)));
    }

    let root = canvas(path, WIDE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 28).into_font())
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(
            value_range(points.iter().map(|(x, _)| x), false),
            value_range(points.iter().map(|(_, y)| y), false),
        )
        .map_err(render_err)?;

    let formatter = |x: &f64| label_at(labels, *x);
    let mut mesh = chart.configure_mesh();
    mesh.x_desc(x_desc).y_desc(y_desc);
    if !labels.is_empty() {
        mesh.x_label_formatter(&formatter);
    }
    mesh.draw().map_err(render_err)?;

    chart
        .draw_series(LineSeries::new(points.clone(), DARK_GREEN.stroke_width(2)))
        .map_err(render_err)?;
    chart
        .draw_series(points.iter().map(|p| Circle::new(*p, 3, DARK_GREEN.filled())))
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}

/// Scatter of paired finite values with an optional corner annotation
pub fn scatter_chart(
    path: &Path,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    xs: &[f64],
    ys: &[f64],
    annotation: Option<&str>,
) -> Result<(), ChartError> {
    let points: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();
    if points.is_empty() {
        return Err(ChartError::NoSuitableColumn(format!(
            "{} / {} have no paired values",
            x_desc, y_desc
        )));
    }

    let root = canvas(path, SQUARE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 28).into_font())
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(
            value_range(points.iter().map(|(x, _)| x), false),
            value_range(points.iter().map(|(_, y)| y), false),
        )
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(points.iter().map(|p| Circle::new(*p, 5, PURPLE.mix(0.5).filled())))
        .map_err(render_err)?;

    if let Some(text) = annotation {
        root.draw(&Text::new(text.to_string(), (110, 60), (FONT, 20).into_font()))
            .map_err(render_err)?;
    }

    root.present().map_err(render_err)?;
    Ok(())
}
