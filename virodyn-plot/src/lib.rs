//! Static line charts written to image files.
//!
//! A [`Chart`] collects line series, marker series, and horizontal reference
//! lines, then renders them with `plotters` in a single call to
//! [`Chart::save`].

use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use plotters::{
    coord::Shift,
    prelude::{
        BLACK, ChartBuilder, Circle, DashedLineSeries, DrawingArea, DrawingAreaErrorKind,
        DrawingBackend, IntoDrawingArea, LineSeries, PathElement, RGBColor, SVGBackend,
        SeriesLabelPosition, WHITE,
    },
    style::Color as _,
};
use thiserror::Error;

const FONT: &str = "sans-serif";

/// A chart that can be rendered to an image file.
#[derive(Debug, Clone)]
pub struct Chart {
    title: String,
    x_label: String,
    y_label: String,
    x_range: Range<f64>,
    y_range: Range<f64>,
    lines: Vec<Series>,
    markers: Vec<Markers>,
}

#[derive(Debug, Clone)]
struct Series {
    name: String,
    points: Vec<(f64, f64)>,
    color: Color,
    line: LineStyle,
}

#[derive(Debug, Clone)]
struct Markers {
    name: String,
    points: Vec<(f64, f64)>,
    color: Color,
}

/// Colors available for series and markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Blue,
    Black,
}

impl Color {
    fn rgb(self) -> RGBColor {
        match self {
            Color::Red => RGBColor(214, 39, 40),
            Color::Green => RGBColor(0, 128, 0),
            Color::Blue => RGBColor(31, 119, 180),
            Color::Black => RGBColor(0, 0, 0),
        }
    }
}

/// How a line series is stroked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

/// Output file format.
///
/// Defaults to PNG when the `png` feature is enabled, and to SVG otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Scalable vector graphics. Text is emitted as SVG text elements, so no
    /// fonts are needed at render time.
    Svg,

    /// Raster PNG, rendered with system fonts.
    #[cfg(feature = "png")]
    Png,
}

impl Default for ImageFormat {
    #[cfg(feature = "png")]
    fn default() -> Self {
        ImageFormat::Png
    }

    #[cfg(not(feature = "png"))]
    fn default() -> Self {
        ImageFormat::Svg
    }
}

impl ImageFormat {
    /// The file extension written by [`Chart::save`].
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Svg => "svg",
            #[cfg(feature = "png")]
            ImageFormat::Png => "png",
        }
    }
}

/// Physical figure size and resolution.
///
/// Pixel dimensions are `inches × dpi`, and fonts and strokes scale with the
/// resolution so a figure looks the same at any `dpi`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FigureSize {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
}

impl Default for FigureSize {
    fn default() -> Self {
        Self {
            width_in: 10.0,
            height_in: 6.0,
            dpi: 300,
        }
    }
}

impl FigureSize {
    /// Pixel dimensions of the rendered image.
    #[must_use]
    pub fn pixels(&self) -> (u32, u32) {
        let dpi = f64::from(self.dpi);
        (to_pixels(self.width_in * dpi), to_pixels(self.height_in * dpi))
    }

    /// Pixels per typographic point.
    fn scale(&self) -> f64 {
        f64::from(self.dpi) / 72.0
    }

    fn validate(&self) -> Result<(), PlotError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.width_in) && valid(self.height_in) && self.dpi > 0 {
            Ok(())
        } else {
            Err(PlotError::InvalidSize {
                width_in: self.width_in,
                height_in: self.height_in,
                dpi: self.dpi,
            })
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_pixels(value: f64) -> u32 {
    value.round().max(1.0) as u32
}

/// Errors returned by [`Chart::save`].
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("invalid {axis} axis range {start}..{end}")]
    InvalidRange {
        axis: &'static str,
        start: f64,
        end: f64,
    },

    #[error("invalid figure size {width_in}x{height_in} in at {dpi} dpi")]
    InvalidSize { width_in: f64, height_in: f64, dpi: u32 },

    #[error("failed to draw `{}`: {message}", path.display())]
    Draw { path: PathBuf, message: String },
}

impl Chart {
    /// Creates an empty chart with unit axis ranges.
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            x_label: String::new(),
            y_label: String::new(),
            x_range: 0.0..1.0,
            y_range: 0.0..1.0,
            lines: Vec::new(),
            markers: Vec::new(),
        }
    }

    #[must_use]
    pub fn x_axis(mut self, label: &str, range: Range<f64>) -> Self {
        self.x_label = label.to_string();
        self.x_range = range;
        self
    }

    #[must_use]
    pub fn y_axis(mut self, label: &str, range: Range<f64>) -> Self {
        self.y_label = label.to_string();
        self.y_range = range;
        self
    }

    /// Adds a line through `points`, drawn in insertion order.
    #[must_use]
    pub fn add_series(mut self, name: &str, points: &[[f64; 2]], color: Color, line: LineStyle) -> Self {
        self.lines.push(Series {
            name: name.to_string(),
            points: points.iter().map(|&[x, y]| (x, y)).collect(),
            color,
            line,
        });
        self
    }

    /// Adds unconnected circular markers.
    #[must_use]
    pub fn add_markers(mut self, name: &str, points: &[[f64; 2]], color: Color) -> Self {
        self.markers.push(Markers {
            name: name.to_string(),
            points: points.iter().map(|&[x, y]| (x, y)).collect(),
            color,
        });
        self
    }

    /// Adds a horizontal line spanning the full x range at `y`.
    ///
    /// The span is taken from the x range at render time, so the order of
    /// this call and [`Chart::x_axis`] doesn't matter.
    #[must_use]
    pub fn add_hline(mut self, name: &str, y: f64, color: Color, line: LineStyle) -> Self {
        self.lines.push(Series {
            name: name.to_string(),
            points: vec![(f64::NEG_INFINITY, y), (f64::INFINITY, y)],
            color,
            line,
        });
        self
    }

    /// Renders the chart to `path` with the extension for `format`.
    ///
    /// Returns the path that was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an axis range or the figure size is invalid, or if
    /// the backend fails to draw or write the file.
    pub fn save(
        &self,
        path: impl AsRef<Path>,
        format: ImageFormat,
        size: FigureSize,
    ) -> Result<PathBuf, PlotError> {
        check_range("x", &self.x_range)?;
        check_range("y", &self.y_range)?;
        size.validate()?;

        let path = path.as_ref().with_extension(format.extension());
        let pixels = size.pixels();

        let drawn = match format {
            ImageFormat::Svg => {
                let root = SVGBackend::new(&path, pixels).into_drawing_area();
                self.draw(&root, size)
                    .and_then(|()| root.present())
                    .map_err(|e| e.to_string())
            }
            #[cfg(feature = "png")]
            ImageFormat::Png => {
                let root = plotters::prelude::BitMapBackend::new(&path, pixels).into_drawing_area();
                self.draw(&root, size)
                    .and_then(|()| root.present())
                    .map_err(|e| e.to_string())
            }
        };

        drawn.map_err(|message| PlotError::Draw {
            path: path.clone(),
            message,
        })?;

        log::debug!("wrote {} ({}x{} px)", path.display(), pixels.0, pixels.1);
        Ok(path)
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        size: FigureSize,
    ) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        let scale = size.scale();
        let px = |points: f64| to_pixels(points * scale);
        let stroke = px(1.5);
        let radius = px(3.5);
        let legend_len = i32::try_from(px(20.0)).unwrap_or(i32::MAX);

        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(root)
            .caption(&self.title, (FONT, 14.0 * scale))
            .margin(px(8.0))
            .x_label_area_size(px(36.0))
            .y_label_area_size(px(44.0))
            .build_cartesian_2d(self.x_range.clone(), self.y_range.clone())?;

        chart
            .configure_mesh()
            .x_desc(&self.x_label)
            .y_desc(&self.y_label)
            .label_style((FONT, 10.0 * scale))
            .axis_desc_style((FONT, 12.0 * scale))
            .bold_line_style(BLACK.mix(0.15))
            .light_line_style(BLACK.mix(0.05))
            .draw()?;

        for series in &self.lines {
            let style = series.color.rgb().stroke_width(stroke);
            let points: Vec<(f64, f64)> = series
                .points
                .iter()
                .map(|&(x, y)| (x.clamp(self.x_range.start, self.x_range.end), y))
                .collect();

            for run in clip_to_band(&points, &self.y_range) {
                match series.line {
                    LineStyle::Solid => {
                        chart.draw_series(LineSeries::new(run, style))?;
                    }
                    LineStyle::Dashed => {
                        chart.draw_series(DashedLineSeries::new(run, px(6.0), px(3.0), style))?;
                    }
                    LineStyle::Dotted => {
                        chart.draw_series(DashedLineSeries::new(run, px(1.5), px(2.5), style))?;
                    }
                }
            }

            // Legend entry, kept even when every point is out of range.
            chart
                .draw_series(std::iter::empty::<PathElement<(f64, f64)>>())?
                .label(&series.name)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + legend_len, y)], style));
        }

        for markers in &self.markers {
            let style = markers.color.rgb().filled();
            let visible = |&&(x, y): &&(f64, f64)| {
                (self.x_range.start..=self.x_range.end).contains(&x)
                    && (self.y_range.start..=self.y_range.end).contains(&y)
            };
            chart
                .draw_series(
                    markers
                        .points
                        .iter()
                        .filter(visible)
                        .map(|&point| Circle::new(point, radius, style)),
                )?
                .label(&markers.name)
                .legend(move |(x, y)| Circle::new((x + legend_len / 2, y), radius, style));
        }

        if !self.lines.is_empty() || !self.markers.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .label_font((FONT, 10.0 * scale))
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }

        Ok(())
    }
}

/// Splits a polyline into the runs that stay within `band` in y.
///
/// Segments crossing an edge are cut where they meet it. Non-finite points
/// break the line.
fn clip_to_band(points: &[(f64, f64)], band: &Range<f64>) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut run: Vec<(f64, f64)> = Vec::new();

    for pair in points.windows(2) {
        let (p, q) = (pair[0], pair[1]);
        let finite = [p.0, p.1, q.0, q.1].iter().all(|v| v.is_finite());
        let visible = if finite { visible_span(p.1, q.1, band) } else { None };

        let Some((t0, t1)) = visible else {
            if run.len() > 1 {
                runs.push(std::mem::take(&mut run));
            }
            run.clear();
            continue;
        };

        let at = |t: f64| {
            if t == 0.0 {
                p
            } else if t == 1.0 {
                q
            } else {
                (p.0 + t * (q.0 - p.0), p.1 + t * (q.1 - p.1))
            }
        };

        let continues = t0 == 0.0 && run.last() == Some(&p);
        if !continues {
            if run.len() > 1 {
                runs.push(std::mem::take(&mut run));
            }
            run = vec![at(t0)];
        }
        run.push(at(t1));

        if t1 < 1.0 {
            runs.push(std::mem::take(&mut run));
        }
    }

    if run.len() > 1 {
        runs.push(run);
    }
    runs
}

/// Parameter interval `[t0, t1]` of the segment from `y0` to `y1` that lies
/// within `band`, or `None` if the segment only touches or misses it.
fn visible_span(y0: f64, y1: f64, band: &Range<f64>) -> Option<(f64, f64)> {
    let inside = |y: f64| y >= band.start && y <= band.end;

    if y0 == y1 {
        return inside(y0).then_some((0.0, 1.0));
    }

    let a = (band.start - y0) / (y1 - y0);
    let b = (band.end - y0) / (y1 - y0);
    let t0 = if inside(y0) { 0.0 } else { a.min(b).max(0.0) };
    let t1 = if inside(y1) { 1.0 } else { a.max(b).min(1.0) };

    (t0 < t1).then_some((t0, t1))
}

fn check_range(axis: &'static str, range: &Range<f64>) -> Result<(), PlotError> {
    if range.start.is_finite() && range.end.is_finite() && range.start < range.end {
        Ok(())
    } else {
        Err(PlotError::InvalidRange {
            axis,
            start: range.start,
            end: range.end,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use approx::assert_relative_eq;

    use super::*;

    fn small() -> FigureSize {
        FigureSize {
            width_in: 4.0,
            height_in: 3.0,
            dpi: 72,
        }
    }

    fn sample() -> Chart {
        let curve: Vec<[f64; 2]> = (0..=20)
            .map(|i| {
                let x = f64::from(i) * 0.5;
                [x, (x * 0.7).sin() + 2.0]
            })
            .collect();

        Chart::new("Sample chart")
            .x_axis("Days", 0.0..10.0)
            .y_axis("Value", 0.0..4.0)
            .add_series("solid line", &curve, Color::Red, LineStyle::Solid)
            .add_series("dashed line", &curve, Color::Green, LineStyle::Dashed)
            .add_series("dotted line", &curve, Color::Black, LineStyle::Dotted)
            .add_markers("observed", &[[1.0, 3.0], [2.0, 1.0]], Color::Red)
            .add_hline("limit", 2.0, Color::Blue, LineStyle::Dashed)
    }

    #[test]
    fn default_figure_is_ten_by_six_inches_at_300_dpi() {
        assert_eq!(FigureSize::default().pixels(), (3000, 1800));
        assert_eq!(small().pixels(), (288, 216));
    }

    #[test]
    fn save_writes_svg_with_requested_extension() {
        let dir = tempfile::tempdir().unwrap();

        let path = sample()
            .save(dir.path().join("chart"), ImageFormat::Svg, small())
            .unwrap();

        assert_eq!(path, dir.path().join("chart.svg"));
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("<svg"));
        assert!(contents.contains("Sample chart"));
        assert!(contents.contains("dashed line"));
        assert!(contents.contains("observed"));
        assert!(contents.contains("<circle"));
    }

    #[test]
    fn empty_chart_still_renders() {
        let dir = tempfile::tempdir().unwrap();
        let path = Chart::new("Empty")
            .save(dir.path().join("empty.svg"), ImageFormat::Svg, small())
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let err = sample()
            .y_axis("Value", 3.0..3.0)
            .save(dir.path().join("chart"), ImageFormat::Svg, small())
            .unwrap_err();
        assert!(matches!(err, PlotError::InvalidRange { axis: "y", .. }));

        let err = sample()
            .x_axis("Days", 0.0..f64::NAN)
            .save(dir.path().join("chart"), ImageFormat::Svg, small())
            .unwrap_err();
        assert!(matches!(err, PlotError::InvalidRange { axis: "x", .. }));
    }

    #[test]
    fn invalid_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let size = FigureSize {
            dpi: 0,
            ..FigureSize::default()
        };

        let err = sample()
            .save(dir.path().join("chart"), ImageFormat::Svg, size)
            .unwrap_err();
        assert!(matches!(err, PlotError::InvalidSize { dpi: 0, .. }));
    }

    /// Vertex counts of the SVG polylines stroked in `color`.
    fn polyline_lengths(svg: &str, color: &str) -> Vec<usize> {
        let stroke = format!("stroke=\"{color}\"");
        svg.split("<polyline")
            .skip(1)
            .filter_map(|tag| tag.split("/>").next())
            .filter(|tag| tag.contains(&stroke))
            .filter_map(|tag| tag.split("points=\"").nth(1))
            .filter_map(|rest| rest.split('"').next())
            .map(|points| points.split_whitespace().count())
            .collect()
    }

    #[test]
    fn lines_are_cut_at_the_y_range() {
        let band = 0.0..4.0;

        let runs = clip_to_band(
            &[(0.0, 1.0), (1.0, 10.0), (2.0, 10.0), (3.0, 10.0), (4.0, 1.0)],
            &band,
        );
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0][0], (0.0, 1.0));
        assert_relative_eq!(runs[0][1].0, 1.0 / 3.0);
        assert_relative_eq!(runs[0][1].1, 4.0);
        assert_relative_eq!(runs[1][0].0, 11.0 / 3.0);
        assert_relative_eq!(runs[1][0].1, 4.0);
        assert_eq!(runs[1][1], (4.0, 1.0));

        let inside = [(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)];
        assert_eq!(clip_to_band(&inside, &band), vec![inside.to_vec()]);

        let crossing = clip_to_band(&[(0.0, -2.0), (1.0, 6.0)], &band);
        assert_eq!(crossing.len(), 1);
        assert_relative_eq!(crossing[0][0].1, 0.0);
        assert_relative_eq!(crossing[0][1].1, 4.0);

        assert!(clip_to_band(&[(0.0, 5.0), (1.0, 9.0)], &band).is_empty());
        assert!(clip_to_band(&[(0.0, 4.0), (1.0, 9.0)], &band).is_empty());
        assert_eq!(
            clip_to_band(&[(0.0, 1.0), (1.0, f64::NAN), (2.0, 1.0), (3.0, 2.0)], &band),
            vec![vec![(2.0, 1.0), (3.0, 2.0)]]
        );
    }

    #[test]
    fn out_of_range_values_do_not_run_along_the_border() {
        let dir = tempfile::tempdir().unwrap();
        let peaked = [[0.0, 1.0], [1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [4.0, 1.0]];

        let path = Chart::new("Clipped")
            .x_axis("Days", 0.0..4.0)
            .y_axis("Value", 0.0..4.0)
            .add_series("peaked", &peaked, Color::Red, LineStyle::Solid)
            .save(dir.path().join("clipped"), ImageFormat::Svg, small())
            .unwrap();

        let svg = fs::read_to_string(path).unwrap();
        let mut lengths = polyline_lengths(&svg, "#D62728");
        lengths.sort_unstable();

        // Two visible runs plus the legend sample, each a single segment.
        assert_eq!(lengths, vec![2, 2, 2]);
    }

    #[cfg(feature = "png")]
    #[test]
    fn png_is_the_default_format() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ImageFormat::default(), ImageFormat::Png);

        let path = sample()
            .save(dir.path().join("chart"), ImageFormat::default(), small())
            .unwrap();

        assert_eq!(path, dir.path().join("chart.png"));
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));
    }

    #[test]
    fn missing_directory_is_a_draw_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = sample()
            .save(dir.path().join("missing/chart"), ImageFormat::Svg, small())
            .unwrap_err();
        assert!(matches!(err, PlotError::Draw { .. }));
    }
}
