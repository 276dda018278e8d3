//! SVG Chart Generator
//!
//! Generates clean SVG charts for the EDA and training reports. A chart is
//! rendered into a [`Panel`] (a rectangle of a [`Figure`]), so several
//! charts can share one file the way a subplot grid does.

use std::f64::consts::PI;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Chart styling constants
const PANEL_WIDTH: f64 = 640.0;
const PANEL_HEIGHT: f64 = 460.0;
const FIGURE_TITLE_HEIGHT: f64 = 50.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 70.0;
const MARGIN_LEFT: f64 = 75.0;

pub const COLOR_WILDFIRE: &str = "#e63946";
pub const COLOR_NO_WILDFIRE: &str = "#06d6a0";
pub const COLOR_TRAIN: &str = "#667eea";
pub const COLOR_VALID: &str = "#764ba2";
pub const COLOR_TEST: &str = "#f7931e";
pub const COLOR_PRIMARY: &str = "#3498db";
pub const COLOR_SECONDARY: &str = "#e67e22";
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";
const FONT: &str = "Arial, sans-serif";

/// A data point for a line chart
#[derive(Debug, Clone)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
}

/// A data series for line charts
#[derive(Debug, Clone)]
pub struct DataSeries {
    pub name: String,
    pub points: Vec<DataPoint>,
    pub color: String,
    pub dashed: bool,
}

impl DataSeries {
    pub fn new(name: &str, color: &str, points: Vec<(f64, f64)>) -> Self {
        Self {
            name: name.to_string(),
            points: points.into_iter().map(|(x, y)| DataPoint { x, y }).collect(),
            color: color.to_string(),
            dashed: false,
        }
    }

    pub fn dashed(mut self) -> Self {
        self.dashed = true;
        self
    }
}

/// Bar (or pie slice) data
#[derive(Debug, Clone)]
pub struct BarData {
    pub label: String,
    pub value: f64,
    pub color: String,
}

impl BarData {
    pub fn new(label: &str, value: f64, color: &str) -> Self {
        Self {
            label: label.to_string(),
            value,
            color: color.to_string(),
        }
    }
}

/// A category on the x axis with one bar per series
#[derive(Debug, Clone)]
pub struct BarGroup {
    pub label: String,
    pub bars: Vec<BarData>,
}

/// Values whose distribution is drawn by [`histogram`]
#[derive(Debug, Clone)]
pub struct HistogramSeries {
    pub name: String,
    pub values: Vec<f64>,
    pub color: String,
}

/// Rectangle of a figure that one chart is drawn into
#[derive(Debug, Clone, Copy)]
pub struct Panel {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Panel {
    fn plot_left(&self) -> f64 {
        self.x + MARGIN_LEFT
    }

    fn plot_top(&self) -> f64 {
        self.y + MARGIN_TOP
    }

    fn plot_width(&self) -> f64 {
        self.width - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height(&self) -> f64 {
        self.height - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn plot_bottom(&self) -> f64 {
        self.plot_top() + self.plot_height()
    }

    fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }
}

/// Grid of panels saved as a single SVG document
pub struct Figure {
    title: String,
    cols: usize,
    rows: usize,
    body: String,
}

impl Figure {
    pub fn new(title: &str, cols: usize, rows: usize) -> Self {
        Self {
            title: title.to_string(),
            cols: cols.max(1),
            rows: rows.max(1),
            body: String::new(),
        }
    }

    /// Panel at `index` in row-major order
    pub fn panel(&self, index: usize) -> Panel {
        let col = index % self.cols;
        let row = index / self.cols;
        Panel {
            x: col as f64 * PANEL_WIDTH,
            y: FIGURE_TITLE_HEIGHT + row as f64 * PANEL_HEIGHT,
            width: PANEL_WIDTH,
            height: PANEL_HEIGHT,
        }
    }

    pub fn width(&self) -> f64 {
        self.cols as f64 * PANEL_WIDTH
    }

    pub fn height(&self) -> f64 {
        FIGURE_TITLE_HEIGHT + self.rows as f64 * PANEL_HEIGHT
    }

    /// Append a rendered chart fragment
    pub fn push(&mut self, fragment: String) {
        self.body.push_str(&fragment);
    }

    pub fn render(&self) -> String {
        let (w, h) = (self.width(), self.height());
        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#
        );
        let _ = write!(svg, r#"<rect width="{w}" height="{h}" fill="white"/>"#);
        let _ = write!(
            svg,
            r#"<text x="{}" y="32" text-anchor="middle" font-family="{FONT}" font-size="22" font-weight="bold" fill="{COLOR_TEXT}">{}</text>"#,
            w / 2.0,
            escape_xml(&self.title)
        );
        svg.push_str(&self.body);
        svg.push_str("</svg>");
        svg
    }

    pub fn save(&self, output_path: &Path) -> std::io::Result<()> {
        fs::write(output_path, self.render())
    }
}

fn panel_title(svg: &mut String, panel: &Panel, title: &str) {
    let _ = write!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="{FONT}" font-size="16" font-weight="bold" fill="{COLOR_TEXT}">{}</text>"#,
        panel.center_x(),
        panel.y + 30.0,
        escape_xml(title)
    );
}

fn axis_labels(svg: &mut String, panel: &Panel, x_label: &str, y_label: &str) {
    let _ = write!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="{FONT}" font-size="13" fill="{COLOR_TEXT}">{}</text>"#,
        panel.plot_left() + panel.plot_width() / 2.0,
        panel.y + panel.height - 20.0,
        escape_xml(x_label)
    );
    let ly = panel.plot_top() + panel.plot_height() / 2.0;
    let lx = panel.x + 18.0;
    let _ = write!(
        svg,
        r#"<text x="{lx}" y="{ly}" text-anchor="middle" font-family="{FONT}" font-size="13" fill="{COLOR_TEXT}" transform="rotate(-90 {lx} {ly})">{}</text>"#,
        escape_xml(y_label)
    );
}

/// Horizontal grid with y tick labels plus both axes
fn grid_and_axes(svg: &mut String, panel: &Panel, y_min: f64, y_max: f64) {
    let span = y_max - y_min;
    for i in 0..=5 {
        let frac = i as f64 / 5.0;
        let y = panel.plot_bottom() - frac * panel.plot_height();
        let value = y_min + frac * span;
        let _ = write!(
            svg,
            r#"<line x1="{}" y1="{y}" x2="{}" y2="{y}" stroke="{COLOR_GRID}" stroke-width="1"/>"#,
            panel.plot_left(),
            panel.plot_left() + panel.plot_width()
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="end" font-family="{FONT}" font-size="11" fill="{COLOR_TEXT}">{}</text>"#,
            panel.plot_left() - 8.0,
            y + 4.0,
            format_tick(value, span)
        );
    }
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{COLOR_AXIS}" stroke-width="2"/>"#,
        panel.plot_left(),
        panel.plot_bottom(),
        panel.plot_left() + panel.plot_width(),
        panel.plot_bottom()
    );
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{COLOR_AXIS}" stroke-width="2"/>"#,
        panel.plot_left(),
        panel.plot_top(),
        panel.plot_left(),
        panel.plot_bottom()
    );
}

fn legend(svg: &mut String, panel: &Panel, entries: &[(&str, &str)]) {
    let mut y = panel.plot_top() + 8.0;
    let x = panel.plot_left() + panel.plot_width() - 150.0;
    for (name, color) in entries {
        let _ = write!(
            svg,
            r#"<rect x="{x}" y="{y}" width="14" height="14" fill="{color}"/>"#
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" font-family="{FONT}" font-size="12" fill="{COLOR_TEXT}">{}</text>"#,
            x + 20.0,
            y + 11.0,
            escape_xml(name)
        );
        y += 22.0;
    }
}

/// Line chart. `y_range` fixes the vertical axis; otherwise it is fitted to the data.
pub fn line_chart(
    panel: Panel,
    title: &str,
    x_label: &str,
    y_label: &str,
    series: &[DataSeries],
    y_range: Option<(f64, f64)>,
) -> String {
    let mut svg = String::new();
    panel_title(&mut svg, &panel, title);

    let (x_min, x_max, data_y_min, data_y_max) = find_ranges(series);
    if !x_min.is_finite() {
        axis_labels(&mut svg, &panel, x_label, y_label);
        return svg;
    }
    let (y_min, y_max) = y_range.unwrap_or_else(|| pad_range(data_y_min, data_y_max));
    let x_span = if x_max > x_min { x_max - x_min } else { 1.0 };
    let y_span = if y_max > y_min { y_max - y_min } else { 1.0 };

    grid_and_axes(&mut svg, &panel, y_min, y_min + y_span);
    axis_labels(&mut svg, &panel, x_label, y_label);

    let to_x = |x: f64| panel.plot_left() + ((x - x_min) / x_span) * panel.plot_width();
    let to_y = |y: f64| panel.plot_bottom() - ((y - y_min) / y_span) * panel.plot_height();

    for s in series.iter().filter(|s| !s.points.is_empty()) {
        let mut path = String::new();
        for (i, p) in s.points.iter().enumerate() {
            let cmd = if i == 0 { "M" } else { " L" };
            let _ = write!(path, "{} {:.2} {:.2}", cmd, to_x(p.x), to_y(p.y));
        }
        let dash = if s.dashed { r#" stroke-dasharray="8 6""# } else { "" };
        let _ = write!(
            svg,
            r#"<path d="{path}" fill="none" stroke="{}" stroke-width="2.5"{dash}/>"#,
            s.color
        );
    }

    // x ticks
    for i in 0..=5 {
        let value = x_min + (i as f64 / 5.0) * x_span;
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{}" text-anchor="middle" font-family="{FONT}" font-size="11" fill="{COLOR_TEXT}">{}</text>"#,
            to_x(value),
            panel.plot_bottom() + 18.0,
            format_tick(value, x_span)
        );
    }

    let entries: Vec<(&str, &str)> = series
        .iter()
        .map(|s| (s.name.as_str(), s.color.as_str()))
        .collect();
    legend(&mut svg, &panel, &entries);
    svg
}

/// Bars grouped per category, one colour per series
pub fn grouped_bar_chart(panel: Panel, title: &str, y_label: &str, groups: &[BarGroup]) -> String {
    let mut svg = String::new();
    panel_title(&mut svg, &panel, title);

    let y_max = groups
        .iter()
        .flat_map(|g| g.bars.iter().map(|b| b.value))
        .fold(0.0f64, f64::max);
    let y_max = nice_ceiling(y_max);
    grid_and_axes(&mut svg, &panel, 0.0, y_max);
    axis_labels(&mut svg, &panel, "", y_label);

    if groups.is_empty() {
        return svg;
    }
    let group_width = panel.plot_width() / groups.len() as f64;
    let bars_per_group = groups.iter().map(|g| g.bars.len()).max().unwrap_or(1).max(1);
    let bar_width = group_width * 0.8 / bars_per_group as f64;

    for (gi, group) in groups.iter().enumerate() {
        let group_x = panel.plot_left() + gi as f64 * group_width + group_width * 0.1;
        for (bi, bar) in group.bars.iter().enumerate() {
            let x = group_x + bi as f64 * bar_width;
            let h = bar.value / y_max * panel.plot_height();
            let y = panel.plot_bottom() - h;
            let _ = write!(
                svg,
                r#"<rect x="{x:.2}" y="{y:.2}" width="{:.2}" height="{h:.2}" fill="{}" rx="3"/>"#,
                bar_width * 0.9,
                bar.color
            );
            let _ = write!(
                svg,
                r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-family="{FONT}" font-size="10" font-weight="bold" fill="{COLOR_TEXT}">{}</text>"#,
                x + bar_width * 0.45,
                y - 5.0,
                format_count(bar.value)
            );
        }
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{}" text-anchor="middle" font-family="{FONT}" font-size="12" font-weight="bold" fill="{COLOR_TEXT}">{}</text>"#,
            group_x + group_width * 0.4,
            panel.plot_bottom() + 20.0,
            escape_xml(&group.label)
        );
    }

    let entries: Vec<(&str, &str)> = groups[0]
        .bars
        .iter()
        .map(|b| (b.label.as_str(), b.color.as_str()))
        .collect();
    legend(&mut svg, &panel, &entries);
    svg
}

/// One bar per category, segments stacked bottom-up
pub fn stacked_bar_chart(panel: Panel, title: &str, y_label: &str, groups: &[BarGroup]) -> String {
    let mut svg = String::new();
    panel_title(&mut svg, &panel, title);

    let y_max = groups
        .iter()
        .map(|g| g.bars.iter().map(|b| b.value).sum::<f64>())
        .fold(0.0f64, f64::max);
    let y_max = nice_ceiling(y_max);
    grid_and_axes(&mut svg, &panel, 0.0, y_max);
    axis_labels(&mut svg, &panel, "", y_label);

    if groups.is_empty() {
        return svg;
    }
    let slot = panel.plot_width() / groups.len() as f64;
    let bar_width = slot * 0.6;

    for (gi, group) in groups.iter().enumerate() {
        let x = panel.plot_left() + gi as f64 * slot + slot * 0.2;
        let mut base = panel.plot_bottom();
        for bar in &group.bars {
            let h = bar.value / y_max * panel.plot_height();
            let _ = write!(
                svg,
                r#"<rect x="{x:.2}" y="{:.2}" width="{bar_width:.2}" height="{h:.2}" fill="{}" stroke="white" stroke-width="1"/>"#,
                base - h,
                bar.color
            );
            if h > 14.0 {
                let _ = write!(
                    svg,
                    r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-family="{FONT}" font-size="11" fill="white">{}</text>"#,
                    x + bar_width / 2.0,
                    base - h / 2.0 + 4.0,
                    format_count(bar.value)
                );
            }
            base -= h;
        }
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{}" text-anchor="middle" font-family="{FONT}" font-size="12" font-weight="bold" fill="{COLOR_TEXT}">{}</text>"#,
            x + bar_width / 2.0,
            panel.plot_bottom() + 20.0,
            escape_xml(&group.label)
        );
    }

    let entries: Vec<(&str, &str)> = groups[0]
        .bars
        .iter()
        .map(|b| (b.label.as_str(), b.color.as_str()))
        .collect();
    legend(&mut svg, &panel, &entries);
    svg
}

/// Pie chart with percentage labels
pub fn pie_chart(panel: Panel, title: &str, slices: &[BarData]) -> String {
    let mut svg = String::new();
    panel_title(&mut svg, &panel, title);

    let total: f64 = slices.iter().map(|s| s.value).sum();
    if total <= 0.0 {
        return svg;
    }
    let cx = panel.center_x();
    let cy = panel.y + MARGIN_TOP + (panel.height - MARGIN_TOP) / 2.0;
    let r = (panel.width.min(panel.height - MARGIN_TOP) / 2.0 - 50.0).max(10.0);

    let mut angle = -PI / 2.0;
    for slice in slices.iter().filter(|s| s.value > 0.0) {
        let frac = slice.value / total;
        let sweep = frac * 2.0 * PI;
        if frac >= 1.0 {
            let _ = write!(
                svg,
                r#"<circle cx="{cx:.2}" cy="{cy:.2}" r="{r:.2}" fill="{}" stroke="white" stroke-width="2"/>"#,
                slice.color
            );
        } else {
            let (x1, y1) = (cx + r * angle.cos(), cy + r * angle.sin());
            let end = angle + sweep;
            let (x2, y2) = (cx + r * end.cos(), cy + r * end.sin());
            let large = if sweep > PI { 1 } else { 0 };
            let _ = write!(
                svg,
                r#"<path d="M {cx:.2} {cy:.2} L {x1:.2} {y1:.2} A {r:.2} {r:.2} 0 {large} 1 {x2:.2} {y2:.2} Z" fill="{}" stroke="white" stroke-width="2"/>"#,
                slice.color
            );
        }

        let mid = angle + sweep / 2.0;
        let (lx, ly) = (cx + r * 0.6 * mid.cos(), cy + r * 0.6 * mid.sin());
        let _ = write!(
            svg,
            r#"<text x="{lx:.2}" y="{ly:.2}" text-anchor="middle" font-family="{FONT}" font-size="13" font-weight="bold" fill="white">{:.1}%</text>"#,
            frac * 100.0
        );
        let (ox, oy) = (cx + (r + 18.0) * mid.cos(), cy + (r + 18.0) * mid.sin());
        let anchor = if mid.cos() >= 0.0 { "start" } else { "end" };
        let _ = write!(
            svg,
            r#"<text x="{ox:.2}" y="{oy:.2}" text-anchor="{anchor}" font-family="{FONT}" font-size="12" fill="{COLOR_TEXT}">{}</text>"#,
            escape_xml(&slice.label)
        );
        angle += sweep;
    }
    svg
}

/// Equal-width bin counts of `values` over `[min, max]`
pub fn histogram_counts(values: &[f64], bins: usize, min: f64, max: f64) -> Vec<usize> {
    let bins = bins.max(1);
    let mut counts = vec![0usize; bins];
    let span = max - min;
    for &v in values.iter().filter(|v| v.is_finite()) {
        let idx = if span <= 0.0 {
            0
        } else {
            (((v - min) / span) * bins as f64).floor() as isize
        };
        let idx = idx.clamp(0, bins as isize - 1) as usize;
        counts[idx] += 1;
    }
    counts
}

/// Overlaid histograms sharing the same bin edges
pub fn histogram(
    panel: Panel,
    title: &str,
    x_label: &str,
    series: &[HistogramSeries],
    bins: usize,
) -> String {
    let mut svg = String::new();
    panel_title(&mut svg, &panel, title);

    let all = series.iter().flat_map(|s| s.values.iter().copied());
    let (min, max) = all.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() {
        axis_labels(&mut svg, &panel, x_label, "Frequency");
        return svg;
    }
    let max = if max > min { max } else { min + 1.0 };

    let counts: Vec<Vec<usize>> = series
        .iter()
        .map(|s| histogram_counts(&s.values, bins, min, max))
        .collect();
    let peak = counts.iter().flatten().copied().max().unwrap_or(0) as f64;
    let y_max = nice_ceiling(peak);

    grid_and_axes(&mut svg, &panel, 0.0, y_max);
    axis_labels(&mut svg, &panel, x_label, "Frequency");

    let bin_width = panel.plot_width() / bins.max(1) as f64;
    for (s, c) in series.iter().zip(&counts) {
        for (i, &n) in c.iter().enumerate() {
            if n == 0 {
                continue;
            }
            let h = n as f64 / y_max * panel.plot_height();
            let _ = write!(
                svg,
                r#"<rect x="{:.2}" y="{:.2}" width="{bin_width:.2}" height="{h:.2}" fill="{}" fill-opacity="0.6" stroke="black" stroke-width="0.5"/>"#,
                panel.plot_left() + i as f64 * bin_width,
                panel.plot_bottom() - h,
                s.color
            );
        }
    }

    for i in 0..=5 {
        let frac = i as f64 / 5.0;
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{}" text-anchor="middle" font-family="{FONT}" font-size="11" fill="{COLOR_TEXT}">{}</text>"#,
            panel.plot_left() + frac * panel.plot_width(),
            panel.plot_bottom() + 18.0,
            format_tick(min + frac * (max - min), max - min)
        );
    }

    let entries: Vec<(&str, &str)> = series
        .iter()
        .map(|s| (s.name.as_str(), s.color.as_str()))
        .collect();
    legend(&mut svg, &panel, &entries);
    svg
}

/// Annotated heatmap, rows top to bottom
pub fn heatmap(
    panel: Panel,
    title: &str,
    x_label: &str,
    y_label: &str,
    labels: &[String],
    values: &[Vec<f64>],
) -> String {
    let mut svg = String::new();
    panel_title(&mut svg, &panel, title);
    axis_labels(&mut svg, &panel, x_label, y_label);

    let n = labels.len().max(1);
    let size = panel.plot_width().min(panel.plot_height());
    let cell = size / n as f64;
    let left = panel.plot_left() + (panel.plot_width() - size) / 2.0;
    let top = panel.plot_top();
    let max = values.iter().flatten().copied().fold(0.0f64, f64::max).max(1e-12);

    for (r, row) in values.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            let intensity = v / max;
            let fill = blues(intensity);
            let text_color = if intensity > 0.5 { "white" } else { COLOR_TEXT };
            let x = left + c as f64 * cell;
            let y = top + r as f64 * cell;
            let _ = write!(
                svg,
                r#"<rect x="{x:.2}" y="{y:.2}" width="{cell:.2}" height="{cell:.2}" fill="{fill}" stroke="white" stroke-width="2"/>"#
            );
            let _ = write!(
                svg,
                r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-family="{FONT}" font-size="20" font-weight="bold" fill="{text_color}">{}</text>"#,
                x + cell / 2.0,
                y + cell / 2.0 + 7.0,
                format_count(v)
            );
        }
    }

    for (i, label) in labels.iter().enumerate() {
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-family="{FONT}" font-size="12" fill="{COLOR_TEXT}">{}</text>"#,
            left + i as f64 * cell + cell / 2.0,
            top + size + 18.0,
            escape_xml(label)
        );
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="end" font-family="{FONT}" font-size="12" fill="{COLOR_TEXT}">{}</text>"#,
            left - 6.0,
            top + i as f64 * cell + cell / 2.0 + 4.0,
            escape_xml(label)
        );
    }
    svg
}

/// White to dark blue
fn blues(t: f64) -> String {
    let t = t.clamp(0.0, 1.0);
    let lerp = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    format!("#{:02x}{:02x}{:02x}", lerp(247.0, 8.0), lerp(251.0, 48.0), lerp(255.0, 107.0))
}

fn find_ranges(series: &[DataSeries]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for s in series {
        for p in &s.points {
            x_min = x_min.min(p.x);
            x_max = x_max.max(p.x);
            y_min = y_min.min(p.y);
            y_max = y_max.max(p.y);
        }
    }

    (x_min, x_max, y_min, y_max)
}

fn pad_range(min: f64, max: f64) -> (f64, f64) {
    if max <= min {
        return (min - 0.5, max + 0.5);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

/// Round up to 1, 2 or 5 times a power of ten
fn nice_ceiling(value: f64) -> f64 {
    if value <= 0.0 {
        return 1.0;
    }
    let magnitude = 10f64.powi(value.log10().floor() as i32);
    let normalized = value / magnitude;
    let step = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };
    step * magnitude
}

fn format_tick(value: f64, span: f64) -> String {
    if span >= 10.0 {
        format!("{:.0}", value)
    } else if span >= 1.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.2}", value)
    }
}

fn format_count(value: f64) -> String {
    if value.fract() == 0.0 {
        super::format_number(value as usize)
    } else {
        format!("{:.2}", value)
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_figure_panels_are_row_major() {
        let fig = Figure::new("Grid", 2, 2);
        let p1 = fig.panel(1);
        let p2 = fig.panel(2);
        assert!(p1.x > 0.0 && p1.y == fig.panel(0).y);
        assert!(p2.x == 0.0 && p2.y > p1.y);
        assert_eq!(fig.width(), 2.0 * PANEL_WIDTH);
    }

    #[test]
    fn test_histogram_counts_clamps_edges() {
        let values = [0.0, 0.1, 0.5, 0.99, 1.0];
        let counts = histogram_counts(&values, 2, 0.0, 1.0);
        assert_eq!(counts, vec![2, 3]);
        assert_eq!(counts.iter().sum::<usize>(), values.len());
    }

    #[test]
    fn test_histogram_counts_degenerate_range() {
        let counts = histogram_counts(&[3.0, 3.0], 30, 3.0, 3.0);
        assert_eq!(counts[0], 2);
    }

    #[test]
    fn test_nice_ceiling() {
        assert_eq!(nice_ceiling(0.0), 1.0);
        assert_eq!(nice_ceiling(7.0), 10.0);
        assert_eq!(nice_ceiling(130.0), 200.0);
        assert_eq!(nice_ceiling(4500.0), 5000.0);
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a < b & c"), "a &lt; b &amp; c");
    }

    #[test]
    fn test_full_figure_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("figure.svg");

        let mut fig = Figure::new("Dataset Distribution", 2, 2);
        let groups = vec![BarGroup {
            label: "Train".to_string(),
            bars: vec![
                BarData::new("Wildfire", 15750.0, COLOR_WILDFIRE),
                BarData::new("No Wildfire", 14500.0, COLOR_NO_WILDFIRE),
            ],
        }];
        fig.push(grouped_bar_chart(fig.panel(0), "By Split", "Images", &groups));
        fig.push(pie_chart(
            fig.panel(1),
            "Classes",
            &[
                BarData::new("Wildfire", 3.0, COLOR_WILDFIRE),
                BarData::new("No Wildfire", 1.0, COLOR_NO_WILDFIRE),
            ],
        ));
        fig.push(line_chart(
            fig.panel(2),
            "ROC",
            "FPR",
            "TPR",
            &[DataSeries::new("Random", COLOR_SECONDARY, vec![(0.0, 0.0), (1.0, 1.0)]).dashed()],
            Some((0.0, 1.0)),
        ));
        fig.push(heatmap(
            fig.panel(3),
            "Confusion",
            "Predicted",
            "True",
            &["No Wildfire".to_string(), "Wildfire".to_string()],
            &[vec![10.0, 2.0], vec![1.0, 12.0]],
        ));
        fig.save(&path).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("75.0%"));
        assert!(svg.contains("stroke-dasharray"));
        assert!(svg.contains("15,750"));
    }
}
