//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed points: `o`
//! - fitted line: `-`
//! - pivot of a threshold fit: `+`

use crate::fit::PivotFit;
use crate::io::fit_file::FitFile;
use crate::math::Line;

/// Scatter of the retained points, the fitted line and its pivot.
pub fn render_pivot_fit(fit: &PivotFit, label: &str, width: usize, height: usize) -> String {
    let points: Vec<(f64, f64)> = fit
        .x_selected
        .iter()
        .copied()
        .zip(fit.y_selected.iter().copied())
        .collect();
    let (x_min, x_max) = x_range(&points, None).unwrap_or((fit.x_threshold, fit.x_threshold + 1.0));
    let x_min = x_min.min(fit.x_threshold);
    let line = if fit.slope.is_finite() {
        sample_line(|x| fit.predict(x), x_min, x_max, width.max(2))
    } else {
        Vec::new()
    };

    let mut out = format!("{label}\n");
    out.push_str(&render_xy(
        &points,
        &line,
        Some((fit.x_threshold, fit.y_at_threshold)),
        width,
        height,
    ));
    out.push_str(&format!(
        "o observed  - fit  + pivot ({:.1}, {:.2})\n",
        fit.x_threshold, fit.y_at_threshold
    ));
    out
}

/// Plot a saved fit JSON file.
pub fn render_fit_file(file: &FitFile, width: usize, height: usize) -> String {
    let points: Vec<(f64, f64)> = file
        .points
        .x
        .iter()
        .copied()
        .zip(file.points.y.iter().copied())
        .collect();
    let line: Vec<(f64, f64)> = file.grid.x.iter().copied().zip(file.grid.y.iter().copied()).collect();

    let mut out = format!("{} temperature fit ({})\n", file.source.display_name(), file.generated.format("%Y-%m-%d %H:%M UTC"));
    out.push_str(&render_xy(
        &points,
        &line,
        file.x_threshold.zip(file.y_at_threshold),
        width,
        height,
    ));
    out
}

/// Scatter of one feature against the residual, with the regression line.
pub fn render_regression_plot(points: &[(f64, f64)], line: &Line, label: &str, width: usize, height: usize) -> String {
    let mut out = format!("{label}\n");
    let fitted = match x_range(points, None) {
        Some((x_min, x_max)) => vec![(x_min, line.predict(x_min)), (x_max, line.predict(x_max))],
        None => Vec::new(),
    };
    out.push_str(&render_xy(points, &fitted, None, width, height));
    out
}

/// Horizontal histogram with `bins` equal-width bins.
pub fn render_histogram(values: &[f64], bins: usize, bar_width: usize, label: &str) -> String {
    let values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let mut out = format!("{label} (n={})\n", values.len());
    let Some((min, max)) = x_range(&values.iter().map(|&v| (v, 0.0)).collect::<Vec<_>>(), None) else {
        if let Some(&v) = values.first() {
            out.push_str(&format!("{v:>10.2} | {} {}\n", "#".repeat(bar_width.max(1)), values.len()));
        }
        return out;
    };

    let bins = bins.max(1);
    let step = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &values {
        let idx = (((v - min) / step).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    let peak = counts.iter().copied().max().unwrap_or(0).max(1);
    for (i, count) in counts.iter().enumerate() {
        let lo = min + step * i as f64;
        let bar = (count * bar_width.max(1) + peak - 1) / peak;
        out.push_str(&format!("{lo:>10.2} | {:<bar_width$} {count}\n", "#".repeat(bar)));
    }
    out
}

/// Core renderer shared by every plot.
fn render_xy(
    points: &[(f64, f64)],
    line: &[(f64, f64)],
    pivot: Option<(f64, f64)>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = x_range(points, Some(line)).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = y_range(points, line, pivot).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Line first so points and the pivot overlay it.
    draw_curve(&mut grid, line, x_min, x_max, y_min, y_max);

    for &(x, y) in points {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        grid[map_y(y, y_min, y_max, height)][map_x(x, x_min, x_max, width)] = 'o';
    }

    if let Some((px, py)) = pivot.filter(|(px, py)| px.is_finite() && py.is_finite()) {
        grid[map_y(py, y_min, y_max, height)][map_x(px, x_min, x_max, width)] = '+';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: x=[{x_min:.2}, {x_max:.2}] | y=[{y_min:.2}, {y_max:.2}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn sample_line(f: impl Fn(f64) -> f64, x_min: f64, x_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let x = x_min + u * (x_max - x_min);
            (x, f(x))
        })
        .collect()
}

fn x_range(points: &[(f64, f64)], line: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    for &(x, _) in points.iter().chain(line.unwrap_or(&[]).iter()) {
        if x.is_finite() {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
        }
    }
    if min_x.is_finite() && max_x.is_finite() && max_x > min_x {
        Some((min_x, max_x))
    } else {
        None
    }
}

fn y_range(points: &[(f64, f64)], line: &[(f64, f64)], pivot: Option<(f64, f64)>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, y) in points.iter().chain(line.iter()).chain(pivot.iter()) {
        if y.is_finite() {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        if !y.is_finite() {
            prev = None;
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((c0, r0)) = prev {
            draw_line(grid, c0, r0, col, row, '-');
        } else {
            grid[row][col] = '-';
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_golden_snapshot_small() {
        let points = [(80.0, 10.0), (90.0, 28.0)];
        let line = [(80.0, 10.0), (90.0, 28.0)];
        let txt = render_xy(&points, &line, Some((80.0, 10.0)), 10, 5);
        let expected = concat!(
            "Plot: x=[80.00, 90.00] | y=[9.10, 28.90]\n",
            "        -o\n",
            "      --  \n",
            "    --    \n",
            "  --      \n",
            "+-        \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn regression_plot_draws_points_and_line() {
        let points = [(1.0, 2.0), (2.0, 4.0), (3.0, 6.5)];
        let line = Line {
            slope: 2.0,
            intercept: 0.0,
        };
        let txt = render_regression_plot(&points, &line, "Imperviousness", 20, 6);
        assert!(txt.starts_with("Imperviousness\nPlot: x=[1.00, 3.00]"));
        let grid: String = txt.lines().skip(2).collect();
        assert_eq!(grid.matches('o').count(), 3);
        assert!(grid.contains('-'));
    }

    #[test]
    fn histogram_counts_every_value() {
        let txt = render_histogram(&[0.0, 0.1, 0.2, 0.9, 1.0, f64::NAN], 2, 4, "residual");
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines[0], "residual (n=5)");
        assert_eq!(lines[1], "      0.00 | #### 3");
        assert_eq!(lines[2], "      0.50 | ###  2");
    }
}
