//! ASCII hydrograph for terminal output.
//!
//! Fixed-size character grid, deterministic so it can be golden-tested.
//!
//! Plot elements:
//! - simulated discharge: `-` line
//! - observed discharge: `o` (missing days are skipped)

use chrono::{Months, NaiveDate};

/// Render observed vs simulated discharge for the last `years` of the series.
///
/// The window runs from `last_date - years` (inclusive) to the last date.
pub fn render_hydrograph(
    dates: &[NaiveDate],
    observed: &[f64],
    simulated: &[f64],
    years: u32,
    width: usize,
    height: usize,
) -> String {
    let n = dates.len().min(observed.len()).min(simulated.len());
    if n == 0 {
        return "Plot: no data\n".to_string();
    }

    let start = window_start(&dates[..n], years);
    let dates = &dates[start..n];
    let observed = &observed[start..n];
    let simulated = &simulated[start..n];

    let width = width.max(10);
    let height = height.max(5);

    let (y_min, y_max) = y_range(observed, simulated).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);
    let x_max = (dates.len() - 1).max(1) as f64;

    let mut grid = vec![vec![' '; width]; height];

    // Line first so observations overlay it.
    let curve: Vec<(f64, f64)> = simulated
        .iter()
        .enumerate()
        .filter(|(_, q)| q.is_finite())
        .map(|(i, &q)| (i as f64, q))
        .collect();
    draw_curve(&mut grid, &curve, x_max, y_min, y_max);

    for (i, &q) in observed.iter().enumerate() {
        if q.is_finite() {
            let x = map_x(i as f64, 0.0, x_max, width);
            let y = map_y(q, y_min, y_max, height);
            grid[y][x] = 'o';
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {} to {} ({} days) | Q=[{y_min:.2}, {y_max:.2}]\n",
        dates[0],
        dates[dates.len() - 1],
        dates.len()
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

/// Index of the first date within `years` of the last date.
fn window_start(dates: &[NaiveDate], years: u32) -> usize {
    let Some(&last) = dates.last() else { return 0 };
    match last.checked_sub_months(Months::new(years.saturating_mul(12))) {
        Some(cutoff) => dates.partition_point(|d| *d < cutoff),
        None => 0,
    }
}

fn y_range(observed: &[f64], simulated: &[f64]) -> Option<(f64, f64)> {
    let (min_y, max_y) = observed
        .iter()
        .chain(simulated)
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else if min_y.is_finite() {
        // Flat series: give it a unit band so it sits mid-plot.
        Some((min_y - 0.5, min_y + 0.5))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Row 0 is the top (largest discharge).
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_max: f64, y_min: f64, y_max: f64) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, q) in curve {
        let x = map_x(t, 0.0, x_max, width);
        let y = map_y(q, y_min, y_max, height);
        match prev {
            Some((x0, y0)) if (x0, y0) != (x, y) => draw_line(grid, x0, y0, x, y, '-'),
            Some(_) => {}
            None => grid[y][x] = '-',
        }
        prev = Some((x, y));
    }
}

/// Integer line drawing (Bresenham).
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

    fn days(start: &str, n: usize) -> Vec<NaiveDate> {
        NaiveDate::parse_from_str(start, "%Y-%m-%d")
            .unwrap()
            .iter_days()
            .take(n)
            .collect()
    }

    #[test]
    fn hydrograph_golden_snapshot_small() {
        let dates = days("2020-01-01", 5);
        let observed = [1.0, f64::NAN, 3.0, f64::NAN, 5.0];
        let simulated = [1.0, 2.0, 3.0, 4.0, 5.0];

        let txt = render_hydrograph(&dates, &observed, &simulated, 2, 10, 5);
        let expected = concat!(
            "Plot: 2020-01-01 to 2020-01-05 (5 days) | Q=[0.80, 5.20]\n",
            "        -o\n",
            "      --  \n",
            "    -o    \n",
            " ---      \n",
            "o         \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn only_the_last_years_are_drawn() {
        // 800 days from 2020-01-01 end on 2022-03-10; one year back is 2021-03-10.
        let dates = days("2020-01-01", 800);
        let q: Vec<f64> = (0..800).map(|i| (i % 17) as f64).collect();
        let txt = render_hydrograph(&dates, &q, &q, 1, 60, 10);
        assert!(txt.starts_with("Plot: 2021-03-10 to 2022-03-10 (366 days)"));
        assert_eq!(txt.lines().count(), 11);
    }

    #[test]
    fn short_or_flat_series_still_render() {
        assert_eq!(render_hydrograph(&[], &[], &[], 2, 10, 5), "Plot: no data\n");

        let dates = days("2020-01-01", 1);
        let txt = render_hydrograph(&dates, &[2.0], &[2.0], 2, 10, 5);
        assert_eq!(txt.lines().count(), 6);
        assert!(txt.contains('o'));
    }
}
