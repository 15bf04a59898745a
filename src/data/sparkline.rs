//! Quantizing a series into discrete sparkline levels.
//!
//! Levels are relative to the visible window, not to all history: a metric
//! that drifts slowly still fills the full bar height, even if it once
//! spiked far outside its current range.

/// Number of levels the block characters can show.
pub const DEFAULT_LEVELS: usize = 8;

/// Sparkline characters (8 levels of height).
pub const SPARKLINE_CHARS: [char; DEFAULT_LEVELS] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Map each value to a level in `0..level_count`.
///
/// A flat series maps entirely to level 0, as do non-finite values.
pub fn levels(series: &[f64], level_count: usize) -> Vec<usize> {
    let top = level_count.saturating_sub(1);

    let (min, max) = series
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if !(max > min) {
        return vec![0; series.len()];
    }

    let range = max - min;
    series
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                return 0;
            }
            let normalized = (v - min) / range;
            ((normalized * top as f64).floor() as usize).min(top)
        })
        .collect()
}

/// The last `width` values of a series.
pub fn visible_window(series: &[f64], width: usize) -> &[f64] {
    &series[series.len().saturating_sub(width)..]
}

/// Quantize only what fits in `width` columns.
pub fn window_levels(series: &[f64], width: usize, level_count: usize) -> Vec<usize> {
    levels(visible_window(series, width), level_count)
}

/// Render the visible window as block characters.
pub fn render_sparkline(series: &[f64], width: usize) -> String {
    render_with_levels(series, width, DEFAULT_LEVELS)
}

/// Render with `level_count` levels spread over the available characters.
pub fn render_with_levels(series: &[f64], width: usize, level_count: usize) -> String {
    let top = level_count.saturating_sub(1).max(1);
    window_levels(series, width, level_count)
        .into_iter()
        .map(|level| {
            let idx = level * (DEFAULT_LEVELS - 1) / top;
            SPARKLINE_CHARS[idx.min(DEFAULT_LEVELS - 1)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_series_is_all_zero() {
        for count in [1, 2, 8, 100] {
            assert_eq!(levels(&[3.5; 17], count), vec![0; 17]);
        }
    }

    #[test]
    fn empty_series() {
        assert!(levels(&[], 8).is_empty());
        assert!(render_sparkline(&[], 10).is_empty());
    }

    #[test]
    fn extremes_map_to_ends() {
        assert_eq!(levels(&[0.0, 5.0, 10.0], 8), vec![0, 3, 7]);
    }

    #[test]
    fn increasing_series_is_non_decreasing() {
        let series: Vec<f64> = (0..50).map(|i| (i as f64).powf(1.7)).collect();
        let out = levels(&series, 8);
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
        assert!(out.iter().all(|&l| l < 8));
    }

    #[test]
    fn window_ignores_old_extremes() {
        // An old spike would flatten the recent values if it counted.
        let mut series = vec![1000.0];
        series.extend([10.0, 11.0, 12.0, 13.0]);

        let out = window_levels(&series, 4, 8);
        assert_eq!(out, vec![0, 2, 4, 7]);
    }

    #[test]
    fn non_finite_values_do_not_poison_range() {
        let out = levels(&[0.0, f64::NAN, 10.0, f64::INFINITY], 8);
        assert_eq!(out, vec![0, 0, 7, 0]);
    }

    #[test]
    fn zero_levels_is_all_zero() {
        assert_eq!(levels(&[1.0, 2.0], 0), vec![0, 0]);
    }

    #[test]
    fn renders_block_characters() {
        assert_eq!(render_sparkline(&[0.0, 10.0], 10), "▁█");
    }

    #[test]
    fn coarse_levels_still_span_full_height() {
        assert_eq!(render_with_levels(&[0.0, 5.0, 10.0], 10, 3), "▁▄█");
    }
}
