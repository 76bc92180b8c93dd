//! Technical indicators computed from provider time series
//!
//! # Series Direction Convention
//! **CRITICAL**: all daily close series passed into this module are
//! **newest-first** (the aggregates endpoint is queried with `sort=desc`).
//! "The most recent N closes" therefore means the first N elements.
//!
//! Chart EMAs are not computed here; they come from the provider's EMA
//! endpoint per window and timespan. This module owns the alignment step
//! that intersects the close/volume bars with every fetched EMA series so
//! no partially-computed chart point is ever stored.

use crate::models::{ChartBar, RawBar};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Simple moving average of the most recent `period` closes.
///
/// # Arguments
/// * `closes` - daily closes, newest-first
/// * `period` - window size in trading days (e.g. 50, 200)
///
/// When fewer than `period` closes are available the mean of what exists
/// is used (minimum 1). An empty series yields `None`.
pub fn sma_latest(closes: &[f64], period: usize) -> Option<f64> {
    if closes.is_empty() || period == 0 {
        return None;
    }
    let window = &closes[..closes.len().min(period)];
    let sum: f64 = window.iter().sum();
    Some(sum / window.len() as f64)
}

/// Percent deviation of the last close from a moving average:
/// ((last_close - average) / average) * 100, rounded to 2 decimal places.
///
/// A zero or non-finite average yields `None` rather than a division blowup.
pub fn percent_deviation(last_close: f64, average: f64) -> Option<f64> {
    if average == 0.0 || !average.is_finite() || !last_close.is_finite() {
        return None;
    }
    Some(round2((last_close - average) / average * 100.0))
}

/// Round to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Align raw aggregate bars with the fetched EMA series.
///
/// A timestamp is kept only when it appears in the close/volume bars AND in
/// every EMA series that was fetched (`Some`). A series whose fetch failed
/// (`None`) does not constrain the intersection; its column stays `NULL`
/// for all retained bars. Output preserves the input bar order.
pub fn align_chart_bars(
    bars: &[RawBar],
    ema_30: Option<&HashMap<DateTime<Utc>, f64>>,
    ema_50: Option<&HashMap<DateTime<Utc>, f64>>,
    ema_200: Option<&HashMap<DateTime<Utc>, f64>>,
) -> Vec<ChartBar> {
    bars.iter()
        .filter_map(|bar| {
            let lookup = |series: Option<&HashMap<DateTime<Utc>, f64>>| match series {
                // Fetched series missing this timestamp: drop the bar
                Some(map) => map.get(&bar.ts).copied().map(Some),
                // Series not fetched: keep the bar, leave the column empty
                None => Some(None),
            };
            let ema_30 = lookup(ema_30)?;
            let ema_50 = lookup(ema_50)?;
            let ema_200 = lookup(ema_200)?;
            Some(ChartBar {
                ts: bar.ts,
                close: bar.close,
                ema_30,
                ema_50,
                ema_200,
                volume: bar.volume,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_sma_of_constant_series_is_the_constant() {
        let closes = vec![42.5; 200];
        assert_eq!(sma_latest(&closes, 200), Some(42.5));
    }

    #[test]
    fn test_sma_uses_most_recent_window() {
        // Newest-first: only the first 3 values count for period=3
        let closes = vec![10.0, 20.0, 30.0, 1000.0, 1000.0];
        assert_eq!(sma_latest(&closes, 3), Some(20.0));
    }

    #[test]
    fn test_sma_short_series_averages_what_exists() {
        let closes = vec![10.0, 20.0];
        assert_eq!(sma_latest(&closes, 200), Some(15.0));
    }

    #[test]
    fn test_sma_empty_series() {
        assert_eq!(sma_latest(&[], 200), None);
    }

    #[test]
    fn test_percent_deviation_sign_convention() {
        assert_eq!(percent_deviation(110.0, 100.0), Some(10.0));
        assert_eq!(percent_deviation(90.0, 100.0), Some(-10.0));
    }

    #[test]
    fn test_percent_deviation_rounds_to_two_places() {
        // (101.2345 - 100) / 100 * 100 = 1.2345 -> 1.23
        assert_eq!(percent_deviation(101.2345, 100.0), Some(1.23));
    }

    #[test]
    fn test_percent_deviation_zero_average() {
        assert_eq!(percent_deviation(110.0, 0.0), None);
    }

    #[test]
    fn test_alignment_intersects_all_fetched_series() {
        let bars = vec![
            RawBar { ts: ts(100), close: 10.0, volume: 1 },
            RawBar { ts: ts(200), close: 11.0, volume: 2 },
            RawBar { ts: ts(300), close: 12.0, volume: 3 },
        ];
        let ema_30: HashMap<_, _> = [(ts(100), 9.5), (ts(200), 10.5), (ts(300), 11.5)].into();
        // ts 200 missing from the 50-window series: that bar must be dropped
        let ema_50: HashMap<_, _> = [(ts(100), 9.0), (ts(300), 11.0)].into();
        let ema_200: HashMap<_, _> = [(ts(100), 8.0), (ts(200), 8.5), (ts(300), 9.0)].into();

        let aligned = align_chart_bars(&bars, Some(&ema_30), Some(&ema_50), Some(&ema_200));
        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned[0].ts, ts(100));
        assert_eq!(aligned[0].ema_50, Some(9.0));
        assert_eq!(aligned[1].ts, ts(300));
    }

    #[test]
    fn test_alignment_skips_failed_series() {
        let bars = vec![RawBar { ts: ts(100), close: 10.0, volume: 1 }];
        let ema_30: HashMap<_, _> = [(ts(100), 9.5)].into();

        // 50 and 200 fetches failed: bars are kept, columns stay empty
        let aligned = align_chart_bars(&bars, Some(&ema_30), None, None);
        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].ema_30, Some(9.5));
        assert_eq!(aligned[0].ema_50, None);
        assert_eq!(aligned[0].ema_200, None);
    }

    #[test]
    fn test_alignment_empty_input() {
        assert!(align_chart_bars(&[], None, None, None).is_empty());
    }
}
