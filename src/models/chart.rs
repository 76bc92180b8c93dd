use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bar granularity stored in the three time-series tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timespan {
    Minute,
    Hour,
    Day,
}

impl Timespan {
    /// Provider query-string value
    pub fn as_str(&self) -> &'static str {
        match self {
            Timespan::Minute => "minute",
            Timespan::Hour => "hour",
            Timespan::Day => "day",
        }
    }

    /// Name of the backing table
    pub fn table_name(&self) -> &'static str {
        match self {
            Timespan::Minute => "minute_bars",
            Timespan::Hour => "hour_bars",
            Timespan::Day => "day_bars",
        }
    }

    pub fn all() -> [Timespan; 3] {
        [Timespan::Minute, Timespan::Hour, Timespan::Day]
    }
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Display range requested by the chart reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartRange {
    /// One trading day of minute bars
    D1,
    /// One week of hour bars
    W1,
    /// Daily bars over the remaining ranges
    M1,
    M3,
    M6,
    Ytd,
    Y1,
}

impl ChartRange {
    pub fn parse(s: &str) -> Option<ChartRange> {
        match s.to_ascii_uppercase().as_str() {
            "1D" => Some(ChartRange::D1),
            "1W" => Some(ChartRange::W1),
            "1M" => Some(ChartRange::M1),
            "3M" => Some(ChartRange::M3),
            "6M" => Some(ChartRange::M6),
            "YTD" => Some(ChartRange::Ytd),
            "1Y" => Some(ChartRange::Y1),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartRange::D1 => "1D",
            ChartRange::W1 => "1W",
            ChartRange::M1 => "1M",
            ChartRange::M3 => "3M",
            ChartRange::M6 => "6M",
            ChartRange::Ytd => "YTD",
            ChartRange::Y1 => "1Y",
        }
    }

    /// Bar granularity backing this display range
    pub fn timespan(&self) -> Timespan {
        match self {
            ChartRange::D1 => Timespan::Minute,
            ChartRange::W1 => Timespan::Hour,
            _ => Timespan::Day,
        }
    }

    /// First calendar date included in the range, relative to the last
    /// known trading day (from the freshness marker).
    pub fn window_start(&self, last_trading_day: NaiveDate) -> NaiveDate {
        match self {
            ChartRange::D1 => last_trading_day,
            ChartRange::W1 => last_trading_day - Duration::days(7),
            ChartRange::M1 => last_trading_day - Duration::days(30),
            ChartRange::M3 => last_trading_day - Duration::days(91),
            ChartRange::M6 => last_trading_day - Duration::days(182),
            ChartRange::Ytd => {
                NaiveDate::from_ymd_opt(last_trading_day.year(), 1, 1).unwrap_or(last_trading_day)
            }
            ChartRange::Y1 => last_trading_day - Duration::days(365),
        }
    }

}

impl fmt::Display for ChartRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One raw aggregate bar from the provider, before EMA alignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub ts: DateTime<Utc>,
    pub close: f64,
    pub volume: u64,
}

/// One aligned chart point: close, per-window EMAs, and volume at a shared
/// timestamp. Only timestamps present in the close/volume series and every
/// fetched EMA series make it into storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartBar {
    pub ts: DateTime<Utc>,
    pub close: f64,
    pub ema_30: Option<f64>,
    pub ema_50: Option<f64>,
    pub ema_200: Option<f64>,
    pub volume: u64,
}

/// Chart bars for one ticker across the three stored granularities
#[derive(Debug, Clone, Default)]
pub struct ChartBarSet {
    pub minute: Vec<ChartBar>,
    pub hour: Vec<ChartBar>,
    pub day: Vec<ChartBar>,
}

impl ChartBarSet {
    pub fn bars(&self, timespan: Timespan) -> &[ChartBar] {
        match timespan {
            Timespan::Minute => &self.minute,
            Timespan::Hour => &self.hour,
            Timespan::Day => &self.day,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.minute.is_empty() && self.hour.is_empty() && self.day.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        let ranges = [
            ChartRange::D1,
            ChartRange::W1,
            ChartRange::M1,
            ChartRange::M3,
            ChartRange::M6,
            ChartRange::Ytd,
            ChartRange::Y1,
        ];
        for range in ranges {
            assert_eq!(ChartRange::parse(range.as_str()), Some(range));
        }
        assert_eq!(ChartRange::parse("2W"), None);
    }

    #[test]
    fn test_range_timespans() {
        assert_eq!(ChartRange::D1.timespan(), Timespan::Minute);
        assert_eq!(ChartRange::W1.timespan(), Timespan::Hour);
        assert_eq!(ChartRange::Ytd.timespan(), Timespan::Day);
    }

    #[test]
    fn test_window_start() {
        let last = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
        assert_eq!(ChartRange::D1.window_start(last), last);
        assert_eq!(
            ChartRange::W1.window_start(last),
            NaiveDate::from_ymd_opt(2025, 6, 13).unwrap()
        );
        assert_eq!(
            ChartRange::Ytd.window_start(last),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
    }
}
