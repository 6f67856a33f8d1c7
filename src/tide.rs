//! Tide trend, extrema and range derived from an ordered height series.
//!
//! Thresholds absorb sensor jitter: the trend looks at the most recent
//! [`TREND_WINDOW`] samples and ignores changes below [`STABLE_DELTA`];
//! extrema and range need [`MIN_SAMPLES_FOR_EXTREMA`] samples (about half a
//! day of hourly readings) or they are reported as unknown. History windows
//! straddle `now`, so [`TideSummary::with_history`] splits them into readings
//! for the trend and predictions for the extrema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TREND_WINDOW: usize = 6;
pub const STABLE_DELTA: f64 = 0.1;
pub const MIN_SAMPLES_FOR_EXTREMA: usize = 12;

/// One tide height reading, heights in feet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TideSample {
    pub timestamp: i64,
    pub height: f64,
}

impl TideSample {
    pub fn new(timestamp: i64, height: f64) -> Self {
        Self { timestamp, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TideTrend {
    Rising,
    Falling,
    Stable,
    Unknown,
}

impl TideTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            TideTrend::Rising => "rising",
            TideTrend::Falling => "falling",
            TideTrend::Stable => "stable",
            TideTrend::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremeKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TideExtreme {
    pub time: DateTime<Utc>,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TideRange {
    pub min: f64,
    pub max: f64,
    pub range: f64,
}

/// Derived tide state for a single report cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TideSummary {
    pub current_height: Option<f64>,
    pub trend: TideTrend,
    pub next_high: Option<TideExtreme>,
    pub next_low: Option<TideExtreme>,
    pub range: Option<TideRange>,
    /// Provider that supplied the current height
    pub source: String,
}

impl TideSummary {
    /// Summary with a current height but no series to analyze
    pub fn current_only(current_height: f64, source: impl Into<String>) -> Self {
        Self {
            current_height: Some(current_height),
            trend: TideTrend::Unknown,
            next_high: None,
            next_low: None,
            range: None,
            source: source.into(),
        }
    }

    /// Fill trend, extrema and range from a history series that may extend
    /// past `now`.
    ///
    /// The trend reads only samples at or before `now`. Extrema and range stay
    /// unknown unless at least [`MIN_SAMPLES_FOR_EXTREMA`] samples lie in the future.
    pub fn with_history(mut self, samples: &[TideSample], now: DateTime<Utc>) -> Self {
        let now_ts = now.timestamp();
        let observed: Vec<TideSample> = samples
            .iter()
            .filter(|s| s.timestamp <= now_ts)
            .copied()
            .collect();
        self.trend = trend(&observed);

        let future = samples.iter().filter(|s| s.timestamp > now_ts).count();
        if future >= MIN_SAMPLES_FOR_EXTREMA {
            self.next_high = next_extreme(samples, now, ExtremeKind::High);
            self.next_low = next_extreme(samples, now, ExtremeKind::Low);
            self.range = range(samples);
        }
        self
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Direction of the tide over the most recent samples
pub fn trend(samples: &[TideSample]) -> TideTrend {
    if samples.len() < 2 {
        return TideTrend::Unknown;
    }

    let window = &samples[samples.len().saturating_sub(TREND_WINDOW)..];
    let (first, last) = match (window.first(), window.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return TideTrend::Unknown,
    };

    let delta = last.height - first.height;
    if delta.abs() < STABLE_DELTA {
        TideTrend::Stable
    } else if delta > 0.0 {
        TideTrend::Rising
    } else {
        TideTrend::Falling
    }
}

/// Highest or lowest sample strictly after `now`; first occurrence wins ties
pub fn next_extreme(
    samples: &[TideSample],
    now: DateTime<Utc>,
    kind: ExtremeKind,
) -> Option<TideExtreme> {
    if samples.len() < MIN_SAMPLES_FOR_EXTREMA {
        return None;
    }

    let now_ts = now.timestamp();
    let mut best: Option<&TideSample> = None;

    for sample in samples.iter().filter(|s| s.timestamp > now_ts) {
        let better = match (best, kind) {
            (None, _) => true,
            (Some(b), ExtremeKind::High) => sample.height > b.height,
            (Some(b), ExtremeKind::Low) => sample.height < b.height,
        };
        if better {
            best = Some(sample);
        }
    }

    best.and_then(|s| {
        DateTime::<Utc>::from_timestamp(s.timestamp, 0).map(|time| TideExtreme {
            time,
            height: s.height,
        })
    })
}

/// Min, max and spread over the whole series
pub fn range(samples: &[TideSample]) -> Option<TideRange> {
    if samples.len() < MIN_SAMPLES_FOR_EXTREMA {
        return None;
    }

    let min = samples.iter().map(|s| s.height).fold(f64::INFINITY, f64::min);
    let max = samples
        .iter()
        .map(|s| s.height)
        .fold(f64::NEG_INFINITY, f64::max);

    Some(TideRange {
        min: round2(min),
        max: round2(max),
        range: round2(max - min),
    })
}
