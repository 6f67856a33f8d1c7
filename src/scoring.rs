//! Composite desirability score and top-3 ranking of candidate spots.
//!
//! score = skill match
//!       + 10 if the tide is rising
//!       +  5 if the tide range is inside the configured band
//!       + 10 if the wave height is inside the configured band
//!       +  5 if the swell period exceeds the minimum
//!       + 10 if the wind is lighter than the maximum
//!       +  5 if the wind blows from the configured direction sector
//!
//! Bounds are exclusive. A missing input withholds its bonus.

use serde::{Deserialize, Serialize};

use crate::collaborators::SpotNarrative;
use crate::conditions::NormalizedConditions;
use crate::tide::TideTrend;

pub const RISING_TIDE_BONUS: f64 = 10.0;
pub const TIDE_RANGE_BONUS: f64 = 5.0;
pub const WAVE_HEIGHT_BONUS: f64 = 10.0;
pub const SWELL_PERIOD_BONUS: f64 = 5.0;
pub const LIGHT_WIND_BONUS: f64 = 10.0;
pub const WIND_DIRECTION_BONUS: f64 = 5.0;

/// Number of spots kept after ranking: one featured plus two additional
pub const RANKED_SPOTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringThresholds {
    pub tide_range_min_ft: f64,
    pub tide_range_max_ft: f64,
    pub wave_height_min_ft: f64,
    pub wave_height_max_ft: f64,
    pub swell_period_min_s: f64,
    pub wind_speed_max_mph: f64,
    pub wind_direction_min_deg: f64,
    pub wind_direction_max_deg: f64,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            tide_range_min_ft: 2.0,
            tide_range_max_ft: 6.0,
            wave_height_min_ft: 2.0,
            wave_height_max_ft: 6.0,
            swell_period_min_s: 8.0,
            wind_speed_max_mph: 10.0,
            wind_direction_min_deg: 180.0,
            wind_direction_max_deg: 360.0,
        }
    }
}

fn strictly_between(value: Option<f64>, low: f64, high: f64) -> bool {
    matches!(value, Some(v) if v > low && v < high)
}

/// Composite score for one spot's conditions
pub fn score(
    conditions: &NormalizedConditions,
    skill_match: f64,
    thresholds: &ScoringThresholds,
) -> f64 {
    let current = &conditions.current;
    let tide = conditions.tide.as_ref();
    let mut total = skill_match;

    if tide.map(|t| t.trend) == Some(TideTrend::Rising) {
        total += RISING_TIDE_BONUS;
    }
    if strictly_between(
        tide.and_then(|t| t.range).map(|r| r.range),
        thresholds.tide_range_min_ft,
        thresholds.tide_range_max_ft,
    ) {
        total += TIDE_RANGE_BONUS;
    }
    if strictly_between(
        current.wave_height_ft,
        thresholds.wave_height_min_ft,
        thresholds.wave_height_max_ft,
    ) {
        total += WAVE_HEIGHT_BONUS;
    }
    if matches!(current.swell_period_s, Some(p) if p > thresholds.swell_period_min_s) {
        total += SWELL_PERIOD_BONUS;
    }
    if matches!(current.wind_speed_mph, Some(w) if w < thresholds.wind_speed_max_mph) {
        total += LIGHT_WIND_BONUS;
    }
    if strictly_between(
        current.wind_direction_deg,
        thresholds.wind_direction_min_deg,
        thresholds.wind_direction_max_deg,
    ) {
        total += WIND_DIRECTION_BONUS;
    }

    total
}

/// A spot ready for ranking: conditions, narrative copy and its score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSpot {
    pub conditions: NormalizedConditions,
    pub skill_match: f64,
    pub score: f64,
    pub narrative: SpotNarrative,
}

impl ScoredSpot {
    pub fn new(
        conditions: NormalizedConditions,
        narrative: SpotNarrative,
        thresholds: &ScoringThresholds,
    ) -> Self {
        let skill_match = narrative.skill_match;
        let score = score(&conditions, skill_match, thresholds);
        Self {
            conditions,
            skill_match,
            score,
            narrative,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSpots {
    pub featured: ScoredSpot,
    pub additional: Vec<ScoredSpot>,
}

/// Sort descending by score, keeping input (fetch) order for equal scores,
/// and keep the top three. `None` when there is nothing to rank.
pub fn rank(mut candidates: Vec<ScoredSpot>) -> Option<RankedSpots> {
    // sort_by is stable
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(RANKED_SPOTS);

    let mut iter = candidates.into_iter();
    let featured = iter.next()?;
    Some(RankedSpots {
        featured,
        additional: iter.collect(),
    })
}
