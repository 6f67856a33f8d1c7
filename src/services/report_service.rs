use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::collaborators::{
    CollaboratorError, EmailDispatcher, NarrativeGenerator, NarrativeRequest, SurferContext,
};
use crate::db::{Cohort, DbError, Surfer, SurferDirectory};
use crate::scoring::{rank, RankedSpots, ScoredSpot, ScoringThresholds};
use crate::services::conditions_service::ConditionsService;

/// Failure while producing one surfer's report. Counted against the surfer,
/// never fatal to the batch.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to load preferences: {0}")]
    Preferences(#[from] DbError),
    #[error("Email dispatch failed: {0}")]
    Email(#[from] CollaboratorError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoPreferences,
    NoSpots,
    NoReports,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoPreferences => "no preferences",
            SkipReason::NoSpots => "no spot configured",
            SkipReason::NoReports => "no spot produced a report",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    Sent { featured: String, spot_count: usize },
    Skipped(SkipReason),
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub thresholds: ScoringThresholds,
    pub premium_max_spots: usize,
    pub regular_template_id: String,
    pub premium_template_id: String,
}

impl ReportSettings {
    fn max_spots(&self, cohort: Cohort) -> usize {
        match cohort {
            Cohort::Premium => self.premium_max_spots.max(1),
            Cohort::Regular => 1,
        }
    }

    fn template_id(&self, cohort: Cohort) -> &str {
        match cohort {
            Cohort::Premium => &self.premium_template_id,
            Cohort::Regular => &self.regular_template_id,
        }
    }
}

/// Per-surfer pipeline: preferences, per-spot conditions and narrative,
/// ranking, then the email hand-off.
#[derive(Clone)]
pub struct ReportService {
    directory: Arc<dyn SurferDirectory>,
    conditions: ConditionsService,
    narrative: Arc<dyn NarrativeGenerator>,
    email: Arc<dyn EmailDispatcher>,
    settings: ReportSettings,
}

impl ReportService {
    pub fn new(
        directory: Arc<dyn SurferDirectory>,
        conditions: ConditionsService,
        narrative: Arc<dyn NarrativeGenerator>,
        email: Arc<dyn EmailDispatcher>,
        settings: ReportSettings,
    ) -> Self {
        Self {
            directory,
            conditions,
            narrative,
            email,
            settings,
        }
    }

    #[instrument(skip(self, surfer), fields(user_id = surfer.id, cohort = %cohort))]
    pub async fn send_report(
        &self,
        surfer: &Surfer,
        cohort: Cohort,
        report_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<ReportOutcome, ReportError> {
        let Some(preferences) = self.directory.preferences(surfer.id).await? else {
            debug!("Surfer has no preferences, skipping");
            return Ok(ReportOutcome::Skipped(SkipReason::NoPreferences));
        };

        let spot_names: Vec<&str> = preferences
            .spots
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .take(self.settings.max_spots(cohort))
            .collect();

        if spot_names.is_empty() {
            debug!("Surfer has no spot configured, skipping");
            return Ok(ReportOutcome::Skipped(SkipReason::NoSpots));
        }

        let context = SurferContext::new(surfer.first_name.clone(), &preferences);

        // join_all keeps input order, which is the fetch order used for ties
        let candidates: Vec<ScoredSpot> = join_all(
            spot_names
                .iter()
                .map(|name| self.score_spot(name, &context, now)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        let Some(ranked) = rank(candidates) else {
            warn!(spots = spot_names.len(), "No spot produced a report, skipping");
            return Ok(ReportOutcome::Skipped(SkipReason::NoReports));
        };

        let payload = build_email_payload(surfer, report_date, &ranked);
        self.email
            .send(&surfer.email, self.settings.template_id(cohort), &payload)
            .await?;

        let spot_count = 1 + ranked.additional.len();
        info!(
            featured = %ranked.featured.conditions.spot_name,
            score = ranked.featured.score,
            spot_count,
            "Report sent"
        );

        Ok(ReportOutcome::Sent {
            featured: ranked.featured.conditions.spot_name,
            spot_count,
        })
    }

    /// A failing spot is dropped without affecting its siblings.
    ///
    /// Spot futures are polled together in the surfer's task, so a panic in
    /// one ends the whole report; the coordinator's `catch_unwind` counts it
    /// as that surfer's failure.
    async fn score_spot(
        &self,
        spot_name: &str,
        context: &SurferContext,
        now: DateTime<Utc>,
    ) -> Option<ScoredSpot> {
        let conditions = match self.conditions.conditions_for(spot_name, now).await {
            Ok(c) => c,
            Err(e) => {
                warn!(spot = %spot_name, error = %e, "Conditions unavailable for spot");
                return None;
            }
        };

        let request = NarrativeRequest {
            surfer: context,
            conditions: &conditions,
        };
        let narrative = match self.narrative.generate(&request).await {
            Ok(n) => n,
            Err(e) => {
                warn!(spot = %spot_name, error = %e, "Narrative generation failed for spot");
                return None;
            }
        };

        Some(ScoredSpot::new(
            conditions,
            narrative,
            &self.settings.thresholds,
        ))
    }
}

fn number(value: Option<f64>) -> String {
    value.map(|v| format!("{}", v)).unwrap_or_default()
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

/// Flat template payload. The featured spot carries every condition field and
/// the narrative copy; additional spots carry a reduced set.
pub fn build_email_payload(
    surfer: &Surfer,
    report_date: NaiveDate,
    ranked: &RankedSpots,
) -> BTreeMap<String, String> {
    let mut payload = BTreeMap::new();
    payload.insert("first_name".to_string(), text(surfer.first_name.as_deref()));
    payload.insert("report_date".to_string(), report_date.to_string());

    let featured = &ranked.featured;
    let current = &featured.conditions.current;
    let today = &featured.conditions.today;
    let tide = featured.conditions.tide.as_ref();
    let narrative = &featured.narrative;

    let fields = [
        ("spot", featured.conditions.spot_name.clone()),
        ("score", number(Some(featured.score))),
        ("skill_match", number(Some(featured.skill_match))),
        ("wave_height_ft", number(current.wave_height_ft)),
        ("wave_direction_deg", number(current.wave_direction_deg)),
        ("swell_height_ft", number(current.swell_height_ft)),
        ("swell_period_s", number(current.swell_period_s)),
        ("swell_direction_deg", number(current.swell_direction_deg)),
        ("wind_speed_mph", number(current.wind_speed_mph)),
        ("wind_direction_deg", number(current.wind_direction_deg)),
        ("wind_gust_mph", number(current.wind_gust_mph)),
        ("air_temp_f", number(current.air_temp_f)),
        ("water_temp_f", number(current.water_temp_f)),
        ("cloud_cover_pct", number(current.cloud_cover_pct)),
        ("precipitation_in", number(current.precipitation_in)),
        ("max_wave_height_ft", number(today.max_wave_height_ft)),
        ("max_temp_f", number(today.max_temp_f)),
        ("min_temp_f", number(today.min_temp_f)),
        ("tide_height_ft", number(tide.and_then(|t| t.current_height))),
        ("tide_trend", text(tide.map(|t| t.trend.as_str()))),
        (
            "next_high_ft",
            number(tide.and_then(|t| t.next_high).map(|e| e.height)),
        ),
        (
            "next_low_ft",
            number(tide.and_then(|t| t.next_low).map(|e| e.height)),
        ),
        ("headline", narrative.headline.clone()),
        ("summary", narrative.summary.clone()),
        (
            "skill_justification",
            text(narrative.skill_justification.as_deref()),
        ),
        ("best_time", text(narrative.best_time.as_deref())),
        (
            "board_recommendation",
            text(narrative.board_recommendation.as_deref()),
        ),
    ];
    for (key, value) in fields {
        payload.insert(format!("featured_{}", key), value);
    }

    payload.insert(
        "additional_count".to_string(),
        ranked.additional.len().to_string(),
    );
    for (i, spot) in ranked.additional.iter().enumerate() {
        let prefix = format!("additional_{}", i + 1);
        let current = &spot.conditions.current;
        let tide = spot.conditions.tide.as_ref();
        let fields = [
            ("spot", spot.conditions.spot_name.clone()),
            ("wave_height_ft", number(current.wave_height_ft)),
            ("swell_period_s", number(current.swell_period_s)),
            ("wind_speed_mph", number(current.wind_speed_mph)),
            ("tide_trend", text(tide.map(|t| t.trend.as_str()))),
            ("score", number(Some(spot.score))),
        ];
        for (key, value) in fields {
            payload.insert(format!("{}_{}", prefix, key), value);
        }
    }

    payload
}
