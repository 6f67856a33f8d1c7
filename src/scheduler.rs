use chrono::{DateTime, Duration as ChronoDuration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::workers::distribution_coordinator::{DistributionCoordinator, RunOutcome};

/// Calendar day in the business timezone; the lock date key
pub fn business_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Next instant strictly after `now` at which the local clock reads
/// `hour:minute`. A time skipped by a DST jump runs an hour later; a repeated
/// time runs at its first occurrence.
pub fn next_run_after(now: DateTime<Utc>, tz: Tz, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let today = business_date(now, tz);

    for offset in 0..=2 {
        let date = today + ChronoDuration::days(offset);
        let naive = date.and_hms_opt(hour, minute, 0)?;

        let local = match tz.from_local_datetime(&naive) {
            LocalResult::Single(t) => Some(t),
            LocalResult::Ambiguous(first, _) => Some(first),
            LocalResult::None => tz
                .from_local_datetime(&(naive + ChronoDuration::hours(1)))
                .earliest(),
        };

        if let Some(candidate) = local.map(|t| t.with_timezone(&Utc)) {
            if candidate > now {
                return Some(candidate);
            }
        }
    }

    None
}

/// Run the coordinator once a day at the configured local send time.
/// Each cohort gets its own task and its own lock.
#[instrument(skip(coordinator), fields(cohort = %coordinator.cohort(), tz = %tz))]
pub async fn start_daily_scheduler(
    coordinator: Arc<DistributionCoordinator>,
    tz: Tz,
    hour: u32,
    minute: u32,
) {
    info!(
        "Daily distribution scheduler started, send time {:02}:{:02}",
        hour, minute
    );

    loop {
        let now = Utc::now();
        let Some(next) = next_run_after(now, tz, hour, minute) else {
            error!(hour, minute, "Invalid send time, scheduler stopping");
            return;
        };

        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!(next_run = %next, wait_secs = wait.as_secs(), "Waiting for next send time");
        tokio::time::sleep(wait).await;

        let fired_at = Utc::now();
        let run_date = business_date(fired_at, tz);
        debug!(run_date = %run_date, "Scheduler tick - starting distribution");

        match coordinator.run_for_date(run_date, fired_at).await {
            Ok(RunOutcome::Completed(counts)) => info!(
                success_count = counts.success_count,
                error_count = counts.error_count,
                skipped_count = counts.skipped_count,
                "Scheduled distribution completed"
            ),
            Ok(RunOutcome::Failed { message, .. }) => {
                error!(error = %message, "Scheduled distribution failed")
            }
            Ok(RunOutcome::AlreadyRan(lock)) => debug!(
                state = lock.state.as_str(),
                "Distribution already handled for today"
            ),
            Ok(RunOutcome::Abandoned(_)) => {
                warn!("Previous run was abandoned; today's distribution needs an operator")
            }
            Err(e) => error!(error = %e, "Distribution coordinator error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Los_Angeles;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_business_date_uses_local_calendar() {
        // 03:00 UTC is still the previous evening in Los Angeles
        let now = utc(2026, 10, 20, 3, 0);
        assert_eq!(
            business_date(now, Los_Angeles),
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
        );
        assert_eq!(
            business_date(now, chrono_tz::UTC),
            NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
        );
    }

    #[test]
    fn test_next_run_later_today() {
        // 04:00 PDT
        let now = utc(2026, 10, 19, 11, 0);
        assert_eq!(
            next_run_after(now, Los_Angeles, 5, 0),
            Some(utc(2026, 10, 19, 12, 0))
        );
    }

    #[test]
    fn test_next_run_is_strictly_after_now() {
        // Exactly 05:00 PDT rolls over to tomorrow
        let now = utc(2026, 10, 19, 12, 0);
        assert_eq!(
            next_run_after(now, Los_Angeles, 5, 0),
            Some(utc(2026, 10, 20, 12, 0))
        );
    }

    #[test]
    fn test_next_run_across_fall_back() {
        // 06:00 PDT on Oct 31; Nov 1 05:00 is PST (UTC-8)
        let now = utc(2026, 10, 31, 13, 0);
        assert_eq!(
            next_run_after(now, Los_Angeles, 5, 0),
            Some(utc(2026, 11, 1, 13, 0))
        );
    }

    #[test]
    fn test_next_run_in_spring_forward_gap() {
        // 02:30 does not exist on Mar 8 2026; runs at 03:30 PDT
        let now = utc(2026, 3, 8, 8, 0);
        assert_eq!(
            next_run_after(now, Los_Angeles, 2, 30),
            Some(utc(2026, 3, 8, 10, 30))
        );
    }

    #[test]
    fn test_invalid_send_time() {
        let now = utc(2026, 10, 19, 12, 0);
        assert_eq!(next_run_after(now, Los_Angeles, 24, 0), None);
    }
}
