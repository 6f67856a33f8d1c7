// Postgres-backed lock and surfer repositories.
// Requires a database: DATABASE_URL=... cargo test -- --ignored

mod common;

use chrono::{Duration, NaiveDate};
use serial_test::serial;

use common::{fixed_now, test_pool};
use surf_report_service::db::{
    AcquireOutcome, Cohort, DistributionLockRepository, DistributionLockStore, LockState,
    RunCounts, SurferDirectory, SurferRepository,
};

async fn clear_lock(cohort: Cohort, date: NaiveDate) {
    sqlx::query("DELETE FROM distribution_locks WHERE cohort = $1 AND run_date = $2")
        .bind(cohort.as_str())
        .bind(date)
        .execute(test_pool().await)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_acquire_is_exclusive_per_cohort_and_date() {
    let date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
    clear_lock(Cohort::Regular, date).await;
    let repo = DistributionLockRepository::new(test_pool().await.clone());

    let first = repo
        .try_acquire(Cohort::Regular, date, fixed_now(), Duration::hours(2))
        .await
        .unwrap();
    assert!(matches!(first, AcquireOutcome::Acquired(_)));

    let second = repo
        .try_acquire(Cohort::Regular, date, fixed_now(), Duration::hours(2))
        .await
        .unwrap();
    assert!(matches!(second, AcquireOutcome::AlreadyExists(_)));
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_concurrent_acquire_has_one_winner() {
    let date = NaiveDate::from_ymd_opt(2030, 1, 2).unwrap();
    clear_lock(Cohort::Premium, date).await;
    let repo = DistributionLockRepository::new(test_pool().await.clone());

    let attempts = (0..8).map(|_| {
        let repo = repo.clone();
        tokio::spawn(async move {
            repo.try_acquire(Cohort::Premium, date, fixed_now(), Duration::hours(2))
                .await
                .unwrap()
        })
    });
    let outcomes = futures::future::join_all(attempts).await;

    let winners = outcomes
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|o| matches!(o, AcquireOutcome::Acquired(_)))
        .count();
    assert_eq!(winners, 1);
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_completion_is_terminal() {
    let date = NaiveDate::from_ymd_opt(2030, 1, 3).unwrap();
    clear_lock(Cohort::Regular, date).await;
    let repo = DistributionLockRepository::new(test_pool().await.clone());
    repo.try_acquire(Cohort::Regular, date, fixed_now(), Duration::hours(2))
        .await
        .unwrap();

    let counts = RunCounts {
        success_count: 12,
        error_count: 2,
        skipped_count: 1,
    };
    assert!(repo
        .mark_completed(Cohort::Regular, date, counts, fixed_now())
        .await
        .unwrap());
    assert!(!repo
        .mark_failed(Cohort::Regular, date, counts, "too late", fixed_now())
        .await
        .unwrap());

    let lock = repo.get(Cohort::Regular, date).await.unwrap().unwrap();
    assert_eq!(lock.state, LockState::Completed);
    assert_eq!(lock.counts(), counts);
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_stale_lock_is_abandoned() {
    let date = NaiveDate::from_ymd_opt(2030, 1, 4).unwrap();
    clear_lock(Cohort::Regular, date).await;
    let repo = DistributionLockRepository::new(test_pool().await.clone());
    repo.try_acquire(
        Cohort::Regular,
        date,
        fixed_now() - Duration::hours(6),
        Duration::hours(2),
    )
    .await
    .unwrap();

    let outcome = repo
        .try_acquire(Cohort::Regular, date, fixed_now(), Duration::hours(2))
        .await
        .unwrap();

    match outcome {
        AcquireOutcome::Abandoned(lock) => assert_eq!(lock.state, LockState::Failed),
        other => panic!("expected abandoned lock, got {:?}", other),
    }
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_surfer_directory_filters_cohort() {
    let pool = test_pool().await;
    sqlx::query("DELETE FROM surfers WHERE email LIKE '%@repo-test.example'")
        .execute(pool)
        .await
        .unwrap();
    for (email, premium, verified) in [
        ("a@repo-test.example", false, true),
        ("b@repo-test.example", true, true),
        ("c@repo-test.example", false, false),
    ] {
        sqlx::query(
            r#"
            INSERT INTO surfers (email, first_name, email_verified, is_premium, preferences)
            VALUES ($1, 'Test', $2, $3, '{"spots": ["El Porto"]}'::jsonb)
            "#,
        )
        .bind(email)
        .bind(verified)
        .bind(premium)
        .execute(pool)
        .await
        .unwrap();
    }

    let repo = SurferRepository::new(pool.clone());
    let regular = repo.eligible_surfers(Cohort::Regular).await.unwrap();
    let emails: Vec<_> = regular.iter().map(|s| s.email.as_str()).collect();
    assert!(emails.contains(&"a@repo-test.example"));
    assert!(!emails.contains(&"b@repo-test.example"));
    assert!(!emails.contains(&"c@repo-test.example"));

    let surfer = regular
        .iter()
        .find(|s| s.email == "a@repo-test.example")
        .unwrap();
    let prefs = repo.preferences(surfer.id).await.unwrap().unwrap();
    assert_eq!(prefs.spots, vec!["El Porto".to_string()]);

    repo.record_report_error(surfer.id, "boom", fixed_now())
        .await
        .unwrap();
}
