use chrono::{NaiveDate, Utc};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use surf_report_service::app::Engine;
use surf_report_service::config::Config;
use surf_report_service::db::Cohort;
use surf_report_service::scheduler::business_date;
use surf_report_service::workers::distribution_coordinator::RunOutcome;

#[derive(Parser)]
#[command(name = "run-distribution")]
#[command(about = "Run one daily surf report distribution now (still lock-guarded)", long_about = None)]
struct Cli {
    /// Cohort to distribute: 'regular' or 'premium'
    #[arg(long)]
    cohort: Cohort,

    /// Business date key (YYYY-MM-DD); defaults to today in BUSINESS_TIMEZONE
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,surf_report_service=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let engine = Engine::from_pool(&config, pool)?;
    let now = Utc::now();
    let run_date = cli
        .date
        .unwrap_or_else(|| business_date(now, config.business_timezone));

    info!(cohort = %cli.cohort, run_date = %run_date, "Starting manual distribution run");

    match engine.coordinator(cli.cohort).run_for_date(run_date, now).await? {
        RunOutcome::Completed(counts) => info!(
            success_count = counts.success_count,
            error_count = counts.error_count,
            skipped_count = counts.skipped_count,
            "Distribution completed"
        ),
        RunOutcome::Failed { counts, message } => {
            error!(
                success_count = counts.success_count,
                error_count = counts.error_count,
                "Distribution failed: {}",
                message
            );
            std::process::exit(1);
        }
        RunOutcome::AlreadyRan(lock) => warn!(
            state = lock.state.as_str(),
            "A run already exists for this date; nothing sent"
        ),
        RunOutcome::Abandoned(lock) => warn!(
            last_run = %lock.last_run,
            "Closed a stale running lock as failed; nothing sent"
        ),
    }

    Ok(())
}
