#![forbid(unsafe_code)]

use std::process::exit;

use indoc::formatdoc;
use roots_competitions::{
    database::setup_database,
    models::{types::UtcDateTime, Competition},
    repository::{CompetitionRepository, SeasonRepository, SeriesRepository},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::{select, signal};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Deserialize)]
struct AppConfig {
    database_url: String,
    report_competition: Option<String>,
}

#[tracing::instrument]
#[tokio::main]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        warn!("Could not load config from .env file: {err}");
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(
                    "roots_competitions=info"
                        .parse()
                        .expect("Hard-coded default directive should be correct"),
                )
                .from_env_lossy(),
        )
        .init();

    let app_config = match envy::from_env::<AppConfig>() {
        Ok(config) => config,
        Err(err) => {
            error!("Could not load app config: {err}");
            exit(255);
        }
    };

    let db_pool = match setup_database(&app_config.database_url).await {
        Ok(pool) => pool,
        Err(err) => {
            error!("Could not setup database: {err}");
            exit(255);
        }
    };

    select! {
        _ = signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        },

        result = report(&db_pool, app_config.report_competition.as_deref()) => {
            if let Err(err) = result {
                error!("Failed to build the report: {err}");
                db_pool.close().await;
                exit(1);
            }
        },
    };

    db_pool.close().await;
}

/// Prints the current state of every competition, or of the one named.
async fn report(pool: &SqlitePool, only: Option<&str>) -> anyhow::Result<()> {
    let competitions = CompetitionRepository::new(pool.clone());
    let seasons = SeasonRepository::new(pool.clone());
    let series = SeriesRepository::new(pool.clone());

    let now = UtcDateTime::now();

    let selected = match only {
        Some(name) => match competitions.get_competition_by_name(name).await? {
            Some(competition) => vec![competition],
            None => anyhow::bail!("No competition named {name}"),
        },
        None => competitions.list_competitions().await?,
    };

    for competition in selected {
        println!("{}", describe(&competition, &seasons, &series, now).await?);
    }

    Ok(())
}

async fn describe(
    competition: &Competition,
    seasons: &SeasonRepository,
    series: &SeriesRepository,
    now: UtcDateTime,
) -> anyhow::Result<String> {
    let Some(season) = seasons.get_active_season(competition.id, now).await? else {
        return Ok(format!("{competition}: no active season"));
    };

    let competitor_count = seasons.get_competitors(season.id).await?.len();

    let nearest = match series.get_series_nearest_deadline(season.id, now).await? {
        Some(nearest) => {
            let deadline = nearest
                .submission_deadline
                .map_or("no deadline".to_string(), |deadline| deadline.to_string());
            let state = if nearest.is_past_submission_deadline(now) {
                "closed"
            } else {
                "open"
            };

            format!("{nearest} (deadline {deadline}, {state})")
        }
        None => "none".to_string(),
    };

    Ok(formatdoc! {"
        {competition}
          season:      {title}
          ends:        {end}
          series:      {nearest}
          competitors: {competitor_count}",
        title = season.title(competition),
        end = season.end,
    })
}
