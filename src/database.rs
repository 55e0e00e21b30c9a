use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

#[tracing::instrument(skip(url))]
pub async fn setup_database(url: &str) -> anyhow::Result<SqlitePool> {
    info!("Connecting to SQLite database at {url}");
    let pool = SqlitePoolOptions::new().connect(url).await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// A private in-memory database. A single connection is kept alive for the
/// lifetime of the pool, otherwise the database would vanish with it.
pub async fn setup_in_memory_database() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    info!("Running migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Done!");
    Ok(())
}
