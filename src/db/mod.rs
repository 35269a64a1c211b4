//! Database pool setup and migration runner.
//!
//! SYSTEM CONTEXT
//! ==============
//! Called once at startup, before the listener binds: the REST surface
//! must not accept session/note traffic against an unmigrated schema.
//! The websocket coordination core never touches the pool.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

fn max_connections() -> u32 {
    std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(DEFAULT_MAX_CONNECTIONS)
}

/// Connect the shared `PostgreSQL` pool and bring the schema current.
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let max = max_connections();
    let pool = PgPoolOptions::new()
        .max_connections(max)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;
    info!(max_connections = max, "database ready");

    Ok(pool)
}
