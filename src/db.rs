use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::{info, warn};

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Errors surfaced by the entity repositories.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Maps a unique-constraint violation to `Conflict`, everything else to `Database`.
pub fn map_unique(err: sqlx::Error, conflict_msg: &str) -> RepoError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepoError::Conflict(conflict_msg.to_string())
        }
        _ => RepoError::Database(err),
    }
}

/// Builds the pool, retrying a fixed number of times before giving up.
pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let mut last_err = None;
    for attempt in 1..=CONNECT_ATTEMPTS {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(30 * 60))
            .max_lifetime(Duration::from_secs(60 * 60))
            .connect(database_url)
            .await;

        match pool {
            Ok(pool) => {
                info!(attempt, "connected to postgres");
                return Ok(pool);
            }
            Err(e) => {
                warn!(attempt, error = %e, retry_in = ?CONNECT_RETRY_DELAY, "database connection failed");
                last_err = Some(e);
                if attempt < CONNECT_ATTEMPTS {
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
            }
        }
    }

    Err(last_err
        .map(anyhow::Error::new)
        .unwrap_or_else(|| anyhow::anyhow!("no connection attempt made")))
    .with_context(|| format!("connect to database after {CONNECT_ATTEMPTS} attempts"))
}
