mod models;

pub mod certificates;
pub mod counters;
pub mod courses;
pub mod students;

pub use models::*;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

pub type DbPool = Arc<PgPool>;

/// Storage error split at the one seam the retry logic cares about:
/// unique-constraint violations drive the allocate-reserve retry loops,
/// everything else is fatal immediately.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("unique constraint violation")]
    Duplicate,

    #[error(transparent)]
    Other(#[from] sqlx::Error),
}

impl DbError {
    /// Classify a driver error so callers never inspect driver internals.
    pub fn classify(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
                return DbError::Duplicate;
            }
        }
        DbError::Other(err)
    }
}

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
