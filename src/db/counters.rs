//! Named sequence counters backing student IDs and certificate numbers.
//!
//! Correctness rests on the database serializing the increment: the
//! counter row is never read-then-written in application code, only
//! mutated through single atomic statements. Callers get back a serial
//! that no concurrent caller can also receive.

use sqlx::PgPool;

use super::DbError;
use crate::ids;

pub const STUDENT_COUNTER: &str = "student_id";
pub const CERTIFICATE_COUNTER: &str = "certificate_no";

/// Next serial for new students. Re-syncs against existing `STU####`
/// IDs so manually inserted legacy rows can never cause a collision.
pub async fn next_student_serial(pool: &PgPool) -> Result<i64, DbError> {
    let existing: Vec<String> = sqlx::query_scalar("SELECT student_id FROM students")
        .fetch_all(pool)
        .await
        .map_err(DbError::classify)?;

    let max = ids::max_serial(
        existing.iter().map(String::as_str),
        ids::parse_student_serial,
    );
    next_serial(pool, STUDENT_COUNTER, max).await
}

/// Next serial for new certificates, re-synced against existing
/// `QT-CERT-YYYY-####` numbers.
pub async fn next_certificate_serial(pool: &PgPool) -> Result<i64, DbError> {
    let existing: Vec<String> = sqlx::query_scalar("SELECT cert_no FROM certificates")
        .fetch_all(pool)
        .await
        .map_err(DbError::classify)?;

    let max = ids::max_serial(
        existing.iter().map(String::as_str),
        ids::parse_certificate_serial,
    );
    next_serial(pool, CERTIFICATE_COUNTER, max).await
}

/// Seed-if-absent, raise to the observed domain maximum, then atomically
/// increment and return the new value.
///
/// The upsert covers both seeding and re-sync in one race-safe statement:
/// a losing concurrent insert degrades to the GREATEST update, which never
/// lowers the stored value. Errors propagate uncaught; retries for
/// duplicate identifiers happen one layer up.
async fn next_serial(pool: &PgPool, key: &str, domain_max: i64) -> Result<i64, DbError> {
    sqlx::query(
        r#"
        INSERT INTO sequence_counters (counter_key, value)
        VALUES ($1, $2)
        ON CONFLICT (counter_key)
        DO UPDATE SET value = GREATEST(sequence_counters.value, EXCLUDED.value)
        "#,
    )
    .bind(key)
    .bind(domain_max)
    .execute(pool)
    .await
    .map_err(DbError::classify)?;

    let value: i64 = sqlx::query_scalar(
        "UPDATE sequence_counters SET value = value + 1 WHERE counter_key = $1 RETURNING value",
    )
    .bind(key)
    .fetch_one(pool)
    .await
    .map_err(DbError::classify)?;

    Ok(value)
}
