use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::warn;

use super::{counters, DbError, Student};
use crate::ids;

const MAX_ATTEMPTS: u32 = 3;

pub struct NewStudent<'a> {
    pub name: &'a str,
    pub course_id: Option<i32>,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub joining_date: Option<NaiveDate>,
    pub batch: Option<&'a str>,
    pub photo_url: Option<&'a str>,
}

/// Create a student with a freshly allocated `STU####` ID.
///
/// Same reserve-then-retry pattern as certificate issuance: a unique
/// violation on `student_id` draws a new serial, bounded to three
/// attempts; any other error is fatal immediately.
pub async fn create(pool: &PgPool, new: &NewStudent<'_>) -> Result<Student, DbError> {
    for attempt in 1..=MAX_ATTEMPTS {
        let serial = counters::next_student_serial(pool).await?;
        let student_id = ids::format_student_id(serial);

        match insert(pool, &student_id, new).await {
            Ok(student) => return Ok(student),
            Err(DbError::Duplicate) => {
                warn!(%student_id, attempt, "student ID collision, re-allocating");
            }
            Err(other) => return Err(other),
        }
    }

    Err(DbError::Duplicate)
}

async fn insert(
    pool: &PgPool,
    student_id: &str,
    new: &NewStudent<'_>,
) -> Result<Student, DbError> {
    sqlx::query_as::<_, Student>(
        r#"
        INSERT INTO students
            (student_id, name, course_id, email, phone, joining_date, batch, photo_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(student_id)
    .bind(new.name)
    .bind(new.course_id)
    .bind(new.email)
    .bind(new.phone)
    .bind(new.joining_date)
    .bind(new.batch)
    .bind(new.photo_url)
    .fetch_one(pool)
    .await
    .map_err(DbError::classify)
}

pub async fn find_by_student_id(
    pool: &PgPool,
    student_id: &str,
) -> Result<Option<Student>, DbError> {
    sqlx::query_as::<_, Student>("SELECT * FROM students WHERE student_id = $1")
        .bind(student_id)
        .fetch_optional(pool)
        .await
        .map_err(DbError::classify)
}
