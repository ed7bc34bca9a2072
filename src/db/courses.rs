use sqlx::PgPool;

use super::{Course, DbError};

pub async fn create(
    pool: &PgPool,
    title: &str,
    duration_weeks: Option<i32>,
) -> Result<Course, DbError> {
    sqlx::query_as::<_, Course>(
        "INSERT INTO courses (title, duration_weeks) VALUES ($1, $2) RETURNING *",
    )
    .bind(title)
    .bind(duration_weeks)
    .fetch_one(pool)
    .await
    .map_err(DbError::classify)
}

pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Course>, DbError> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(DbError::classify)
}

pub async fn list(pool: &PgPool) -> Result<Vec<Course>, DbError> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses ORDER BY title")
        .fetch_all(pool)
        .await
        .map_err(DbError::classify)
}
