use sqlx::PgPool;

use super::{Certificate, CertificateDetail, DbError, StorageProvider};
use chrono::NaiveDate;

/// Fields for a certificate row reservation. The row is inserted with a
/// placeholder `pdf_url` before any asset exists, claiming the unique
/// `cert_no` so a failed render can be rolled back cleanly.
pub struct NewCertificate<'a> {
    pub cert_no: &'a str,
    pub student_id: i32,
    pub course_id: i32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub issue_date: NaiveDate,
    pub performance: Option<&'a str>,
    pub remarks: Option<&'a str>,
    pub placeholder_pdf_url: &'a str,
    pub storage_provider: StorageProvider,
}

pub async fn reserve(pool: &PgPool, new: &NewCertificate<'_>) -> Result<Certificate, DbError> {
    sqlx::query_as::<_, Certificate>(
        r#"
        INSERT INTO certificates
            (cert_no, student_id, course_id, start_date, end_date, issue_date,
             performance, remarks, pdf_url, storage_provider)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(new.cert_no)
    .bind(new.student_id)
    .bind(new.course_id)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.issue_date)
    .bind(new.performance)
    .bind(new.remarks)
    .bind(new.placeholder_pdf_url)
    .bind(new.storage_provider)
    .fetch_one(pool)
    .await
    .map_err(DbError::classify)
}

pub async fn finalize_urls(
    pool: &PgPool,
    id: i32,
    pdf_url: &str,
    image_url: Option<&str>,
) -> Result<Certificate, DbError> {
    sqlx::query_as::<_, Certificate>(
        r#"
        UPDATE certificates
        SET pdf_url = $2, image_url = $3, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(pdf_url)
    .bind(image_url)
    .fetch_one(pool)
    .await
    .map_err(DbError::classify)
}

pub async fn delete_by_id(pool: &PgPool, id: i32) -> Result<(), DbError> {
    sqlx::query("DELETE FROM certificates WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(DbError::classify)?;
    Ok(())
}

pub async fn find_by_cert_no(
    pool: &PgPool,
    cert_no: &str,
) -> Result<Option<Certificate>, DbError> {
    sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE cert_no = $1")
        .bind(cert_no)
        .fetch_optional(pool)
        .await
        .map_err(DbError::classify)
}

/// Verification read: certificate with student and course populated.
pub async fn find_detail_by_cert_no(
    pool: &PgPool,
    cert_no: &str,
) -> Result<Option<CertificateDetail>, DbError> {
    sqlx::query_as::<_, CertificateDetail>(
        r#"
        SELECT c.cert_no, c.start_date, c.end_date, c.issue_date,
               c.performance, c.remarks, c.pdf_url, c.image_url, c.storage_provider,
               s.student_id AS student_ref, s.name AS student_name,
               co.title AS course_title
        FROM certificates c
        JOIN students s ON s.id = c.student_id
        JOIN courses co ON co.id = c.course_id
        WHERE c.cert_no = $1
        "#,
    )
    .bind(cert_no)
    .fetch_optional(pool)
    .await
    .map_err(DbError::classify)
}

pub async fn list(pool: &PgPool) -> Result<Vec<Certificate>, DbError> {
    sqlx::query_as::<_, Certificate>("SELECT * FROM certificates ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
        .map_err(DbError::classify)
}
