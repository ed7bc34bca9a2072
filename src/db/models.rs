use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Where a certificate's rendered assets live. Persisted as plain text
/// (`cloud` / `local`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Cloud,
    Local,
}

impl StorageProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageProvider::Cloud => "cloud",
            StorageProvider::Local => "local",
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for StorageProvider {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for StorageProvider {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for StorageProvider {
    fn decode(
        value: <sqlx::Postgres as sqlx::Database>::ValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        match <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)? {
            "cloud" => Ok(StorageProvider::Cloud),
            "local" => Ok(StorageProvider::Local),
            other => Err(format!("unknown storage provider: {other}").into()),
        }
    }
}

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i32,
    pub title: String,
    pub duration_weeks: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct Student {
    pub id: i32,
    pub student_id: String,
    pub name: String,
    pub course_id: Option<i32>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub joining_date: Option<NaiveDate>,
    pub batch: Option<String>,
    pub status: String,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Certificate {
    pub id: i32,
    pub cert_no: String,
    pub student_id: i32,
    pub course_id: i32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub issue_date: NaiveDate,
    pub performance: Option<String>,
    pub remarks: Option<String>,
    pub pdf_url: String,
    pub image_url: Option<String>,
    pub storage_provider: StorageProvider,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Certificate joined with its student and course, as served by the
/// public verification endpoint.
#[derive(Debug, FromRow, Serialize)]
pub struct CertificateDetail {
    pub cert_no: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub issue_date: NaiveDate,
    pub performance: Option<String>,
    pub remarks: Option<String>,
    pub pdf_url: String,
    pub image_url: Option<String>,
    pub storage_provider: StorageProvider,
    pub student_ref: String,
    pub student_name: String,
    pub course_title: String,
}
