//! Certificate issuance orchestration.
//!
//! One issuance attempt runs allocate -> format -> reserve -> render ->
//! upload -> finalize, strictly in order. Only a `cert_no` uniqueness
//! violation at the reserve step triggers a retry (three attempts total);
//! every other failure rolls back all side effects of the attempt before
//! propagating, so a failed call leaves no orphaned row or files behind.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::certificates::NewCertificate;
use crate::db::{self, Certificate, DbError, DbPool, StorageProvider};
use crate::error::AppError;
use crate::ids;
use crate::render::{CertificateData, CertificateRenderer};
use crate::storage::{asset_filename, AssetKind, StorageBackend};

const MAX_ATTEMPTS: u32 = 3;

/// Validated issuance input. Student and course have already been
/// resolved by the caller; no allocation happens before that point.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub student_row_id: i32,
    pub course_row_id: i32,
    pub student_name: String,
    pub course_title: String,
    pub photo_source: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub issue_date: Option<NaiveDate>,
    pub performance: Option<String>,
    pub remarks: Option<String>,
}

/// Database seam for issuance, split out so the retry and rollback logic
/// is testable without a live Postgres.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    async fn next_serial(&self) -> Result<i64, DbError>;
    async fn reserve(&self, new: &NewCertificate<'_>) -> Result<Certificate, DbError>;
    async fn finalize(
        &self,
        id: i32,
        pdf_url: &str,
        image_url: Option<&str>,
    ) -> Result<Certificate, DbError>;
    async fn delete_reserved(&self, id: i32) -> Result<(), DbError>;
}

pub struct PgCertificateStore {
    pool: DbPool,
}

impl PgCertificateStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CertificateStore for PgCertificateStore {
    async fn next_serial(&self) -> Result<i64, DbError> {
        db::counters::next_certificate_serial(&self.pool).await
    }

    async fn reserve(&self, new: &NewCertificate<'_>) -> Result<Certificate, DbError> {
        db::certificates::reserve(&self.pool, new).await
    }

    async fn finalize(
        &self,
        id: i32,
        pdf_url: &str,
        image_url: Option<&str>,
    ) -> Result<Certificate, DbError> {
        db::certificates::finalize_urls(&self.pool, id, pdf_url, image_url).await
    }

    async fn delete_reserved(&self, id: i32) -> Result<(), DbError> {
        db::certificates::delete_by_id(&self.pool, id).await
    }
}

pub async fn issue_certificate(
    store: &dyn CertificateStore,
    renderer: &dyn CertificateRenderer,
    backend: &dyn StorageBackend,
    config: &Config,
    req: IssueRequest,
) -> Result<Certificate, AppError> {
    let issue_date = req.issue_date.unwrap_or_else(|| Utc::now().date_naive());
    let year = issue_date.year();

    for attempt in 1..=MAX_ATTEMPTS {
        let serial = match store.next_serial().await {
            Ok(s) => s,
            Err(e) => return Err(e.into()),
        };
        let cert_no = ids::format_certificate_no(serial, year);

        // Placeholder claims the unique cert_no before any asset exists.
        let placeholder = format!(
            "/uploads/certificates/{}",
            asset_filename(&cert_no, AssetKind::Pdf)
        );
        let reservation = NewCertificate {
            cert_no: &cert_no,
            student_id: req.student_row_id,
            course_id: req.course_row_id,
            start_date: req.start_date,
            end_date: req.end_date,
            issue_date,
            performance: req.performance.as_deref(),
            remarks: req.remarks.as_deref(),
            placeholder_pdf_url: &placeholder,
            storage_provider: backend.provider(),
        };

        let reserved = match store.reserve(&reservation).await {
            Ok(row) => row,
            Err(DbError::Duplicate) if attempt < MAX_ATTEMPTS => {
                warn!(%cert_no, attempt, "certificate number collision, re-allocating");
                continue;
            }
            Err(DbError::Duplicate) => {
                warn!(%cert_no, "certificate number collisions exhausted all attempts");
                return Err(AppError::DuplicateExhausted(MAX_ATTEMPTS));
            }
            Err(DbError::Other(e)) => return Err(AppError::Database(e)),
        };

        return complete_reservation(store, renderer, backend, config, &req, reserved).await;
    }

    Err(AppError::DuplicateExhausted(MAX_ATTEMPTS))
}

/// Render, upload, finalize. Any mandatory-step failure rolls back the
/// reservation and every asset written so far.
async fn complete_reservation(
    store: &dyn CertificateStore,
    renderer: &dyn CertificateRenderer,
    backend: &dyn StorageBackend,
    config: &Config,
    req: &IssueRequest,
    reserved: Certificate,
) -> Result<Certificate, AppError> {
    let cert_no = reserved.cert_no.clone();
    let pdf_path = backend.resolve_output_path(&asset_filename(&cert_no, AssetKind::Pdf));
    let png_path = backend.resolve_output_path(&asset_filename(&cert_no, AssetKind::Preview));

    let data = CertificateData {
        cert_no: cert_no.clone(),
        student_name: req.student_name.clone(),
        course_title: req.course_title.clone(),
        photo_source: req.photo_source.clone(),
        issue_date: reserved.issue_date,
        start_date: reserved.start_date,
        end_date: reserved.end_date,
        performance: req.performance.clone(),
        remarks: req.remarks.clone(),
        verify_url: config.verify_url(&cert_no),
    };

    if let Err(e) = renderer.render(&data, &pdf_path, &png_path).await {
        rollback(store, backend, &reserved, &pdf_path, &png_path, &[]).await;
        return Err(AppError::Render(e.to_string()));
    }

    // PDF upload is mandatory; the preview is best-effort.
    let pdf_url = match backend.upload(&pdf_path, &cert_no, AssetKind::Pdf).await {
        Ok(url) => url,
        Err(e) => {
            rollback(store, backend, &reserved, &pdf_path, &png_path, &[]).await;
            return Err(AppError::Upload(e.to_string()));
        }
    };

    let image_url = match backend.upload(&png_path, &cert_no, AssetKind::Preview).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(%cert_no, "preview upload failed, continuing without preview: {}", e);
            None
        }
    };

    let finalized = match store
        .finalize(reserved.id, &pdf_url, image_url.as_deref())
        .await
    {
        Ok(row) => row,
        Err(e) => {
            let uploaded = [AssetKind::Pdf, AssetKind::Preview];
            rollback(store, backend, &reserved, &pdf_path, &png_path, &uploaded).await;
            return Err(e.into());
        }
    };

    if backend.is_transient() {
        remove_temp(&pdf_path);
        remove_temp(&png_path);
    }

    info!(
        %cert_no,
        provider = ?finalized.storage_provider,
        "issued certificate"
    );
    Ok(finalized)
}

/// Undo every side effect of the attempt: already-uploaded remote assets
/// (best-effort), locally written files (best-effort), and the reserved
/// row. The caller only sees its error once this has run.
async fn rollback(
    store: &dyn CertificateStore,
    backend: &dyn StorageBackend,
    reserved: &Certificate,
    pdf_path: &Path,
    png_path: &Path,
    uploaded: &[AssetKind],
) {
    for kind in uploaded {
        backend.delete(&reserved.cert_no, *kind).await;
    }
    // For the local backend this also covers the served files.
    if uploaded.is_empty() && backend.provider() == StorageProvider::Local {
        backend.delete(&reserved.cert_no, AssetKind::Pdf).await;
        backend.delete(&reserved.cert_no, AssetKind::Preview).await;
    }
    remove_temp(pdf_path);
    remove_temp(png_path);

    if let Err(e) = store.delete_reserved(reserved.id).await {
        error!(
            cert_no = %reserved.cert_no,
            "failed to delete reserved certificate row during rollback: {}",
            e
        );
    }
}

fn remove_temp(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove {}: {}", path.display(), e);
        }
    }
}
