use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::{self, Certificate, CertificateDetail, Course, DbError, Student};
use crate::error::AppError;
use crate::issue::{self, IssueRequest, PgCertificateStore};
use crate::state::AppState;
use crate::storage::AssetKind;

#[derive(Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    pub duration_weeks: Option<i32>,
}

pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCourseRequest>,
) -> Result<Json<Course>, AppError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("course title is required".to_string()));
    }

    let course = db::courses::create(state.pool.as_ref(), title, req.duration_weeks)
        .await
        .map_err(|e| match e {
            DbError::Duplicate => AppError::Conflict("course"),
            other => other.into(),
        })?;
    Ok(Json(course))
}

pub async fn list_courses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Course>>, AppError> {
    let courses = db::courses::list(state.pool.as_ref()).await?;
    Ok(Json(courses))
}

#[derive(Deserialize)]
pub struct CreateStudentRequest {
    pub name: String,
    pub course_id: Option<i32>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub joining_date: Option<NaiveDate>,
    pub batch: Option<String>,
    pub photo_url: Option<String>,
}

pub async fn create_student(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStudentRequest>,
) -> Result<Json<Student>, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("student name is required".to_string()));
    }

    if let Some(course_id) = req.course_id {
        db::courses::find_by_id(state.pool.as_ref(), course_id)
            .await?
            .ok_or(AppError::NotFound("course"))?;
    }

    let new = db::students::NewStudent {
        name,
        course_id: req.course_id,
        email: req.email.as_deref(),
        phone: req.phone.as_deref(),
        joining_date: req.joining_date,
        batch: req.batch.as_deref(),
        photo_url: req.photo_url.as_deref(),
    };

    let student = db::students::create(state.pool.as_ref(), &new)
        .await
        .map_err(|e| match e {
            DbError::Duplicate => AppError::DuplicateExhausted(3),
            other => other.into(),
        })?;

    info!(student_id = %student.student_id, "created student");
    Ok(Json(student))
}

pub async fn get_student(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> Result<Json<Student>, AppError> {
    let student = db::students::find_by_student_id(state.pool.as_ref(), &student_id)
        .await?
        .ok_or(AppError::NotFound("student"))?;
    Ok(Json(student))
}

#[derive(Deserialize)]
pub struct IssueCertificateRequest {
    pub student_id: String,
    /// Defaults to the student's enrolled course.
    pub course_id: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub issue_date: Option<NaiveDate>,
    pub performance: Option<String>,
    pub remarks: Option<String>,
}

pub async fn issue_certificate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IssueCertificateRequest>,
) -> Result<Json<Certificate>, AppError> {
    if let (Some(start), Some(end)) = (req.start_date, req.end_date) {
        if end < start {
            return Err(AppError::Validation(
                "end_date must not precede start_date".to_string(),
            ));
        }
    }

    // Both references must resolve before any serial is allocated.
    let student = db::students::find_by_student_id(state.pool.as_ref(), &req.student_id)
        .await?
        .ok_or(AppError::NotFound("student"))?;

    let course_id = req
        .course_id
        .or(student.course_id)
        .ok_or_else(|| AppError::Validation("course_id is required".to_string()))?;
    let course = db::courses::find_by_id(state.pool.as_ref(), course_id)
        .await?
        .ok_or(AppError::NotFound("course"))?;

    let issue_req = IssueRequest {
        student_row_id: student.id,
        course_row_id: course.id,
        student_name: student.name,
        course_title: course.title,
        photo_source: student.photo_url,
        start_date: req.start_date,
        end_date: req.end_date,
        issue_date: req.issue_date,
        performance: req.performance,
        remarks: req.remarks,
    };

    let store = PgCertificateStore::new(state.pool.clone());
    let certificate = issue::issue_certificate(
        &store,
        state.renderer.as_ref(),
        state.backend.as_ref(),
        &state.config,
        issue_req,
    )
    .await?;

    Ok(Json(certificate))
}

pub async fn list_certificates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Certificate>>, AppError> {
    let certificates = db::certificates::list(state.pool.as_ref()).await?;
    Ok(Json(certificates))
}

/// Public verification read: no side effects, no allocation.
pub async fn verify_certificate(
    State(state): State<Arc<AppState>>,
    Path(cert_no): Path<String>,
) -> Result<Json<CertificateDetail>, AppError> {
    let detail = db::certificates::find_detail_by_cert_no(state.pool.as_ref(), &cert_no)
        .await?
        .ok_or(AppError::NotFound("certificate"))?;
    Ok(Json(detail))
}

/// Administrative delete. Asset cleanup is best-effort; the row delete
/// must not depend on the remote store being reachable.
pub async fn delete_certificate(
    State(state): State<Arc<AppState>>,
    Path(cert_no): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let certificate = db::certificates::find_by_cert_no(state.pool.as_ref(), &cert_no)
        .await?
        .ok_or(AppError::NotFound("certificate"))?;

    state.backend.delete(&certificate.cert_no, AssetKind::Pdf).await;
    state
        .backend
        .delete(&certificate.cert_no, AssetKind::Preview)
        .await;

    db::certificates::delete_by_id(state.pool.as_ref(), certificate.id).await?;

    info!(cert_no = %certificate.cert_no, "deleted certificate");
    Ok(Json(serde_json::json!({
        "status": "deleted",
        "cert_no": certificate.cert_no,
    })))
}
