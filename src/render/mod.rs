//! Certificate rendering: escaped HTML from a tera template, printed to
//! PDF and screenshotted to a PNG preview by headless Chrome.

pub mod assets;

use async_trait::async_trait;
use chrono::NaiveDate;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use reqwest::Client;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tera::Context;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("qr encoding failed: {0}")]
    Qr(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rendering timed out after {0:?}")]
    Timeout(Duration),
}

/// Everything the certificate template needs, already resolved from the
/// database by the orchestrator.
#[derive(Debug, Clone)]
pub struct CertificateData {
    pub cert_no: String,
    pub student_name: String,
    pub course_title: String,
    pub photo_source: Option<String>,
    pub issue_date: NaiveDate,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub performance: Option<String>,
    pub remarks: Option<String>,
    pub verify_url: String,
}

#[async_trait]
pub trait CertificateRenderer: Send + Sync {
    /// Write the certificate PDF and PNG preview to the given paths.
    async fn render(
        &self,
        data: &CertificateData,
        pdf_path: &Path,
        png_path: &Path,
    ) -> Result<(), RenderError>;
}

/// Missing dates render as a literal placeholder, never empty.
fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d-%m-%Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Build the full HTML document. All free-text fields pass through tera's
/// auto-escaping, so nothing from the database can inject markup.
fn build_html(
    data: &CertificateData,
    photo_data_uri: Option<&str>,
    qr_data_uri: &str,
) -> Result<String, RenderError> {
    let mut ctx = Context::new();
    ctx.insert("cert_no", &data.cert_no);
    ctx.insert("student_name", &data.student_name);
    ctx.insert("course_title", &data.course_title);
    ctx.insert("photo_data_uri", photo_data_uri.unwrap_or(""));
    ctx.insert("qr_data_uri", qr_data_uri);
    ctx.insert("verify_url", &data.verify_url);
    ctx.insert("issue_date", &fmt_date(Some(data.issue_date)));
    ctx.insert("start_date", &fmt_date(data.start_date));
    ctx.insert("end_date", &fmt_date(data.end_date));
    ctx.insert("performance", data.performance.as_deref().unwrap_or("-"));
    ctx.insert("remarks", data.remarks.as_deref().unwrap_or(""));

    let html = crate::templates::get_tera().render("certificate.html", &ctx)?;
    Ok(html)
}

/// Renders by launching a disposable headless Chrome per call. Fine for
/// issuance volumes here; pooling would be the first change under load.
pub struct ChromeRenderer {
    client: Client,
    timeout: Duration,
}

impl ChromeRenderer {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl CertificateRenderer for ChromeRenderer {
    async fn render(
        &self,
        data: &CertificateData,
        pdf_path: &Path,
        png_path: &Path,
    ) -> Result<(), RenderError> {
        // Photo fetch and QR generation are independent of each other.
        let qr_url = data.verify_url.clone();
        let (photo, qr) = tokio::join!(
            async {
                match &data.photo_source {
                    Some(source) => assets::photo_data_uri(&self.client, source).await,
                    None => None,
                }
            },
            async move { assets::qr_data_uri(&qr_url) },
        );

        let html = build_html(data, photo.as_deref(), &qr?)?;

        // The browser writes into a private staging directory; the files
        // only reach their target paths (which the local backend serves
        // publicly) after the session finishes inside the timeout.
        let staging = tempfile::Builder::new()
            .prefix("certmint-render-")
            .tempdir()?;
        let staged_pdf = staging.path().join("certificate.pdf");
        let staged_png = staging.path().join("certificate.png");

        let (job_pdf, job_png) = (staged_pdf.clone(), staged_png.clone());
        let render =
            tokio::task::spawn_blocking(move || render_with_chrome(&html, &job_pdf, &job_png));

        await_and_publish(
            self.timeout,
            render,
            [
                (staged_pdf, pdf_path.to_path_buf()),
                (staged_png, png_path.to_path_buf()),
            ],
        )
        .await?;

        info!(cert_no = %data.cert_no, "rendered certificate assets");
        Ok(())
    }
}

/// Bound the blocking render, then move the staged outputs into place.
///
/// `spawn_blocking` tasks cannot be cancelled: on timeout the session is
/// abandoned and may still write its files later, but only into the
/// staging directory, which gets discarded. The target paths stay
/// untouched unless the task completed in time.
async fn await_and_publish(
    limit: Duration,
    render: tokio::task::JoinHandle<Result<(), RenderError>>,
    moves: [(PathBuf, PathBuf); 2],
) -> Result<(), RenderError> {
    match tokio::time::timeout(limit, render).await {
        Err(_) => return Err(RenderError::Timeout(limit)),
        Ok(Err(join_err)) => return Err(RenderError::Browser(join_err.to_string())),
        Ok(Ok(result)) => result?,
    }
    for (staged, target) in &moves {
        publish(staged, target)?;
    }
    Ok(())
}

/// Staging and target may sit on different filesystems, so fall back to
/// a copy when rename is refused.
fn publish(staged: &Path, target: &Path) -> Result<(), RenderError> {
    if std::fs::rename(staged, target).is_ok() {
        return Ok(());
    }
    std::fs::copy(staged, target)?;
    Ok(())
}

/// Blocking Chrome session: load the HTML from a temp file, print a
/// zero-margin A4 landscape PDF, screenshot the full page. The browser
/// is torn down on every exit path when it drops.
fn render_with_chrome(html: &str, pdf_path: &Path, png_path: &Path) -> Result<(), RenderError> {
    let mut html_file = tempfile::Builder::new()
        .prefix("certificate-")
        .suffix(".html")
        .tempfile()?;
    html_file.write_all(html.as_bytes())?;
    html_file.flush()?;

    let browser = Browser::new(LaunchOptions {
        headless: true,
        sandbox: false,
        window_size: Some((1123, 794)),
        ..Default::default()
    })
    .map_err(|e| RenderError::Browser(e.to_string()))?;

    let tab = browser
        .new_tab()
        .map_err(|e| RenderError::Browser(e.to_string()))?;

    let url = format!("file://{}", html_file.path().display());
    tab.navigate_to(&url)
        .and_then(|t| t.wait_until_navigated())
        .map_err(|e| RenderError::Browser(e.to_string()))?;

    let pdf = tab
        .print_to_pdf(Some(PrintToPdfOptions {
            landscape: Some(true),
            print_background: Some(true),
            paper_width: Some(11.69),
            paper_height: Some(8.27),
            margin_top: Some(0.0),
            margin_bottom: Some(0.0),
            margin_left: Some(0.0),
            margin_right: Some(0.0),
            prefer_css_page_size: Some(true),
            ..Default::default()
        }))
        .map_err(|e| RenderError::Browser(e.to_string()))?;
    std::fs::write(pdf_path, pdf)?;

    let screenshot = tab
        .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        .map_err(|e| RenderError::Browser(e.to_string()))?;
    std::fs::write(png_path, screenshot)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> CertificateData {
        CertificateData {
            cert_no: "QT-CERT-2025-0007".to_string(),
            student_name: "Asha Verma".to_string(),
            course_title: "Full Stack".to_string(),
            photo_source: None,
            issue_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            start_date: Some(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()),
            end_date: None,
            performance: Some("Excellent".to_string()),
            remarks: None,
            verify_url: "http://localhost:5050/verify/QT-CERT-2025-0007".to_string(),
        }
    }

    #[test]
    fn missing_dates_render_as_dash() {
        assert_eq!(fmt_date(None), "-");
        assert_eq!(
            fmt_date(NaiveDate::from_ymd_opt(2025, 1, 15)),
            "15-01-2025"
        );
    }

    #[test]
    fn html_contains_certificate_fields() {
        let data = sample_data();
        let qr = assets::qr_data_uri(&data.verify_url).unwrap();
        let html = build_html(&data, None, &qr).unwrap();

        assert!(html.contains("QT-CERT-2025-0007"));
        assert!(html.contains("Asha Verma"));
        assert!(html.contains("Full Stack"));
        assert!(html.contains("15-01-2025"));
        // End date missing -> placeholder, not empty.
        assert!(html.contains("to -"));
    }

    #[test]
    fn free_text_is_escaped() {
        let mut data = sample_data();
        data.remarks = Some("<script>alert('x')</script>".to_string());
        data.student_name = "A & B <Pvt>".to_string();

        let qr = assets::qr_data_uri(&data.verify_url).unwrap();
        let html = build_html(&data, None, &qr).unwrap();

        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("A &amp; B &lt;Pvt&gt;"));
    }

    #[tokio::test]
    async fn timed_out_render_never_publishes_outputs() {
        let staging = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let staged_pdf = staging.path().join("certificate.pdf");
        let staged_png = staging.path().join("certificate.png");
        let final_pdf = out_dir.path().join("QT-CERT-2025-0001.pdf");
        let final_png = out_dir.path().join("QT-CERT-2025-0001.png");

        let (job_pdf, job_png) = (staged_pdf.clone(), staged_png.clone());
        let slow = tokio::task::spawn_blocking(move || -> Result<(), RenderError> {
            std::thread::sleep(Duration::from_millis(200));
            std::fs::write(&job_pdf, b"%PDF late")?;
            std::fs::write(&job_png, b"png late")?;
            Ok(())
        });

        let err = await_and_publish(
            Duration::from_millis(10),
            slow,
            [
                (staged_pdf.clone(), final_pdf.clone()),
                (staged_png, final_png.clone()),
            ],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RenderError::Timeout(_)));

        // The abandoned task finishes its writes, but only into staging.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(staged_pdf.exists());
        assert!(!final_pdf.exists());
        assert!(!final_png.exists());
    }

    #[tokio::test]
    async fn staged_outputs_move_into_place_on_success() {
        let staging = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let staged_pdf = staging.path().join("certificate.pdf");
        let staged_png = staging.path().join("certificate.png");
        let final_pdf = out_dir.path().join("QT-CERT-2025-0002.pdf");
        let final_png = out_dir.path().join("QT-CERT-2025-0002.png");

        let (job_pdf, job_png) = (staged_pdf.clone(), staged_png.clone());
        let fast = tokio::task::spawn_blocking(move || -> Result<(), RenderError> {
            std::fs::write(&job_pdf, b"%PDF ok")?;
            std::fs::write(&job_png, b"png ok")?;
            Ok(())
        });

        await_and_publish(
            Duration::from_secs(5),
            fast,
            [
                (staged_pdf, final_pdf.clone()),
                (staged_png, final_png.clone()),
            ],
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&final_pdf).unwrap(), b"%PDF ok");
        assert_eq!(std::fs::read(&final_png).unwrap(), b"png ok");
    }

    #[test]
    fn photo_placeholder_when_no_photo() {
        let data = sample_data();
        let qr = assets::qr_data_uri(&data.verify_url).unwrap();
        let html = build_html(&data, None, &qr).unwrap();
        assert!(html.contains("photo-placeholder"));
    }
}
