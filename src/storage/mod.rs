//! Certificate asset storage.
//!
//! The orchestrator talks to a `StorageBackend` and never branches on
//! configuration itself. `LocalBackend` writes straight into the served
//! uploads directory; `CloudBackend` renders into a temp directory and
//! pushes to an object store.

mod cloud;

pub use cloud::CloudBackend;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::db::StorageProvider;

/// The two asset kinds a certificate produces, each with its own spot
/// in the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Pdf,
    Preview,
}

impl AssetKind {
    pub fn extension(self) -> &'static str {
        match self {
            AssetKind::Pdf => "pdf",
            AssetKind::Preview => "png",
        }
    }

    pub fn cloud_folder(self) -> &'static str {
        match self {
            AssetKind::Pdf => "certificates",
            AssetKind::Preview => "certificate-previews",
        }
    }

    pub fn resource_type(self) -> &'static str {
        match self {
            AssetKind::Pdf => "raw",
            AssetKind::Preview => "image",
        }
    }
}

pub fn asset_filename(cert_no: &str, kind: AssetKind) -> String {
    format!("{}.{}", cert_no, kind.extension())
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote store returned no secure URL")]
    NoSecureUrl,

    #[error("remote store rejected upload ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn provider(&self) -> StorageProvider;

    /// Where the renderer should write `filename`: a temp directory when
    /// the file is transient (uploaded then discarded), the persistent
    /// uploads directory when the local path is the served asset.
    fn resolve_output_path(&self, filename: &str) -> PathBuf;

    /// Rendered files must be cleaned up after upload.
    fn is_transient(&self) -> bool {
        self.provider() == StorageProvider::Cloud
    }

    /// Make the asset retrievable and return its public URL.
    async fn upload(
        &self,
        local_path: &Path,
        cert_no: &str,
        kind: AssetKind,
    ) -> Result<String, StorageError>;

    /// Best-effort delete. Remote failures are logged, never escalated;
    /// database consistency must not depend on the remote store.
    async fn delete(&self, cert_no: &str, kind: AssetKind);
}

/// Serves assets from `{uploads}/certificates/` under `/uploads/...`.
pub struct LocalBackend {
    certificates_dir: PathBuf,
}

impl LocalBackend {
    pub fn new(upload_folder: &Path) -> std::io::Result<Self> {
        let certificates_dir = upload_folder.join("certificates");
        std::fs::create_dir_all(&certificates_dir)?;
        Ok(Self { certificates_dir })
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn provider(&self) -> StorageProvider {
        StorageProvider::Local
    }

    fn resolve_output_path(&self, filename: &str) -> PathBuf {
        self.certificates_dir.join(filename)
    }

    async fn upload(
        &self,
        _local_path: &Path,
        cert_no: &str,
        kind: AssetKind,
    ) -> Result<String, StorageError> {
        // The rendered file already sits in the served directory; the
        // URL mirrors the filesystem layout.
        Ok(format!(
            "/uploads/certificates/{}",
            asset_filename(cert_no, kind)
        ))
    }

    async fn delete(&self, cert_no: &str, kind: AssetKind) {
        let path = self.certificates_dir.join(asset_filename(cert_no, kind));
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn local_backend_serves_from_uploads_path() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(dir.path()).unwrap();

        let out = backend.resolve_output_path("QT-CERT-2025-0001.pdf");
        assert!(out.starts_with(dir.path().join("certificates")));
        assert!(!backend.is_transient());

        let url = backend
            .upload(&out, "QT-CERT-2025-0001", AssetKind::Pdf)
            .await
            .unwrap();
        assert_eq!(url, "/uploads/certificates/QT-CERT-2025-0001.pdf");
    }

    #[tokio::test]
    async fn local_delete_removes_file_and_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(dir.path()).unwrap();

        let path = backend.resolve_output_path("QT-CERT-2025-0002.png");
        std::fs::write(&path, b"png").unwrap();

        backend.delete("QT-CERT-2025-0002", AssetKind::Preview).await;
        assert!(!path.exists());

        // Second delete is a no-op, not a panic.
        backend.delete("QT-CERT-2025-0002", AssetKind::Preview).await;
    }

    #[test]
    fn asset_filenames_follow_cert_no() {
        assert_eq!(
            asset_filename("QT-CERT-2025-0007", AssetKind::Pdf),
            "QT-CERT-2025-0007.pdf"
        );
        assert_eq!(
            asset_filename("QT-CERT-2025-0007", AssetKind::Preview),
            "QT-CERT-2025-0007.png"
        );
    }
}
