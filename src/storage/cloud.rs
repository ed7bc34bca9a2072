//! Object-store backend speaking a Cloudinary-style signed upload API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::{asset_filename, AssetKind, StorageBackend, StorageError};
use crate::config::CloudConfig;
use crate::db::StorageProvider;

pub struct CloudBackend {
    client: Client,
    config: CloudConfig,
    temp_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

impl CloudBackend {
    pub fn new(config: CloudConfig) -> Result<Self, StorageError> {
        let temp_dir = std::env::temp_dir().join("certmint-render");
        std::fs::create_dir_all(&temp_dir)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            temp_dir,
        })
    }

    fn public_id(cert_no: &str, kind: AssetKind) -> String {
        format!("{}/{}", kind.cloud_folder(), cert_no)
    }

    fn endpoint(&self, kind: AssetKind, action: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.base_url,
            self.config.cloud_name,
            kind.resource_type(),
            action
        )
    }
}

/// Request signature: SHA-256 over the sorted parameter string with the
/// API secret appended, hex-encoded.
fn sign(params: &str, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(params.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl StorageBackend for CloudBackend {
    fn provider(&self) -> StorageProvider {
        StorageProvider::Cloud
    }

    fn resolve_output_path(&self, filename: &str) -> PathBuf {
        self.temp_dir.join(filename)
    }

    async fn upload(
        &self,
        local_path: &Path,
        cert_no: &str,
        kind: AssetKind,
    ) -> Result<String, StorageError> {
        let bytes = tokio::fs::read(local_path).await?;
        let public_id = Self::public_id(cert_no, kind);
        let timestamp = chrono::Utc::now().timestamp();

        let signature = sign(
            &format!("public_id={}&timestamp={}", public_id, timestamp),
            &self.config.api_secret,
        );

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(asset_filename(cert_no, kind)),
            )
            .text("public_id", public_id)
            .text("timestamp", timestamp.to_string())
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);

        let response = self
            .client
            .post(self.endpoint(kind, "upload"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: UploadResponse = response.json().await?;
        match parsed.secure_url {
            Some(url) => {
                info!(cert_no, kind = ?kind, "uploaded certificate asset");
                Ok(url)
            }
            None => Err(StorageError::NoSecureUrl),
        }
    }

    async fn delete(&self, cert_no: &str, kind: AssetKind) {
        let public_id = Self::public_id(cert_no, kind);
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &format!("public_id={}&timestamp={}", public_id, timestamp),
            &self.config.api_secret,
        );

        let result = self
            .client
            .post(self.endpoint(kind, "destroy"))
            .form(&[
                ("public_id", public_id.as_str()),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await;

        match result {
            Ok(r) if r.status().is_success() => {}
            Ok(r) => warn!(cert_no, status = %r.status(), "remote asset delete rejected"),
            Err(e) => warn!(cert_no, "remote asset delete failed: {}", e),
        }
    }
}
