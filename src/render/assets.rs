//! Embeddable inline assets for the certificate template: the student
//! photo and the verification QR code, both as data URIs so the rendered
//! HTML has no external references.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::Luma;
use qrcode::QrCode;
use reqwest::Client;
use std::io::Cursor;
use tracing::warn;

use super::RenderError;

/// Resolve a stored photo reference into a data URI.
///
/// Remote URLs are fetched, local paths read directly. Any failure falls
/// back to "no photo" rather than failing the whole render.
pub async fn photo_data_uri(client: &Client, source: &str) -> Option<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        match fetch_photo(client, source).await {
            Ok(uri) => Some(uri),
            Err(e) => {
                warn!("photo fetch failed ({}), rendering without photo: {}", source, e);
                None
            }
        }
    } else {
        match std::fs::read(source) {
            Ok(bytes) => {
                let mime = mime_guess::from_path(source).first_or(mime_guess::mime::IMAGE_JPEG);
                Some(to_data_uri(&bytes, mime.essence_str()))
            }
            Err(e) => {
                warn!("photo read failed ({}), rendering without photo: {}", source, e);
                None
            }
        }
    }
}

async fn fetch_photo(client: &Client, url: &str) -> Result<String, reqwest::Error> {
    let response = client.get(url).send().await?.error_for_status()?;
    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|m| m.starts_with("image/"))
        .map(str::to_string)
        .unwrap_or_else(|| "image/jpeg".to_string());
    let bytes = response.bytes().await?;
    Ok(to_data_uri(&bytes, &mime))
}

fn to_data_uri(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// QR code encoding the public verification URL, as a PNG data URI.
pub fn qr_data_uri(text: &str) -> Result<String, RenderError> {
    let code = QrCode::new(text.as_bytes()).map_err(|e| RenderError::Qr(e.to_string()))?;
    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(240, 240)
        .build();

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| RenderError::Qr(e.to_string()))?;

    Ok(to_data_uri(&png, "image/png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_is_a_png_data_uri() {
        let uri = qr_data_uri("http://localhost:5050/verify/QT-CERT-2025-0001").unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert!(uri.len() > 100);
    }

    #[tokio::test]
    async fn local_photo_mime_follows_extension() {
        let dir = tempfile::tempdir().unwrap();
        let client = Client::new();

        let bmp = dir.path().join("photo.bmp");
        std::fs::write(&bmp, b"BM fake bitmap").unwrap();
        let uri = photo_data_uri(&client, bmp.to_str().unwrap()).await.unwrap();
        assert!(uri.starts_with("data:image/bmp;base64,"));

        let png = dir.path().join("photo.PNG");
        std::fs::write(&png, b"\x89PNG fake").unwrap();
        let uri = photo_data_uri(&client, png.to_str().unwrap()).await.unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));

        // No extension: assume JPEG rather than dropping the photo.
        let bare = dir.path().join("photo");
        std::fs::write(&bare, b"fake").unwrap();
        let uri = photo_data_uri(&client, bare.to_str().unwrap()).await.unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn missing_local_photo_falls_back_to_none() {
        let client = Client::new();
        let uri = photo_data_uri(&client, "/nonexistent/photo.jpg").await;
        assert!(uri.is_none());
    }
}
