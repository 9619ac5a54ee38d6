use std::path::Path;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::{AssetUploader, UploadedAsset};

pub const DEFAULT_BASE_URL: &str = "https://api.cloudinary.com";

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// API origin; overridden in tests.
    pub base_url: String,
    /// Upper bound for a single upload request, connect to last byte.
    pub timeout: Duration,
}

/// Signed uploads to Cloudinary's `auto` resource endpoint.
///
/// Every staged file handed to [`AssetUploader::upload`] is deleted from
/// local disk once the attempt is over, whether it succeeded or not.
pub struct CloudinaryUploader {
    config: CloudinaryConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    url: String,
}

impl CloudinaryUploader {
    pub fn new(config: CloudinaryConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        info!(
            "Cloudinary uploader ready (cloud {}, timeout {}s)",
            config.cloud_name,
            config.timeout.as_secs()
        );
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1_1/{}/auto/upload",
            self.config.base_url.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    async fn try_upload(&self, local_path: &Path) -> Result<UploadedAsset> {
        let bytes = fs::read(local_path).await?;
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(&[("timestamp", timestamp.as_str())], &self.config.api_secret);

        let form = Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .part("file", Part::bytes(bytes).file_name(file_name));

        let resp = self.client.post(self.endpoint()).multipart(form).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Cloudinary rejected upload ({}): {}", status, body);
        }

        let body: UploadResponse = resp.json().await?;
        Ok(UploadedAsset {
            url: body.url,
            public_id: body.public_id,
        })
    }
}

#[async_trait]
impl AssetUploader for CloudinaryUploader {
    async fn upload(&self, local_path: &Path) -> Option<UploadedAsset> {
        let result = self.try_upload(local_path).await;
        remove_staged(local_path).await;

        match result {
            Ok(asset) => {
                info!("Uploaded {} as {}", local_path.display(), asset.public_id);
                Some(asset)
            }
            Err(e) => {
                warn!("Upload of {} failed: {:#}", local_path.display(), e);
                None
            }
        }
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, secret appended, SHA-1 hex digest.
pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

async fn remove_staged(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed staged file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove staged file {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use axum::{
        Json, Router,
        extract::{Multipart, Path as UrlPath},
        http::StatusCode,
        routing::post,
    };

    use super::*;

    const SECRET: &str = "shh";

    #[test]
    fn signature_matches_documented_example() {
        let sig = sign(
            &[("timestamp", "1315060510"), ("public_id", "sample_image")],
            "abcd",
        );
        assert_eq!(sig, "b4ad47fb4e25c7bf5f92a20089f9db59bc302313");
    }

    /// Minimal stand-in for the upload API. Cloud `broken` always fails.
    async fn fake_upload(
        UrlPath(cloud): UrlPath<String>,
        mut multipart: Multipart,
    ) -> Result<Json<serde_json::Value>, StatusCode> {
        let mut fields = HashMap::new();
        let mut file_name = None;

        while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                file_name = field.file_name().map(str::to_string);
                field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            } else {
                let value = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                fields.insert(name, value);
            }
        }

        if cloud == "broken" {
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }

        let timestamp = fields.get("timestamp").ok_or(StatusCode::BAD_REQUEST)?;
        let expected = sign(&[("timestamp", timestamp.as_str())], SECRET);
        if fields.get("signature") != Some(&expected) || fields.get("api_key").map(String::as_str) != Some("key") {
            return Err(StatusCode::UNAUTHORIZED);
        }

        let file_name = file_name.ok_or(StatusCode::BAD_REQUEST)?;
        Ok(Json(serde_json::json!({
            "public_id": "abc123",
            "url": format!("http://cdn.test/{}/{}", cloud, file_name),
            "secure_url": format!("https://cdn.test/{}/{}", cloud, file_name),
        })))
    }

    async fn spawn_fake_host() -> String {
        let app = Router::new().route("/v1_1/{cloud}/auto/upload", post(fake_upload));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn uploader(base_url: String, cloud: &str) -> CloudinaryUploader {
        CloudinaryUploader::new(CloudinaryConfig {
            cloud_name: cloud.to_string(),
            api_key: "key".to_string(),
            api_secret: SECRET.to_string(),
            base_url,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    async fn staged_file(contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("clipstream-media-{}.png", uuid::Uuid::new_v4()));
        fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn successful_upload_returns_url_and_removes_file() {
        let base = spawn_fake_host().await;
        let up = uploader(base, "demo");
        let path = staged_file(b"png bytes").await;
        let name = path.file_name().unwrap().to_str().unwrap().to_string();

        let asset = up.upload(&path).await.expect("upload should succeed");
        assert_eq!(asset.url, format!("http://cdn.test/demo/{}", name));
        assert_eq!(asset.public_id, "abc123");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn rejected_upload_yields_none_and_still_removes_file() {
        let base = spawn_fake_host().await;
        let up = uploader(base, "broken");
        let path = staged_file(b"png bytes").await;

        assert!(up.upload(&path).await.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_local_file_yields_none() {
        let base = spawn_fake_host().await;
        let up = uploader(base, "demo");
        let path = std::env::temp_dir().join("clipstream-media-does-not-exist.png");

        assert!(up.upload(&path).await.is_none());
    }

    #[tokio::test]
    async fn unreachable_host_yields_none() {
        // Port 9 (discard) is closed on any sane test machine.
        let up = uploader("http://127.0.0.1:9".to_string(), "demo");
        let path = staged_file(b"png bytes").await;

        assert!(up.upload(&path).await.is_none());
        assert!(!path.exists());
    }
}
