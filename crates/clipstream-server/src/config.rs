use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use clipstream_media::{CloudinaryConfig, cloudinary::DEFAULT_BASE_URL};

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
    pub cloudinary: CloudinaryConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(v) => v.parse().with_context(|| format!("{} must be a number, got {:?}", key, v)),
                None => Ok(default),
            }
        };
        let required = |key: &str| -> Result<String> {
            match get(key) {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => bail!("{} is not set", key),
            }
        };

        let port = or("CLIPSTREAM_PORT", "8000")
            .parse()
            .context("CLIPSTREAM_PORT must be a port number")?;

        Ok(Self {
            host: or("CLIPSTREAM_HOST", "0.0.0.0"),
            port,
            db_path: or("CLIPSTREAM_DB_PATH", "clipstream.db").into(),
            upload_dir: or("CLIPSTREAM_UPLOAD_DIR", "./public/temp").into(),
            max_upload_bytes: number("CLIPSTREAM_MAX_UPLOAD_MB", 16)? as usize * 1024 * 1024,
            request_timeout: Duration::from_secs(number("CLIPSTREAM_REQUEST_TIMEOUT_SECS", 120)?),
            cloudinary: CloudinaryConfig {
                cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
                api_key: required("CLOUDINARY_API_KEY")?,
                api_secret: required("CLOUDINARY_API_SECRET")?,
                base_url: or("CLOUDINARY_BASE_URL", DEFAULT_BASE_URL),
                timeout: Duration::from_secs(number("CLIPSTREAM_UPLOAD_TIMEOUT_SECS", 60)?),
            },
        })
    }
}
