use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use clipstream_db::Database;
use clipstream_media::{AssetUploader, UploadedAsset};

use crate::state::{AppState, AppStateInner};

/// Records every upload; hosts files at `https://cdn/x/<file name>` unless
/// the path was marked as failing.
#[derive(Default)]
pub struct FakeUploader {
    failing: HashSet<PathBuf>,
    calls: Mutex<Vec<PathBuf>>,
}

impl FakeUploader {
    pub fn failing(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetUploader for FakeUploader {
    async fn upload(&self, local_path: &Path) -> Option<UploadedAsset> {
        self.calls.lock().unwrap().push(local_path.to_path_buf());
        if self.failing.contains(local_path) {
            return None;
        }
        let name = local_path.file_name()?.to_str()?;
        Some(UploadedAsset {
            url: format!("https://cdn/x/{}", name),
            public_id: name.to_string(),
        })
    }
}

/// Records the call, then never answers. Stands in for a stalled asset host.
#[derive(Default)]
pub struct HangingUploader {
    calls: Mutex<Vec<PathBuf>>,
}

impl HangingUploader {
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetUploader for HangingUploader {
    async fn upload(&self, local_path: &Path) -> Option<UploadedAsset> {
        self.calls.lock().unwrap().push(local_path.to_path_buf());
        std::future::pending().await
    }
}

pub fn state_with(uploader: Arc<dyn AssetUploader>, upload_dir: PathBuf) -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        uploader,
        upload_dir,
    })
}

/// Temp directory path, not created up front. Removed with its contents on
/// drop.
pub struct ScratchDir(PathBuf);

impl ScratchDir {
    pub fn new() -> Self {
        Self(std::env::temp_dir().join(format!("clipstream-api-{}", uuid::Uuid::new_v4())))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Entries currently in the directory; empty when it was never created.
    pub fn entries(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.0) {
            Ok(dir) => dir.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
