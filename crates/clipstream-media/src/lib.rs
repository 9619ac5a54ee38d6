pub mod cloudinary;

use std::path::Path;

use async_trait::async_trait;

pub use cloudinary::{CloudinaryConfig, CloudinaryUploader};

/// A file accepted by the remote asset host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub url: String,
    pub public_id: String,
}

/// Pushes a locally staged file to the asset host.
///
/// Implementations swallow their own failures: `None` means the file is not
/// hosted, whatever the reason. The cause is logged by the implementation.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(&self, local_path: &Path) -> Option<UploadedAsset>;
}
