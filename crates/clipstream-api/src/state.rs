use std::path::PathBuf;
use std::sync::Arc;

use clipstream_db::Database;
use clipstream_media::AssetUploader;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub uploader: Arc<dyn AssetUploader>,
    /// Where multipart file parts are staged before upload.
    pub upload_dir: PathBuf,
}
