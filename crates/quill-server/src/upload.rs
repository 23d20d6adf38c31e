use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// URL prefix uploads are served under, and the prefix of stored references.
pub const UPLOADS_PREFIX: &str = "uploads";

const MAX_EXTENSION_LEN: usize = 10;

/// Writes uploaded images to disk under time-based names.
///
/// Files are stored as `<unix-millis>-<seq><.ext>`. The sequence number
/// keeps two uploads in the same millisecond apart. Content is stored
/// verbatim; no type sniffing is done.
#[derive(Debug)]
pub struct UploadStore {
    dir: PathBuf,
    seq: AtomicU64,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store `bytes` and return the public reference (`uploads/<file>`).
    pub async fn save(&self, original_name: Option<&str>, bytes: &[u8]) -> std::io::Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let file_name = self.file_name(original_name);
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;
        tracing::debug!(file = %file_name, size = bytes.len(), "stored upload");
        Ok(format!("{UPLOADS_PREFIX}/{file_name}"))
    }

    fn file_name(&self, original_name: Option<&str>) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let ext = original_name.and_then(extension).unwrap_or_default();
        format!("{}-{seq}{ext}", Utc::now().timestamp_millis())
    }
}

/// The original extension as `.ext`, lowercased. Anything that is not short
/// and alphanumeric is dropped so client names never shape the path.
fn extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}
