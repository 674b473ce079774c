//! Local upload directory. Files are stored as `YYYYMMDD_HHMMSS_<name>` and
//! live until the next "new chat" wipes the directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
/// `YYYYMMDD_HHMMSS_`
const PREFIX_LEN: usize = 16;
const MAX_COLLISION_SUFFIX: u32 = 1000;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file name: '{0}'")]
    InvalidName(String),

    #[error("Could not find a free file name for '{0}'")]
    Exhausted(String),
}

/// A file persisted to the upload directory.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub path: PathBuf,
    /// Name on disk, including the timestamp prefix.
    pub stored_name: String,
    /// Name shown to users and quoted in prompts.
    pub display_name: String,
    pub uploaded_at: DateTime<Local>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    /// Opens the upload directory, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, UploadError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` under a timestamp-prefixed version of `original_name`.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredFile, UploadError> {
        self.save_at(original_name, bytes, Local::now()).await
    }

    async fn save_at(
        &self,
        original_name: &str,
        bytes: &[u8],
        now: DateTime<Local>,
    ) -> Result<StoredFile, UploadError> {
        let clean = sanitize_file_name(original_name)
            .ok_or_else(|| UploadError::InvalidName(original_name.to_string()))?;
        let prefix = now.format(TIMESTAMP_FORMAT).to_string();

        for attempt in 0..MAX_COLLISION_SUFFIX {
            let stored_name = format!("{prefix}_{}", with_collision_suffix(&clean, attempt));
            let path = self.root.join(&stored_name);

            // create_new makes the existence check and the create a single step
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            file.write_all(bytes).await?;
            file.flush().await?;

            debug!("Saved upload {} ({} bytes)", path.display(), bytes.len());
            return Ok(StoredFile {
                display_name: display_name(&stored_name).to_string(),
                path,
                stored_name,
                uploaded_at: now,
                size_bytes: bytes.len() as u64,
            });
        }

        Err(UploadError::Exhausted(clean))
    }

    /// Deletes every regular file in the directory. Subdirectories are left alone.
    /// Returns the number of files removed.
    pub async fn clear(&self) -> Result<usize, UploadError> {
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&self.root).await?;
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Names of the files currently on disk, sorted.
    pub async fn list(&self) -> Result<Vec<String>, UploadError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Strips a leading `YYYYMMDD_HHMMSS_` prefix. Names without one are returned as-is.
pub fn display_name(stored_name: &str) -> &str {
    let bytes = stored_name.as_bytes();
    if bytes.len() <= PREFIX_LEN {
        return stored_name;
    }
    let is_prefix = bytes[..PREFIX_LEN].iter().enumerate().all(|(i, b)| match i {
        8 | 15 => *b == b'_',
        _ => b.is_ascii_digit(),
    });
    if is_prefix {
        &stored_name[PREFIX_LEN..]
    } else {
        stored_name
    }
}

/// Keeps only the final path component of a client-supplied name.
fn sanitize_file_name(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    match cleaned.as_str() {
        "" | "." | ".." => None,
        _ => Some(cleaned),
    }
}

fn with_collision_suffix(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({attempt}).{ext}"),
        _ => format!("{name} ({attempt})"),
    }
}
