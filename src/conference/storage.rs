use std::{
    io,
    path::{Component, Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

use crate::config::StorageConfig;

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("Invalid filename regex"));

const MAX_STORED_NAME_LEN: usize = 100;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("File is empty")]
    Empty,
    #[error("File exceeds the {0} byte limit")]
    TooLarge(usize),
    #[error("Only PDF, PNG and JPEG files are accepted")]
    UnsupportedType,
    #[error("Invalid stored path")]
    InvalidPath,
}

/// Accepted payment proof formats, recognised by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofKind {
    Pdf,
    Png,
    Jpeg,
}

impl ProofKind {
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"%PDF-") {
            Some(Self::Pdf)
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else {
            None
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the storage root
    pub path: String,
    pub kind: ProofKind,
}

/// Turns a client-supplied name into something safe to put on disk.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');
    let truncated: String = cleaned.chars().take(MAX_STORED_NAME_LEN).collect();

    if truncated.is_empty() {
        "file".to_string()
    } else {
        truncated
    }
}

/// Upload directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
    max_bytes: usize,
}

impl UploadStorage {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.upload_dir, config.max_upload_bytes)
    }

    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Checks size and format of a payment proof without storing it.
    pub fn inspect(&self, data: &[u8]) -> Result<ProofKind, StorageError> {
        if data.is_empty() {
            return Err(StorageError::Empty);
        }
        if data.len() > self.max_bytes {
            return Err(StorageError::TooLarge(self.max_bytes));
        }
        ProofKind::detect(data).ok_or(StorageError::UnsupportedType)
    }

    /// Stores a payment proof under `payments/<submission id>/`.
    pub async fn save_proof(
        &self,
        submission_id: Uuid,
        original_filename: &str,
        data: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let kind = self.inspect(data)?;

        let stem = sanitize_filename(original_filename);
        let stem = stem
            .rsplit_once('.')
            .map_or(stem.as_str(), |(stem, _)| stem)
            .to_string();
        let relative = format!(
            "payments/{submission_id}/{}-{stem}.{}",
            Uuid::new_v4(),
            kind.extension()
        );

        let full_path = self.root.join(&relative);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, data).await?;

        Ok(StoredFile {
            path: relative,
            kind,
        })
    }

    pub async fn read(&self, relative: &str) -> Result<Vec<u8>, StorageError> {
        Ok(tokio::fs::read(self.resolve(relative)?).await?)
    }

    /// Removes a stored file; a file that is already gone is not an error.
    pub async fn remove(&self, relative: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.resolve(relative)?).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(relative);
        if path
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(StorageError::InvalidPath);
        }
        Ok(self.root.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &[u8] = b"%PDF-1.7\n%test";

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\receipt (1).pdf"), "receipt_1_.pdf");
        assert_eq!(sanitize_filename("...hidden"), "hidden");
        assert_eq!(sanitize_filename(""), "file");
    }

    #[test]
    fn test_detects_formats_by_content() {
        assert_eq!(ProofKind::detect(PDF), Some(ProofKind::Pdf));
        assert_eq!(ProofKind::detect(b"\x89PNG\r\n\x1a\nrest"), Some(ProofKind::Png));
        assert_eq!(ProofKind::detect(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ProofKind::Jpeg));
        assert_eq!(ProofKind::detect(b"MZ\x90\x00"), None);
    }

    #[test]
    fn test_inspect_limits() {
        let storage = UploadStorage::new("/unused", 16);

        assert!(matches!(storage.inspect(b""), Err(StorageError::Empty)));
        assert!(matches!(
            storage.inspect(&[b'%'; 17]),
            Err(StorageError::TooLarge(16))
        ));
        assert!(matches!(
            storage.inspect(b"plain text"),
            Err(StorageError::UnsupportedType)
        ));
    }

    #[tokio::test]
    async fn test_save_read_remove() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = UploadStorage::new(dir.path(), 1024);
        let submission_id = Uuid::new_v4();

        let stored = storage
            .save_proof(submission_id, "bank transfer.png.pdf", PDF)
            .await
            .expect("saves");

        assert!(stored.path.starts_with(&format!("payments/{submission_id}/")));
        assert!(stored.path.ends_with("-bank_transfer.png.pdf"));
        assert_eq!(storage.read(&stored.path).await.expect("reads"), PDF);

        storage.remove(&stored.path).await.expect("removes");
        storage.remove(&stored.path).await.expect("second remove is a no-op");
        assert!(storage.read(&stored.path).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = UploadStorage::new(dir.path(), 1024);

        assert!(matches!(
            storage.read("../secret").await,
            Err(StorageError::InvalidPath)
        ));
    }
}
