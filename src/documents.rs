//! Document blob storage used by the review workflow.
//!
//! Blobs live outside the database; contract records only keep the reference
//! returned by [`DocumentStore::put`]. Uploads always complete before the
//! workflow commits, so a failed upload never leaves a record pointing at a
//! missing file.
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::DocumentStoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Contract,
    Termination,
}

/// A document supplied by the acting user alongside a decision.
///
/// `issue_date` is kept raw; the attachment gate parses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub display_name: String,
    pub issue_date: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub reference: String,
    pub size: u64,
}

pub trait DocumentStore: Send + Sync {
    /// Store the upload and return its reference. Storing identical bytes twice
    /// must be harmless.
    fn put(&self, upload: &DocumentUpload) -> Result<StoredFile, DocumentStoreError>;
    /// All references currently held by the store.
    fn references(&self) -> Result<Vec<String>, DocumentStoreError>;
    /// When `reference` was last stored. Re-storing identical bytes counts.
    fn stored_at(&self, reference: &str) -> Result<SystemTime, DocumentStoreError>;
    fn remove(&self, reference: &str) -> Result<(), DocumentStoreError>;
}

/// Content-addressed files under a root directory.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Contract => "contract",
            DocumentKind::Termination => "termination",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DocumentUpload {
    pub fn new(display_name: &str, issue_date: &str, bytes: Vec<u8>) -> Self {
        Self {
            display_name: display_name.to_string(),
            issue_date: issue_date.to_string(),
            file_name: "document.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes,
        }
    }
    pub fn set_file_name(mut self, file_name: &str) -> Self {
        self.file_name = file_name.to_string();
        self
    }
    pub fn set_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, DocumentStoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
    pub fn root(&self) -> &Path {
        &self.root
    }
    fn path_for(&self, reference: &str) -> Result<PathBuf, DocumentStoreError> {
        if reference.contains(['/', '\\']) || reference.starts_with('.') {
            return Err(DocumentStoreError::Rejected(format!(
                "invalid document reference '{reference}'"
            )));
        }
        Ok(self.root.join(reference))
    }
    // sha256 of the content, keeping the original extension
    fn reference_for(upload: &DocumentUpload) -> String {
        let digest = sha256::digest(&upload.bytes);
        match Path::new(&upload.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            Some(ext) if !ext.is_empty() => format!("{digest}.{}", ext.to_ascii_lowercase()),
            _ => digest,
        }
    }
}

impl DocumentStore for FsDocumentStore {
    fn put(&self, upload: &DocumentUpload) -> Result<StoredFile, DocumentStoreError> {
        let reference = Self::reference_for(upload);
        let path = self.root.join(&reference);
        let size = upload.bytes.len() as u64;

        if path.exists() {
            // refresh the age so a sweep does not take it for an old orphan
            fs::OpenOptions::new()
                .append(true)
                .open(&path)?
                .set_modified(SystemTime::now())?;
            tracing::debug!(reference = %reference, "document already stored");
            return Ok(StoredFile { reference, size });
        }

        let tmp = self.root.join(format!(".{reference}.partial"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&upload.bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        tracing::debug!(reference = %reference, size, "document stored");
        Ok(StoredFile { reference, size })
    }

    fn references(&self) -> Result<Vec<String>, DocumentStoreError> {
        let mut references = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                // skip interrupted writes
                if !name.starts_with('.') {
                    references.push(name.to_string());
                }
            }
        }
        references.sort();
        Ok(references)
    }

    fn stored_at(&self, reference: &str) -> Result<SystemTime, DocumentStoreError> {
        Ok(fs::metadata(self.path_for(reference)?)?.modified()?)
    }

    fn remove(&self, reference: &str) -> Result<(), DocumentStoreError> {
        fs::remove_file(self.path_for(reference)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn identical_uploads_share_a_reference() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path()).unwrap();

        let upload = DocumentUpload::new("Termination Letter", "2025-01-10", b"signed".to_vec());
        let first = store.put(&upload).unwrap();
        let second = store.put(&upload).unwrap();

        assert_eq!(first, second);
        assert!(first.reference.ends_with(".pdf"));
        assert_eq!(store.references().unwrap(), vec![first.reference]);
    }

    #[test]
    fn remove_rejects_paths() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path()).unwrap();

        assert!(store.remove("../outside.pdf").is_err());
        assert!(store.stored_at("../outside.pdf").is_err());
    }

    #[test]
    fn storing_again_refreshes_the_age() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path()).unwrap();
        let upload = DocumentUpload::new("Termination Letter", "2025-01-10", b"signed".to_vec());

        let stored = store.put(&upload).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join(&stored.reference))
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH)
            .unwrap();
        assert_eq!(store.stored_at(&stored.reference).unwrap(), SystemTime::UNIX_EPOCH);

        store.put(&upload).unwrap();
        assert!(store.stored_at(&stored.reference).unwrap() > SystemTime::UNIX_EPOCH);
    }
}
