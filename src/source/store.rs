//! Flat, content-deduplicated document storage

use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A document written to storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct StoredDocument {
    /// Filename inside the storage directory
    pub name: String,
    /// Full path of the stored file
    pub path: PathBuf,
    /// BLAKE3 hex digest of the file contents
    pub digest: String,
    /// File size in bytes
    pub size: u64,
}

/// Listing entry for a stored document
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct StoredDocumentInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub digest: String,
    /// Last modified time (ISO 8601 format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

/// Storage directory where uploads are kept under their original filename.
///
/// No index is kept: every duplicate check re-reads and hashes every file in
/// the directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
    max_bytes: u64,
}

impl DocumentStore {
    /// Create a store rooted at `root` accepting uploads up to `max_bytes`
    pub fn new<P: Into<PathBuf>>(root: P, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Content digest of raw bytes
    pub fn digest(data: &[u8]) -> String {
        blake3::hash(data).to_string()
    }

    /// Content digest of a file on disk
    pub fn digest_file<P: AsRef<Path>>(path: P) -> Result<String> {
        let data = std::fs::read(path)?;
        Ok(Self::digest(&data))
    }

    /// Find a stored file whose contents hash to `digest`
    pub fn find_duplicate(&self, digest: &str) -> Result<Option<PathBuf>> {
        if !self.root.exists() {
            return Ok(None);
        }

        for entry in std::fs::read_dir(&self.root)? {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue, // Skip entries we can't read
            };

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            match Self::digest_file(&path) {
                Ok(existing) if existing == digest => return Ok(Some(path)),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to hash stored file");
                }
            }
        }

        Ok(None)
    }

    /// Store an upload unless identical content is already present.
    ///
    /// Without a filename the document is named after its digest.
    pub fn store(&self, file_name: Option<&str>, data: &[u8]) -> Result<StoredDocument> {
        let size = data.len() as u64;
        if size > self.max_bytes {
            return Err(Error::UploadTooLarge {
                size,
                max_size: self.max_bytes,
            });
        }

        let digest = Self::digest(data);
        let name = match file_name {
            Some(name) => sanitize_file_name(name)?,
            None => format!("upload-{}.pdf", &digest[..16]),
        };

        if let Some(existing) = self.find_duplicate(&digest)? {
            tracing::info!(%digest, existing = %existing.display(), "rejecting duplicate upload");
            return Err(Error::DuplicateDocument {
                digest,
                existing: existing.display().to_string(),
            });
        }

        std::fs::create_dir_all(&self.root)?;
        let path = self.root.join(&name);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => Error::NameConflict { name: name.clone() },
                _ => Error::Io(e),
            })?;
        file.write_all(data)?;
        file.sync_all()?;

        tracing::info!(%digest, path = %path.display(), size, "stored upload");

        Ok(StoredDocument {
            name,
            path,
            digest,
            size,
        })
    }

    /// List stored PDF files sorted by name, optionally filtered by a glob pattern
    pub fn list(&self, pattern: Option<&glob::Pattern>) -> Result<Vec<StoredDocumentInfo>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();

        for entry in std::fs::read_dir(&self.root)? {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };

            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_pdf = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false);
            if !is_pdf {
                continue;
            }

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            if let Some(pat) = pattern {
                if !pat.matches(&name) {
                    continue;
                }
            }

            let metadata = std::fs::metadata(&path).ok();
            let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
            let modified = metadata
                .as_ref()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| {
                    chrono::DateTime::from_timestamp(d.as_secs() as i64, 0)
                        .map(|dt| dt.to_rfc3339())
                        .unwrap_or_default()
                });

            documents.push(StoredDocumentInfo {
                digest: Self::digest_file(&path)?,
                path: path.to_string_lossy().to_string(),
                name,
                size,
                modified,
            });
        }

        documents.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(documents)
    }
}

/// Reduce a client-supplied filename to its final path component
fn sanitize_file_name(name: &str) -> Result<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();

    if base.is_empty() || base == "." || base == ".." {
        return Err(Error::InvalidFilename {
            name: name.to_string(),
        });
    }

    Ok(base.to_string())
}
