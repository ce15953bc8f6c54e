//! End-to-end processing of one uploaded document

use crate::check::{MetadataCheck, RequiredFields};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::gstin::{extract_gstin, is_valid_checksum};
use crate::pdf::{extract_text_from_path, read_metadata, MetadataRecord};
use crate::qr::{ImageFailure, QrExtractor};
use crate::source::{DocumentStore, StoredDocument};
use schemars::JsonSchema;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A GSTIN found in the document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct GstinMatch {
    pub value: String,
    /// Whether the 15th character matches the mod-36 check character
    pub checksum_valid: bool,
}

impl GstinMatch {
    /// Search `text` for the first GSTIN
    pub fn find(text: &str) -> Option<Self> {
        extract_gstin(text).map(|value| Self {
            checksum_valid: is_valid_checksum(&value),
            value,
        })
    }
}

/// Everything extracted from one accepted upload
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DocumentReport {
    pub document: StoredDocument,
    pub metadata: MetadataRecord,
    /// False when every metadata field is the sentinel value
    pub metadata_available: bool,
    /// Verdict of the metadata quality check
    pub metadata_ok: bool,
    pub qr_payloads: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qr_failures: Vec<ImageFailure>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gstin: Option<GstinMatch>,
}

/// Intake → metadata → QR scan → text/GSTIN, one document at a time
pub struct IntakePipeline {
    store: DocumentStore,
    extractor: QrExtractor,
    checker: Box<dyn MetadataCheck>,
    image_dir: PathBuf,
}

impl IntakePipeline {
    pub fn new<C>(store: DocumentStore, extractor: QrExtractor, checker: C, image_dir: PathBuf) -> Self
    where
        C: MetadataCheck + 'static,
    {
        Self {
            store,
            extractor,
            checker: Box::new(checker),
            image_dir,
        }
    }

    /// Build a pipeline from server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            DocumentStore::new(config.upload_dir.clone(), config.max_upload_bytes),
            QrExtractor::new(config.qr.clone()),
            RequiredFields::new(config.required_metadata.iter().cloned()),
            config.image_dir(),
        )
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn extractor(&self) -> &QrExtractor {
        &self.extractor
    }

    pub fn checker(&self) -> &dyn MetadataCheck {
        self.checker.as_ref()
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Store an upload and run every extraction stage over it.
    ///
    /// Duplicates are rejected before anything is written. Once stored, a
    /// document that cannot be opened for the image scan fails the request.
    pub fn process_upload(&self, file_name: Option<&str>, data: &[u8]) -> Result<DocumentReport> {
        let document = self.store.store(file_name, data)?;

        let metadata = read_metadata(&document.path);
        let metadata_available = !metadata.is_all_sentinel();
        let metadata_ok = self.checker.check(&metadata);

        let scan = self.extractor.scan_path(&document.path, &self.image_dir)?;
        let text = extract_text_from_path(&document.path)?;
        let gstin = GstinMatch::find(&text);

        tracing::info!(
            document = %document.name,
            metadata_available,
            metadata_ok,
            qr_codes = scan.payloads.len(),
            gstin = gstin.as_ref().map(|g| g.value.as_str()).unwrap_or("-"),
            "processed upload"
        );

        Ok(DocumentReport {
            document,
            metadata,
            metadata_available,
            metadata_ok,
            qr_payloads: scan.payloads,
            qr_failures: scan.failures,
            text,
            gstin,
        })
    }
}
