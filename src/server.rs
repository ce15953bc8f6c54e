//! MCP Server implementation using rmcp

use crate::config::ServerConfig;
use crate::pdf::{extract_text, metadata_from_bytes, open_bytes, MetadataRecord};
use crate::pipeline::{DocumentReport, GstinMatch, IntakePipeline};
use crate::qr::ImageFailure;
use crate::source::{resolve_base64, resolve_path, ResolvedPdf, StoredDocumentInfo};
use anyhow::Result;
use parking_lot::Mutex;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Where a PDF comes from
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the PDF file
        path: String,
    },
    /// Base64 encoded PDF data
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
}

impl<'de> serde::Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        if let Some(obj) = value.as_object() {
            if let Some(v) = obj.get("path") {
                if let Some(s) = v.as_str() {
                    return Ok(PdfSource::Path {
                        path: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"path\" must be a string"));
            }
            if let Some(v) = obj.get("base64") {
                if let Some(s) = v.as_str() {
                    return Ok(PdfSource::Base64 {
                        base64: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"base64\" must be a string"));
            }
            let keys: Vec<&String> = obj.keys().collect();
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\" or \"base64\", but got keys: {:?}",
                keys
            )))
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\" or \"base64\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )))
        }
    }
}

/// PDF intake MCP server
#[derive(Clone)]
pub struct IntakeServer {
    /// Held for the whole processing of one document
    pipeline: Arc<Mutex<IntakePipeline>>,
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<ServerConfig>,
}

// ============================================================================
// Request/Response types for upload_pdf
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UploadPdfParams {
    /// PDF to upload
    pub source: PdfSource,
    /// Filename to store the document under (default: the source's filename,
    /// or a name derived from the content digest)
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct UploadPdfResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<DocumentReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for extract_qr_codes
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractQrCodesParams {
    /// PDF sources to scan
    pub sources: Vec<PdfSource>,
    /// Directory extracted images are saved to (default: server image directory)
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ExtractQrCodesResult {
    pub source: String,
    /// Decoded payloads in page order
    pub payloads: Vec<String>,
    /// Number of embedded images encountered
    pub images_seen: u32,
    /// Paths of the saved images
    pub saved_images: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ImageFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for extract_metadata
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractMetadataParams {
    /// PDF sources to process
    pub sources: Vec<PdfSource>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ExtractMetadataResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataRecord>,
    /// False when every field is "Not available"
    pub metadata_available: bool,
    /// Verdict of the metadata quality check
    pub metadata_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for extract_gstin
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractGstinParams {
    /// PDF sources to process
    pub sources: Vec<PdfSource>,
    /// Include the full extracted text (default: false)
    #[serde(default)]
    pub include_text: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ExtractGstinResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gstin: Option<GstinMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for list_documents
// ============================================================================

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListDocumentsParams {
    /// Filename pattern to filter (e.g., "invoice*.pdf"). Supports glob patterns.
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ListDocumentsResult {
    /// Storage directory that was listed
    pub directory: String,
    pub documents: Vec<StoredDocumentInfo>,
    pub total_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl IntakeServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new IntakeServer with full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        let pipeline = IntakePipeline::from_config(&config);
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Upload a PDF and run the full analysis
    #[tool(
        description = "Upload a PDF into deduplicated storage and analyse it: document metadata with a quality verdict, QR codes decoded from embedded images, extracted text and GSTIN. Byte-identical documents already in storage are rejected.

Source format: {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}"
    )]
    async fn upload_pdf(&self, Parameters(params): Parameters<UploadPdfParams>) -> String {
        let result = match self.process_upload(&params).await {
            Ok(report) => UploadPdfResult {
                source: Self::source_name(&params.source),
                report: Some(report),
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "upload_pdf failed");
                UploadPdfResult {
                    source: Self::source_name(&params.source),
                    report: None,
                    error: Some(e.client_message()),
                }
            }
        };

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Decode QR codes from embedded images
    #[tool(
        description = "Extract embedded images from PDF files, save them, and decode any QR codes they contain. Returns the decoded payloads in page order.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}"
    )]
    async fn extract_qr_codes(
        &self,
        Parameters(params): Parameters<ExtractQrCodesParams>,
    ) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_extract_qr_codes(source, &params)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "extract_qr_codes failed");
                    ExtractQrCodesResult {
                        source: Self::source_name(source),
                        payloads: vec![],
                        images_seen: 0,
                        saved_images: vec![],
                        failures: vec![],
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Extract PDF metadata
    #[tool(
        description = "Extract PDF metadata (Title, Author, Subject, Keywords, Creator, Producer, CreationDate, ModDate, Trapped). Missing fields read \"Not available\". Includes a metadata quality verdict.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}"
    )]
    async fn extract_metadata(
        &self,
        Parameters(params): Parameters<ExtractMetadataParams>,
    ) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_extract_metadata(source)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "extract_metadata failed");
                    ExtractMetadataResult {
                        source: Self::source_name(source),
                        metadata: None,
                        metadata_available: false,
                        metadata_ok: false,
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Extract text and find a GSTIN
    #[tool(
        description = "Extract the plain text of PDF files and find the first GSTIN (15-character Indian GST identifier), with its check-character verdict.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}"
    )]
    async fn extract_gstin(&self, Parameters(params): Parameters<ExtractGstinParams>) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_extract_gstin(source, &params)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "extract_gstin failed");
                    ExtractGstinResult {
                        source: Self::source_name(source),
                        gstin: None,
                        text: None,
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// List stored documents
    #[tool(
        description = "List PDF documents in intake storage with size, content digest and modification time. Optional glob pattern filters by filename."
    )]
    async fn list_documents(&self, Parameters(params): Parameters<ListDocumentsParams>) -> String {
        let result = self.process_list_documents(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "list_documents failed");
            ListDocumentsResult {
                directory: self.config.upload_dir.display().to_string(),
                documents: vec![],
                total_count: 0,
                error: Some(e.client_message()),
            }
        });

        serde_json::to_string_pretty(&result).unwrap_or_default()
    }
}

impl IntakeServer {
    fn source_name(source: &PdfSource) -> String {
        match source {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Base64 { .. } => "<base64>".to_string(),
        }
    }

    fn resolve_source(&self, source: &PdfSource) -> crate::error::Result<ResolvedPdf> {
        match source {
            PdfSource::Path { path } => {
                let path = self.validate_path_access(path)?;
                resolve_path(path, self.config.max_upload_bytes)
            }
            PdfSource::Base64 { base64 } => resolve_base64(base64, self.config.max_upload_bytes),
        }
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| {
            crate::error::Error::PathAccessDenied {
                path: path.to_string(),
            }
        })?;

        for dir in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical.starts_with(&canonical_dir) {
                    return Ok(canonical);
                }
            }
        }

        Err(crate::error::Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    /// Validate that an output directory is within allowed resource directories.
    /// Canonicalizes the nearest existing ancestor since the directory may not exist yet.
    fn validate_output_dir_access(&self, dir: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(dir));
        }

        let requested = std::path::Path::new(dir);
        let denied = || crate::error::Error::PathAccessDenied {
            path: dir.to_string(),
        };

        let existing = requested
            .ancestors()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
            .unwrap_or(std::path::Path::new("."));
        let canonical_base = std::fs::canonicalize(existing).map_err(|_| denied())?;
        let remainder = requested.strip_prefix(existing).unwrap_or(requested);
        if remainder
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(denied());
        }
        let canonical_target = canonical_base.join(remainder);

        for allowed in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(allowed) {
                if canonical_target.starts_with(&canonical_dir) {
                    return Ok(canonical_target);
                }
            }
        }

        Err(denied())
    }

    async fn process_upload(
        &self,
        params: &UploadPdfParams,
    ) -> crate::error::Result<DocumentReport> {
        let resolved = self.resolve_source(&params.source)?;
        let file_name = params.filename.clone().or(resolved.file_name);
        let data = resolved.data;
        let pipeline = Arc::clone(&self.pipeline);

        // Move CPU-heavy PDF work to blocking thread pool
        tokio::task::spawn_blocking(move || {
            pipeline.lock().process_upload(file_name.as_deref(), &data)
        })
        .await
        .map_err(|e| crate::error::Error::TaskJoin {
            reason: e.to_string(),
        })?
    }

    async fn process_extract_qr_codes(
        &self,
        source: &PdfSource,
        params: &ExtractQrCodesParams,
    ) -> crate::error::Result<ExtractQrCodesResult> {
        let resolved = self.resolve_source(source)?;
        let source_name = resolved.source_name.clone();
        let output_dir = match params.output_dir {
            Some(ref dir) => self.validate_output_dir_access(dir)?,
            None => self.config.image_dir(),
        };

        let data = resolved.data;
        let pipeline = Arc::clone(&self.pipeline);

        let report = tokio::task::spawn_blocking(move || {
            pipeline.lock().extractor().scan_bytes(&data, &output_dir)
        })
        .await
        .map_err(|e| crate::error::Error::TaskJoin {
            reason: e.to_string(),
        })??;

        Ok(ExtractQrCodesResult {
            source: source_name,
            payloads: report.payloads,
            images_seen: report.images_seen as u32,
            saved_images: report
                .saved_images
                .iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect(),
            failures: report.failures,
            error: None,
        })
    }

    async fn process_extract_metadata(
        &self,
        source: &PdfSource,
    ) -> crate::error::Result<ExtractMetadataResult> {
        let resolved = self.resolve_source(source)?;
        let source_name = resolved.source_name.clone();
        let data = resolved.data;
        let pipeline = Arc::clone(&self.pipeline);

        let (metadata, metadata_ok) = tokio::task::spawn_blocking(move || {
            let pipeline = pipeline.lock();
            let metadata = metadata_from_bytes(&data);
            let metadata_ok = pipeline.checker().check(&metadata);
            (metadata, metadata_ok)
        })
        .await
        .map_err(|e| crate::error::Error::TaskJoin {
            reason: e.to_string(),
        })?;

        Ok(ExtractMetadataResult {
            source: source_name,
            metadata_available: !metadata.is_all_sentinel(),
            metadata: Some(metadata),
            metadata_ok,
            error: None,
        })
    }

    async fn process_extract_gstin(
        &self,
        source: &PdfSource,
        params: &ExtractGstinParams,
    ) -> crate::error::Result<ExtractGstinResult> {
        let resolved = self.resolve_source(source)?;
        let source_name = resolved.source_name.clone();
        let data = resolved.data;
        let include_text = params.include_text;
        let pipeline = Arc::clone(&self.pipeline);

        let (gstin, text) = tokio::task::spawn_blocking(move || {
            let _guard = pipeline.lock();
            let document = open_bytes(&data)?;
            let text = extract_text(&document);
            Ok::<_, crate::error::Error>((GstinMatch::find(&text), text))
        })
        .await
        .map_err(|e| crate::error::Error::TaskJoin {
            reason: e.to_string(),
        })??;

        Ok(ExtractGstinResult {
            source: source_name,
            gstin,
            text: include_text.then_some(text),
            error: None,
        })
    }

    /// List stored documents (public for testing)
    pub async fn process_list_documents(
        &self,
        params: &ListDocumentsParams,
    ) -> crate::error::Result<ListDocumentsResult> {
        let pattern = params
            .pattern
            .as_deref()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| crate::error::Error::InvalidPattern {
                    pattern: p.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;
        let pipeline = Arc::clone(&self.pipeline);

        // Listing hashes every stored file
        tokio::task::spawn_blocking(move || {
            let pipeline = pipeline.lock();
            let store = pipeline.store();
            let documents = store.list(pattern.as_ref())?;
            let total_count = documents.len() as u32;

            Ok::<_, crate::error::Error>(ListDocumentsResult {
                directory: store.root().display().to_string(),
                documents,
                total_count,
                error: None,
            })
        })
        .await
        .map_err(|e| crate::error::Error::TaskJoin {
            reason: e.to_string(),
        })?
    }
}

impl Default for IntakeServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for IntakeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF intake server: upload PDFs into deduplicated storage and extract \
                 metadata, QR code payloads from embedded images, text and GSTIN."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with default configuration
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        image_dir = %config.image_dir().display(),
        max_upload_bytes = config.max_upload_bytes,
        "configured intake storage"
    );

    let server = IntakeServer::with_config(config);

    tracing::info!("PDF intake server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
