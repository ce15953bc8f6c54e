//! PDF Intake Server Library
//!
//! This crate provides MCP tools for PDF intake:
//! - `upload_pdf`: Store a PDF (rejecting byte-identical duplicates) and analyse it
//! - `extract_qr_codes`: Decode QR codes from embedded images
//! - `extract_metadata`: Read document properties with a quality verdict
//! - `extract_gstin`: Extract text and find a GSTIN
//! - `list_documents`: List stored documents

pub mod check;
pub mod config;
pub mod error;
pub mod gstin;
pub mod pdf;
pub mod pipeline;
pub mod qr;
pub mod server;
pub mod source;

pub use check::{MetadataCheck, RequiredFields};
pub use config::{QrConfig, ServerArgs, ServerConfig};
pub use error::{Error, Result};
pub use pipeline::{DocumentReport, GstinMatch, IntakePipeline};
pub use qr::{extract_qr_codes, QrExtractor, QrScanReport};
pub use server::{run_server, run_server_with_config, IntakeServer, PdfSource};
pub use source::{DocumentStore, StoredDocument};
