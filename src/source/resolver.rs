//! Source resolution for PDF data

use crate::error::{Error, Result};
use base64::Engine;
use std::path::Path;

/// Resolved PDF data
pub struct ResolvedPdf {
    pub data: Vec<u8>,
    pub source_name: String,
    /// Filename the upload should be stored under, when the source has one
    pub file_name: Option<String>,
}

fn check_pdf_header(data: &[u8], reason: &str) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: reason.to_string(),
        });
    }
    Ok(())
}

fn check_size(size: u64, max_bytes: u64) -> Result<()> {
    if size > max_bytes {
        return Err(Error::UploadTooLarge {
            size,
            max_size: max_bytes,
        });
    }
    Ok(())
}

/// Resolve a file path to PDF data, rejecting files above `max_bytes`
pub fn resolve_path<P: AsRef<Path>>(path: P, max_bytes: u64) -> Result<ResolvedPdf> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    // Reject oversized files before reading them
    check_size(std::fs::metadata(path)?.len(), max_bytes)?;

    let data = std::fs::read(path).map_err(Error::Io)?;
    check_size(data.len() as u64, max_bytes)?;
    check_pdf_header(&data, "Not a valid PDF file")?;

    Ok(ResolvedPdf {
        data,
        source_name: path.display().to_string(),
        file_name: path
            .file_name()
            .map(|name| name.to_string_lossy().to_string()),
    })
}

/// Resolve base64 encoded data to PDF data, rejecting payloads above `max_bytes`
pub fn resolve_base64(base64_data: &str, max_bytes: u64) -> Result<ResolvedPdf> {
    // Decoded size is within 3 bytes of 3/4 of the encoded length
    let estimated = base64_data.len() as u64 / 4 * 3;
    if estimated > max_bytes.saturating_add(3) {
        return Err(Error::UploadTooLarge {
            size: estimated,
            max_size: max_bytes,
        });
    }

    let engine = base64::engine::general_purpose::STANDARD;
    let data = engine.decode(base64_data.trim())?;
    check_size(data.len() as u64, max_bytes)?;
    check_pdf_header(&data, "Decoded data is not a valid PDF file")?;

    Ok(ResolvedPdf {
        data,
        source_name: "<base64>".to_string(),
        file_name: None,
    })
}
