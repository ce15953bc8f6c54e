//! Error types for the PDF intake server

use thiserror::Error;

/// Result type alias for the PDF intake server
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF intake server
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// lopdf failed to parse or walk the document
    #[error("PDF parse error: {reason}")]
    PdfParse { reason: String },

    /// Uploaded bytes match a document already in storage
    #[error("Duplicate document: {digest} already stored as {existing}")]
    DuplicateDocument { digest: String, existing: String },

    /// A different document already owns the filename
    #[error("Filename already in use by a different document: {name}")]
    NameConflict { name: String },

    /// Upload exceeds the configured size limit
    #[error("Upload too large: {size} bytes (max: {max_size} bytes)")]
    UploadTooLarge { size: u64, max_size: u64 },

    /// Filename is empty or has no usable final component
    #[error("Invalid filename: {name}")]
    InvalidFilename { name: String },

    /// Embedded image uses an encoding we cannot reconstruct
    #[error("Unsupported image: {reason}")]
    UnsupportedImage { reason: String },

    /// Decoded QR payload is not valid UTF-8
    #[error("QR payload is not valid UTF-8: {0}")]
    NonUtf8Payload(#[from] std::string::FromUtf8Error),

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// Glob pattern could not be compiled
    #[error("Invalid pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Blocking task failed to complete
    #[error("Task join error: {reason}")]
    TaskJoin { reason: String },
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::PdfParse {
            reason: err.to_string(),
        }
    }
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors, file sizes) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PdfParse { .. } => "PDF processing error".to_string(),
            Error::DuplicateDocument { .. } => "This document already exists".to_string(),
            Error::NameConflict { name } => {
                format!("A different document named {} already exists", name)
            }
            Error::UploadTooLarge { max_size, .. } => {
                format!("Upload exceeds maximum size of {} bytes", max_size)
            }
            Error::InvalidFilename { .. } => "Invalid filename".to_string(),
            Error::UnsupportedImage { .. } => "Unsupported image".to_string(),
            Error::NonUtf8Payload(_) => "QR payload is not valid UTF-8".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::Image(_) => "Image processing error".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::InvalidPattern { .. } => "Invalid filename pattern".to_string(),
            Error::TaskJoin { .. } => "Internal error".to_string(),
        }
    }
}
