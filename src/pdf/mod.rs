//! PDF processing layer
//!
//! This module provides PDF access using lopdf: document loading, embedded
//! image extraction, metadata and text.

mod document;
mod images;
mod metadata;
mod text;

pub use document::{open_bytes, open_path, page_ids, page_images, ImageRef};
pub use images::{extract_image, EncodedImage, ImageEncoding};
pub use metadata::{
    metadata_from_bytes, read_document_metadata, read_metadata,
    MetadataRecord, METADATA_KEYS, NOT_AVAILABLE,
};
pub use text::{extract_text, extract_text_from_path};
