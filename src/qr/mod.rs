//! QR code and barcode extraction from embedded PDF images
//!
//! Each embedded raster image is extracted, saved to disk, contrast-enhanced,
//! resized to a fixed canvas and handed to the barcode decoders.

mod decode;
mod enhance;
mod extractor;

pub use decode::decode_symbols;
pub use enhance::{enhance_contrast, prepare_for_decoding};
pub use extractor::{extract_qr_codes, ImageFailure, QrExtractor, QrScanReport};
