//! Barcode detection and decoding
//!
//! QR symbols are read with rqrr, which yields the raw payload bytes. Every
//! other symbology (EAN/UPC, Code 128, Code 39, Data Matrix, ...) is read
//! with rxing.

use crate::error::Result;
use image::GrayImage;
use rxing::{BarcodeFormat, Exceptions};

/// Decode every barcode symbol in a greyscale image, appending payloads to
/// `payloads` as they are decoded.
///
/// QR payloads come first in the order the QR detector reports them,
/// followed by other symbologies in rxing's order. QR grids that fail to
/// decode are detector false positives and are skipped. A QR payload that is
/// not UTF-8 stops decoding with an error; payloads appended before it stay.
pub fn decode_symbols(image: &GrayImage, payloads: &mut Vec<String>) -> Result<()> {
    decode_qr(image, payloads)?;
    decode_other(image, payloads);
    Ok(())
}

fn decode_qr(image: &GrayImage, payloads: &mut Vec<String>) -> Result<()> {
    let (width, height) = image.dimensions();
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            image.get_pixel(x as u32, y as u32).0[0]
        });

    for grid in prepared.detect_grids() {
        let mut payload = Vec::new();
        match grid.decode_to(&mut payload) {
            Ok(_) => payloads.push(String::from_utf8(payload)?),
            Err(e) => tracing::debug!(error = ?e, "skipping undecodable QR grid"),
        }
    }

    Ok(())
}

fn decode_other(image: &GrayImage, payloads: &mut Vec<String>) {
    let (width, height) = image.dimensions();

    match rxing::helpers::detect_multiple_in_luma(image.as_raw().clone(), width, height) {
        Ok(results) => payloads.extend(
            results
                .iter()
                .filter(|result| *result.getBarcodeFormat() != BarcodeFormat::QR_CODE)
                .map(|result| result.getText().to_string()),
        ),
        Err(Exceptions::NotFoundException(_)) => {}
        Err(e) => tracing::debug!(error = %e, "barcode reader failed"),
    }
}
