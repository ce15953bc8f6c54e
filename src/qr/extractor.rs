//! Embedded image scan: extract, save, enhance, decode

use super::decode::decode_symbols;
use super::enhance::prepare_for_decoding;
use crate::config::QrConfig;
use crate::error::Result;
use crate::pdf::{extract_image, open_bytes, open_path, page_ids, page_images, ImageRef};
use lopdf::Document;
use schemars::JsonSchema;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// An embedded image that could not be processed
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ImageFailure {
    /// Page index (0-indexed)
    pub page: usize,
    /// Image index within the page
    pub index: usize,
    pub reason: String,
}

/// Outcome of scanning one document
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct QrScanReport {
    /// Decoded payloads in page order, then in-page discovery order
    pub payloads: Vec<String>,
    /// Number of image references encountered across all pages
    pub images_seen: usize,
    /// Files written to the output directory
    pub saved_images: Vec<PathBuf>,
    /// Images skipped because processing failed
    pub failures: Vec<ImageFailure>,
}

/// Scans PDF documents for QR codes in their embedded images
#[derive(Debug, Clone, Default)]
pub struct QrExtractor {
    config: QrConfig,
}

impl QrExtractor {
    pub fn new(config: QrConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QrConfig {
        &self.config
    }

    /// Decode QR payloads from every embedded image of the PDF at `pdf_path`,
    /// saving each extracted image into `output_dir`.
    ///
    /// Failing to open the document is an error; a failing image is logged and
    /// skipped.
    pub fn extract_qr_codes<P, Q>(&self, pdf_path: P, output_dir: Q) -> Result<Vec<String>>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        Ok(self.scan_path(pdf_path, output_dir)?.payloads)
    }

    /// Scan the PDF at `pdf_path`
    pub fn scan_path<P, Q>(&self, pdf_path: P, output_dir: Q) -> Result<QrScanReport>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let document = open_path(pdf_path)?;
        Ok(self.scan_document(&document, output_dir.as_ref()))
    }

    /// Scan a PDF held in memory
    pub fn scan_bytes<Q: AsRef<Path>>(&self, data: &[u8], output_dir: Q) -> Result<QrScanReport> {
        let document = open_bytes(data)?;
        Ok(self.scan_document(&document, output_dir.as_ref()))
    }

    /// Scan an opened document page by page
    pub fn scan_document(&self, document: &Document, output_dir: &Path) -> QrScanReport {
        let mut report = QrScanReport::default();

        for (page, page_id) in page_ids(document).into_iter().enumerate() {
            let images = match page_images(document, page_id) {
                Ok(images) => images,
                Err(e) => {
                    tracing::warn!(page, error = %e, "failed to list page images");
                    continue;
                }
            };

            for (index, image_ref) in images.iter().enumerate() {
                report.images_seen += 1;

                match self.process_image(document, page, index, image_ref, output_dir, &mut report) {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::debug!(page, index, image = %image_ref.name, "image has no data, skipping");
                    }
                    Err(e) => {
                        tracing::warn!(
                            page,
                            index,
                            image = %image_ref.name,
                            error = %e,
                            "an error occurred while processing an image"
                        );
                        report.failures.push(ImageFailure {
                            page,
                            index,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        tracing::debug!(
            images = report.images_seen,
            payloads = report.payloads.len(),
            failures = report.failures.len(),
            "QR scan finished"
        );

        report
    }

    /// Extract, save, enhance and decode a single image into `report`.
    ///
    /// The saved file is written before decoding, so images without a
    /// readable symbol are still kept. Returns `false` when the image has
    /// no data.
    fn process_image(
        &self,
        document: &Document,
        page: usize,
        index: usize,
        image_ref: &ImageRef,
        output_dir: &Path,
        report: &mut QrScanReport,
    ) -> Result<bool> {
        let Some(encoded) = extract_image(document, image_ref.id)? else {
            return Ok(false);
        };

        let raster = image::load_from_memory(&encoded.bytes)?;

        std::fs::create_dir_all(output_dir)?;
        let saved = output_dir.join(format!(
            "image_{}_{}.{}",
            page,
            index,
            encoded.encoding.extension()
        ));
        // Same page/index on a later run overwrites the earlier file
        std::fs::write(&saved, &encoded.bytes)?;
        report.saved_images.push(saved);

        let prepared = prepare_for_decoding(&raster, &self.config);
        decode_symbols(&prepared, &mut report.payloads)?;

        Ok(true)
    }
}

/// Decode QR payloads from a PDF with the default enhancement parameters
pub fn extract_qr_codes<P, Q>(pdf_path: P, output_dir: Q) -> Result<Vec<String>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    QrExtractor::default().extract_qr_codes(pdf_path, output_dir)
}
