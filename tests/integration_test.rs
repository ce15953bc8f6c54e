//! Integration tests for the PDF intake server

mod common;

use common::{
    code128_image, invoice_pdf, jpeg_bytes, plain_image, qr_image, PdfBuilder, INVOICE_PAYLOAD,
    UPI_PAYLOAD,
};
use lopdf::dictionary;
use pdf_intake_server::pdf::{metadata_from_bytes, read_metadata, NOT_AVAILABLE};
use pdf_intake_server::{
    extract_qr_codes, DocumentStore, Error, IntakePipeline, QrExtractor, ServerConfig,
};
use pretty_assertions::assert_eq;
use std::path::Path;
use tracing_test::traced_test;

fn write_pdf(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("Failed to write fixture");
    path
}

fn pipeline_in(root: &Path) -> IntakePipeline {
    IntakePipeline::from_config(&ServerConfig {
        upload_dir: root.join("uploads"),
        image_dir: Some(root.join("images")),
        ..ServerConfig::default()
    })
}

#[test]
fn test_pdf_without_images_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut pdf = PdfBuilder::new();
    pdf.add_page(&[], Some("No pictures here"));
    let path = write_pdf(dir.path(), "text-only.pdf", &pdf.build());

    let out = dir.path().join("images");
    let payloads = extract_qr_codes(&path, &out).unwrap();

    assert!(payloads.is_empty());
    assert!(!out.exists(), "output directory must not be created");
}

#[test]
fn test_image_without_symbol_is_still_saved() {
    let dir = tempfile::tempdir().unwrap();
    let mut pdf = PdfBuilder::new();
    let photo = plain_image(120, 80);
    let id = pdf.add_jpeg_image(jpeg_bytes(&photo), 120, 80);
    pdf.add_page(&[id], None);
    let path = write_pdf(dir.path(), "photo.pdf", &pdf.build());

    let out = dir.path().join("images");
    let report = QrExtractor::default().scan_path(&path, &out).unwrap();

    assert!(report.payloads.is_empty());
    assert!(report.failures.is_empty());
    assert_eq!(report.images_seen, 1);
    assert_eq!(report.saved_images, vec![out.join("image_0_0.jpg")]);
    assert!(out.join("image_0_0.jpg").exists());
}

#[test]
fn test_single_qr_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(
        dir.path(),
        "invoice.pdf",
        &invoice_pdf(UPI_PAYLOAD, "Tax Invoice"),
    );

    let out = dir.path().join("images");
    let payloads = extract_qr_codes(&path, &out).unwrap();

    assert_eq!(payloads, vec![UPI_PAYLOAD.to_string()]);
    assert!(out.join("image_0_0.png").exists());
}

#[test]
fn test_repeated_image_on_two_pages_is_reported_twice() {
    let dir = tempfile::tempdir().unwrap();
    let mut pdf = PdfBuilder::new();
    let qr = pdf.add_gray_image(&qr_image(INVOICE_PAYLOAD));
    pdf.add_page(&[qr], None);
    pdf.add_page(&[qr], None);
    let path = write_pdf(dir.path(), "two-pages.pdf", &pdf.build());

    let out = dir.path().join("images");
    let report = QrExtractor::default().scan_path(&path, &out).unwrap();

    assert_eq!(
        report.payloads,
        vec![INVOICE_PAYLOAD.to_string(), INVOICE_PAYLOAD.to_string()]
    );
    assert!(out.join("image_0_0.png").exists());
    assert!(out.join("image_1_0.png").exists());
}

#[test]
#[traced_test]
fn test_corrupt_image_is_skipped_and_order_kept() {
    let dir = tempfile::tempdir().unwrap();
    let mut pdf = PdfBuilder::new();
    let first = pdf.add_gray_image(&qr_image(UPI_PAYLOAD));
    let broken = pdf.add_jpeg_image(b"\xFF\xD8\xFF\xE0 definitely not a jpeg".to_vec(), 300, 300);
    let plain = pdf.add_gray_image(&plain_image(64, 64));
    let second = pdf.add_gray_image(&qr_image(INVOICE_PAYLOAD));
    pdf.add_page(&[first, broken], None);
    pdf.add_page(&[plain, second], None);
    let path = write_pdf(dir.path(), "mixed.pdf", &pdf.build());

    let out = dir.path().join("images");
    let report = QrExtractor::default().scan_path(&path, &out).unwrap();

    assert_eq!(
        report.payloads,
        vec![UPI_PAYLOAD.to_string(), INVOICE_PAYLOAD.to_string()]
    );
    assert_eq!(report.images_seen, 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!((report.failures[0].page, report.failures[0].index), (0, 1));
    assert!(!out.join("image_0_1.jpg").exists());
    assert_eq!(report.saved_images.len(), 3);
    assert!(logs_contain("an error occurred while processing an image"));
}

#[test]
fn test_oversized_image_dimensions_do_not_abort_scan() {
    let dir = tempfile::tempdir().unwrap();
    let mut pdf = PdfBuilder::new();
    let qr = pdf.add_gray_image(&qr_image(UPI_PAYLOAD));
    let huge = pdf.add_image_stream(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => u32::MAX as i64,
            "Height" => u32::MAX as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        vec![0; 64],
    );
    pdf.add_page(&[qr, huge], None);
    let path = write_pdf(dir.path(), "huge.pdf", &pdf.build());

    let report = QrExtractor::default()
        .scan_path(&path, dir.path().join("images"))
        .unwrap();

    assert_eq!(report.payloads, vec![UPI_PAYLOAD.to_string()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!((report.failures[0].page, report.failures[0].index), (0, 1));
}

#[test]
fn test_palette_qr_image() {
    let dir = tempfile::tempdir().unwrap();
    let mut pdf = PdfBuilder::new();
    let qr = pdf.add_indexed_image(&qr_image(INVOICE_PAYLOAD));
    pdf.add_page(&[qr], None);
    let path = write_pdf(dir.path(), "palette.pdf", &pdf.build());

    let payloads = extract_qr_codes(&path, dir.path().join("images")).unwrap();
    assert_eq!(payloads, vec![INVOICE_PAYLOAD.to_string()]);
}

#[test]
fn test_one_dimensional_barcode() {
    let dir = tempfile::tempdir().unwrap();
    let mut pdf = PdfBuilder::new();
    let barcode = pdf.add_gray_image(&code128_image("20240042"));
    let qr = pdf.add_gray_image(&qr_image(UPI_PAYLOAD));
    pdf.add_page(&[barcode], None);
    pdf.add_page(&[qr], None);
    let path = write_pdf(dir.path(), "barcode.pdf", &pdf.build());

    let payloads = extract_qr_codes(&path, dir.path().join("images")).unwrap();
    assert_eq!(
        payloads,
        vec!["20240042".to_string(), UPI_PAYLOAD.to_string()]
    );
}

#[test]
fn test_scan_of_unparseable_pdf_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "broken.pdf", b"%PDF-1.4\n%%EOF garbage");

    let result = extract_qr_codes(&path, dir.path().join("images"));
    assert!(matches!(result, Err(Error::PdfParse { .. })));

    let result = extract_qr_codes(dir.path().join("missing.pdf"), dir.path().join("images"));
    assert!(matches!(result, Err(Error::PdfNotFound { .. })));
}

#[test]
fn test_metadata_partial_fields() {
    let dir = tempfile::tempdir().unwrap();
    let mut pdf = PdfBuilder::new();
    pdf.add_page(&[], Some("body"));
    pdf.info(&[
        ("Title", "Tax Invoice"),
        ("Author", "Accounts"),
        ("Producer", "Billing Suite 4.2"),
    ]);
    let path = write_pdf(dir.path(), "partial.pdf", &pdf.build());

    let record = read_metadata(&path);
    assert_eq!(record.title, "Tax Invoice");
    assert_eq!(record.author, "Accounts");
    assert_eq!(record.producer, "Billing Suite 4.2");
    assert_eq!(
        record.fields().filter(|(_, v)| *v == NOT_AVAILABLE).count(),
        6
    );
}

#[test]
fn test_metadata_absent() {
    let mut pdf = PdfBuilder::new();
    pdf.add_page(&[], None);

    let record = metadata_from_bytes(&pdf.build());
    assert!(record.is_all_sentinel());
}

#[test]
fn test_full_upload_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_in(dir.path());

    let mut pdf = PdfBuilder::new();
    let qr = pdf.add_gray_image(&qr_image(UPI_PAYLOAD));
    pdf.add_page(&[qr], Some("Supplier GSTIN: 27AAPFU0939F1ZV"));
    pdf.info(&[
        ("Author", "Accounts"),
        ("Creator", "Writer"),
        ("Producer", "Billing Suite 4.2"),
        ("CreationDate", "D:20240105093000+05'30'"),
    ]);
    let data = pdf.build();

    let report = pipeline.process_upload(Some("invoice.pdf"), &data).unwrap();

    assert_eq!(report.document.name, "invoice.pdf");
    assert_eq!(report.document.digest, DocumentStore::digest(&data));
    assert!(report.metadata_available);
    assert!(report.metadata_ok);
    assert_eq!(report.qr_payloads, vec![UPI_PAYLOAD.to_string()]);
    assert!(report.text.contains("27AAPFU0939F1ZV"));
    let gstin = report.gstin.expect("GSTIN found");
    assert_eq!(gstin.value, "27AAPFU0939F1ZV");
    assert!(gstin.checksum_valid);
    assert!(dir.path().join("images/image_0_0.png").exists());

    // Same bytes under another name
    let again = pipeline.process_upload(Some("copy.pdf"), &data);
    match again {
        Err(e @ Error::DuplicateDocument { .. }) => {
            assert_eq!(e.client_message(), "This document already exists");
        }
        other => panic!("expected duplicate rejection, got {:?}", other.map(|r| r.document)),
    }
    assert!(!dir.path().join("uploads/copy.pdf").exists());
}

#[test]
fn test_missing_metadata_fails_quality_check() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_in(dir.path());

    let report = pipeline
        .process_upload(Some("bare.pdf"), &invoice_pdf(INVOICE_PAYLOAD, "no identifier"))
        .unwrap();

    assert!(!report.metadata_available);
    assert!(!report.metadata_ok);
    assert!(report.gstin.is_none());
    assert_eq!(report.qr_payloads, vec![INVOICE_PAYLOAD.to_string()]);
}

#[test]
fn test_single_byte_difference_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_in(dir.path());

    let build = |title: &str| {
        let mut pdf = PdfBuilder::new();
        pdf.add_page(&[], Some("body"));
        pdf.info(&[("Title", title)]);
        pdf.build()
    };
    let first = build("Invoice 1");
    let second = build("Invoice 2");
    assert_eq!(first.len(), second.len());
    assert_eq!(
        first.iter().zip(&second).filter(|(a, b)| a != b).count(),
        1
    );

    pipeline.process_upload(Some("one.pdf"), &first).unwrap();
    pipeline.process_upload(Some("two.pdf"), &second).unwrap();

    let listed = pipeline.store().list(None).unwrap();
    let names: Vec<&str> = listed.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["one.pdf", "two.pdf"]);
}
