//! PDF fixtures built in memory with lopdf

#![allow(dead_code)]

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use qrcode::QrCode;
use rxing::{BarcodeFormat, MultiFormatWriter, Writer};
use std::io::Cursor;

pub const UPI_PAYLOAD: &str = "upi://pay?pa=merchant@bank&pn=Acme%20Traders&am=1250.00";
pub const INVOICE_PAYLOAD: &str = "INV-2024-0042|27AAPFU0939F1ZV|1250.00";

/// Render `payload` as a QR symbol at least 300px square
pub fn qr_image(payload: &str) -> GrayImage {
    QrCode::new(payload.as_bytes())
        .expect("payload fits in a QR symbol")
        .render::<Luma<u8>>()
        .min_dimensions(300, 300)
        .build()
}

/// Render `text` as a Code 128 barcode
pub fn code128_image(text: &str) -> GrayImage {
    let matrix = MultiFormatWriter::default()
        .encode(text, &BarcodeFormat::CODE_128, 300, 120)
        .expect("text encodes as Code 128");
    GrayImage::from_fn(matrix.getWidth(), matrix.getHeight(), |x, y| {
        Luma([if matrix.get(x, y) { 0 } else { 255 }])
    })
}

/// A horizontal gradient with no symbol in it
pub fn plain_image(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, _| Luma([(x * 255 / width.max(1)) as u8]))
}

pub fn jpeg_bytes(image: &GrayImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .expect("JPEG encoding succeeds");
    bytes
}

/// Assembles a PDF page by page. Image objects are added once and may be
/// placed on any number of pages.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        Self {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
        }
    }

    /// Add an uncompressed 8-bit DeviceGray image
    pub fn add_gray_image(&mut self, image: &GrayImage) -> ObjectId {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width() as i64,
                "Height" => image.height() as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            image.as_raw().clone(),
        );
        self.doc.add_object(stream)
    }

    /// Add a 1-bit palette image: index 0 is black, index 1 white
    pub fn add_indexed_image(&mut self, image: &GrayImage) -> ObjectId {
        let stride = (image.width() as usize).div_ceil(8);
        let mut packed = vec![0u8; stride * image.height() as usize];
        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel.0[0] >= 128 {
                packed[y as usize * stride + x as usize / 8] |= 0x80 >> (x % 8);
            }
        }
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width() as i64,
                "Height" => image.height() as i64,
                "ColorSpace" => vec![
                    Object::Name(b"Indexed".to_vec()),
                    Object::Name(b"DeviceRGB".to_vec()),
                    Object::Integer(1),
                    Object::String(vec![0, 0, 0, 255, 255, 255], StringFormat::Hexadecimal),
                ],
                "BitsPerComponent" => 1,
            },
            packed,
        );
        self.doc.add_object(stream)
    }

    /// Add an image XObject with an arbitrary dictionary
    pub fn add_image_stream(&mut self, dict: lopdf::Dictionary, content: Vec<u8>) -> ObjectId {
        self.doc.add_object(Stream::new(dict, content))
    }

    /// Add a DCT-encoded image carrying `bytes` verbatim
    pub fn add_jpeg_image(&mut self, bytes: Vec<u8>, width: u32, height: u32) -> ObjectId {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            bytes,
        );
        self.doc.add_object(stream)
    }

    /// Add a page drawing `images` top to bottom and, optionally, one line of text
    pub fn add_page(&mut self, images: &[ObjectId], text: Option<&str>) -> &mut Self {
        let mut operations = Vec::new();
        let mut xobjects = lopdf::Dictionary::new();

        for (i, id) in images.iter().enumerate() {
            let name = format!("Im{}", i);
            xobjects.set(name.as_bytes().to_vec(), *id);
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                vec![
                    150.into(),
                    0.into(),
                    0.into(),
                    150.into(),
                    72.into(),
                    (560 - 160 * i as i64).into(),
                ],
            ));
            operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
            operations.push(Operation::new("Q", vec![]));
        }

        if let Some(text) = text {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            operations.push(Operation::new("Td", vec![72.into(), 740.into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations };
        let content_id = self.doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content encodes"),
        ));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => self.font_id },
                "XObject" => xobjects,
            },
        });
        self.kids.push(page_id.into());
        self
    }

    /// Set the document information dictionary
    pub fn info(&mut self, entries: &[(&str, &str)]) -> &mut Self {
        let mut info = lopdf::Dictionary::new();
        for (key, value) in entries {
            info.set(
                key.as_bytes().to_vec(),
                Object::String(value.as_bytes().to_vec(), StringFormat::Literal),
            );
        }
        let info_id = self.doc.add_object(info);
        self.doc.trailer.set("Info", info_id);
        self
    }

    /// Serialize the document
    pub fn build(&mut self) -> Vec<u8> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids.clone(),
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).expect("document serializes");
        bytes
    }
}

/// A single-page document with one QR image and a line of text
pub fn invoice_pdf(payload: &str, text: &str) -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    let qr = pdf.add_gray_image(&qr_image(payload));
    pdf.add_page(&[qr], Some(text));
    pdf.build()
}
