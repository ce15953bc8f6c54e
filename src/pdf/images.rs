//! Embedded image extraction
//!
//! Turns an image XObject into encoded image bytes. JPEG and JPEG 2000
//! streams are handed back as stored; raw pixel streams are rebuilt from
//! their `/Width`, `/Height`, `/BitsPerComponent` and `/ColorSpace` entries
//! and encoded as PNG.

use crate::error::{Error, Result};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::Cursor;

/// Encoding of the bytes returned by [`extract_image`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    Png,
    Jpeg,
    Jpeg2000,
}

impl ImageEncoding {
    /// File extension used when saving bytes of this encoding
    pub fn extension(self) -> &'static str {
        match self {
            ImageEncoding::Png => "png",
            ImageEncoding::Jpeg => "jpg",
            ImageEncoding::Jpeg2000 => "jp2",
        }
    }
}

/// Encoded bytes of one embedded image
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub encoding: ImageEncoding,
}

/// Extract the encoded bytes of an image XObject.
///
/// Returns `Ok(None)` when the stream carries no data.
pub fn extract_image(document: &Document, id: ObjectId) -> Result<Option<EncodedImage>> {
    let stream = document.get_object(id)?.as_stream()?;

    if stream.content.is_empty() {
        return Ok(None);
    }

    let filters = stream_filters(&stream.dict);

    let passthrough = match filters.last().map(Vec::as_slice) {
        Some(b"DCTDecode") => Some(ImageEncoding::Jpeg),
        Some(b"JPXDecode") => Some(ImageEncoding::Jpeg2000),
        Some(name @ (b"JBIG2Decode" | b"CCITTFaxDecode")) => {
            return Err(Error::UnsupportedImage {
                reason: format!("{} streams", String::from_utf8_lossy(name)),
            });
        }
        _ => None,
    };

    if let Some(encoding) = passthrough {
        if filters.len() > 1 {
            return Err(Error::UnsupportedImage {
                reason: "filter chain in front of an encoded image".to_string(),
            });
        }
        return Ok(Some(EncodedImage {
            bytes: stream.content.clone(),
            encoding,
        }));
    }

    let pixels = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content()?
    };

    if pixels.is_empty() {
        return Ok(None);
    }

    let image = reconstruct_raw_image(document, stream, &pixels)?;

    let mut png_bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;

    Ok(Some(EncodedImage {
        bytes: png_bytes,
        encoding: ImageEncoding::Png,
    }))
}

/// `/Filter` entries of a stream, in application order
fn stream_filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Result<u32> {
    let value = dict
        .get(key)
        .and_then(Object::as_i64)
        .map_err(|_| Error::UnsupportedImage {
            reason: format!("missing /{}", String::from_utf8_lossy(key)),
        })?;

    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| Error::UnsupportedImage {
            reason: format!("invalid /{} {}", String::from_utf8_lossy(key), value),
        })
}

/// Colour space of a raw pixel stream
#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette of `hival + 1` entries in the base space
    Indexed {
        base: Box<ColorSpace>,
        hival: usize,
        palette: Vec<u8>,
    },
}

impl ColorSpace {
    /// Samples per pixel in the stream
    fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }

    fn parse(document: &Document, value: &Object) -> Result<Self> {
        let (_, value) = document.dereference(value)?;

        let unsupported = |name: &[u8]| Error::UnsupportedImage {
            reason: format!("colour space {}", String::from_utf8_lossy(name)),
        };

        match value {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorSpace::Gray),
                b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorSpace::Rgb),
                b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
                other => Err(unsupported(other)),
            },
            Object::Array(items) => {
                let family = items
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .unwrap_or_default();
                match family {
                    b"CalGray" => Ok(ColorSpace::Gray),
                    b"CalRGB" => Ok(ColorSpace::Rgb),
                    b"ICCBased" => {
                        let profile = items.get(1).ok_or_else(|| unsupported(family))?;
                        let (_, profile) = document.dereference(profile)?;
                        match profile.as_stream()?.dict.get(b"N")?.as_i64()? {
                            1 => Ok(ColorSpace::Gray),
                            3 => Ok(ColorSpace::Rgb),
                            4 => Ok(ColorSpace::Cmyk),
                            _ => Err(unsupported(family)),
                        }
                    }
                    b"Indexed" | b"I" => Self::parse_indexed(document, items),
                    other => Err(unsupported(other)),
                }
            }
            _ => Err(unsupported(b"(non-name)")),
        }
    }

    /// `[/Indexed base hival lookup]`
    fn parse_indexed(document: &Document, items: &[Object]) -> Result<Self> {
        let invalid = |reason: &str| Error::UnsupportedImage {
            reason: format!("indexed colour space: {}", reason),
        };

        if items.len() != 4 {
            return Err(invalid("expected base, hival and lookup"));
        }

        let base = Self::parse(document, &items[1])?;
        if matches!(base, ColorSpace::Indexed { .. }) {
            return Err(invalid("nested palette"));
        }

        let (_, hival) = document.dereference(&items[2])?;
        let hival = usize::try_from(hival.as_i64()?)
            .ok()
            .filter(|h| *h <= 255)
            .ok_or_else(|| invalid("hival out of range"))?;

        let palette = match document.dereference(&items[3])? {
            (_, Object::String(bytes, _)) => bytes.clone(),
            (_, Object::Stream(stream)) => plain_content(stream)?,
            _ => return Err(invalid("lookup is neither a string nor a stream")),
        };

        let needed = (hival + 1) * base.components();
        if palette.len() < needed {
            return Err(invalid(&format!(
                "lookup has {} bytes, expected {}",
                palette.len(),
                needed
            )));
        }

        Ok(ColorSpace::Indexed {
            base: Box::new(base),
            hival,
            palette,
        })
    }
}

/// Stream data with any filters removed
fn plain_content(stream: &Stream) -> Result<Vec<u8>> {
    if stream_filters(&stream.dict).is_empty() {
        Ok(stream.content.clone())
    } else {
        Ok(stream.decompressed_content()?)
    }
}

/// Whether the `/Decode` array inverts the sample range
fn decode_inverted(dict: &Dictionary) -> bool {
    dict.get(b"Decode")
        .and_then(Object::as_array)
        .ok()
        .and_then(|items| items.first())
        .map(|first| matches!(first, Object::Integer(1)) || matches!(first, Object::Real(v) if *v == 1.0))
        .unwrap_or(false)
}

fn truncated(actual: usize, expected: usize) -> Error {
    Error::UnsupportedImage {
        reason: format!(
            "pixel buffer too small: {} bytes, expected {}",
            actual, expected
        ),
    }
}

/// Read `per_row` samples of `bits` bits from each of `rows` rows.
///
/// Rows start on byte boundaries. 16-bit samples keep their high byte;
/// narrower samples are returned unscaled.
fn unpack_samples(pixels: &[u8], stride: usize, rows: usize, per_row: usize, bits: usize) -> Vec<u8> {
    let mut samples = Vec::with_capacity(per_row * rows);

    for row in pixels.chunks(stride).take(rows) {
        match bits {
            8 => samples.extend_from_slice(&row[..per_row]),
            16 => samples.extend(row.chunks_exact(2).take(per_row).map(|pair| pair[0])),
            _ => {
                let mask = (1u8 << bits) - 1;
                samples.extend((0..per_row).map(|i| {
                    let bit = i * bits;
                    (row[bit / 8] >> (8 - bits - bit % 8)) & mask
                }));
            }
        }
    }

    samples
}

/// Stretch a sample narrower than 8 bits to the full byte range
fn scale_sample(value: u8, bits: usize) -> u8 {
    if bits >= 8 {
        value
    } else {
        (value as u16 * 255 / ((1u16 << bits) - 1)) as u8
    }
}

fn cmyk_to_rgb(cmyk: &[u8]) -> [u8; 3] {
    let k = 255 - cmyk[3] as u16;
    [
        ((255 - cmyk[0] as u16) * k / 255) as u8,
        ((255 - cmyk[1] as u16) * k / 255) as u8,
        ((255 - cmyk[2] as u16) * k / 255) as u8,
    ]
}

/// Rebuild a raster from the decoded samples of an image stream.
fn reconstruct_raw_image(
    document: &Document,
    stream: &Stream,
    pixels: &[u8],
) -> Result<DynamicImage> {
    let dict = &stream.dict;
    let width = dimension(dict, b"Width")?;
    let height = dimension(dict, b"Height")?;

    let image_mask = dict
        .get(b"ImageMask")
        .and_then(Object::as_bool)
        .unwrap_or(false);

    let (space, bits) = if image_mask {
        (ColorSpace::Gray, 1)
    } else {
        let value = dict.get(b"ColorSpace").map_err(|_| Error::UnsupportedImage {
            reason: "missing /ColorSpace".to_string(),
        })?;
        let bits = dict
            .get(b"BitsPerComponent")
            .and_then(Object::as_i64)
            .unwrap_or(8);
        (ColorSpace::parse(document, value)?, bits)
    };

    let bits = match (bits, &space) {
        (1 | 2 | 4 | 8, _) => bits as usize,
        (16, space) if !matches!(space, ColorSpace::Indexed { .. }) => 16,
        _ => {
            return Err(Error::UnsupportedImage {
                reason: format!("{} bits per component", bits),
            })
        }
    };

    let too_large = || Error::UnsupportedImage {
        reason: format!("dimensions {}x{} too large", width, height),
    };
    let (w, h) = (width as usize, height as usize);
    let per_row = w.checked_mul(space.components()).ok_or_else(too_large)?;
    let stride = per_row.checked_mul(bits).ok_or_else(too_large)?.div_ceil(8);
    let expected = stride.checked_mul(h).ok_or_else(too_large)?;
    if pixels.len() < expected {
        return Err(truncated(pixels.len(), expected));
    }

    let mut samples = unpack_samples(pixels, stride, h, per_row, bits);

    let image = match space {
        ColorSpace::Indexed {
            base,
            hival,
            palette,
        } => {
            let n = base.components();
            let entry = |index: u8| {
                let start = (index as usize).min(hival) * n;
                &palette[start..start + n]
            };
            match *base {
                ColorSpace::Gray => GrayImage::from_raw(
                    width,
                    height,
                    samples.iter().map(|&i| entry(i)[0]).collect(),
                )
                .map(DynamicImage::ImageLuma8),
                ColorSpace::Rgb => RgbImage::from_raw(
                    width,
                    height,
                    samples.iter().flat_map(|&i| entry(i).to_vec()).collect(),
                )
                .map(DynamicImage::ImageRgb8),
                _ => RgbImage::from_raw(
                    width,
                    height,
                    samples.iter().flat_map(|&i| cmyk_to_rgb(entry(i))).collect(),
                )
                .map(DynamicImage::ImageRgb8),
            }
        }
        space => {
            let invert = decode_inverted(dict);
            samples.iter_mut().for_each(|s| {
                *s = scale_sample(*s, bits);
                if invert {
                    *s = 255 - *s;
                }
            });
            match space {
                ColorSpace::Gray => {
                    GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8)
                }
                ColorSpace::Rgb => {
                    RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8)
                }
                _ => RgbImage::from_raw(
                    width,
                    height,
                    samples.chunks_exact(4).flat_map(cmyk_to_rgb).collect(),
                )
                .map(DynamicImage::ImageRgb8),
            }
        }
    };

    image.ok_or_else(|| truncated(pixels.len(), expected))
}
