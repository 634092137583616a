//! # Images
//!
//! Reads image sources (data URIs, file paths, bare base64) and prepares
//! them for embedding. JPEG bytes are kept as they are and written with
//! DCTDecode; PNG and WebP are decoded to RGB with a separate alpha plane
//! for the soft mask.
//!
//! Layout only needs the pixel size, which [`intrinsic_dimensions`] reads
//! from the header without decoding.

use crate::error::{Error, Result};
use image::ImageFormat;
use std::io::Cursor;

/// An image ready for the PDF writer.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixel_data: ImagePixelData,
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Debug, Clone)]
pub enum ImagePixelData {
    /// Untouched JPEG stream.
    Jpeg {
        data: Vec<u8>,
        color_space: JpegColorSpace,
    },
    /// Three bytes per pixel, plus one alpha byte per pixel when any pixel
    /// is not fully opaque.
    Decoded { rgb: Vec<u8>, alpha: Option<Vec<u8>> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColorSpace {
    DeviceRGB,
    DeviceGray,
}

/// Pixel size of an image source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width_px: u32,
    pub height_px: u32,
}

impl Dimensions {
    /// Size in points at 96 dpi (one pixel is 0.75pt).
    pub fn points(&self) -> (f64, f64) {
        (self.width_px as f64 * 0.75, self.height_px as f64 * 0.75)
    }
}

/// Load and decode an image.
///
/// `src` may be a `data:image/...;base64,` URI, a path starting with `/`,
/// `./` or `../`, or raw base64.
pub fn load_image(src: &str) -> Result<LoadedImage> {
    let bytes = read_source_bytes(src)?;
    decode_image_bytes(&bytes)
}

/// Pixel size of `src` without decoding the pixels.
pub fn intrinsic_dimensions(src: &str) -> Result<Dimensions> {
    let bytes = read_source_bytes(src)?;
    let format = sniff_format(&bytes)?;
    let (width_px, height_px) = image::io::Reader::with_format(Cursor::new(&bytes), format)
        .into_dimensions()
        .map_err(|e| Error::Image(format!("cannot read image header: {}", e)))?;
    Ok(Dimensions { width_px, height_px })
}

fn read_source_bytes(src: &str) -> Result<Vec<u8>> {
    if let Some(rest) = src.strip_prefix("data:") {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::Image("data URI has no payload".to_string()))?;
        if !header.ends_with(";base64") {
            return Err(Error::Image(format!("unsupported data URI encoding '{}'", header)));
        }
        return base64_decode(payload);
    }

    if src.starts_with('/') || src.starts_with("./") || src.starts_with("../") {
        return std::fs::read(src).map_err(|e| Error::Image(format!("cannot read '{}': {}", src, e)));
    }

    base64_decode(src)
}

fn base64_decode(input: &str) -> Result<Vec<u8>> {
    use base64::Engine;
    let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| Error::Image(format!("invalid base64 image data: {}", e)))
}

fn sniff_format(data: &[u8]) -> Result<ImageFormat> {
    if data.starts_with(&[0xFF, 0xD8]) {
        Ok(ImageFormat::Jpeg)
    } else if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        Ok(ImageFormat::Png)
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Ok(ImageFormat::WebP)
    } else {
        Err(Error::Image("unsupported image format (expected JPEG, PNG or WebP)".to_string()))
    }
}

fn decode_image_bytes(data: &[u8]) -> Result<LoadedImage> {
    match sniff_format(data)? {
        ImageFormat::Jpeg => pass_through_jpeg(data),
        format => decode_to_rgb(data, format),
    }
}

fn pass_through_jpeg(data: &[u8]) -> Result<LoadedImage> {
    let (width_px, height_px) = image::io::Reader::with_format(Cursor::new(data), ImageFormat::Jpeg)
        .into_dimensions()
        .map_err(|e| Error::Image(format!("cannot read JPEG header: {}", e)))?;
    Ok(LoadedImage {
        pixel_data: ImagePixelData::Jpeg {
            data: data.to_vec(),
            color_space: jpeg_color_space(data),
        },
        width_px,
        height_px,
    })
}

/// Walk the JPEG markers to the start-of-frame segment and read its
/// component count.
fn jpeg_color_space(data: &[u8]) -> JpegColorSpace {
    let mut i = 2;
    while i + 3 < data.len() && data[i] == 0xFF {
        let marker = data[i + 1];
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        if is_sof && i + 9 < data.len() {
            return match data[i + 9] {
                1 => JpegColorSpace::DeviceGray,
                _ => JpegColorSpace::DeviceRGB,
            };
        }
        let segment = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + segment;
    }
    JpegColorSpace::DeviceRGB
}

fn decode_to_rgb(data: &[u8], format: ImageFormat) -> Result<LoadedImage> {
    let decoded = image::load_from_memory_with_format(data, format)
        .map_err(|e| Error::Image(format!("cannot decode {:?} image: {}", format, e)))?;
    let rgba = decoded.to_rgba8();
    let (width_px, height_px) = rgba.dimensions();

    let pixels = (width_px * height_px) as usize;
    let mut rgb = Vec::with_capacity(pixels * 3);
    let mut alpha = Vec::with_capacity(pixels);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }
    let opaque = alpha.iter().all(|&a| a == 255);

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Decoded {
            rgb,
            alpha: if opaque { None } else { Some(alpha) },
        },
        width_px,
        height_px,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), width, height, image::ColorType::Rgba8).unwrap();
        buf
    }

    fn data_uri(bytes: &[u8], mime: &str) -> String {
        format!(
            "data:{};base64,{}",
            mime,
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    #[test]
    fn test_sniff_format() {
        assert_eq!(sniff_format(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap(), ImageFormat::Jpeg);
        assert_eq!(sniff_format(&[0x89, b'P', b'N', b'G']).unwrap(), ImageFormat::Png);
        assert_eq!(sniff_format(b"RIFF\0\0\0\0WEBPVP8 ").unwrap(), ImageFormat::WebP);
        assert!(sniff_format(&[0, 1, 2, 3]).is_err());
    }

    #[test]
    fn test_data_uri_without_payload_is_error() {
        assert!(matches!(load_image("data:image/png;base64"), Err(Error::Image(_))));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(matches!(load_image("./no/such/image.png"), Err(Error::Image(_))));
    }

    #[test]
    fn test_intrinsic_dimensions_from_header() {
        let uri = data_uri(&png(4, 3, [0, 0, 0, 255]), "image/png");
        let dims = intrinsic_dimensions(&uri).unwrap();
        assert_eq!(dims, Dimensions { width_px: 4, height_px: 3 });
        assert_eq!(dims.points(), (3.0, 2.25));
    }

    #[test]
    fn test_opaque_png_has_no_alpha() {
        let loaded = load_image(&data_uri(&png(1, 1, [255, 0, 0, 255]), "image/png")).unwrap();
        match loaded.pixel_data {
            ImagePixelData::Decoded { rgb, alpha } => {
                assert_eq!(rgb, vec![255, 0, 0]);
                assert!(alpha.is_none());
            }
            other => panic!("expected decoded pixels, got {:?}", other),
        }
    }

    #[test]
    fn test_translucent_png_keeps_alpha() {
        let raw = base64::engine::general_purpose::STANDARD.encode(png(1, 1, [0, 255, 0, 128]));
        let loaded = load_image(&raw).unwrap();
        match loaded.pixel_data {
            ImagePixelData::Decoded { alpha, .. } => assert_eq!(alpha, Some(vec![128])),
            other => panic!("expected decoded pixels, got {:?}", other),
        }
    }

    #[test]
    fn test_jpeg_passes_through() {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([0, 128, 255]));
        let mut buf = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), 2, 2, image::ColorType::Rgb8).unwrap();

        let loaded = load_image(&data_uri(&buf, "image/jpeg")).unwrap();
        assert_eq!((loaded.width_px, loaded.height_px), (2, 2));
        match loaded.pixel_data {
            ImagePixelData::Jpeg { data, color_space } => {
                assert_eq!(data, buf);
                assert_eq!(color_space, JpegColorSpace::DeviceRGB);
            }
            other => panic!("expected JPEG pass-through, got {:?}", other),
        }
    }
}
