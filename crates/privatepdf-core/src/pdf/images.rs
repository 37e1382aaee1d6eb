//! Raster payloads to PDF image XObjects

use std::io::{Cursor, Write};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, DynamicImage, ExtendedColorType, ImageDecoder, ImageFormat};
use lopdf::{dictionary, Dictionary, Object, Stream};

use crate::error::ImageError;

/// An image XObject ready to be added to a document, with its optional
/// soft mask carrying the alpha channel
pub struct ImageXObject {
    pub width: u32,
    pub height: u32,
    pub image: Stream,
    pub soft_mask: Option<Stream>,
}

fn decode(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, ImageError> {
    image::load_from_memory_with_format(bytes, format).map_err(|e| ImageError::Decode(e.to_string()))
}

fn flate(data: &[u8]) -> Result<Vec<u8>, ImageError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| ImageError::Decode(format!("compression failed: {}", e)))
}

fn image_dictionary(width: u32, height: u32, color_space: &str) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
    }
}

fn flate_stream(mut dict: Dictionary, samples: &[u8]) -> Result<Stream, ImageError> {
    dict.set("Filter", "FlateDecode");
    Ok(Stream::new(dict, flate(samples)?))
}

/// Decode a PNG into 8-bit samples. Alpha is split into a soft mask.
pub fn png_xobject(bytes: &[u8]) -> Result<ImageXObject, ImageError> {
    let decoded = decode(bytes, ImageFormat::Png)?;
    let (width, height) = (decoded.width(), decoded.height());
    let grayscale = matches!(
        decoded.color(),
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16
    );
    let has_alpha = decoded.color().has_alpha();

    let (samples, alpha) = match (grayscale, has_alpha) {
        (true, false) => (decoded.into_luma8().into_raw(), None),
        (false, false) => (decoded.into_rgb8().into_raw(), None),
        (true, true) => {
            let pixels = decoded.into_luma_alpha8();
            let luma = pixels.pixels().map(|p| p[0]).collect();
            let alpha = pixels.pixels().map(|p| p[1]).collect();
            (luma, Some(alpha))
        }
        (false, true) => {
            let pixels = decoded.into_rgba8();
            let mut rgb = Vec::with_capacity(pixels.len() / 4 * 3);
            let mut alpha = Vec::with_capacity(pixels.len() / 4);
            for pixel in pixels.pixels() {
                rgb.extend_from_slice(&pixel.0[..3]);
                alpha.push(pixel[3]);
            }
            (rgb, Some(alpha))
        }
    };

    let color_space = if grayscale { "DeviceGray" } else { "DeviceRGB" };
    let soft_mask = alpha
        .map(|alpha: Vec<u8>| flate_stream(image_dictionary(width, height, "DeviceGray"), &alpha))
        .transpose()?;

    Ok(ImageXObject {
        width,
        height,
        image: flate_stream(image_dictionary(width, height, color_space), &samples)?,
        soft_mask,
    })
}

/// PDF color space for the channel layout stored in a JPEG file
fn jpeg_color_space(color: ExtendedColorType) -> Result<&'static str, ImageError> {
    match color {
        ExtendedColorType::L8 | ExtendedColorType::L16 => Ok("DeviceGray"),
        ExtendedColorType::Rgb8 | ExtendedColorType::Rgb16 => Ok("DeviceRGB"),
        ExtendedColorType::Cmyk8 => Ok("DeviceCMYK"),
        other => Err(ImageError::Decode(format!("unsupported JPEG color type {:?}", other))),
    }
}

/// Whether the JPEG carries an Adobe APP14 segment. Adobe writes CMYK
/// samples inverted, so such images need a flipped `/Decode` array.
fn has_adobe_marker(bytes: &[u8]) -> bool {
    let mut offset = 2;
    while offset + 4 <= bytes.len() && bytes[offset] == 0xFF {
        let marker = bytes[offset + 1];
        // Start of scan: no more header segments
        if marker == 0xDA {
            break;
        }
        let length = u16::from_be_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
        if marker == 0xEE && bytes[offset + 4..].starts_with(b"Adobe") {
            return true;
        }
        offset += 2 + length;
    }
    false
}

/// JPEG data is embedded as is; decoding only validates it and reads its
/// dimensions and the color layout stored in the file.
pub fn jpeg_xobject(bytes: &[u8]) -> Result<ImageXObject, ImageError> {
    let decoder = JpegDecoder::new(Cursor::new(bytes)).map_err(|e| ImageError::Decode(e.to_string()))?;
    let (width, height) = decoder.dimensions();
    let color_space = jpeg_color_space(decoder.original_color_type())?;
    DynamicImage::from_decoder(decoder).map_err(|e| ImageError::Decode(e.to_string()))?;

    let mut dict = image_dictionary(width, height, color_space);
    dict.set("Filter", "DCTDecode");
    if color_space == "DeviceCMYK" && has_adobe_marker(bytes) {
        let decode: Vec<Object> = [1, 0, 1, 0, 1, 0, 1, 0].iter().map(|&v| Object::Integer(v)).collect();
        dict.set("Decode", decode);
    }
    Ok(ImageXObject {
        width,
        height,
        image: Stream::new(dict, bytes.to_vec()).with_compression(false),
        soft_mask: None,
    })
}

/// Reference a soft mask from its image dictionary
pub fn attach_soft_mask(image: &mut Stream, soft_mask_id: lopdf::ObjectId) {
    image.dict.set("SMask", Object::Reference(soft_mask_id));
}
