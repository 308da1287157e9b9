use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma};
use log::{debug, warn};
use qrcode::{Color, EcLevel, QrCode};
use std::io::Cursor;

use crate::error::{GymError, Result};

/// Raster options for generated member codes.
///
/// The defaults give a 10 px module and the standard four-module quiet zone,
/// which phone cameras read comfortably from arm's length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QrOptions {
    /// Edge length of one module in pixels
    pub box_size: u32,
    /// Quiet zone width in modules
    pub border: u32,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            box_size: 10,
            border: 4,
        }
    }
}

/// Renders `key` as a black-on-white QR symbol.
///
/// Uses error correction level M and the smallest version that fits.
pub fn render(key: &str, options: &QrOptions) -> Result<GrayImage> {
    if options.box_size == 0 {
        return Err(GymError::Validation("QR box size must be at least 1".to_string()));
    }
    let code = QrCode::with_error_correction_level(key.as_bytes(), EcLevel::M)
        .map_err(|e| GymError::QrEncode(e.to_string()))?;

    let modules = code.width() as u32;
    let side = options
        .border
        .checked_mul(2)
        .and_then(|quiet| quiet.checked_add(modules))
        .and_then(|span| span.checked_mul(options.box_size))
        .ok_or_else(|| GymError::Validation("QR image size is out of range".to_string()))?;
    let mut img = GrayImage::from_pixel(side, side, Luma([255u8]));

    for (i, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }
        let mx = i as u32 % modules + options.border;
        let my = i as u32 / modules + options.border;
        for dy in 0..options.box_size {
            for dx in 0..options.box_size {
                img.put_pixel(
                    mx * options.box_size + dx,
                    my * options.box_size + dy,
                    Luma([0u8]),
                );
            }
        }
    }

    Ok(img)
}

/// Renders `key` and encodes it as PNG for download.
pub fn png(key: &str, options: &QrOptions) -> Result<Vec<u8>> {
    let img = render(key, options)?;
    let mut buffer = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)
        .map_err(|e| GymError::QrEncode(e.to_string()))?;
    Ok(buffer)
}

/// Decodes every QR payload in an uploaded frame (PNG, JPEG, ...).
///
/// Payloads are trimmed; empty ones and symbols that fail to decode are
/// dropped. Several codes in one frame come back left to right. A frame with
/// no code returns an empty list.
pub fn decode_frame(bytes: &[u8]) -> Result<Vec<String>> {
    let frame = image::load_from_memory(bytes)
        .map_err(|e| GymError::InvalidImage(e.to_string()))?
        .to_luma8();
    Ok(decode_image(&frame))
}

pub fn decode_image(frame: &GrayImage) -> Vec<String> {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        frame.width() as usize,
        frame.height() as usize,
        |x, y| frame.get_pixel(x as u32, y as u32)[0],
    );

    let mut grids = prepared.detect_grids();
    grids.sort_by_key(|grid| {
        let left = grid.bounds.iter().map(|p| p.x).min().unwrap_or_default();
        let top = grid.bounds.iter().map(|p| p.y).min().unwrap_or_default();
        (left, top)
    });
    debug!("found {} QR candidates in frame", grids.len());

    let mut payloads = Vec::new();
    for grid in grids {
        match grid.decode() {
            Ok((_, content)) => {
                let content = content.trim();
                if !content.is_empty() {
                    payloads.push(content.to_string());
                }
            }
            Err(e) => warn!("skipping unreadable QR code: {:?}", e),
        }
    }
    payloads
}
