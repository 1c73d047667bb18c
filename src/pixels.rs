//! Recovery of raw RGB frames printed to a device log as hex.
//!
//! The firmware dumps the frame between `===PIXELS_START===` and
//! `===PIXELS_END===` markers, two hex digits per byte, wrapped at arbitrary
//! line lengths and interleaved with whitespace.

use image::{Rgb, RgbImage};
use regex::Regex;
use std::sync::LazyLock;

use crate::error::PixelDumpError;

pub const DEFAULT_WIDTH: u32 = 336;
pub const DEFAULT_HEIGHT: u32 = 300;

static PIXEL_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)===PIXELS_START===\s*(.*?)\s*===PIXELS_END===").expect("pixel block pattern is valid")
});

/// Text between the start and end markers
pub fn extract_pixel_block(log: &str) -> Result<&str, PixelDumpError> {
    PIXEL_BLOCK
        .captures(log)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or(PixelDumpError::BlockNotFound)
}

/// Decode hex digit pairs, ignoring every non-hex character
pub fn decode_hex(block: &str) -> Result<Vec<u8>, PixelDumpError> {
    let digits: Vec<u8> = block
        .chars()
        .filter_map(|c| c.to_digit(16))
        .map(|d| d as u8)
        .collect();

    if digits.len() % 2 != 0 {
        return Err(PixelDumpError::OddHexLength(digits.len()));
    }

    Ok(digits.chunks_exact(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
}

/// Rebuild a `width` x `height` RGB image from a log containing a pixel dump
pub fn decode_rgb(log: &str, width: u32, height: u32) -> Result<RgbImage, PixelDumpError> {
    let bytes = decode_hex(extract_pixel_block(log)?)?;
    let expected = width as usize * height as usize * 3;

    if bytes.len() != expected {
        return Err(PixelDumpError::SizeMismatch {
            got: bytes.len(),
            expected,
        });
    }

    RgbImage::from_raw(width, height, bytes).ok_or(PixelDumpError::SizeMismatch {
        got: 0,
        expected,
    })
}

/// Dump `img` the way the device prints a frame region: one `RRGGBB ` group
/// per pixel, one line per row, between the block markers
pub fn render_pixel_block(img: &RgbImage) -> String {
    let mut out = String::from("===PIXELS_START===\n");
    for row in img.rows() {
        for Rgb([r, g, b]) in row {
            out.push_str(&format!("{r:02X}{g:02X}{b:02X} "));
        }
        out.push('\n');
    }
    out.push_str("===PIXELS_END===\n");
    out.push_str(&format!("Resolution: {} x {}\n", img.width(), img.height()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_block() {
        let log = "boot ok\nI (123) face: 1 face\n===PIXELS_START===\nFF00\n10 20\n===PIXELS_END===\ndone";
        assert_eq!(extract_pixel_block(log).unwrap(), "FF00\n10 20");
    }

    #[test]
    fn test_missing_block() {
        assert!(matches!(extract_pixel_block("no pixels here"), Err(PixelDumpError::BlockNotFound)));
        assert!(matches!(
            extract_pixel_block("===PIXELS_START===\nFF"),
            Err(PixelDumpError::BlockNotFound)
        ));
    }

    #[test]
    fn test_decode_hex_skips_noise() {
        assert_eq!(decode_hex("ff 00\n1A-2b").unwrap(), vec![0xFF, 0x00, 0x1A, 0x2B]);
        assert!(matches!(decode_hex("ABC"), Err(PixelDumpError::OddHexLength(3))));
    }

    #[test]
    fn test_decode_rgb() {
        let log = "===PIXELS_START===\nFF0000 00FF00\n0000FF FFFFFF\n===PIXELS_END===";
        let img = decode_rgb(log, 2, 2).unwrap();

        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 255, 0]);
        assert_eq!(img.get_pixel(0, 1).0, [0, 0, 255]);
        assert_eq!(img.get_pixel(1, 1).0, [255, 255, 255]);
    }

    #[test]
    fn test_render_pixel_block_is_decodable() {
        let img = RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8 * 100, y as u8 * 200, 0x0A]));

        let dump = render_pixel_block(&img);

        assert!(dump.starts_with("===PIXELS_START===\n00000A 64000A C8000A \n"));
        assert!(dump.contains("\n00C80A 64C80A C8C80A \n"));
        assert!(dump.ends_with("Resolution: 3 x 2\n"));
        assert_eq!(decode_rgb(&dump, 3, 2).unwrap(), img);
    }

    #[test]
    fn test_size_mismatch() {
        let log = "===PIXELS_START===\nFF0000\n===PIXELS_END===";
        match decode_rgb(log, 2, 2) {
            Err(PixelDumpError::SizeMismatch { got, expected }) => {
                assert_eq!(got, 3);
                assert_eq!(expected, 12);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
