//! Face anonymization of RGB frames: pixelation, box blur and black-out.
//!
//! Every operation works on the part of a face box that lies inside the image
//! and leaves the rest of the frame untouched. Kernel sizes scale with the
//! shorter side of the face so that small and large faces are hidden alike.

use image::{Rgb, RgbImage};

use crate::evaluation::Technique;
use crate::faces::BoundingBox;

/// Smallest pixelation block, in pixels
pub const MIN_PIXELATION_BLOCK: u32 = 3;
/// Smallest blur radius before the one-third-of-the-face cap applies
pub const MIN_BLUR_RADIUS: u32 = 15;
pub const BLUR_PASSES: usize = 3;

/// Face box clipped to the image, as half-open pixel ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl Region {
    fn clip(img: &RgbImage, bbox: &BoundingBox) -> Option<Self> {
        let clamp = |v: i64, max: u32| v.clamp(0, max as i64) as u32;
        let x1 = clamp(bbox.x as i64, img.width());
        let y1 = clamp(bbox.y as i64, img.height());
        let x2 = clamp(bbox.x as i64 + bbox.width as i64, img.width());
        let y2 = clamp(bbox.y as i64 + bbox.height as i64, img.height());

        (x1 < x2 && y1 < y2).then_some(Self { x1, y1, x2, y2 })
    }
}

fn shorter_side(bbox: &BoundingBox) -> u32 {
    bbox.width.min(bbox.height).max(0) as u32
}

/// Edge length of a pixelation block: 10% of the shorter face side, at least 3
pub fn pixelation_block_size(bbox: &BoundingBox) -> u32 {
    (shorter_side(bbox) * 10 / 100).max(MIN_PIXELATION_BLOCK)
}

/// Box blur radius: 15% of the shorter face side, at least 15, but never
/// more than a third of the shorter side
pub fn blur_radius(bbox: &BoundingBox) -> u32 {
    let side = shorter_side(bbox);
    (side * 15 / 100).max(MIN_BLUR_RADIUS).min(side / 3)
}

pub fn black_out(img: &mut RgbImage, bbox: &BoundingBox) {
    let Some(region) = Region::clip(img, bbox) else {
        return;
    };

    for y in region.y1..region.y2 {
        for x in region.x1..region.x2 {
            img.put_pixel(x, y, Rgb([0, 0, 0]));
        }
    }
}

/// Replace each block of the face with its average color.
///
/// Blocks start at the top-left corner of the face; the last block of a row
/// or column is cut at the face edge.
pub fn pixelate(img: &mut RgbImage, bbox: &BoundingBox) {
    let Some(region) = Region::clip(img, bbox) else {
        return;
    };
    let block = pixelation_block_size(bbox);

    for by in (region.y1..region.y2).step_by(block as usize) {
        for bx in (region.x1..region.x2).step_by(block as usize) {
            let ys = by..(by + block).min(region.y2);
            let xs = bx..(bx + block).min(region.x2);

            let mut sum = [0u64; 3];
            let mut count = 0u64;
            for y in ys.clone() {
                for x in xs.clone() {
                    let Rgb(px) = *img.get_pixel(x, y);
                    for (acc, channel) in sum.iter_mut().zip(px) {
                        *acc += channel as u64;
                    }
                    count += 1;
                }
            }

            let average = Rgb(sum.map(|c| (c / count) as u8));
            for y in ys.clone() {
                for x in xs.clone() {
                    img.put_pixel(x, y, average);
                }
            }
        }
    }
}

/// Repeated box blur over the face.
///
/// The averaging window may reach outside the face (but not outside the
/// image), so the face blends into its surroundings.
pub fn blur(img: &mut RgbImage, bbox: &BoundingBox) {
    let Some(region) = Region::clip(img, bbox) else {
        return;
    };
    let radius = blur_radius(bbox);
    if radius == 0 {
        return;
    }

    let (width, height) = img.dimensions();
    for _ in 0..BLUR_PASSES {
        let source = img.clone();

        for y in region.y1..region.y2 {
            for x in region.x1..region.x2 {
                let ys = y.saturating_sub(radius)..(y + radius + 1).min(height);
                let xs = x.saturating_sub(radius)..(x + radius + 1).min(width);

                let mut sum = [0u64; 3];
                let mut count = 0u64;
                for ny in ys {
                    for nx in xs.clone() {
                        let Rgb(px) = *source.get_pixel(nx, ny);
                        for (acc, channel) in sum.iter_mut().zip(px) {
                            *acc += channel as u64;
                        }
                        count += 1;
                    }
                }

                img.put_pixel(x, y, Rgb(sum.map(|c| (c / count) as u8)));
            }
        }
    }
}

/// Apply one technique to a single face, in place
pub fn apply(technique: Technique, img: &mut RgbImage, bbox: &BoundingBox) {
    match technique {
        Technique::Pixelation => pixelate(img, bbox),
        Technique::Occlusion => black_out(img, bbox),
        Technique::Blur => blur(img, bbox),
    }
}

/// Copy of `img` with every face anonymized by `technique`
pub fn anonymize(img: &RgbImage, faces: &[BoundingBox], technique: Technique) -> RgbImage {
    let mut out = img.clone();
    for bbox in faces {
        apply(technique, &mut out, bbox);
    }
    tracing::debug!(technique = technique.name(), faces = faces.len(), "Faces anonymized");
    out
}
