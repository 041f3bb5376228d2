//! Face-region helpers for diagnostics and previews.

use crate::types::Face;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

pub const DEFAULT_EXPAND_RATIO: f32 = 1.5;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LANDMARK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Crop the face box enlarged by `expand_ratio` around its center.
///
/// The crop is clamped to the image; a box entirely outside yields an empty image.
pub fn crop_face(image: &RgbImage, face: &Face, expand_ratio: f32) -> RgbImage {
    let (w, h) = image.dimensions();
    let b = face.bbox;
    let (bx1, by1, bx2, by2) = (b.x1 as i64, b.y1 as i64, b.x2 as i64, b.y2 as i64);

    let center_x = ((bx1 + bx2) / 2) as f32;
    let center_y = ((by1 + by2) / 2) as f32;
    let size_x = (bx2 - bx1) as f32 * expand_ratio;
    let size_y = (by2 - by1) as f32 * expand_ratio;

    let x1 = ((center_x - size_x / 2.0) as i64).clamp(0, w as i64);
    let y1 = ((center_y - size_y / 2.0) as i64).clamp(0, h as i64);
    let x2 = ((center_x + size_x / 2.0) as i64).clamp(0, w as i64);
    let y2 = ((center_y + size_y / 2.0) as i64).clamp(0, h as i64);

    if x2 <= x1 || y2 <= y1 {
        return RgbImage::new(0, 0);
    }
    image::imageops::crop_imm(image, x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32).to_image()
}

/// Copy of `image` with the face box outlined and its landmarks marked.
pub fn draw_face_box(image: &RgbImage, face: &Face) -> RgbImage {
    let mut out = image.clone();
    let b = face.bbox;
    let (x, y) = (b.x1 as i32, b.y1 as i32);
    let (bw, bh) = (b.width().max(0.0) as u32, b.height().max(0.0) as u32);

    // Two nested one-pixel outlines for a 2px line.
    for inset in 0..2u32 {
        if bw > 2 * inset && bh > 2 * inset {
            let rect = Rect::at(x + inset as i32, y + inset as i32).of_size(bw - 2 * inset, bh - 2 * inset);
            draw_hollow_rect_mut(&mut out, rect, BOX_COLOR);
        }
    }

    if let Some(landmarks) = &face.landmarks {
        for &(lx, ly) in landmarks {
            draw_filled_circle_mut(&mut out, (lx as i32, ly as i32), 1, LANDMARK_COLOR);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn face(x1: f32, y1: f32, x2: f32, y2: f32) -> Face {
        Face {
            bbox: BoundingBox { x1, y1, x2, y2 },
            confidence: 0.9,
            landmarks: Some([(30.0, 30.0), (50.0, 30.0), (40.0, 40.0), (32.0, 50.0), (48.0, 50.0)]),
            embedding: None,
        }
    }

    #[test]
    fn test_crop_face_expands_around_center() {
        let img = RgbImage::new(200, 200);
        let crop = crop_face(&img, &face(80.0, 80.0, 120.0, 120.0), DEFAULT_EXPAND_RATIO);
        assert_eq!(crop.dimensions(), (60, 60));
    }

    #[test]
    fn test_crop_face_clamps_to_image() {
        let img = RgbImage::new(100, 100);
        let crop = crop_face(&img, &face(0.0, 0.0, 40.0, 40.0), DEFAULT_EXPAND_RATIO);
        assert_eq!(crop.dimensions(), (50, 50));

        let outside = crop_face(&img, &face(300.0, 300.0, 340.0, 340.0), DEFAULT_EXPAND_RATIO);
        assert_eq!(outside.dimensions(), (0, 0));
    }

    #[test]
    fn test_draw_face_box_marks_outline_and_landmarks() {
        let img = RgbImage::new(100, 100);
        let out = draw_face_box(&img, &face(20.0, 20.0, 60.0, 60.0));
        assert_eq!(out.get_pixel(20, 40), &BOX_COLOR);
        assert_eq!(out.get_pixel(21, 40), &BOX_COLOR);
        assert_eq!(out.get_pixel(40, 40), &LANDMARK_COLOR);
        assert_eq!(out.get_pixel(25, 25), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(20, 40), &Rgb([0, 0, 0]));
    }
}
