use image::{GrayImage, Rgb, RgbImage};

use crate::capture::frame::gray_to_rgb;
use crate::faces::BoundingBox;

const FACE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const NO_FACE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: i64 = 2;

/// Per-frame detection feedback. Advisory only: it never gates the loop.
#[derive(Debug, Clone, Copy)]
pub struct FrameFeedback<'a> {
    pub frame_index: u64,
    pub frame: &'a GrayImage,
    pub faces: &'a [BoundingBox],
}

impl FrameFeedback<'_> {
    pub fn has_face(&self) -> bool {
        !self.faces.is_empty()
    }

    pub fn status_text(&self) -> &'static str {
        if self.has_face() {
            "Face detected"
        } else {
            "No face detected"
        }
    }

    pub fn render(&self) -> RgbImage {
        draw_face_boxes(self.frame, self.faces)
    }
}

/// Draws face boxes on a color copy of the frame. A frame without faces gets a red border.
pub fn draw_face_boxes(frame: &GrayImage, faces: &[BoundingBox]) -> RgbImage {
    let mut canvas = gray_to_rgb(frame);
    if faces.is_empty() {
        let border = BoundingBox {
            left: 0,
            top: 0,
            right: i64::from(canvas.width()) - 1,
            bottom: i64::from(canvas.height()) - 1,
        };
        draw_rectangle(&mut canvas, &border, NO_FACE_COLOR);
    } else {
        for face in faces {
            draw_rectangle(&mut canvas, face, FACE_COLOR);
        }
    }
    canvas
}

fn draw_rectangle(canvas: &mut RgbImage, rect: &BoundingBox, color: Rgb<u8>) {
    for inset in 0..BOX_THICKNESS {
        let left = rect.left + inset;
        let right = rect.right - inset;
        let top = rect.top + inset;
        let bottom = rect.bottom - inset;
        if left > right || top > bottom {
            break;
        }
        for x in left..=right {
            put(canvas, x, top, color);
            put(canvas, x, bottom, color);
        }
        for y in top..=bottom {
            put(canvas, left, y, color);
            put(canvas, right, y, color);
        }
    }
}

fn put(canvas: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x < 0 || y < 0 || x >= i64::from(canvas.width()) || y >= i64::from(canvas.height()) {
        return;
    }
    canvas.put_pixel(x as u32, y as u32, color);
}
