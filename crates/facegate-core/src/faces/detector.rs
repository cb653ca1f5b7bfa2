use image::GrayImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl BoundingBox {
    pub fn width(&self) -> i64 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i64 {
        (self.bottom - self.top).max(0)
    }
}

/// Locates faces in a single frame. An empty result means "no face".
pub trait FaceDetector {
    fn detect(&self, frame: &GrayImage) -> Vec<BoundingBox>;
}

impl<F> FaceDetector for F
where
    F: Fn(&GrayImage) -> Vec<BoundingBox>,
{
    fn detect(&self, frame: &GrayImage) -> Vec<BoundingBox> {
        self(frame)
    }
}
