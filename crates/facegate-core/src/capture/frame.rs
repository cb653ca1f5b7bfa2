use image::{DynamicImage, GrayImage, RgbImage};

use crate::errors::{AppError, AppResult};

/// Converts a raw V4L2 payload into an 8-bit grayscale frame.
pub fn convert_frame_to_image(
    data: &[u8],
    width: u32,
    height: u32,
    pixel_format: &str,
) -> AppResult<GrayImage> {
    let expected_pixels = width as usize * height as usize;

    match pixel_format {
        "Y16" => {
            if data.len() < expected_pixels * 2 {
                return Err(AppError::FrameProcessing(format!(
                    "expected {} bytes for Y16 frame, got {}",
                    expected_pixels * 2,
                    data.len()
                )));
            }
            let buffer = data[..expected_pixels * 2]
                .chunks_exact(2)
                .map(|pair| pair[1])
                .collect();
            GrayImage::from_vec(width, height, buffer)
                .ok_or_else(|| AppError::FrameProcessing("failed to build image buffer".into()))
        }
        "GREY" | "Y08" => {
            if data.len() < expected_pixels {
                return Err(AppError::FrameProcessing(format!(
                    "expected {} bytes for {} frame, got {}",
                    expected_pixels,
                    pixel_format,
                    data.len()
                )));
            }
            GrayImage::from_vec(width, height, data[..expected_pixels].to_vec())
                .ok_or_else(|| AppError::FrameProcessing("failed to build image buffer".into()))
        }
        "YUYV" => {
            let expected_bytes = expected_pixels * 2;
            if data.len() < expected_bytes {
                return Err(AppError::FrameProcessing(format!(
                    "expected {} bytes for YUYV frame, got {}",
                    expected_bytes,
                    data.len()
                )));
            }

            // Luma lives in bytes 0 and 2 of every Y0 U Y1 V macro-pixel.
            let mut buffer = Vec::with_capacity(expected_pixels);
            let mut chunks = data[..expected_bytes].chunks_exact(4);
            for chunk in &mut chunks {
                buffer.push(chunk[0]);
                if buffer.len() == expected_pixels {
                    break;
                }
                buffer.push(chunk[2]);
            }

            if !chunks.remainder().is_empty() {
                return Err(AppError::FrameProcessing(
                    "incomplete YUYV macro-pixel encountered".into(),
                ));
            }

            GrayImage::from_vec(width, height, buffer)
                .ok_or_else(|| AppError::FrameProcessing("failed to build image buffer".into()))
        }
        other => Err(AppError::FrameProcessing(format!(
            "unsupported conversion from pixel format {other}"
        ))),
    }
}

pub fn gray_to_rgb(image: &GrayImage) -> RgbImage {
    DynamicImage::ImageLuma8(image.clone()).to_rgb8()
}
