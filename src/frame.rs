use crate::error::ClassifierError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layout of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 32-bit BGRA, the layout camera sensors hand to the frame stream
    Bgra32,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
    /// Motion JPEG format - compressed JPEG frames
    Mjpeg,
}

impl PixelFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Bgra32 => 4,
            PixelFormat::Rgb24 => 3,
            PixelFormat::Mjpeg => 0, // Variable size, compressed
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, PixelFormat::Mjpeg)
    }
}

/// Orientation tag attached to every frame. The pixels are never rotated;
/// consumers use the tag to interpret them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    Up,
    /// Sensor output of a back camera held in portrait
    #[default]
    Right,
    Down,
    Left,
}

impl Orientation {
    /// Clockwise rotation needed to display the frame upright
    pub fn degrees(&self) -> u16 {
        match self {
            Orientation::Up => 0,
            Orientation::Right => 90,
            Orientation::Down => 180,
            Orientation::Left => 270,
        }
    }
}

/// One sampled image from the live video stream
#[derive(Debug, Clone)]
pub struct Frame {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    pub format: PixelFormat,
    pub orientation: Orientation,
}

impl Frame {
    pub fn new(id: u64, data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            id,
            timestamp: SystemTime::now(),
            data: Arc::new(data),
            width,
            height,
            format,
            orientation: Orientation::default(),
        }
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => !self.data.is_empty(),
        }
    }

    /// Decode the frame into an upright RGB image
    pub fn to_rgb_image(&self) -> Result<image::RgbImage, ClassifierError> {
        let invalid = |details: String| ClassifierError::InvalidInput { details };
        let image = match self.format {
            PixelFormat::Mjpeg => image::load_from_memory_with_format(
                &self.data,
                image::ImageFormat::Jpeg,
            )
            .map_err(|e| invalid(format!("Failed to decode JPEG frame {}: {}", self.id, e)))?
            .to_rgb8(),
            PixelFormat::Rgb24 | PixelFormat::Bgra32 => {
                if !self.validate_size() {
                    return Err(invalid(format!(
                        "Frame {} has {} bytes, expected {:?}",
                        self.id,
                        self.data.len(),
                        self.expected_size()
                    )));
                }
                let rgb: Vec<u8> = if self.format == PixelFormat::Rgb24 {
                    self.data.to_vec()
                } else {
                    self.data
                        .chunks_exact(4)
                        .flat_map(|px| [px[2], px[1], px[0]])
                        .collect()
                };
                image::RgbImage::from_raw(self.width, self.height, rgb)
                    .ok_or_else(|| {
                        invalid(format!("Frame {} buffer does not match its size", self.id))
                    })?
            }
        };

        Ok(match self.orientation {
            Orientation::Up => image,
            Orientation::Right => image::imageops::rotate90(&image),
            Orientation::Down => image::imageops::rotate180(&image),
            Orientation::Left => image::imageops::rotate270(&image),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_validation() {
        let frame = Frame::new(1, vec![0u8; 4 * 4 * 4], 4, 4, PixelFormat::Bgra32);
        assert_eq!(frame.expected_size(), Some(64));
        assert!(frame.validate_size());

        let frame = Frame::new(2, vec![0u8; 10], 4, 4, PixelFormat::Rgb24);
        assert!(!frame.validate_size());

        let frame = Frame::new(3, vec![0xFF, 0xD8], 4, 4, PixelFormat::Mjpeg);
        assert_eq!(frame.expected_size(), None);
        assert!(frame.validate_size());
    }

    #[test]
    fn test_default_orientation() {
        let frame = Frame::new(1, vec![], 0, 0, PixelFormat::Mjpeg);
        assert_eq!(frame.orientation, Orientation::Right);
        assert_eq!(frame.orientation.degrees(), 90);
    }

    #[test]
    fn test_bgra_to_rgb_rotates_upright() {
        // 2x1 frame: blue pixel then red pixel
        let data = vec![255, 0, 0, 255, 0, 0, 255, 255];
        let frame = Frame::new(1, data, 2, 1, PixelFormat::Bgra32);

        let image = frame.to_rgb_image().unwrap();
        assert_eq!(image.dimensions(), (1, 2));
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(image.get_pixel(0, 1).0, [255, 0, 0]);
    }

    #[test]
    fn test_short_buffer_is_invalid_input() {
        let frame = Frame::new(7, vec![0u8; 5], 2, 2, PixelFormat::Bgra32);
        assert!(matches!(
            frame.to_rgb_image(),
            Err(ClassifierError::InvalidInput { .. })
        ));
    }
}
