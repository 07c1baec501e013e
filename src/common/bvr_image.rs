use std::path::Path;
use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};

/// Order of the colour planes written into the network input.
///
/// Caffe-trained ImageNet models (and the built-in mean) expect BGR.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    #[default] Bgr,
    Rgb,
}

impl ChannelOrder {
    pub fn from_str(order: &str) -> Option<Self> {
        match order.to_lowercase().as_str() {
            "bgr" => Some(ChannelOrder::Bgr),
            "rgb" => Some(ChannelOrder::Rgb),
            _ => None,
        }
    }

    /// For each output plane, the index of the interleaved RGB sample it reads.
    pub fn source_channels(&self) -> [usize; 3] {
        match self {
            ChannelOrder::Bgr => [2, 1, 0],
            ChannelOrder::Rgb => [0, 1, 2],
        }
    }
}

/// A decoded 3-channel image.
#[derive(Debug, Clone, Default)]
pub struct BvrImage {
    pub image: RgbImage,
}

impl std::ops::Deref for BvrImage {
    type Target = RgbImage;

    fn deref(&self) -> &Self::Target {
        &self.image
    }
}

impl std::ops::DerefMut for BvrImage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.image
    }
}

impl From<DynamicImage> for BvrImage {
    fn from(image: DynamicImage) -> Self {
        Self {
            image: image.to_rgb8(),
        }
    }
}

impl From<RgbImage> for BvrImage {
    fn from(image: RgbImage) -> Self {
        Self { image }
    }
}

impl BvrImage {
    /// Decodes the file at `path`, whatever its colour type, to 8-bit RGB.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        Ok(Self::from(image))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_reads_channels_reversed() {
        assert_eq!(ChannelOrder::Bgr.source_channels(), [2, 1, 0]);
        assert_eq!(ChannelOrder::from_str("RGB"), Some(ChannelOrder::Rgb));
        assert_eq!(ChannelOrder::from_str("yuv"), None);
    }

    #[test]
    fn decodes_grey_images_to_three_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grey.png");
        image::GrayImage::from_pixel(5, 4, image::Luma([77])).save(&path).unwrap();

        let image = BvrImage::open(&path).unwrap();
        assert_eq!(image.dimensions(), (5, 4));
        assert!(image.pixels().all(|p| p.0 == [77, 77, 77]));
    }

    #[test]
    fn unreadable_image_names_the_file() {
        let err = BvrImage::open("/nonexistent/cat.jpg").unwrap_err();
        assert!(format!("{err:#}").contains("cat.jpg"));
    }
}
