//! Functions to preprocess images.

use anyhow::{ensure, Context, Result};
use fast_image_resize::{
    images::{Image as FirImage, ImageRef},
    pixels::PixelType,
    FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use image::RgbImage;
use crate::common::{BvrImage, ChannelOrder};

/// One step of the image pipeline run before the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOps {
    /// Scale so that the shorter side equals the value, keeping the aspect ratio.
    ResizeShortSide(u32),
    /// Cut a `(height, width)` window around the image center.
    CenterCrop(u32, u32),
}

impl ImageOps {
    pub fn apply(ops: &[ImageOps], image: BvrImage, resizer: &mut Resizer) -> Result<BvrImage> {
        let mut image = image;
        for op in ops {
            image = match *op {
                ImageOps::ResizeShortSide(target) => resize_short_side(&image, target, resizer)?,
                ImageOps::CenterCrop(height, width) => center_crop(&image, height, width)?,
            };
        }
        Ok(image)
    }
}

/// Output `(width, height)` of [`resize_short_side`].
pub fn resized_dims(width: u32, height: u32, target_short_side: u32) -> (u32, u32) {
    let ratio = target_short_side as f64 / width.min(height) as f64;
    let new_w = ((width as f64 * ratio).round() as u32).max(1);
    let new_h = ((height as f64 * ratio).round() as u32).max(1);
    (new_w, new_h)
}

/// Bilinear resize so the shorter side becomes `target_short_side`.
///
/// Plain 2-tap interpolation on pixel centers, without antialiasing on downscale.
pub fn resize_short_side(image: &BvrImage, target_short_side: u32, resizer: &mut Resizer) -> Result<BvrImage> {
    let (w0, h0) = image.dimensions();
    ensure!(w0 > 0 && h0 > 0, "Cannot resize an empty {}x{} image", w0, h0);
    ensure!(target_short_side > 0, "Resize target must be at least 1");

    let (new_w, new_h) = resized_dims(w0, h0, target_short_side);
    if (new_w, new_h) == (w0, h0) {
        return Ok(image.clone());
    }

    let src = ImageRef::new(w0, h0, image.as_raw(), PixelType::U8x3)?;
    let mut dst = FirImage::new(new_w, new_h, PixelType::U8x3);
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Interpolation(FilterType::Bilinear));

    let resized = match resizer.resize(&src, &mut dst, &options) {
        Ok(()) => RgbImage::from_raw(new_w, new_h, dst.buffer().to_vec())
            .context("Resized buffer does not match its dimensions")?,
        Err(err) => {
            log::warn!("Failed to use `fast_image_resize` ({err}). Falling back.");
            image::imageops::resize(&image.image, new_w, new_h, image::imageops::FilterType::Triangle)
        }
    };
    Ok(BvrImage::from(resized))
}

/// `(top, left)` of a `crop_h` x `crop_w` window centered on a `height` x `width` image.
///
/// Offsets round half away from zero. Fails if the window leaves the image.
pub fn crop_window(height: u32, width: u32, crop_h: u32, crop_w: u32) -> Result<(u32, u32)> {
    let cy = height as f64 / 2.0;
    let cx = width as f64 / 2.0;
    let top = (cy - crop_h as f64 / 2.0).round();
    let left = (cx - crop_w as f64 / 2.0).round();
    ensure!(
        top >= 0.0
            && left >= 0.0
            && top as u64 + crop_h as u64 <= height as u64
            && left as u64 + crop_w as u64 <= width as u64,
        "Crop window {}x{} exceeds image {}x{} (resize before cropping)",
        crop_h, crop_w, height, width
    );
    Ok((top as u32, left as u32))
}

pub fn center_crop(image: &BvrImage, crop_h: u32, crop_w: u32) -> Result<BvrImage> {
    let (top, left) = crop_window(image.height(), image.width(), crop_h, crop_w)?;
    let cropped = image::imageops::crop_imm(&image.image, left, top, crop_w, crop_h).to_image();
    Ok(BvrImage::from(cropped))
}

/// Turns an interleaved image into the planar `(C, H, W)` values the network reads.
///
/// Values stay in the 0-255 range; the per-channel mean, when set, is subtracted after
/// the channel reorder, so it must be given in the output channel order.
#[derive(Debug, Clone)]
pub struct Transformer {
    channel_order: ChannelOrder,
    mean: Option<Vec<f32>>,
}

impl Transformer {
    pub const CHANNELS: usize = 3;

    pub fn new(channel_order: ChannelOrder, mean: Option<Vec<f32>>) -> Result<Self> {
        if let Some(mean) = &mean {
            ensure!(
                mean.len() == Self::CHANNELS,
                "Mean has {} channels, the input has {}",
                mean.len(), Self::CHANNELS
            );
        }
        Ok(Self { channel_order, mean })
    }

    pub fn mean(&self) -> Option<&[f32]> {
        self.mean.as_deref()
    }

    pub fn preprocess(&self, image: &BvrImage) -> Vec<f32> {
        let buf = image.as_raw();
        let hw = (image.width() * image.height()) as usize;
        let sources = self.channel_order.source_channels();
        let offsets = match &self.mean {
            Some(mean) => [mean[0], mean[1], mean[2]],
            None => [0.0; 3],
        };

        let mut out = vec![0.0f32; Self::CHANNELS * hw];
        for i in 0..hw {
            let px = &buf[3 * i..3 * i + 3];
            for (c, &src) in sources.iter().enumerate() {
                out[c * hw + i] = px[src] as f32 - offsets[c];
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32, px: [u8; 3]) -> BvrImage {
        BvrImage::from(RgbImage::from_pixel(width, height, Rgb(px)))
    }

    #[test]
    fn resize_keeps_aspect_ratio() {
        let mut resizer = Resizer::new();
        for (w, h, s) in [(500, 375, 256), (375, 500, 256), (640, 480, 224), (100, 100, 50), (30, 90, 256)] {
            let out = resize_short_side(&solid(w, h, [1, 2, 3]), s, &mut resizer).unwrap();
            assert_eq!(out.width().min(out.height()), s, "{w}x{h} -> {s}");
            let before = w as f64 / h as f64;
            let after = out.width() as f64 / out.height() as f64;
            assert!((before - after).abs() < 0.01, "{before} vs {after}");
        }
    }

    #[test]
    fn resize_of_solid_image_stays_solid() {
        let mut resizer = Resizer::new();
        let out = resize_short_side(&solid(40, 20, [10, 20, 30]), 10, &mut resizer).unwrap();
        assert_eq!(out.dimensions(), (20, 10));
        assert!(out.pixels().all(|p| p.0 == [10, 20, 30]));
    }

    #[test]
    fn downscale_samples_pixel_centers() {
        // columns 0,255,0 repeated; a 3x downscale lands on every middle column
        let mut stripes = RgbImage::new(9, 3);
        for (x, _, px) in stripes.enumerate_pixels_mut() {
            let v = if x % 3 == 1 { 255 } else { 0 };
            *px = Rgb([v, v, v]);
        }
        let mut resizer = Resizer::new();
        let out = resize_short_side(&BvrImage::from(stripes), 1, &mut resizer).unwrap();
        assert_eq!(out.dimensions(), (3, 1));
        assert!(out.pixels().all(|p| p.0 == [255, 255, 255]), "{:?}", out.as_raw());
    }

    #[test]
    fn crop_has_requested_size() {
        let img = solid(300, 256, [0, 0, 0]);
        for (ch, cw) in [(224, 224), (256, 300), (1, 1), (255, 17)] {
            let out = center_crop(&img, ch, cw).unwrap();
            assert_eq!((out.height(), out.width()), (ch, cw));
        }
    }

    #[test]
    fn crop_window_is_centered() {
        assert_eq!(crop_window(256, 341, 224, 224).unwrap(), (16, 59));
        // (5 - 2) / 2 = 1.5 rounds away from zero
        assert_eq!(crop_window(5, 5, 2, 2).unwrap(), (2, 2));
    }

    #[test]
    fn oversized_crop_fails() {
        assert!(crop_window(100, 100, 101, 50).is_err());
        assert!(center_crop(&solid(10, 10, [0, 0, 0]), 5, 11).is_err());
    }

    #[test]
    fn transform_reorders_and_subtracts_mean() {
        let img = solid(2, 1, [10, 20, 30]);
        let bgr = Transformer::new(ChannelOrder::Bgr, Some(vec![1.0, 2.0, 3.0])).unwrap();
        assert_eq!(bgr.preprocess(&img), vec![29.0, 29.0, 18.0, 18.0, 7.0, 7.0]);

        let rgb = Transformer::new(ChannelOrder::Rgb, None).unwrap();
        assert_eq!(rgb.preprocess(&img), vec![10.0, 10.0, 20.0, 20.0, 30.0, 30.0]);
    }

    #[test]
    fn mean_must_match_channels() {
        assert!(Transformer::new(ChannelOrder::Bgr, Some(vec![1.0])).is_err());
    }

    #[test]
    fn pipeline_resizes_then_crops() {
        let mut resizer = Resizer::new();
        let ops = [ImageOps::ResizeShortSide(32), ImageOps::CenterCrop(28, 30)];
        let out = ImageOps::apply(&ops, solid(64, 48, [5, 5, 5]), &mut resizer).unwrap();
        assert_eq!(out.dimensions(), (30, 28));
    }
}
