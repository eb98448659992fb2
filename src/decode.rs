//! Float image decoding and preview quantisation.
//!
//! Every source is read as 32-bit float samples whatever its on-disk depth,
//! then clipped to the unit range and truncated to 8 bits. The clip is a plain
//! display transform, not a tone curve: anything brighter than 1.0 saturates.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use image::imageops::{self, FilterType};
use image::{GenericImageView, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

use crate::error::DecodeError;

/// Size facts about the source file, taken before any conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
}

impl ImageMeta {
    /// Card caption, e.g. `2048×1024 · 3ch`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{}×{} · {}ch", self.width, self.height, self.channels)
    }
}

/// An 8-bit preview ready for display.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewBitmap {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl PreviewBitmap {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Gray(img) => img.dimensions(),
            Self::Rgb(img) => img.dimensions(),
        }
    }

    /// Bytes per pixel: 1 for grayscale, 3 for RGB.
    #[must_use]
    pub const fn channels(&self) -> usize {
        match self {
            Self::Gray(_) => 1,
            Self::Rgb(_) => 3,
        }
    }

    /// Tightly packed row-major pixel bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Gray(img) => img.as_raw(),
            Self::Rgb(img) => img.as_raw(),
        }
    }

    fn fit_within(self, max_edge: u32) -> Self {
        let (w, h) = self.dimensions();
        let (nw, nh) = fit_dimensions(w, h, max_edge);
        if (nw, nh) == (w, h) {
            return self;
        }
        match self {
            Self::Gray(img) => Self::Gray(imageops::resize(&img, nw, nh, FilterType::Triangle)),
            Self::Rgb(img) => Self::Rgb(imageops::resize(&img, nw, nh, FilterType::Triangle)),
        }
    }
}

/// A decoded thumbnail and the metadata of its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub bitmap: PreviewBitmap,
    pub meta: ImageMeta,
}

#[derive(Debug, Clone, Copy)]
pub struct PreviewOptions {
    /// Previews are scaled to fit a `max_edge` square, keeping aspect ratio.
    pub max_edge: u32,
    /// Decode error messages are cut to this many characters.
    pub error_limit: usize,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            max_edge: 220,
            error_limit: 30,
        }
    }
}

/// Interleaved float samples straight from the decoder.
#[derive(Debug, Clone)]
pub(crate) struct FloatImage {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
    pub samples: Vec<f32>,
}

impl FloatImage {
    fn sample(&self, x: u32, y: u32, c: usize) -> f32 {
        let idx = (y as usize * self.width as usize + x as usize) * self.channels + c;
        self.samples[idx]
    }

    /// Quantise to 8 bits and fit into `max_edge`.
    ///
    /// One- and two-channel sources become grayscale from their first
    /// channel; anything wider keeps its first three channels as RGB.
    pub(crate) fn into_preview(self, max_edge: u32) -> Preview {
        let meta = ImageMeta {
            width: self.width,
            height: self.height,
            channels: self.channels,
        };
        let bitmap = if self.channels >= 3 {
            PreviewBitmap::Rgb(ImageBuffer::from_fn(self.width, self.height, |x, y| {
                Rgb([
                    quantize(self.sample(x, y, 0)),
                    quantize(self.sample(x, y, 1)),
                    quantize(self.sample(x, y, 2)),
                ])
            }))
        } else {
            PreviewBitmap::Gray(ImageBuffer::from_fn(self.width, self.height, |x, y| {
                Luma([quantize(self.sample(x, y, 0))])
            }))
        };
        Preview {
            bitmap: bitmap.fit_within(max_edge),
            meta,
        }
    }
}

/// Decode `path` into an 8-bit preview.
///
/// # Errors
/// Any open, format or header failure becomes a [`DecodeError`] whose message
/// is cut to `opts.error_limit` characters. Non-finite or out-of-range
/// samples are never an error.
pub fn decode_preview(path: &Path, opts: &PreviewOptions) -> Result<Preview, DecodeError> {
    let float = read_float(path).map_err(|e| DecodeError::new(path, e, opts.error_limit))?;
    Ok(float.into_preview(opts.max_edge))
}

fn read_float(path: &Path) -> Result<FloatImage> {
    let is_exr = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("exr"));
    let img = if is_exr { read_exr(path)? } else { read_raster(path)? };
    ensure!(img.width > 0 && img.height > 0, "empty image");
    ensure!(img.channels > 0, "image has no channels");
    ensure!(
        img.samples.len() == img.width as usize * img.height as usize * img.channels,
        "sample count does not match header"
    );
    Ok(img)
}

/// Read the first flat layer of an OpenEXR file with every channel it has.
fn read_exr(path: &Path) -> Result<FloatImage> {
    let image = exr::prelude::read_all_flat_layers_from_file(path)?;
    let layer = image.layer_data.first().context("no image layers")?;
    let width = layer.size.width();
    let height = layer.size.height();
    let list = &layer.channel_data.list;

    let pixel_count = width * height;
    let names: Vec<String> = list.iter().map(|c| c.name.to_string()).collect();
    let lens: Vec<usize> = list.iter().map(|c| c.sample_data.len()).collect();
    ensure_full_resolution(&names, &lens, pixel_count)?;

    let order = display_order(&names);
    let mut samples = Vec::with_capacity(pixel_count * order.len());
    for i in 0..pixel_count {
        for &ci in &order {
            samples.push(list[ci].sample_data.value_by_flat_index(i).to_f32());
        }
    }

    Ok(FloatImage {
        width: u32::try_from(width).context("image too wide")?,
        height: u32::try_from(height).context("image too tall")?,
        channels: order.len(),
        samples,
    })
}

/// Read anything the `image` crate decodes (Radiance HDR in practice).
fn read_raster(path: &Path) -> Result<FloatImage> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    let (width, height) = img.dimensions();
    let channels = usize::from(img.color().channel_count());
    let samples = match channels {
        1 => img.to_luma32f().into_raw(),
        2 => img.to_luma_alpha32f().into_raw(),
        3 => img.to_rgb32f().into_raw(),
        _ => img.to_rgba32f().into_raw(),
    };
    Ok(FloatImage {
        width,
        height,
        channels: channels.min(4),
        samples,
    })
}

/// Subsampled channels (luma/chroma `RY`, `BY`) hold fewer samples than the
/// image has pixels and cannot be interleaved pixel by pixel.
pub(crate) fn ensure_full_resolution(
    names: &[String],
    lens: &[usize],
    pixel_count: usize,
) -> Result<()> {
    for (name, &len) in names.iter().zip(lens) {
        ensure!(len == pixel_count, "subsampled channel {name}");
    }
    Ok(())
}

/// OpenEXR stores channels sorted by name (`A, B, G, R`). Put colour first so
/// "first three channels" means RGB, then luminance, alpha, and the rest by
/// name. Layer prefixes (`diffuse.R`) are ignored for ranking.
pub(crate) fn display_order(names: &[String]) -> Vec<usize> {
    fn rank(name: &str) -> u8 {
        let short = name.rsplit('.').next().unwrap_or(name);
        match short.to_ascii_uppercase().as_str() {
            "R" | "RED" => 0,
            "G" | "GREEN" => 1,
            "B" | "BLUE" => 2,
            "Y" => 3,
            "A" | "ALPHA" => 4,
            _ => 5,
        }
    }
    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by(|&a, &b| {
        rank(&names[a])
            .cmp(&rank(&names[b]))
            .then_with(|| names[a].cmp(&names[b]))
    });
    order
}

/// NaN and infinities become 0, then clip to [0, 1] and truncate to 8 bits.
#[inline]
#[must_use]
pub fn quantize(v: f32) -> u8 {
    let v = if v.is_finite() { v } else { 0.0 };
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

/// Largest size with the same aspect ratio that fits a `max_edge` square.
/// Small images are scaled up to fill the box.
#[must_use]
pub fn fit_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width == 0 || height == 0 || max_edge == 0 {
        return (width.max(1), height.max(1));
    }
    let scale = f64::from(max_edge) / f64::from(width.max(height));
    let w = (f64::from(width) * scale).round().max(1.0) as u32;
    let h = (f64::from(height) * scale).round().max(1.0) as u32;
    (w.min(max_edge), h.min(max_edge))
}
