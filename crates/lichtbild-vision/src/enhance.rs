// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective corrector and enhancer — warps the accepted quadrilateral onto
// a rectangle, applies a mild denoise/contrast pass, and re-encodes to the
// canonical JPEG output.
//
// All operations are non-destructive: each method consumes `self` and returns
// a new `PhotoCorrector` wrapping the transformed image, enabling chaining.

use image::{DynamicImage, Rgba};
use imageproc::filter::gaussian_blur_f32;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use lichtbild_core::config::OutputSettings;
use lichtbild_core::error::{LichtbildError, Result};
use lichtbild_core::types::{CornerPoints, CropArea, Dimensions, ImageKind};

use crate::geometry::{self, BorderFill};

/// Sigma for the mild denoise pass. Strong enough to soften sensor noise,
/// weak enough to keep print detail.
const DENOISE_SIGMA: f32 = 0.8;

/// Percentile clipped at each end of the histogram during contrast
/// equalization.
const STRETCH_CLIP_FRACTION: f64 = 0.02;

/// The canonical corrected asset, ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectedAsset {
    pub bytes: Vec<u8>,
    /// SHA-256 of `bytes`, hex-encoded.
    pub content_hash: String,
    pub dimensions: Dimensions,
    pub format: ImageKind,
}

impl CorrectedAsset {
    /// Wrap already-encoded bytes without running the correction pipeline.
    /// Used when warp or enhancement fails and the pipeline falls back to the
    /// unwarped, validated original.
    pub fn from_unprocessed(bytes: Vec<u8>, dimensions: Dimensions, format: ImageKind) -> Self {
        let content_hash = hex::encode(Sha256::digest(&bytes));
        Self {
            bytes,
            content_hash,
            dimensions,
            format,
        }
    }
}

/// Correction pipeline operating on a single in-memory photo.
///
/// ```ignore
/// let asset = PhotoCorrector::from_bytes(&bytes, settings)?
///     .deskew(&corners)?
///     .enhance()
///     .encode()?;
/// ```
pub struct PhotoCorrector {
    /// The current working image.
    image: DynamicImage,
    output: OutputSettings,
}

impl PhotoCorrector {
    // -- Construction ---------------------------------------------------------

    /// Create a corrector from raw encoded bytes (JPEG, PNG, WebP, ...).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8], output: OutputSettings) -> Result<Self> {
        let image = image::load_from_memory(data).map_err(|err| {
            LichtbildError::Processing(format!("failed to decode photo: {err}"))
        })?;
        debug!(
            width = image.width(),
            height = image.height(),
            "photo decoded"
        );
        Ok(Self { image, output })
    }

    /// Create a corrector from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>, output: OutputSettings) -> Result<Self> {
        let image = image::open(path.as_ref()).map_err(|err| {
            LichtbildError::Processing(format!(
                "failed to open photo {}: {err}",
                path.as_ref().display()
            ))
        })?;
        Ok(Self { image, output })
    }

    /// Wrap an already-decoded image.
    pub fn from_dynamic(image: DynamicImage, output: OutputSettings) -> Self {
        Self { image, output }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.image.width(), self.image.height())
    }

    /// Borrow the current working image.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the corrector and return the underlying image.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Perspective correction -----------------------------------------------

    /// De-skew the accepted quadrilateral onto a rectangle.
    ///
    /// The target preserves the quadrilateral's own aspect ratio (average of
    /// opposing edge lengths) and is capped at the configured maximum output
    /// dimensions; native-resolution quads are never upscaled.
    #[instrument(skip(self))]
    pub fn deskew(self, corners: &CornerPoints) -> Result<Self> {
        let [tl, tr, br, bl] = corners.to_array();
        let top = distance(tl, tr);
        let bottom = distance(bl, br);
        let left = distance(tl, bl);
        let right = distance(tr, br);

        let quad_w = ((top + bottom) / 2.0).max(1.0);
        let quad_h = ((left + right) / 2.0).max(1.0);
        let scale = (self.output.max_width as f32 / quad_w)
            .min(self.output.max_height as f32 / quad_h)
            .min(1.0);
        let out_w = ((quad_w * scale).round() as u32).max(1);
        let out_h = ((quad_h * scale).round() as u32).max(1);

        info!(out_w, out_h, "de-skewing photo");
        let warped = geometry::warp(&self.image, corners, out_w, out_h, BorderFill::black())?;

        Ok(Self {
            image: DynamicImage::ImageRgba8(warped),
            output: self.output,
        })
    }

    // -- Fallback transforms --------------------------------------------------

    /// Crop an axis-aligned region, the fallback when no quadrilateral is
    /// used. Values are clamped to image bounds.
    #[instrument(skip(self), fields(x = area.x, y = area.y, w = area.width, h = area.height))]
    pub fn crop(self, area: CropArea) -> Self {
        let img_w = self.image.width();
        let img_h = self.image.height();

        let safe_x = area.x.min(img_w.saturating_sub(1));
        let safe_y = area.y.min(img_h.saturating_sub(1));
        let safe_w = area.width.min(img_w - safe_x).max(1);
        let safe_h = area.height.min(img_h - safe_y).max(1);

        let cropped = self.image.crop_imm(safe_x, safe_y, safe_w, safe_h);
        Self {
            image: cropped,
            output: self.output,
        }
    }

    /// Lossless quarter-turn clockwise, for capture orientation fixes.
    pub fn rotate90(self) -> Self {
        Self {
            image: self.image.rotate90(),
            output: self.output,
        }
    }

    // -- Enhancement ----------------------------------------------------------

    /// Mild gaussian denoise.
    #[instrument(skip(self))]
    pub fn denoise(self) -> Self {
        let rgba = self.image.to_rgba8();
        let blurred = gaussian_blur_f32(&rgba, DENOISE_SIGMA);
        Self {
            image: DynamicImage::ImageRgba8(blurred),
            output: self.output,
        }
    }

    /// Linear contrast stretch between the 2nd and 98th luma percentiles.
    ///
    /// Deterministic: identical input pixels always produce identical output.
    #[instrument(skip(self))]
    pub fn equalize_contrast(self) -> Self {
        let gray = self.image.to_luma8();
        let mut histogram = [0u64; 256];
        for pixel in gray.pixels() {
            histogram[pixel.0[0] as usize] += 1;
        }
        let total: u64 = histogram.iter().sum();
        if total == 0 {
            return self;
        }

        let clip = (total as f64 * STRETCH_CLIP_FRACTION) as u64;
        let lo = percentile_bound(&histogram, clip, false);
        let hi = percentile_bound(&histogram, clip, true);
        if hi <= lo {
            debug!(lo, hi, "flat histogram; skipping contrast stretch");
            return self;
        }

        let scale = 255.0 / (hi - lo) as f32;
        let rgba = self.image.to_rgba8();
        let stretched = image::ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let remap =
                |v: u8| -> u8 { ((v as f32 - lo as f32) * scale).clamp(0.0, 255.0) as u8 };
            Rgba([remap(r), remap(g), remap(b), a])
        });

        debug!(lo, hi, "contrast stretched");
        Self {
            image: DynamicImage::ImageRgba8(stretched),
            output: self.output,
        }
    }

    /// The full quality pass: denoise then contrast equalization.
    #[instrument(skip(self))]
    pub fn enhance(self) -> Self {
        self.denoise().equalize_contrast()
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as the canonical JPEG asset.
    pub fn encode(&self) -> Result<CorrectedAsset> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
            &mut buffer,
            self.output.jpeg_quality,
        );
        rgb.write_with_encoder(encoder).map_err(|err| {
            LichtbildError::Processing(format!("JPEG encoding failed: {err}"))
        })?;

        let content_hash = hex::encode(Sha256::digest(&buffer));
        info!(
            bytes = buffer.len(),
            hash = %content_hash,
            "asset encoded"
        );
        Ok(CorrectedAsset {
            bytes: buffer,
            content_hash,
            dimensions: Dimensions::new(self.image.width(), self.image.height()),
            format: ImageKind::Jpeg,
        })
    }

    /// Write the image to a file. The format is inferred from the extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.image.save(path.as_ref()).map_err(|err| {
            LichtbildError::Processing(format!(
                "failed to save photo to {}: {err}",
                path.as_ref().display()
            ))
        })
    }
}

fn distance(a: lichtbild_core::types::Point, b: lichtbild_core::types::Point) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Lowest (or highest) intensity after clipping `clip` pixels from the
/// corresponding end of the histogram.
fn percentile_bound(histogram: &[u64; 256], clip: u64, from_top: bool) -> u8 {
    let mut remaining = clip;
    if from_top {
        for v in (0..256).rev() {
            let count = histogram[v];
            if count > remaining {
                return v as u8;
            }
            remaining -= count;
        }
        255
    } else {
        for v in 0..256 {
            let count = histogram[v];
            if count > remaining {
                return v as u8;
            }
            remaining -= count;
        }
        0
    }
}
