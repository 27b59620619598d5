// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Injected pipeline configuration. All of these are immutable per deployment:
// they are constructed once (typically deserialized from app settings) and
// passed by reference into the pipeline.

use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// Validation limits for incoming files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRules {
    /// Upper size bound in bytes. Zero-byte files are acceptable.
    pub max_size_bytes: u64,
    /// Accepted declared MIME types.
    pub allowed_types: Vec<String>,
    /// Accepted file extensions (without dot), matched case-insensitively
    /// when the MIME type is absent or unrecognized.
    pub allowed_extensions: Vec<String>,
    /// Minimum decoded dimensions, if enforced.
    pub min_dimensions: Option<Dimensions>,
    /// Maximum decoded dimensions, if enforced.
    pub max_dimensions: Option<Dimensions>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_size_bytes: 20 * 1024 * 1024,
            allowed_types: vec![
                "image/jpeg".into(),
                "image/png".into(),
                "image/webp".into(),
                "image/heic".into(),
                "image/heif".into(),
            ],
            allowed_extensions: vec![
                "jpg".into(),
                "jpeg".into(),
                "png".into(),
                "webp".into(),
                "heic".into(),
                "heif".into(),
            ],
            min_dimensions: Some(Dimensions::new(64, 64)),
            max_dimensions: Some(Dimensions::new(12000, 12000)),
        }
    }
}

/// Output settings for the corrected asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Maximum width of the de-skewed output in pixels.
    pub max_width: u32,
    /// Maximum height of the de-skewed output in pixels.
    pub max_height: u32,
    /// JPEG quality (1-100) for the canonical re-encode.
    pub jpeg_quality: u8,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            max_width: 2048,
            max_height: 2048,
            jpeg_quality: 85,
        }
    }
}

/// Tuning knobs for the boundary detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectorOptions {
    /// Images whose longest side exceeds this are downscaled for detection;
    /// the detected quadrilateral is rescaled back to full resolution.
    pub working_size: u32,
    /// Minimum enclosed area of a candidate boundary, as a fraction of total
    /// image area.
    pub min_area_fraction: f32,
    /// Gaussian blur sigma applied before edge detection.
    pub blur_sigma: f32,
    /// Canny hysteresis thresholds.
    pub canny_low: f32,
    pub canny_high: f32,
    /// Polygon-approximation tolerance as a fraction of the contour
    /// perimeter.
    pub epsilon_fraction: f64,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            working_size: 640,
            min_area_fraction: 0.2,
            blur_sigma: 1.4,
            canny_low: 50.0,
            canny_high: 150.0,
            epsilon_fraction: 0.02,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub rules: ValidationRules,
    pub output: OutputSettings,
    pub detector: DetectorOptions,
    /// Delay between remote job-status polls.
    pub poll_interval_ms: u64,
    /// Give up on the remote job after this many polls.
    pub max_status_polls: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rules: ValidationRules::default(),
            output: OutputSettings::default(),
            detector: DetectorOptions::default(),
            poll_interval_ms: 500,
            max_status_polls: 240,
        }
    }
}
