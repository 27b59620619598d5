// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Lichtbild photo pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an uploaded asset, assigned by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(pub Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 2D point in image-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The four corners of a photo boundary, in canonical labeling.
///
/// Invariant: the points form a simple (non-self-intersecting) quadrilateral.
/// Construction goes through `lichtbild_vision::geometry::order_corners`, which
/// resolves any input order to this labeling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerPoints {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl CornerPoints {
    /// Corners in clockwise order: TL, TR, BR, BL.
    pub fn to_array(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// The default corner set covering the whole frame, used when no boundary
    /// was detected and the user places corners manually.
    pub fn full_frame(dimensions: Dimensions) -> Self {
        let w = dimensions.width.saturating_sub(1) as f32;
        let h = dimensions.height.saturating_sub(1) as f32;
        Self {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(w, 0.0),
            bottom_right: Point::new(w, h),
            bottom_left: Point::new(0.0, h),
        }
    }

    pub fn centroid(&self) -> Point {
        let pts = self.to_array();
        let (sx, sy) = pts
            .iter()
            .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / 4.0, sy / 4.0)
    }
}

/// Axis-aligned crop rectangle, the fallback when no quadrilateral is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropArea {
    /// A crop covering the entire image.
    pub fn full(dimensions: Dimensions) -> Self {
        Self {
            x: 0,
            y: 0,
            width: dimensions.width,
            height: dimensions.height,
        }
    }
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Supported raster image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    Jpeg,
    Png,
    WebP,
    /// Vendor still-photo format; often arrives without a declared MIME type
    /// from mobile capture, so the extension fallback matters here.
    Heic,
}

impl ImageKind {
    /// MIME type string used on the transport boundary.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Heic => "image/heic",
        }
    }

    /// Infer the format from a declared MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            "image/heic" | "image/heif" => Some(Self::Heic),
            _ => None,
        }
    }

    /// Infer the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "heic" | "heif" => Some(Self::Heic),
            _ => None,
        }
    }
}

/// A raw image as it arrives from the capture/selection boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSource {
    pub bytes: Vec<u8>,
    /// MIME type as declared by the picker or camera. May be empty for some
    /// mobile capture formats.
    pub declared_mime_type: String,
    pub file_name: String,
}

impl ImageSource {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// The file-name extension, if any, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext)
    }
}

/// Metadata sent alongside the asset bytes on the transport boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub file_name: String,
    pub mime_type: String,
    /// SHA-256 of the asset bytes, hex-encoded.
    pub content_hash: String,
    pub dimensions: Dimensions,
}

/// Response of a successful `submit_asset` transport call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub upload_id: UploadId,
    pub storage_key: String,
    pub thumbnail_ref: Option<String>,
}

/// Lifecycle states of the remote processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteJobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One observation from the job-status boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobUpdate {
    pub job_id: UploadId,
    pub status: RemoteJobStatus,
    pub result_ref: Option<String>,
    pub error: Option<String>,
}

/// Immutable record of a completed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub upload_id: UploadId,
    pub storage_key: String,
    pub thumbnail_ref: Option<String>,
    pub original_file_name: String,
    pub file_size_bytes: u64,
    pub dimensions: Dimensions,
    pub processing_status: RemoteJobStatus,
    pub completed_at: DateTime<Utc>,
}
