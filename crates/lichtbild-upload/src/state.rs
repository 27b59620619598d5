// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload state machine — the single source of truth for the UI.
//
// `UploadState` is the only mutable, externally observed entity in the
// pipeline. It is owned and written exclusively by the orchestration layer;
// everything else sees cloned snapshots. Transitions happen only through the
// methods below, driven by explicit pipeline events.

use serde::{Deserialize, Serialize};

use lichtbild_core::error::{ErrorKind, LichtbildError};
use lichtbild_core::types::{CornerPoints, Dimensions, UploadResult};

/// Pipeline stages as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// No active capture session.
    Idle,
    /// A file was chosen and is being validated/decoded.
    Selecting,
    /// Boundary proposed; the user is adjusting corners.
    Cropping,
    /// Transmitting the corrected asset.
    Uploading,
    /// Waiting for the remote job to finish.
    Processing,
    /// Done; `upload_result` is populated.
    Complete,
    /// Failed; `error` is populated.
    Error,
}

/// Lightweight description of an asset held by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub file_name: String,
    pub size_bytes: u64,
    pub dimensions: Option<Dimensions>,
    pub content_hash: Option<String>,
}

/// Error as surfaced to the UI: always a named kind plus the retry
/// affordance flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&LichtbildError> for StateError {
    fn from(err: &LichtbildError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.retryable(),
        }
    }
}

/// Observable snapshot of one capture-to-upload session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadState {
    pub status: UploadStatus,
    /// 0-100; monotone non-decreasing within a single upload attempt.
    pub progress_percent: u8,
    /// Human-readable description of the current stage.
    pub current_step: String,
    /// Transport attempt currently in flight (1-based; 0 before upload).
    pub attempt: u32,
    /// Working corner set, exposed read-only for the renderer.
    pub corners: Option<CornerPoints>,
    /// Detector confidence for the proposed boundary, if one was detected.
    pub detection_confidence: Option<f32>,
    pub selected_asset: Option<AssetSummary>,
    pub corrected_asset: Option<AssetSummary>,
    pub upload_result: Option<UploadResult>,
    pub error: Option<StateError>,
    /// Message per failed transport attempt, oldest first.
    pub error_history: Vec<String>,
}

impl UploadState {
    pub fn new() -> Self {
        Self {
            status: UploadStatus::Idle,
            progress_percent: 0,
            current_step: "Waiting for a photo".into(),
            attempt: 0,
            corners: None,
            detection_confidence: None,
            selected_asset: None,
            corrected_asset: None,
            upload_result: None,
            error: None,
            error_history: Vec::new(),
        }
    }

    /// Unconditional return to `Idle` with all transient fields cleared.
    /// Used for cancellation from any state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Whether `retry()` has anything to work with.
    pub fn can_retry(&self) -> bool {
        self.selected_asset.is_some()
    }

    // -- Transitions (called only by the orchestration layer) -----------------

    pub fn begin_selecting(&mut self, file_name: &str) {
        self.status = UploadStatus::Selecting;
        self.current_step = format!("Checking '{file_name}'");
    }

    pub fn set_selected(&mut self, summary: AssetSummary) {
        self.selected_asset = Some(summary);
    }

    pub fn begin_cropping(&mut self, corners: CornerPoints, confidence: Option<f32>) {
        self.status = UploadStatus::Cropping;
        self.current_step = match confidence {
            Some(_) => "Boundary found — adjust the corners if needed".into(),
            None => "No boundary found — place the corners manually".into(),
        };
        self.corners = Some(corners);
        self.detection_confidence = confidence;
    }

    pub fn set_corners(&mut self, corners: CornerPoints) {
        self.corners = Some(corners);
    }

    pub fn begin_correcting(&mut self) {
        self.current_step = "Straightening the photo".into();
    }

    pub fn set_corrected(&mut self, summary: AssetSummary) {
        self.corrected_asset = Some(summary);
    }

    /// Start a (possibly fresh) transport attempt. Progress resets to zero
    /// here and nowhere else except `reset`.
    pub fn begin_upload_attempt(&mut self, attempt: u32) {
        self.status = UploadStatus::Uploading;
        self.current_step = format!("Uploading photo (attempt {attempt})");
        self.attempt = attempt;
        self.progress_percent = 0;
        self.error = None;
    }

    pub fn record_attempt_failure(&mut self, message: &str) {
        self.error_history.push(message.to_string());
    }

    /// Monotone progress update: regressions within an attempt are ignored.
    pub fn set_progress(&mut self, percent: u8) {
        self.progress_percent = self.progress_percent.max(percent.min(100));
    }

    pub fn begin_processing(&mut self) {
        self.status = UploadStatus::Processing;
        self.current_step = "Waiting for remote processing".into();
    }

    pub fn complete(&mut self, result: UploadResult) {
        self.status = UploadStatus::Complete;
        self.current_step = "Done".into();
        self.progress_percent = 100;
        self.upload_result = Some(result);
        self.error = None;
    }

    pub fn fail(&mut self, err: &LichtbildError) {
        self.status = UploadStatus::Error;
        self.current_step = "Something went wrong".into();
        self.error = Some(StateError::from(err));
    }
}

impl Default for UploadState {
    fn default() -> Self {
        Self::new()
    }
}
