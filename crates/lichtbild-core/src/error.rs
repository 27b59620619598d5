// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Lichtbild.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Lichtbild operations.
#[derive(Debug, Error)]
pub enum LichtbildError {
    // -- Local pipeline errors --
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("degenerate corner geometry: {0}")]
    Geometry(String),

    #[error("image processing failed: {0}")]
    Processing(String),

    // -- Transport errors --
    #[error("upload rejected with status {status}: {body}")]
    UploadRejected { status: u16, body: String },

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("network error: {0}")]
    Network(String),

    // -- Environment errors --
    #[error("permission denied: {0}")]
    Permission(String),

    #[error("remote storage error: {0}")]
    Storage(String),

    // -- Orchestration errors --
    #[error("no attempts configured")]
    NoAttemptsConfigured,

    #[error("No file selected for retry")]
    NoFileSelected,

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Classification of errors for retry decisions and UI affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad size, type, or dimensions — never retryable.
    Validation,
    /// Degenerate corner configuration — recovered locally, never retried
    /// over the network.
    Geometry,
    /// Warp/enhance/encode failure — retryable only under the critical policy.
    Processing,
    /// Transport-level failure reported by the remote service.
    Upload,
    /// Connectivity or timeout.
    Network,
    /// Camera/storage access denied — requires user action.
    Permission,
    /// Remote capacity or quota problem.
    Storage,
}

impl LichtbildError {
    /// Classify this error into the retry taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::NoAttemptsConfigured | Self::NoFileSelected => {
                ErrorKind::Validation
            }
            Self::Geometry(_) => ErrorKind::Geometry,
            Self::Processing(_) | Self::Serialization(_) => ErrorKind::Processing,
            Self::UploadRejected { status, .. } => classify_http_status(*status),
            Self::Upload(_) => ErrorKind::Upload,
            Self::Network(_) => ErrorKind::Network,
            Self::Permission(_) => ErrorKind::Permission,
            Self::Storage(_) => ErrorKind::Storage,

            // IO errors depend on the kind.
            Self::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::Interrupted => ErrorKind::Network,
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    ErrorKind::Permission
                }
                _ => ErrorKind::Processing,
            },
        }
    }

    /// Whether re-attempting the same operation is expected to sometimes
    /// succeed. Drives the retry affordance shown to the user.
    pub fn retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Upload | ErrorKind::Network)
    }
}

/// Map a non-2xx HTTP status onto the error taxonomy.
fn classify_http_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Permission,
        413 => ErrorKind::Validation,
        507 => ErrorKind::Storage,
        _ => ErrorKind::Upload,
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LichtbildError>;
