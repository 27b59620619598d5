// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the upload UI.
//
// Every technical error maps to plain English with a clear suggestion. The
// retriable flag gates the "Try again" affordance; non-retriable errors only
// offer "Start over".

use crate::error::LichtbildError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip, timeout — we can retry automatically.
    Transient,
    /// User must do something (grant access, pick a different file).
    ActionRequired,
    /// Cannot be fixed by retrying — bad file, remote quota exceeded.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the UI should offer "Try again" rather than only "Start over".
    pub retriable: bool,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

/// Convert a `LichtbildError` into a `HumanError`.
pub fn humanize_error(err: &LichtbildError) -> HumanError {
    match err {
        LichtbildError::Validation(detail) => HumanError {
            message: "This file can't be uploaded.".into(),
            suggestion: format!("Please choose a different photo. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LichtbildError::Geometry(_) => HumanError {
            message: "We couldn't straighten the photo with those corners.".into(),
            suggestion: "Try moving the corner markers so they form a clear four-sided shape around the photo.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LichtbildError::Processing(_) => HumanError {
            message: "Something went wrong while preparing the photo.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try saving it as a JPEG or PNG first.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        LichtbildError::UploadRejected { status, .. } => HumanError {
            message: "The upload was refused by the server.".into(),
            suggestion: format!("Please try again in a moment. (Server said: {status})"),
            retriable: err.retryable(),
            severity: if err.retryable() {
                Severity::Transient
            } else {
                Severity::Permanent
            },
        },

        LichtbildError::Upload(detail) => HumanError {
            message: "The upload didn't finish.".into(),
            suggestion: format!("Check your connection and try again. ({detail})"),
            retriable: true,
            severity: Severity::Transient,
        },

        LichtbildError::Network(_) => HumanError {
            message: "We couldn't reach the server.".into(),
            suggestion: "Make sure you're connected to the internet, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        LichtbildError::Permission(_) => HumanError {
            message: "We don't have permission to do that.".into(),
            suggestion: "Allow camera and photo access in your device settings, then start over.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LichtbildError::Storage(_) => HumanError {
            message: "There's no room to store this photo right now.".into(),
            suggestion: "Your storage allowance may be full. Free up space or upgrade, then start over.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        LichtbildError::NoAttemptsConfigured => HumanError {
            message: "Uploading is switched off.".into(),
            suggestion: "This looks like a configuration problem. Please contact support.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        LichtbildError::NoFileSelected => HumanError {
            message: "There's nothing to retry yet.".into(),
            suggestion: "Pick a photo first, then try uploading again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LichtbildError::Io(_) => HumanError {
            message: "We couldn't read the file.".into(),
            suggestion: "The file may have moved or been deleted. Try picking it again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LichtbildError::Serialization(_) => HumanError {
            message: "Something unexpected went wrong.".into(),
            suggestion: "Please start over. If this keeps happening, contact support.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_is_transient_and_retriable() {
        let human = humanize_error(&LichtbildError::Network("timed out".into()));
        assert!(human.retriable);
        assert_eq!(human.severity, Severity::Transient);
    }

    #[test]
    fn validation_error_offers_start_over_only() {
        let human = humanize_error(&LichtbildError::Validation("too large".into()));
        assert!(!human.retriable);
        assert_eq!(human.severity, Severity::ActionRequired);
    }

    #[test]
    fn server_rejection_severity_follows_status() {
        let transient = humanize_error(&LichtbildError::UploadRejected {
            status: 503,
            body: "unavailable".into(),
        });
        assert!(transient.retriable);

        let permanent = humanize_error(&LichtbildError::UploadRejected {
            status: 507,
            body: "quota".into(),
        });
        assert!(!permanent.retriable);
        assert_eq!(permanent.severity, Severity::Permanent);
    }
}
