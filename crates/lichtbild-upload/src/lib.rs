// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// lichtbild-upload — Validation, retry policies, transport contracts, and the
// upload state machine. This crate bridges between the vision stages defined
// in `lichtbild-vision` and the remote photo service.

pub mod pipeline;
pub mod retry;
pub mod state;
pub mod transport;
pub mod validate;

pub use pipeline::{PipelineHandle, UploadPipeline};
pub use retry::{RetryPolicy, RetryWrapper, execute_with_retry, retry_wrapper};
pub use state::{AssetSummary, StateError, UploadState, UploadStatus};
pub use transport::{JobStatusSource, PhotoTransport, ProgressObserver};
pub use validate::{IssueCode, ValidationIssue, ValidationResult, validate_dimensions, validate_file};
