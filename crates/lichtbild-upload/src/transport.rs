// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External collaborator contracts for the transport and job-status
// boundaries.
//
// The pipeline consumes a generic "submit asset, receive handle, poll
// status" contract; it does not implement the remote service. Implementations
// are constructed once per app session and passed in explicitly — there is no
// process-wide client singleton.

use async_trait::async_trait;

use lichtbild_core::error::Result;
use lichtbild_core::types::{AssetMetadata, JobUpdate, UploadId, UploadReceipt};

/// Callback reporting transmission progress as a percentage (0-100).
pub type ProgressObserver<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Transport boundary: submits asset bytes (typically as one multipart
/// request) and returns the remote handle.
///
/// Implementations must surface non-2xx responses as
/// `LichtbildError::UploadRejected` carrying the response status and body,
/// and connectivity failures as `LichtbildError::Network` — the retry policy
/// classifies on those kinds.
#[async_trait]
pub trait PhotoTransport: Send + Sync {
    async fn submit_asset(
        &self,
        bytes: Vec<u8>,
        metadata: &AssetMetadata,
        progress: ProgressObserver<'_>,
    ) -> Result<UploadReceipt>;
}

/// Job-status boundary: one observation of the remote processing job. The
/// pipeline polls this until the job settles; it never runs the job itself.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn job_status(&self, upload_id: &UploadId) -> Result<JobUpdate>;
}
