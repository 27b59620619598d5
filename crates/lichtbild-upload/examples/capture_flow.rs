// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end demo: synthesize a skewed photo frame, run it through the full
// pipeline against an in-memory transport that drops the first attempt, and
// print each observed state transition.
//
//   cargo run --example capture_flow

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tracing::info;

use lichtbild_core::config::PipelineConfig;
use lichtbild_core::error::{LichtbildError, Result};
use lichtbild_core::types::{
    AssetMetadata, ImageSource, JobUpdate, RemoteJobStatus, UploadId, UploadReceipt,
};
use lichtbild_upload::pipeline::UploadPipeline;
use lichtbild_upload::retry::RetryPolicy;
use lichtbild_upload::state::UploadStatus;
use lichtbild_upload::transport::{JobStatusSource, PhotoTransport, ProgressObserver};

/// In-memory stand-in for the remote photo service: the first submit fails
/// with a network error, the second succeeds.
struct DemoService {
    submits: AtomicU32,
    polls: AtomicU32,
}

#[async_trait]
impl PhotoTransport for DemoService {
    async fn submit_asset(
        &self,
        bytes: Vec<u8>,
        metadata: &AssetMetadata,
        progress: ProgressObserver<'_>,
    ) -> Result<UploadReceipt> {
        let call = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        for pct in [10u8, 40, 80] {
            progress(pct);
        }
        if call == 1 {
            return Err(LichtbildError::Network("simulated flaky Wi-Fi".into()));
        }
        progress(100);
        info!(bytes = bytes.len(), name = %metadata.file_name, "demo service stored asset");
        Ok(UploadReceipt {
            upload_id: UploadId::new(),
            storage_key: format!("assets/{}", metadata.content_hash),
            thumbnail_ref: None,
        })
    }
}

#[async_trait]
impl JobStatusSource for DemoService {
    async fn job_status(&self, upload_id: &UploadId) -> Result<JobUpdate> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(JobUpdate {
            job_id: *upload_id,
            status: if poll < 3 {
                RemoteJobStatus::Processing
            } else {
                RemoteJobStatus::Completed
            },
            result_ref: Some("results/restored.jpg".into()),
            error: None,
        })
    }
}

/// A dark frame with a bright, slightly inset "photo" region.
fn synthetic_capture() -> ImageSource {
    let mut img = image::GrayImage::from_pixel(800, 600, image::Luma([35u8]));
    for y in 80..520 {
        for x in 100..700 {
            img.put_pixel(x, y, image::Luma([225u8]));
        }
    }
    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Jpeg,
        )
        .expect("encode synthetic frame");
    ImageSource {
        bytes,
        declared_mime_type: "image/jpeg".into(),
        file_name: "demo-capture.jpg".into(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let service = Arc::new(DemoService {
        submits: AtomicU32::new(0),
        polls: AtomicU32::new(0),
    });

    let handle = UploadPipeline::spawn(
        service.clone(),
        service.clone(),
        PipelineConfig::default(),
        RetryPolicy::upload_default(),
    );
    let mut states = handle.subscribe();

    handle.select_source(synthetic_capture()).await?;
    states
        .wait_for(|s| s.status == UploadStatus::Cropping)
        .await
        .expect("cropping state");
    info!(
        confidence = ?handle.state().detection_confidence,
        corners = ?handle.state().corners,
        "boundary proposed; accepting as-is"
    );

    handle.accept_corners().await?;
    loop {
        states.changed().await.expect("pipeline alive");
        let snapshot = states.borrow().clone();
        info!(
            status = ?snapshot.status,
            progress = snapshot.progress_percent,
            step = %snapshot.current_step,
            "state"
        );
        match snapshot.status {
            UploadStatus::Complete => {
                let result = snapshot.upload_result.expect("result");
                info!(
                    storage_key = %result.storage_key,
                    size = result.file_size_bytes,
                    "upload finished after {} attempt(s)",
                    snapshot.attempt
                );
                return Ok(());
            }
            UploadStatus::Error => {
                let error = snapshot.error.expect("error");
                eprintln!("pipeline failed: {}", error.message);
                std::process::exit(1);
            }
            _ => {}
        }
    }
}
