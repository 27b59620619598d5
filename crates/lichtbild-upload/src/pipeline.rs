// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline orchestrator — drives capture → detect → edit → validate →
// correct → upload → poll, and owns the `UploadState` exclusively.
//
// The pipeline runs as a single task consuming commands from a channel and
// publishing state snapshots over a watch channel, so there is no shared
// mutable state with the UI. Long decode/detect/warp work is offloaded to
// blocking tasks; each session carries a generation counter and a
// cancellation token so a reset invalidates in-flight work and pending retry
// timers deterministically.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use image::DynamicImage;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lichtbild_core::config::PipelineConfig;
use lichtbild_core::error::{LichtbildError, Result};
use lichtbild_core::types::{
    AssetMetadata, CropArea, ImageKind, ImageSource, JobUpdate, RemoteJobStatus, UploadId,
    UploadResult,
};
use lichtbild_vision::{Corner, CornerEditor, CorrectedAsset, PhotoCorrector, detect_boundary};

use crate::retry::{RetryPolicy, execute_with_retry};
use crate::state::{AssetSummary, UploadState};
use crate::transport::{JobStatusSource, PhotoTransport};
use crate::validate::{validate_dimensions, validate_file};

/// Commands accepted by the pipeline task.
enum Command {
    SelectSource(ImageSource),
    DragCorner(Corner, f32, f32),
    AcceptCorners,
    ApplyCrop(CropArea),
    Retry,
    Reset,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::SelectSource(_) => "SelectSource",
            Self::DragCorner(..) => "DragCorner",
            Self::AcceptCorners => "AcceptCorners",
            Self::ApplyCrop(_) => "ApplyCrop",
            Self::Retry => "Retry",
            Self::Reset => "Reset",
        })
    }
}

/// Handle used by the UI layer to drive the pipeline and observe its state.
///
/// Cheap to clone-ish: create once per capture surface. Dropping every handle
/// closes the command channel and shuts the pipeline task down.
pub struct PipelineHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<UploadState>,
}

impl PipelineHandle {
    /// Current state snapshot.
    pub fn state(&self) -> UploadState {
        self.state.borrow().clone()
    }

    /// A receiver for awaiting state transitions
    /// (`rx.wait_for(|s| s.status == ...)`).
    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.state.clone()
    }

    /// Feed a captured or picked file into the pipeline.
    pub async fn select_source(&self, source: ImageSource) -> Result<()> {
        self.send(Command::SelectSource(source)).await
    }

    /// Move one corner by a drag delta. No-op outside the cropping stage.
    pub async fn drag_corner(&self, corner: Corner, dx: f32, dy: f32) -> Result<()> {
        self.send(Command::DragCorner(corner, dx, dy)).await
    }

    /// Accept the current corners: correct, enhance, and upload.
    pub async fn accept_corners(&self) -> Result<()> {
        self.send(Command::AcceptCorners).await
    }

    /// Skip the quadrilateral and upload an axis-aligned crop instead.
    pub async fn apply_crop(&self, area: CropArea) -> Result<()> {
        self.send(Command::ApplyCrop(area)).await
    }

    /// Re-run the upload for the already-selected asset.
    ///
    /// Fails locally, without any network traffic, when nothing was selected.
    pub async fn retry(&self) -> Result<()> {
        if !self.state.borrow().can_retry() {
            return Err(LichtbildError::NoFileSelected);
        }
        self.send(Command::Retry).await
    }

    /// Cancel whatever is in flight and return to `Idle`.
    pub async fn reset(&self) -> Result<()> {
        self.send(Command::Reset).await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| LichtbildError::Processing("pipeline task has shut down".into()))
    }
}

/// The upload pipeline. Spawn once per capture surface with an explicitly
/// constructed transport client (never a process-wide singleton).
pub struct UploadPipeline;

impl UploadPipeline {
    /// Start the pipeline task on the current Tokio runtime.
    pub fn spawn(
        transport: Arc<dyn PhotoTransport>,
        jobs: Arc<dyn JobStatusSource>,
        config: PipelineConfig,
        policy: RetryPolicy,
    ) -> PipelineHandle {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (state_tx, state_rx) = watch::channel(UploadState::new());

        let ctx = PipelineCtx {
            transport,
            jobs,
            config,
            policy,
            state: UploadState::new(),
            state_tx,
            session: Session::fresh(0),
        };
        tokio::spawn(run(command_rx, ctx));

        PipelineHandle {
            commands: command_tx,
            state: state_rx,
        }
    }
}

/// Per-session working set. Stage outputs are owned here and handed to the
/// next stage; nothing is shared outside the pipeline task.
struct Session {
    generation: u64,
    cancel: CancellationToken,
    source: Option<ImageSource>,
    image: Option<DynamicImage>,
    editor: Option<CornerEditor>,
    corrected: Option<CorrectedAsset>,
}

impl Session {
    fn fresh(generation: u64) -> Self {
        Self {
            generation,
            cancel: CancellationToken::new(),
            source: None,
            image: None,
            editor: None,
            corrected: None,
        }
    }

    fn clear_assets(&mut self) {
        self.source = None;
        self.image = None;
        self.editor = None;
        self.corrected = None;
    }
}

struct PipelineCtx {
    transport: Arc<dyn PhotoTransport>,
    jobs: Arc<dyn JobStatusSource>,
    config: PipelineConfig,
    policy: RetryPolicy,
    state: UploadState,
    state_tx: watch::Sender<UploadState>,
    session: Session,
}

async fn run(mut commands: mpsc::Receiver<Command>, mut ctx: PipelineCtx) {
    debug!("pipeline task started");
    loop {
        let Some(command) = commands.recv().await else {
            debug!("all handles dropped; pipeline task exiting");
            return;
        };
        match command {
            Command::Reset => ctx.reset(),
            Command::DragCorner(corner, dx, dy) => ctx.drag_corner(corner, dx, dy),
            Command::SelectSource(source) => {
                let cancel = ctx.session.cancel.clone();
                if supervise(&mut commands, cancel, ctx.handle_select(source)).await {
                    ctx.reset();
                }
            }
            Command::AcceptCorners => {
                let cancel = ctx.session.cancel.clone();
                if supervise(&mut commands, cancel, ctx.handle_accept()).await {
                    ctx.reset();
                }
            }
            Command::ApplyCrop(area) => {
                let cancel = ctx.session.cancel.clone();
                if supervise(&mut commands, cancel, ctx.handle_crop(area)).await {
                    ctx.reset();
                }
            }
            Command::Retry => {
                let cancel = ctx.session.cancel.clone();
                if supervise(&mut commands, cancel, ctx.handle_retry()).await {
                    ctx.reset();
                }
            }
        }
    }
}

/// Drive `work` to completion while staying responsive to `Reset`.
///
/// Returns true when the session was reset: `work` is dropped mid-flight,
/// which also cancels any backoff timer or network round trip suspended
/// inside it. Other commands arriving while busy are discarded — stage
/// outputs are consumed strictly in pipeline order.
async fn supervise<F>(
    commands: &mut mpsc::Receiver<Command>,
    cancel: CancellationToken,
    work: F,
) -> bool
where
    F: Future<Output = ()>,
{
    tokio::pin!(work);
    loop {
        tokio::select! {
            _ = &mut work => return false,
            _ = cancel.cancelled() => {
                info!("session cancelled; dropping in-flight work");
                return true;
            }
            command = commands.recv() => match command {
                Some(Command::Reset) | None => {
                    cancel.cancel();
                    return true;
                }
                Some(other) => {
                    warn!(?other, "command ignored while the pipeline is busy");
                }
            }
        }
    }
}

impl PipelineCtx {
    fn publish(&self) {
        let _ = self.state_tx.send(self.state.clone());
    }

    fn fail(&mut self, err: &LichtbildError) {
        warn!(%err, kind = ?err.kind(), "pipeline stage failed");
        self.state.fail(err);
        self.publish();
    }

    /// True when `generation` no longer matches the current session; the
    /// caller must discard its result instead of applying it.
    fn stale(&self, generation: u64) -> bool {
        if self.session.generation != generation {
            warn!(generation, current = self.session.generation, "stale completion discarded");
            return true;
        }
        false
    }

    fn reset(&mut self) {
        self.session.cancel.cancel();
        self.session = Session::fresh(self.session.generation + 1);
        self.state.reset();
        self.publish();
        info!(generation = self.session.generation, "pipeline reset to idle");
    }

    fn drag_corner(&mut self, corner: Corner, dx: f32, dy: f32) {
        let Some(editor) = self.session.editor.as_mut() else {
            debug!("drag ignored: no cropping session is active");
            return;
        };
        if editor.drag(corner, dx, dy).applied() {
            self.state.set_corners(*editor.corners());
            self.publish();
        }
    }

    /// Stage 1-3: validate the file, decode it, and propose a boundary.
    async fn handle_select(&mut self, source: ImageSource) {
        let generation = self.session.generation;
        self.session.clear_assets();
        self.state.reset();
        self.state.begin_selecting(&source.file_name);
        self.publish();

        let verdict = validate_file(&source, &self.config.rules);
        for warning in &verdict.warnings {
            debug!(code = ?warning.code, message = %warning.message, "validation warning");
        }
        if !verdict.valid {
            self.fail(&LichtbildError::Validation(verdict.error_summary()));
            return;
        }

        // Decode off the interactive path; ownership of the raster moves
        // into the blocking task and back out with the result.
        let bytes = source.bytes.clone();
        let output = self.config.output;
        let decode = tokio::task::spawn_blocking(move || {
            PhotoCorrector::from_bytes(&bytes, output).map(PhotoCorrector::into_dynamic)
        });
        let image = match decode.await {
            Ok(Ok(image)) => image,
            Ok(Err(err)) => {
                self.fail(&err);
                return;
            }
            Err(join_err) => {
                self.fail(&LichtbildError::Processing(format!(
                    "decode task failed: {join_err}"
                )));
                return;
            }
        };
        if self.stale(generation) {
            return;
        }

        let dimensions =
            lichtbild_core::types::Dimensions::new(image.width(), image.height());
        let dim_verdict = validate_dimensions(dimensions, &self.config.rules);
        if !dim_verdict.valid {
            self.fail(&LichtbildError::Validation(dim_verdict.error_summary()));
            return;
        }
        self.state.set_selected(AssetSummary {
            file_name: source.file_name.clone(),
            size_bytes: source.size_bytes(),
            dimensions: Some(dimensions),
            content_hash: None,
        });
        self.publish();

        let options = self.config.detector;
        let detection = tokio::task::spawn_blocking(move || {
            let found = detect_boundary(&image, &options);
            (image, found)
        });
        let (image, found) = match detection.await {
            Ok(pair) => pair,
            Err(join_err) => {
                self.fail(&LichtbildError::Processing(format!(
                    "detection task failed: {join_err}"
                )));
                return;
            }
        };
        if self.stale(generation) {
            return;
        }

        // No boundary is a normal outcome: fall back to full-frame corners
        // for manual placement.
        let editor = match &found {
            Some(boundary) => CornerEditor::new(boundary.corners, dimensions)
                .unwrap_or_else(|_| CornerEditor::full_frame(dimensions)),
            None => CornerEditor::full_frame(dimensions),
        };
        let confidence = found.map(|boundary| boundary.confidence);
        info!(?confidence, "entering cropping stage");

        self.state.begin_cropping(*editor.corners(), confidence);
        self.session.source = Some(source);
        self.session.image = Some(image);
        self.session.editor = Some(editor);
        self.publish();
    }

    /// Stage 4-5: correct with the accepted corners, then upload.
    async fn handle_accept(&mut self) {
        let generation = self.session.generation;
        let Some(editor) = self.session.editor.as_ref() else {
            self.fail(&LichtbildError::Validation(
                "no cropping session is active".into(),
            ));
            return;
        };
        let corners = *editor.corners();
        let Some(image) = self.session.image.take() else {
            self.fail(&LichtbildError::Validation(
                "no decoded image is staged".into(),
            ));
            return;
        };

        self.state.begin_correcting();
        self.publish();

        let output = self.config.output;
        let correction = tokio::task::spawn_blocking(move || {
            PhotoCorrector::from_dynamic(image, output)
                .deskew(&corners)
                .map(PhotoCorrector::enhance)
                .and_then(|corrector| corrector.encode())
        });
        let corrected = match correction.await {
            Ok(Ok(asset)) => asset,
            Ok(Err(err)) => {
                // Correction failure is survivable: ship the validated
                // original unwarped.
                warn!(%err, "correction failed; falling back to the validated original");
                match self.fallback_asset() {
                    Some(asset) => asset,
                    None => {
                        self.fail(&err);
                        return;
                    }
                }
            }
            Err(join_err) => {
                self.fail(&LichtbildError::Processing(format!(
                    "correction task failed: {join_err}"
                )));
                return;
            }
        };
        if self.stale(generation) {
            return;
        }

        self.session.corrected = Some(corrected);
        self.upload_and_poll().await;
    }

    /// Axis-aligned crop fallback instead of a quadrilateral correction.
    async fn handle_crop(&mut self, area: CropArea) {
        let generation = self.session.generation;
        let Some(image) = self.session.image.take() else {
            self.fail(&LichtbildError::Validation(
                "no decoded image is staged".into(),
            ));
            return;
        };

        self.state.begin_correcting();
        self.publish();

        let output = self.config.output;
        let correction = tokio::task::spawn_blocking(move || {
            PhotoCorrector::from_dynamic(image, output)
                .crop(area)
                .enhance()
                .encode()
        });
        let corrected = match correction.await {
            Ok(Ok(asset)) => asset,
            Ok(Err(err)) => {
                warn!(%err, "crop failed; falling back to the validated original");
                match self.fallback_asset() {
                    Some(asset) => asset,
                    None => {
                        self.fail(&err);
                        return;
                    }
                }
            }
            Err(join_err) => {
                self.fail(&LichtbildError::Processing(format!(
                    "crop task failed: {join_err}"
                )));
                return;
            }
        };
        if self.stale(generation) {
            return;
        }

        self.session.corrected = Some(corrected);
        self.upload_and_poll().await;
    }

    /// Re-run the transport stage for the selected asset.
    async fn handle_retry(&mut self) {
        if self.session.source.is_none() {
            self.fail(&LichtbildError::NoFileSelected);
            return;
        }
        if self.session.corrected.is_none() {
            match self.fallback_asset() {
                Some(asset) => self.session.corrected = Some(asset),
                None => {
                    self.fail(&LichtbildError::NoFileSelected);
                    return;
                }
            }
        }
        self.upload_and_poll().await;
    }

    /// The validated original, re-wrapped as an asset without correction.
    fn fallback_asset(&self) -> Option<CorrectedAsset> {
        let source = self.session.source.as_ref()?;
        let dimensions = self.state.selected_asset.as_ref()?.dimensions?;
        let format = ImageKind::from_mime(&source.declared_mime_type)
            .or_else(|| source.extension().and_then(ImageKind::from_extension))
            .unwrap_or(ImageKind::Jpeg);
        Some(CorrectedAsset::from_unprocessed(
            source.bytes.clone(),
            dimensions,
            format,
        ))
    }

    /// Stage 6-7: transmit under the retry policy, then poll the remote job.
    async fn upload_and_poll(&mut self) {
        let generation = self.session.generation;
        let Some(corrected) = self.session.corrected.clone() else {
            self.fail(&LichtbildError::NoFileSelected);
            return;
        };
        let file_name = self
            .state
            .selected_asset
            .as_ref()
            .map(|asset| asset.file_name.clone())
            .unwrap_or_else(|| "photo.jpg".into());

        let metadata = AssetMetadata {
            file_name,
            mime_type: corrected.format.mime_type().into(),
            content_hash: corrected.content_hash.clone(),
            dimensions: corrected.dimensions,
        };

        self.state.begin_upload_attempt(1);
        self.state.set_corrected(AssetSummary {
            file_name: metadata.file_name.clone(),
            size_bytes: corrected.bytes.len() as u64,
            dimensions: Some(corrected.dimensions),
            content_hash: Some(corrected.content_hash.clone()),
        });
        self.publish();

        // Progress and retry events cross back from the transport future via
        // channels, so the state machine stays the only writer of state.
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u8>();
        let (retry_tx, mut retry_rx) = mpsc::unbounded_channel::<(u32, String)>();

        let transport = Arc::clone(&self.transport);
        let policy = self.policy.clone();
        let bytes = corrected.bytes.clone();
        let request_meta = metadata.clone();
        let submit = async move {
            execute_with_retry(
                move || {
                    let transport = Arc::clone(&transport);
                    let bytes = bytes.clone();
                    let request_meta = request_meta.clone();
                    let progress_tx = progress_tx.clone();
                    async move {
                        let report = move |percent: u8| {
                            let _ = progress_tx.send(percent);
                        };
                        transport.submit_asset(bytes, &request_meta, &report).await
                    }
                },
                &policy,
                move |attempt, err| {
                    let _ = retry_tx.send((attempt, err.to_string()));
                },
            )
            .await
        };
        tokio::pin!(submit);

        let outcome = loop {
            tokio::select! {
                outcome = &mut submit => break outcome,
                Some(percent) = progress_rx.recv() => {
                    self.state.set_progress(scale_transport_progress(percent));
                    self.publish();
                }
                Some((attempt, message)) = retry_rx.recv() => {
                    info!(attempt, %message, "transport attempt failed; retrying");
                    self.state.record_attempt_failure(&message);
                    self.state.begin_upload_attempt(attempt + 1);
                    self.publish();
                }
            }
        };

        let receipt = match outcome {
            Ok(receipt) => receipt,
            Err(err) => {
                // Exhausted or non-retryable: surface the underlying error
                // verbatim.
                self.state.record_attempt_failure(&err.to_string());
                self.fail(&err);
                return;
            }
        };
        if self.stale(generation) {
            return;
        }

        info!(
            upload_id = %receipt.upload_id,
            storage_key = %receipt.storage_key,
            "asset accepted by the remote service"
        );
        self.state.set_progress(90);
        self.state.begin_processing();
        self.publish();

        match self.poll_remote_job(receipt.upload_id).await {
            Ok(update) => {
                if self.stale(generation) {
                    return;
                }
                let result = UploadResult {
                    upload_id: receipt.upload_id,
                    storage_key: receipt.storage_key,
                    thumbnail_ref: receipt.thumbnail_ref.or(update.result_ref),
                    original_file_name: metadata.file_name,
                    file_size_bytes: corrected.bytes.len() as u64,
                    dimensions: corrected.dimensions,
                    processing_status: update.status,
                    completed_at: Utc::now(),
                };
                self.state.complete(result);
                self.publish();
            }
            Err(err) => self.fail(&err),
        }
    }

    /// Poll the job-status boundary until the remote job settles.
    async fn poll_remote_job(&mut self, upload_id: UploadId) -> Result<JobUpdate> {
        let interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let poll_policy = RetryPolicy::network_only();

        for poll in 0..self.config.max_status_polls {
            let jobs = Arc::clone(&self.jobs);
            let update = execute_with_retry(
                || {
                    let jobs = Arc::clone(&jobs);
                    async move { jobs.job_status(&upload_id).await }
                },
                &poll_policy,
                |_, _| {},
            )
            .await?;

            match update.status {
                RemoteJobStatus::Completed => return Ok(update),
                RemoteJobStatus::Failed => {
                    let detail = update
                        .error
                        .unwrap_or_else(|| "no detail reported".into());
                    return Err(LichtbildError::Processing(format!(
                        "remote processing failed: {detail}"
                    )));
                }
                RemoteJobStatus::Pending | RemoteJobStatus::Processing => {
                    // Creep toward 99 while waiting; completion pins to 100.
                    self.state
                        .set_progress((90 + (poll + 1).min(9) as u8).min(99));
                    self.publish();
                    tokio::time::sleep(interval).await;
                }
            }
        }

        Err(LichtbildError::Network(format!(
            "remote job did not settle after {} status checks",
            self.config.max_status_polls
        )))
    }
}

/// Transport progress covers the 0-90 band; processing creeps to 99 and
/// completion pins 100.
fn scale_transport_progress(percent: u8) -> u8 {
    ((percent.min(100) as u16 * 90) / 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::UploadStatus;
    use crate::transport::ProgressObserver;
    use async_trait::async_trait;
    use lichtbild_core::error::ErrorKind;
    use lichtbild_core::types::UploadReceipt;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Transport failing with a network error for the first `failures` calls.
    struct MockTransport {
        failures: u32,
        calls: AtomicU32,
    }

    impl MockTransport {
        fn succeeding() -> Self {
            Self::failing(0)
        }

        fn failing(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PhotoTransport for MockTransport {
        async fn submit_asset(
            &self,
            _bytes: Vec<u8>,
            metadata: &AssetMetadata,
            progress: ProgressObserver<'_>,
        ) -> Result<UploadReceipt> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            progress(30);
            progress(65);
            if call <= self.failures {
                return Err(LichtbildError::Network(format!("simulated outage {call}")));
            }
            progress(100);
            Ok(UploadReceipt {
                upload_id: UploadId::new(),
                storage_key: format!("assets/{}", metadata.content_hash),
                thumbnail_ref: Some("thumbs/1.jpg".into()),
            })
        }
    }

    /// Transport whose submit never resolves; used to test cancellation.
    struct StalledTransport {
        calls: AtomicU32,
    }

    #[async_trait]
    impl PhotoTransport for StalledTransport {
        async fn submit_asset(
            &self,
            _bytes: Vec<u8>,
            _metadata: &AssetMetadata,
            _progress: ProgressObserver<'_>,
        ) -> Result<UploadReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    /// Job source reporting `Processing` for the first `pending_polls` calls.
    struct MockJobs {
        pending_polls: u32,
        polls: AtomicU32,
        fail: bool,
    }

    impl MockJobs {
        fn completing_after(pending_polls: u32) -> Self {
            Self {
                pending_polls,
                polls: AtomicU32::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                pending_polls: 0,
                polls: AtomicU32::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl JobStatusSource for MockJobs {
        async fn job_status(&self, upload_id: &UploadId) -> Result<JobUpdate> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            let status = if self.fail {
                RemoteJobStatus::Failed
            } else if poll <= self.pending_polls {
                RemoteJobStatus::Processing
            } else {
                RemoteJobStatus::Completed
            };
            Ok(JobUpdate {
                job_id: *upload_id,
                status,
                result_ref: Some("results/restored.jpg".into()),
                error: self.fail.then(|| "model exploded".to_string()),
            })
        }
    }

    /// A 640x480 frame with a bright photo region, JPEG-encoded.
    fn photo_bytes() -> Vec<u8> {
        let mut img = image::GrayImage::from_pixel(640, 480, image::Luma([40u8]));
        for y in 60..420 {
            for x in 80..560 {
                img.put_pixel(x, y, image::Luma([230u8]));
            }
        }
        let mut buffer = Vec::new();
        image::DynamicImage::ImageLuma8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut buffer),
                image::ImageFormat::Jpeg,
            )
            .expect("encode test frame");
        buffer
    }

    fn jpeg_source() -> ImageSource {
        ImageSource {
            bytes: photo_bytes(),
            declared_mime_type: "image/jpeg".into(),
            file_name: "holiday.jpg".into(),
        }
    }

    fn spawn_pipeline(
        transport: Arc<dyn PhotoTransport>,
        jobs: Arc<dyn JobStatusSource>,
    ) -> PipelineHandle {
        UploadPipeline::spawn(
            transport,
            jobs,
            PipelineConfig::default(),
            RetryPolicy::upload_default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn full_capture_to_complete_flow() {
        let transport = Arc::new(MockTransport::succeeding());
        let handle = spawn_pipeline(transport.clone(), Arc::new(MockJobs::completing_after(1)));
        let mut rx = handle.subscribe();

        handle.select_source(jpeg_source()).await.expect("select");
        let cropping = rx
            .wait_for(|s| s.status == UploadStatus::Cropping)
            .await
            .expect("cropping state")
            .clone();

        assert!(cropping.corners.is_some());
        assert!(
            cropping.detection_confidence.unwrap_or(0.0) >= 0.5,
            "confidence = {:?}",
            cropping.detection_confidence
        );

        handle.accept_corners().await.expect("accept");
        let done = rx
            .wait_for(|s| matches!(s.status, UploadStatus::Complete | UploadStatus::Error))
            .await
            .expect("terminal state")
            .clone();

        assert_eq!(done.status, UploadStatus::Complete, "error: {:?}", done.error);
        assert_eq!(done.progress_percent, 100);
        assert_eq!(transport.calls(), 1);

        let result = done.upload_result.expect("result");
        assert_eq!(result.original_file_name, "holiday.jpg");
        assert_eq!(result.processing_status, RemoteJobStatus::Completed);
        assert!(result.storage_key.starts_with("assets/"));
        // First-attempt success: no retry observer firings recorded.
        assert!(done.error_history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn two_network_failures_still_end_in_complete() {
        let transport = Arc::new(MockTransport::failing(2));
        let handle = spawn_pipeline(transport.clone(), Arc::new(MockJobs::completing_after(0)));
        let mut rx = handle.subscribe();

        handle.select_source(jpeg_source()).await.expect("select");
        rx.wait_for(|s| s.status == UploadStatus::Cropping)
            .await
            .expect("cropping state");

        handle.accept_corners().await.expect("accept");
        let done = rx
            .wait_for(|s| matches!(s.status, UploadStatus::Complete | UploadStatus::Error))
            .await
            .expect("terminal state")
            .clone();

        assert_eq!(done.status, UploadStatus::Complete, "error: {:?}", done.error);
        assert_eq!(transport.calls(), 3);
        assert_eq!(done.attempt, 3);
        assert_eq!(done.error_history.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_the_final_error() {
        let transport = Arc::new(MockTransport::failing(u32::MAX));
        let handle = spawn_pipeline(transport.clone(), Arc::new(MockJobs::completing_after(0)));
        let mut rx = handle.subscribe();

        handle.select_source(jpeg_source()).await.expect("select");
        rx.wait_for(|s| s.status == UploadStatus::Cropping)
            .await
            .expect("cropping state");
        handle.accept_corners().await.expect("accept");

        let done = rx
            .wait_for(|s| s.status == UploadStatus::Error)
            .await
            .expect("error state")
            .clone();

        assert_eq!(transport.calls(), 3);
        let error = done.error.expect("error");
        assert_eq!(error.kind, ErrorKind::Network);
        assert!(error.retryable);
        assert_eq!(error.message, "network error: simulated outage 3");
    }

    #[tokio::test]
    async fn retry_without_selected_asset_fails_locally() {
        let transport = Arc::new(MockTransport::succeeding());
        let handle = spawn_pipeline(transport.clone(), Arc::new(MockJobs::completing_after(0)));

        let err = handle.retry().await.expect_err("must fail locally");
        assert_eq!(err.to_string(), "No file selected for retry");
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_file_is_rejected_before_any_network_call() {
        let transport = Arc::new(MockTransport::succeeding());
        let mut config = PipelineConfig::default();
        config.rules.max_size_bytes = 64;
        let handle = UploadPipeline::spawn(
            transport.clone(),
            Arc::new(MockJobs::completing_after(0)),
            config,
            RetryPolicy::upload_default(),
        );
        let mut rx = handle.subscribe();

        handle.select_source(jpeg_source()).await.expect("select");
        let failed = rx
            .wait_for(|s| s.status == UploadStatus::Error)
            .await
            .expect("error state")
            .clone();

        let error = failed.error.expect("error");
        assert_eq!(error.kind, ErrorKind::Validation);
        assert!(!error.retryable);
        assert!(error.message.contains("64"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_an_inflight_upload() {
        let transport = Arc::new(StalledTransport {
            calls: AtomicU32::new(0),
        });
        let handle = spawn_pipeline(transport.clone(), Arc::new(MockJobs::completing_after(0)));
        let mut rx = handle.subscribe();

        handle.select_source(jpeg_source()).await.expect("select");
        rx.wait_for(|s| s.status == UploadStatus::Cropping)
            .await
            .expect("cropping state");
        handle.accept_corners().await.expect("accept");
        rx.wait_for(|s| s.status == UploadStatus::Uploading)
            .await
            .expect("uploading state");

        handle.reset().await.expect("reset");
        let idle = rx
            .wait_for(|s| s.status == UploadStatus::Idle)
            .await
            .expect("idle state")
            .clone();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(idle.selected_asset.is_none());
        assert!(idle.error.is_none());
        assert_eq!(idle.progress_percent, 0);

        // The pipeline remains usable after the reset.
        let working = Arc::new(MockTransport::succeeding());
        let handle2 = spawn_pipeline(working.clone(), Arc::new(MockJobs::completing_after(0)));
        let mut rx2 = handle2.subscribe();
        handle2.select_source(jpeg_source()).await.expect("select");
        rx2.wait_for(|s| s.status == UploadStatus::Cropping)
            .await
            .expect("cropping again");
    }

    #[tokio::test(start_paused = true)]
    async fn corner_drags_flow_into_the_published_state() {
        let transport = Arc::new(MockTransport::succeeding());
        let handle = spawn_pipeline(transport, Arc::new(MockJobs::completing_after(0)));
        let mut rx = handle.subscribe();

        handle.select_source(jpeg_source()).await.expect("select");
        let before = rx
            .wait_for(|s| s.status == UploadStatus::Cropping)
            .await
            .expect("cropping state")
            .corners
            .expect("corners");

        handle
            .drag_corner(Corner::TopLeft, 6.0, 6.0)
            .await
            .expect("drag");
        let after = rx
            .wait_for(|s| s.corners != Some(before))
            .await
            .expect("corner update")
            .corners
            .expect("corners");

        assert!((after.top_left.x - (before.top_left.x + 6.0)).abs() < 1e-3);
        assert!((after.top_left.y - (before.top_left.y + 6.0)).abs() < 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_job_failure_surfaces_as_processing_error() {
        let transport = Arc::new(MockTransport::succeeding());
        let handle = spawn_pipeline(transport, Arc::new(MockJobs::failing()));
        let mut rx = handle.subscribe();

        handle.select_source(jpeg_source()).await.expect("select");
        rx.wait_for(|s| s.status == UploadStatus::Cropping)
            .await
            .expect("cropping state");
        handle.accept_corners().await.expect("accept");

        let failed = rx
            .wait_for(|s| s.status == UploadStatus::Error)
            .await
            .expect("error state")
            .clone();
        let error = failed.error.expect("error");
        assert_eq!(error.kind, ErrorKind::Processing);
        assert!(error.message.contains("model exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn crop_fallback_uploads_without_a_quadrilateral() {
        let transport = Arc::new(MockTransport::succeeding());
        let handle = spawn_pipeline(transport.clone(), Arc::new(MockJobs::completing_after(0)));
        let mut rx = handle.subscribe();

        handle.select_source(jpeg_source()).await.expect("select");
        rx.wait_for(|s| s.status == UploadStatus::Cropping)
            .await
            .expect("cropping state");

        handle
            .apply_crop(CropArea {
                x: 80,
                y: 60,
                width: 480,
                height: 360,
            })
            .await
            .expect("crop");

        let done = rx
            .wait_for(|s| matches!(s.status, UploadStatus::Complete | UploadStatus::Error))
            .await
            .expect("terminal state")
            .clone();
        assert_eq!(done.status, UploadStatus::Complete, "error: {:?}", done.error);

        let corrected = done.corrected_asset.expect("corrected asset");
        assert_eq!(corrected.dimensions, Some(lichtbild_core::types::Dimensions::new(480, 360)));
    }
}
