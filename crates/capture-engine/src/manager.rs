//! One-active-session lifecycle manager.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use vidfx_common::error::{VidfxError, VidfxResult};
use vidfx_media_core::MediaSource;
use vidfx_settings::Settings;

use crate::blob::{Blob, ObjectUrl, ObjectUrlRegistry};
use crate::encoder::{output_file_name, EncoderFactory};
use crate::session::{RenderSession, SessionConfig};

/// A finished export.
#[derive(Debug, Clone)]
pub struct RenderResult {
    /// Handle to the published blob.
    pub url: ObjectUrl,
    /// Suggested download name, `modified_<input>.<ext>`.
    pub file_name: String,
    pub blob: Blob,
    pub frames: u64,
    pub video_secs: f64,
    pub audio_secs: Option<f64>,
}

struct JobHandle {
    cancel: Arc<AtomicBool>,
    progress: watch::Receiver<u8>,
    task: JoinHandle<VidfxResult<RenderResult>>,
}

/// Runs render sessions one at a time.
///
/// Starting a request cancels the previous one and waits for its teardown
/// before any new resource is acquired, so at most one encoder records at
/// any instant.
pub struct SessionManager {
    factory: Arc<dyn EncoderFactory>,
    config: SessionConfig,
    registry: Arc<Mutex<ObjectUrlRegistry>>,
    active: Option<JobHandle>,
}

impl SessionManager {
    pub fn new(factory: Arc<dyn EncoderFactory>, config: SessionConfig) -> Self {
        Self {
            factory,
            config,
            registry: Arc::new(Mutex::new(ObjectUrlRegistry::new())),
            active: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Registry holding the published result URLs.
    pub fn registry(&self) -> Arc<Mutex<ObjectUrlRegistry>> {
        self.registry.clone()
    }

    /// Whether a request is in flight or finished but not yet collected.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Progress of the current request.
    pub fn progress(&self) -> Option<watch::Receiver<u8>> {
        self.active.as_ref().map(|job| job.progress.clone())
    }

    /// Begin processing `source` with a snapshot of `settings`.
    ///
    /// Any previous request is cancelled and torn down first and its result
    /// URL revoked. Setup failures are returned here; runtime failures come
    /// out of [`SessionManager::wait`].
    pub async fn start(
        &mut self,
        source: Box<dyn MediaSource>,
        settings: Settings,
        input: &Path,
    ) -> VidfxResult<watch::Receiver<u8>> {
        if self.cancel().await {
            tracing::info!("Previous render request superseded");
        }
        if lock(&self.registry).revoke_current() {
            tracing::debug!("Revoked superseded result");
        }

        let (progress_tx, progress_rx) = watch::channel(0u8);
        let session = RenderSession::open(
            source,
            settings,
            self.config.clone(),
            self.factory.as_ref(),
            progress_tx,
        )?;
        let cancel = session.cancel_flag();
        let registry = self.registry.clone();
        let file_name = output_file_name(input, self.config.format);
        tracing::info!(input = %input.display(), output = %file_name, "Render request started");

        // Pulls, pushes and the EOS drain block the calling thread, so the
        // session gets a blocking-pool thread of its own.
        let runtime = tokio::runtime::Handle::current();
        let task: JoinHandle<VidfxResult<RenderResult>> = tokio::task::spawn_blocking(move || {
            let output = runtime.block_on(session.run())?;
            let url = lock(&registry).publish(output.blob.clone());
            tracing::info!(url = %url, file = %file_name, "Result published");
            Ok(RenderResult {
                url,
                file_name,
                blob: output.blob,
                frames: output.frames,
                video_secs: output.video_secs,
                audio_secs: output.audio_secs,
            })
        });

        self.active = Some(JobHandle {
            cancel,
            progress: progress_rx.clone(),
            task,
        });
        Ok(progress_rx)
    }

    /// Wait for the current request to finish.
    pub async fn wait(&mut self) -> VidfxResult<RenderResult> {
        let job = self
            .active
            .take()
            .ok_or_else(|| VidfxError::render("No render request in flight"))?;
        join(job.task).await
    }

    /// Cancel the current request and wait for its teardown. Returns whether
    /// there was one.
    pub async fn cancel(&mut self) -> bool {
        let Some(job) = self.active.take() else {
            return false;
        };
        job.cancel.store(true, Ordering::SeqCst);
        match join(job.task).await {
            Ok(result) => {
                // Finished before the cancel landed; its URL stays published.
                tracing::debug!(url = %result.url, "Cancelled request had already completed");
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::debug!(error = %e, "Cancelled request ended with error"),
        }
        true
    }
}

async fn join(task: JoinHandle<VidfxResult<RenderResult>>) -> VidfxResult<RenderResult> {
    match task.await {
        Ok(result) => result,
        Err(e) => Err(VidfxError::render(format!("Render task failed: {e}"))),
    }
}

fn lock(registry: &Mutex<ObjectUrlRegistry>) -> MutexGuard<'_, ObjectUrlRegistry> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}
