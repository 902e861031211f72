//! Training workflow controller
//!
//! Owns the single [`TrainingSession`] and is the only code that mutates it.
//! User commands (label, preview, upload, confirm, cancel, reset) and poller
//! ticks both go through the state lock, so transitions never interleave.
//! The lock is never held across a backend call: a command claims the session
//! (`pending`), releases the lock for the request, then re-locks and applies
//! the result only if no reset happened meanwhile.
//!
//! Phase flow:
//! Idle → Previewing → Starting → Downloading → Preparing → TrainingRun →
//! Finalizing → Completed | Errored, with Idle → Starting as a shortcut and
//! reset returning any phase to a fresh Idle.

use crate::error::{TransportError, WorkflowError};
use crate::models::{ImageCount, LabelEntry, StagedFile, StagedUpload, TrainingSession};
use crate::services::{
    ImageStagingClient, LabelRegistryClient, StatusSource, TrainingClient, UploadResult,
};
use crate::transport::Transport;
use crate::workflow::status_poller::{StatusPoller, StatusTick};
use chrono::Utc;
use leafy_common::api::RemoteStatus;
use leafy_common::config::{ClientConfig, MIN_POLL_INTERVAL_MS};
use leafy_common::events::{EventBus, LeafyEvent, Phase};
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tracing::{debug, info, warn};

const STOPPED_UNEXPECTEDLY: &str = "Training stopped unexpectedly";

/// Last user-facing notice produced by a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Start rejected because the label exists; the form stays editable
    AlreadyTrained { label: String, message: String },
    /// Any other failed command; the session stays in its pre-call phase
    Failure(String),
}

/// Read-only view of the controller state for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub session: TrainingSession,
    pub labels: Vec<LabelEntry>,
    pub notice: Option<Notice>,
    pub staged_files: usize,
    pub poller_active: bool,
    /// A preview, upload or start request is awaiting the backend
    pub command_pending: bool,
}

struct WorkflowState {
    session: TrainingSession,
    staged: StagedUpload,
    labels: BTreeSet<LabelEntry>,
    notice: Option<Notice>,
    /// Bumped whenever a poller is started or stopped
    generation: u64,
    /// Bumped by every reset; in-flight command results from an older epoch are dropped
    epoch: u64,
    /// A session command is waiting on the backend
    pending: bool,
    poller: Option<StatusPoller>,
    /// A progress phase has been reported for the current job
    progress_seen: bool,
}

struct ControllerInner {
    transport: Transport,
    staging: ImageStagingClient,
    label_registry: LabelRegistryClient,
    training: TrainingClient,
    status_source: Arc<dyn StatusSource>,
    event_bus: EventBus,
    poll_interval: Duration,
    default_image_count: ImageCount,
    state: Mutex<WorkflowState>,
}

/// Client-side training workflow state machine
#[derive(Clone)]
pub struct TrainingWorkflowController {
    inner: Arc<ControllerInner>,
}

impl TrainingWorkflowController {
    pub fn new(transport: Transport, config: &ClientConfig, event_bus: EventBus) -> Self {
        let training = TrainingClient::new(transport.clone());
        let status_source: Arc<dyn StatusSource> = Arc::new(training.clone());
        Self::with_status_source(transport, config, event_bus, status_source)
    }

    /// Build a controller that reads status from a custom source
    pub fn with_status_source(
        transport: Transport,
        config: &ClientConfig,
        event_bus: EventBus,
        status_source: Arc<dyn StatusSource>,
    ) -> Self {
        let default_image_count = ImageCount::clamped(config.default_image_count as i64);
        let min_interval = Duration::from_millis(MIN_POLL_INTERVAL_MS);
        if config.poll_interval < min_interval {
            warn!(
                requested_ms = config.poll_interval.as_millis() as u64,
                used_ms = MIN_POLL_INTERVAL_MS,
                "Poll interval below minimum"
            );
        }

        let state = WorkflowState {
            session: TrainingSession::new(default_image_count),
            staged: StagedUpload::default(),
            labels: BTreeSet::new(),
            notice: None,
            generation: 0,
            epoch: 0,
            pending: false,
            poller: None,
            progress_seen: false,
        };

        Self {
            inner: Arc::new(ControllerInner {
                staging: ImageStagingClient::new(transport.clone()),
                label_registry: LabelRegistryClient::new(transport.clone()),
                training: TrainingClient::new(transport.clone()),
                transport,
                status_source,
                event_bus,
                poll_interval: config.poll_interval.max(min_interval),
                default_image_count,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.inner.transport
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LeafyEvent> {
        self.inner.event_bus.subscribe()
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot {
        let state = self.inner.state.lock().await;
        WorkflowSnapshot {
            session: state.session.clone(),
            labels: state.labels.iter().cloned().collect(),
            notice: state.notice.clone(),
            staged_files: state.staged.len(),
            poller_active: state.poller.as_ref().is_some_and(StatusPoller::is_active),
            command_pending: state.pending,
        }
    }

    pub async fn session(&self) -> TrainingSession {
        self.inner.state.lock().await.session.clone()
    }

    /// Open the workflow view: fresh Idle session plus current label set
    ///
    /// A failed label fetch is logged; the view still opens.
    pub async fn open(&self) -> WorkflowSnapshot {
        self.reset().await;
        if let Err(e) = self.refresh_labels().await {
            warn!(error = %e, "Could not load trained labels");
        }
        self.snapshot().await
    }

    /// Edit the species name (only while Idle)
    pub async fn set_label(&self, label: &str) -> Result<(), WorkflowError> {
        let mut state = self.inner.state.lock().await;
        ensure_editable(&state)?;
        state.session.label = label.to_string();
        Ok(())
    }

    /// Set the requested image count from raw user input
    ///
    /// Values are clamped to [10,100]; unparsable input keeps the prior value.
    /// Returns the effective count.
    pub async fn set_requested_image_count(&self, input: &str) -> Result<ImageCount, WorkflowError> {
        let mut state = self.inner.state.lock().await;
        ensure_phase(&state, &[Phase::Idle, Phase::Previewing], "change the image count")?;
        let previous = state.session.requested_image_count;
        if ImageCount::parse(input).is_none() {
            debug!(input = %input, kept = previous.get(), "Ignoring invalid image count");
        }
        let count = ImageCount::parse_or(input, previous);
        state.session.requested_image_count = count;
        Ok(count)
    }

    /// Add user-selected files to the pending upload
    pub async fn stage_files(&self, files: Vec<StagedFile>) -> Result<usize, WorkflowError> {
        let mut state = self.inner.state.lock().await;
        ensure_editable(&state)?;
        state.staged.files.extend(files);
        Ok(state.staged.len())
    }

    /// Idle → Previewing via server-side image search
    pub async fn request_preview(&self) -> Result<Vec<String>, WorkflowError> {
        let (epoch, label, count) = {
            let mut state = self.inner.state.lock().await;
            ensure_phase(&state, &[Phase::Idle], "request a preview")?;
            let label = take_validated_label(&mut state)?;
            state.session.preview_images.clear();
            (begin_command(&mut state), label, state.session.requested_image_count)
        };

        let result = self.inner.staging.preview(&label, count).await;

        let mut state = self.finish_command(epoch).await?;
        match result {
            Ok(images) => {
                let message = format!("{} images found", images.len());
                self.enter_preview(&mut state, &label, images.clone(), message);
                Ok(images)
            }
            Err(e) => Err(self.command_failed(&mut state, "preview", e)),
        }
    }

    /// Idle → Previewing via user-provided files
    ///
    /// Staged files are kept when the upload fails.
    pub async fn upload_staged(&self) -> Result<UploadResult, WorkflowError> {
        let (epoch, label, files) = {
            let mut state = self.inner.state.lock().await;
            ensure_phase(&state, &[Phase::Idle], "upload images")?;
            let label = take_validated_label(&mut state)?;
            if state.staged.is_empty() {
                return Err(WorkflowError::NoFilesStaged);
            }
            (begin_command(&mut state), label, state.staged.clone())
        };

        let result = self.inner.staging.upload(&label, &files).await;

        let mut state = self.finish_command(epoch).await?;
        match result {
            Ok(result) => {
                state.staged.clear();
                let message = format!("{} images uploaded", result.count);
                self.enter_preview(&mut state, &label, result.images.clone(), message);
                Ok(result)
            }
            Err(e) => Err(self.command_failed(&mut state, "upload", e)),
        }
    }

    /// Previewing → Idle, discarding staged images
    pub async fn cancel_preview(&self) -> Result<(), WorkflowError> {
        let mut state = self.inner.state.lock().await;
        ensure_phase(&state, &[Phase::Previewing], "cancel the preview")?;
        self.transition(&mut state, Phase::Idle, String::new());
        Ok(())
    }

    /// Idle | Previewing → Starting, then start polling
    ///
    /// On any rejection the phase is left unchanged. An `already_trained`
    /// rejection is reported as [`WorkflowError::AlreadyTrained`].
    pub async fn confirm(&self) -> Result<(), WorkflowError> {
        let (epoch, label) = {
            let mut state = self.inner.state.lock().await;
            ensure_phase(&state, &[Phase::Idle, Phase::Previewing], "start training")?;
            let label = take_validated_label(&mut state)?;
            (begin_command(&mut state), label)
        };

        let started = self.inner.training.start_training(&label).await;

        let mut state = self.finish_command(epoch).await?;
        if let Err(e) = started {
            if e.is_already_trained() {
                let message = match &e {
                    TransportError::RejectedRequest { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                warn!(label = %label, "Start rejected: label already trained");
                state.notice = Some(Notice::AlreadyTrained {
                    label: label.clone(),
                    message: message.clone(),
                });
                return Err(WorkflowError::AlreadyTrained { label, message });
            }
            return Err(self.command_failed(&mut state, "start training", e));
        }

        self.stop_poller(&mut state);
        state.progress_seen = false;
        self.transition(&mut state, Phase::Starting, "Starting training...".to_string());
        state.poller = Some(self.spawn_poller(state.generation));
        Ok(())
    }

    /// Any phase → fresh Idle; stops polling if it was running
    ///
    /// Never waits on the backend. A command still in flight has its result
    /// dropped. Calling it repeatedly yields the same Idle session.
    pub async fn reset(&self) {
        let mut state = self.inner.state.lock().await;
        self.stop_poller(&mut state);
        state.epoch += 1;
        state.pending = false;
        let old_phase = state.session.phase;
        let label = std::mem::take(&mut state.session.label);

        state.session = TrainingSession::new(self.inner.default_image_count);
        state.staged.clear();
        state.notice = None;
        state.progress_seen = false;

        if old_phase != Phase::Idle {
            info!(label = %label, old_phase = ?old_phase, "Training session reset");
            self.inner.event_bus.emit_lossy(LeafyEvent::SessionPhaseChanged {
                label,
                old_phase,
                new_phase: Phase::Idle,
                message: String::new(),
                timestamp: Utc::now(),
            });
        }
    }

    /// Re-fetch the trained label set
    pub async fn refresh_labels(&self) -> Result<Vec<LabelEntry>, WorkflowError> {
        let labels = self.inner.label_registry.list_labels().await?;
        let mut state = self.inner.state.lock().await;
        state.labels = labels;
        self.inner.event_bus.emit_lossy(LeafyEvent::LabelsRefreshed {
            labels: state.labels.iter().map(|l| l.name.clone()).collect(),
            timestamp: Utc::now(),
        });
        Ok(state.labels.iter().cloned().collect())
    }

    /// Delete a label on the backend, then re-fetch the set
    pub async fn delete_label(&self, name: &str) -> Result<Vec<LabelEntry>, WorkflowError> {
        if let Err(e) = self.inner.label_registry.delete_label(name).await {
            let mut state = self.inner.state.lock().await;
            return Err(self.command_failed(&mut state, "delete label", e));
        }
        self.refresh_labels().await
    }

    /// Re-lock after a command's backend call
    ///
    /// Fails with `Superseded` when the session was reset meanwhile.
    async fn finish_command(&self, epoch: u64) -> Result<MutexGuard<'_, WorkflowState>, WorkflowError> {
        let mut state = self.inner.state.lock().await;
        if state.epoch != epoch {
            info!(epoch, current = state.epoch, "Dropping result of a command issued before reset");
            return Err(WorkflowError::Superseded);
        }
        state.pending = false;
        Ok(state)
    }

    fn spawn_poller(&self, generation: u64) -> StatusPoller {
        let weak: Weak<ControllerInner> = Arc::downgrade(&self.inner);
        StatusPoller::start(
            Arc::clone(&self.inner.status_source),
            self.inner.poll_interval,
            generation,
            move |generation, tick| {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        TrainingWorkflowController { inner }
                            .apply_status(generation, tick)
                            .await;
                    }
                }
            },
        )
    }

    /// Apply one poller tick
    ///
    /// Ticks from an older generation, or arriving after the session left the
    /// polling phases, are discarded.
    async fn apply_status(&self, generation: u64, tick: StatusTick) {
        let completed = {
            let mut state = self.inner.state.lock().await;
            if generation != state.generation || !state.session.phase.is_polling() {
                debug!(
                    generation,
                    current = state.generation,
                    phase = ?state.session.phase,
                    "Discarding stale status tick"
                );
                return;
            }

            let status = match tick {
                Ok(status) => status,
                Err(e) => {
                    warn!(error = %e, "Status poll failed, retrying on next tick");
                    self.inner.event_bus.emit_lossy(LeafyEvent::StatusPollFailed {
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    return;
                }
            };

            let message = status.message;
            match status.status {
                RemoteStatus::Idle if state.progress_seen => {
                    self.stop_poller(&mut state);
                    let reason = if message.is_empty() {
                        STOPPED_UNEXPECTEDLY.to_string()
                    } else {
                        format!("{}: {}", STOPPED_UNEXPECTEDLY, message)
                    };
                    self.fail(&mut state, reason);
                    None
                }
                RemoteStatus::Idle => {
                    debug!("Backend has not picked up the job yet");
                    None
                }
                RemoteStatus::Starting => {
                    self.transition(&mut state, Phase::Starting, message);
                    None
                }
                RemoteStatus::Downloading => {
                    self.progress(&mut state, Phase::Downloading, message);
                    None
                }
                RemoteStatus::Preparing => {
                    self.progress(&mut state, Phase::Preparing, message);
                    None
                }
                RemoteStatus::Training => {
                    self.progress(&mut state, Phase::TrainingRun, message);
                    None
                }
                RemoteStatus::Finalizing => {
                    self.progress(&mut state, Phase::Finalizing, message);
                    None
                }
                RemoteStatus::Completed => {
                    self.stop_poller(&mut state);
                    self.transition(&mut state, Phase::Completed, message);
                    Some((state.generation, state.session.label.clone()))
                }
                RemoteStatus::Error => {
                    self.stop_poller(&mut state);
                    let reason = if message.is_empty() {
                        "Training failed".to_string()
                    } else {
                        message
                    };
                    self.fail(&mut state, reason);
                    None
                }
            }
        };

        if let Some((generation, label)) = completed {
            self.announce_completion(generation, label).await;
        }
    }

    /// Refresh labels after a completed job, then emit `TrainingCompleted`
    ///
    /// Runs without the state lock; the event is skipped if the session was
    /// reset while the refresh was in flight.
    async fn announce_completion(&self, generation: u64, label: String) {
        if let Err(e) = self.refresh_labels().await {
            warn!(error = %e, "Label refresh after training failed");
        }
        let state = self.inner.state.lock().await;
        if state.generation == generation {
            self.inner.event_bus.emit_lossy(LeafyEvent::TrainingCompleted {
                label,
                timestamp: Utc::now(),
            });
        }
    }

    fn progress(&self, state: &mut WorkflowState, phase: Phase, message: String) {
        state.progress_seen = true;
        self.transition(state, phase, message);
    }

    fn fail(&self, state: &mut WorkflowState, reason: String) {
        self.transition(state, Phase::Errored, reason.clone());
        self.inner.event_bus.emit_lossy(LeafyEvent::TrainingFailed {
            label: state.session.label.clone(),
            reason,
            timestamp: Utc::now(),
        });
    }

    fn enter_preview(&self, state: &mut WorkflowState, label: &str, images: Vec<String>, message: String) {
        let image_count = images.len();
        self.transition(state, Phase::Previewing, message);
        state.session.preview_images = images;
        self.inner.event_bus.emit_lossy(LeafyEvent::PreviewReady {
            label: label.to_string(),
            image_count,
            timestamp: Utc::now(),
        });
    }

    /// Set phase and message, emitting the matching event
    ///
    /// Preview images only survive in `Previewing`.
    fn transition(&self, state: &mut WorkflowState, new_phase: Phase, message: String) {
        let old_phase = state.session.phase;
        state.session.phase = new_phase;
        state.session.status_message = message.clone();
        if new_phase != Phase::Previewing {
            state.session.preview_images.clear();
        }

        let label = state.session.label.clone();
        let event = if old_phase != new_phase {
            info!(label = %label, old_phase = ?old_phase, new_phase = ?new_phase, "Training session transition");
            LeafyEvent::SessionPhaseChanged {
                label,
                old_phase,
                new_phase,
                message,
                timestamp: Utc::now(),
            }
        } else {
            debug!(label = %label, phase = ?new_phase, message = %message, "Training status update");
            LeafyEvent::SessionStatusUpdated {
                label,
                phase: new_phase,
                message,
                timestamp: Utc::now(),
            }
        };
        self.inner.event_bus.emit_lossy(event);
    }

    fn stop_poller(&self, state: &mut WorkflowState) {
        if let Some(poller) = state.poller.take() {
            poller.stop();
        }
        state.generation += 1;
    }

    /// Record a failed command without changing phase
    fn command_failed(&self, state: &mut WorkflowState, action: &str, error: TransportError) -> WorkflowError {
        warn!(action, error = %error, phase = ?state.session.phase, "Workflow command failed");
        state.notice = Some(Notice::Failure(error.user_message()));
        WorkflowError::Transport(error)
    }
}

fn ensure_phase(state: &WorkflowState, allowed: &[Phase], action: &'static str) -> Result<(), WorkflowError> {
    let phase = state.session.phase;
    if state.pending {
        Err(WorkflowError::CommandPending)
    } else if allowed.contains(&phase) {
        Ok(())
    } else {
        Err(WorkflowError::IllegalTransition { phase, action })
    }
}

fn ensure_editable(state: &WorkflowState) -> Result<(), WorkflowError> {
    let phase = state.session.phase;
    if state.pending {
        Err(WorkflowError::CommandPending)
    } else if phase.is_editable() {
        Ok(())
    } else {
        Err(WorkflowError::SessionLocked { phase })
    }
}

/// Mark a backend-bound command as in flight and return the current epoch
fn begin_command(state: &mut WorkflowState) -> u64 {
    state.pending = true;
    state.epoch
}

/// Trim the label in place and return it; blank labels never reach the network
fn take_validated_label(state: &mut WorkflowState) -> Result<String, WorkflowError> {
    let label = state
        .session
        .validated_label()
        .map(str::to_string)
        .ok_or(WorkflowError::InvalidLabel)?;
    state.session.label = label.clone();
    state.notice = None;
    Ok(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use leafy_common::api::TrainingStatus;
    use leafy_common::config::parse_backend_url;

    fn offline_controller() -> TrainingWorkflowController {
        // Port 9 (discard) is never served in the test environment
        let config = ClientConfig::for_backend(parse_backend_url("http://127.0.0.1:9").unwrap());
        let transport = Transport::new(&config).unwrap();
        TrainingWorkflowController::new(transport, &config, EventBus::new(32))
    }

    async fn force_phase(controller: &TrainingWorkflowController, phase: Phase, generation: u64) {
        let mut state = controller.inner.state.lock().await;
        state.session.label = "mango".to_string();
        state.session.phase = phase;
        state.generation = generation;
    }

    fn status(status: RemoteStatus, message: &str) -> StatusTick {
        Ok(TrainingStatus {
            status,
            message: message.to_string(),
        })
    }

    #[tokio::test]
    async fn test_stale_generation_tick_is_discarded() {
        let controller = offline_controller();
        force_phase(&controller, Phase::Downloading, 5).await;

        controller
            .apply_status(4, status(RemoteStatus::Training, "epoch 3"))
            .await;

        let session = controller.session().await;
        assert_eq!(session.phase, Phase::Downloading);
    }

    #[tokio::test]
    async fn test_tick_after_reset_does_not_resurrect_session() {
        let controller = offline_controller();
        force_phase(&controller, Phase::TrainingRun, 2).await;
        controller.reset().await;

        controller
            .apply_status(2, status(RemoteStatus::Finalizing, "saving"))
            .await;

        let session = controller.session().await;
        assert_eq!(session.phase, Phase::Idle);
        assert!(session.label.is_empty());
    }

    #[tokio::test]
    async fn test_progress_ticks_move_through_phases() {
        let controller = offline_controller();
        force_phase(&controller, Phase::Starting, 1).await;

        for (remote, phase) in [
            (RemoteStatus::Downloading, Phase::Downloading),
            (RemoteStatus::Preparing, Phase::Preparing),
            (RemoteStatus::Training, Phase::TrainingRun),
            (RemoteStatus::Finalizing, Phase::Finalizing),
        ] {
            controller.apply_status(1, status(remote, remote.as_str())).await;
            let session = controller.session().await;
            assert_eq!(session.phase, phase);
            assert_eq!(session.status_message, remote.as_str());
        }
    }

    #[tokio::test]
    async fn test_error_tick_is_terminal_and_keeps_reason() {
        let controller = offline_controller();
        force_phase(&controller, Phase::Preparing, 1).await;
        let mut events = controller.subscribe();

        controller
            .apply_status(1, status(RemoteStatus::Error, "No images downloaded"))
            .await;

        let session = controller.session().await;
        assert_eq!(session.phase, Phase::Errored);
        assert_eq!(session.status_message, "No images downloaded");

        // Later ticks are ignored once terminal
        controller.apply_status(1, status(RemoteStatus::Training, "")).await;
        assert_eq!(controller.session().await.phase, Phase::Errored);

        let mut saw_failed = false;
        while let Ok(event) = events.try_recv() {
            if let LeafyEvent::TrainingFailed { reason, .. } = event {
                assert_eq!(reason, "No images downloaded");
                saw_failed = true;
            }
        }
        assert!(saw_failed);
    }

    #[tokio::test]
    async fn test_poll_network_error_keeps_session_active() {
        let controller = offline_controller();
        force_phase(&controller, Phase::TrainingRun, 1).await;

        controller
            .apply_status(
                1,
                Err(TransportError::NetworkUnreachable("connection reset".to_string())),
            )
            .await;

        assert_eq!(controller.session().await.phase, Phase::TrainingRun);
    }

    #[tokio::test]
    async fn test_idle_before_progress_is_ignored_after_progress_is_error() {
        let controller = offline_controller();
        force_phase(&controller, Phase::Starting, 1).await;

        controller.apply_status(1, status(RemoteStatus::Idle, "")).await;
        assert_eq!(controller.session().await.phase, Phase::Starting);

        controller.apply_status(1, status(RemoteStatus::Downloading, "")).await;
        controller.apply_status(1, status(RemoteStatus::Idle, "")).await;

        let session = controller.session().await;
        assert_eq!(session.phase, Phase::Errored);
        assert_eq!(session.status_message, STOPPED_UNEXPECTEDLY);
    }

    #[tokio::test]
    async fn test_blank_label_never_reaches_network() {
        let controller = offline_controller();
        controller.set_label("   ").await.unwrap();

        assert_eq!(controller.request_preview().await, Err(WorkflowError::InvalidLabel));
        assert_eq!(controller.confirm().await, Err(WorkflowError::InvalidLabel));
        assert_eq!(controller.session().await.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_label_locked_outside_idle() {
        let controller = offline_controller();
        force_phase(&controller, Phase::Previewing, 0).await;

        assert_eq!(
            controller.set_label("pine").await,
            Err(WorkflowError::SessionLocked {
                phase: Phase::Previewing
            })
        );
        assert_eq!(controller.session().await.label, "mango");
    }

    #[tokio::test]
    async fn test_image_count_input_is_clamped_or_kept() {
        let controller = offline_controller();

        assert_eq!(controller.set_requested_image_count("30").await.unwrap().get(), 30);
        assert_eq!(controller.set_requested_image_count("oops").await.unwrap().get(), 30);
        assert_eq!(controller.set_requested_image_count("5").await.unwrap().get(), 10);
        assert_eq!(controller.set_requested_image_count("250").await.unwrap().get(), 100);
    }

    #[tokio::test]
    async fn test_upload_without_files_is_rejected_locally() {
        let controller = offline_controller();
        controller.set_label("mango").await.unwrap();

        assert_eq!(controller.upload_staged().await, Err(WorkflowError::NoFilesStaged));
        assert_eq!(controller.session().await.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_connection_failure_keeps_pre_call_phase() {
        let controller = offline_controller();
        controller.set_label("mango").await.unwrap();

        let err = controller.request_preview().await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Transport(TransportError::NetworkUnreachable(_))
        ));

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.session.phase, Phase::Idle);
        assert_eq!(
            snapshot.notice,
            Some(Notice::Failure("Failed to connect to the server.".to_string()))
        );
    }

    #[tokio::test]
    async fn test_commands_rejected_in_wrong_phase() {
        let controller = offline_controller();
        assert!(matches!(
            controller.cancel_preview().await,
            Err(WorkflowError::IllegalTransition {
                phase: Phase::Idle,
                ..
            })
        ));

        force_phase(&controller, Phase::Downloading, 1).await;
        assert!(matches!(
            controller.confirm().await,
            Err(WorkflowError::IllegalTransition {
                phase: Phase::Downloading,
                ..
            })
        ));
        assert!(matches!(
            controller.request_preview().await,
            Err(WorkflowError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_pending_command_blocks_edits_until_reset() {
        let controller = offline_controller();
        controller.set_label("mango").await.unwrap();
        controller.inner.state.lock().await.pending = true;

        assert_eq!(controller.set_label("pine").await, Err(WorkflowError::CommandPending));
        assert_eq!(controller.request_preview().await, Err(WorkflowError::CommandPending));
        assert_eq!(controller.confirm().await, Err(WorkflowError::CommandPending));
        assert!(controller.snapshot().await.command_pending);

        controller.reset().await;
        assert!(!controller.snapshot().await.command_pending);
        controller.set_label("pine").await.unwrap();
    }

    #[tokio::test]
    async fn test_result_after_reset_is_superseded() {
        let controller = offline_controller();
        let epoch = {
            let mut state = controller.inner.state.lock().await;
            begin_command(&mut state)
        };
        controller.reset().await;

        assert!(matches!(
            controller.finish_command(epoch).await,
            Err(WorkflowError::Superseded)
        ));
    }

    #[test]
    fn test_zero_poll_interval_is_raised_to_minimum() {
        let mut config = ClientConfig::for_backend(parse_backend_url("http://127.0.0.1:9").unwrap());
        config.poll_interval = Duration::ZERO;
        let controller =
            TrainingWorkflowController::new(Transport::new(&config).unwrap(), &config, EventBus::new(8));

        assert_eq!(
            controller.inner.poll_interval,
            Duration::from_millis(MIN_POLL_INTERVAL_MS)
        );
    }
}
