//! Cancellable repeating training-status reader
//!
//! Ticks run on a wall-clock interval. A tick is skipped while the previous
//! status read is still in flight, so a slow response never stacks requests.
//! Every tick result is tagged with the poller's generation; the receiver
//! uses it to drop results from a superseded session.

use crate::error::TransportError;
use crate::services::StatusSource;
use leafy_common::api::TrainingStatus;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shortest accepted tick spacing
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// Result delivered to the tick handler
pub type StatusTick = Result<TrainingStatus, TransportError>;

/// Handle to a running poller
///
/// Dropping the handle stops the poller.
pub struct StatusPoller {
    generation: u64,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl StatusPoller {
    /// Start polling `source` every `interval`
    ///
    /// The first read happens immediately. `on_tick` receives the generation
    /// this poller was started with and the read result. Intervals shorter
    /// than [`MIN_TICK`] are raised to it.
    pub fn start<F, Fut>(
        source: Arc<dyn StatusSource>,
        interval: Duration,
        generation: u64,
        on_tick: F,
    ) -> Self
    where
        F: Fn(u64, StatusTick) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let on_tick = Arc::new(on_tick);
        let interval = interval.max(MIN_TICK);

        info!(generation, interval_ms = interval.as_millis() as u64, "Starting status poller");

        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut in_flight: Option<JoinHandle<()>> = None;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = timer.tick() => {
                        if in_flight.as_ref().is_some_and(|read| !read.is_finished()) {
                            debug!(generation, "Previous status read still pending, skipping tick");
                            continue;
                        }

                        let source = Arc::clone(&source);
                        let on_tick = Arc::clone(&on_tick);
                        let token = token.clone();
                        in_flight = Some(tokio::spawn(async move {
                            let result = tokio::select! {
                                _ = token.cancelled() => return,
                                result = source.fetch_status() => result,
                            };
                            if token.is_cancelled() {
                                return;
                            }
                            on_tick(generation, result).await;
                        }));
                    }
                }
            }

            debug!(generation, "Status poller stopped");
        });

        Self {
            generation,
            cancel_token,
            handle,
        }
    }

    /// Stop future ticks; safe to call any number of times
    ///
    /// A read already handed to `on_tick` is allowed to finish.
    pub fn stop(&self) {
        if !self.cancel_token.is_cancelled() {
            debug!(generation = self.generation, "Stopping status poller");
            self.cancel_token.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancel_token.is_cancelled() && !self.handle.is_finished()
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
