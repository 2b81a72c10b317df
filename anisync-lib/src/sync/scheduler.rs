//! Periodic session trigger.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::engine::{SyncEngine, SyncRequest};
use super::events::SyncReason;

/// Running scheduler. Dropping the handle also stops it, without waiting.
#[derive(Debug)]
pub struct SchedulerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the scheduler, cancelling a session it started, and wait for
    /// it to exit.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = self.task.await {
            log::warn!("Sync scheduler exited abnormally: {}", e);
        }
    }
}

impl SyncEngine {
    /// Request a `periodic` session now and then every `interval`, or after
    /// the backoff delay when the last session failed.
    pub fn spawn_scheduler(&self, interval: Duration) -> SchedulerHandle {
        let engine = self.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            log::debug!("Sync scheduler started (interval {:?})", interval);
            loop {
                let request = log_request(engine.request_sync(SyncReason::Periodic));
                if let SyncRequest::Started(session) = request {
                    tokio::pin!(session);
                    tokio::select! {
                        _ = &mut session => {}
                        _ = &mut stop_rx => {
                            engine.cancel();
                            let _ = session.await;
                            break;
                        }
                    }
                }

                let delay = engine.next_attempt_in().unwrap_or(interval);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = &mut stop_rx => break,
                }
            }
            log::debug!("Sync scheduler stopped");
        });
        SchedulerHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

fn log_request(request: SyncRequest) -> SyncRequest {
    match &request {
        SyncRequest::Started(_) => {}
        SyncRequest::Deferred { remaining } => {
            log::debug!("Periodic sync deferred by backoff ({:?} left)", remaining)
        }
        other => log::debug!("Periodic sync skipped: {:?}", other),
    }
    request
}
