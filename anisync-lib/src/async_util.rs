//! Driving a task while consuming its event channel.
//!
//! Frontends run a sync session (or any other library operation) and render
//! its notifications as they arrive, without juggling `select!` themselves.

use std::future::Future;

use tokio::sync::{broadcast, mpsc};

/// Abstraction over the channel flavors library operations report on.
#[allow(async_fn_in_trait)]
pub trait EventReceiver<E> {
    /// Receive the next event, returning `None` when the channel is closed.
    async fn recv(&mut self) -> Option<E>;

    /// Take an already-queued event without waiting.
    fn try_recv(&mut self) -> Option<E>;
}

impl<E> EventReceiver<E> for mpsc::UnboundedReceiver<E> {
    async fn recv(&mut self) -> Option<E> {
        mpsc::UnboundedReceiver::recv(self).await
    }

    fn try_recv(&mut self) -> Option<E> {
        mpsc::UnboundedReceiver::try_recv(self).ok()
    }
}

/// Lagged receivers skip what they missed and keep going.
impl<E: Clone> EventReceiver<E> for broadcast::Receiver<E> {
    async fn recv(&mut self) -> Option<E> {
        loop {
            match broadcast::Receiver::recv(self).await {
                Ok(e) => return Some(e),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::debug!("run_with_events: receiver lagged, {} event(s) skipped", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn try_recv(&mut self) -> Option<E> {
        loop {
            match broadcast::Receiver::try_recv(self) {
                Ok(e) => return Some(e),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Run `task` to completion, calling `on_event` for each event received on
/// `event_rx`, then deliver whatever was already queued when it finished.
///
/// The receiver must be subscribed before the task starts, or early events
/// are missed.
pub async fn run_with_events<F, E, R, Rx>(
    task: F,
    mut event_rx: Rx,
    mut on_event: impl FnMut(E),
) -> R
where
    F: Future<Output = R>,
    Rx: EventReceiver<E> + Unpin,
{
    tokio::pin!(task);
    let mut event_count: u64 = 0;
    let mut channel_open = true;

    let result = loop {
        tokio::select! {
            r = &mut task => break r,
            event = event_rx.recv(), if channel_open => match event {
                Some(e) => {
                    event_count += 1;
                    on_event(e);
                }
                None => {
                    log::debug!(
                        "run_with_events: channel closed before task finished ({} events)",
                        event_count,
                    );
                    channel_open = false;
                }
            },
        }
    };

    // Senders may outlive the task (broadcast), so only take what is queued.
    let mut drained: u64 = 0;
    while let Some(e) = event_rx.try_recv() {
        drained += 1;
        on_event(e);
    }
    log::debug!(
        "run_with_events: task completed ({} events, {} drained after)",
        event_count + drained,
        drained
    );
    result
}
