//! Buffered analytics ingestion.
//!
//! Events are held in memory and sent in one batch when the sync engine
//! finishes a session or the process shuts down. The buffer is bounded;
//! when full, the oldest events are dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anisync_client::{AnalyticsEvent, AnalyticsSink, ApiError};

pub const DEFAULT_CAPACITY: usize = 500;

struct Buffer {
    /// Events tagged with a sequence number, oldest first.
    events: VecDeque<(u64, AnalyticsEvent)>,
    next_seq: u64,
}

pub struct AnalyticsBatcher {
    sink: Arc<dyn AnalyticsSink>,
    buffer: Mutex<Buffer>,
    capacity: usize,
    dropped: AtomicU64,
    flush_lock: tokio::sync::Mutex<()>,
}

impl AnalyticsBatcher {
    pub fn new(sink: Arc<dyn AnalyticsSink>) -> Self {
        Self::with_capacity(sink, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(sink: Arc<dyn AnalyticsSink>, capacity: usize) -> Self {
        Self {
            sink,
            buffer: Mutex::new(Buffer {
                events: VecDeque::new(),
                next_seq: 0,
            }),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
            flush_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        // The buffer holds no invariants a panicking writer could break.
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an event, dropping the oldest if the buffer is full.
    pub fn record(&self, event: AnalyticsEvent) {
        let mut buffer = self.lock();
        if buffer.events.len() >= self.capacity {
            buffer.events.pop_front();
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if total == 1 || total % 100 == 0 {
                log::warn!("Analytics buffer full, {} event(s) dropped so far", total);
            }
        }
        let seq = buffer.next_seq;
        buffer.next_seq += 1;
        buffer.events.push_back((seq, event));
    }

    /// Number of buffered events.
    pub fn pending(&self) -> usize {
        self.lock().events.len()
    }

    /// Events discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Send everything buffered right now. Returns the number acknowledged.
    ///
    /// Events are only removed after the sink acknowledges them. Anything
    /// recorded while the upload is in flight stays buffered for the next
    /// flush. Concurrent flushes are serialized.
    pub async fn flush(&self) -> Result<usize, ApiError> {
        let _guard = self.flush_lock.lock().await;

        let (batch, last_seq) = {
            let buffer = self.lock();
            let Some((last_seq, _)) = buffer.events.back() else {
                return Ok(0);
            };
            let batch: Vec<AnalyticsEvent> =
                buffer.events.iter().map(|(_, e)| e.clone()).collect();
            (batch, *last_seq)
        };

        if let Err(e) = self.sink.send_events(&batch).await {
            log::debug!("Analytics flush of {} event(s) failed: {}", batch.len(), e);
            return Err(e);
        }

        let mut buffer = self.lock();
        while buffer.events.front().is_some_and(|(seq, _)| *seq <= last_seq) {
            buffer.events.pop_front();
        }
        log::debug!("Flushed {} analytics event(s)", batch.len());
        Ok(batch.len())
    }
}

#[cfg(test)]
#[path = "tests/analytics_tests.rs"]
mod tests;
