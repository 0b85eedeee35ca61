//! In-memory batching between the ingestion endpoint and the event store.
//!
//! Accepted events are queued and written in batches by a background task
//! on a fixed interval. A failed write puts the batch back at the head of the
//! queue, in its original order, so it is retried on the next tick ahead of
//! anything that arrived meanwhile. The queue is unbounded: if the store
//! stays down, memory grows until it comes back.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use event_store::{Event, EventWriter, StoreError};
use metrics::{counter, gauge, histogram};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Default)]
struct BufferState {
    queue: VecDeque<Event>,
    seen_ids: HashSet<String>,
}

pub struct BatchBuffer {
    writer: Arc<dyn EventWriter>,
    batch_size: usize,
    interval: Duration,
    dedup_window_max: usize,
    state: Mutex<BufferState>,
}

impl BatchBuffer {
    pub fn new(
        writer: Arc<dyn EventWriter>,
        batch_size: usize,
        interval: Duration,
        dedup_window_max: usize,
    ) -> Self {
        Self {
            writer,
            batch_size: batch_size.max(1),
            interval,
            dedup_window_max,
            state: Mutex::new(BufferState::default()),
        }
    }

    // The state is only ever mutated under short, non-panicking critical
    // sections, so a poisoned lock still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues an event, returning false if its id was already seen.
    ///
    /// Events without an id are never deduplicated. Once more than
    /// `dedup_window_max` ids are remembered the whole window is forgotten,
    /// so a replay arriving after the reset is accepted again.
    pub fn add(&self, event: Event) -> bool {
        let event_id = event.event_id.clone().filter(|id| !id.is_empty());
        let mut state = self.lock();

        if let Some(event_id) = event_id {
            if state.seen_ids.contains(&event_id) {
                counter!("ingest_events_deduplicated_total").increment(1);
                return false;
            }
            state.seen_ids.insert(event_id);
            if state.seen_ids.len() > self.dedup_window_max {
                debug!(
                    remembered = state.seen_ids.len(),
                    "dedup window full, resetting"
                );
                state.seen_ids.clear();
            }
        }

        state.queue.push_back(event);
        counter!("ingest_events_queued_total").increment(1);
        gauge!("ingest_buffer_depth").set(state.queue.len() as f64);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes up to `batch_size` events from the head of the queue.
    ///
    /// Returns the number of events written. On failure the batch is
    /// requeued ahead of newer events and the error is returned.
    pub async fn flush(&self) -> Result<usize, StoreError> {
        let batch: Vec<Event> = {
            let mut state = self.lock();
            let take = self.batch_size.min(state.queue.len());
            let batch = state.queue.drain(..take).collect();
            batch
        };
        if batch.is_empty() {
            return Ok(0);
        }

        match self.writer.insert_batch(&batch).await {
            Ok(()) => {
                counter!("ingest_events_flushed_total").increment(batch.len() as u64);
                histogram!("ingest_flush_batch_size").record(batch.len() as f64);
                gauge!("ingest_buffer_depth").set(self.len() as f64);
                debug!(events = batch.len(), "flushed batch");
                Ok(batch.len())
            }
            Err(err) => {
                counter!("ingest_flush_errors_total").increment(1);
                error!(events = batch.len(), "failed to flush batch: {}", err);

                let mut state = self.lock();
                for event in batch.into_iter().rev() {
                    state.queue.push_front(event);
                }
                gauge!("ingest_buffer_depth").set(state.queue.len() as f64);
                Err(err)
            }
        }
    }

    /// Flushes one batch per interval until `cancel` fires. Errors are
    /// logged by [`BatchBuffer::flush`] and the batch is retried on the next
    /// tick.
    ///
    /// Cancellation is only observed between flushes: a write in progress
    /// completes, or requeues its batch, before the task returns.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            if self.flush().await.is_ok() {
                gauge!("ingest_last_flush_timestamp_seconds")
                    .set(common_metrics::get_current_timestamp_seconds());
            }
        }
    }

    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.clone().run(cancel))
    }

    /// Best-effort flush of everything still queued, used on shutdown.
    /// Stops at the first failed write and returns how many events were
    /// written.
    pub async fn drain(&self) -> usize {
        let mut written = 0;
        while !self.is_empty() {
            match self.flush().await {
                Ok(count) => written += count,
                Err(_) => break,
            }
        }
        if !self.is_empty() {
            error!(
                remaining = self.len(),
                "dropping events that could not be flushed on shutdown"
            );
        }
        info!(written, "drained event buffer");
        written
    }
}
