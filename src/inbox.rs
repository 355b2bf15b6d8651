//! Per-sender inbox buffering: debounce, coalescing, and load-aware pacing.
//!
//! Chat messages arrive as rapid fragments; replying per-fragment is jarring
//! and multiplies model calls. Each sender gets one buffer and at most one
//! live debounce timer. A quiet period drains the buffer atomically into a
//! single combined batch, which is processed after an artificial delay scaled
//! by how many senders are being served at once.

use crate::SenderMeta;
use crate::config::InboxConfig;
use crate::error::Result;
use crate::security;
use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Last-ditch reply when a cycle fails after the shield (or before reaching
/// it). The sender must never be left without an answer.
const EMERGENCY_APOLOGY: &str = "Disculpa, tuve un lapso. ¿Podrías repetirme eso? ✨";

/// One sender's coalesced burst, drained exactly once.
#[derive(Debug, Clone)]
pub struct DrainedBatch {
    pub sender: String,
    /// Pending fragments joined in arrival order.
    pub text: String,
    pub message_count: usize,
    pub meta: SenderMeta,
}

/// Downstream consumer of drained batches (the agent pipeline in
/// production).
#[async_trait]
pub trait BatchHandler: Send + Sync {
    async fn handle_batch(&self, batch: &DrainedBatch) -> Result<()>;
}

struct SenderBuffer {
    pending: Vec<String>,
    meta: SenderMeta,
    /// Bumped on every append; a debounce timer only fires if it still
    /// carries the latest generation.
    generation: u64,
    debounce_task: Option<JoinHandle<()>>,
    last_activity: Instant,
}

#[derive(Default)]
struct InboxState {
    buffers: HashMap<String, SenderBuffer>,
    /// Senders currently between drain and reply.
    active_cycles: usize,
}

struct Inner {
    state: Mutex<InboxState>,
    config: InboxConfig,
    handler: Arc<dyn BatchHandler>,
    transport: Arc<dyn Transport>,
}

impl Inner {
    /// The state mutex is only ever held for short synchronous sections,
    /// never across an await. A poisoned lock just means a task panicked
    /// mid-section; the state itself stays usable.
    fn lock_state(&self) -> MutexGuard<'_, InboxState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sole owner of all sender buffers and the active-cycle counter.
#[derive(Clone)]
pub struct InboxManager {
    inner: Arc<Inner>,
}

impl InboxManager {
    pub fn new(
        config: InboxConfig,
        handler: Arc<dyn BatchHandler>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(InboxState::default()),
                config,
                handler,
                transport,
            }),
        }
    }

    /// Fold a message into the sender's buffer and (re)arm its debounce
    /// timer. Injection attempts are dropped before any buffer is touched.
    pub fn add_message(&self, sender: &str, text: &str, meta: SenderMeta) {
        if security::is_injection_attempt(text) {
            tracing::warn!(
                sender = %sender,
                "security event: injection phrase detected, message dropped"
            );
            return;
        }

        let mut state = self.inner.lock_state();
        let entry = state
            .buffers
            .entry(sender.to_string())
            .or_insert_with(|| SenderBuffer {
                pending: Vec::new(),
                meta: SenderMeta::new(),
                generation: 0,
                debounce_task: None,
                last_activity: Instant::now(),
            });

        let idle_ms = entry.last_activity.elapsed().as_millis() as u64;
        entry.pending.push(text.to_string());
        entry.meta.extend(meta);
        entry.last_activity = Instant::now();
        entry.generation += 1;

        // Restart the countdown: the previous timer is cancelled and a new
        // one armed with the buffer's latest generation.
        if let Some(task) = entry.debounce_task.take() {
            task.abort();
        }
        entry.debounce_task = Some(tokio::spawn(run_debounce(
            self.inner.clone(),
            sender.to_string(),
            entry.generation,
        )));

        tracing::info!(
            sender = %sender,
            queued = entry.pending.len(),
            idle_ms,
            "message buffered"
        );
    }

    /// Number of senders currently between drain and reply.
    pub fn active_cycles(&self) -> usize {
        self.inner.lock_state().active_cycles
    }

    /// Number of senders with a buffered, not-yet-drained burst.
    pub fn buffered_senders(&self) -> usize {
        self.inner.lock_state().buffers.len()
    }
}

/// Decrements the active-cycle counter exactly once when dropped, including
/// on unwind. Only created after a real drain.
struct CycleSlot {
    inner: Arc<Inner>,
}

impl Drop for CycleSlot {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        state.active_cycles = state.active_cycles.saturating_sub(1);
    }
}

async fn run_debounce(inner: Arc<Inner>, sender: String, generation: u64) {
    tokio::time::sleep(inner.config.debounce).await;

    // Atomic pop-and-clear: one lock acquisition decides whether this timer
    // is still current and, if so, removes the buffer and claims a cycle
    // slot. A timer superseded by a newer message exits here without
    // touching the counter. Past this block the task's handle is gone from
    // the map, so it can no longer be cancelled.
    let drained = {
        let mut state = inner.lock_state();
        let current = state
            .buffers
            .get(&sender)
            .is_some_and(|buffer| buffer.generation == generation);
        if !current {
            None
        } else {
            match state.buffers.remove(&sender) {
                // A racing cycle already drained this burst.
                Some(buffer) if buffer.pending.is_empty() => None,
                Some(buffer) => {
                    state.active_cycles += 1;
                    let load = u32::try_from(state.active_cycles).unwrap_or(u32::MAX);
                    let delay = inner.config.base_delay + inner.config.load_factor * load;
                    Some((buffer, delay))
                }
                None => None,
            }
        }
    };

    let Some((buffer, delay)) = drained else {
        return;
    };
    let slot = CycleSlot {
        inner: inner.clone(),
    };

    let batch = DrainedBatch {
        sender: sender.clone(),
        text: buffer.pending.join("\n"),
        message_count: buffer.pending.len(),
        meta: buffer.meta,
    };

    let cycle_id = uuid::Uuid::new_v4();
    tracing::info!(
        sender = %sender,
        cycle_id = %cycle_id,
        messages = batch.message_count,
        delay_ms = delay.as_millis() as u64,
        "burst drained, pacing reply"
    );

    // Humanlike pacing doubling as crude backpressure under load.
    tokio::time::sleep(delay).await;

    if let Err(error) = inner.handler.handle_batch(&batch).await {
        tracing::error!(sender = %sender, cycle_id = %cycle_id, %error, "batch processing failed");
        if let Err(send_error) = inner.transport.send_text(&sender, EMERGENCY_APOLOGY).await {
            tracing::error!(sender = %sender, %send_error, "emergency apology delivery failed");
        }
    }

    drop(slot);
}
