// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Checkpoint Scheduler
//!
//! Write transactions against the embedded database commit with
//! `Durability::None`: they are visible to readers immediately but live in
//! memory until a later durable commit. This module decides when that
//! durable commit (a *checkpoint*) happens.
//!
//! ## Dirty flag
//!
//! [`CheckpointState`] holds a single process-wide "pending write" flag.
//! Every successful repository write calls [`CheckpointState::mark_dirty`];
//! reads never touch it. It is a boolean, not a counter: the scheduler only
//! needs to know that *something* was written since the last checkpoint.
//!
//! ## Loop
//!
//! ```text
//! Idle --(interval)--> CheckDirty --[dirty]--> Flushing --> Idle
//!                                 \-[clean]-----------------> Idle
//! Idle --(shutdown)--> FinalFlush (unconditional) --> Stopped
//! ```
//!
//! The dirty flag is swapped to `false` *before* flushing, so a write that
//! lands while the flush is running re-arms it for the next tick. A failed
//! flush re-arms it as well.
//!
//! ## Shutdown
//!
//! Stopped through a `tokio_util::sync::CancellationToken`. A flush in
//! progress is never interrupted; the token is only observed between ticks.
//!
//! Flushes fsync, so [`CheckpointScheduler::run`] performs them on the
//! blocking thread pool and awaits the result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::database::StoreResult;

/// Default interval between checkpoint ticks.
pub const DEFAULT_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(5);

// =============================================================================
// Dirty Notifier
// =============================================================================

/// Process-wide checkpoint state: the dirty flag plus the time of the last
/// successful checkpoint.
#[derive(Debug, Default)]
pub struct CheckpointState {
    dirty: AtomicBool,
    last_checkpoint_at: RwLock<Option<DateTime<Utc>>>,
}

impl CheckpointState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that at least one write happened since the last checkpoint.
    ///
    /// Safe to call from any number of threads concurrently.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Whether unflushed writes may exist.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the flag and return its previous value.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn record_checkpoint(&self, at: DateTime<Utc>) {
        if let Ok(mut last) = self.last_checkpoint_at.write() {
            *last = Some(at);
        }
    }

    pub fn last_checkpoint_at(&self) -> Option<DateTime<Utc>> {
        self.last_checkpoint_at.read().ok().and_then(|last| *last)
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Something whose buffered writes can be made durable.
pub trait Checkpoint: Send + Sync {
    /// Persist every buffered write. Must be safe to call when nothing is
    /// buffered.
    fn flush(&self) -> StoreResult<()>;
}

/// Result of a single scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing written since the last checkpoint; no flush attempted.
    Clean,
    /// Buffered writes were flushed.
    Flushed,
    /// The flush failed; the dirty flag stays set so the next tick retries.
    Failed,
}

/// Background loop that checkpoints the store on a fixed interval.
#[derive(Clone)]
pub struct CheckpointScheduler {
    target: Arc<dyn Checkpoint>,
    state: Arc<CheckpointState>,
    interval: Duration,
}

impl CheckpointScheduler {
    pub fn new(target: Arc<dyn Checkpoint>, state: Arc<CheckpointState>) -> Self {
        Self {
            target,
            state,
            interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the scheduler until the cancellation token is triggered, then
    /// perform the final flush and return.
    ///
    /// Should be spawned as a background task and awaited during shutdown:
    /// ```rust,ignore
    /// let handle = tokio::spawn(scheduler.run(shutdown.clone()));
    /// // ... server drains ...
    /// shutdown.cancel();
    /// handle.await?;
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            "Checkpoint scheduler starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    let scheduler = self.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || scheduler.tick()).await {
                        error!(error = %e, "Checkpoint tick task failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    let scheduler = self.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || scheduler.final_flush()).await {
                        error!(severity = "critical", error = %e, "Final checkpoint task failed");
                    }
                    info!("Checkpoint scheduler stopped");
                    return;
                }
            }
        }
    }

    /// Execute one tick: flush only if something was written.
    pub fn tick(&self) -> TickOutcome {
        if !self.state.take_dirty() {
            return TickOutcome::Clean;
        }

        match self.target.flush() {
            Ok(()) => {
                let now = Utc::now();
                self.state.record_checkpoint(now);
                debug!(checkpoint_at = %now, "Checkpoint flushed");
                TickOutcome::Flushed
            }
            Err(e) => {
                self.state.mark_dirty();
                error!(error = %e, "Checkpoint flush failed, will retry on next tick");
                TickOutcome::Failed
            }
        }
    }

    /// Unconditional flush performed once on shutdown.
    ///
    /// Returns `false` if the flush failed. Failure is logged at critical
    /// severity and otherwise swallowed: there is nothing left to retry with.
    pub fn final_flush(&self) -> bool {
        let was_dirty = self.state.take_dirty();

        match self.target.flush() {
            Ok(()) => {
                self.state.record_checkpoint(Utc::now());
                info!(was_dirty, "Final checkpoint flushed");
                true
            }
            Err(e) => {
                self.state.mark_dirty();
                error!(
                    severity = "critical",
                    was_dirty,
                    error = %e,
                    "Final checkpoint flush failed; buffered writes may be lost"
                );
                false
            }
        }
    }
}
