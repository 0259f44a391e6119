//! Time-bounded snapshot cache.
//!
//! Holds the latest parsed snapshot and when it was captured. It is the
//! only place a capture is triggered: callers ask for a snapshot and the
//! cache decides whether the one it has is still fresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::bridge::{BridgeError, DeviceBridge};
use crate::parser::parse_hierarchy;
use crate::snapshot::Snapshot;

/// Source of the current time.
///
/// The default reads tokio's clock, which tests can pause and advance.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry {
    snapshot: Arc<Snapshot>,
    captured: Instant,
}

pub struct SnapshotCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entry: Option<Entry>,
    captures: u64,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(TokioClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entry: None,
            captures: 0,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of captures performed so far.
    pub fn capture_count(&self) -> u64 {
        self.captures
    }

    /// The cached snapshot, fresh or not.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.entry.as_ref().map(|e| e.snapshot.clone())
    }

    /// True when a snapshot exists and is no older than the TTL.
    pub fn is_fresh(&self) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|e| self.clock.now().duration_since(e.captured) <= self.ttl)
    }

    /// Forget the cached snapshot so the next `get` recaptures.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Return the cached snapshot, capturing a new one when there is none,
    /// `force_refresh` is set, or the cached one is older than the TTL.
    pub async fn get<B>(&mut self, bridge: &B, force_refresh: bool) -> Result<Arc<Snapshot>, BridgeError>
    where
        B: DeviceBridge + ?Sized,
    {
        if !force_refresh && self.is_fresh() {
            if let Some(entry) = &self.entry {
                return Ok(entry.snapshot.clone());
            }
        }

        let raw = bridge.capture_hierarchy().await?;
        self.captures += 1;
        let snapshot = Arc::new(parse_hierarchy(&raw));
        debug!(
            "Captured snapshot {} ({} nodes, capture #{})",
            snapshot.snapshot_id(),
            snapshot.len(),
            self.captures
        );
        Ok(self.store(snapshot))
    }

    /// Replace the cached snapshot, stamping it with the current time.
    pub fn store(&mut self, snapshot: Arc<Snapshot>) -> Arc<Snapshot> {
        self.entry = Some(Entry {
            snapshot: snapshot.clone(),
            captured: self.clock.now(),
        });
        snapshot
    }
}
