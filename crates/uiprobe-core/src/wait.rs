//! Synchronization layer: poll snapshots until a condition holds.
//!
//! Every wait in the crate is [`poll_until`] with a different check. The
//! loop fetches a snapshot, runs the check, and either returns the check's
//! result or sleeps and tries again. Sleeping goes through
//! `tokio::time::sleep`, so other tasks keep running and paused-time tests
//! can step through a wait deterministically.
//!
//! Most polls are served from the snapshot cache. Every `refresh_interval`
//! the cache is bypassed and a new capture is forced, which bounds how many
//! dumps a wait asks of the device.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::ApiError;
use crate::snapshot::Snapshot;

/// Anything that can hand out the current snapshot.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self, force_refresh: bool) -> Result<Arc<Snapshot>, ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Give up once this much time has passed.
    pub timeout: Duration,
    /// Delay between probes.
    pub poll_interval: Duration,
    /// Force a new capture at least this often.
    pub refresh_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

impl WaitOptions {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            timeout: config.default_timeout,
            poll_interval: config.poll_interval,
            refresh_interval: config.refresh_interval,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

/// Poll `source` until `check` returns `Some`, or fail with a timeout.
///
/// `what` describes the condition for the timeout message. A zero poll
/// interval is treated as 1ms so the loop always yields.
///
/// Degraded snapshots are never handed to `check`. A dump that failed to
/// parse says nothing about the screen, so it counts as "not yet" like a
/// failed capture does.
///
/// Fails no earlier than `timeout` and, when captures are instant, no later
/// than `timeout + poll_interval`.
pub async fn poll_until<S, T, F>(
    source: &S,
    what: &str,
    options: &WaitOptions,
    mut check: F,
) -> Result<T, ApiError>
where
    S: SnapshotSource + ?Sized,
    F: FnMut(&Arc<Snapshot>) -> Option<T> + Send,
{
    let poll = options.poll_interval.max(Duration::from_millis(1));
    let start = Instant::now();
    let mut last_forced = start;
    let mut last_error: Option<ApiError> = None;
    let mut polls = 0u32;

    loop {
        let force = last_forced.elapsed() >= options.refresh_interval;
        if force {
            last_forced = Instant::now();
        }
        polls += 1;

        match source.snapshot(force).await {
            Ok(snapshot) if snapshot.is_degraded() => {
                let reason = snapshot.diagnostic().unwrap_or_default();
                warn!("Unparseable dump while waiting for {}: {}", what, reason);
                last_error = Some(ApiError::device(format!("unparseable dump: {}", reason)));
            }
            Ok(snapshot) => {
                if let Some(found) = check(&snapshot) {
                    debug!(
                        "Condition '{}' held after {}ms ({} polls)",
                        what,
                        start.elapsed().as_millis(),
                        polls
                    );
                    return Ok(found);
                }
            }
            Err(e) => {
                warn!("Capture failed while waiting for {}: {}", what, e);
                last_error = Some(e);
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= options.timeout {
            return Err(match last_error {
                Some(cause) => ApiError::timeout_with_cause(what, elapsed, &cause.message),
                None => ApiError::timeout(what, elapsed),
            });
        }
        tokio::time::sleep(poll.min(options.timeout - elapsed)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testing::ScriptedBridge;
    use crate::cache::SnapshotCache;
    use crate::error::ErrorCode;
    use crate::query::find_one;
    use crate::selector::Selector;
    use tokio::sync::Mutex;

    /// Cache plus scripted bridge, the same pairing a session uses.
    struct CachedSource {
        cache: Mutex<SnapshotCache>,
        bridge: ScriptedBridge,
    }

    impl CachedSource {
        fn new(ttl: Duration, bridge: ScriptedBridge) -> Self {
            Self {
                cache: Mutex::new(SnapshotCache::new(ttl)),
                bridge,
            }
        }
    }

    #[async_trait]
    impl SnapshotSource for CachedSource {
        async fn snapshot(&self, force_refresh: bool) -> Result<Arc<Snapshot>, ApiError> {
            let mut cache = self.cache.lock().await;
            Ok(cache.get(&self.bridge, force_refresh).await?)
        }
    }

    fn screen(button: Option<&str>) -> String {
        let inner = button
            .map(|t| format!("<node class=\"Button\" text=\"{}\" bounds=\"[0,0][10,10]\"/>", t))
            .unwrap_or_default();
        format!("<hierarchy><node class=\"FrameLayout\">{}</node></hierarchy>", inner)
    }

    fn options(timeout_ms: u64, poll_ms: u64) -> WaitOptions {
        WaitOptions::default()
            .with_timeout(Duration::from_millis(timeout_ms))
            .with_poll_interval(Duration::from_millis(poll_ms))
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_match_from_fourth_capture() {
        let bridge = ScriptedBridge::new([
            screen(None),
            screen(None),
            screen(None),
            screen(Some("Ready")),
        ]);
        let source = CachedSource::new(Duration::from_millis(50), bridge);
        let selector = Selector::parse("Ready").unwrap();

        let start = Instant::now();
        let found = poll_until(&source, "Ready", &options(500, 100), |snap| {
            find_one(snap, &selector).map(|id| snap.node(id).text.clone())
        })
        .await
        .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(found, "Ready");
        assert_eq!(source.bridge.capture_count(), 4);
        assert!(elapsed >= Duration::from_millis(300), "{:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(500), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_lands_between_t_and_t_plus_p() {
        let bridge = ScriptedBridge::new([screen(None)]);
        let source = CachedSource::new(Duration::from_millis(50), bridge);

        for (timeout, poll) in [(500, 100), (450, 100), (1000, 300), (10, 100)] {
            let start = Instant::now();
            let err = poll_until(&source, "never", &options(timeout, poll), |_| None::<()>)
                .await
                .unwrap_err();
            let elapsed = start.elapsed();

            assert_eq!(err.code, ErrorCode::Timeout);
            assert!(elapsed >= Duration::from_millis(timeout));
            assert!(elapsed <= Duration::from_millis(timeout + poll));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_message_names_condition_and_last_capture_error() {
        let bridge = ScriptedBridge::default();
        bridge.push_failure("device offline");
        let source = CachedSource::new(Duration::from_millis(50), bridge);

        let err = poll_until(&source, "#login", &options(200, 100), |_| None::<()>)
            .await
            .unwrap_err();
        assert!(err.message.contains("#login"));
        assert!(err.message.contains("200ms"));
        // The scripted bridge has nothing left after the failure
        assert!(err.message.contains("last capture error"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_errors_do_not_end_the_wait() {
        let bridge = ScriptedBridge::default();
        bridge.push_failure("transient");
        bridge.push_dump(screen(Some("OK")));
        let source = CachedSource::new(Duration::from_millis(50), bridge);
        let selector = Selector::parse("OK").unwrap();

        let found = poll_until(&source, "OK", &options(1000, 100), |snap| find_one(snap, &selector))
            .await;
        assert!(found.is_ok());
        assert_eq!(source.bridge.capture_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_ttl_is_bypassed_at_the_refresh_interval() {
        let bridge = ScriptedBridge::new([screen(None), screen(Some("Late"))]);
        let source = CachedSource::new(Duration::from_secs(60), bridge);
        let selector = Selector::parse("Late").unwrap();
        let opts = options(2000, 100).with_refresh_interval(Duration::from_millis(300));

        let start = Instant::now();
        poll_until(&source, "Late", &opts, |snap| find_one(snap, &selector))
            .await
            .unwrap();

        assert_eq!(source.bridge.capture_count(), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }
}
