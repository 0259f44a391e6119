//! Device session: the cache, the bridge, and everything built on them.
//!
//! A session owns one device's snapshot cache and a serialized bridge.
//! Queries go through the cache; waits poll it; actions go to the bridge
//! and then drop the cached snapshot, since the screen is about to change.
//!
//! Sessions share nothing with each other, so driving several devices at
//! once is a matter of creating several sessions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::bridge::{BridgeError, DeviceBridge, SerialBridge};
use crate::cache::SnapshotCache;
use crate::config::SessionConfig;
use crate::error::ApiError;
use crate::handle::ElementHandle;
use crate::node::Point;
use crate::query::{find_all, find_one};
use crate::selector::Selector;
use crate::snapshot::Snapshot;
use crate::wait::{poll_until, SnapshotSource, WaitOptions};

/// Press duration used by `long_press`.
pub const DEFAULT_LONG_PRESS: Duration = Duration::from_millis(1000);

pub struct DeviceSession<B> {
    bridge: SerialBridge<B>,
    cache: Mutex<SnapshotCache>,
    config: SessionConfig,
}

impl<B: DeviceBridge> DeviceSession<B> {
    pub fn new(bridge: B) -> Self {
        Self::with_config(bridge, SessionConfig::default())
    }

    pub fn with_config(bridge: B, config: SessionConfig) -> Self {
        let cache = SnapshotCache::new(config.cache_ttl);
        Self::with_cache(bridge, cache, config)
    }

    /// Use a prepared cache, e.g. one with a custom clock.
    pub fn with_cache(bridge: B, cache: SnapshotCache, config: SessionConfig) -> Self {
        Self {
            bridge: SerialBridge::new(bridge),
            cache: Mutex::new(cache),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn bridge(&self) -> &B {
        self.bridge.inner()
    }

    /// Wait options built from the session config.
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::from_config(&self.config)
    }

    /// Current snapshot, from the cache unless stale or `force_refresh`.
    pub async fn snapshot(&self, force_refresh: bool) -> Result<Arc<Snapshot>, ApiError> {
        let mut cache = self.cache.lock().await;
        Ok(cache.get(&self.bridge, force_refresh).await?)
    }

    /// Drop the cached snapshot so the next query captures a new one.
    pub async fn invalidate(&self) {
        self.cache.lock().await.invalidate();
    }

    /// First match in document order, if any.
    pub async fn find(&self, selector: &Selector) -> Result<Option<ElementHandle>, ApiError> {
        let snapshot = self.snapshot(false).await?;
        Ok(find_one(&snapshot, selector)
            .and_then(|id| ElementHandle::new(snapshot.clone(), id, Some(selector.clone()))))
    }

    /// Every match in document order.
    pub async fn find_all(&self, selector: &Selector) -> Result<Vec<ElementHandle>, ApiError> {
        let snapshot = self.snapshot(false).await?;
        Ok(find_all(&snapshot, selector)
            .into_iter()
            .filter_map(|id| ElementHandle::new(snapshot.clone(), id, Some(selector.clone())))
            .collect())
    }

    /// First match, or `NOT_FOUND` when nothing matches.
    pub async fn require(&self, selector: &Selector) -> Result<ElementHandle, ApiError> {
        self.find(selector)
            .await?
            .ok_or_else(|| ApiError::not_found(&selector.to_string()))
    }

    /// Look the handle's selector up again on a freshly captured snapshot.
    ///
    /// The old handle keeps its frozen geometry; the returned one carries
    /// the geometry of the current screen.
    pub async fn requery(&self, handle: &ElementHandle) -> Result<ElementHandle, ApiError> {
        let selector = handle.selector().ok_or_else(|| {
            ApiError::invalid_input_with_suggestion(
                format!("Handle {} was not created from a selector", handle.describe()),
                "Find the element again with a selector instead",
            )
        })?;
        let snapshot = self.snapshot(true).await?;
        find_one(&snapshot, selector)
            .and_then(|id| ElementHandle::new(snapshot.clone(), id, Some(selector.clone())))
            .ok_or_else(|| ApiError::not_found(&selector.to_string()))
    }

    /// Wait until `selector` has a visible match.
    ///
    /// Visible means `visible-to-user` and a non-empty bounds rectangle, so
    /// a node with no `bounds` attribute never satisfies this wait even
    /// though `find` returns it.
    pub async fn wait_for(
        &self,
        selector: &Selector,
        options: &WaitOptions,
    ) -> Result<ElementHandle, ApiError> {
        poll_until(self, &selector.to_string(), options, |snapshot| {
            find_all(snapshot, selector)
                .into_iter()
                .find(|id| snapshot.node(*id).is_visible())
                .and_then(|id| ElementHandle::new(snapshot.clone(), id, Some(selector.clone())))
        })
        .await
    }

    /// Wait until `selector` has no visible match.
    pub async fn wait_for_hidden(
        &self,
        selector: &Selector,
        options: &WaitOptions,
    ) -> Result<(), ApiError> {
        let what = format!("{} to disappear", selector);
        poll_until(self, &what, options, |snapshot| {
            let shown = find_all(snapshot, selector)
                .into_iter()
                .any(|id| snapshot.node(id).is_visible());
            (!shown).then_some(())
        })
        .await
    }

    /// Wait until some visible node's text or description contains `text`,
    /// ignoring case.
    pub async fn wait_for_text(
        &self,
        text: &str,
        options: &WaitOptions,
    ) -> Result<ElementHandle, ApiError> {
        if text.is_empty() {
            return Err(ApiError::invalid_input("Text to wait for must not be empty"));
        }
        let needle = text.to_lowercase();
        let what = format!("text \"{}\"", text);
        poll_until(self, &what, options, |snapshot| {
            snapshot
                .iter()
                .find(|n| {
                    n.is_visible()
                        && (n.text.to_lowercase().contains(&needle)
                            || n.description.to_lowercase().contains(&needle))
                })
                .and_then(|n| ElementHandle::new(snapshot.clone(), n.id, None))
        })
        .await
    }

    /// Wait until the screen content differs from `baseline_hash`, e.g.
    /// after a navigation.
    pub async fn wait_for_change(
        &self,
        baseline_hash: u64,
        options: &WaitOptions,
    ) -> Result<Arc<Snapshot>, ApiError> {
        poll_until(self, "screen change", options, |snapshot| {
            (snapshot.content_hash() != baseline_hash).then(|| snapshot.clone())
        })
        .await
    }

    /// Wait until the screen content has stayed the same for `settle`,
    /// across at least two captures.
    pub async fn wait_for_idle(
        &self,
        settle: Duration,
        options: &WaitOptions,
    ) -> Result<Arc<Snapshot>, ApiError> {
        // (content hash, first snapshot id with that hash, seen since)
        let mut stable: Option<(u64, u64, Instant)> = None;
        let what = format!("screen idle for {}ms", settle.as_millis());
        poll_until(self, &what, options, |snapshot| {
            let now = Instant::now();
            match stable {
                Some((hash, first_id, since)) if hash == snapshot.content_hash() => {
                    let settled = snapshot.snapshot_id() != first_id
                        && now.duration_since(since) >= settle;
                    settled.then(|| snapshot.clone())
                }
                _ => {
                    stable = Some((snapshot.content_hash(), snapshot.snapshot_id(), now));
                    None
                }
            }
        })
        .await
    }

    /// Wait for a custom condition over snapshots.
    pub async fn wait_until<T, F>(
        &self,
        what: &str,
        options: &WaitOptions,
        check: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut(&Arc<Snapshot>) -> Option<T> + Send,
    {
        poll_until(self, what, options, check).await
    }

    /// Tap the handle's frozen center.
    pub async fn tap(&self, handle: &ElementHandle) -> Result<(), ApiError> {
        debug!("Tapping {} at {:?}", handle.describe(), handle.center());
        self.tap_point(handle.center()).await
    }

    pub async fn tap_point(&self, at: Point) -> Result<(), ApiError> {
        let result = self.bridge.tap(at).await;
        self.after_action("tap", result).await
    }

    /// Wait for `selector` to show up, then tap it. Matches without screen
    /// area are skipped, as in [`wait_for`](Self::wait_for).
    pub async fn tap_selector(
        &self,
        selector: &Selector,
        options: &WaitOptions,
    ) -> Result<ElementHandle, ApiError> {
        let handle = self.wait_for(selector, options).await?;
        self.tap(&handle).await?;
        Ok(handle)
    }

    /// Press and hold the handle's frozen center.
    pub async fn long_press(
        &self,
        handle: &ElementHandle,
        duration: Duration,
    ) -> Result<(), ApiError> {
        let at = handle.center();
        let result = self.bridge.swipe(at, at, duration_ms(duration)).await;
        self.after_action("long press", result).await
    }

    pub async fn swipe(&self, from: Point, to: Point, duration: Duration) -> Result<(), ApiError> {
        let result = self.bridge.swipe(from, to, duration_ms(duration)).await;
        self.after_action("swipe", result).await
    }

    /// Drag from one handle's center to another's.
    pub async fn drag(
        &self,
        from: &ElementHandle,
        to: &ElementHandle,
        duration: Duration,
    ) -> Result<(), ApiError> {
        self.swipe(from.center(), to.center(), duration).await
    }

    /// Type into whatever has focus.
    pub async fn type_text(&self, text: &str) -> Result<(), ApiError> {
        if text.is_empty() {
            return Err(ApiError::invalid_input("Text to type must not be empty"));
        }
        let result = self.bridge.input_text(text).await;
        self.after_action("type", result).await
    }

    /// Send an Android key code (3 = HOME, 4 = BACK, 66 = ENTER, ...).
    pub async fn press_key(&self, code: u32) -> Result<(), ApiError> {
        let result = self.bridge.key_event(code).await;
        self.after_action("key", result).await
    }

    async fn after_action(
        &self,
        action: &str,
        result: Result<(), BridgeError>,
    ) -> Result<(), ApiError> {
        self.invalidate().await;
        match result {
            Ok(()) => {
                info!("Dispatched {}", action);
                Ok(())
            }
            Err(e) => Err(ApiError::device(format!("{} failed: {}", action, e))),
        }
    }
}

#[async_trait]
impl<B: DeviceBridge> SnapshotSource for DeviceSession<B> {
    async fn snapshot(&self, force_refresh: bool) -> Result<Arc<Snapshot>, ApiError> {
        DeviceSession::snapshot(self, force_refresh).await
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
