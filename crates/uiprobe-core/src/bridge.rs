//! Device collaborator contract.
//!
//! The core never talks to a device directly. Everything that touches the
//! device (capturing the hierarchy, injecting input) goes through a
//! [`DeviceBridge`]. Implementations may fail at any call; the session
//! serializes calls so at most one is in flight per device.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::node::Point;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to run '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("device unavailable: {0}")]
    Unavailable(String),

    #[error("{0} is not supported by this bridge")]
    Unsupported(&'static str),
}

/// Capture and input operations against one device.
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Return the raw hierarchy dump text.
    async fn capture_hierarchy(&self) -> Result<String, BridgeError>;

    async fn tap(&self, at: Point) -> Result<(), BridgeError>;

    /// Swipe between two points over `duration_ms`. A swipe that starts and
    /// ends on the same point is a long press.
    async fn swipe(&self, from: Point, to: Point, duration_ms: u64) -> Result<(), BridgeError>;

    async fn input_text(&self, text: &str) -> Result<(), BridgeError>;

    async fn key_event(&self, code: u32) -> Result<(), BridgeError>;
}

/// Serializes calls to an inner bridge.
///
/// Every call waits for the previous one to finish, so a device never sees
/// overlapping captures or input commands from the same session.
pub struct SerialBridge<B> {
    inner: B,
    lock: Mutex<()>,
}

impl<B: DeviceBridge> SerialBridge<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: DeviceBridge> DeviceBridge for SerialBridge<B> {
    async fn capture_hierarchy(&self) -> Result<String, BridgeError> {
        let _guard = self.lock.lock().await;
        self.inner.capture_hierarchy().await
    }

    async fn tap(&self, at: Point) -> Result<(), BridgeError> {
        let _guard = self.lock.lock().await;
        self.inner.tap(at).await
    }

    async fn swipe(&self, from: Point, to: Point, duration_ms: u64) -> Result<(), BridgeError> {
        let _guard = self.lock.lock().await;
        self.inner.swipe(from, to, duration_ms).await
    }

    async fn input_text(&self, text: &str) -> Result<(), BridgeError> {
        let _guard = self.lock.lock().await;
        self.inner.input_text(text).await
    }

    async fn key_event(&self, code: u32) -> Result<(), BridgeError> {
        let _guard = self.lock.lock().await;
        self.inner.key_event(code).await
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Records the highest number of calls observed in flight at once.
    #[derive(Default)]
    struct OverlapProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl OverlapProbe {
        async fn enter(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DeviceBridge for OverlapProbe {
        async fn capture_hierarchy(&self) -> Result<String, BridgeError> {
            self.enter().await;
            Ok("<hierarchy/>".to_string())
        }

        async fn tap(&self, _at: Point) -> Result<(), BridgeError> {
            self.enter().await;
            Ok(())
        }

        async fn swipe(&self, _from: Point, _to: Point, _duration_ms: u64) -> Result<(), BridgeError> {
            self.enter().await;
            Ok(())
        }

        async fn input_text(&self, _text: &str) -> Result<(), BridgeError> {
            self.enter().await;
            Ok(())
        }

        async fn key_event(&self, _code: u32) -> Result<(), BridgeError> {
            self.enter().await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_serial_bridge_never_overlaps_calls() {
        let bridge = SerialBridge::new(OverlapProbe::default());
        let (a, b, c) = tokio::join!(
            bridge.capture_hierarchy(),
            bridge.tap(Point::new(1, 1)),
            bridge.key_event(4)
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(bridge.inner().peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bare_bridge_would_overlap() {
        let bridge = OverlapProbe::default();
        let _ = tokio::join!(bridge.tap(Point::new(1, 1)), bridge.key_event(4));
        assert_eq!(bridge.peak.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_bridge_errors_render_command_context() {
        let err = BridgeError::CommandFailed {
            command: "adb shell input tap 1 2".into(),
            status: 1,
            stderr: "error: no devices".into(),
        };
        let text = err.to_string();
        assert!(text.contains("adb shell input tap 1 2"));
        assert!(text.contains("no devices"));
    }
}
