//! Offline bridge that serves a saved dump.
//!
//! Useful for writing selectors against a screen without a device at hand.
//! The file is re-read on every capture, so editing it between runs of a
//! wait is picked up. Input actions are rejected.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use uiprobe_core::bridge::{BridgeError, DeviceBridge};
use uiprobe_core::node::Point;

pub struct FileBridge {
    path: PathBuf,
}

impl FileBridge {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl DeviceBridge for FileBridge {
    async fn capture_hierarchy(&self) -> Result<String, BridgeError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| BridgeError::Io {
                command: format!("read {}", self.path.display()),
                source,
            })?;
        // Dumps pulled off devices are not always valid UTF-8
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn tap(&self, _at: Point) -> Result<(), BridgeError> {
        Err(BridgeError::Unsupported("tap"))
    }

    async fn swipe(&self, _from: Point, _to: Point, _duration_ms: u64) -> Result<(), BridgeError> {
        Err(BridgeError::Unsupported("swipe"))
    }

    async fn input_text(&self, _text: &str) -> Result<(), BridgeError> {
        Err(BridgeError::Unsupported("text input"))
    }

    async fn key_event(&self, _code: u32) -> Result<(), BridgeError> {
        Err(BridgeError::Unsupported("key events"))
    }
}
