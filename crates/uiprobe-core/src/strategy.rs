//! Ordered fallback strategies.
//!
//! Some device operations have several ways to get done, none of which
//! works everywhere (dumping the hierarchy straight to stdout fails on
//! older images, for example). Each way is a [`Strategy`]; [`run_strategies`]
//! tries them in order and stops at the first success.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ApiError;

#[async_trait]
pub trait Strategy<T>: Send + Sync {
    /// Short name used in logs and in the combined failure message.
    fn name(&self) -> &str;

    async fn attempt(&self) -> Result<T, ApiError>;
}

/// Try each strategy in order and return the first success.
///
/// When every strategy fails, the error lists each failure as
/// `name: message`, in the order they were tried.
pub async fn run_strategies<T: Send>(strategies: &[Box<dyn Strategy<T>>]) -> Result<T, ApiError> {
    if strategies.is_empty() {
        return Err(ApiError::invalid_input("No strategies to try"));
    }

    let mut failures = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        match strategy.attempt().await {
            Ok(value) => {
                debug!("Strategy '{}' succeeded", strategy.name());
                return Ok(value);
            }
            Err(e) => {
                warn!("Strategy '{}' failed: {}", strategy.name(), e.message);
                failures.push(format!("{}: {}", strategy.name(), e.message));
            }
        }
    }

    Err(ApiError::command_failed_with_suggestion(
        format!("All {} strategies failed ({})", failures.len(), failures.join("; ")),
        "Check that the device is connected and unlocked, then retry",
    ))
}
