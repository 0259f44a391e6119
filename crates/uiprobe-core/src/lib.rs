//! Core types and logic for uiprobe.
//!
//! This crate turns Android UI hierarchy dumps into queryable snapshots and
//! drives a device through them: find elements, wait for conditions, tap
//! and type. Device access itself is behind the [`bridge::DeviceBridge`]
//! trait; the CLI crate provides the `adb` implementation.
//!
//! # Modules
//!
//! - [`parser`]: Tolerant dump parser (never fails, degrades instead)
//! - [`snapshot`] and [`node`]: Immutable captured tree in document order
//! - [`selector`] and [`query`]: Selector kinds and their evaluation
//! - [`cache`]: TTL snapshot cache, the only thing that triggers captures
//! - [`wait`]: Poll-until-true loop behind every wait
//! - [`handle`]: Matched elements with frozen geometry
//! - [`session`]: Per-device session tying the above together
//! - [`strategy`]: Ordered fallbacks for operations with several methods
//! - [`format`]: Compact text rendering of a snapshot
//! - [`config`] and [`error`]: Session timing and the error taxonomy
//!
//! # Selectors
//!
//! | Form | Example | Kind |
//! |------|---------|------|
//! | JSON object | `{"text": "OK", "clickable": true}` | Predicate |
//! | `#id` | `#login` | Shorthand (resource id) |
//! | `.Class` | `.Button` | Shorthand (class substring) |
//! | `[attr=v]`, `[attr*=v]`, `[attr]` | `[text*=Log]` | Shorthand (attribute) |
//! | plain text | `Sign in` | Shorthand (text or description) |
//! | path | `//Button[@text="Submit"]` | Path query |
//! | JSON array | `["#ok", {"text": "OK"}]` | Alternatives |
//!
//! Matches are always returned in document (pre-order) order.

pub mod bridge;
pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod handle;
pub mod node;
pub mod parser;
pub mod query;
pub mod selector;
pub mod session;
pub mod snapshot;
pub mod strategy;
pub mod wait;

pub use bridge::{BridgeError, DeviceBridge};
pub use error::{ApiError, ErrorCode};
pub use handle::ElementHandle;
pub use node::{Bounds, Node, NodeId, Point};
pub use selector::Selector;
pub use session::DeviceSession;
pub use snapshot::Snapshot;
