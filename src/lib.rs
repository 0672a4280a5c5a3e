//! Discussion-thread view-model for the KSI competition platform.
//!
//! ARCHITECTURE
//! ============
//! - `thread`: per-thread view-model (refresh trigger, fetch-and-flatten,
//!   cached snapshot shared by every viewer).
//! - `depth`: responsive reply-nesting limit from device signals.
//! - `index`: flat post index and depth-clamped render walks.
//! - `state`: hub sharing one view-model per thread id.
//! - `fetch`: backend seam and its REST implementation.
//! - `replay`: broadcast with last-value memory used by both streams.

pub mod config;
pub mod depth;
pub mod fetch;
pub mod index;
pub mod model;
pub mod replay;
mod services;
pub mod state;
pub mod thread;

pub use config::{ClientConfig, ConfigError};
pub use depth::{ResponsiveDepthPolicy, Viewport, depth_for};
pub use fetch::{FetchError, HttpThreadFetcher, ThreadFetcher};
pub use index::{LayoutEntry, PostIndex};
pub use model::{Post, PostId, Thread, ThreadId};
pub use replay::{ReplayChannel, Subscription};
pub use state::ThreadHub;
pub use thread::{PostDialogOutcome, ThreadEvent, ThreadSnapshot, ThreadViewModel};
