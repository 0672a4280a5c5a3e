//! Thread and post wire types.
//!
//! Mirrors the `ThreadDetailResponse` returned by the platform REST API.
//! Threads are fetched whole and never mutated locally; nesting is carried
//! by `Post::parent` references, never by a nested payload.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Backend identifier of a discussion thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a post, unique within one thread snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub u64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// POST
// =============================================================================

/// A single discussion message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    /// Post this one replies to; `None` for a top-level post.
    #[serde(default)]
    pub parent: Option<PostId>,
    /// User id of the author.
    pub author: u64,
    /// Rendered HTML body.
    pub body: String,
    /// Publication timestamp, passed through as sent by the backend.
    pub published_at: String,
}

// =============================================================================
// THREAD
// =============================================================================

/// A discussion container as returned by `GET /threadDetails/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    #[serde(default)]
    pub title: Option<String>,
    /// Top-level posts in display order. Empty when the backend leaves
    /// root detection to the client.
    #[serde(default)]
    pub root_posts: Vec<PostId>,
    /// Every post of the thread, in no guaranteed order.
    pub posts: Vec<Post>,
}
