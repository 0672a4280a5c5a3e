//! Thread view-model — fetch, flatten, cache and share one thread.
//!
//! DESIGN
//! ======
//! A view-model owns one background refresh worker (see
//! `services::refresh`). Refresh requests are a single-slot pending permit
//! (`tokio::sync::Notify`): a burst of triggers while a fetch is in flight
//! collapses into exactly one follow-up fetch. Construction stores the
//! first permit, so the initial load is eager.
//!
//! Every successful fetch becomes a fresh immutable `ThreadSnapshot` that
//! replaces the cached one and is pushed to every subscriber. Late
//! subscribers get the cached snapshot immediately and never cause a fetch.
//!
//! ERROR HANDLING
//! ==============
//! A failed fetch is delivered as an `Err` item to the subscribers present
//! at that moment. It is not cached, leaves the previous snapshot intact,
//! and is not retried; the next trigger tries again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::fetch::{FetchError, ThreadFetcher};
use crate::index::{LayoutEntry, PostIndex};
use crate::model::{PostId, Thread, ThreadId};
use crate::replay::{ReplayChannel, Subscription};
use crate::services::refresh::spawn_refresh_worker;

#[cfg(test)]
#[path = "thread_test.rs"]
mod tests;

// =============================================================================
// SNAPSHOT
// =============================================================================

/// One fetched thread together with its post index. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSnapshot {
    pub thread: Thread,
    pub posts: PostIndex,
}

impl ThreadSnapshot {
    #[must_use]
    pub fn from_thread(thread: Thread) -> Self {
        let posts = PostIndex::build(&thread.posts);
        Self { thread, posts }
    }

    /// Render order for the whole thread, or for the subtree under
    /// `root_post` when the view is rooted at a single post.
    #[must_use]
    pub fn layout(&self, root_post: Option<PostId>, max_depth: u8) -> Vec<LayoutEntry> {
        let roots = match root_post {
            Some(id) => vec![id],
            None => self.posts.roots(&self.thread.root_posts),
        };
        self.posts.layout(&roots, max_depth)
    }
}

/// Item of a thread stream: a new snapshot, or the failure of one attempt.
pub type ThreadEvent = Result<Arc<ThreadSnapshot>, FetchError>;

/// How the post-reply dialog was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostDialogOutcome {
    Replied,
    Dismissed,
}

// =============================================================================
// VIEW-MODEL
// =============================================================================

/// State shared between a view-model and its refresh worker.
pub(crate) struct ThreadShared {
    pub(crate) thread_id: ThreadId,
    pub(crate) refresh: Notify,
    pub(crate) events: ReplayChannel<ThreadEvent>,
    pub(crate) fetches: AtomicU64,
}

pub struct ThreadViewModel {
    shared: Arc<ThreadShared>,
    worker: JoinHandle<()>,
}

impl ThreadViewModel {
    /// Start a view-model for `thread_id` and request the initial load.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn spawn(fetcher: Arc<dyn ThreadFetcher>, thread_id: ThreadId) -> Self {
        let shared = Arc::new(ThreadShared {
            thread_id,
            refresh: Notify::new(),
            events: ReplayChannel::new(),
            fetches: AtomicU64::new(0),
        });
        shared.refresh.notify_one();
        let worker = spawn_refresh_worker(Arc::clone(&shared), fetcher);
        Self { shared, worker }
    }

    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.shared.thread_id
    }

    /// Snapshot stream. Replays the cached snapshot first, if any.
    pub fn observe(&self) -> Subscription<ThreadEvent> {
        self.shared.events.subscribe()
    }

    /// Request a re-fetch. Never blocks; coalesces with pending requests.
    pub fn trigger_refresh(&self) {
        self.shared.refresh.notify_one();
    }

    /// Posts were edited or deleted somewhere in the thread.
    pub fn on_posts_modified(&self) {
        debug!(thread_id = %self.shared.thread_id, "posts modified");
        self.trigger_refresh();
    }

    /// The post-reply dialog closed; refresh only if a post was created.
    pub fn on_post_dialog_closed(&self, outcome: PostDialogOutcome) {
        if outcome == PostDialogOutcome::Replied {
            debug!(thread_id = %self.shared.thread_id, "new post created");
            self.trigger_refresh();
        }
    }

    /// The cached snapshot, without subscribing.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<ThreadSnapshot>> {
        self.shared.events.latest().and_then(Result::ok)
    }

    /// Fetches started so far, including failed ones.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.shared.fetches.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.events.subscriber_count()
    }
}

impl Drop for ThreadViewModel {
    fn drop(&mut self) {
        self.worker.abort();
        self.shared.events.close();
        debug!(thread_id = %self.shared.thread_id, "thread view torn down");
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
