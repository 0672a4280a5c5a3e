//! Shared view state across mounted thread views.
//!
//! DESIGN
//! ======
//! `ThreadHub` maps each thread id to one live `ThreadViewModel`, so every
//! view observing the same thread shares one refresh worker and one cached
//! snapshot. Cloning the hub is cheap; all clones see the same views.
//! Releasing a thread tears its view down only when no caller still holds
//! a handle to it, so one thread never runs two workers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::fetch::ThreadFetcher;
use crate::model::ThreadId;
use crate::replay::Subscription;
use crate::thread::{ThreadEvent, ThreadViewModel};

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

#[derive(Clone)]
pub struct ThreadHub {
    fetcher: Arc<dyn ThreadFetcher>,
    views: Arc<Mutex<HashMap<ThreadId, Arc<ThreadViewModel>>>>,
}

impl ThreadHub {
    #[must_use]
    pub fn new(fetcher: Arc<dyn ThreadFetcher>) -> Self {
        Self { fetcher, views: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// The view-model for `thread_id`, started on first use.
    ///
    /// Must be called within a Tokio runtime.
    pub fn view(&self, thread_id: ThreadId) -> Arc<ThreadViewModel> {
        let mut views = self.views.lock().unwrap_or_else(PoisonError::into_inner);
        let view = views.entry(thread_id).or_insert_with(|| {
            info!(%thread_id, "starting thread view");
            Arc::new(ThreadViewModel::spawn(Arc::clone(&self.fetcher), thread_id))
        });
        Arc::clone(view)
    }

    /// Snapshot stream for `thread_id`. Joins an existing view without
    /// fetching again; starts one (with its initial load) otherwise.
    pub fn observe(&self, thread_id: ThreadId) -> Subscription<ThreadEvent> {
        self.view(thread_id).observe()
    }

    /// Refresh `thread_id` if a view for it is live. Returns whether one was.
    pub fn trigger_refresh(&self, thread_id: ThreadId) -> bool {
        let views = self.views.lock().unwrap_or_else(PoisonError::into_inner);
        views.get(&thread_id).map_or(false, |view| {
            view.trigger_refresh();
            true
        })
    }

    /// Tear down the view for `thread_id` unless another handle from
    /// [`ThreadHub::view`] is still alive. Subscriptions alone do not keep
    /// it; their streams end. Returns whether the view was released.
    pub fn release(&self, thread_id: ThreadId) -> bool {
        let mut views = self.views.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(view) = views.get(&thread_id) else {
            return false;
        };
        if Arc::strong_count(view) > 1 {
            debug!(%thread_id, "thread view still held; not released");
            return false;
        }
        views.remove(&thread_id);
        info!(%thread_id, "released thread view");
        true
    }

    /// Release every view nobody observes or holds any more.
    pub fn release_idle(&self) -> usize {
        let mut views = self.views.lock().unwrap_or_else(PoisonError::into_inner);
        let before = views.len();
        views.retain(|_, view| Arc::strong_count(view) > 1 || view.subscriber_count() > 0);
        let released = before - views.len();
        if released > 0 {
            info!(released, "released idle thread views");
        }
        released
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.views.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
