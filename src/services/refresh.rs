//! Refresh service — background fetch loop for one thread view.
//!
//! DESIGN
//! ======
//! The worker waits for a refresh permit, fetches, publishes, and waits
//! again. Only one fetch is ever in flight per view; permits that arrive
//! meanwhile are held as a single pending refresh.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::fetch::ThreadFetcher;
use crate::thread::{ThreadShared, ThreadSnapshot};

/// Spawn the refresh worker for a view. Abort the handle to stop it.
pub(crate) fn spawn_refresh_worker(shared: Arc<ThreadShared>, fetcher: Arc<dyn ThreadFetcher>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            shared.refresh.notified().await;
            refresh_once(&shared, fetcher.as_ref()).await;
        }
    })
}

async fn refresh_once(shared: &ThreadShared, fetcher: &dyn ThreadFetcher) {
    let attempt = shared.fetches.fetch_add(1, Ordering::Relaxed) + 1;

    match fetcher.fetch_thread(shared.thread_id).await {
        Ok(thread) => {
            let snapshot = ThreadSnapshot::from_thread(thread);
            info!(thread_id = %shared.thread_id, attempt, posts = snapshot.posts.len(), "thread refreshed");
            shared.events.publish(Ok(Arc::new(snapshot)));
        }
        Err(e) => {
            warn!(thread_id = %shared.thread_id, attempt, error = %e, "thread refresh failed");
            shared.events.broadcast(Err(e));
        }
    }
}
