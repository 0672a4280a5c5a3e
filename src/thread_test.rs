use super::*;

use std::time::Duration;

use tokio::sync::Semaphore;

use super::test_helpers::{ScriptedFetcher, post, thread};

fn keys(snapshot: &ThreadSnapshot) -> Vec<u64> {
    let mut ids: Vec<u64> = snapshot.posts.ids().map(|id| id.0).collect();
    ids.sort_unstable();
    ids
}

async fn next_event(sub: &mut Subscription<ThreadEvent>) -> ThreadEvent {
    tokio::time::timeout(Duration::from_secs(1), sub.next()).await.unwrap().unwrap()
}

async fn wait_for_calls(fetcher: &ScriptedFetcher, calls: u64) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while fetcher.calls() < calls {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}

// =========================================================================
// initial load
// =========================================================================

#[tokio::test]
async fn observe_yields_indexed_snapshot() {
    let fetcher = ScriptedFetcher::stable(thread(42, vec![post(1, None), post(2, Some(1))]));
    let vm = ThreadViewModel::spawn(fetcher, ThreadId(42));
    let mut sub = vm.observe();

    let snapshot = next_event(&mut sub).await.unwrap();
    assert_eq!(snapshot.thread.id, ThreadId(42));
    assert_eq!(keys(&snapshot), vec![1, 2]);
    assert_eq!(snapshot.posts.get(PostId(1)), Some(&post(1, None)));
    assert_eq!(snapshot.posts.get(PostId(2)), Some(&post(2, Some(1))));
}

#[tokio::test]
async fn late_subscriber_replays_without_fetching() {
    let fetcher = ScriptedFetcher::stable(thread(42, vec![post(1, None)]));
    let vm = ThreadViewModel::spawn(Arc::clone(&fetcher) as Arc<dyn ThreadFetcher>, ThreadId(42));
    let mut first = vm.observe();
    let snapshot = next_event(&mut first).await.unwrap();

    let mut late = vm.observe();
    let replayed = late.try_next().expect("cached snapshot replayed immediately").unwrap();
    assert!(Arc::ptr_eq(&snapshot, &replayed));
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(vm.fetch_count(), 1);
}

#[tokio::test]
async fn initial_failure_is_surfaced_and_not_cached() {
    let fetcher = ScriptedFetcher::scripted(
        vec![Err(FetchError::NotFound { thread_id: ThreadId(9) })],
        thread(9, vec![post(1, None)]),
    );
    let vm = ThreadViewModel::spawn(fetcher, ThreadId(9));
    let mut sub = vm.observe();

    let err = next_event(&mut sub).await.unwrap_err();
    assert_eq!(err, FetchError::NotFound { thread_id: ThreadId(9) });
    assert!(vm.latest().is_none());
    assert!(vm.observe().try_next().is_none());

    vm.trigger_refresh();
    let snapshot = next_event(&mut sub).await.unwrap();
    assert_eq!(keys(&snapshot), vec![1]);
}

// =========================================================================
// refresh
// =========================================================================

#[tokio::test]
async fn refresh_replaces_index_entirely() {
    let fetcher = ScriptedFetcher::scripted(
        vec![Ok(thread(42, vec![post(1, None), post(2, Some(1))]))],
        thread(42, vec![post(3, None)]),
    );
    let vm = ThreadViewModel::spawn(fetcher, ThreadId(42));
    let mut sub = vm.observe();
    assert_eq!(keys(&next_event(&mut sub).await.unwrap()), vec![1, 2]);

    vm.trigger_refresh();
    let second = next_event(&mut sub).await.unwrap();
    assert_eq!(keys(&second), vec![3]);
    assert!(second.posts.get(PostId(1)).is_none());
    assert_eq!(vm.latest().unwrap(), second);
}

#[tokio::test]
async fn refresh_of_stable_backend_is_structurally_equal() {
    let fetcher = ScriptedFetcher::stable(thread(42, vec![post(1, None), post(2, Some(1))]));
    let vm = ThreadViewModel::spawn(fetcher, ThreadId(42));
    let mut sub = vm.observe();
    let first = next_event(&mut sub).await.unwrap();

    vm.trigger_refresh();
    let second = next_event(&mut sub).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(*first, *second);
}

#[tokio::test]
async fn failure_keeps_previous_snapshot_until_recovery() {
    let fetcher = ScriptedFetcher::scripted(
        vec![
            Ok(thread(42, vec![post(1, None)])),
            Err(FetchError::Status { status: 500, body: "oops".into() }),
        ],
        thread(42, vec![post(1, None), post(4, Some(1))]),
    );
    let vm = ThreadViewModel::spawn(fetcher, ThreadId(42));
    let mut sub = vm.observe();
    let first = next_event(&mut sub).await.unwrap();

    vm.trigger_refresh();
    assert!(matches!(next_event(&mut sub).await, Err(FetchError::Status { status: 500, .. })));
    assert_eq!(vm.latest().unwrap(), first);

    // The stream stays usable and new subscribers still see the old snapshot.
    let mut late = vm.observe();
    assert_eq!(late.try_next().unwrap().unwrap(), first);

    vm.trigger_refresh();
    let recovered = next_event(&mut sub).await.unwrap();
    assert_eq!(keys(&recovered), vec![1, 4]);
    assert_eq!(next_event(&mut late).await.unwrap(), recovered);
    assert_eq!(vm.latest().unwrap(), recovered);
}

#[tokio::test]
async fn burst_during_fetch_coalesces_into_one_more_fetch() {
    let gate = Arc::new(Semaphore::new(0));
    let fetcher = ScriptedFetcher::gated(thread(42, vec![post(1, None)]), Arc::clone(&gate));
    let vm = ThreadViewModel::spawn(Arc::clone(&fetcher) as Arc<dyn ThreadFetcher>, ThreadId(42));
    let mut sub = vm.observe();

    wait_for_calls(&fetcher, 1).await;
    for _ in 0..5 {
        vm.trigger_refresh();
    }
    gate.add_permits(10);

    wait_for_calls(&fetcher, 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(vm.fetch_count(), 2);

    // Unread snapshots collapse: only the follow-up fetch's result is pending.
    let newest = sub.try_next().expect("follow-up snapshot pending").unwrap();
    assert!(Arc::ptr_eq(&newest, &vm.latest().unwrap()));
    assert!(sub.try_next().is_none());
}

#[tokio::test]
async fn idle_subscriber_holds_only_the_newest_snapshot() {
    let fetcher = ScriptedFetcher::stable(thread(42, vec![post(1, None)]));
    let vm = ThreadViewModel::spawn(Arc::clone(&fetcher) as Arc<dyn ThreadFetcher>, ThreadId(42));
    let mut reader = vm.observe();
    let mut idle = vm.observe();
    next_event(&mut reader).await.unwrap();

    for _ in 0..500 {
        vm.trigger_refresh();
        next_event(&mut reader).await.unwrap();
    }
    assert_eq!(fetcher.calls(), 501);

    let held = idle.try_next().expect("newest snapshot pending").unwrap();
    assert!(Arc::ptr_eq(&held, &vm.latest().unwrap()));
    assert!(idle.try_next().is_none());
}

#[tokio::test]
async fn trigger_does_not_block_caller_while_fetching() {
    let gate = Arc::new(Semaphore::new(0));
    let fetcher = ScriptedFetcher::gated(thread(42, vec![post(1, None)]), Arc::clone(&gate));
    let vm = ThreadViewModel::spawn(Arc::clone(&fetcher) as Arc<dyn ThreadFetcher>, ThreadId(42));

    wait_for_calls(&fetcher, 1).await;
    vm.trigger_refresh();
    vm.on_posts_modified();
    assert!(vm.latest().is_none());
    gate.add_permits(2);
}

// =========================================================================
// post dialog
// =========================================================================

#[tokio::test]
async fn dismissed_dialog_does_not_refresh() {
    let fetcher = ScriptedFetcher::stable(thread(42, vec![post(1, None)]));
    let vm = ThreadViewModel::spawn(Arc::clone(&fetcher) as Arc<dyn ThreadFetcher>, ThreadId(42));
    let mut sub = vm.observe();
    next_event(&mut sub).await.unwrap();

    vm.on_post_dialog_closed(PostDialogOutcome::Dismissed);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fetcher.calls(), 1);

    vm.on_post_dialog_closed(PostDialogOutcome::Replied);
    next_event(&mut sub).await.unwrap();
    assert_eq!(fetcher.calls(), 2);
}

// =========================================================================
// teardown
// =========================================================================

#[tokio::test]
async fn dropping_view_model_ends_streams() {
    let fetcher = ScriptedFetcher::stable(thread(42, vec![post(1, None)]));
    let vm = ThreadViewModel::spawn(fetcher, ThreadId(42));
    let mut sub = vm.observe();
    next_event(&mut sub).await.unwrap();

    drop(vm);
    let end = tokio::time::timeout(Duration::from_secs(1), sub.next()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn dropped_subscription_is_released() {
    let fetcher = ScriptedFetcher::stable(thread(42, vec![post(1, None)]));
    let vm = ThreadViewModel::spawn(fetcher, ThreadId(42));
    let a = vm.observe();
    let _b = vm.observe();
    assert_eq!(vm.subscriber_count(), 2);
    drop(a);
    assert_eq!(vm.subscriber_count(), 1);
}

// =========================================================================
// layout
// =========================================================================

#[test]
fn snapshot_layout_uses_declared_roots_and_root_post() {
    let mut t = thread(1, vec![post(1, None), post(2, Some(1)), post(3, None), post(4, Some(3))]);
    t.root_posts = vec![PostId(3), PostId(1)];
    let snapshot = ThreadSnapshot::from_thread(t);

    let order: Vec<u64> = snapshot.layout(None, 4).iter().map(|e| e.post.0).collect();
    assert_eq!(order, vec![3, 4, 1, 2]);

    let rooted: Vec<(u64, u8)> = snapshot.layout(Some(PostId(1)), 1).iter().map(|e| (e.post.0, e.depth)).collect();
    assert_eq!(rooted, vec![(1, 0), (2, 0)]);
}
