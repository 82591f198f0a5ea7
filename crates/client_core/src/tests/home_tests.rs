use super::*;

use std::time::Duration;

use serde_json::json;
use shared::error::DomainFailure;
use tokio::sync::broadcast::{error::TryRecvError, Receiver};

use crate::{
    fake_api::{post, FakeApi},
    notifications::{Notification, NotificationKind},
    orchestrator::ActionFailure,
};

fn page(api: &FakeApi) -> Arc<HomePage> {
    HomePage::new(api.shared(), &ClientConfig::default())
}

fn drain(events: &mut Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    loop {
        match events.try_recv() {
            Ok(notification) => out.push(notification),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return out,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn mount_loads_the_list_and_clears_loading() {
    let api = FakeApi::with_posts([post(1, "First", "a"), post(2, "Second", "b")]);
    let page = page(&api);

    assert!(page.mount().await);

    let view = page.snapshot();
    assert!(!view.loading);
    assert!(view.error.is_none());
    assert_eq!(view.posts.len(), 2);
    page.unmount();
}

#[tokio::test(start_paused = true)]
async fn failed_first_load_sets_error_label_and_notifies() {
    let api = FakeApi::new();
    api.fail("list_posts");
    let page = page(&api);
    let mut events = page.notifications().subscribe();

    assert!(!page.mount().await);

    let view = page.snapshot();
    assert!(!view.loading);
    assert!(view.error.is_some());
    let notifications = drain(&mut events);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Error);
    page.unmount();
}

#[tokio::test(start_paused = true)]
async fn polling_replaces_the_list_without_notifications() {
    let api = FakeApi::with_posts([post(1, "First", "a")]);
    let page = page(&api);
    let mut events = page.notifications().subscribe();
    page.mount().await;

    api.set_post(post(2, "Arrived later", "b"));
    tokio::time::sleep(Duration::from_millis(5_100)).await;

    assert_eq!(api.calls("list_posts"), 2);
    assert_eq!(page.snapshot().posts.len(), 2);

    api.fail("list_posts");
    tokio::time::sleep(Duration::from_secs(5)).await;
    let view = page.snapshot();
    assert!(view.error.is_some());
    assert_eq!(view.posts.len(), 2);

    api.recover("list_posts");
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(page.snapshot().error.is_none());
    assert!(drain(&mut events).is_empty());
    page.unmount();
}

#[tokio::test(start_paused = true)]
async fn unmount_during_first_fetch_discards_the_result_and_never_polls() {
    let api = FakeApi::with_posts([post(1, "First", "a")]);
    let gate = api.hold("list_posts");
    let page = page(&api);

    let mounting = tokio::spawn({
        let page = Arc::clone(&page);
        async move { page.mount().await }
    });
    while api.calls("list_posts") == 0 {
        tokio::task::yield_now().await;
    }
    page.unmount();
    gate.notify_one();
    mounting.await.expect("mount task");

    let view = page.snapshot();
    assert!(view.posts.is_empty());
    assert!(view.loading);
    assert!(!page.is_mounted());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(api.calls("list_posts"), 1);
}

#[tokio::test(start_paused = true)]
async fn unmount_stops_the_polling_timer() {
    let api = FakeApi::with_posts([post(1, "First", "a")]);
    let page = page(&api);
    page.mount().await;
    tokio::time::sleep(Duration::from_millis(5_100)).await;
    assert_eq!(api.calls("list_posts"), 2);

    page.unmount();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(api.calls("list_posts"), 2);
}

#[tokio::test]
async fn opening_and_cancelling_confirmations_issues_no_requests() {
    let api = FakeApi::with_posts([post(1, "First", "a")]);
    let page = page(&api);

    page.request_publish(PostId(1));
    page.cancel_confirm();
    page.request_delete(PostId(1));
    page.cancel_confirm();

    assert!(page.confirm().await.is_ignored());
    assert_eq!(api.total_calls(), 0);
    assert_eq!(page.snapshot(), HomeView::default());
}

#[tokio::test]
async fn confirmed_publish_refetches_and_notifies_once() {
    let api = FakeApi::with_posts([post(1, "First", "a")]);
    let page = page(&api);
    page.mount().await;
    let mut events = page.notifications().subscribe();

    page.request_publish(PostId(1));
    let outcome = page.confirm().await;

    assert!(outcome.is_completed());
    let view = page.snapshot();
    assert!(view.confirm.is_none());
    assert!(!view.posts[0].is_draft());
    let notifications = drain(&mut events);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Success);
    page.unmount();
}

#[tokio::test]
async fn publish_marker_reports_the_specific_failure_without_refetching() {
    let api = FakeApi::with_posts([post(1, "First", "a")]);
    api.respond("publish_post", json!({ "error": "not_publish" }));
    let page = page(&api);
    page.mount().await;
    let mut events = page.notifications().subscribe();

    page.request_publish(PostId(1));
    let outcome = page.confirm().await;

    assert!(matches!(
        outcome.failure(),
        Some(ActionFailure::Domain(DomainFailure::ContentTooLong))
    ));
    assert_eq!(api.calls("list_posts"), 1);
    let view = page.snapshot();
    assert!(view.confirm.is_none());
    assert!(view.posts[0].is_draft());
    let notifications = drain(&mut events);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].text, DomainFailure::ContentTooLong.user_message());
    page.unmount();
}

#[tokio::test]
async fn confirmed_delete_removes_the_post_from_the_list() {
    let api = FakeApi::with_posts([post(1, "First", "a"), post(2, "Second", "b")]);
    let page = page(&api);
    page.mount().await;

    page.request_delete(PostId(1));
    assert!(page.confirm().await.is_completed());

    let ids: Vec<_> = page.snapshot().posts.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![PostId(2)]);
    page.unmount();
}

#[tokio::test]
async fn double_confirm_sends_a_single_publish() {
    let api = FakeApi::with_posts([post(1, "First", "a")]);
    let gate = api.hold("publish_post");
    let page = page(&api);

    page.request_publish(PostId(1));
    let first = page.confirm();
    let second = async {
        while api.calls("publish_post") == 0 {
            tokio::task::yield_now().await;
        }
        let outcome = page.confirm().await;
        gate.notify_one();
        outcome
    };
    let (first, second) = tokio::join!(first, second);

    assert!(first.is_completed());
    assert!(second.is_ignored());
    assert_eq!(api.calls("publish_post"), 1);
}

#[tokio::test]
async fn manual_refresh_notifies_success() {
    let api = FakeApi::with_posts([post(1, "First", "a")]);
    let page = page(&api);
    let mut events = page.notifications().subscribe();

    assert!(page.refresh().await.is_completed());

    assert_eq!(page.snapshot().posts.len(), 1);
    let notifications = drain(&mut events);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].text, "News refreshed");
}
