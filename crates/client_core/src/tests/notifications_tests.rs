use super::*;

const TTL: Duration = Duration::from_secs(3);

#[test]
fn single_mode_replaces_the_visible_message() {
    let now = Instant::now();
    let mut queue = NotificationQueue::new(DisplayMode::Single, TTL);

    queue.push("saved", NotificationKind::Success, now);
    let second = queue.push("publish failed", NotificationKind::Error, now);

    assert_eq!(queue.visible(), vec![second]);
}

#[test]
fn stack_mode_keeps_order_and_caps_visible_entries() {
    let now = Instant::now();
    let mut queue = NotificationQueue::new(DisplayMode::Stack { max_visible: 2 }, TTL);

    queue.push("one", NotificationKind::Success, now);
    queue.push("two", NotificationKind::Success, now);
    queue.push("three", NotificationKind::Error, now);

    let texts: Vec<_> = queue.visible().into_iter().map(|n| n.text).collect();
    assert_eq!(texts, vec!["two", "three"]);
}

#[test]
fn prune_removes_oldest_entries_once_their_time_is_up() {
    let start = Instant::now();
    let mut queue = NotificationQueue::new(DisplayMode::stack(), TTL);

    queue.push("first", NotificationKind::Success, start);
    queue.push("second", NotificationKind::Success, start + Duration::from_secs(2));

    assert_eq!(queue.prune_expired(start + Duration::from_millis(2_999)), 0);
    assert_eq!(queue.prune_expired(start + TTL), 1);
    assert_eq!(queue.visible()[0].text, "second");
    assert_eq!(queue.prune_expired(start + Duration::from_secs(5)), 1);
    assert!(queue.is_empty());
}

#[test]
fn ids_are_unique_and_dismiss_targets_one_entry() {
    let now = Instant::now();
    let mut queue = NotificationQueue::new(DisplayMode::stack(), TTL);
    let a = queue.push("a", NotificationKind::Success, now);
    let b = queue.push("b", NotificationKind::Success, now);
    assert_ne!(a.id, b.id);

    assert!(queue.dismiss(a.id));
    assert!(!queue.dismiss(a.id));
    assert_eq!(queue.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn center_expires_notifications_without_manual_dismissal() {
    let center = NotificationCenter::new(DisplayMode::Single, TTL);
    center.success("Post saved!");
    assert_eq!(center.visible().len(), 1);

    tokio::time::sleep(Duration::from_millis(2_900)).await;
    assert_eq!(center.visible().len(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(center.visible().is_empty());
}

#[tokio::test(start_paused = true)]
async fn center_broadcasts_every_notification() {
    let center = NotificationCenter::new(DisplayMode::stack(), TTL);
    let mut events = center.subscribe();

    center.success("Channel added!");
    center.error("Failed to remove the channel");

    let first = events.recv().await.expect("first");
    let second = events.recv().await.expect("second");
    assert_eq!(first.kind, NotificationKind::Success);
    assert_eq!(second.text, "Failed to remove the channel");
    assert_eq!(center.visible().len(), 2);

    assert!(center.dismiss(first.id));
    assert_eq!(center.visible(), vec![second]);
}
