use super::*;

use serde_json::json;
use shared::error::DomainFailure;
use tokio::sync::broadcast::{error::TryRecvError, Receiver};

use crate::{
    fake_api::{post, FakeApi},
    notifications::{Notification, NotificationKind},
    orchestrator::ActionFailure,
};

fn page(api: &FakeApi, id: i64) -> PostDetailPage {
    PostDetailPage::new(PostId(id), api.shared(), &ClientConfig::default())
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

fn with_image(mut post: Post) -> Post {
    post.img_url = Some("https://cdn.example/cover.jpg".into());
    post
}

#[tokio::test]
async fn load_fills_the_form_from_the_post() {
    let mut stored = post(3, "Title", "Body");
    stored.link = Some("https://source.example/a".into());
    let api = FakeApi::with_posts([stored]);
    let page = page(&api, 3);
    assert_eq!(page.id(), PostId(3));

    assert!(page.load().await.is_completed());

    let view = page.snapshot();
    assert!(!view.loading);
    assert_eq!(
        view.form,
        PostForm {
            title: "Title".into(),
            text: "Body".into(),
            link: "https://source.example/a".into(),
        }
    );
}

#[tokio::test]
async fn missing_post_fails_the_load() {
    let api = FakeApi::new();
    let page = page(&api, 404);
    let mut events = page.notifications().subscribe();

    let outcome = page.load().await;

    assert!(matches!(
        outcome.failure(),
        Some(ActionFailure::PostNotFound(PostId(404)))
    ));
    assert!(page.snapshot().post.is_none());
    assert_eq!(drain(&mut events)[0].text, "Failed to load the post");
}

#[tokio::test]
async fn closing_during_load_leaves_the_view_untouched() {
    let api = FakeApi::with_posts([post(3, "Title", "Body")]);
    let gate = api.hold("get_post");
    let page = page(&api, 3);

    let loading = page.load();
    let closing = async {
        while api.calls("get_post") == 0 {
            tokio::task::yield_now().await;
        }
        page.close();
        gate.notify_one();
    };
    let (outcome, ()) = tokio::join!(loading, closing);

    assert!(outcome.is_completed());
    let view = page.snapshot();
    assert!(view.post.is_none());
    assert_eq!(view.form, PostForm::default());
}

#[tokio::test]
async fn save_round_trips_the_edited_fields() {
    let api = FakeApi::with_posts([post(3, "Old", "Old body")]);
    let page = page(&api, 3);
    page.load().await;

    assert!(page.edit(|form| {
        form.title = "New title".into();
        form.text = "New body".into();
    }));
    assert!(page.save().await.is_completed());

    let view = page.snapshot();
    assert_eq!(view.form.title, "New title");
    assert_eq!(view.form.text, "New body");
    assert_eq!(api.post(3).expect("stored").title, "New title");
    assert_eq!(api.calls("get_post"), 2);
}

#[tokio::test]
async fn clearing_the_link_removes_it_from_the_post() {
    let mut stored = post(3, "Title", "Body");
    stored.link = Some("https://source.example/a".into());
    let api = FakeApi::with_posts([stored]);
    let page = page(&api, 3);
    page.load().await;

    page.edit(|form| form.link = "   ".into());
    assert!(page.save().await.is_completed());

    assert_eq!(api.payloads("update_post"), vec!["3|Title|Body|".to_string()]);
    assert!(api.post(3).expect("stored").link.is_none());
    assert!(page.snapshot().form.link.is_empty());
}

#[tokio::test]
async fn publish_navigates_home_on_success() {
    let api = FakeApi::with_posts([post(3, "Title", "Body")]);
    let page = page(&api, 3);
    let mut events = page.notifications().subscribe();

    let outcome = page.publish().await;

    assert_eq!(outcome.completed(), Some(Navigation::Home));
    let notifications = drain(&mut events);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Success);
}

#[tokio::test]
async fn publish_marker_stays_on_the_page() {
    let api = FakeApi::with_posts([post(3, "Title", "Body")]);
    api.respond("publish_post", json!([{ "error": "not_publish" }]));
    let page = page(&api, 3);
    let mut events = page.notifications().subscribe();

    let outcome = page.publish().await;

    assert!(outcome.is_failed());
    let notifications = drain(&mut events);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].text, DomainFailure::ContentTooLong.user_message());
    assert!(api.post(3).expect("stored").is_draft());
}

#[tokio::test]
async fn delete_needs_confirmation() {
    let api = FakeApi::with_posts([post(3, "Title", "Body")]);
    let page = page(&api, 3);

    assert!(page.confirm_delete().await.is_ignored());
    page.request_delete();
    page.cancel_delete();
    assert!(page.confirm_delete().await.is_ignored());
    assert_eq!(api.calls("delete_post"), 0);

    page.request_delete();
    assert_eq!(page.confirm_delete().await.completed(), Some(Navigation::Home));
    assert!(!page.snapshot().confirm_delete);
    assert!(api.post(3).is_none());
}

#[tokio::test]
async fn regenerate_title_only_replaces_the_title() {
    let api = FakeApi::with_posts([post(3, "Title", "Body")]);
    let page = page(&api, 3);
    page.load().await;
    page.edit(|form| form.text = "Unsaved body".into());

    assert!(page.regenerate_title().await.is_completed());

    let view = page.snapshot();
    assert_eq!(view.form.title, "Regenerated: Title");
    assert_eq!(view.form.text, "Unsaved body");
    assert_eq!(api.payloads("regenerate_title"), vec!["3|Title".to_string()]);
}

#[tokio::test]
async fn regenerate_text_sends_the_current_text() {
    let api = FakeApi::with_posts([post(3, "Title", "Body")]);
    let page = page(&api, 3);
    page.load().await;

    assert!(page.regenerate_text().await.is_completed());

    assert_eq!(page.snapshot().form.text, "Regenerated: Body");
    assert_eq!(api.payloads("regenerate_text"), vec!["3|Body".to_string()]);
}

#[tokio::test]
async fn regenerate_photo_prompt_joins_title_and_text() {
    let api = FakeApi::with_posts([post(3, "Storm", "Heavy rain expected")]);
    let page = page(&api, 3);
    page.load().await;

    assert!(page.regenerate_photo().await.is_completed());

    assert_eq!(
        api.payloads("regenerate_photo"),
        vec!["3|Storm. Heavy rain expected".to_string()]
    );
    assert!(page.snapshot().post.expect("post").has_image());
}

#[tokio::test]
async fn regenerate_photo_marker_reports_image_failure() {
    let api = FakeApi::with_posts([post(3, "Storm", "Rain")]);
    api.respond("regenerate_photo", json!({ "error": "not_img" }));
    let page = page(&api, 3);
    page.load().await;
    let mut events = page.notifications().subscribe();

    let outcome = page.regenerate_photo().await;

    assert!(matches!(
        outcome.failure(),
        Some(ActionFailure::Domain(DomainFailure::ImageNotGenerated))
    ));
    assert_eq!(api.calls("get_post"), 1);
    assert_eq!(
        drain(&mut events)[0].text,
        DomainFailure::ImageNotGenerated.user_message()
    );
}

#[tokio::test]
async fn upload_closes_the_dialog_whatever_the_result() {
    let api = FakeApi::with_posts([post(3, "Title", "Body")]);
    let page = page(&api, 3);
    page.load().await;
    let image = ImageUpload {
        filename: "cover.png".into(),
        mime_type: "image/png".into(),
        bytes: vec![1, 2, 3],
    };

    page.open_upload();
    assert!(page.upload_photo(image.clone()).await.is_completed());
    assert!(!page.snapshot().upload_open);
    assert!(page.snapshot().post.expect("post").has_image());

    api.fail("upload_post_image");
    page.open_upload();
    assert!(page.upload_photo(image).await.is_failed());
    assert!(!page.snapshot().upload_open);
}

#[tokio::test]
async fn delete_photo_is_rejected_without_an_image() {
    let api = FakeApi::with_posts([post(3, "Title", "Body")]);
    let page = page(&api, 3);
    page.load().await;

    let outcome = page.delete_photo().await;

    assert!(matches!(outcome.failure(), Some(ActionFailure::Validation(_))));
    assert_eq!(api.calls("delete_post_image"), 0);
}

#[tokio::test]
async fn delete_photo_refetches_the_post() {
    let api = FakeApi::with_posts([with_image(post(3, "Title", "Body"))]);
    let page = page(&api, 3);
    page.load().await;

    assert!(page.delete_photo().await.is_completed());
    assert!(!page.snapshot().post.expect("post").has_image());
}

#[tokio::test]
async fn actions_and_edits_are_blocked_while_another_runs() {
    let api = FakeApi::with_posts([post(3, "Title", "Body")]);
    let page = page(&api, 3);
    page.load().await;
    let gate = api.hold("update_post");

    let saving = page.save();
    let competing = async {
        while api.calls("update_post") == 0 {
            tokio::task::yield_now().await;
        }
        let edited = page.edit(|form| form.title = "Sneaky".into());
        let regenerated = page.regenerate_title().await;
        gate.notify_one();
        (edited, regenerated)
    };
    let (saved, (edited, regenerated)) = tokio::join!(saving, competing);

    assert!(saved.is_completed());
    assert!(!edited);
    assert!(regenerated.is_ignored());
    assert_eq!(api.calls("regenerate_title"), 0);
}
