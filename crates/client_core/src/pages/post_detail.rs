//! Editor for one existing post.

use std::sync::{Arc, Mutex};

use shared::{
    domain::{Post, PostId},
    protocol::UpdatePostForm,
};
use tracing::{debug, info};

use crate::{
    context::ClientConfig,
    lock_unpoisoned,
    notifications::{DisplayMode, NotificationCenter},
    orchestrator::{
        ensure_no_marker, ActionKind, ActionOrchestrator, ActionOutcome, ActionSpec, BusyPolicy,
    },
    pages::{fetch_post, Navigation},
    polling::CancelFlag,
    ImageUpload, NewsdeskApi,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostForm {
    pub title: String,
    pub text: String,
    pub link: String,
}

impl PostForm {
    fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            text: post.text.clone(),
            link: post.link.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDetailView {
    pub post: Option<Post>,
    pub form: PostForm,
    pub loading: bool,
    pub confirm_delete: bool,
    pub upload_open: bool,
}

pub struct PostDetailPage {
    id: PostId,
    api: Arc<dyn NewsdeskApi>,
    actions: ActionOrchestrator,
    view: Mutex<PostDetailView>,
    load_canceled: Mutex<CancelFlag>,
}

impl PostDetailPage {
    pub const DISPLAY_MODE: DisplayMode = DisplayMode::Single;

    pub fn new(id: PostId, api: Arc<dyn NewsdeskApi>, config: &ClientConfig) -> Self {
        let notifications = NotificationCenter::new(Self::DISPLAY_MODE, config.notification_ttl);
        Self {
            id,
            api,
            actions: ActionOrchestrator::new(BusyPolicy::Exclusive, notifications),
            view: Mutex::new(PostDetailView::default()),
            load_canceled: Mutex::new(CancelFlag::new()),
        }
    }

    pub fn id(&self) -> PostId {
        self.id
    }

    pub fn actions(&self) -> &ActionOrchestrator {
        &self.actions
    }

    pub fn notifications(&self) -> &NotificationCenter {
        self.actions.notifications()
    }

    pub fn snapshot(&self) -> PostDetailView {
        lock_unpoisoned(&self.view).clone()
    }

    pub async fn load(&self) -> ActionOutcome<()> {
        let canceled = CancelFlag::new();
        *lock_unpoisoned(&self.load_canceled) = canceled.clone();
        lock_unpoisoned(&self.view).loading = true;

        let outcome = self
            .actions
            .run(
                ActionSpec::quiet(ActionKind::LoadPost, "Failed to load the post"),
                || fetch_post(self.api.as_ref(), self.id),
            )
            .await;
        if canceled.is_canceled() {
            debug!(post_id = %self.id, "post: discarding load finished after close");
            return outcome.map(|_| ());
        }

        let mut view = lock_unpoisoned(&self.view);
        view.loading = false;
        outcome.map(|post| {
            view.form = PostForm::from_post(&post);
            view.post = Some(post);
        })
    }

    /// Leaves the page: a load still in flight will not touch the view.
    pub fn close(&self) {
        lock_unpoisoned(&self.load_canceled).cancel();
    }

    /// Applies a form edit unless an action is running. Returns whether the
    /// edit was taken.
    pub fn edit(&self, apply: impl FnOnce(&mut PostForm)) -> bool {
        if self.actions.any_busy() {
            return false;
        }
        apply(&mut lock_unpoisoned(&self.view).form);
        true
    }

    fn form(&self) -> PostForm {
        lock_unpoisoned(&self.view).form.clone()
    }

    fn replace_post(&self, post: Post, update_form: impl FnOnce(&mut PostForm, &Post)) {
        let mut view = lock_unpoisoned(&self.view);
        update_form(&mut view.form, &post);
        view.post = Some(post);
    }

    pub async fn save(&self) -> ActionOutcome<()> {
        let form = self.form();
        let request = UpdatePostForm {
            id: self.id,
            title: form.title,
            text: form.text,
            link: form.link.trim().to_string(),
        };
        self.actions
            .run(
                ActionSpec::new(ActionKind::Save, "Post saved!", "Failed to save the post"),
                || async move {
                    ensure_no_marker(&self.api.update_post(request).await?)?;
                    fetch_post(self.api.as_ref(), self.id).await
                },
            )
            .await
            .map(|post| {
                self.replace_post(post, |form, post| *form = PostForm::from_post(post));
            })
    }

    pub async fn publish(&self) -> ActionOutcome<Navigation> {
        let outcome = self
            .actions
            .run(
                ActionSpec::new(
                    ActionKind::Publish,
                    "Post published!",
                    "Failed to publish the post",
                ),
                || async {
                    let response = self.api.publish_post(self.id).await?;
                    ensure_no_marker(&response)
                },
            )
            .await;
        if outcome.is_completed() {
            info!(post_id = %self.id, "post: published");
        }
        outcome.map(|()| Navigation::Home)
    }

    pub fn request_delete(&self) {
        lock_unpoisoned(&self.view).confirm_delete = true;
    }

    pub fn cancel_delete(&self) {
        lock_unpoisoned(&self.view).confirm_delete = false;
    }

    pub async fn confirm_delete(&self) -> ActionOutcome<Navigation> {
        if !lock_unpoisoned(&self.view).confirm_delete {
            return ActionOutcome::Ignored;
        }
        let outcome = self
            .actions
            .run(
                ActionSpec::new(ActionKind::Delete, "Post deleted!", "Failed to delete the post"),
                || async {
                    let response = self.api.delete_post(self.id).await?;
                    ensure_no_marker(&response)
                },
            )
            .await;
        if !outcome.is_ignored() {
            self.cancel_delete();
        }
        outcome.map(|()| Navigation::Home)
    }

    pub async fn regenerate_title(&self) -> ActionOutcome<()> {
        let title = self.form().title;
        self.actions
            .run(
                ActionSpec::new(
                    ActionKind::RegenerateTitle,
                    "Title regenerated!",
                    "Failed to regenerate the title",
                ),
                || async {
                    ensure_no_marker(&self.api.regenerate_title(self.id, &title).await?)?;
                    fetch_post(self.api.as_ref(), self.id).await
                },
            )
            .await
            .map(|post| {
                self.replace_post(post, |form, post| form.title = post.title.clone());
            })
    }

    pub async fn regenerate_text(&self) -> ActionOutcome<()> {
        let text = self.form().text;
        self.actions
            .run(
                ActionSpec::new(
                    ActionKind::RegenerateText,
                    "Text regenerated!",
                    "Failed to regenerate the text",
                ),
                || async {
                    ensure_no_marker(&self.api.regenerate_text(self.id, &text).await?)?;
                    fetch_post(self.api.as_ref(), self.id).await
                },
            )
            .await
            .map(|post| {
                self.replace_post(post, |form, post| form.text = post.text.clone());
            })
    }

    /// Asks for a new image built from the current title and text. A
    /// `not_img` marker leaves the post untouched.
    pub async fn regenerate_photo(&self) -> ActionOutcome<()> {
        let form = self.form();
        let prompt = format!("{}. {}", form.title, form.text);
        self.actions
            .run(
                ActionSpec::new(
                    ActionKind::RegeneratePhoto,
                    "Image regenerated!",
                    "Failed to regenerate the image",
                ),
                || async {
                    ensure_no_marker(&self.api.regenerate_photo(self.id, &prompt).await?)?;
                    fetch_post(self.api.as_ref(), self.id).await
                },
            )
            .await
            .map(|post| self.replace_post(post, |_, _| {}))
    }

    pub fn open_upload(&self) {
        lock_unpoisoned(&self.view).upload_open = true;
    }

    pub fn close_upload(&self) {
        lock_unpoisoned(&self.view).upload_open = false;
    }

    pub async fn upload_photo(&self, image: ImageUpload) -> ActionOutcome<()> {
        let outcome = self
            .actions
            .run(
                ActionSpec::new(
                    ActionKind::UploadPhoto,
                    "Image uploaded!",
                    "Failed to upload the image",
                ),
                || async {
                    ensure_no_marker(&self.api.upload_post_image(self.id, image).await?)?;
                    fetch_post(self.api.as_ref(), self.id).await
                },
            )
            .await;
        if !outcome.is_ignored() {
            self.close_upload();
        }
        outcome.map(|post| self.replace_post(post, |_, _| {}))
    }

    pub async fn delete_photo(&self) -> ActionOutcome<()> {
        let has_image = lock_unpoisoned(&self.view)
            .post
            .as_ref()
            .is_some_and(Post::has_image);
        if !has_image {
            return self
                .actions
                .reject(ActionKind::DeletePhoto, "This post has no image to delete");
        }
        self.actions
            .run(
                ActionSpec::new(
                    ActionKind::DeletePhoto,
                    "Image deleted!",
                    "Failed to delete the image",
                ),
                || async {
                    ensure_no_marker(&self.api.delete_post_image(self.id).await?)?;
                    fetch_post(self.api.as_ref(), self.id).await
                },
            )
            .await
            .map(|post| self.replace_post(post, |_, _| {}))
    }
}

impl Drop for PostDetailPage {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "../tests/post_detail_tests.rs"]
mod tests;
