//! Draft editor for a new post, with generation helpers for empty fields.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use shared::{
    domain::PostId,
    protocol::{parse_generation, NewPostForm},
};
use tracing::info;

use crate::{
    context::ClientConfig,
    lock_unpoisoned,
    notifications::{DisplayMode, NotificationCenter},
    orchestrator::{
        ensure_no_marker, ActionFailure, ActionKind, ActionOrchestrator, ActionOutcome, ActionSpec,
        BusyPolicy,
    },
    pages::{non_blank, Navigation},
    ImageUpload, NewsdeskApi,
};

const PHOTO_PROMPT_LIMIT: usize = 200;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub text: String,
    pub link: String,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostAddView {
    pub draft: PostDraft,
    pub created: Option<PostId>,
}

pub struct PostAddPage {
    api: Arc<dyn NewsdeskApi>,
    actions: ActionOrchestrator,
    view: Mutex<PostAddView>,
}

/// Seed for title generation: the title itself, or a request built from the
/// text when the title is blank.
pub fn title_seed(title: &str, text: &str) -> String {
    if title.trim().is_empty() {
        format!("Generate a headline based on this text: {}", text.trim())
    } else {
        title.to_string()
    }
}

pub fn photo_prompt(title: &str, text: &str) -> String {
    format!("{title} {text}")
        .chars()
        .take(PHOTO_PROMPT_LIMIT)
        .collect()
}

impl PostAddPage {
    pub const DISPLAY_MODE: DisplayMode = DisplayMode::Single;

    pub fn new(api: Arc<dyn NewsdeskApi>, config: &ClientConfig) -> Self {
        let notifications = NotificationCenter::new(Self::DISPLAY_MODE, config.notification_ttl);
        Self {
            api,
            actions: ActionOrchestrator::new(BusyPolicy::Exclusive, notifications),
            view: Mutex::new(PostAddView::default()),
        }
    }

    pub fn actions(&self) -> &ActionOrchestrator {
        &self.actions
    }

    pub fn notifications(&self) -> &NotificationCenter {
        self.actions.notifications()
    }

    pub fn snapshot(&self) -> PostAddView {
        lock_unpoisoned(&self.view).clone()
    }

    fn draft(&self) -> PostDraft {
        lock_unpoisoned(&self.view).draft.clone()
    }

    /// Applies a draft edit unless an action is running.
    pub fn edit(&self, apply: impl FnOnce(&mut PostDraft)) -> bool {
        if self.actions.any_busy() {
            return false;
        }
        apply(&mut lock_unpoisoned(&self.view).draft);
        true
    }

    pub async fn attach_image(&self, path: &Path) -> ActionOutcome<()> {
        self.actions
            .run(
                ActionSpec::new(
                    ActionKind::AttachImage,
                    "Image ready to upload",
                    "Failed to read the image",
                ),
                || async { Ok::<_, ActionFailure>(ImageUpload::from_path(path).await?) },
            )
            .await
            .map(|image| lock_unpoisoned(&self.view).draft.image = Some(image))
    }

    pub fn clear_image(&self) -> bool {
        self.edit(|draft| draft.image = None)
    }

    pub async fn generate_title(&self) -> ActionOutcome<()> {
        let draft = self.draft();
        if draft.title.trim().is_empty() && draft.text.trim().is_empty() {
            return self.actions.reject(
                ActionKind::GenerateTitle,
                "Enter a title or text to generate a headline from",
            );
        }
        let seed = title_seed(&draft.title, &draft.text);
        self.actions
            .run(
                ActionSpec::new(
                    ActionKind::GenerateTitle,
                    "Title generated!",
                    "Failed to generate the title",
                ),
                || async {
                    let response = self.api.generate_title(&seed).await?;
                    ensure_no_marker(&response)?;
                    parse_generation(response)
                        .and_then(|output| output.title)
                        .ok_or(ActionFailure::UnexpectedResponse)
                },
            )
            .await
            .map(|title| lock_unpoisoned(&self.view).draft.title = title)
    }

    pub async fn generate_text(&self) -> ActionOutcome<()> {
        let draft = self.draft();
        let Some(seed) = non_blank(&draft.text).or_else(|| non_blank(&draft.title)) else {
            return self.actions.reject(
                ActionKind::GenerateText,
                "Enter a title or text to generate the text from",
            );
        };
        self.actions
            .run(
                ActionSpec::new(
                    ActionKind::GenerateText,
                    "Text generated!",
                    "Failed to generate the text",
                ),
                || async {
                    let response = self.api.generate_text(&seed).await?;
                    ensure_no_marker(&response)?;
                    parse_generation(response)
                        .and_then(|output| output.text)
                        .ok_or(ActionFailure::UnexpectedResponse)
                },
            )
            .await
            .map(|text| lock_unpoisoned(&self.view).draft.text = text)
    }

    /// Generates an image from the draft and attaches it as a JPEG.
    pub async fn generate_photo(&self) -> ActionOutcome<()> {
        let draft = self.draft();
        if draft.title.trim().is_empty() && draft.text.trim().is_empty() {
            return self.actions.reject(
                ActionKind::GeneratePhoto,
                "Enter a title or text to generate an image from",
            );
        }
        let prompt = photo_prompt(&draft.title, &draft.text);
        self.actions
            .run(
                ActionSpec::new(
                    ActionKind::GeneratePhoto,
                    "Image generated!",
                    "Failed to generate the image",
                ),
                || async {
                    let generated = self.api.generate_photo(&prompt).await?;
                    let encoded = generated
                        .image_base64
                        .ok_or(ActionFailure::UnexpectedResponse)?;
                    Ok::<_, ActionFailure>(ImageUpload::from_base64_jpeg(&encoded)?)
                },
            )
            .await
            .map(|image| lock_unpoisoned(&self.view).draft.image = Some(image))
    }

    /// Creates the post, then uploads the attached image to it.
    pub async fn save(&self) -> ActionOutcome<Navigation> {
        let draft = self.draft();
        if draft.title.trim().is_empty() || draft.text.trim().is_empty() {
            return self
                .actions
                .reject(ActionKind::Save, "Fill in the title and text of the post");
        }
        let form = NewPostForm {
            title: draft.title,
            text: draft.text,
            link: non_blank(&draft.link),
        };
        let image = draft.image;
        self.actions
            .run(
                ActionSpec::new(ActionKind::Save, "Post saved!", "Failed to save the post"),
                || async move {
                    let created = self.api.add_post(form).await?;
                    if let Some(image) = image {
                        let response = self.api.upload_post_image(created.id, image).await?;
                        ensure_no_marker(&response)?;
                    }
                    Ok::<_, ActionFailure>(created.id)
                },
            )
            .await
            .map(|id| {
                info!(post_id = %id, "post: created");
                let mut view = lock_unpoisoned(&self.view);
                view.draft = PostDraft::default();
                view.created = Some(id);
                Navigation::Home
            })
    }
}

#[cfg(test)]
#[path = "../tests/post_add_tests.rs"]
mod tests;
