//! Page controllers. Each page owns its transient view state and an action
//! orchestrator, and hands out snapshots for a front end to render.

use shared::domain::{Post, PostId};

use crate::{error::ClientError, orchestrator::ActionFailure, NewsdeskApi};

pub mod home;
pub mod post_add;
pub mod post_detail;
pub mod settings;

pub use home::{ConfirmAction, HomePage, HomeView};
pub use post_add::{PostAddPage, PostAddView, PostDraft};
pub use post_detail::{PostDetailPage, PostDetailView, PostForm};
pub use settings::{SettingsPage, SettingsView};

/// Where the front end should go after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Stay,
    Home,
}

pub(crate) async fn fetch_post(api: &dyn NewsdeskApi, id: PostId) -> Result<Post, ActionFailure> {
    api.get_post(id)
        .await?
        .ok_or(ActionFailure::PostNotFound(id))
}

/// Message shown in a page's error label for a failed fetch.
pub(crate) fn load_error_label(err: &ClientError) -> String {
    if err.is_transport() {
        "Could not reach the server".to_string()
    } else {
        "The server returned data that could not be read".to_string()
    }
}

pub(crate) fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
