//! The post list: initial fetch, silent polling while mounted, and the
//! publish/delete confirmation flow.

use std::sync::{Arc, Mutex, Weak};

use shared::domain::{Post, PostId};
use tracing::{debug, info, warn};

use crate::{
    context::ClientConfig,
    lock_unpoisoned,
    notifications::{DisplayMode, NotificationCenter},
    orchestrator::{
        ensure_no_marker, ActionFailure, ActionKind, ActionOrchestrator, ActionOutcome, ActionSpec,
        BusyPolicy,
    },
    pages::load_error_label,
    polling::{CancelFlag, PollingHandle},
    NewsdeskApi,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    Publish(PostId),
    Delete(PostId),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HomeView {
    pub posts: Vec<Post>,
    pub loading: bool,
    pub error: Option<String>,
    pub confirm: Option<ConfirmAction>,
}

struct Mounted {
    canceled: CancelFlag,
    polling: Option<PollingHandle>,
}

pub struct HomePage {
    api: Arc<dyn NewsdeskApi>,
    actions: ActionOrchestrator,
    config: ClientConfig,
    view: Mutex<HomeView>,
    mounted: Mutex<Option<Mounted>>,
}

impl HomePage {
    pub const DISPLAY_MODE: DisplayMode = DisplayMode::Single;

    pub fn new(api: Arc<dyn NewsdeskApi>, config: &ClientConfig) -> Arc<Self> {
        let notifications = NotificationCenter::new(Self::DISPLAY_MODE, config.notification_ttl);
        Arc::new(Self {
            api,
            actions: ActionOrchestrator::new(BusyPolicy::PerAction, notifications),
            config: config.clone(),
            view: Mutex::new(HomeView::default()),
            mounted: Mutex::new(None),
        })
    }

    pub fn actions(&self) -> &ActionOrchestrator {
        &self.actions
    }

    pub fn notifications(&self) -> &NotificationCenter {
        self.actions.notifications()
    }

    pub fn snapshot(&self) -> HomeView {
        lock_unpoisoned(&self.view).clone()
    }

    pub fn is_mounted(&self) -> bool {
        lock_unpoisoned(&self.mounted).is_some()
    }

    /// Fetches the list once, then keeps it fresh on the configured interval
    /// until [`HomePage::unmount`]. Returns whether the first fetch succeeded.
    pub async fn mount(self: &Arc<Self>) -> bool {
        let canceled = CancelFlag::new();
        {
            let mut mounted = lock_unpoisoned(&self.mounted);
            if let Some(previous) = mounted.take() {
                previous.canceled.cancel();
            }
            *mounted = Some(Mounted {
                canceled: canceled.clone(),
                polling: None,
            });
        }
        lock_unpoisoned(&self.view).loading = true;
        info!("home: mounted");

        let loaded = self.fetch_list(&canceled, true).await;
        if canceled.is_canceled() {
            return loaded;
        }

        let page = Arc::downgrade(self);
        let flag = canceled.clone();
        let handle = PollingHandle::spawn(self.config.poll_interval, move || {
            let page = Weak::clone(&page);
            let flag = flag.clone();
            async move {
                if let Some(page) = page.upgrade() {
                    page.fetch_list(&flag, false).await;
                }
            }
        });
        if let Some(mounted) = lock_unpoisoned(&self.mounted).as_mut() {
            if !mounted.canceled.is_canceled() {
                mounted.polling = Some(handle);
            }
        }
        loaded
    }

    /// Stops polling and discards the result of any fetch still in flight.
    pub fn unmount(&self) {
        if let Some(mounted) = lock_unpoisoned(&self.mounted).take() {
            mounted.canceled.cancel();
            if let Some(polling) = mounted.polling {
                polling.cancel();
            }
            info!("home: unmounted");
        }
    }

    async fn fetch_list(&self, canceled: &CancelFlag, notify_failure: bool) -> bool {
        let result = self.api.list_posts().await;
        if canceled.is_canceled() {
            debug!("home: discarding list fetched after unmount");
            return false;
        }

        let mut view = lock_unpoisoned(&self.view);
        view.loading = false;
        match result {
            Ok(posts) => {
                debug!(count = posts.len(), "home: list refreshed");
                view.posts = posts;
                view.error = None;
                true
            }
            Err(err) => {
                warn!(error = %err, "home: failed to fetch posts");
                view.error = Some(load_error_label(&err));
                drop(view);
                if notify_failure {
                    self.notifications().error("Failed to load news");
                }
                false
            }
        }
    }

    fn current_flag(&self) -> CancelFlag {
        lock_unpoisoned(&self.mounted)
            .as_ref()
            .map(|mounted| mounted.canceled.clone())
            .unwrap_or_default()
    }

    pub async fn refresh(&self) -> ActionOutcome<()> {
        let canceled = self.current_flag();
        self.actions
            .run(
                ActionSpec::new(ActionKind::RefreshList, "News refreshed", "Failed to refresh news"),
                || async { Ok::<_, ActionFailure>(self.api.list_posts().await?) },
            )
            .await
            .map(|posts| {
                if !canceled.is_canceled() {
                    let mut view = lock_unpoisoned(&self.view);
                    view.posts = posts;
                    view.error = None;
                    view.loading = false;
                }
            })
    }

    pub fn request_publish(&self, id: PostId) {
        lock_unpoisoned(&self.view).confirm = Some(ConfirmAction::Publish(id));
    }

    pub fn request_delete(&self, id: PostId) {
        lock_unpoisoned(&self.view).confirm = Some(ConfirmAction::Delete(id));
    }

    pub fn cancel_confirm(&self) {
        lock_unpoisoned(&self.view).confirm = None;
    }

    /// Runs the action waiting in the confirmation modal. The modal closes
    /// once the action has finished, whatever the result.
    pub async fn confirm(&self) -> ActionOutcome<()> {
        let Some(action) = lock_unpoisoned(&self.view).confirm else {
            return ActionOutcome::Ignored;
        };

        let outcome = match action {
            ConfirmAction::Publish(id) => {
                self.actions
                    .run(
                        ActionSpec::new(
                            ActionKind::Publish,
                            "Post published!",
                            "Failed to publish the post",
                        ),
                        || async move {
                            let response = self.api.publish_post(id).await?;
                            ensure_no_marker(&response)
                        },
                    )
                    .await
            }
            ConfirmAction::Delete(id) => {
                self.actions
                    .run(
                        ActionSpec::new(
                            ActionKind::Delete,
                            "Post deleted!",
                            "Failed to delete the post",
                        ),
                        || async move {
                            let response = self.api.delete_post(id).await?;
                            ensure_no_marker(&response)
                        },
                    )
                    .await
            }
        };

        if outcome.is_ignored() {
            return outcome;
        }
        self.cancel_confirm();
        if outcome.is_completed() {
            let canceled = self.current_flag();
            self.fetch_list(&canceled, false).await;
        }
        outcome
    }
}

impl Drop for HomePage {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
#[path = "../tests/home_tests.rs"]
mod tests;
