//! Backend settings, source channels and the parsing controls.

use std::{
    future::Future,
    sync::{Arc, Mutex},
};

use shared::{
    domain::{Channel, ChannelId, Settings},
    protocol::{ParseRunStatus, SettingField},
};
use tracing::{debug, info, warn};

use crate::{
    context::ClientConfig,
    error::ClientError,
    lock_unpoisoned,
    notifications::{DisplayMode, NotificationCenter},
    orchestrator::{
        ensure_no_marker, ActionFailure, ActionKind, ActionOrchestrator, ActionOutcome, ActionSpec,
        BusyPolicy,
    },
    pages::non_blank,
    polling::CancelFlag,
    NewsdeskApi,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsView {
    pub settings: Settings,
    pub channels: Vec<Channel>,
    pub channel_input: String,
    /// `None` until the timer status has been checked.
    pub auto_parsing: Option<bool>,
    pub loading: bool,
    /// Set once settings have been fetched; saving is refused before that.
    pub loaded: bool,
    pub confirm_remove: Option<ChannelId>,
}

pub struct SettingsPage {
    api: Arc<dyn NewsdeskApi>,
    actions: ActionOrchestrator,
    view: Mutex<SettingsView>,
    load_canceled: Mutex<CancelFlag>,
}

impl SettingsPage {
    pub const DISPLAY_MODE: DisplayMode = DisplayMode::stack();

    pub fn new(api: Arc<dyn NewsdeskApi>, config: &ClientConfig) -> Self {
        let notifications = NotificationCenter::new(Self::DISPLAY_MODE, config.notification_ttl);
        Self {
            api,
            actions: ActionOrchestrator::new(BusyPolicy::PerAction, notifications),
            view: Mutex::new(SettingsView::default()),
            load_canceled: Mutex::new(CancelFlag::new()),
        }
    }

    pub fn actions(&self) -> &ActionOrchestrator {
        &self.actions
    }

    pub fn notifications(&self) -> &NotificationCenter {
        self.actions.notifications()
    }

    pub fn snapshot(&self) -> SettingsView {
        lock_unpoisoned(&self.view).clone()
    }

    /// Loads settings, then channels, then the auto-parsing status. A failed
    /// status check is only logged.
    pub async fn load(&self) -> ActionOutcome<()> {
        let canceled = CancelFlag::new();
        *lock_unpoisoned(&self.load_canceled) = canceled.clone();
        lock_unpoisoned(&self.view).loading = true;

        let outcome = self
            .actions
            .run(
                ActionSpec::quiet(ActionKind::LoadSettings, "Failed to load settings"),
                || async {
                    let settings = self.api.get_settings().await?;
                    let channels = self.api.list_channels().await?;
                    Ok::<_, ActionFailure>((settings, channels))
                },
            )
            .await;
        if canceled.is_canceled() {
            debug!("settings: discarding load finished after close");
            return outcome.map(|_| ());
        }
        let outcome = {
            let mut view = lock_unpoisoned(&self.view);
            view.loading = false;
            outcome.map(|(settings, channels)| {
                view.settings = settings;
                view.channels = channels;
                view.loaded = true;
            })
        };

        self.check_auto_parsing(&canceled).await;
        outcome
    }

    async fn check_auto_parsing(&self, canceled: &CancelFlag) {
        let active = match self.api.timer_status().await {
            Ok(status) => status.active,
            Err(err) => {
                warn!(error = %err, "settings: failed to check auto-parsing status");
                false
            }
        };
        if !canceled.is_canceled() {
            lock_unpoisoned(&self.view).auto_parsing = Some(active);
        }
    }

    pub fn close(&self) {
        lock_unpoisoned(&self.load_canceled).cancel();
    }

    pub fn edit(&self, apply: impl FnOnce(&mut Settings)) {
        apply(&mut lock_unpoisoned(&self.view).settings);
    }

    /// Pushes every field through its own setter, then reloads the record.
    pub async fn save_settings(&self) -> ActionOutcome<()> {
        let (loaded, settings) = {
            let view = lock_unpoisoned(&self.view);
            (view.loaded, view.settings.clone())
        };
        if !loaded {
            return self.actions.reject(
                ActionKind::SaveSettings,
                "Settings have not been loaded yet",
            );
        }
        self.actions
            .run(
                ActionSpec::new(
                    ActionKind::SaveSettings,
                    "Settings saved!",
                    "Failed to save settings",
                ),
                || async {
                    for field in SettingField::ALL {
                        let response = self
                            .api
                            .set_setting(field, &field.value_in(&settings))
                            .await?;
                        ensure_no_marker(&response)?;
                    }
                    Ok::<_, ActionFailure>(self.api.get_settings().await?)
                },
            )
            .await
            .map(|settings| lock_unpoisoned(&self.view).settings = settings)
    }

    pub fn set_channel_input(&self, url: impl Into<String>) {
        lock_unpoisoned(&self.view).channel_input = url.into();
    }

    pub async fn add_channel(&self) -> ActionOutcome<()> {
        let input = lock_unpoisoned(&self.view).channel_input.clone();
        let Some(url) = non_blank(&input) else {
            return self
                .actions
                .reject(ActionKind::AddChannel, "Enter a channel URL");
        };
        self.actions
            .run(
                ActionSpec::new(
                    ActionKind::AddChannel,
                    "Channel added!",
                    "Failed to add the channel",
                ),
                || async {
                    ensure_no_marker(&self.api.add_channel(&url).await?)?;
                    Ok::<_, ActionFailure>(self.api.list_channels().await?)
                },
            )
            .await
            .map(|channels| {
                let mut view = lock_unpoisoned(&self.view);
                view.channel_input.clear();
                view.channels = channels;
            })
    }

    pub fn request_remove_channel(&self, id: ChannelId) {
        lock_unpoisoned(&self.view).confirm_remove = Some(id);
    }

    pub fn cancel_remove_channel(&self) {
        lock_unpoisoned(&self.view).confirm_remove = None;
    }

    pub async fn confirm_remove_channel(&self) -> ActionOutcome<()> {
        let Some(id) = lock_unpoisoned(&self.view).confirm_remove else {
            return ActionOutcome::Ignored;
        };
        let outcome = self
            .actions
            .run(
                ActionSpec::new(
                    ActionKind::RemoveChannel,
                    "Channel removed!",
                    "Failed to remove the channel",
                ),
                || async {
                    ensure_no_marker(&self.api.remove_channel(id).await?)?;
                    Ok::<_, ActionFailure>(self.api.list_channels().await?)
                },
            )
            .await;
        if !outcome.is_ignored() {
            self.cancel_remove_channel();
        }
        outcome.map(|channels| lock_unpoisoned(&self.view).channels = channels)
    }

    /// Flips the backend's auto-parsing timer. Ignored until the current
    /// status is known or while a previous toggle is running.
    pub async fn toggle_auto_parsing(&self) -> ActionOutcome<bool> {
        let Some(active) = lock_unpoisoned(&self.view).auto_parsing else {
            return ActionOutcome::Ignored;
        };
        let enable = !active;
        let success = if enable {
            "Auto-parsing enabled"
        } else {
            "Auto-parsing disabled"
        };
        self.actions
            .run(
                ActionSpec::new(
                    ActionKind::ToggleAutoParsing,
                    success,
                    "Failed to switch auto-parsing",
                ),
                || async {
                    let response = if enable {
                        self.api.activate_timer().await?
                    } else {
                        self.api.deactivate_timer().await?
                    };
                    ensure_no_marker(&response)?;
                    Ok::<_, ActionFailure>(enable)
                },
            )
            .await
            .map(|enabled| {
                info!(enabled, "settings: auto-parsing switched");
                lock_unpoisoned(&self.view).auto_parsing = Some(enabled);
                enabled
            })
    }

    pub async fn parse_site(&self) -> ActionOutcome<ParseRunStatus> {
        self.run_parser(ActionKind::ParseSite, "Site parsing", || self.api.parse_site())
            .await
    }

    pub async fn parse_telegram(&self) -> ActionOutcome<ParseRunStatus> {
        self.run_parser(ActionKind::ParseTelegram, "Telegram parsing", || {
            self.api.parse_telegram()
        })
        .await
    }

    async fn run_parser<F, Fut>(
        &self,
        kind: ActionKind,
        label: &str,
        call: F,
    ) -> ActionOutcome<ParseRunStatus>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ParseRunStatus, ClientError>>,
    {
        let outcome = self
            .actions
            .run(
                ActionSpec::quiet(kind, format!("Failed to start {}", label.to_lowercase())),
                || async move { Ok::<_, ActionFailure>(call().await?) },
            )
            .await;
        if let ActionOutcome::Completed(status) = &outcome {
            let notifications = self.notifications();
            match status {
                ParseRunStatus::Completed => notifications.success(format!("{label} completed")),
                ParseRunStatus::AlreadyRunning => {
                    notifications.error(format!("{label} is already running"))
                }
                ParseRunStatus::Other(raw) => notifications.error(format!(
                    "{label} returned an unexpected status ({raw})"
                )),
            };
        }
        outcome
    }
}

impl Drop for SettingsPage {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "../tests/settings_tests.rs"]
mod tests;
