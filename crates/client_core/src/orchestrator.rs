//! Sequencing of operator-triggered actions: busy flag → backend call →
//! state update → notification → busy flag cleared.

use std::{
    collections::{HashSet, VecDeque},
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use serde_json::Value;
use shared::{domain::PostId, error::DomainFailure, protocol::domain_marker};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{error::ClientError, lock_unpoisoned, notifications::NotificationCenter};

const HISTORY_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    LoadList,
    RefreshList,
    LoadPost,
    Save,
    Publish,
    Delete,
    RegenerateTitle,
    RegenerateText,
    RegeneratePhoto,
    UploadPhoto,
    DeletePhoto,
    GenerateTitle,
    GenerateText,
    GeneratePhoto,
    AttachImage,
    LoadSettings,
    SaveSettings,
    AddChannel,
    RemoveChannel,
    ToggleAutoParsing,
    ParseSite,
    ParseTelegram,
}

impl ActionKind {
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::LoadList => "load_list",
            ActionKind::RefreshList => "refresh_list",
            ActionKind::LoadPost => "load_post",
            ActionKind::Save => "save",
            ActionKind::Publish => "publish",
            ActionKind::Delete => "delete",
            ActionKind::RegenerateTitle => "regenerate_title",
            ActionKind::RegenerateText => "regenerate_text",
            ActionKind::RegeneratePhoto => "regenerate_photo",
            ActionKind::UploadPhoto => "upload_photo",
            ActionKind::DeletePhoto => "delete_photo",
            ActionKind::GenerateTitle => "generate_title",
            ActionKind::GenerateText => "generate_text",
            ActionKind::GeneratePhoto => "generate_photo",
            ActionKind::AttachImage => "attach_image",
            ActionKind::LoadSettings => "load_settings",
            ActionKind::SaveSettings => "save_settings",
            ActionKind::AddChannel => "add_channel",
            ActionKind::RemoveChannel => "remove_channel",
            ActionKind::ToggleAutoParsing => "toggle_auto_parsing",
            ActionKind::ParseSite => "parse_site",
            ActionKind::ParseTelegram => "parse_telegram",
        }
    }
}

/// How busy flags interact on one page. `PerAction` only blocks a second run
/// of the same kind; `Exclusive` blocks every action while any one is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyPolicy {
    PerAction,
    Exclusive,
}

#[derive(Debug, Error)]
pub enum ActionFailure {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("{0}")]
    Domain(#[from] DomainFailure),
    #[error("unexpected response format")]
    UnexpectedResponse,
    #[error("post {0} was not found")]
    PostNotFound(PostId),
    #[error("{0}")]
    Validation(String),
}

impl ActionFailure {
    /// Domain markers and validation problems carry their own wording; every
    /// other failure is reported with the operation's generic message.
    pub fn notification_text(&self, generic: &str) -> String {
        match self {
            ActionFailure::Domain(failure) => failure.user_message(),
            ActionFailure::UnexpectedResponse => {
                "Unexpected response format from the server.".to_string()
            }
            ActionFailure::Validation(message) => message.clone(),
            ActionFailure::Client(_) | ActionFailure::PostNotFound(_) => generic.to_string(),
        }
    }
}

/// Turns a domain error marker in an otherwise successful response into a
/// failure.
pub fn ensure_no_marker(response: &Value) -> Result<(), ActionFailure> {
    match domain_marker(response) {
        Some(failure) => Err(ActionFailure::Domain(failure)),
        None => Ok(()),
    }
}

#[derive(Debug)]
pub enum ActionOutcome<T> {
    Completed(T),
    Failed(ActionFailure),
    /// The trigger was dropped because the action (or, under an exclusive
    /// policy, another action) was still in flight.
    Ignored,
}

impl<T> ActionOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, ActionOutcome::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ActionOutcome::Failed(_))
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, ActionOutcome::Ignored)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            ActionOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ActionFailure> {
        match self {
            ActionOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ActionOutcome<U> {
        match self {
            ActionOutcome::Completed(value) => ActionOutcome::Completed(f(value)),
            ActionOutcome::Failed(failure) => ActionOutcome::Failed(failure),
            ActionOutcome::Ignored => ActionOutcome::Ignored,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub kind: ActionKind,
    pub success: Option<String>,
    pub failure: String,
}

impl ActionSpec {
    pub fn new(kind: ActionKind, success: impl Into<String>, failure: impl Into<String>) -> Self {
        Self {
            kind,
            success: Some(success.into()),
            failure: failure.into(),
        }
    }

    /// No notification on success; failures are still reported.
    pub fn quiet(kind: ActionKind, failure: impl Into<String>) -> Self {
        Self {
            kind,
            success: None,
            failure: failure.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    Pending,
    Succeeded,
    Failed(String),
}

/// One orchestrated action, as a request object rather than a bare flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub seq: u64,
    pub kind: ActionKind,
    pub status: ActionStatus,
}

pub struct ActionOrchestrator {
    policy: BusyPolicy,
    busy: Mutex<HashSet<ActionKind>>,
    history: Mutex<VecDeque<ActionRecord>>,
    next_seq: AtomicU64,
    notifications: NotificationCenter,
}

struct BusyGuard<'a> {
    busy: &'a Mutex<HashSet<ActionKind>>,
    kind: ActionKind,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        lock_unpoisoned(self.busy).remove(&self.kind);
    }
}

impl ActionOrchestrator {
    pub fn new(policy: BusyPolicy, notifications: NotificationCenter) -> Self {
        Self {
            policy,
            busy: Mutex::new(HashSet::new()),
            history: Mutex::new(VecDeque::new()),
            next_seq: AtomicU64::new(1),
            notifications,
        }
    }

    pub fn policy(&self) -> BusyPolicy {
        self.policy
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn is_busy(&self, kind: ActionKind) -> bool {
        lock_unpoisoned(&self.busy).contains(&kind)
    }

    pub fn any_busy(&self) -> bool {
        !lock_unpoisoned(&self.busy).is_empty()
    }

    /// Whether a trigger of `kind` would currently be dropped; front ends use
    /// it to disable controls.
    pub fn is_blocked(&self, kind: ActionKind) -> bool {
        let busy = lock_unpoisoned(&self.busy);
        match self.policy {
            BusyPolicy::PerAction => busy.contains(&kind),
            BusyPolicy::Exclusive => !busy.is_empty(),
        }
    }

    pub fn busy_kinds(&self) -> Vec<ActionKind> {
        lock_unpoisoned(&self.busy).iter().copied().collect()
    }

    pub fn history(&self) -> Vec<ActionRecord> {
        lock_unpoisoned(&self.history).iter().cloned().collect()
    }

    /// Client-side validation failure: reported to the operator, no request
    /// issued, nothing recorded.
    pub fn reject<T>(&self, kind: ActionKind, message: impl Into<String>) -> ActionOutcome<T> {
        let message = message.into();
        warn!(action = kind.name(), reason = %message, "action rejected before dispatch");
        self.notifications.error(message.clone());
        ActionOutcome::Failed(ActionFailure::Validation(message))
    }

    pub async fn run<T, F, Fut>(&self, spec: ActionSpec, op: F) -> ActionOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ActionFailure>>,
    {
        let Some(_guard) = self.try_begin(spec.kind) else {
            debug!(action = spec.kind.name(), "action already in flight, trigger ignored");
            return ActionOutcome::Ignored;
        };
        let seq = self.record_pending(spec.kind);

        match op().await {
            Ok(value) => {
                self.record_status(seq, ActionStatus::Succeeded);
                info!(action = spec.kind.name(), seq, "action completed");
                if let Some(message) = spec.success {
                    self.notifications.success(message);
                }
                ActionOutcome::Completed(value)
            }
            Err(failure) => {
                error!(action = spec.kind.name(), seq, error = %failure, "action failed");
                self.record_status(seq, ActionStatus::Failed(failure.to_string()));
                self.notifications
                    .error(failure.notification_text(&spec.failure));
                ActionOutcome::Failed(failure)
            }
        }
    }

    fn try_begin(&self, kind: ActionKind) -> Option<BusyGuard<'_>> {
        let mut busy = lock_unpoisoned(&self.busy);
        let blocked = match self.policy {
            BusyPolicy::PerAction => busy.contains(&kind),
            BusyPolicy::Exclusive => !busy.is_empty(),
        };
        if blocked {
            return None;
        }
        busy.insert(kind);
        Some(BusyGuard {
            busy: &self.busy,
            kind,
        })
    }

    fn record_pending(&self, kind: ActionKind) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut history = lock_unpoisoned(&self.history);
        if history.len() >= HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(ActionRecord {
            seq,
            kind,
            status: ActionStatus::Pending,
        });
        seq
    }

    fn record_status(&self, seq: u64, status: ActionStatus) {
        if let Some(record) = lock_unpoisoned(&self.history)
            .iter_mut()
            .find(|record| record.seq == seq)
        {
            record.status = status;
        }
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
