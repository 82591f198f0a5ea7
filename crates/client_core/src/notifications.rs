//! Transient operator notifications with timed expiry.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{sync::broadcast, time::Instant};

use crate::{context::DEFAULT_NOTIFICATION_TTL, lock_unpoisoned};

pub const DEFAULT_STACK_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub text: String,
    pub kind: NotificationKind,
}

/// `Single` shows one message at a time, a new one replacing the old.
/// `Stack` keeps several, expiring the oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Single,
    Stack { max_visible: usize },
}

impl DisplayMode {
    pub const fn stack() -> Self {
        DisplayMode::Stack {
            max_visible: DEFAULT_STACK_LIMIT,
        }
    }
}

#[derive(Debug)]
struct Entry {
    notification: Notification,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct NotificationQueue {
    mode: DisplayMode,
    ttl: Duration,
    next_id: u64,
    entries: VecDeque<Entry>,
}

impl NotificationQueue {
    pub fn new(mode: DisplayMode, ttl: Duration) -> Self {
        Self {
            mode,
            ttl,
            next_id: 1,
            entries: VecDeque::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn push(&mut self, text: impl Into<String>, kind: NotificationKind, now: Instant) -> Notification {
        let notification = Notification {
            id: self.next_id,
            text: text.into(),
            kind,
        };
        self.next_id += 1;

        match self.mode {
            DisplayMode::Single => self.entries.clear(),
            DisplayMode::Stack { max_visible } => {
                while self.entries.len() >= max_visible.max(1) {
                    self.entries.pop_front();
                }
            }
        }
        self.entries.push_back(Entry {
            notification: notification.clone(),
            expires_at: now + self.ttl,
        });
        notification
    }

    /// Drops every entry whose display time is over. Entries share one ttl,
    /// so expiry always proceeds from the front.
    pub fn prune_expired(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        while self
            .entries
            .front()
            .is_some_and(|entry| entry.expires_at <= now)
        {
            self.entries.pop_front();
            removed += 1;
        }
        removed
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.notification.id != id);
        before != self.entries.len()
    }

    pub fn visible(&self) -> Vec<Notification> {
        self.entries
            .iter()
            .map(|entry| entry.notification.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared handle over a page's notification queue. Every enqueued message is
/// also broadcast so a front end can render it as it arrives.
#[derive(Clone)]
pub struct NotificationCenter {
    queue: Arc<Mutex<NotificationQueue>>,
    events: broadcast::Sender<Notification>,
}

impl NotificationCenter {
    pub fn new(mode: DisplayMode, ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            queue: Arc::new(Mutex::new(NotificationQueue::new(mode, ttl))),
            events,
        }
    }

    pub fn success(&self, text: impl Into<String>) -> Notification {
        self.notify(text, NotificationKind::Success)
    }

    pub fn error(&self, text: impl Into<String>) -> Notification {
        self.notify(text, NotificationKind::Error)
    }

    pub fn notify(&self, text: impl Into<String>, kind: NotificationKind) -> Notification {
        let (notification, ttl) = {
            let mut queue = lock_unpoisoned(&self.queue);
            let notification = queue.push(text, kind, Instant::now());
            (notification, queue.ttl())
        };
        let _ = self.events.send(notification.clone());

        // Outside a runtime the queue is only pruned on demand.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let queue = Arc::clone(&self.queue);
            runtime.spawn(async move {
                tokio::time::sleep(ttl).await;
                lock_unpoisoned(&queue).prune_expired(Instant::now());
            });
        }
        notification
    }

    pub fn dismiss(&self, id: u64) -> bool {
        lock_unpoisoned(&self.queue).dismiss(id)
    }

    pub fn visible(&self) -> Vec<Notification> {
        let mut queue = lock_unpoisoned(&self.queue);
        queue.prune_expired(Instant::now());
        queue.visible()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DisplayMode::Single, DEFAULT_NOTIFICATION_TTL)
    }
}

#[cfg(test)]
#[path = "tests/notifications_tests.rs"]
mod tests;
