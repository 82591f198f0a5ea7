//! Fixed-interval refresh loop and the cancellation flag pages check before
//! applying fetched results.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A running refresh loop. The first tick fires one interval after start;
/// ticks that fall behind a slow fetch are delayed, never bunched. Dropping
/// the handle stops the loop.
pub struct PollingHandle {
    canceled: CancelFlag,
    task: JoinHandle<()>,
}

impl PollingHandle {
    pub fn spawn<F, Fut>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let canceled = CancelFlag::new();
        let flag = canceled.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.is_canceled() {
                    break;
                }
                tick().await;
            }
            debug!("polling: loop stopped");
        });
        Self { canceled, task }
    }

    pub fn cancel(&self) {
        self.canceled.cancel();
        self.task.abort();
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.is_canceled()
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
