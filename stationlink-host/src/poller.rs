//! Timer-driven background tasks.
//!
//! A [`Poller`] runs an async body after every interval (or once, after a
//! single interval) on its own tokio task. Disabling cancels the task, but
//! cancellation is only observed while waiting for the next tick: a body
//! already running always completes. The body of a repeating poller is never
//! re-entered; the next interval starts when the body has finished.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Run the body after every interval until disabled
    Repeat,
    /// Run the body once, then disable
    Once,
}

pub struct Poller {
    name: String,
    interval: Duration,
    mode: PollMode,
    /// Cancels the running task, if any
    token: Option<CancellationToken>,
    /// Flag of the current run; each enable gets a fresh one so a finishing
    /// stale task cannot clear a newer run's flag
    enabled: Arc<AtomicBool>,
}

impl Poller {
    pub fn new(name: impl Into<String>, interval: Duration, mode: PollMode) -> Self {
        Poller {
            name: name.into(),
            interval,
            mode,
            token: None,
            enabled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Start the poller unless it is already running
    pub fn enable<F, Fut>(&mut self, body: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_enabled() {
            return;
        }
        self.restart(body);
    }

    /// Cancel any running task and start over with a full interval
    pub fn restart<F, Fut>(&mut self, mut body: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.disable();

        let token = CancellationToken::new();
        let enabled = Arc::new(AtomicBool::new(true));
        self.token = Some(token.clone());
        self.enabled = enabled.clone();

        let name = self.name.clone();
        let interval = self.interval;
        let mode = self.mode;

        log::trace!("{}: poller enabled ({:?} every {:?})", name, mode, interval);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                body().await;
                if mode == PollMode::Once {
                    break;
                }
            }
            enabled.store(false, Ordering::Release);
            log::trace!("{}: poller stopped", name);
        });
    }

    pub fn disable(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.enabled.store(false, Ordering::Release);
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
