//! Periodic verify/refresh cycle.
//!
//! DESIGN
//! ======
//! `SessionKeeper::tick` runs one cycle: verify the access token, refresh it
//! if the backend refuses it, and log out if the refresh fails. `spawn`
//! drives `tick` from a `tokio::time::interval` until the returned handle is
//! shut down or dropped, or the context is disposed.
//!
//! At most one cycle is in flight. The spawned loop awaits each tick before
//! the next, and every caller of `tick` (the loop, the request dispatcher
//! after a 401, the CLI) shares one in-flight flag; a tick that finds the
//! flag set returns `Overlapped` without touching the backend. Callers that
//! need the pending cycle's result wait for it with `settled`.
//!
//! ERROR HANDLING
//! ==============
//! Verification failures only lead to a refresh attempt and are retried on
//! the next tick. A failed refresh ends the session immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::backend::AuthBackend;
use super::context::{Credentials, SessionContext};
use super::refresher::{RefreshResult, TokenRefresher};
use super::validator::SessionValidator;

pub const DEFAULT_VALIDATE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No access token; nothing was sent.
    NoSession,
    /// Another cycle is still running; nothing was sent.
    Overlapped,
    /// The backend accepted the access token.
    Valid,
    /// The access token was renewed and persisted.
    Refreshed,
    /// The refresh failed and the session was ended.
    LoggedOut,
    /// The session ended while the refresh was pending; the result was dropped.
    Superseded,
    /// The context has been disposed.
    Disposed,
}

/// Clears the in-flight flag when a cycle ends, including on cancellation,
/// and wakes everyone waiting in `settled`.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    idle: &'a Notify,
}

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool, idle: &'a Notify) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, idle })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.idle.notify_waiters();
    }
}

#[derive(Clone)]
pub struct SessionKeeper {
    context: SessionContext,
    validator: SessionValidator,
    refresher: TokenRefresher,
    in_flight: Arc<AtomicBool>,
    idle: Arc<Notify>,
}

impl SessionKeeper {
    #[must_use]
    pub fn new(context: SessionContext, backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            validator: SessionValidator::new(backend.clone()),
            refresher: TokenRefresher::new(backend, context.clone()),
            context,
            in_flight: Arc::new(AtomicBool::new(false)),
            idle: Arc::new(Notify::new()),
        }
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// True while a cycle is running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Wait until no cycle is running. Returns at once when idle.
    pub async fn settled(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_busy() {
                return;
            }
            notified.await;
        }
    }

    fn begin(&self) -> Result<(Credentials, InFlight<'_>), TickOutcome> {
        if self.context.is_disposed() {
            return Err(TickOutcome::Disposed);
        }
        let Some(creds) = self.context.credentials() else {
            return Err(TickOutcome::NoSession);
        };
        let Some(in_flight) = InFlight::acquire(&self.in_flight, &self.idle) else {
            debug!("previous session check still running; skipping");
            return Err(TickOutcome::Overlapped);
        };
        Ok((creds, in_flight))
    }

    /// Run one verify/refresh cycle.
    pub async fn tick(&self) -> TickOutcome {
        let (creds, _in_flight) = match self.begin() {
            Ok(started) => started,
            Err(outcome) => return outcome,
        };

        if self.validator.verify(Some(&creds.access_token)).await {
            return TickOutcome::Valid;
        }
        self.renew(&creds).await
    }

    /// Refresh without verifying first, under the same in-flight guard as
    /// `tick`. A refused refresh ends the session.
    pub async fn refresh_now(&self) -> TickOutcome {
        let (creds, _in_flight) = match self.begin() {
            Ok(started) => started,
            Err(outcome) => return outcome,
        };
        self.renew(&creds).await
    }

    async fn renew(&self, creds: &Credentials) -> TickOutcome {
        match self.refresher.refresh_for(creds.epoch, creds.refresh_token.as_deref()).await {
            RefreshResult::Renewed(_) => TickOutcome::Refreshed,
            RefreshResult::Superseded => TickOutcome::Superseded,
            RefreshResult::Rejected => {
                if self.context.logout_if_current(creds.epoch) {
                    warn!("session expired; signed out");
                    TickOutcome::LoggedOut
                } else {
                    TickOutcome::Superseded
                }
            }
        }
    }

    /// Spawn the recurring cycle. The first tick fires one `interval` from now.
    #[must_use]
    pub fn spawn(self, interval: Duration) -> KeeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        info!(interval_secs = interval.as_secs(), "session keeper started");

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                let outcome = tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    outcome = self.tick() => outcome,
                };
                debug!(?outcome, "session tick");
                if outcome == TickOutcome::Disposed {
                    break;
                }
            }
            debug!("session keeper stopped");
        });

        KeeperHandle { shutdown: shutdown_tx, join }
    }
}

/// Owner of a spawned keeper loop. Dropping it also stops the loop.
pub struct KeeperHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl KeeperHandle {
    /// Stop the loop, cancelling any in-flight cycle, and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
