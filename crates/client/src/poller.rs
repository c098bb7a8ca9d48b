//! Background polling of the order board.
//!
//! [`OrderPoller`] refreshes an [`OrderBoard`] on a fixed interval in a
//! spawned task. While the client is hidden it stops fetching entirely; when
//! it becomes visible again it fetches at once and restarts the interval, even
//! if the hide and show both happened while a fetch was running.
//!
//! Failures on regular ticks are logged and retried on the next tick. An
//! expired session ends the loop and reports where to send the user.

use std::future::Future;
use std::time::Duration;

use bento_core::{Order, OrderCounts};
use chrono::NaiveDate;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::auth::LOGIN;
use crate::board::{OrderBoard, RefreshError, RefreshOutcome, RefreshTrigger};

/// Whether the client is currently in front of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Visibility plus a count of hidden-to-visible transitions, so a hide and
/// show that land between two polls still trigger a resume fetch.
#[derive(Debug, Clone, Copy, Default)]
struct Presence {
    visibility: Visibility,
    resumes: u64,
}

/// Something the poller wants the front end to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    Refreshed {
        counts: OrderCounts,
        new_orders: Vec<Order>,
    },
    /// A refresh triggered by a filter change failed.
    RefreshFailed { message: String },
    /// The session expired; polling has stopped.
    AuthExpired { redirect: &'static str },
}

/// Runs `f` after `delay`, unless called again first.
///
/// Each call replaces the pending one, so only the last call in a burst runs.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    pub fn call<F>(&mut self, f: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|p| !p.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Keeps an [`OrderBoard`] fresh.
#[derive(Debug)]
pub struct OrderPoller {
    board: OrderBoard,
    presence: watch::Sender<Presence>,
    events: Option<mpsc::UnboundedSender<PollEvent>>,
    task: Option<JoinHandle<()>>,
    debounce: Debouncer,
}

impl OrderPoller {
    #[must_use]
    pub fn new(board: OrderBoard, search_debounce: Duration) -> Self {
        let (presence, _) = watch::channel(Presence::default());
        Self {
            board,
            presence,
            events: None,
            task: None,
            debounce: Debouncer::new(search_debounce),
        }
    }

    #[must_use]
    pub const fn board(&self) -> &OrderBoard {
        &self.board
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start polling every `interval`, with the first fetch right away.
    ///
    /// Restarting replaces the previous loop.
    pub fn start(&mut self, interval: Duration) -> mpsc::UnboundedReceiver<PollEvent> {
        self.stop();
        let (tx, rx) = mpsc::unbounded_channel();
        let board = self.board.clone();
        let presence = self.presence.subscribe();
        let events = tx.clone();
        self.task = Some(tokio::spawn(run(board, interval, presence, events)));
        self.events = Some(tx);
        info!(interval_secs = interval.as_secs_f64(), "Order polling started");
        rx
    }

    /// Stop polling and drop any outstanding fetch.
    pub fn stop(&mut self) {
        self.debounce.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
            self.board.cancel_in_flight();
            info!("Order polling stopped");
        }
        self.events = None;
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        self.presence.send_modify(|p| {
            if p.visibility == Visibility::Hidden && visibility == Visibility::Visible {
                p.resumes += 1;
            }
            p.visibility = visibility;
        });
    }

    /// Change the search text now and refresh once typing settles.
    pub fn set_search(&mut self, query: &str) {
        self.board.update_filters(|f| f.set_search(query));
        self.schedule_refresh();
    }

    /// Change the date range now and refresh once input settles.
    pub fn set_date_range(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        self.board.update_filters(|f| {
            f.start_date = start;
            f.end_date = end;
        });
        self.schedule_refresh();
    }

    fn schedule_refresh(&mut self) {
        let board = self.board.clone();
        let events = self.events.clone();
        self.debounce.call(async move {
            match board.refresh(RefreshTrigger::Manual).await {
                Ok(outcome) => {
                    if let (Some(events), RefreshOutcome::Refreshed { new_orders }) = (&events, outcome) {
                        let _ = events.send(PollEvent::Refreshed {
                            counts: board.counts(),
                            new_orders,
                        });
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Filtered refresh failed");
                    if let Some(events) = &events {
                        let event = match e {
                            RefreshError::AuthExpired => PollEvent::AuthExpired { redirect: LOGIN },
                            RefreshError::Api(e) => PollEvent::RefreshFailed {
                                message: e.user_message(),
                            },
                        };
                        let _ = events.send(event);
                    }
                }
            }
        });
    }

    /// Refresh right now, outside the schedule. Failures are returned.
    ///
    /// # Errors
    ///
    /// Returns `RefreshError` if the fetch fails.
    pub async fn refresh_now(&self) -> Result<RefreshOutcome, RefreshError> {
        self.board.refresh(RefreshTrigger::Manual).await
    }
}

impl Drop for OrderPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    board: OrderBoard,
    interval: Duration,
    mut presence: watch::Receiver<Presence>,
    events: mpsc::UnboundedSender<PollEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut handled_resumes = presence.borrow().resumes;

    loop {
        let current = *presence.borrow_and_update();
        let trigger = if current.visibility == Visibility::Hidden {
            debug!("Client hidden, polling paused");
            let Some(visible) = wait_until_visible(&mut presence).await else {
                return;
            };
            handled_resumes = visible.resumes;
            ticker.reset();
            RefreshTrigger::Resume
        } else if current.resumes != handled_resumes {
            // Hidden and shown again since the last pass.
            handled_resumes = current.resumes;
            ticker.reset();
            RefreshTrigger::Resume
        } else {
            tokio::select! {
                _ = ticker.tick() => RefreshTrigger::Tick,
                changed = presence.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    continue;
                }
            }
        };

        match board.refresh(trigger).await {
            Ok(RefreshOutcome::Refreshed { new_orders }) => {
                let _ = events.send(PollEvent::Refreshed {
                    counts: board.counts(),
                    new_orders,
                });
            }
            Ok(RefreshOutcome::Discarded) => {}
            Err(RefreshError::AuthExpired) => {
                warn!("Session expired while polling, stopping");
                let _ = events.send(PollEvent::AuthExpired { redirect: LOGIN });
                return;
            }
            Err(RefreshError::Api(e)) => {
                warn!(?trigger, error = %e, "Order poll failed, retrying next tick");
            }
        }
    }
}

/// Wait for the visible state. `None` if the poller went away.
async fn wait_until_visible(presence: &mut watch::Receiver<Presence>) -> Option<Presence> {
    loop {
        presence.changed().await.ok()?;
        let current = *presence.borrow_and_update();
        if current.visibility == Visibility::Visible {
            return Some(current);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_only_last_debounced_call_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(40));

        for i in 1..=5 {
            let runs = Arc::clone(&runs);
            let last = Arc::clone(&last);
            debouncer.call(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                last.store(i, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 5);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test]
    async fn test_cancelled_debounce_never_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(20));
        let counter = Arc::clone(&runs);
        debouncer.call(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
