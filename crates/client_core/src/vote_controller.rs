use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use shared::{
    domain::{ThreadId, Vote, VoteDirection},
    protocol::VoteTally,
};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    error::{ControllerClosed, VoteSyncError},
    transport::VoteNotifier,
    vote_state::{VoteState, VoteTransition},
    ClientEvent,
};

const EVENT_BUFFER: usize = 64;

/// Exponential backoff for notifications that failed on the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total submissions per notification, including the first.
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteSnapshot {
    pub thread_id: ThreadId,
    pub vote: Vote,
    pub displayed_count: i64,
    /// Number of clicks applied so far.
    pub revision: u64,
}

struct Outbound {
    revision: u64,
    prior: Vote,
    next: Vote,
    rollback: VoteState,
}

struct Tracked {
    state: VoteState,
    revision: u64,
}

struct Shared {
    tracked: Mutex<Tracked>,
    events: broadcast::Sender<ClientEvent>,
}

/// Optimistic vote widget state for one thread.
///
/// Clicks update the displayed score immediately and queue exactly one
/// notification each. A single worker drains the queue in click order, so the
/// aggregator always sees the `prior` it is told about. Dropping the
/// controller closes the queue; the worker exits once it is drained.
pub struct VoteController {
    thread_id: ThreadId,
    shared: Arc<Shared>,
    queue: StdMutex<Option<mpsc::UnboundedSender<Outbound>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl VoteController {
    pub fn seed(notifier: Arc<dyn VoteNotifier>, tally: VoteTally, policy: RetryPolicy) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let shared = Arc::new(Shared {
            tracked: Mutex::new(Tracked {
                state: VoteState::from_tally(&tally),
                revision: 0,
            }),
            events,
        });

        let worker = tokio::spawn(run_worker(shared.clone(), notifier, policy, queue_rx));

        Self {
            thread_id: tally.thread_id,
            shared,
            queue: StdMutex::new(Some(queue_tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub async fn click(
        &self,
        direction: VoteDirection,
    ) -> Result<VoteTransition, ControllerClosed> {
        let mut tracked = self.shared.tracked.lock().await;
        let Some(queue) = self.queue_sender() else {
            return Err(ControllerClosed(self.thread_id));
        };

        let rollback = tracked.state;
        let transition = tracked.state.click(direction);
        tracked.revision += 1;
        debug!(
            thread_id = %self.thread_id,
            previous = %transition.previous,
            next = %transition.next,
            displayed_count = transition.displayed_count,
            "vote click"
        );

        let outbound = Outbound {
            revision: tracked.revision,
            prior: transition.previous,
            next: transition.next,
            rollback,
        };
        if queue.send(outbound).is_err() {
            tracked.state = rollback;
            tracked.revision -= 1;
            self.close_queue();
            return Err(ControllerClosed(self.thread_id));
        }

        Ok(transition)
    }

    pub fn request_reply(&self) {
        debug!(thread_id = %self.thread_id, "reply requested");
        let _ = self.shared.events.send(ClientEvent::ReplyRequested {
            thread_id: self.thread_id,
        });
    }

    pub async fn snapshot(&self) -> VoteSnapshot {
        let tracked = self.shared.tracked.lock().await;
        VoteSnapshot {
            thread_id: self.thread_id,
            vote: tracked.state.vote(),
            displayed_count: tracked.state.displayed_count(),
            revision: tracked.revision,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.shared.events.subscribe()
    }

    /// Stops accepting clicks and waits until every queued notification settled.
    pub async fn shutdown(&self) {
        // Clicks send while holding the state lock.
        {
            let _tracked = self.shared.tracked.lock().await;
            self.close_queue();
        }
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(error) = worker.await {
                warn!(thread_id = %self.thread_id, %error, "vote worker ended abnormally");
            }
        }
    }
}

impl VoteController {
    fn queue_sender(&self) -> Option<mpsc::UnboundedSender<Outbound>> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn close_queue(&self) {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    notifier: Arc<dyn VoteNotifier>,
    policy: RetryPolicy,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(outbound) = queue.recv().await {
        shared.deliver(notifier.as_ref(), policy, outbound).await;
    }
}

impl Shared {
    async fn deliver(&self, notifier: &dyn VoteNotifier, policy: RetryPolicy, job: Outbound) {
        let thread_id = job.rollback.thread_id();
        match submit_with_retry(notifier, policy, thread_id, job.prior, job.next).await {
            Ok(tally) => {
                if let Some(state) = self.reconcile_if_current(job.revision, &tally).await {
                    let _ = self.events.send(ClientEvent::VoteReconciled {
                        thread_id,
                        vote: state.vote(),
                        displayed_count: state.displayed_count(),
                    });
                }
            }
            Err(VoteSyncError::Conflict(message)) => {
                info!(%thread_id, %message, "vote conflict, adopting server tally");
                match notifier.fetch_tally(thread_id).await {
                    Ok(tally) => {
                        if let Some(state) = self.reconcile_if_current(job.revision, &tally).await
                        {
                            let _ = self.events.send(ClientEvent::VoteConflictResolved {
                                thread_id,
                                vote: state.vote(),
                                displayed_count: state.displayed_count(),
                            });
                        }
                    }
                    Err(error) => {
                        let rolled_back = self.rollback_if_current(&job).await;
                        self.report_failure(thread_id, job.next, &error, rolled_back);
                    }
                }
            }
            Err(error @ VoteSyncError::Network(_)) => {
                let rolled_back = match notifier.fetch_tally(thread_id).await {
                    Ok(tally) => {
                        self.reconcile_if_current(job.revision, &tally).await;
                        false
                    }
                    Err(_) => self.rollback_if_current(&job).await,
                };
                self.report_failure(thread_id, job.next, &error, rolled_back);
            }
            Err(error @ VoteSyncError::Validation(_)) => {
                let rolled_back = self.rollback_if_current(&job).await;
                self.report_failure(thread_id, job.next, &error, rolled_back);
            }
        }
    }

    /// Applies `tally` unless a newer click superseded `revision`.
    async fn reconcile_if_current(&self, revision: u64, tally: &VoteTally) -> Option<VoteState> {
        let mut tracked = self.tracked.lock().await;
        if tracked.revision != revision || !tracked.state.reconcile(tally) {
            return None;
        }
        Some(tracked.state)
    }

    async fn rollback_if_current(&self, job: &Outbound) -> bool {
        let mut tracked = self.tracked.lock().await;
        if tracked.revision != job.revision {
            return false;
        }
        tracked.state = job.rollback;
        true
    }

    fn report_failure(
        &self,
        thread_id: ThreadId,
        attempted: Vote,
        error: &VoteSyncError,
        rolled_back: bool,
    ) {
        warn!(%thread_id, %attempted, %error, rolled_back, "vote notification failed");
        let _ = self.events.send(ClientEvent::VoteSyncFailed {
            thread_id,
            attempted,
            error: error.to_string(),
            rolled_back,
        });
    }
}

async fn submit_with_retry(
    notifier: &dyn VoteNotifier,
    policy: RetryPolicy,
    thread_id: ThreadId,
    prior: Vote,
    next: Vote,
) -> Result<VoteTally, VoteSyncError> {
    let mut retry = 0;
    loop {
        match notifier.submit_vote(thread_id, prior, next).await {
            Err(error) if error.is_retryable() && retry + 1 < policy.attempts => {
                let delay = policy.delay_for(retry);
                debug!(%thread_id, %error, retry, ?delay, "retrying vote notification");
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            outcome => return outcome,
        }
    }
}

#[cfg(test)]
#[path = "tests/vote_controller_tests.rs"]
mod tests;
