use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use super::match_service::MatchService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RematchReason {
    AvailabilityConfigured,
    AccountConfirmed,
    PartnerCompleted,
    Manual,
}

impl RematchReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RematchReason::AvailabilityConfigured => "availability_configured",
            RematchReason::AccountConfirmed => "account_confirmed",
            RematchReason::PartnerCompleted => "partner_completed",
            RematchReason::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RematchJob {
    pub user_id: Uuid,
    pub reason: RematchReason,
}

/// Sending half of the reactive pairing queue. Enqueueing never blocks and
/// never fails the caller; a full queue drops the job with a warning.
#[derive(Clone)]
pub struct RematchQueue {
    tx: mpsc::Sender<RematchJob>,
}

impl RematchQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RematchJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, user_id: Uuid, reason: RematchReason) -> bool {
        match self.tx.try_send(RematchJob { user_id, reason }) {
            Ok(()) => {
                tracing::debug!(user_id = %user_id, reason = reason.as_str(), "rematch queued");
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(user_id = %user_id, reason = reason.as_str(), "rematch queue full, job dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(user_id = %user_id, reason = reason.as_str(), "rematch worker stopped, job dropped");
                false
            }
        }
    }
}

/// Drains the queue and runs reactive generation with bounded concurrency.
pub struct RematchWorker {
    service: Arc<MatchService>,
    concurrency: usize,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl RematchWorker {
    pub fn new(service: Arc<MatchService>, concurrency: usize, cancel: CancellationToken) -> Self {
        Self {
            service,
            concurrency: concurrency.max(1),
            tracker: TaskTracker::new(),
            cancel,
        }
    }

    pub fn spawn(self, rx: mpsc::Receiver<RematchJob>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Returns once cancelled (after already queued jobs were handed out)
    /// or when every sender is gone, and all in-flight jobs have finished.
    pub async fn run(self, mut rx: mpsc::Receiver<RematchJob>) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        tracing::info!(concurrency = self.concurrency, "rematch worker started");

        loop {
            let job = tokio::select! {
                biased;
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
                _ = self.cancel.cancelled() => break,
            };

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let service = Arc::clone(&self.service);
            self.tracker.spawn(async move {
                let _permit = permit;
                let RematchJob { user_id, reason } = job;
                let result =
                    tokio::task::spawn_blocking(move || service.try_generate_match_for_user(user_id)).await;
                match result {
                    Ok(Some(m)) => {
                        tracing::info!(user_id = %user_id, reason = reason.as_str(), match_id = %m.id, "rematch created a match")
                    }
                    Ok(None) => {
                        tracing::debug!(user_id = %user_id, reason = reason.as_str(), "rematch found no partner")
                    }
                    Err(e) => tracing::error!(user_id = %user_id, error = %e, "rematch task crashed"),
                }
            });
        }

        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("rematch worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MatchStore;
    use crate::test_support::{service_for, Fixture};

    #[test]
    fn full_queue_drops_without_blocking() {
        let (queue, mut rx) = RematchQueue::channel(1);
        let user = Uuid::new_v4();
        assert!(queue.enqueue(user, RematchReason::Manual));
        assert!(!queue.enqueue(user, RematchReason::Manual));
        assert_eq!(rx.try_recv().unwrap().user_id, user);
    }

    #[test]
    fn closed_queue_reports_drop() {
        let (queue, rx) = RematchQueue::channel(4);
        drop(rx);
        assert!(!queue.enqueue(Uuid::new_v4(), RematchReason::AccountConfirmed));
    }

    #[tokio::test]
    async fn worker_drains_queued_jobs_before_stopping() {
        let fx = Fixture::new();
        let ada = fx.add_member("Ada", &["coffee"]);
        let bob = fx.add_member("Bob", &["coffee"]);
        let (service, queue, rx, _notifier) = service_for(&fx);

        queue.enqueue(ada.id, RematchReason::AccountConfirmed);
        queue.enqueue(bob.id, RematchReason::AccountConfirmed);

        let cancel = CancellationToken::new();
        cancel.cancel();
        RematchWorker::new(service, 2, cancel).run(rx).await;

        // the second job finds both users busy
        assert_eq!(fx.store.match_count(), 1);
        let current = fx.store.current_match_for_user(ada.id).unwrap().unwrap();
        assert_eq!(current.partner_of(ada.id), Some(bob.id));
    }
}
