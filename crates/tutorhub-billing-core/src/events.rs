//! Asynchronous subscription event recording
//!
//! Lifecycle transitions hand their audit events to a background task so the
//! request path never waits on the event log. Write failures are reported
//! through tracing and the `subscription_event_log_failures_total` counter
//! and never reach the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};
use tutorhub_db::EventRepository;
use tutorhub_types::NewSubscriptionEvent;

enum Command {
    Record(NewSubscriptionEvent),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background event writer
#[derive(Clone)]
pub struct EventRecorder {
    tx: mpsc::UnboundedSender<Command>,
    failures: Arc<AtomicU64>,
}

impl EventRecorder {
    /// Start the writer task. It runs until every handle is dropped.
    pub fn spawn(repo: Arc<dyn EventRepository>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let failures = Arc::new(AtomicU64::new(0));
        let handle = tokio::spawn(run(repo, rx, Arc::clone(&failures)));
        (Self { tx, failures }, handle)
    }

    /// Queue an event. Never blocks.
    pub fn record(&self, event: NewSubscriptionEvent) {
        if let Err(mpsc::error::SendError(Command::Record(event))) =
            self.tx.send(Command::Record(event))
        {
            self.failures.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("subscription_event_log_failures_total").increment(1);
            error!(
                subscription_id = %event.subscription_id,
                event_type = %event.event_type,
                "Event recorder stopped, dropping event"
            );
        }
    }

    /// Wait until every event queued before this call has been written or dropped
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Events that could not be written since startup
    pub fn failed_writes(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

async fn run(
    repo: Arc<dyn EventRepository>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    failures: Arc<AtomicU64>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Record(event) => match repo.log_event(&event).await {
                Ok(stored) => debug!(
                    event_id = stored.id,
                    subscription_id = %stored.subscription_id,
                    event_type = %stored.event_type,
                    "Subscription event recorded"
                ),
                Err(e) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("subscription_event_log_failures_total").increment(1);
                    error!(
                        subscription_id = %event.subscription_id,
                        event_type = %event.event_type,
                        error = %e,
                        "Failed to write subscription event"
                    );
                }
            },
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("Event recorder stopped");
}
