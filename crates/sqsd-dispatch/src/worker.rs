//! Worker loop: receive a batch, dispatch each message, acknowledge the
//! outcomes.

use std::{sync::Arc, time::Duration};

use sqsd_core::{Clock, DispatchOutcome, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    client::Dispatcher,
    config::QueueConfig,
    queue::{DeleteEntry, QueueClient, VisibilityEntry},
};

/// Backoff after a failed receive so a broken queue connection cannot spin
/// the loop. On the happy path the long poll itself is the throttle.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Pause between empty short-poll iterations (`wait_time_secs == 0`).
const SHORT_POLL_PAUSE: Duration = Duration::from_millis(100);

/// A single queue consumer.
///
/// Workers are identical; concurrency comes from the supervisor running
/// several of them, not from parallel dispatch within a batch.
pub struct Worker {
    id: usize,
    queue: Arc<dyn QueueClient>,
    dispatcher: Arc<Dispatcher>,
    config: QueueConfig,
    shutdown: CancellationToken,
    clock: Arc<dyn Clock>,
}

impl Worker {
    /// Creates a worker over a shared queue client and dispatcher.
    pub fn new(
        id: usize,
        queue: Arc<dyn QueueClient>,
        dispatcher: Arc<Dispatcher>,
        config: QueueConfig,
        shutdown: CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { id, queue, dispatcher, config, shutdown, clock }
    }

    /// Runs the receive → dispatch → acknowledge loop until shutdown is
    /// observed at the top of an iteration.
    ///
    /// No error terminates the loop: receive and acknowledgement failures
    /// are logged and the next iteration retries. In-flight calls are never
    /// cancelled; the worker exits only after its current iteration
    /// completes.
    pub async fn run(&self) {
        info!(worker_id = self.id, "worker started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let batch = match self
                .queue
                .receive(self.config.max_messages, self.config.wait_time_secs)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    error!(worker_id = self.id, error = %e, "failed to receive messages");
                    tokio::select! {
                        () = self.clock.sleep(RECEIVE_ERROR_BACKOFF) => {}
                        () = self.shutdown.cancelled() => break,
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                if self.config.wait_time_secs == 0 {
                    // Short polling has no built-in wait; pause so an idle
                    // queue cannot spin the loop.
                    tokio::select! {
                        () = self.clock.sleep(SHORT_POLL_PAUSE) => {}
                        () = self.shutdown.cancelled() => break,
                    }
                }
                continue;
            }

            debug!(worker_id = self.id, batch_size = batch.len(), "processing batch");

            let (to_delete, to_defer) = self.dispatch_batch(&batch).await;
            self.acknowledge(to_delete, to_defer).await;
        }

        info!(worker_id = self.id, "worker stopped");
    }

    /// Dispatches messages sequentially in receive order and partitions the
    /// outcomes into the two acknowledgement batches.
    ///
    /// Failed messages are dropped here: the queue redelivers them once
    /// their visibility timeout expires.
    async fn dispatch_batch(
        &self,
        batch: &[Message],
    ) -> (Vec<DeleteEntry>, Vec<VisibilityEntry>) {
        let mut to_delete = Vec::new();
        let mut to_defer = Vec::new();

        for message in batch {
            match self.dispatcher.dispatch(message).await {
                DispatchOutcome::Ack => {
                    to_delete.push(DeleteEntry {
                        id: message.id.clone(),
                        receipt: message.receipt.clone(),
                    });
                }
                DispatchOutcome::Defer { delay_secs } => {
                    to_defer.push(VisibilityEntry {
                        id: message.id.clone(),
                        receipt: message.receipt.clone(),
                        visibility_timeout_secs: delay_secs,
                    });
                }
                DispatchOutcome::Fail { reason } => {
                    warn!(
                        worker_id = self.id,
                        msg_id = %message.id,
                        reason = %reason,
                        "message left for redelivery"
                    );
                }
            }
        }

        (to_delete, to_defer)
    }

    /// Submits the acknowledgement batches accumulated from one receive
    /// cycle. Submission errors are logged; unacknowledged messages rely on
    /// queue redelivery.
    async fn acknowledge(&self, to_delete: Vec<DeleteEntry>, to_defer: Vec<VisibilityEntry>) {
        if !to_delete.is_empty() {
            if let Err(e) = self.queue.delete_batch(to_delete).await {
                error!(worker_id = self.id, error = %e, "failed to delete messages");
            }
        }

        if !to_defer.is_empty() {
            if let Err(e) = self.queue.change_visibility_batch(to_defer).await {
                error!(worker_id = self.id, error = %e, "failed to change message visibility");
            }
        }
    }
}
