use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use catalog_events::{BrokerError, MessageBroker, PartitionClaim};

use crate::consumers::{ApplyOutcome, MessageHandler};

/// Handle to stop a running consumer group and wait for its tasks.
///
/// Dropping the handle without calling [`WorkerHandle::shutdown`] also stops
/// the partition tasks, just without waiting for them.
#[derive(Debug)]
pub struct WorkerHandle {
    group: String,
    shutdown: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Number of partition tasks owned by this worker.
    pub fn partitions(&self) -> usize {
        self.joins.len()
    }

    /// Request graceful shutdown and wait for every partition task to stop.
    ///
    /// A message already being handled is finished and committed first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for join in self.joins {
            let _ = join.await;
        }
        info!(group = %self.group, "consumer worker stopped");
    }
}

/// Runs one consumer group against a broker.
///
/// - Claims every partition of the handler's topics
/// - One task per partition, so a claim's messages are handled in order
/// - Every message's offset is committed after handling, whatever the outcome
#[derive(Debug)]
pub struct ConsumerWorker;

impl ConsumerWorker {
    pub async fn spawn(
        broker: Arc<dyn MessageBroker>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<WorkerHandle, BrokerError> {
        let group = handler.group_id().to_string();
        let claims = broker.subscribe(&group, handler.topics()).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(group = %group, partitions = claims.len(), "consumer worker started");

        let joins = claims
            .into_iter()
            .map(|claim| {
                tokio::spawn(partition_loop(
                    group.clone(),
                    claim,
                    broker.clone(),
                    handler.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        Ok(WorkerHandle {
            group,
            shutdown: shutdown_tx,
            joins,
        })
    }
}

async fn partition_loop(
    group: String,
    mut claim: PartitionClaim,
    broker: Arc<dyn MessageBroker>,
    handler: Arc<dyn MessageHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            message = claim.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let outcome = handler.handle(message.topic, &message.payload).await;
        match &outcome {
            ApplyOutcome::Applied => debug!(
                group = %group,
                topic = %message.topic,
                partition = message.partition,
                offset = %message.offset,
                "message applied"
            ),
            other => info!(
                group = %group,
                topic = %message.topic,
                partition = message.partition,
                offset = %message.offset,
                outcome = other.label(),
                "message not applied"
            ),
        }

        if let Err(err) = broker.commit(&group, &message).await {
            warn!(group = %group, topic = %message.topic, offset = %message.offset, error = %err, "offset commit failed");
        }
    }

    debug!(group = %group, topic = %claim.topic, partition = claim.partition, "partition task exiting");
}
