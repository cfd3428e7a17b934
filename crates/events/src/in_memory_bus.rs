//! In-memory partitioned broker for tests/dev.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::bus::{BrokerError, Delivery, MessageBroker, PartitionClaim, ReceivedMessage};
use crate::topic::Topic;

pub const DEFAULT_PARTITIONS: u32 = 3;

type PartitionKey = (Topic, u32);

#[derive(Debug, Default)]
struct TopicLog {
    partitions: Vec<Vec<Vec<u8>>>,
    next_partition: u32,
}

#[derive(Debug, Default)]
struct GroupState {
    /// Next offset to deliver after a resubscribe, per partition.
    committed: HashMap<PartitionKey, u64>,
    claims: HashMap<PartitionKey, mpsc::UnboundedSender<ReceivedMessage>>,
}

#[derive(Debug, Default)]
struct State {
    topics: HashMap<Topic, TopicLog>,
    groups: HashMap<String, GroupState>,
}

/// In-memory broker.
///
/// - Messages are spread round-robin over `partitions` per topic (no key)
/// - Logs are retained, so a group subscribing late replays from its last
///   committed offset (or the beginning)
/// - Can be switched unavailable to exercise publish failures
#[derive(Debug)]
pub struct InMemoryBroker {
    partitions: u32,
    unavailable: AtomicBool,
    state: Mutex<State>,
}

impl InMemoryBroker {
    pub fn new(partitions: u32) -> Self {
        Self {
            partitions: partitions.max(1),
            unavailable: AtomicBool::new(false),
            state: Mutex::new(State::default()),
        }
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    /// Make subsequent publishes fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Payloads retained for `topic`, grouped by partition and in offset
    /// order within each partition.
    pub fn published(&self, topic: Topic) -> Vec<Vec<u8>> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        state
            .topics
            .get(&topic)
            .map(|log| log.partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Next offset `group` would resume from on `topic`/`partition`.
    pub fn committed_offset(&self, group: &str, topic: Topic, partition: u32) -> Option<u64> {
        let state = self.state.lock().ok()?;
        state.groups.get(group)?.committed.get(&(topic, partition)).copied()
    }

    /// Number of `topic` messages `group` has committed across all partitions.
    pub fn committed_count(&self, group: &str, topic: Topic) -> u64 {
        (0..self.partitions)
            .filter_map(|p| self.committed_offset(group, topic, p))
            .sum()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITIONS)
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, topic: Topic, payload: Vec<u8>) -> Result<Delivery, BrokerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("in-memory broker switched off".to_string()));
        }

        let mut state = self.state.lock().map_err(|_| BrokerError::Poisoned)?;

        let log = state.topics.entry(topic).or_default();
        if log.partitions.is_empty() {
            log.partitions = vec![Vec::new(); self.partitions as usize];
        }
        let partition = log.next_partition % self.partitions;
        log.next_partition = log.next_partition.wrapping_add(1);

        let entries = &mut log.partitions[partition as usize];
        let offset = entries.len() as u64;
        entries.push(payload.clone());

        let message = ReceivedMessage {
            topic,
            partition,
            offset: offset.to_string(),
            payload,
        };
        for group in state.groups.values_mut() {
            let key = (topic, partition);
            // Drop claims whose worker went away.
            if let Some(tx) = group.claims.get(&key) {
                if tx.send(message.clone()).is_err() {
                    group.claims.remove(&key);
                }
            }
        }

        Ok(Delivery {
            topic,
            partition,
            offset: offset.to_string(),
        })
    }

    async fn subscribe(&self, group: &str, topics: &[Topic]) -> Result<Vec<PartitionClaim>, BrokerError> {
        let mut state = self.state.lock().map_err(|_| BrokerError::Poisoned)?;
        let State { topics: logs, groups, .. } = &mut *state;
        let group_state = groups.entry(group.to_string()).or_default();

        let mut claims = Vec::new();
        for &topic in topics {
            for partition in 0..self.partitions {
                let key = (topic, partition);
                let (tx, rx) = mpsc::unbounded_channel();

                let start = group_state.committed.get(&key).copied().unwrap_or(0);
                let backlog = logs
                    .get(&topic)
                    .and_then(|log| log.partitions.get(partition as usize));
                if let Some(entries) = backlog {
                    for (offset, payload) in entries.iter().enumerate().skip(start as usize) {
                        let _ = tx.send(ReceivedMessage {
                            topic,
                            partition,
                            offset: offset.to_string(),
                            payload: payload.clone(),
                        });
                    }
                }

                group_state.claims.insert(key, tx);
                claims.push(PartitionClaim::new(topic, partition, rx));
            }
        }

        Ok(claims)
    }

    async fn commit(&self, group: &str, message: &ReceivedMessage) -> Result<(), BrokerError> {
        let offset: u64 = message
            .offset
            .parse()
            .map_err(|_| BrokerError::InvalidOffset(message.offset.clone()))?;

        let mut state = self.state.lock().map_err(|_| BrokerError::Poisoned)?;
        let committed = state
            .groups
            .entry(group.to_string())
            .or_default()
            .committed
            .entry((message.topic, message.partition))
            .or_insert(0);
        *committed = (*committed).max(offset + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_assigns_partitions_round_robin() {
        let broker = InMemoryBroker::new(2);

        let a = broker.publish(Topic::ProductCreated, b"a".to_vec()).await.unwrap();
        let b = broker.publish(Topic::ProductCreated, b"b".to_vec()).await.unwrap();
        let c = broker.publish(Topic::ProductCreated, b"c".to_vec()).await.unwrap();

        assert_eq!((a.partition, a.offset.as_str()), (0, "0"));
        assert_eq!((b.partition, b.offset.as_str()), (1, "0"));
        assert_eq!((c.partition, c.offset.as_str()), (0, "1"));
        assert_eq!(broker.published(Topic::ProductCreated).len(), 3);
    }

    #[tokio::test]
    async fn published_reads_back_the_partition_logs() {
        let broker = InMemoryBroker::new(2);
        for p in [b"a", b"b", b"c"] {
            broker.publish(Topic::ProductUpdated, p.to_vec()).await.unwrap();
        }
        broker.publish(Topic::CategoryCreated, b"x".to_vec()).await.unwrap();

        // Partition 0 holds a and c, partition 1 holds b.
        assert_eq!(
            broker.published(Topic::ProductUpdated),
            vec![b"a".to_vec(), b"c".to_vec(), b"b".to_vec()]
        );
        assert_eq!(broker.published(Topic::CategoryCreated), vec![b"x".to_vec()]);
        assert!(broker.published(Topic::ProductDeleted).is_empty());

        let state = broker.state.lock().unwrap();
        let retained: usize = state
            .topics
            .values()
            .flat_map(|log| log.partitions.iter())
            .map(Vec::len)
            .sum();
        assert_eq!(retained, 4);
    }

    #[tokio::test]
    async fn unavailable_broker_rejects_publish() {
        let broker = InMemoryBroker::new(1);
        broker.set_unavailable(true);
        assert!(matches!(
            broker.publish(Topic::CategoryCreated, b"x".to_vec()).await,
            Err(BrokerError::Unavailable(_))
        ));
        assert!(broker.published(Topic::CategoryCreated).is_empty());
    }

    #[tokio::test]
    async fn late_subscriber_replays_backlog_then_receives_live() {
        let broker = InMemoryBroker::new(1);
        broker.publish(Topic::CategoryCreated, b"1".to_vec()).await.unwrap();

        let mut claims = broker.subscribe("g", &[Topic::CategoryCreated]).await.unwrap();
        assert_eq!(claims.len(), 1);
        let claim = &mut claims[0];

        broker.publish(Topic::CategoryCreated, b"2".to_vec()).await.unwrap();

        assert_eq!(claim.recv().await.unwrap().payload, b"1");
        assert_eq!(claim.recv().await.unwrap().payload, b"2");
    }

    #[tokio::test]
    async fn resubscribe_resumes_after_commit() {
        let broker = InMemoryBroker::new(1);
        for p in [b"1", b"2", b"3"] {
            broker.publish(Topic::ProductDeleted, p.to_vec()).await.unwrap();
        }

        let mut claims = broker.subscribe("g", &[Topic::ProductDeleted]).await.unwrap();
        let first = claims[0].recv().await.unwrap();
        broker.commit("g", &first).await.unwrap();
        drop(claims);

        let mut claims = broker.subscribe("g", &[Topic::ProductDeleted]).await.unwrap();
        assert_eq!(claims[0].recv().await.unwrap().payload, b"2");
        assert_eq!(broker.committed_count("g", Topic::ProductDeleted), 1);
    }

    #[tokio::test]
    async fn groups_are_independent() {
        let broker = InMemoryBroker::new(1);
        let mut a = broker.subscribe("a", &[Topic::ProductCreated]).await.unwrap();
        let mut b = broker.subscribe("b", &[Topic::ProductCreated]).await.unwrap();

        broker.publish(Topic::ProductCreated, b"x".to_vec()).await.unwrap();

        assert_eq!(a[0].recv().await.unwrap().payload, b"x");
        assert_eq!(b[0].recv().await.unwrap().payload, b"x");
    }
}
