//! Redis Streams-backed message broker (durable, at-least-once delivery).
//!
//! - **Stream key**: `<prefix>:<topic>`, one stream per topic (a single
//!   partition, numbered 0)
//! - **Offsets**: Redis stream entry ids (`1700000000000-0`)
//! - **Consumer groups**: one Redis consumer group per catalog consumer group,
//!   created on subscribe with `MKSTREAM` so it may precede the first publish
//! - **Commit**: `XACK`. Entries read but never acknowledged stay pending and
//!   are re-read first when the same consumer subscribes again

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use catalog_events::{BrokerError, Delivery, MessageBroker, PartitionClaim, ReceivedMessage, Topic};

pub const DEFAULT_STREAM_PREFIX: &str = "catalog";
pub const DEFAULT_CONSUMER_NAME: &str = "consumer-1";

/// Entries fetched per read.
const READ_COUNT: usize = 10;
/// How long a read blocks waiting for new entries.
const BLOCK_MS: u64 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum RedisStreamsError {
    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis command error: {0}")]
    Command(String),

    #[error("unexpected stream reply: {0}")]
    Reply(String),
}

impl From<RedisStreamsError> for BrokerError {
    fn from(err: RedisStreamsError) -> Self {
        match err {
            RedisStreamsError::Connection(e) => BrokerError::Connection(e),
            RedisStreamsError::Command(e) | RedisStreamsError::Reply(e) => BrokerError::Command(e),
        }
    }
}

#[derive(Clone)]
pub struct RedisStreamsBroker {
    client: redis::Client,
    conn: MultiplexedConnection,
    prefix: String,
    consumer_name: String,
}

impl RedisStreamsBroker {
    /// Connect to `redis_url` (e.g. `redis://localhost:6379`).
    pub async fn connect(redis_url: &str) -> Result<Self, RedisStreamsError> {
        let client = redis::Client::open(redis_url).map_err(|e| RedisStreamsError::Connection(e.to_string()))?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            conn,
            prefix: DEFAULT_STREAM_PREFIX.to_string(),
            consumer_name: DEFAULT_CONSUMER_NAME.to_string(),
        })
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Consumer name used inside every group. Keep it stable across restarts
    /// so pending entries are picked up again.
    pub fn with_consumer_name(mut self, name: impl Into<String>) -> Self {
        self.consumer_name = name.into();
        self
    }

    fn stream_key(&self, topic: Topic) -> String {
        stream_key(&self.prefix, topic)
    }

    /// `XGROUP CREATE ... MKSTREAM`, tolerating an existing group.
    async fn ensure_group(&self, key: &str, group: &str) -> Result<(), RedisStreamsError> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<String> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(key)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(RedisStreamsError::Command(format!("XGROUP CREATE failed: {e}"))),
        }
    }
}

fn stream_key(prefix: &str, topic: Topic) -> String {
    format!("{prefix}:{topic}")
}

#[async_trait]
impl MessageBroker for RedisStreamsBroker {
    #[instrument(skip(self, payload), fields(topic = %topic), err)]
    async fn publish(&self, topic: Topic, payload: Vec<u8>) -> Result<Delivery, BrokerError> {
        let mut conn = self.conn.clone();
        let id: String = redis::cmd("XADD")
            .arg(self.stream_key(topic))
            .arg("*")
            .arg("payload")
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| RedisStreamsError::Command(format!("XADD failed: {e}")))?;

        Ok(Delivery {
            topic,
            partition: 0,
            offset: id,
        })
    }

    #[instrument(skip(self, topics), fields(group = %group), err)]
    async fn subscribe(&self, group: &str, topics: &[Topic]) -> Result<Vec<PartitionClaim>, BrokerError> {
        let mut claims = Vec::with_capacity(topics.len());

        for &topic in topics {
            let key = self.stream_key(topic);
            self.ensure_group(&key, group).await?;

            // Blocking reads get their own connection so they never stall
            // publishes and acks on the shared one.
            let conn = self
                .client
                .get_multiplexed_tokio_connection()
                .await
                .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

            let (tx, rx) = mpsc::unbounded_channel();
            let reader = StreamReader {
                conn,
                key,
                topic,
                group: group.to_string(),
                consumer: self.consumer_name.clone(),
            };
            tokio::spawn(reader.run(tx));

            claims.push(PartitionClaim::new(topic, 0, rx));
        }

        info!(group = %group, topics = claims.len(), "subscribed to redis streams");
        Ok(claims)
    }

    #[instrument(skip(self, message), fields(group = %group, topic = %message.topic, offset = %message.offset), err)]
    async fn commit(&self, group: &str, message: &ReceivedMessage) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let _: u64 = redis::cmd("XACK")
            .arg(self.stream_key(message.topic))
            .arg(group)
            .arg(&message.offset)
            .query_async(&mut conn)
            .await
            .map_err(|e| RedisStreamsError::Command(format!("XACK failed: {e}")))?;
        Ok(())
    }
}

impl core::fmt::Debug for RedisStreamsBroker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisStreamsBroker")
            .field("prefix", &self.prefix)
            .field("consumer_name", &self.consumer_name)
            .finish_non_exhaustive()
    }
}

/// Poll loop feeding one claim. Stops once the claim is dropped.
struct StreamReader {
    conn: MultiplexedConnection,
    key: String,
    topic: Topic,
    group: String,
    consumer: String,
}

impl StreamReader {
    async fn run(mut self, tx: mpsc::UnboundedSender<ReceivedMessage>) {
        // Replay this consumer's pending history first (ids after `cursor`),
        // then switch to ">" for new entries.
        let mut cursor = "0".to_string();

        while !tx.is_closed() {
            let entries = match self.read(&cursor).await {
                Ok(entries) => entries,
                Err(e) => {
                    error!(stream = %self.key, group = %self.group, error = %e, "stream read failed");
                    tokio::time::sleep(std::time::Duration::from_millis(BLOCK_MS)).await;
                    continue;
                }
            };

            if cursor != ">" {
                match entries.last() {
                    Some((id, _)) => cursor = id.clone(),
                    None => {
                        cursor = ">".to_string();
                        continue;
                    }
                }
            }

            for (id, payload) in entries {
                let message = ReceivedMessage {
                    topic: self.topic,
                    partition: 0,
                    offset: id,
                    payload,
                };
                if tx.send(message).is_err() {
                    return;
                }
            }
        }

        debug!(stream = %self.key, group = %self.group, "stream reader stopped");
    }

    async fn read(&mut self, cursor: &str) -> Result<Vec<(String, Vec<u8>)>, RedisStreamsError> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.group)
            .arg(&self.consumer)
            .arg("COUNT")
            .arg(READ_COUNT);
        if cursor == ">" {
            cmd.arg("BLOCK").arg(BLOCK_MS);
        }
        cmd.arg("STREAMS").arg(&self.key).arg(cursor);

        let reply: Value = cmd
            .query_async(&mut self.conn)
            .await
            .map_err(|e| RedisStreamsError::Command(format!("XREADGROUP failed: {e}")))?;

        parse_read_reply(reply)
    }
}

/// Flatten an `XREADGROUP` reply into `(entry id, payload)` pairs.
///
/// Reply shape: `[[stream, [[id, [field, value, ...]], ...]], ...]`, or nil
/// when a blocking read timed out.
fn parse_read_reply(reply: Value) -> Result<Vec<(String, Vec<u8>)>, RedisStreamsError> {
    let streams = match reply {
        Value::Nil => return Ok(Vec::new()),
        Value::Bulk(streams) => streams,
        other => return Err(RedisStreamsError::Reply(format!("expected array, got {other:?}"))),
    };

    let mut out = Vec::new();
    for stream in streams {
        let Value::Bulk(mut parts) = stream else {
            return Err(RedisStreamsError::Reply("stream entry is not an array".to_string()));
        };
        if parts.len() != 2 {
            return Err(RedisStreamsError::Reply("stream entry must be [key, entries]".to_string()));
        }
        let entries = match parts.pop() {
            Some(Value::Bulk(entries)) => entries,
            Some(Value::Nil) | None => continue,
            Some(other) => return Err(RedisStreamsError::Reply(format!("bad entries: {other:?}"))),
        };

        for entry in entries {
            if let Some(parsed) = parse_entry(entry)? {
                out.push(parsed);
            }
        }
    }
    Ok(out)
}

/// `[id, [field, value, ...]]`. Pending entries deleted from the stream come
/// back with nil fields and are skipped.
fn parse_entry(entry: Value) -> Result<Option<(String, Vec<u8>)>, RedisStreamsError> {
    let Value::Bulk(mut parts) = entry else {
        return Err(RedisStreamsError::Reply("entry is not an array".to_string()));
    };
    if parts.len() != 2 {
        return Err(RedisStreamsError::Reply("entry must be [id, fields]".to_string()));
    }
    let fields = parts.pop();
    let id = match parts.pop() {
        Some(Value::Data(id)) => String::from_utf8_lossy(&id).into_owned(),
        other => return Err(RedisStreamsError::Reply(format!("bad entry id: {other:?}"))),
    };

    let fields = match fields {
        Some(Value::Bulk(fields)) => fields,
        _ => return Ok(None),
    };

    let mut map: HashMap<String, Vec<u8>> = HashMap::new();
    for pair in fields.chunks(2) {
        if let [Value::Data(k), Value::Data(v)] = pair {
            map.insert(String::from_utf8_lossy(k).into_owned(), v.clone());
        }
    }

    match map.remove("payload") {
        Some(payload) => Ok(Some((id, payload))),
        None => Err(RedisStreamsError::Reply(format!("entry {id} has no payload field"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(s: &str) -> Value {
        Value::Data(s.as_bytes().to_vec())
    }

    #[test]
    fn stream_keys_are_prefixed_per_topic() {
        assert_eq!(stream_key("catalog", Topic::ProductDeleted), "catalog:product.deleted");
    }

    #[test]
    fn parses_read_reply_in_order() {
        let reply = Value::Bulk(vec![Value::Bulk(vec![
            data("catalog:category.created"),
            Value::Bulk(vec![
                Value::Bulk(vec![data("1-0"), Value::Bulk(vec![data("payload"), data("{\"a\":1}")])]),
                Value::Bulk(vec![data("2-0"), Value::Nil]),
                Value::Bulk(vec![data("3-0"), Value::Bulk(vec![data("payload"), data("x")])]),
            ]),
        ])]);

        let entries = parse_read_reply(reply).unwrap();
        assert_eq!(
            entries,
            vec![("1-0".to_string(), b"{\"a\":1}".to_vec()), ("3-0".to_string(), b"x".to_vec())]
        );
    }

    #[test]
    fn nil_reply_is_an_empty_read() {
        assert!(parse_read_reply(Value::Nil).unwrap().is_empty());
    }

    #[test]
    fn entry_without_payload_is_rejected() {
        let reply = Value::Bulk(vec![Value::Bulk(vec![
            data("k"),
            Value::Bulk(vec![Value::Bulk(vec![data("1-0"), Value::Bulk(vec![data("other"), data("v")])])]),
        ])]);
        assert!(matches!(parse_read_reply(reply), Err(RedisStreamsError::Reply(_))));
    }
}
