//! Infrastructure wiring: store, broker, producer, joiner and consumers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use catalog_events::{BrokerError, EventProducer, InMemoryBroker, MessageBroker};
use catalog_infra::{
    CatalogConfig, CategoryConsumer, ConfigError, ConsumerWorker, DocumentStore, HttpEntityReader,
    InMemoryDocumentStore, Joiner, PostgresDocumentStore, ProductConsumer, StoreError, WorkerHandle,
};

#[cfg(feature = "redis")]
use catalog_infra::event_bus::RedisStreamsBroker;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// The two shared backends every process talks to.
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn DocumentStore>,
    pub broker: Arc<dyn MessageBroker>,
    /// The broker lives in this process, so its consumers must too.
    pub in_process: bool,
}

impl Backends {
    pub fn in_memory(partitions: u32) -> Self {
        Self {
            store: Arc::new(InMemoryDocumentStore::new()),
            broker: Arc::new(InMemoryBroker::new(partitions)),
            in_process: true,
        }
    }
}

impl core::fmt::Debug for Backends {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Backends")
            .field("in_process", &self.in_process)
            .finish_non_exhaustive()
    }
}

/// Connect the configured store and broker, falling back to in-memory ones.
pub async fn connect_backends(config: &CatalogConfig) -> Result<Backends, BuildError> {
    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresDocumentStore::connect(url).await?;
            store.ensure_schema().await?;
            info!("using postgres document store");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory document store");
            Arc::new(InMemoryDocumentStore::new())
        }
    };

    let (broker, in_process) = connect_broker(config).await?;
    Ok(Backends {
        store,
        broker,
        in_process,
    })
}

#[cfg(feature = "redis")]
async fn connect_broker(config: &CatalogConfig) -> Result<(Arc<dyn MessageBroker>, bool), BuildError> {
    if let Some(url) = &config.redis_url {
        let broker = RedisStreamsBroker::connect(url).await.map_err(BrokerError::from)?;
        info!("using redis streams broker");
        return Ok((Arc::new(broker), false));
    }
    warn!("REDIS_URL not set; using in-memory broker");
    Ok((Arc::new(InMemoryBroker::new(config.topic_partitions)), true))
}

#[cfg(not(feature = "redis"))]
async fn connect_broker(config: &CatalogConfig) -> Result<(Arc<dyn MessageBroker>, bool), BuildError> {
    if config.redis_url.is_some() {
        warn!("REDIS_URL set but redis feature not enabled, falling back to in-memory broker");
    }
    Ok((Arc::new(InMemoryBroker::new(config.topic_partitions)), true))
}

/// Start both consumer groups against `backends`.
pub async fn spawn_consumers(
    backends: &Backends,
    config: &CatalogConfig,
) -> Result<Vec<WorkerHandle>, BuildError> {
    let validator = config.auth.validator()?;
    let producer = EventProducer::new(backends.broker.clone());

    let category = ConsumerWorker::spawn(
        backends.broker.clone(),
        Arc::new(CategoryConsumer::new(backends.store.clone())),
    )
    .await?;
    let product = ConsumerWorker::spawn(
        backends.broker.clone(),
        Arc::new(ProductConsumer::new(backends.store.clone(), producer, validator)),
    )
    .await?;

    Ok(vec![category, product])
}

/// Shared state handed to every handler.
pub struct AppServices {
    pub store: Arc<dyn DocumentStore>,
    pub producer: EventProducer,
    pub joiner: Joiner,
    pub started_at: DateTime<Utc>,
}

impl AppServices {
    pub fn new(store: Arc<dyn DocumentStore>, producer: EventProducer, joiner: Joiner) -> Self {
        Self {
            store,
            producer,
            joiner,
            started_at: Utc::now(),
        }
    }

    /// Read path hydrates through `SERVICE_URL`; hrefs use `HOST_URL`.
    pub fn from_backends(backends: &Backends, config: &CatalogConfig) -> Self {
        let reader = Arc::new(HttpEntityReader::new(config.service_url.clone()));
        let joiner = Joiner::new(reader, config.host_url.clone()).with_timeout(config.fetch_timeout);
        Self::new(
            backends.store.clone(),
            EventProducer::new(backends.broker.clone()),
            joiner,
        )
    }
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("joiner", &self.joiner)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}
