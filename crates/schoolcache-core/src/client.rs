//! Client facade over the query executor, cache and invalidation graph.
//!
//! `SchoolClient` is what front ends talk to. Reads go through the cache by
//! their catalog key; writes go straight to the backend and, only once the
//! backend accepted them, invalidate every cache namespace the mutation
//! can affect.

use std::sync::Arc;

use anyhow::Context;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{Backend, RestBackend};
use crate::cache::{CacheSettings, CacheStore, Fetcher, QueryResult, Subscription};
use crate::config::Config;
use crate::invalidation::{InvalidationGraph, MutationKind};
use crate::models::{Entity, Record, Row};
use crate::queries::QuerySpec;
use crate::query::{QueryError, QueryExecutor, QueryRequest};
use crate::schema::{EntityKind, ID_FIELD};

/// A write against one entity table.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert { entity: EntityKind, payload: Row },
    Update { entity: EntityKind, id: String, patch: Row },
    Delete { entity: EntityKind, id: String },
}

impl Mutation {
    pub fn entity(&self) -> EntityKind {
        match self {
            Mutation::Insert { entity, .. }
            | Mutation::Update { entity, .. }
            | Mutation::Delete { entity, .. } => *entity,
        }
    }

    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Insert { .. } => MutationKind::Insert,
            Mutation::Update { .. } => MutationKind::Update,
            Mutation::Delete { .. } => MutationKind::Delete,
        }
    }
}

/// Clone is cheap - every part is shared.
#[derive(Clone)]
pub struct SchoolClient {
    executor: QueryExecutor,
    cache: CacheStore,
    graph: Arc<InvalidationGraph>,
}

impl SchoolClient {
    pub fn new(backend: Arc<dyn Backend>, settings: CacheSettings) -> Self {
        info!(stale_ttl_secs = settings.stale_ttl.as_secs(), "Creating school client");
        Self {
            executor: QueryExecutor::new(backend),
            cache: CacheStore::new(settings),
            graph: Arc::new(InvalidationGraph::from_schema()),
        }
    }

    /// Build a client for the REST store named in the config.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let url = config
            .backend_url
            .as_deref()
            .context("No backend URL configured (set SCHOOLCACHE_URL)")?;
        let backend = RestBackend::new(url, config.api_key.clone(), config.request_timeout())
            .context("Failed to create HTTP client")?;
        info!(url = %url, "Using REST backend");
        Ok(Self::new(Arc::new(backend), config.cache_settings()))
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    fn fetcher(&self, request: &QueryRequest) -> Fetcher {
        let executor = self.executor.clone();
        let request = Arc::new(request.clone());
        Arc::new(move || {
            let executor = executor.clone();
            let request = request.clone();
            async move { executor.execute(&request).await }.boxed()
        })
    }

    /// Subscribe to a query and make sure its entry is fresh.
    ///
    /// The fetch, if one is needed, runs in the background; watch the
    /// returned subscription for the loading, success and error transitions.
    /// A subscription dropped before the fetch starts cancels it.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn query(&self, spec: &QuerySpec) -> Subscription {
        let subscription = self.cache.subscribe(&spec.key);
        let cache = self.cache.clone();
        let key = spec.key.clone();
        let fetcher = self.fetcher(&spec.request);
        tokio::spawn(async move {
            match cache.refresh_subscribed(&key, fetcher).await {
                Some(Err(e)) => debug!(key = %key, error = %e, "Background query failed"),
                Some(Ok(_)) => {}
                None => debug!(key = %key, "Query dropped before fetching"),
            }
        });
        subscription
    }

    /// Fetch a query's data, from the cache when it is fresh.
    pub async fn fetch(&self, spec: &QuerySpec) -> QueryResult {
        let fetcher = self.fetcher(&spec.request);
        self.cache.get_or_fetch(&spec.key, fetcher).await
    }

    pub async fn fetch_list<T: Record>(&self, spec: &QuerySpec) -> Result<Vec<T>, QueryError> {
        Ok(self.fetch(spec).await?.to_records())
    }

    pub async fn fetch_one<T: Record>(&self, spec: &QuerySpec) -> Result<T, QueryError> {
        let data = self.fetch(spec).await?;
        data.one::<T>().cloned().ok_or_else(|| {
            QueryError::validation(format!("{} is not a single {} query", spec.key, T::KIND))
        })
    }

    /// Apply a mutation, then invalidate the cache namespaces it affects.
    /// A failed mutation leaves the cache untouched.
    pub async fn mutate(&self, mutation: Mutation) -> Result<Option<Entity>, QueryError> {
        let entity = mutation.entity();
        let kind = mutation.kind();

        let result = match mutation {
            Mutation::Insert { entity, payload } => self.executor.insert(entity, payload).await.map(Some),
            Mutation::Update { entity, id, patch } => {
                self.executor.update(entity, &id, patch).await.map(Some)
            }
            Mutation::Delete { entity, id } => self.executor.delete(entity, &id).await.map(|_| None),
        };

        match result {
            Ok(row) => {
                let mut marked = 0;
                for prefix in self.graph.prefixes_for(entity, kind) {
                    marked += self.cache.invalidate(prefix);
                }
                debug!(entity = %entity, kind = %kind, marked, "Mutation applied");
                Ok(row)
            }
            Err(e) => {
                warn!(entity = %entity, kind = %kind, error = %e, "Mutation failed");
                Err(e)
            }
        }
    }

    pub async fn insert<T: Record>(&self, record: &T) -> Result<T, QueryError> {
        let payload = to_row(record)?;
        let created = self
            .mutate(Mutation::Insert {
                entity: T::KIND,
                payload,
            })
            .await?;
        returned_record(created)
    }

    pub async fn update(&self, entity: EntityKind, id: &str, patch: Row) -> Result<Entity, QueryError> {
        let updated = self
            .mutate(Mutation::Update {
                entity,
                id: id.to_string(),
                patch,
            })
            .await?;
        updated.ok_or_else(|| QueryError::validation(format!("update of {} {} returned no row", entity, id)))
    }

    pub async fn delete(&self, entity: EntityKind, id: &str) -> Result<(), QueryError> {
        self.mutate(Mutation::Delete {
            entity,
            id: id.to_string(),
        })
        .await
        .map(|_| ())
    }
}

fn returned_record<T: Record>(entity: Option<Entity>) -> Result<T, QueryError> {
    entity
        .as_ref()
        .and_then(T::from_entity)
        .cloned()
        .ok_or_else(|| QueryError::validation(format!("{} mutation returned no row", T::KIND)))
}

/// Serialize a record into a mutation payload. An empty id is left out so
/// the backend assigns one.
pub fn to_row<T: Record>(record: &T) -> Result<Row, QueryError> {
    let value = serde_json::to_value(record).map_err(|e| QueryError::Decode {
        entity: T::KIND,
        source: Arc::new(e),
    })?;
    let Value::Object(mut row) = value else {
        return Err(QueryError::validation(format!("{} record is not an object", T::KIND)));
    };
    if row.get(ID_FIELD).and_then(Value::as_str) == Some("") {
        row.remove(ID_FIELD);
    }
    Ok(row)
}
