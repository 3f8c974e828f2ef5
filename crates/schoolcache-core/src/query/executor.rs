//! Query executor.
//!
//! Validates requests against the schema registry, sends them to the
//! backend, and normalizes the rows into typed entities. Embedded relations
//! stay nested inside their parent exactly as requested.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{QueryData, QueryError, QueryRequest};
use crate::api::{ApiError, Backend, Embed, Filter, SelectRequest};
use crate::models::{Entity, Record, Row};
use crate::schema::{Cardinality, EntityKind, ID_FIELD};

/// Clone is cheap - the backend is shared behind an Arc.
#[derive(Clone)]
pub struct QueryExecutor {
    backend: Arc<dyn Backend>,
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Check embeds, relation filters and relation ordering against the schema.
    pub fn validate(request: &SelectRequest) -> Result<(), QueryError> {
        validate_embeds(request.entity, &request.embeds)?;

        for filter in &request.filters {
            if let Some(ref relation) = filter.relation {
                if request.embed_named(relation).is_none() {
                    return Err(QueryError::validation(format!(
                        "filter on {}.{} requires embedding '{}'",
                        relation, filter.column, relation
                    )));
                }
            }
        }

        if let Some(ref order) = request.order {
            if let Some(ref relation) = order.relation {
                let to_one = request
                    .entity
                    .schema()
                    .relation(relation)
                    .map(|r| r.cardinality == Cardinality::One)
                    .unwrap_or(false);
                if !to_one || request.embed_named(relation).is_none() {
                    return Err(QueryError::validation(format!(
                        "ordering by {}({}) requires an embedded to-one relation",
                        relation, order.column
                    )));
                }
            }
        }
        Ok(())
    }

    pub async fn fetch_list(&self, request: &SelectRequest) -> Result<Vec<Entity>, QueryError> {
        Self::validate(request)?;
        debug!(entity = %request.entity, select = %request.select_clause(), "Fetching list");

        let rows = self
            .backend
            .select(request)
            .await
            .map_err(|e| QueryError::remote(format!("Failed to fetch {}", request.entity), e))?;

        rows.into_iter()
            .filter_map(|row| normalize(request.entity, &request.embeds, row))
            .map(|row| decode(request.entity, row))
            .collect()
    }

    /// Typed variant of `fetch_list`.
    pub async fn fetch_records<T: Record>(&self, request: &SelectRequest) -> Result<Vec<T>, QueryError> {
        if request.entity != T::KIND {
            return Err(QueryError::validation(format!(
                "request for {} cannot produce {} records",
                request.entity,
                T::KIND
            )));
        }
        let entities = self.fetch_list(request).await?;
        Ok(entities
            .iter()
            .filter_map(T::from_entity)
            .cloned()
            .collect())
    }

    pub async fn fetch_one(
        &self,
        entity: EntityKind,
        id: &str,
        embeds: &[Embed],
    ) -> Result<Entity, QueryError> {
        let id = require_id(entity, id)?;
        let mut request = SelectRequest::new(entity).filter(Filter::eq(ID_FIELD, id));
        request.embeds = embeds.to_vec();

        let mut entities = self.fetch_list(&request).await?;
        if entities.is_empty() {
            return Err(QueryError::NotFound {
                entity,
                id: id.to_string(),
            });
        }
        Ok(entities.swap_remove(0))
    }

    /// Run a cached query request.
    pub async fn execute(&self, request: &QueryRequest) -> Result<QueryData, QueryError> {
        match request {
            QueryRequest::List(select) => self.fetch_list(select).await.map(QueryData::List),
            QueryRequest::One { entity, id, embeds } => {
                self.fetch_one(*entity, id, embeds).await.map(QueryData::One)
            }
        }
    }

    pub async fn insert(&self, entity: EntityKind, payload: Row) -> Result<Entity, QueryError> {
        debug!(entity = %entity, "Inserting row");
        let row = self
            .backend
            .insert(entity, payload)
            .await
            .map_err(|e| QueryError::remote(format!("Failed to insert into {}", entity), e))?;
        decode(entity, row)
    }

    pub async fn update(&self, entity: EntityKind, id: &str, patch: Row) -> Result<Entity, QueryError> {
        let id = require_id(entity, id)?;
        debug!(entity = %entity, id = id, "Updating row");
        let row = self
            .backend
            .update(entity, id, patch)
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => QueryError::NotFound {
                    entity,
                    id: id.to_string(),
                },
                other => QueryError::remote(format!("Failed to update {} {}", entity, id), other),
            })?;
        decode(entity, row)
    }

    pub async fn delete(&self, entity: EntityKind, id: &str) -> Result<(), QueryError> {
        let id = require_id(entity, id)?;
        debug!(entity = %entity, id = id, "Deleting row");
        self.backend
            .delete(entity, id)
            .await
            .map_err(|e| QueryError::remote(format!("Failed to delete {} {}", entity, id), e))
    }
}

/// Queries keyed by an id are not sent at all when the id is blank.
fn require_id(entity: EntityKind, id: &str) -> Result<&str, QueryError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(QueryError::validation(format!("{} id is required", entity)));
    }
    Ok(id)
}

fn validate_embeds(entity: EntityKind, embeds: &[Embed]) -> Result<(), QueryError> {
    for embed in embeds {
        let relation = entity.schema().relation(&embed.relation).ok_or_else(|| {
            QueryError::validation(format!("{} has no relation '{}'", entity, embed.relation))
        })?;
        validate_embeds(relation.target, &embed.embeds)?;
    }
    Ok(())
}

/// Apply join semantics to a returned row: to-many embeds are always arrays,
/// and a row whose inner-joined relation came back empty is dropped.
fn normalize(entity: EntityKind, embeds: &[Embed], mut row: Row) -> Option<Row> {
    for embed in embeds {
        let Some(relation) = entity.schema().relation(&embed.relation) else {
            continue;
        };
        let value = row.entry(embed.relation.clone()).or_insert(Value::Null);
        if relation.cardinality == Cardinality::Many && value.is_null() {
            *value = Value::Array(Vec::new());
        }
        let empty = match value {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            _ => false,
        };
        if embed.inner && empty {
            return None;
        }
    }
    Some(row)
}

fn decode(entity: EntityKind, row: Row) -> Result<Entity, QueryError> {
    Entity::from_row(entity, row).map_err(|e| QueryError::Decode {
        entity,
        source: Arc::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MemoryBackend, OrderBy};
    use crate::models::{Fee, FeeStatus, Student};
    use serde_json::json;

    fn executor() -> (Arc<MemoryBackend>, QueryExecutor) {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            EntityKind::Student,
            vec![
                json!({ "id": "s1", "full_name": "Ada Lovelace" }),
                json!({ "id": "s2", "full_name": "Charles Babbage" }),
            ],
        );
        backend.seed(
            EntityKind::Fee,
            vec![
                json!({ "id": "f1", "student_id": "s1", "amount": 120, "status": "overdue", "due_date": "2024-01-10" }),
                json!({ "id": "f2", "student_id": "s2", "amount": 80, "status": "paid", "due_date": "2024-01-10" }),
            ],
        );
        let executor = QueryExecutor::new(backend.clone());
        (backend, executor)
    }

    #[tokio::test]
    async fn test_fetch_list_embeds_relations() {
        let (_, executor) = executor();
        let request = SelectRequest::new(EntityKind::Student)
            .embed(Embed::columns("fees", &["id", "status"]))
            .order(OrderBy::asc("full_name"));
        let students: Vec<Student> = executor.fetch_records(&request).await.unwrap();

        assert_eq!(students.len(), 2);
        assert_eq!(students[0].fees()[0].status, FeeStatus::Overdue);
        assert_eq!(students[1].fees()[0].status, FeeStatus::Paid);
    }

    #[tokio::test]
    async fn test_unknown_relation_rejected_before_backend() {
        let (backend, executor) = executor();
        let request = SelectRequest::new(EntityKind::Fee).embed(Embed::all("grades"));
        let err = executor.fetch_list(&request).await.unwrap_err();

        assert!(matches!(err, QueryError::Validation(_)));
        assert_eq!(backend.select_count(), 0);
    }

    #[tokio::test]
    async fn test_relation_filter_requires_embed() {
        let (_, executor) = executor();
        let request = SelectRequest::new(EntityKind::Student)
            .filter(Filter::eq("status", "pending").on("fees"));
        assert!(matches!(
            executor.fetch_list(&request).await,
            Err(QueryError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_one_not_found_and_blank_id() {
        let (backend, executor) = executor();
        let found = executor.fetch_one(EntityKind::Fee, "f1", &[]).await.unwrap();
        assert_eq!(found.as_record::<Fee>().unwrap().amount, 120.0);

        assert!(matches!(
            executor.fetch_one(EntityKind::Fee, "missing", &[]).await,
            Err(QueryError::NotFound { entity: EntityKind::Fee, .. })
        ));

        let before = backend.select_count();
        assert!(matches!(
            executor.fetch_one(EntityKind::Fee, "  ", &[]).await,
            Err(QueryError::Validation(_))
        ));
        assert_eq!(backend.select_count(), before);
    }

    #[tokio::test]
    async fn test_remote_errors_keep_cause() {
        let (backend, executor) = executor();
        backend.fail_next_select("permission denied for table fees");
        let err = executor
            .fetch_list(&SelectRequest::new(EntityKind::Fee))
            .await
            .unwrap_err();
        assert!(matches!(err.api_error(), Some(ApiError::Rejected(_))));
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let (_, executor) = executor();
        let err = executor
            .update(EntityKind::Fee, "nope", Row::new())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::NotFound { .. }));
    }

    #[test]
    fn test_normalize_inner_and_many() {
        let embeds = vec![Embed::all("fees").inner()];
        let mut row = Row::new();
        row.insert("id".to_string(), json!("s1"));
        row.insert("fees".to_string(), Value::Null);
        assert!(normalize(EntityKind::Student, &embeds, row.clone()).is_none());

        let plain = vec![Embed::all("fees")];
        let shaped = normalize(EntityKind::Student, &plain, row).unwrap();
        assert_eq!(shaped["fees"], json!([]));
    }
}
