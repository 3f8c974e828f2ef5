//! In-process backend with the store's join and filter semantics.
//!
//! Tables are plain row vectors keyed by entity. Relations are resolved
//! through the schema registry's foreign keys, so embeds, relation filters
//! and inner joins behave like the remote store. Call counters, injected
//! failures and select latches let tests observe and steer fetch traffic.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use super::request::compare_values;
use super::{ApiError, Backend, Embed, SelectRequest};
use crate::models::Row;
use crate::schema::{Cardinality, EntityKind, Relation, ID_FIELD};

#[derive(Default)]
struct State {
    tables: HashMap<EntityKind, Vec<Row>>,
    next_id: u64,
    select_failures: VecDeque<String>,
    mutation_failures: VecDeque<String>,
    latches: VecDeque<oneshot::Receiver<()>>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    selects: AtomicUsize,
    mutations: AtomicUsize,
}

/// Holds the next select open until released or dropped.
pub struct SelectLatch {
    release: oneshot::Sender<()>,
}

impl SelectLatch {
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append rows to a table. Non-object values are ignored.
    pub fn seed(&self, entity: EntityKind, rows: impl IntoIterator<Item = Value>) {
        let mut state = self.state();
        let table = state.tables.entry(entity).or_default();
        table.extend(rows.into_iter().filter_map(|v| match v {
            Value::Object(row) => Some(row),
            _ => None,
        }));
    }

    pub fn rows(&self, entity: EntityKind) -> Vec<Row> {
        self.state().tables.get(&entity).cloned().unwrap_or_default()
    }

    /// Number of selects served so far.
    pub fn select_count(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    /// Number of insert/update/delete calls received so far.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Make the next select fail with `ApiError::Rejected`.
    pub fn fail_next_select(&self, message: impl Into<String>) {
        self.state().select_failures.push_back(message.into());
    }

    /// Make the next mutation fail with `ApiError::Rejected`.
    pub fn fail_next_mutation(&self, message: impl Into<String>) {
        self.state().mutation_failures.push_back(message.into());
    }

    /// Hold the next select until the returned latch is released.
    ///
    /// The select reads the tables as soon as it is issued; only its
    /// response is held back, like a slow network round trip.
    pub fn pause_next_select(&self) -> SelectLatch {
        let (release, wait) = oneshot::channel();
        self.state().latches.push_back(wait);
        SelectLatch { release }
    }

    fn run_select(state: &State, request: &SelectRequest) -> Vec<Row> {
        let empty = Vec::new();
        let source = state.tables.get(&request.entity).unwrap_or(&empty);

        let mut rows: Vec<Row> = source
            .iter()
            .filter(|row| request.row_filters().all(|f| f.matches(row)))
            .filter_map(|row| Self::shape_row(state, request, row))
            .collect();

        if let Some(ref order) = request.order {
            rows.sort_by(|a, b| {
                let lhs = order_value(a, order.relation.as_deref(), &order.column);
                let rhs = order_value(b, order.relation.as_deref(), &order.column);
                let ord = compare_values(lhs, rhs);
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        if let Some(limit) = request.limit {
            rows.truncate(limit);
        }
        rows
    }

    /// Project one source row and attach its embeds. Returns `None` when an
    /// inner join finds no matching related row.
    fn shape_row(state: &State, request: &SelectRequest, source: &Row) -> Option<Row> {
        let mut out = request.columns.project(source);
        for embed in &request.embeds {
            let relation = request.entity.schema().relation(&embed.relation)?;
            let filters: Vec<_> = request.relation_filters(&embed.relation).collect();
            let related = Self::resolve(state, relation, embed, source, |row| {
                filters.iter().all(|f| f.matches(row))
            });
            if embed.inner && is_empty_embed(&related) {
                return None;
            }
            out.insert(embed.relation.clone(), related);
        }
        Some(out)
    }

    fn resolve(
        state: &State,
        relation: &Relation,
        embed: &Embed,
        parent: &Row,
        keep: impl Fn(&Row) -> bool,
    ) -> Value {
        let empty = Vec::new();
        let target = state.tables.get(&relation.target).unwrap_or(&empty);

        let candidates: Vec<&Row> = match relation.cardinality {
            Cardinality::One => match parent.get(relation.foreign_key) {
                Some(fk) if !fk.is_null() => target
                    .iter()
                    .filter(|row| row.get(ID_FIELD) == Some(fk))
                    .collect(),
                _ => Vec::new(),
            },
            Cardinality::Many => match parent.get(ID_FIELD) {
                Some(id) => target
                    .iter()
                    .filter(|row| row.get(relation.foreign_key) == Some(id))
                    .collect(),
                None => Vec::new(),
            },
        };

        let shaped: Vec<Value> = candidates
            .into_iter()
            .filter(|row| keep(row))
            .filter_map(|row| Self::shape_nested(state, relation.target, embed, row))
            .map(Value::Object)
            .collect();

        match relation.cardinality {
            Cardinality::One => shaped.into_iter().next().unwrap_or(Value::Null),
            Cardinality::Many => Value::Array(shaped),
        }
    }

    fn shape_nested(state: &State, entity: EntityKind, embed: &Embed, source: &Row) -> Option<Row> {
        let mut out = embed.columns.project(source);
        for nested in &embed.embeds {
            let relation = entity.schema().relation(&nested.relation)?;
            let related = Self::resolve(state, relation, nested, source, |_| true);
            if nested.inner && is_empty_embed(&related) {
                return None;
            }
            out.insert(nested.relation.clone(), related);
        }
        Some(out)
    }

    fn take_failure(&self, mutation: bool) -> Option<ApiError> {
        let mut state = self.state();
        let queue = if mutation {
            &mut state.mutation_failures
        } else {
            &mut state.select_failures
        };
        queue.pop_front().map(ApiError::Rejected)
    }
}

fn is_empty_embed(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn order_value<'a>(row: &'a Row, relation: Option<&str>, column: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    let holder = match relation {
        Some(name) => match row.get(name) {
            Some(Value::Object(embedded)) => embedded,
            _ => return &NULL,
        },
        None => row,
    };
    holder.get(column).unwrap_or(&NULL)
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, request: &SelectRequest) -> Result<Vec<Row>, ApiError> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure(false) {
            return Err(err);
        }

        let (rows, latch) = {
            let mut state = self.state();
            let rows = Self::run_select(&state, request);
            (rows, state.latches.pop_front())
        };
        if let Some(latch) = latch {
            // A dropped latch releases too
            let _ = latch.await;
        }

        debug!(entity = %request.entity, count = rows.len(), "Memory select");
        Ok(rows)
    }

    async fn insert(&self, entity: EntityKind, mut payload: Row) -> Result<Row, ApiError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure(true) {
            return Err(err);
        }

        let mut state = self.state();
        let id = match payload.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            _ => {
                state.next_id += 1;
                format!("{}-{}", entity.table(), state.next_id)
            }
        };
        let table = state.tables.entry(entity).or_default();
        if table.iter().any(|row| row.get(ID_FIELD) == Some(&Value::String(id.clone()))) {
            return Err(ApiError::Rejected(format!(
                "duplicate key value violates unique constraint \"{}_pkey\"",
                entity.table()
            )));
        }
        payload.insert(ID_FIELD.to_string(), Value::String(id));
        table.push(payload.clone());
        Ok(payload)
    }

    async fn update(&self, entity: EntityKind, id: &str, patch: Row) -> Result<Row, ApiError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure(true) {
            return Err(err);
        }

        let mut state = self.state();
        let row = state
            .tables
            .get_mut(&entity)
            .and_then(|table| {
                table
                    .iter_mut()
                    .find(|row| row.get(ID_FIELD).and_then(Value::as_str) == Some(id))
            })
            .ok_or_else(|| ApiError::NotFound(format!("{} {}", entity, id)))?;

        for (column, value) in patch {
            if column != ID_FIELD {
                row.insert(column, value);
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, entity: EntityKind, id: &str) -> Result<(), ApiError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure(true) {
            return Err(err);
        }

        if let Some(table) = self.state().tables.get_mut(&entity) {
            table.retain(|row| row.get(ID_FIELD).and_then(Value::as_str) != Some(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Filter, OrderBy};
    use serde_json::json;

    fn school() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.seed(
            EntityKind::Student,
            vec![
                json!({ "id": "s1", "full_name": "Ada Lovelace", "class": "10A" }),
                json!({ "id": "s2", "full_name": "Charles Babbage", "class": "10B" }),
                json!({ "id": "s3", "full_name": "Mary Somerville", "class": "10A" }),
            ],
        );
        backend.seed(
            EntityKind::Fee,
            vec![
                json!({ "id": "f1", "student_id": "s1", "amount": 100, "status": "pending" }),
                json!({ "id": "f2", "student_id": "s2", "amount": 100, "status": "paid" }),
                json!({ "id": "f3", "student_id": "s1", "amount": 50, "status": "paid" }),
            ],
        );
        backend
    }

    #[tokio::test]
    async fn test_plain_join_embeds_possibly_empty_arrays() {
        let backend = school();
        let request = SelectRequest::new(EntityKind::Student)
            .embed(Embed::columns("fees", &["id", "status"]))
            .order(OrderBy::asc("full_name"));
        let rows = backend.select(&request).await.unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["fees"].as_array().unwrap().len(), 2);
        assert_eq!(rows[2]["full_name"], "Mary Somerville");
        assert_eq!(rows[2]["fees"], json!([]));
        assert_eq!(rows[0]["fees"][0], json!({ "id": "f1", "status": "pending" }));
    }

    #[tokio::test]
    async fn test_inner_join_filters_parents() {
        let backend = school();
        let request = SelectRequest::new(EntityKind::Student)
            .embed(Embed::all("fees").inner())
            .filter(Filter::is_in("status", ["pending", "overdue"]).on("fees"));
        let rows = backend.select(&request).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "s1");
        // Only the matching fee is embedded
        assert_eq!(rows[0]["fees"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_to_one_embed_and_relation_order() {
        let backend = school();
        let request = SelectRequest::new(EntityKind::Fee)
            .embed(Embed::columns("students", &["full_name"]))
            .order(OrderBy::desc("full_name").on("students"))
            .limit(2);
        let rows = backend.select(&request).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["students"], json!({ "full_name": "Charles Babbage" }));
        assert_eq!(rows[1]["students"]["full_name"], "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_mutations_and_failures() {
        let backend = school();
        let mut payload = Row::new();
        payload.insert("full_name".to_string(), json!("Emmy Noether"));
        let created = backend.insert(EntityKind::Student, payload).await.unwrap();
        assert_eq!(created["id"], "students-1");

        let mut patch = Row::new();
        patch.insert("class".to_string(), json!("11C"));
        let updated = backend.update(EntityKind::Student, "students-1", patch).await.unwrap();
        assert_eq!(updated["class"], "11C");
        assert_eq!(updated["full_name"], "Emmy Noether");

        assert!(matches!(
            backend.update(EntityKind::Student, "nobody", Row::new()).await,
            Err(ApiError::NotFound(_))
        ));

        backend.fail_next_mutation("permission denied for table students");
        assert!(matches!(
            backend.delete(EntityKind::Student, "s1").await,
            Err(ApiError::Rejected(_))
        ));
        assert_eq!(backend.rows(EntityKind::Student).len(), 4);

        backend.delete(EntityKind::Student, "s1").await.unwrap();
        assert_eq!(backend.rows(EntityKind::Student).len(), 3);
        assert_eq!(backend.mutation_count(), 5);
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let backend = school();
        let mut payload = Row::new();
        payload.insert("id".to_string(), json!("s1"));
        assert!(matches!(
            backend.insert(EntityKind::Student, payload).await,
            Err(ApiError::Rejected(_))
        ));
    }
}
