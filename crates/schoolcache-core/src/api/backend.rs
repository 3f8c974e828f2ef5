use async_trait::async_trait;

use super::{ApiError, SelectRequest};
use crate::models::Row;
use crate::schema::EntityKind;

/// The remote relational store.
///
/// Every call either yields data or an `ApiError`; nothing is retried here.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Run a select and return the matching rows with their embeds.
    async fn select(&self, request: &SelectRequest) -> Result<Vec<Row>, ApiError>;

    /// Insert one row and return it as stored.
    async fn insert(&self, entity: EntityKind, payload: Row) -> Result<Row, ApiError>;

    /// Patch the row with the given id and return it as stored.
    async fn update(&self, entity: EntityKind, id: &str, patch: Row) -> Result<Row, ApiError>;

    /// Delete the row with the given id.
    async fn delete(&self, entity: EntityKind, id: &str) -> Result<(), ApiError>;
}
