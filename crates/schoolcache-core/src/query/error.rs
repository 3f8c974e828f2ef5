use std::sync::Arc;

use thiserror::Error;

use crate::api::ApiError;
use crate::schema::EntityKind;

/// Failure of a query or mutation.
///
/// Cloneable so one failed fetch can be handed to every caller attached to
/// it and also kept on the cache entry.
#[derive(Error, Debug, Clone)]
pub enum QueryError {
    #[error("{context}: {source}")]
    Remote {
        context: String,
        source: Arc<ApiError>,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("Invalid query: {0}")]
    Validation(String),

    #[error("Failed to decode {entity} row: {source}")]
    Decode {
        entity: EntityKind,
        source: Arc<serde_json::Error>,
    },

    #[error("Fetch aborted: {0}")]
    Aborted(String),
}

impl QueryError {
    pub fn remote(context: impl Into<String>, source: ApiError) -> Self {
        QueryError::Remote {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        QueryError::Validation(message.into())
    }

    /// The backend error behind a remote failure.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            QueryError::Remote { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
