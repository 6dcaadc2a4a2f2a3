use thiserror::Error;

/// SQLite primary result codes that mean another writer holds the lock.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Error, Debug)]
pub enum OrderingError {
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Malformed input: {field} - {message}")]
    MalformedInput { field: String, message: String },

    #[error("Item {item_id} does not belong to scope {scope}")]
    ScopeViolation { scope: String, item_id: String },

    #[error("Position constraint conflict: {message}")]
    ConstraintConflict { message: String },

    #[error("Concurrent modification: {message}")]
    ConcurrentModification { message: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },
}

impl OrderingError {
    pub(crate) fn malformed(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Only lock contention qualifies; every other failure is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }

    /// Whether the caller sent something it should not have (a 4xx, for a web handler).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedInput { .. } | Self::ScopeViolation { .. } | Self::NotFound { .. }
        )
    }
}

impl From<sqlx::Error> for OrderingError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::ConstraintConflict {
                    message: db_err.message().to_string(),
                };
            }

            // Extended codes (e.g. SQLITE_BUSY_SNAPSHOT = 517) keep the primary code in the low byte.
            let primary = db_err
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| code & 0xff);
            if matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED)) {
                return Self::ConcurrentModification {
                    message: db_err.message().to_string(),
                };
            }
        }

        Self::Database(err)
    }
}

pub type Result<T> = std::result::Result<T, OrderingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_concurrent_modification_is_retryable() {
        let busy = OrderingError::ConcurrentModification {
            message: "database is locked".to_string(),
        };
        let conflict = OrderingError::ConstraintConflict {
            message: "UNIQUE constraint failed".to_string(),
        };

        assert!(busy.is_retryable());
        assert!(!conflict.is_retryable());
        assert!(!OrderingError::malformed("order", "not a list").is_retryable());
    }

    #[test]
    fn test_client_error_classification() {
        assert!(OrderingError::malformed("order", "bad id").is_client_error());
        assert!(OrderingError::ScopeViolation {
            scope: "favorites:1".to_string(),
            item_id: "9".to_string(),
        }
        .is_client_error());
        assert!(!OrderingError::Migration("boom".to_string()).is_client_error());
    }

    #[test]
    fn test_non_database_sqlx_error_stays_opaque() {
        let err = OrderingError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, OrderingError::Database(_)));
    }
}
