//! Error types for repository operations.
//!
//! Repository errors carry structured context so failures can be traced
//! to an operation, entity and id without string parsing.

use std::fmt;

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Structured context for repository errors.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "set_schedule", "reserve")
    pub operation: Option<String>,
    /// The entity type involved (e.g., "rule", "slot", "booking")
    pub entity: Option<String>,
    /// The entity ID if applicable
    pub entity_id: Option<String>,
    /// Additional details about the error
    pub details: Option<String>,
    /// Whether this error is retryable
    pub retryable: bool,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    /// Set the entity type.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Set the entity ID.
    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Mark this error as retryable.
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref entity) = self.entity {
            parts.push(format!("entity={}", entity));
        }
        if let Some(ref id) = self.entity_id {
            parts.push(format!("id={}", id));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        if self.retryable {
            parts.push("retryable=true".to_string());
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for repository operations.
///
/// Validation and not-found errors abort the whole operation before any
/// mutation; capacity and conflict errors report the losing side of a
/// contended or contradictory write.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Connection pool or database connection errors, typically transient.
    #[error("Connection error: {message} {context}")]
    Connection {
        message: String,
        context: ErrorContext,
    },

    /// SQL query execution errors.
    #[error("Query error: {message} {context}")]
    Query {
        message: String,
        context: ErrorContext,
    },

    /// Requested entity was not found, or is owned by another vendor.
    /// Ownership mismatches are deliberately indistinguishable from
    /// missing rows.
    #[error("Not found: {message} {context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// Input validation failed before any mutation.
    #[error("Validation error: {message} {context}")]
    Validation {
        message: String,
        context: ErrorContext,
    },

    /// Conflicting state: overlapping rule, delete with live reservation,
    /// or an illegal booking transition.
    #[error("Conflict: {message} {context}")]
    Conflict {
        message: String,
        context: ErrorContext,
    },

    /// A slot's reservation ledger is full for the requested date.
    #[error("Capacity exceeded: {message} {context}")]
    CapacityExceeded {
        message: String,
        context: ErrorContext,
    },

    /// No rule or slot covers the requested vendor/date/time.
    #[error("No availability: {message} {context}")]
    NoAvailability {
        message: String,
        context: ErrorContext,
    },

    /// Configuration or initialization error.
    #[error("Configuration error: {message} {context}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// Transaction error (commit/rollback failed).
    #[error("Transaction error: {message} {context}")]
    Transaction {
        message: String,
        context: ErrorContext,
    },

    /// Internal/unexpected errors.
    #[error("Internal error: {message} {context}")]
    Internal {
        message: String,
        context: ErrorContext,
    },
}

macro_rules! constructors {
    ($($fn_name:ident, $with_ctx:ident => $variant:ident),* $(,)?) => {
        $(
            pub fn $fn_name(message: impl Into<String>) -> Self {
                Self::$variant {
                    message: message.into(),
                    context: ErrorContext::default(),
                }
            }

            pub fn $with_ctx(message: impl Into<String>, context: ErrorContext) -> Self {
                Self::$variant {
                    message: message.into(),
                    context,
                }
            }
        )*
    };
}

impl RepositoryError {
    constructors!(
        query, query_with_context => Query,
        not_found, not_found_with_context => NotFound,
        validation, validation_with_context => Validation,
        conflict, conflict_with_context => Conflict,
        capacity_exceeded, capacity_exceeded_with_context => CapacityExceeded,
        no_availability, no_availability_with_context => NoAvailability,
        configuration, configuration_with_context => Configuration,
        transaction, transaction_with_context => Transaction,
        internal, internal_with_context => Internal,
    );

    /// Create a connection error; connection failures default to retryable.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            context: ErrorContext::default().retryable(),
        }
    }

    /// Create a connection error with full context.
    pub fn connection_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Connection {
            message: message.into(),
            context: context.retryable(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { context, .. }
            | Self::Query { context, .. }
            | Self::Transaction { context, .. } => context.retryable,
            _ => false,
        }
    }

    /// Get the error context.
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Connection { context, .. }
            | Self::Query { context, .. }
            | Self::NotFound { context, .. }
            | Self::Validation { context, .. }
            | Self::Conflict { context, .. }
            | Self::CapacityExceeded { context, .. }
            | Self::NoAvailability { context, .. }
            | Self::Configuration { context, .. }
            | Self::Transaction { context, .. }
            | Self::Internal { context, .. } => context,
        }
    }

    /// Add or update the operation in the error context.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        match &mut self {
            Self::Connection { context, .. }
            | Self::Query { context, .. }
            | Self::NotFound { context, .. }
            | Self::Validation { context, .. }
            | Self::Conflict { context, .. }
            | Self::CapacityExceeded { context, .. }
            | Self::NoAvailability { context, .. }
            | Self::Configuration { context, .. }
            | Self::Transaction { context, .. }
            | Self::Internal { context, .. } => {
                context.operation = Some(operation.into());
            }
        }
        self
    }

    /// Build a validation error from field-level failures.
    pub fn from_field_errors(
        errors: &[crate::models::FieldError],
        context: ErrorContext,
    ) -> Self {
        let message = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Self::validation_with_context(message, context)
    }
}

impl From<String> for RepositoryError {
    fn from(s: String) -> Self {
        RepositoryError::internal(s)
    }
}

impl From<&str> for RepositoryError {
    fn from(s: &str) -> Self {
        RepositoryError::internal(s.to_string())
    }
}

#[cfg(feature = "postgres-repo")]
impl From<diesel::result::Error> for RepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => RepositoryError::not_found("Record not found"),
            diesel::result::Error::DatabaseError(kind, info) => {
                let message = info.message().to_string();
                let context =
                    ErrorContext::default().with_details(format!("db_error_kind={:?}", kind));

                match kind {
                    diesel::result::DatabaseErrorKind::UniqueViolation => {
                        RepositoryError::Conflict { message, context }
                    }
                    // Deadlocks and serialization failures are retryable
                    diesel::result::DatabaseErrorKind::SerializationFailure => {
                        RepositoryError::Query {
                            message,
                            context: context.retryable(),
                        }
                    }
                    _ => RepositoryError::Query { message, context },
                }
            }
            diesel::result::Error::QueryBuilderError(e) => {
                RepositoryError::query(format!("Query builder error: {}", e))
            }
            diesel::result::Error::DeserializationError(e) => {
                RepositoryError::internal(format!("Deserialization error: {}", e))
            }
            diesel::result::Error::SerializationError(e) => {
                RepositoryError::internal(format!("Serialization error: {}", e))
            }
            other => RepositoryError::query(other.to_string()),
        }
    }
}

#[cfg(feature = "postgres-repo")]
impl From<diesel::r2d2::PoolError> for RepositoryError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        RepositoryError::connection_with_context(
            err.to_string(),
            ErrorContext::default().with_details("pool_error"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_display() {
        let ctx = ErrorContext::new("reserve")
            .with_entity("slot")
            .with_entity_id(42)
            .with_details("date=2026-09-07");
        let s = ctx.to_string();
        assert!(s.contains("operation=reserve"));
        assert!(s.contains("entity=slot"));
        assert!(s.contains("id=42"));
    }

    #[test]
    fn retryable_flags() {
        assert!(RepositoryError::connection("pool exhausted").is_retryable());
        assert!(!RepositoryError::capacity_exceeded("slot full").is_retryable());
        assert!(!RepositoryError::not_found("rule 9").is_retryable());
    }

    #[test]
    fn with_operation_updates_context() {
        let err = RepositoryError::conflict("live reservation").with_operation("bulk_set_status");
        assert_eq!(err.context().operation.as_deref(), Some("bulk_set_status"));
    }

    #[test]
    fn field_errors_join() {
        let errors = vec![
            crate::models::FieldError::new("end_time", "must be after start"),
            crate::models::FieldError::new("buffer_time", "outside range"),
        ];
        let err = RepositoryError::from_field_errors(&errors, ErrorContext::new("set_schedule"));
        assert!(err.to_string().contains("end_time"));
        assert!(err.to_string().contains("buffer_time"));
    }
}
