use thiserror::Error;

/// Boxed underlying cause carried by every error variant.
pub type BoxDynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the session manager and the repository.
///
/// There are exactly two kinds so callers can tell "nothing to talk to" apart from
/// "talked to it and it refused the statement":
/// ```rust
/// use sql_repository::prelude::*;
///
/// let err = SqlRepositoryError::connection("Not connected to PostgreSQL");
/// assert!(err.is_connection());
/// assert!(!err.is_query());
/// ```
#[derive(Debug, Error)]
pub enum SqlRepositoryError {
    /// No pool, pool creation or the first checkout failed, or a connection could not be acquired.
    #[error("Connection error: {message}")]
    ConnectionError {
        message: String,
        #[source]
        source: Option<BoxDynError>,
    },

    /// The database rejected or failed a statement (bad SQL, constraint, type mismatch).
    #[error("Query error: {message}")]
    QueryError {
        message: String,
        #[source]
        source: Option<BoxDynError>,
    },
}

impl SqlRepositoryError {
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
            source: None,
        }
    }

    pub fn connection_with(message: impl Into<String>, cause: impl Into<BoxDynError>) -> Self {
        Self::ConnectionError {
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryError {
            message: message.into(),
            source: None,
        }
    }

    pub fn query_with(message: impl Into<String>, cause: impl Into<BoxDynError>) -> Self {
        Self::QueryError {
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    /// True for failures where there was nothing usable to talk to.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionError { .. })
    }

    /// True for failures reported while running a statement.
    #[must_use]
    pub fn is_query(&self) -> bool {
        matches!(self, Self::QueryError { .. })
    }

    /// Human-readable message without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::ConnectionError { message, .. } | Self::QueryError { message, .. } => message,
        }
    }
}

impl From<tokio_postgres::Error> for SqlRepositoryError {
    fn from(err: tokio_postgres::Error) -> Self {
        // A closed client means the link is gone, not that the statement was bad.
        if err.is_closed() {
            SqlRepositoryError::connection_with(format!("PostgreSQL connection lost: {err}"), err)
        } else {
            SqlRepositoryError::query_with(format!("PostgreSQL query failed: {err}"), err)
        }
    }
}

impl From<deadpool_postgres::PoolError> for SqlRepositoryError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        SqlRepositoryError::connection_with(
            format!("Failed to acquire PostgreSQL connection: {err}"),
            err,
        )
    }
}
