//! Convenient imports for common functionality.
//!
//! ```rust
//! use sql_repository::prelude::*;
//! ```

pub use crate::config::ConnectionConfig;
pub use crate::error::SqlRepositoryError;
pub use crate::executor::StatementExecutor;
pub use crate::query_builder::{QueryDescriptor, SortOrder};
pub use crate::repository::Repository;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::session::{
    DedicatedConnection, PoolStatus, SessionManager, TransactionConnection,
};
pub use crate::types::{QueryAndParams, RowValues};
