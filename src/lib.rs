//! Pooled PostgreSQL sessions and a generic CRUD repository.
//!
//! A [`SessionManager`] owns a `deadpool-postgres` pool and runs parameterized statements;
//! a [`Repository`] turns typed CRUD calls and [`QueryDescriptor`]s into those statements.
//! Values always travel as `$n` parameters. Multi-statement work runs inside
//! [`Repository::with_transaction`] on one dedicated connection.
//!
//! ```rust,no_run
//! use serde::{Deserialize, Serialize};
//! use sql_repository::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! struct User {
//!     id: i32,
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! struct NewUser {
//!     name: String,
//! }
//!
//! # async fn demo() -> Result<(), SqlRepositoryError> {
//! let session = SessionManager::new();
//! session
//!     .connect(&ConnectionConfig::from_connection_string("postgres://app:pw@localhost/app"))
//!     .await?;
//!
//! let users: Repository<User> = Repository::new(session.clone(), "users");
//! users.create(&NewUser { name: "User 1".into() }).await?;
//! let newest = users
//!     .find_many(&QueryDescriptor::new().order_by("id", SortOrder::Descending).limit(1))
//!     .await?;
//! println!("{newest:?}");
//!
//! session.disconnect().await;
//! # Ok(()) }
//! ```

pub mod prelude;

pub mod config;
pub mod error;
pub mod executor;
pub mod postgres;
pub mod query_builder;
pub mod repository;
pub mod results;
pub mod session;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use config::ConnectionConfig;
pub use error::SqlRepositoryError;
pub use executor::StatementExecutor;
pub use query_builder::{QueryDescriptor, SortOrder};
pub use repository::Repository;
pub use results::{CustomDbRow, ResultSet};
pub use session::{DedicatedConnection, PoolStatus, SessionManager, TransactionConnection};
pub use types::{QueryAndParams, RowValues};
