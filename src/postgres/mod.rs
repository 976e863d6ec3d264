// PostgreSQL driver glue - everything that touches tokio-postgres types directly
//
// - params: `ToSql` for `RowValues`, encoding to the server-inferred parameter type
// - query: statement execution and result extraction

pub mod params;
pub mod query;

pub use params::Params;
pub use query::{build_result_set_from_statement, postgres_extract_value, run_statement};
