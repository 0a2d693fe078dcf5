//! Oracle data types for query results and binds.

mod column;
mod fetch_var;
mod lob;
mod metadata;
mod oracle_type;
mod row;
mod value;

pub use column::{Column, ColumnInfo};
pub use fetch_var::{build_fetch_vars, FetchVar};
pub use lob::{LobLocator, LobValue};
pub use metadata::ColumnMetadata;
pub use oracle_type::OracleType;
pub use row::Row;
pub use value::OracleValue;
