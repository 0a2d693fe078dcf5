//! Oracle Thin Client for Rust
//!
//! A pure Rust implementation of an Oracle database thin client that
//! speaks the TNS/TTC wire protocol directly, without Oracle Instant
//! Client.
//!
//! # Example
//!
//! ```no_run
//! use orathin::{Connection, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut conn = Connection::connect(
//!         "localhost:1521/FREEPDB1",
//!         "username",
//!         "password"
//!     ).await?;
//!
//!     if let Some(version) = conn.server_version() {
//!         println!("Connected to Oracle {}.{}.{}.{}.{}",
//!             version.0, version.1, version.2, version.3, version.4);
//!     }
//!
//!     let result = conn.query("SELECT 'hello' FROM DUAL").await?;
//!     for row in &result {
//!         println!("{:?}", row.get(0));
//!     }
//!
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```

pub mod binds;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod protocol;
pub mod statement;

// Re-export main types
pub use binds::{BindMetadata, BindRef, Bindings};
pub use config::{AuthMode, AuthParams, ConnectParams, Purity, ServiceId, StatementOptions};
pub use connection::{Connection, ExecuteResult, QueryResult};
pub use cursor::{row_stream, Cursor};
pub use error::{BatchError, Error, Result, TransactionError};
pub use protocol::types::{Column, ColumnInfo, ColumnMetadata, OracleType, OracleValue, Row};
pub use statement::{Statement, StatementKind};
