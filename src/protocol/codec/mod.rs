//! Primitive wire codecs for Oracle data types.
//!
//! Each submodule encodes and decodes one bespoke representation: NUMBER,
//! DATE/TIMESTAMP, INTERVAL DAY TO SECOND, BINARY_FLOAT/DOUBLE and ROWID.

pub mod date;
pub mod float;
pub mod interval;
pub mod number;
pub mod rowid;

pub use date::{decode_date, decode_timestamp, encode_date, encode_timestamp, TimestampValue};
pub use float::{decode_binary_double, decode_binary_float, encode_binary_double, encode_binary_float};
pub use interval::{decode_interval_ds, encode_interval_ds};
pub use number::{decode_number, encode_number};
pub use rowid::RowId;
