//! TNS/TTC protocol implementation.

pub mod auth;
pub mod buffer;
pub mod cleanup;
pub mod codec;
pub mod connect;
pub mod constants;
pub mod crypto;
pub mod message;
pub mod messages;
pub mod packet;
pub mod response;
pub mod types;

pub use buffer::{ReadBuffer, WriteBuffer};
pub use cleanup::{CleanupContext, PendingCleanup};
pub use message::{DataMessage, Message, WriteExt};
pub use messages::{
    AuthPhaseOneMessage, AuthPhaseTwoMessage, ConnectMessage, DataTypesMessage, ExecuteMessage,
    FastAuthMessage, FetchMessage, FunctionMessage, MarkerMessage, ProtocolMessage,
};
pub use packet::{Capabilities, Packet};
pub use response::{DecodedResponse, ErrorInfo, ResponseDecoder};
pub use types::{Column, ColumnInfo, ColumnMetadata, OracleType, OracleValue, Row};
