//! TNS message definitions.
//!
//! Each outbound message implements the `Message` trait for
//! single-allocation serialization.

pub mod auth;
pub mod connect;
pub mod data_types;
pub mod execute;
pub mod fetch;
pub mod piggyback;
pub mod simple;

pub use auth::{AuthPhaseOneMessage, AuthPhaseTwoMessage, FastAuthMessage};
pub use connect::{ConnectMessage, MarkerMessage, ProtocolMessage};
pub use data_types::DataTypesMessage;
pub use execute::ExecuteMessage;
pub use fetch::FetchMessage;
pub use piggyback::WithPiggybacks;
pub use simple::FunctionMessage;
