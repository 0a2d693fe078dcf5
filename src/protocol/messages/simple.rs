//! Bare function-call messages: ping, commit, rollback, logoff.
//!
//! These requests carry nothing beyond the function header; the server
//! answers each with a status message.

use crate::error::Result;
use crate::protocol::constants::*;
use crate::protocol::message::{DataMessage, Message, WriteExt};

/// A TTC function call with no arguments.
pub struct FunctionMessage {
    /// TTC function code.
    pub function_code: u8,
    /// Sequence number.
    pub sequence_number: u8,
}

impl FunctionMessage {
    /// Liveness probe.
    pub fn ping() -> Self {
        Self {
            function_code: TNS_FUNC_PING,
            sequence_number: 1,
        }
    }

    /// Commit the current transaction.
    pub fn commit() -> Self {
        Self {
            function_code: TNS_FUNC_COMMIT,
            sequence_number: 1,
        }
    }

    /// Roll back the current transaction.
    pub fn rollback() -> Self {
        Self {
            function_code: TNS_FUNC_ROLLBACK,
            sequence_number: 1,
        }
    }

    /// End the session before closing the transport.
    pub fn logoff() -> Self {
        Self {
            function_code: TNS_FUNC_LOGOFF,
            sequence_number: 1,
        }
    }
}

impl Message for FunctionMessage {
    fn wire_size(&self) -> usize {
        3 // message type, function code, sequence
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u8(TNS_MSG_TYPE_FUNCTION);
        buf.write_u8(self.function_code);
        buf.write_u8(self.sequence_number);
        Ok(())
    }
}

impl DataMessage for FunctionMessage {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_message_content() {
        for (msg, code) in [
            (FunctionMessage::ping(), TNS_FUNC_PING),
            (FunctionMessage::commit(), TNS_FUNC_COMMIT),
            (FunctionMessage::rollback(), TNS_FUNC_ROLLBACK),
            (FunctionMessage::logoff(), TNS_FUNC_LOGOFF),
        ] {
            let mut buf = Vec::with_capacity(msg.wire_size());
            msg.write_to(&mut buf).unwrap();
            assert_eq!(buf, vec![TNS_MSG_TYPE_FUNCTION, code, 1]);
        }
    }
}
