//! Authentication TNS messages.

use super::data_types;
use crate::error::Result;
use crate::protocol::constants::*;
use crate::protocol::message::{
    bytes_with_length_wire_size, key_value_wire_size, ub_wire_size, DataMessage, Message, WriteExt,
};

/// Driver banner reported to the server during authentication.
const CLIENT_DRIVER_NAME: &str = "orathin : 0.1.0";
/// Client version number in Oracle's packed format.
const CLIENT_VERSION: &str = "185599488";

// ============================================================================
// AuthPhaseOneMessage - Authentication Phase 1 (TNS_FUNC_AUTH_PHASE_ONE)
// ============================================================================

/// Authentication phase 1 message.
///
/// Sends the username and client identity pairs; the server answers with
/// verifier data (AUTH_VFR_DATA, AUTH_SESSKEY, PBKDF2 parameters).
pub struct AuthPhaseOneMessage<'a> {
    /// Username.
    pub username: &'a str,
    /// Base authentication mode bits (sys roles included).
    pub auth_mode: u32,
    /// Terminal name.
    pub terminal: &'a str,
    /// Program name.
    pub program: &'a str,
    /// Machine/hostname.
    pub machine: &'a str,
    /// Process ID.
    pub pid: &'a str,
    /// OS username.
    pub osuser: &'a str,
}

impl Message for AuthPhaseOneMessage<'_> {
    fn wire_size(&self) -> usize {
        let has_user = !self.username.is_empty();
        let user_bytes_len = self.username.len();

        let mut size = 0;
        size += 3; // message type, function code, sequence
        size += 1; // user presence flag
        size += ub_wire_size(user_bytes_len as u64);
        size += ub_wire_size((TNS_AUTH_MODE_LOGON | self.auth_mode) as u64);
        size += 1; // pointer to key/value pairs
        size += ub_wire_size(5); // num_pairs
        size += 1; // authivl pointer
        size += 1; // authovln pointer

        if has_user {
            size += bytes_with_length_wire_size(user_bytes_len);
        }

        size += key_value_wire_size("AUTH_TERMINAL", self.terminal, 0);
        size += key_value_wire_size("AUTH_PROGRAM_NM", self.program, 0);
        size += key_value_wire_size("AUTH_MACHINE", self.machine, 0);
        size += key_value_wire_size("AUTH_PID", self.pid, 0);
        size += key_value_wire_size("AUTH_SID", self.osuser, 0);

        size
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        let has_user = !self.username.is_empty();
        let user_bytes = self.username.as_bytes();

        buf.write_u8(TNS_MSG_TYPE_FUNCTION);
        buf.write_u8(TNS_FUNC_AUTH_PHASE_ONE);
        buf.write_u8(1); // sequence

        buf.write_u8(if has_user { 1 } else { 0 });
        buf.write_ub4(user_bytes.len() as u32);
        buf.write_ub4(TNS_AUTH_MODE_LOGON | self.auth_mode);

        buf.write_u8(1); // pointer to key/value pairs
        buf.write_ub4(5); // num_pairs
        buf.write_u8(1); // authivl pointer
        buf.write_u8(1); // authovln pointer

        if has_user {
            buf.write_bytes_with_length(user_bytes);
        }

        buf.write_key_value("AUTH_TERMINAL", self.terminal, 0);
        buf.write_key_value("AUTH_PROGRAM_NM", self.program, 0);
        buf.write_key_value("AUTH_MACHINE", self.machine, 0);
        buf.write_key_value("AUTH_PID", self.pid, 0);
        buf.write_key_value("AUTH_SID", self.osuser, 0);

        Ok(())
    }
}

impl DataMessage for AuthPhaseOneMessage<'_> {}

// ============================================================================
// AuthPhaseTwoMessage - Authentication Phase 2 (TNS_FUNC_AUTH_PHASE_TWO)
// ============================================================================

/// Authentication phase 2 message.
///
/// Sends the session key, the encrypted password and the session defaults
/// to complete authentication.
pub struct AuthPhaseTwoMessage<'a> {
    /// Username.
    pub username: &'a str,
    /// Base authentication mode bits (sys roles included).
    pub auth_mode: u32,
    /// Client session key exchange payload (hex).
    pub session_key: &'a str,
    /// Speedy key (12c verifier only, hex).
    pub speedy_key: Option<&'a str>,
    /// Encrypted password (hex).
    pub encoded_password: &'a str,
    /// Encrypted replacement password for a password change (hex).
    pub encoded_new_password: Option<&'a str>,
    /// DRCP purity, sent only when not default.
    pub purity: Option<u32>,
    /// Timezone ALTER SESSION statement.
    pub timezone_stmt: &'a str,
}

impl AuthPhaseTwoMessage<'_> {
    fn effective_mode(&self) -> u32 {
        let mut mode = TNS_AUTH_MODE_LOGON | TNS_AUTH_MODE_WITH_PASSWORD | self.auth_mode;
        if self.encoded_new_password.is_some() {
            mode |= TNS_AUTH_MODE_CHANGE_PASSWORD;
        }
        mode
    }

    fn num_pairs(&self) -> u32 {
        let mut num_pairs = 6u32;
        if self.speedy_key.is_some() {
            num_pairs += 1;
        }
        if self.encoded_new_password.is_some() {
            num_pairs += 1;
        }
        if self.purity.is_some() {
            num_pairs += 1;
        }
        num_pairs
    }
}

impl Message for AuthPhaseTwoMessage<'_> {
    fn wire_size(&self) -> usize {
        let has_user = !self.username.is_empty();
        let user_bytes_len = self.username.len();

        let mut size = 0;
        size += 3; // message type, function code, sequence
        size += 1; // user presence flag
        size += ub_wire_size(user_bytes_len as u64);
        size += ub_wire_size(self.effective_mode() as u64);
        size += 1; // pointer to key/value pairs
        size += ub_wire_size(self.num_pairs() as u64);
        size += 1; // authivl pointer
        size += 1; // authovln pointer

        if has_user {
            size += bytes_with_length_wire_size(user_bytes_len);
        }

        size += key_value_wire_size("AUTH_SESSKEY", self.session_key, 1);
        if let Some(sk) = self.speedy_key {
            size += key_value_wire_size("AUTH_PBKDF2_SPEEDY_KEY", sk, 0);
        }
        size += key_value_wire_size("AUTH_PASSWORD", self.encoded_password, 0);
        if let Some(np) = self.encoded_new_password {
            size += key_value_wire_size("AUTH_NEWPASSWORD", np, 0);
        }
        if let Some(purity) = self.purity {
            size += key_value_wire_size("AUTH_KPPL_PURITY", &purity.to_string(), 1);
        }
        size += key_value_wire_size("SESSION_CLIENT_CHARSET", "873", 0);
        size += key_value_wire_size("SESSION_CLIENT_DRIVER_NAME", CLIENT_DRIVER_NAME, 0);
        size += key_value_wire_size("SESSION_CLIENT_VERSION", CLIENT_VERSION, 0);
        size += key_value_wire_size("AUTH_ALTER_SESSION", self.timezone_stmt, 1);

        size
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        let has_user = !self.username.is_empty();
        let user_bytes = self.username.as_bytes();

        buf.write_u8(TNS_MSG_TYPE_FUNCTION);
        buf.write_u8(TNS_FUNC_AUTH_PHASE_TWO);
        buf.write_u8(2); // sequence

        buf.write_u8(if has_user { 1 } else { 0 });
        buf.write_ub4(user_bytes.len() as u32);
        buf.write_ub4(self.effective_mode());

        buf.write_u8(1); // pointer to key/value pairs
        buf.write_ub4(self.num_pairs());
        buf.write_u8(1); // authivl pointer
        buf.write_u8(1); // authovln pointer

        if has_user {
            buf.write_bytes_with_length(user_bytes);
        }

        buf.write_key_value("AUTH_SESSKEY", self.session_key, 1);
        if let Some(sk) = self.speedy_key {
            buf.write_key_value("AUTH_PBKDF2_SPEEDY_KEY", sk, 0);
        }
        buf.write_key_value("AUTH_PASSWORD", self.encoded_password, 0);
        if let Some(np) = self.encoded_new_password {
            buf.write_key_value("AUTH_NEWPASSWORD", np, 0);
        }
        if let Some(purity) = self.purity {
            buf.write_key_value("AUTH_KPPL_PURITY", &purity.to_string(), 1);
        }
        buf.write_key_value("SESSION_CLIENT_CHARSET", "873", 0);
        buf.write_key_value("SESSION_CLIENT_DRIVER_NAME", CLIENT_DRIVER_NAME, 0);
        buf.write_key_value("SESSION_CLIENT_VERSION", CLIENT_VERSION, 0);
        buf.write_key_value("AUTH_ALTER_SESSION", self.timezone_stmt, 1);

        Ok(())
    }
}

impl DataMessage for AuthPhaseTwoMessage<'_> {}

// ============================================================================
// FastAuthMessage - Combined fast auth for Oracle 23ai
// ============================================================================

/// FastAuth message (Oracle 23ai+).
///
/// Combines protocol negotiation, data types, and auth phase 1 into a
/// single round trip.
pub struct FastAuthMessage<'a> {
    /// Driver name for the embedded protocol message.
    pub driver_name: &'a [u8],
    /// Compile-time capabilities.
    pub compile_caps: &'a [u8],
    /// Runtime capabilities.
    pub runtime_caps: &'a [u8],
    /// Embedded auth phase 1.
    pub auth: AuthPhaseOneMessage<'a>,
}

impl Message for FastAuthMessage<'_> {
    fn wire_size(&self) -> usize {
        let mut size = 0;

        size += 4; // fast auth header: message type, version, two flags

        // Embedded Protocol message
        size += 3; // message type, protocol version, array terminator
        size += self.driver_name.len();
        size += 1; // null terminator

        size += 5; // server charset, charset flag, server ncharset
        size += 1; // TTC field version

        // Embedded DataTypes message
        size += 1; // message type
        size += 5; // charset, ncharset, encoding flags
        size += bytes_with_length_wire_size(self.compile_caps.len());
        size += bytes_with_length_wire_size(self.runtime_caps.len());
        size += data_types::data_types_array_wire_size();

        size += self.auth.wire_size();

        size
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u8(TNS_MSG_TYPE_FAST_AUTH);
        buf.write_u8(1); // fast auth version
        buf.write_u8(TNS_SERVER_CONVERTS_CHARS);
        buf.write_u8(0);

        buf.write_u8(TNS_MSG_TYPE_PROTOCOL);
        buf.write_u8(6); // protocol version
        buf.write_u8(0); // array terminator
        buf.write_bytes(self.driver_name);
        buf.write_u8(0); // null terminator

        buf.write_u16_be(0); // server charset
        buf.write_u8(0); // server charset flag
        buf.write_u16_be(0); // server ncharset

        buf.write_u8(TNS_CCAP_FIELD_VERSION_19_1_EXT_1);

        buf.write_u8(TNS_MSG_TYPE_DATA_TYPES);
        buf.write_u16_le(TNS_CHARSET_UTF8);
        buf.write_u16_le(TNS_CHARSET_UTF8);
        buf.write_u8(TNS_ENCODING_MULTI_BYTE | TNS_ENCODING_CONV_LENGTH);
        buf.write_bytes_with_length(self.compile_caps);
        buf.write_bytes_with_length(self.runtime_caps);
        data_types::write_data_types_array(buf);

        self.auth.write_to(buf)?;

        Ok(())
    }
}

impl DataMessage for FastAuthMessage<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase_one<'a>() -> AuthPhaseOneMessage<'a> {
        AuthPhaseOneMessage {
            username: "test_user",
            auth_mode: 0,
            terminal: "unknown",
            program: "orathin",
            machine: "localhost",
            pid: "12345",
            osuser: "testuser",
        }
    }

    #[test]
    fn test_auth_phase_one_wire_size() {
        let msg = phase_one();
        let mut buf = Vec::with_capacity(msg.wire_size());
        msg.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), msg.wire_size());
    }

    #[test]
    fn test_auth_phase_two_wire_size() {
        let msg = AuthPhaseTwoMessage {
            username: "test_user",
            auth_mode: 0,
            session_key: "ABCD1234",
            speedy_key: Some("EFGH5678"),
            encoded_password: "ENCRYPTED_PASSWORD_HEX",
            encoded_new_password: None,
            purity: None,
            timezone_stmt: "ALTER SESSION SET TIME_ZONE='+00:00'\0",
        };

        let mut buf = Vec::with_capacity(msg.wire_size());
        msg.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), msg.wire_size());
    }

    #[test]
    fn test_auth_phase_two_password_change() {
        let msg = AuthPhaseTwoMessage {
            username: "test_user",
            auth_mode: TNS_AUTH_MODE_SYSDBA,
            session_key: "ABCD1234",
            speedy_key: None,
            encoded_password: "OLD_HEX",
            encoded_new_password: Some("NEW_HEX"),
            purity: Some(1),
            timezone_stmt: "ALTER SESSION SET TIME_ZONE='+00:00'\0",
        };

        let mode = msg.effective_mode();
        assert!(mode & TNS_AUTH_MODE_CHANGE_PASSWORD != 0);
        assert!(mode & TNS_AUTH_MODE_SYSDBA != 0);
        assert!(mode & TNS_AUTH_MODE_WITH_PASSWORD != 0);
        assert_eq!(msg.num_pairs(), 8);

        let mut buf = Vec::with_capacity(msg.wire_size());
        msg.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), msg.wire_size());
    }

    #[test]
    fn test_fast_auth_wire_size() {
        let compile_caps = vec![0u8; 64];
        let runtime_caps = vec![0u8; 16];

        let msg = FastAuthMessage {
            driver_name: b"orathin",
            compile_caps: &compile_caps,
            runtime_caps: &runtime_caps,
            auth: phase_one(),
        };

        let mut buf = Vec::with_capacity(msg.wire_size());
        msg.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), msg.wire_size());
    }
}
