//! O5LOGON authentication.
//!
//! Two rounds: phase one sends the client identity and collects the
//! verifier parameters; phase two proves knowledge of the password by
//! completing the AES-CBC session-key agreement and sending the encrypted
//! password. Only the 11g (SHA-1) and 12c (PBKDF2-SHA512) verifier
//! profiles are accepted.

use crate::config::{AuthParams, ConnectParams};
use crate::error::{Error, Result};
use crate::protocol::buffer::ReadBuffer;
use crate::protocol::constants::*;
use crate::protocol::crypto::{
    bytes_to_hex_upper, decrypt_cbc, derive_key_pbkdf2, encrypt_cbc, hex_to_bytes, random_bytes,
    sha1_hash, sha512_hash,
};
use crate::protocol::messages::{AuthPhaseOneMessage, AuthPhaseTwoMessage, MarkerMessage};
use crate::protocol::packet::{Capabilities, Packet, PacketStream};
use bytes::Bytes;
use std::collections::HashMap;
use zeroize::Zeroize;

/// Parameter keys with driver-visible meaning. Everything else in the
/// server's parameter list is retained for diagnostics only.
const RECOGNIZED_KEYS: &[&str] = &[
    "AUTH_VFR_DATA",
    "AUTH_SESSKEY",
    "AUTH_PBKDF2_CSK_SALT",
    "AUTH_PBKDF2_VGEN_COUNT",
    "AUTH_PBKDF2_SDER_COUNT",
    "AUTH_SESSION_ID",
    "AUTH_SERIAL_NUM",
    "AUTH_VERSION_NO",
    "AUTH_SVR_RESPONSE",
];

/// Session data accumulated across the authentication rounds.
#[derive(Debug, Default)]
pub struct SessionData {
    /// Key-value pairs from the server, recognized and unknown alike.
    pub params: HashMap<String, String>,
    /// Verifier profile announced with AUTH_VFR_DATA.
    pub verifier_type: u32,
    /// Derived session key, kept for server-response verification.
    session_key: Option<Vec<u8>>,
}

impl SessionData {
    /// Whether a parameter key carries driver-visible meaning.
    pub fn is_recognized(key: &str) -> bool {
        RECOGNIZED_KEYS.contains(&key)
    }

    /// Read a parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }

    fn required(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::protocol(format!("Missing {}", key)))
    }

    fn required_hex(&self, key: &str) -> Result<Vec<u8>> {
        hex_to_bytes(self.required(key)?)
            .ok_or_else(|| Error::protocol(format!("Invalid {} hex", key)))
    }

    fn required_u32(&self, key: &str) -> Result<u32> {
        self.required(key)?
            .parse()
            .map_err(|_| Error::protocol(format!("Invalid {}", key)))
    }

    /// Server session id assigned at logon.
    pub fn session_id(&self) -> Option<u32> {
        self.get("AUTH_SESSION_ID")?.parse().ok()
    }

    /// Server session serial number.
    pub fn serial_num(&self) -> Option<u32> {
        self.get("AUTH_SERIAL_NUM")?.parse().ok()
    }

    /// Server version 5-tuple from AUTH_VERSION_NO. The bit layout
    /// changed with the 18.1 extension 1 field version.
    pub fn server_version(&self, ttc_field_version: u8) -> Option<(u8, u8, u8, u8, u8)> {
        let version: u32 = self.get("AUTH_VERSION_NO")?.parse().ok()?;
        if ttc_field_version >= TNS_CCAP_FIELD_VERSION_18_1_EXT_1 {
            Some((
                ((version >> 24) & 0xFF) as u8,
                ((version >> 16) & 0xFF) as u8,
                ((version >> 12) & 0x0F) as u8,
                ((version >> 4) & 0xFF) as u8,
                (version & 0x0F) as u8,
            ))
        } else {
            Some((
                ((version >> 24) & 0xFF) as u8,
                ((version >> 20) & 0x0F) as u8,
                ((version >> 12) & 0x0F) as u8,
                ((version >> 8) & 0x0F) as u8,
                (version & 0x0F) as u8,
            ))
        }
    }
}

/// Perform two-phase O5LOGON authentication.
pub async fn authenticate(
    stream: &mut PacketStream,
    auth: &AuthParams,
    params: &ConnectParams,
    caps: &Capabilities,
) -> Result<SessionData> {
    let mut session = phase_one(stream, auth, params).await?;
    phase_two(stream, auth, params, caps, &mut session).await?;
    Ok(session)
}

fn phase_one_message<'a>(
    auth: &'a AuthParams,
    params: &'a ConnectParams,
    pid: &'a str,
) -> AuthPhaseOneMessage<'a> {
    AuthPhaseOneMessage {
        username: &auth.username,
        auth_mode: auth.mode.mode_bits(),
        terminal: "unknown",
        program: &params.program,
        machine: &params.machine,
        pid,
        osuser: &params.osuser,
    }
}

/// Authentication phase 1: send client identity, collect verifier data.
async fn phase_one(
    stream: &mut PacketStream,
    auth: &AuthParams,
    params: &ConnectParams,
) -> Result<SessionData> {
    let pid = params.pid.to_string();
    let msg = phase_one_message(auth, params, &pid);
    stream.send_data_message(&msg).await?;

    let response = stream.read_packet().await?;

    if response.packet_type == TNS_PACKET_TYPE_MARKER {
        return Err(drain_marker_and_read_error(stream, response).await);
    }
    if response.packet_type != TNS_PACKET_TYPE_DATA {
        return Err(Error::UnexpectedPacketType {
            expected: TNS_PACKET_TYPE_DATA,
            actual: response.packet_type,
        });
    }

    parse_auth_response(response.payload)
}

/// Authentication phase 2: send the verifier and complete logon.
pub async fn phase_two(
    stream: &mut PacketStream,
    auth: &AuthParams,
    params: &ConnectParams,
    caps: &Capabilities,
    session: &mut SessionData,
) -> Result<()> {
    let verifier = generate_verifier(auth, session)?;
    let tz_stmt = timezone_statement(params.timezone.as_deref());

    let msg = AuthPhaseTwoMessage {
        username: &auth.username,
        auth_mode: auth.mode.mode_bits(),
        session_key: &verifier.session_key_hex,
        speedy_key: verifier.speedy_key_hex.as_deref(),
        encoded_password: &verifier.encoded_password,
        encoded_new_password: verifier.encoded_new_password.as_deref(),
        purity: auth.purity.wire_value(),
        timezone_stmt: &tz_stmt,
    };
    stream.send_data_message(&msg).await?;

    let response = stream.read_packet().await?;

    if response.packet_type == TNS_PACKET_TYPE_MARKER {
        return Err(drain_marker_and_read_error(stream, response).await);
    }
    if response.packet_type != TNS_PACKET_TYPE_DATA {
        return Err(Error::UnexpectedPacketType {
            expected: TNS_PACKET_TYPE_DATA,
            actual: response.packet_type,
        });
    }

    let response_session = parse_auth_response(response.payload)?;

    // The server proves possession of the session key as well
    if let Some(session_key) = &session.session_key {
        if let Some(svr_response) = response_session.params.get("AUTH_SVR_RESPONSE") {
            let encoded = hex_to_bytes(svr_response)
                .ok_or_else(|| Error::protocol("Invalid AUTH_SVR_RESPONSE hex"))?;
            let decrypted = decrypt_cbc(session_key, &encoded)?;
            if decrypted.len() < 32 || &decrypted[16..32] != b"SERVER_TO_CLIENT" {
                return Err(Error::InvalidServerResponse);
            }
        }
    }

    for (k, v) in response_session.params {
        session.params.insert(k, v);
    }

    tracing::debug!(
        session_id = session.session_id(),
        serial = session.serial_num(),
        ttc_field_version = caps.ttc_field_version,
        "authentication complete"
    );

    Ok(())
}

/// Intermediate key material for phase two.
struct Verifier {
    session_key_hex: String,
    speedy_key_hex: Option<String>,
    encoded_password: String,
    encoded_new_password: Option<String>,
}

/// Derive the verifier for the profile the server announced.
fn generate_verifier(auth: &AuthParams, session: &mut SessionData) -> Result<Verifier> {
    let verifier_data = session.required_hex("AUTH_VFR_DATA")?;
    let password = auth.password.as_bytes();

    let (key_length, mut password_key, password_hash) = match session.verifier_type {
        TNS_VERIFIER_TYPE_12C => {
            tracing::debug!("using 12c PBKDF2 verifier");
            let vgen_count = session.required_u32("AUTH_PBKDF2_VGEN_COUNT")?;
            let mut salted = verifier_data.clone();
            salted.extend_from_slice(b"AUTH_PBKDF2_SPEEDY_KEY");
            let password_key = derive_key_pbkdf2(password, &salted, 64, vgen_count)?;

            let mut hash_input = password_key.clone();
            hash_input.extend_from_slice(&verifier_data);
            let password_hash = sha512_hash(&hash_input)[..32].to_vec();
            (32usize, Some(password_key), password_hash)
        }
        TNS_VERIFIER_TYPE_11G_1 | TNS_VERIFIER_TYPE_11G_2 => {
            tracing::debug!("using 11g SHA-1 verifier");
            let mut hash_input = password.to_vec();
            hash_input.extend_from_slice(&verifier_data);
            let mut password_hash = sha1_hash(&hash_input).to_vec();
            password_hash.extend_from_slice(&[0u8; 4]);
            (24usize, None, password_hash)
        }
        other => {
            return Err(Error::UnsupportedVerifierType {
                verifier_type: other,
            })
        }
    };

    // Decrypt the server's half of the session key
    let server_sesskey = session.required_hex("AUTH_SESSKEY")?;
    let session_key_part_a = decrypt_cbc(&password_hash, &server_sesskey)?;

    // Our half, encrypted back with the same key
    let session_key_part_b = random_bytes(32);
    let encrypted_client_key = encrypt_cbc(&password_hash, &session_key_part_b, false)?;
    let session_key_hex =
        bytes_to_hex_upper(&encrypted_client_key[..32.min(encrypted_client_key.len())]);

    // Combo key: both halves truncated to the profile key length,
    // hex-uppercased, then stretched over the server's salt
    let csk_salt = session.required_hex("AUTH_PBKDF2_CSK_SALT")?;
    let sder_count = session.required_u32("AUTH_PBKDF2_SDER_COUNT")?;

    let mut combo_input = session_key_part_b[..key_length.min(session_key_part_b.len())].to_vec();
    combo_input.extend_from_slice(&session_key_part_a[..key_length.min(session_key_part_a.len())]);
    let combo_hex = bytes_to_hex_upper(&combo_input);
    let session_key = derive_key_pbkdf2(combo_hex.as_bytes(), &csk_salt, key_length, sder_count)?;

    // 12c proves the derived password key to the server
    let speedy_key_hex = match &password_key {
        Some(password_key) => {
            let mut speedy_plain = random_bytes(16);
            speedy_plain.extend_from_slice(password_key);
            let speedy_encrypted = encrypt_cbc(&session_key, &speedy_plain, false)?;
            Some(bytes_to_hex_upper(
                &speedy_encrypted[..80.min(speedy_encrypted.len())],
            ))
        }
        None => None,
    };

    // Password (and any replacement password) ride under the session key
    // with a shared random prefix
    let salt16 = random_bytes(16);
    let mut password_plain = salt16.clone();
    password_plain.extend_from_slice(password);
    let encoded_password = bytes_to_hex_upper(&encrypt_cbc(&session_key, &password_plain, false)?);

    let encoded_new_password = match &auth.new_password {
        Some(new_password) => {
            let mut new_plain = salt16.clone();
            new_plain.extend_from_slice(new_password.as_bytes());
            Some(bytes_to_hex_upper(&encrypt_cbc(
                &session_key,
                &new_plain,
                false,
            )?))
        }
        None => None,
    };

    if let Some(pk) = password_key.as_mut() {
        pk.zeroize();
    }

    session.session_key = Some(session_key);

    Ok(Verifier {
        session_key_hex,
        speedy_key_hex,
        encoded_password,
        encoded_new_password,
    })
}

/// Drain a server break: answer with a RESET marker, skip markers until
/// the error payload arrives, and surface it.
async fn drain_marker_and_read_error(stream: &mut PacketStream, marker: Packet) -> Error {
    let _ = marker.marker_type();

    let msg = MarkerMessage::reset();
    if let Err(e) = stream.send_message(TNS_PACKET_TYPE_MARKER, &msg).await {
        return e;
    }

    for _ in 0..10 {
        let pkt = match stream.read_packet().await {
            Ok(pkt) => pkt,
            Err(e) => return e,
        };

        match pkt.packet_type {
            TNS_PACKET_TYPE_DATA => {
                let mut rbuf = ReadBuffer::new(pkt.payload);
                let parsed = (|| -> Result<Option<Error>> {
                    let _data_flags = rbuf.read_u16_be()?;
                    let msg_type = rbuf.read_u8()?;
                    if msg_type == TNS_MSG_TYPE_ERROR {
                        Ok(Some(parse_error(&mut rbuf)))
                    } else {
                        Ok(None)
                    }
                })();
                match parsed {
                    Ok(Some(err)) => return err,
                    Ok(None) => break,
                    Err(e) => return e,
                }
            }
            TNS_PACKET_TYPE_MARKER => continue,
            _ => break,
        }
    }

    Error::protocol("received break marker but could not retrieve the error")
}

/// Parse an authentication response payload.
pub fn parse_auth_response(payload: Bytes) -> Result<SessionData> {
    let mut buf = ReadBuffer::new(payload);
    let mut session = SessionData::default();

    let _data_flags = buf.read_u16_be()?;
    let msg_type = buf.read_u8()?;

    match msg_type {
        TNS_MSG_TYPE_PARAMETER => {
            parse_auth_parameters(&mut buf, &mut session)?;
        }
        TNS_MSG_TYPE_ERROR => {
            return Err(parse_error(&mut buf));
        }
        TNS_MSG_TYPE_STATUS => {
            let _status = buf.read_ub4()?;
            if buf.remaining() > 0 {
                let msg_type2 = buf.read_u8()?;
                if msg_type2 == TNS_MSG_TYPE_PARAMETER {
                    parse_auth_parameters(&mut buf, &mut session)?;
                }
            }
        }
        other => {
            tracing::warn!(msg_type = other, "unexpected auth response message");
        }
    }

    Ok(session)
}

/// Parse the key/value parameter list of an auth response.
///
/// Per entry: key indicator (ub4) + key, value indicator (ub4) + value,
/// then a flags word that carries the verifier type on AUTH_VFR_DATA.
pub(crate) fn parse_auth_parameters(
    buf: &mut ReadBuffer,
    session: &mut SessionData,
) -> Result<()> {
    let num_params = buf.read_ub2()?;
    for _ in 0..num_params {
        let _ = buf.read_ub4()?;
        let key = buf.read_str_with_length()?.unwrap_or_default();
        let _ = buf.read_ub4()?;
        let value = buf.read_str_with_length()?.unwrap_or_default();

        if key == "AUTH_VFR_DATA" {
            session.verifier_type = buf.read_ub4()?;
        } else {
            buf.skip_ub4()?;
        }

        let clean_key = key.trim_end_matches('\0').to_string();
        if !clean_key.is_empty()
            && clean_key
                .chars()
                .all(|c| c.is_ascii_graphic() || c.is_ascii_whitespace())
        {
            session.params.insert(clean_key, value);
        }
    }
    Ok(())
}

/// Extract an ORA- error out of an auth-time error message.
///
/// The surrounding fields vary by version; the embedded text is the
/// stable part, so it is scanned directly.
fn parse_error(buf: &mut ReadBuffer) -> Error {
    let remaining = buf.as_slice();

    let ora_pattern = b"ORA-";
    if let Some(pos) = remaining.windows(4).position(|w| w == ora_pattern) {
        let msg_start = pos;
        let msg_end = remaining[msg_start..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| msg_start + p)
            .unwrap_or(remaining.len());
        let msg_bytes = &remaining[msg_start..msg_end];
        let message = String::from_utf8_lossy(msg_bytes).to_string();

        let code = if msg_bytes.len() > 4 {
            let code_str = &msg_bytes[4..];
            let code_end = code_str
                .iter()
                .position(|&b| b == b':')
                .unwrap_or(code_str.len());
            std::str::from_utf8(&code_str[..code_end])
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(0)
        } else {
            0
        };

        return Error::oracle(code, message);
    }

    Error::oracle(0, "Unknown Oracle error".to_string())
}

/// ALTER SESSION statement for the session timezone.
fn timezone_statement(timezone: Option<&str>) -> String {
    match timezone {
        Some(tz) => format!("ALTER SESSION SET TIME_ZONE='{}'\0", tz),
        None => {
            let now = chrono::Local::now();
            let total = now.offset().local_minus_utc();
            let hours = total / 3600;
            let minutes = (total.abs() % 3600) / 60;
            let sign = if hours >= 0 { "+" } else { "-" };
            format!(
                "ALTER SESSION SET TIME_ZONE='{}{:02}:{:02}'\0",
                sign,
                hours.abs(),
                minutes
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(params: &[(&str, &str)], verifier_type: u32) -> SessionData {
        let mut session = SessionData {
            verifier_type,
            ..SessionData::default()
        };
        for (k, v) in params {
            session.params.insert(k.to_string(), v.to_string());
        }
        session
    }

    fn twelve_c_session() -> SessionData {
        session_with(
            &[
                ("AUTH_VFR_DATA", "41424344454631323334353637383930"),
                (
                    "AUTH_SESSKEY",
                    &"AB".repeat(48),
                ),
                ("AUTH_PBKDF2_CSK_SALT", "00112233445566778899AABBCCDDEEFF"),
                ("AUTH_PBKDF2_VGEN_COUNT", "4096"),
                ("AUTH_PBKDF2_SDER_COUNT", "3"),
            ],
            TNS_VERIFIER_TYPE_12C,
        )
    }

    #[test]
    fn test_generate_verifier_12c_shape() {
        let auth = AuthParams::new("scott", "tiger");
        let mut session = twelve_c_session();
        let verifier = generate_verifier(&auth, &mut session).unwrap();

        // Hex-uppercased, 64 chars
        assert_eq!(verifier.session_key_hex.len(), 64);
        assert!(verifier
            .session_key_hex
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));

        // Speedy key is the first 80 encrypted bytes, 160 hex chars
        let speedy = verifier.speedy_key_hex.expect("12c produces a speedy key");
        assert_eq!(speedy.len(), 160);

        // AES blocks: hex length is a multiple of 32
        assert_eq!(verifier.encoded_password.len() % 32, 0);
        assert!(verifier.encoded_new_password.is_none());

        // The derived session key sticks around for server verification
        assert_eq!(session.session_key.as_ref().map(Vec::len), Some(32));
    }

    #[test]
    fn test_generate_verifier_11g_shape() {
        let auth = AuthParams::new("scott", "tiger");
        let mut session = session_with(
            &[
                ("AUTH_VFR_DATA", "4142434445463132"),
                ("AUTH_SESSKEY", &"CD".repeat(48)),
                ("AUTH_PBKDF2_CSK_SALT", "00112233445566778899AABBCCDDEEFF"),
                ("AUTH_PBKDF2_SDER_COUNT", "3"),
            ],
            TNS_VERIFIER_TYPE_11G_1,
        );
        let verifier = generate_verifier(&auth, &mut session).unwrap();

        assert_eq!(verifier.session_key_hex.len(), 64);
        assert!(verifier.speedy_key_hex.is_none());
        // 11g derives a 24-byte (AES-192) session key
        assert_eq!(session.session_key.as_ref().map(Vec::len), Some(24));
    }

    #[test]
    fn test_generate_verifier_rejects_unknown_profile() {
        let auth = AuthParams::new("scott", "tiger");
        let mut session = session_with(&[("AUTH_VFR_DATA", "4142")], 0x9999);
        assert!(matches!(
            generate_verifier(&auth, &mut session),
            Err(Error::UnsupportedVerifierType {
                verifier_type: 0x9999
            })
        ));
    }

    #[test]
    fn test_new_password_encrypted_too() {
        let auth = AuthParams::new("scott", "tiger").with_new_password("lion");
        let mut session = twelve_c_session();
        let verifier = generate_verifier(&auth, &mut session).unwrap();
        let new_pw = verifier.encoded_new_password.expect("change requested");
        assert_eq!(new_pw.len() % 32, 0);
    }

    #[test]
    fn test_server_version_layouts() {
        let mut session = SessionData::default();
        // 23.4.0.24.5: (23<<24)|(4<<16)|(0<<12)|(24<<4)|5
        let packed: u32 = (23 << 24) | (4 << 16) | (24 << 4) | 5;
        session
            .params
            .insert("AUTH_VERSION_NO".into(), packed.to_string());

        let modern = session
            .server_version(TNS_CCAP_FIELD_VERSION_18_1_EXT_1)
            .unwrap();
        assert_eq!(modern, (23, 4, 0, 24, 5));

        // Legacy layout decodes the same word differently
        let legacy = session.server_version(TNS_CCAP_FIELD_VERSION_12_2).unwrap();
        assert_eq!(legacy.0, 23);
        assert_ne!(legacy, modern);
    }

    #[test]
    fn test_timezone_statement_fixed_offset() {
        let stmt = timezone_statement(Some("+05:30"));
        assert_eq!(stmt, "ALTER SESSION SET TIME_ZONE='+05:30'\0");

        let local = timezone_statement(None);
        assert!(local.starts_with("ALTER SESSION SET TIME_ZONE='"));
        assert!(local.ends_with("'\0"));
    }

    #[test]
    fn test_recognized_keys() {
        assert!(SessionData::is_recognized("AUTH_VFR_DATA"));
        assert!(SessionData::is_recognized("AUTH_VERSION_NO"));
        assert!(!SessionData::is_recognized("AUTH_XYZZY"));
    }
}
