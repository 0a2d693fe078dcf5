//! TNS packet framing and socket I/O.

use crate::error::{Error, Result};
use crate::protocol::constants::*;
use crate::protocol::message::{DataMessage, Message};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// TNS packet header size.
pub const HEADER_SIZE: usize = 8;

/// Write the 8-byte packet header. Large-SDU connections carry a 4-byte
/// big-endian length at offset 0; legacy connections a 2-byte length
/// followed by a reserved zero word. Bytes 4-5 are type and flags, the
/// final word is reserved.
fn write_header(
    buf: &mut Vec<u8>,
    packet_type: u8,
    packet_flags: u8,
    total_size: usize,
    use_large_sdu: bool,
) {
    if use_large_sdu {
        buf.extend_from_slice(&(total_size as u32).to_be_bytes());
    } else {
        buf.extend_from_slice(&(total_size as u16).to_be_bytes());
        buf.extend_from_slice(&[0, 0]);
    }
    buf.push(packet_type);
    buf.push(packet_flags);
    buf.extend_from_slice(&[0, 0]);
}

/// A TNS packet.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Packet type.
    pub packet_type: u8,
    /// Packet flags.
    pub packet_flags: u8,
    /// Packet payload (excluding header).
    pub payload: Bytes,
}

impl Packet {
    /// Create a new packet with the given type and payload.
    pub fn new(packet_type: u8, payload: Bytes) -> Self {
        Self {
            packet_type,
            packet_flags: 0,
            payload,
        }
    }

    /// Check if this is a DATA packet carrying the end-of-request flag.
    pub fn has_end_of_request(&self) -> bool {
        if self.packet_type != TNS_PACKET_TYPE_DATA || self.payload.len() < 2 {
            return false;
        }
        let flags = u16::from_be_bytes([self.payload[0], self.payload[1]]);
        (flags & TNS_DATA_FLAGS_END_OF_REQUEST) != 0 || (flags & TNS_DATA_FLAGS_EOF) != 0
    }

    /// Check if this is a DATA packet signalling connection teardown.
    pub fn has_eof(&self) -> bool {
        if self.packet_type != TNS_PACKET_TYPE_DATA || self.payload.len() < 2 {
            return false;
        }
        let flags = u16::from_be_bytes([self.payload[0], self.payload[1]]);
        (flags & TNS_DATA_FLAGS_EOF) != 0
    }

    /// Marker type carried by a MARKER packet.
    pub fn marker_type(&self) -> Option<u8> {
        if self.packet_type != TNS_PACKET_TYPE_MARKER {
            return None;
        }
        // Layout: [constant, constant, marker_type]; tolerate short payloads
        if self.payload.len() >= 3 {
            Some(self.payload[2])
        } else {
            self.payload.first().copied()
        }
    }

    /// Get the total packet size (header + payload).
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize the packet to bytes.
    pub fn to_bytes(&self, use_large_sdu: bool) -> Bytes {
        let total_len = self.total_size();
        let mut buf = Vec::with_capacity(total_len);
        write_header(
            &mut buf,
            self.packet_type,
            self.packet_flags,
            total_len,
            use_large_sdu,
        );
        buf.extend_from_slice(&self.payload);
        Bytes::from(buf)
    }

    /// Parse a packet from a fully framed buffer (header included).
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::protocol("packet shorter than header"));
        }
        Ok(Self {
            packet_type: data[4],
            packet_flags: data[5],
            payload: Bytes::copy_from_slice(&data[HEADER_SIZE..]),
        })
    }
}

/// TNS packet reader/writer over a TCP stream.
///
/// Inbound bytes accumulate until a full packet (per its declared length)
/// is available; the declared length is validated against a hard maximum
/// before any allocation it implies.
pub struct PacketStream {
    stream: TcpStream,
    /// Whether the length field is 4 bytes (large SDU) or 2 bytes.
    use_large_sdu: bool,
    /// Negotiated SDU size.
    sdu: u32,
    /// Partial buffer for incomplete packets.
    partial_buf: BytesMut,
}

impl PacketStream {
    /// Create a new packet stream.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            use_large_sdu: false,
            sdu: TNS_SDU_DEFAULT,
            partial_buf: BytesMut::new(),
        }
    }

    /// Set whether to use large SDU (4-byte length).
    pub fn set_large_sdu(&mut self, use_large_sdu: bool) {
        self.use_large_sdu = use_large_sdu;
    }

    /// Set the SDU size.
    pub fn set_sdu(&mut self, sdu: u32) {
        self.sdu = sdu;
    }

    /// Read a packet from the stream.
    pub async fn read_packet(&mut self) -> Result<Packet> {
        while self.partial_buf.len() < HEADER_SIZE {
            self.fill().await?;
        }

        let packet_len = if self.use_large_sdu {
            u32::from_be_bytes([
                self.partial_buf[0],
                self.partial_buf[1],
                self.partial_buf[2],
                self.partial_buf[3],
            ]) as usize
        } else {
            u16::from_be_bytes([self.partial_buf[0], self.partial_buf[1]]) as usize
        };

        if packet_len < HEADER_SIZE || packet_len > TNS_MAX_PACKET_LENGTH {
            return Err(Error::PacketTooLarge {
                length: packet_len,
                max: TNS_MAX_PACKET_LENGTH,
            });
        }

        // Refuse to decode until the declared byte count has arrived
        while self.partial_buf.len() < packet_len {
            self.fill().await?;
        }

        let packet_data = self.partial_buf.split_to(packet_len);
        Packet::from_bytes(&packet_data)
    }

    async fn fill(&mut self) -> Result<()> {
        let mut buf = [0u8; 4096];
        let n = self.stream.read(&mut buf).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        self.partial_buf.extend_from_slice(&buf[..n]);
        Ok(())
    }

    /// Write a packet to the stream.
    pub async fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let bytes = packet.to_bytes(self.use_large_sdu);
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Send raw bytes as a DATA packet.
    pub async fn send_data(&mut self, data: Bytes, data_flags: u16) -> Result<()> {
        let mut payload = Vec::with_capacity(data.len() + 2);
        payload.extend_from_slice(&data_flags.to_be_bytes());
        payload.extend_from_slice(&data);
        let packet = Packet::new(TNS_PACKET_TYPE_DATA, Bytes::from(payload));
        self.write_packet(&packet).await
    }

    /// Send a message as a specific packet type (single allocation).
    pub async fn send_message<M: Message>(&mut self, packet_type: u8, msg: &M) -> Result<()> {
        let payload_size = msg.wire_size();
        let total_size = HEADER_SIZE + payload_size;

        let mut buf = Vec::with_capacity(total_size);
        write_header(&mut buf, packet_type, 0, total_size, self.use_large_sdu);
        msg.write_to(&mut buf)?;

        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Send a DATA message (single allocation, data flags included).
    pub async fn send_data_message<M: DataMessage>(&mut self, msg: &M) -> Result<()> {
        let payload_size = msg.data_wire_size();
        let total_size = HEADER_SIZE + payload_size;

        let mut buf = Vec::with_capacity(total_size);
        write_header(
            &mut buf,
            TNS_PACKET_TYPE_DATA,
            0,
            total_size,
            self.use_large_sdu,
        );
        buf.extend_from_slice(&msg.data_flags().to_be_bytes());
        msg.write_to(&mut buf)?;

        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Flush the stream.
    pub async fn flush(&mut self) -> Result<()> {
        self.stream.flush().await?;
        Ok(())
    }
}

/// Negotiated connection capabilities. Immutable once negotiation ends.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Protocol version.
    pub protocol_version: u16,
    /// Protocol options from the accept packet.
    pub protocol_options: u16,
    /// SDU size.
    pub sdu: u32,
    /// Character set id for implicit strings.
    pub charset_id: u16,
    /// National character set id.
    pub ncharset_id: u16,
    /// Whether the server charset differs from the implicit UTF-8 id.
    pub character_conversion: bool,
    /// Whether OOB (out-of-band) breaks are usable. Always false here:
    /// async sockets carry no urgent-data path.
    pub supports_oob: bool,
    /// Whether the end-of-request data flag is in effect.
    pub supports_end_of_request: bool,
    /// Whether fast auth is available (23ai+).
    pub supports_fast_auth: bool,
    /// TTC field version in effect for fields we emit and parse.
    pub ttc_field_version: u8,
    /// Server's own TTC field version (governs what the server sends).
    pub server_ttc_field_version: u8,
    /// Compile-time capability bytes.
    pub compile_caps: Vec<u8>,
    /// Runtime capability bytes.
    pub runtime_caps: Vec<u8>,
}

impl Capabilities {
    /// Create default client capabilities, pre-negotiation.
    pub fn new() -> Self {
        let ttc_field_version = TNS_CCAP_FIELD_VERSION_MAX;

        let mut compile_caps = vec![0u8; TNS_CCAP_MAX];
        compile_caps[TNS_CCAP_SQL_VERSION] = TNS_CCAP_SQL_VERSION_MAX;
        compile_caps[TNS_CCAP_LOGON_TYPES] = TNS_CCAP_O5LOGON
            | TNS_CCAP_O5LOGON_NP
            | TNS_CCAP_O7LOGON
            | TNS_CCAP_O8LOGON_LONG_IDENTIFIER
            | TNS_CCAP_O9LOGON_LONG_PASSWORD;
        compile_caps[TNS_CCAP_FEATURE_BACKPORT] =
            TNS_CCAP_CTB_IMPLICIT_POOL | TNS_CCAP_CTB_OAUTH_MSG_ON_ERR;
        compile_caps[TNS_CCAP_FIELD_VERSION] = ttc_field_version;
        compile_caps[TNS_CCAP_SERVER_DEFINE_CONV] = 1;
        compile_caps[TNS_CCAP_DEQUEUE_WITH_SELECTOR] = 1;
        compile_caps[TNS_CCAP_TTC1] =
            TNS_CCAP_FAST_BVEC | TNS_CCAP_END_OF_CALL_STATUS | TNS_CCAP_IND_RCD;
        compile_caps[TNS_CCAP_OCI1] = TNS_CCAP_FAST_SESSION_PROPAGATE | TNS_CCAP_APP_CTX_PIGGYBACK;
        compile_caps[TNS_CCAP_TDS_VERSION] = TNS_CCAP_TDS_VERSION_MAX;
        compile_caps[TNS_CCAP_RPC_VERSION] = TNS_CCAP_RPC_VERSION_MAX;
        compile_caps[TNS_CCAP_RPC_SIG] = TNS_CCAP_RPC_SIG_VALUE;
        compile_caps[TNS_CCAP_DBF_VERSION] = TNS_CCAP_DBF_VERSION_MAX;
        compile_caps[TNS_CCAP_LOB] = TNS_CCAP_LOB_UB8_SIZE
            | TNS_CCAP_LOB_ENCS
            | TNS_CCAP_LOB_PREFETCH_DATA
            | TNS_CCAP_LOB_TEMP_SIZE
            | TNS_CCAP_LOB_PREFETCH_LENGTH
            | TNS_CCAP_LOB_12C;
        compile_caps[TNS_CCAP_UB2_DTY] = 1;
        compile_caps[TNS_CCAP_LOB2] = TNS_CCAP_LOB2_QUASI | TNS_CCAP_LOB2_2GB_PREFETCH;
        compile_caps[TNS_CCAP_TTC3] = TNS_CCAP_IMPLICIT_RESULTS
            | TNS_CCAP_BIG_CHUNK_CLR
            | TNS_CCAP_KEEP_OUT_ORDER
            | TNS_CCAP_LTXID;
        compile_caps[TNS_CCAP_TTC2] = TNS_CCAP_ZLNP;
        compile_caps[TNS_CCAP_OCI2] = TNS_CCAP_DRCP;
        compile_caps[TNS_CCAP_CLIENT_FN] = TNS_CCAP_CLIENT_FN_MAX;
        compile_caps[TNS_CCAP_SESS_SIGNATURE_VERSION] = TNS_CCAP_FIELD_VERSION_12_2;
        compile_caps[TNS_CCAP_TTC4] = TNS_CCAP_INBAND_NOTIFICATION | TNS_CCAP_EXPLICIT_BOUNDARY;

        let mut runtime_caps = vec![0u8; TNS_RCAP_MAX];
        runtime_caps[TNS_RCAP_COMPAT] = TNS_RCAP_COMPAT_81;
        runtime_caps[TNS_RCAP_TTC] = TNS_RCAP_TTC_ZERO_COPY | TNS_RCAP_TTC_32K;

        Self {
            protocol_version: 0,
            protocol_options: 0,
            sdu: TNS_SDU_DEFAULT,
            charset_id: TNS_CHARSET_UTF8,
            ncharset_id: TNS_CHARSET_UTF8,
            character_conversion: false,
            supports_oob: false,
            supports_end_of_request: false,
            supports_fast_auth: false,
            ttc_field_version,
            server_ttc_field_version: 0,
            compile_caps,
            runtime_caps,
        }
    }

    /// Whether the 4-byte packet length layout is in effect.
    pub fn use_large_sdu(&self) -> bool {
        self.protocol_version >= TNS_VERSION_MIN_LARGE_SDU
    }

    /// Adjust capabilities from the accept packet.
    pub fn adjust_for_protocol(&mut self, version: u16, options: u16, flags2: u32) {
        self.protocol_version = version;
        self.protocol_options = options;

        // OOB stays disabled: it was not advertised in CONNECT and tokio
        // offers no MSG_OOB path to honor the check anyway

        if version >= TNS_VERSION_MIN_END_OF_REQUEST {
            self.supports_end_of_request = (flags2 & TNS_ACCEPT_FLAG_HAS_END_OF_REQUEST) != 0;
            if self.supports_end_of_request {
                self.compile_caps[TNS_CCAP_TTC4] |= TNS_CCAP_END_OF_REQUEST;
            }
        }

        self.supports_fast_auth = (flags2 & TNS_ACCEPT_FLAG_FAST_AUTH) != 0;
    }

    /// Fold the server's capability blobs into the effective set.
    ///
    /// Only the field version is minimized; the remaining bytes keep the
    /// client's advertisement.
    pub fn adjust_for_server_caps(
        &mut self,
        server_compile_caps: &[u8],
        server_runtime_caps: &[u8],
    ) {
        if server_compile_caps.len() > TNS_CCAP_FIELD_VERSION {
            let server_field_version = server_compile_caps[TNS_CCAP_FIELD_VERSION];
            self.server_ttc_field_version = server_field_version;
            if server_field_version < self.ttc_field_version {
                self.ttc_field_version = server_field_version;
                self.compile_caps[TNS_CCAP_FIELD_VERSION] = server_field_version;
            }
        }

        let _ = server_runtime_caps;
    }

    /// Record the server charset ids from the protocol exchange.
    pub fn set_server_charsets(&mut self, charset_id: u16, ncharset_id: u16) {
        self.charset_id = charset_id;
        self.ncharset_id = ncharset_id;
        self.character_conversion = charset_id != TNS_CHARSET_UTF8;
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layouts() {
        let mut buf = Vec::new();
        write_header(&mut buf, TNS_PACKET_TYPE_DATA, 0, 100, false);
        assert_eq!(buf, vec![0, 100, 0, 0, TNS_PACKET_TYPE_DATA, 0, 0, 0]);

        buf.clear();
        write_header(&mut buf, TNS_PACKET_TYPE_MARKER, 1, 0x01020304, true);
        assert_eq!(buf, vec![1, 2, 3, 4, TNS_PACKET_TYPE_MARKER, 1, 0, 0]);
    }

    #[test]
    fn test_packet_round_trip() {
        let payload = Bytes::from_static(&[1, 2, 3, 4, 5]);
        let packet = Packet::new(TNS_PACKET_TYPE_DATA, payload.clone());

        for large_sdu in [false, true] {
            let bytes = packet.to_bytes(large_sdu);
            assert_eq!(bytes.len(), HEADER_SIZE + payload.len());
            let decoded = Packet::from_bytes(&bytes).unwrap();
            assert_eq!(decoded.packet_type, TNS_PACKET_TYPE_DATA);
            assert_eq!(decoded.payload, payload);
        }
    }

    #[test]
    fn test_end_of_request_flag() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&TNS_DATA_FLAGS_END_OF_REQUEST.to_be_bytes());
        payload.push(0);
        let packet = Packet::new(TNS_PACKET_TYPE_DATA, Bytes::from(payload));
        assert!(packet.has_end_of_request());
        assert!(!packet.has_eof());

        let mut payload = Vec::new();
        payload.extend_from_slice(&TNS_DATA_FLAGS_EOF.to_be_bytes());
        let packet = Packet::new(TNS_PACKET_TYPE_DATA, Bytes::from(payload));
        assert!(packet.has_eof());
    }

    #[test]
    fn test_marker_type() {
        let packet = Packet::new(
            TNS_PACKET_TYPE_MARKER,
            Bytes::from_static(&[1, 0, TNS_MARKER_TYPE_RESET]),
        );
        assert_eq!(packet.marker_type(), Some(TNS_MARKER_TYPE_RESET));

        let packet = Packet::new(TNS_PACKET_TYPE_DATA, Bytes::new());
        assert_eq!(packet.marker_type(), None);
    }

    #[test]
    fn test_capabilities_end_of_request() {
        let mut caps = Capabilities::new();
        caps.adjust_for_protocol(
            TNS_VERSION_MIN_END_OF_REQUEST,
            0,
            TNS_ACCEPT_FLAG_HAS_END_OF_REQUEST,
        );
        assert!(caps.supports_end_of_request);
        assert_ne!(caps.compile_caps[TNS_CCAP_TTC4] & TNS_CCAP_END_OF_REQUEST, 0);
        assert!(caps.use_large_sdu());
    }

    #[test]
    fn test_capabilities_field_version_minimized() {
        let mut caps = Capabilities::new();
        let mut server_caps = vec![0u8; TNS_CCAP_MAX];
        server_caps[TNS_CCAP_FIELD_VERSION] = TNS_CCAP_FIELD_VERSION_19_1;
        caps.adjust_for_server_caps(&server_caps, &[]);
        assert_eq!(caps.ttc_field_version, TNS_CCAP_FIELD_VERSION_19_1);
        assert_eq!(caps.server_ttc_field_version, TNS_CCAP_FIELD_VERSION_19_1);

        // A newer server does not raise the client's version
        let mut caps2 = Capabilities::new();
        server_caps[TNS_CCAP_FIELD_VERSION] = 99;
        caps2.adjust_for_server_caps(&server_caps, &[]);
        assert_eq!(caps2.ttc_field_version, TNS_CCAP_FIELD_VERSION_MAX);
        assert_eq!(caps2.server_ttc_field_version, 99);
    }

    #[test]
    fn test_charset_conversion_flag() {
        let mut caps = Capabilities::new();
        caps.set_server_charsets(TNS_CHARSET_UTF8, TNS_CHARSET_UTF16);
        assert!(!caps.character_conversion);

        caps.set_server_charsets(178, TNS_CHARSET_UTF16);
        assert!(caps.character_conversion);
        assert_eq!(caps.charset_id, 178);
    }
}
