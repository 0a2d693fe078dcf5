//! TNS connection establishment and capability negotiation.
//!
//! CONNECT/ACCEPT first, then the Protocol and DataTypes exchanges that
//! fix the effective [`Capabilities`] for the life of the connection.

use crate::config::{AuthParams, ConnectParams};
use crate::error::{Error, Result};
use crate::protocol::auth::{parse_auth_parameters, SessionData};
use crate::protocol::buffer::ReadBuffer;
use crate::protocol::constants::*;
use crate::protocol::messages::connect::DRIVER_NAME;
use crate::protocol::messages::{
    AuthPhaseOneMessage, ConnectMessage, DataTypesMessage, FastAuthMessage, ProtocolMessage,
};
use crate::protocol::packet::{Capabilities, Packet, PacketStream};

/// Send a CONNECT packet and handle the response.
pub async fn connect(
    stream: &mut PacketStream,
    params: &ConnectParams,
    caps: &mut Capabilities,
) -> Result<()> {
    let connect_string = params.build_connect_string();
    let connect_bytes = connect_string.as_bytes();

    let msg = ConnectMessage {
        connect_string: connect_bytes,
        sdu: params.sdu,
    };

    // Oversized connect data travels in a trailing DATA packet
    let send_data_separately = !msg.connect_data_in_packet();

    stream.send_message(TNS_PACKET_TYPE_CONNECT, &msg).await?;
    if send_data_separately {
        stream
            .send_data(bytes::Bytes::copy_from_slice(connect_bytes), 0)
            .await?;
    }

    let mut resent = false;
    loop {
        let response = stream.read_packet().await?;

        match response.packet_type {
            TNS_PACKET_TYPE_ACCEPT => {
                return handle_accept(response, stream, caps);
            }
            TNS_PACKET_TYPE_REFUSE => {
                return Err(refusal_error(response, params));
            }
            TNS_PACKET_TYPE_REDIRECT => {
                return Err(Error::protocol("Redirect not supported"));
            }
            TNS_PACKET_TYPE_RESEND => {
                if resent {
                    return Err(Error::protocol("Server requested a second resend"));
                }
                resent = true;
                stream.send_message(TNS_PACKET_TYPE_CONNECT, &msg).await?;
                if send_data_separately {
                    stream
                        .send_data(bytes::Bytes::copy_from_slice(connect_bytes), 0)
                        .await?;
                }
            }
            _ => {
                return Err(Error::UnexpectedPacketType {
                    expected: TNS_PACKET_TYPE_ACCEPT,
                    actual: response.packet_type,
                });
            }
        }
    }
}

/// Handle an ACCEPT packet.
fn handle_accept(packet: Packet, stream: &mut PacketStream, caps: &mut Capabilities) -> Result<()> {
    let mut buf = ReadBuffer::new(packet.payload);

    let protocol_version = buf.read_u16_be()?;
    if protocol_version < TNS_VERSION_MIN_ACCEPTED {
        return Err(Error::ServerVersionNotSupported {
            min_version: TNS_VERSION_MIN_ACCEPTED,
        });
    }

    let protocol_options = buf.read_u16_be()?;

    buf.skip(10)?;

    let nsi_flags1 = buf.read_u8()?;
    if (nsi_flags1 & TNS_NSI_NA_REQUIRED) != 0 {
        return Err(Error::protocol("Native Network Encryption not supported"));
    }

    buf.skip(9)?;

    let sdu = buf.read_u32_be()?;
    caps.sdu = sdu;
    stream.set_sdu(sdu);

    // Recent servers append a 5-byte trailer and the flags2 word carrying
    // OOB-check, fast-auth and end-of-request eligibility
    let mut flags2: u32 = 0;
    if protocol_version >= TNS_VERSION_MIN_OOB_CHECK {
        buf.skip(5)?;
        flags2 = buf.read_u32_be()?;
    }

    caps.adjust_for_protocol(protocol_version, protocol_options, flags2);
    stream.set_large_sdu(caps.use_large_sdu());

    tracing::debug!(
        protocol_version,
        sdu,
        fast_auth = caps.supports_fast_auth,
        end_of_request = caps.supports_end_of_request,
        "connection accepted"
    );

    Ok(())
}

/// Translate a REFUSE packet into the matching error.
fn refusal_error(packet: Packet, params: &ConnectParams) -> Error {
    let message = String::from_utf8_lossy(&packet.payload).to_string();

    if message.contains("ERR=12514") {
        return Error::InvalidServiceName {
            service_name: params.service.as_str().to_string(),
        };
    }
    if message.contains("ERR=12505") {
        return Error::InvalidSid {
            sid: params.service.as_str().to_string(),
        };
    }

    Error::ConnectionRefused { message }
}

/// Read a DATA packet, absorbing control packets along the way.
async fn read_data_packet(stream: &mut PacketStream, caps: &mut Capabilities) -> Result<Packet> {
    loop {
        let response = stream.read_packet().await?;
        match response.packet_type {
            TNS_PACKET_TYPE_DATA => return Ok(response),
            TNS_PACKET_TYPE_CONTROL => {
                if response.payload.len() >= 2 {
                    let control_type =
                        u16::from_be_bytes([response.payload[0], response.payload[1]]);
                    if control_type == 9 {
                        // Reset-OOB control: the server could not honor
                        // urgent data on this path
                        caps.supports_oob = false;
                    }
                }
                continue;
            }
            _ => {
                return Err(Error::UnexpectedPacketType {
                    expected: TNS_PACKET_TYPE_DATA,
                    actual: response.packet_type,
                });
            }
        }
    }
}

/// Consume a Protocol response: banner, charsets, element list, and the
/// server capability blobs.
fn parse_protocol_response(rbuf: &mut ReadBuffer, caps: &mut Capabilities) -> Result<()> {
    let _server_version = rbuf.read_u8()?;
    let _zero = rbuf.read_u8()?;

    let mut banner = Vec::new();
    loop {
        let b = rbuf.read_u8()?;
        if b == 0 {
            break;
        }
        banner.push(b);
    }
    tracing::debug!(banner = %String::from_utf8_lossy(&banner), "server banner");

    let charset_id = rbuf.read_u16_le()?;
    let _server_flags = rbuf.read_u8()?;

    let num_elem = rbuf.read_u16_le()?;
    if num_elem > 0 {
        rbuf.skip((num_elem * 5) as usize)?;
    }

    let fdo_length = rbuf.read_u16_be()?;
    rbuf.skip(fdo_length as usize)?;

    let mut ncharset_id = TNS_CHARSET_UTF8;
    if let Some(server_compile_caps) = rbuf.read_bytes_with_length()? {
        if server_compile_caps.len() > TNS_CCAP_NCHARSET_ID + 1 {
            ncharset_id = u16::from_be_bytes([
                server_compile_caps[TNS_CCAP_NCHARSET_ID],
                server_compile_caps[TNS_CCAP_NCHARSET_ID + 1],
            ]);
        }
        caps.adjust_for_server_caps(&server_compile_caps, &[]);
    }
    if let Some(server_runtime_caps) = rbuf.read_bytes_with_length()? {
        caps.adjust_for_server_caps(&[], &server_runtime_caps);
    }

    caps.set_server_charsets(charset_id, ncharset_id);

    Ok(())
}

/// Index of the national charset id within the compile capability blob.
const TNS_CCAP_NCHARSET_ID: usize = 29;

/// Skip the server's DataTypes table: (type, conversion type) pairs with
/// representation words, terminated by a zero type.
fn skip_data_types_response(rbuf: &mut ReadBuffer) -> Result<()> {
    loop {
        let data_type = rbuf.read_u16_be()?;
        if data_type == 0 {
            break;
        }
        let conv_data_type = rbuf.read_u16_be()?;
        if conv_data_type != 0 {
            rbuf.skip(4)?;
        }
    }
    Ok(())
}

/// Exchange Protocol and DataTypes with the server (non-fast-auth path).
/// The connection is ready for statements once this returns.
pub async fn exchange_data_types(stream: &mut PacketStream, caps: &mut Capabilities) -> Result<()> {
    let protocol_msg = ProtocolMessage::default();
    stream.send_data_message(&protocol_msg).await?;

    let response = read_data_packet(stream, caps).await?;

    let mut rbuf = ReadBuffer::new(response.payload);
    let _data_flags = rbuf.read_u16_be()?;
    let msg_type = rbuf.read_u8()?;

    if msg_type == TNS_MSG_TYPE_PROTOCOL {
        parse_protocol_response(&mut rbuf, caps)?;
    }

    let data_types_msg = DataTypesMessage {
        compile_caps: &caps.compile_caps,
        runtime_caps: &caps.runtime_caps,
    };
    stream.send_data_message(&data_types_msg).await?;

    let response = read_data_packet(stream, caps).await?;

    let mut rbuf = ReadBuffer::new(response.payload);
    let _data_flags = rbuf.read_u16_be()?;
    let msg_type = rbuf.read_u8()?;

    if msg_type != TNS_MSG_TYPE_DATA_TYPES {
        return Err(Error::protocol(format!(
            "Expected DataTypes response (type {}), got type {}",
            TNS_MSG_TYPE_DATA_TYPES, msg_type
        )));
    }

    skip_data_types_response(&mut rbuf)?;

    Ok(())
}

/// Combined protocol/data-types/auth-phase-one exchange for servers that
/// advertise fast auth (23ai+). Saves two round trips during logon.
pub async fn fast_auth(
    stream: &mut PacketStream,
    caps: &mut Capabilities,
    auth: &AuthParams,
    params: &ConnectParams,
) -> Result<SessionData> {
    let pid = params.pid.to_string();

    // The requested field version also governs the format of the
    // response, so pin it before serializing
    let mut fast_auth_compile_caps = caps.compile_caps.clone();
    fast_auth_compile_caps[TNS_CCAP_FIELD_VERSION] = TNS_CCAP_FIELD_VERSION_19_1_EXT_1;
    caps.ttc_field_version = TNS_CCAP_FIELD_VERSION_19_1_EXT_1;

    let msg = FastAuthMessage {
        driver_name: DRIVER_NAME,
        compile_caps: &fast_auth_compile_caps,
        runtime_caps: &caps.runtime_caps,
        auth: AuthPhaseOneMessage {
            username: &auth.username,
            auth_mode: auth.mode.mode_bits(),
            terminal: "unknown",
            program: &params.program,
            machine: &params.machine,
            pid: &pid,
            osuser: &params.osuser,
        },
    };

    stream.send_data_message(&msg).await?;

    let response = read_data_packet(stream, caps).await?;

    let mut rbuf = ReadBuffer::new(response.payload);
    let _data_flags = rbuf.read_u16_be()?;

    let mut session = SessionData::default();

    while rbuf.remaining() > 0 {
        let msg_type = rbuf.read_u8()?;

        match msg_type {
            TNS_MSG_TYPE_PROTOCOL => {
                parse_protocol_response(&mut rbuf, caps)?;
            }
            TNS_MSG_TYPE_DATA_TYPES => {
                skip_data_types_response(&mut rbuf)?;
            }
            TNS_MSG_TYPE_PARAMETER => {
                parse_auth_parameters(&mut rbuf, &mut session)?;
            }
            TNS_MSG_TYPE_ERROR => {
                // The error structure here is the full call-status block;
                // a zero error number is simply a successful status
                let info = crate::protocol::response::parse_error_info(
                    &mut rbuf,
                    caps.server_ttc_field_version,
                )?;
                if info.error_num != 0 {
                    return Err(Error::Oracle {
                        code: info.error_num,
                        message: info.message.unwrap_or_default(),
                        position: info.error_pos,
                        cursor_id: info.cursor_id,
                        row_count: info.row_count,
                        batch_errors: Vec::new(),
                    });
                }
            }
            TNS_MSG_TYPE_END_OF_RESPONSE => {
                break;
            }
            other => {
                tracing::warn!(msg_type = other, "unexpected message in fast auth response");
                break;
            }
        }
    }

    Ok(session)
}
