// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Radio discovery (`spec` §4.8, component C8): listens on the broadcast
discovery port for a radio's advertisement and decodes its address.
*/

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use deku::prelude::*;
use deku::{DekuContainerRead, DekuContainerWrite};
use socket2::{Domain, Socket, Type};

use crate::errors::{DecodeError, Error};
use crate::wire::class_id::ClassIdentifier;
use crate::wire::header::{PacketHeader, PacketType};
use crate::wire::packet::RADIO_OUI;

/// The UDP port radios broadcast discovery advertisements on (`spec` §4.8).
pub const DISCOVERY_PORT: u16 = 4992;

/// Stream id discovery advertisements carry (`spec` §4.8). Like
/// `METER_STREAM_ID`, the spec names "the discovery stream id" without
/// giving its literal value; chosen distinct from `METER_STREAM_ID` and
/// from the radio-assigned audio/byte stream ids.
pub const DISCOVERY_STREAM_ID: u32 = 0x0000_0002;

/// Validates that `bytes` is a well-formed VITA-49 EXT_DATA_WITH_ID
/// packet carrying the discovery stream id, and returns the raw trailing
/// payload bytes (the ASCII `key=value` blob), without decoding them
/// through the audio/byte/unknown payload dispatch — a discovery
/// advertisement's payload is neither (`spec` §4.1/§4.8).
fn validate_and_extract_payload(bytes: &[u8]) -> Result<&[u8], DecodeError> {
    if bytes.len() < 4 {
        return Err(DecodeError::TooShort(bytes.len()));
    }
    let ((rest, _), header) =
        PacketHeader::from_bytes((bytes, 0)).map_err(|_| DecodeError::TooShort(bytes.len()))?;
    let declared_bytes = header.length_words() as usize * 4;
    if declared_bytes != bytes.len() {
        return Err(DecodeError::InvalidLength {
            declared: header.length_words(),
            received: bytes.len(),
        });
    }
    if header.packet_type() != PacketType::ExtDataWithId || !header.stream_id_included() {
        return Err(DecodeError::MissingStreamId);
    }

    let (rest, stream_id) = take_u32(rest)?;
    if stream_id != DISCOVERY_STREAM_ID {
        return Err(DecodeError::MissingStreamId);
    }

    let rest = if header.class_present() {
        let ((rest2, _), class_id) = ClassIdentifier::from_bytes((rest, 0))
            .map_err(|_| DecodeError::TooShort(rest.len()))?;
        if class_id.oui() != RADIO_OUI {
            return Err(DecodeError::InvalidOui { found: class_id.oui(), expected: RADIO_OUI });
        }
        rest2
    } else {
        rest
    };

    Ok(rest)
}

fn take_u32(bytes: &[u8]) -> Result<(&[u8], u32), DecodeError> {
    if bytes.len() < 4 {
        return Err(DecodeError::TooShort(bytes.len()));
    }
    let (head, rest) = bytes.split_at(4);
    Ok((rest, u32::from_be_bytes(head.try_into().unwrap())))
}

/// Parses a discovery payload's `ip=<dotted> port=<u16>` tokens into a
/// socket address.
fn parse_payload(bytes: &[u8]) -> Option<SocketAddr> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut ip = None;
    let mut port = None;
    for tok in text.split_whitespace() {
        if let Some(v) = tok.strip_prefix("ip=") {
            ip = v.parse::<Ipv4Addr>().ok();
        } else if let Some(v) = tok.strip_prefix("port=") {
            port = v.parse::<u16>().ok();
        }
    }
    Some(SocketAddr::V4(SocketAddrV4::new(ip?, port?)))
}

/// Listens on [`DISCOVERY_PORT`] for a radio advertisement. Binds with
/// `SO_REUSEADDR` so multiple discovery clients can coexist on the
/// host (`spec` §4.8). Returns the first payload that parses; on
/// `timeout` elapsing without one, returns `Error::Io` with
/// `ErrorKind::TimedOut`.
pub fn discover(timeout: Duration) -> Result<SocketAddr, Error> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    let bind_addr: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DISCOVERY_PORT).into();
    socket.bind(&bind_addr.into())?;
    let udp: UdpSocket = socket.into();
    udp.set_read_timeout(Some(timeout))?;

    let mut buf = [0u8; 1500];
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if std::time::Instant::now() >= deadline {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "no discovery advertisement received",
            )));
        }
        match udp.recv_from(&mut buf) {
            Ok((n, _from)) => {
                match validate_and_extract_payload(&buf[..n]) {
                    Ok(payload) => {
                        if let Some(addr) = parse_payload(payload) {
                            return Ok(addr);
                        }
                        log::info!("discovery: advertisement framed correctly but payload unparseable");
                    }
                    Err(e) => log::info!("discovery: dropped advertisement failing VITA-49 validation: {e}"),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "no discovery advertisement received",
                )));
            }
            Err(e) => return Err(Error::Io(e)),
        }
    }
}
