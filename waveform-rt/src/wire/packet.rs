// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
`VitaPacket`: the full VITA-49 packet (header, stream id, class id,
timestamps, payload) and the `parse`/`encode`/`header_size`/`classify`
contract from `spec` §4.1.
*/

use deku::prelude::*;
use deku::{DekuContainerRead, DekuContainerWrite};

use crate::errors::DecodeError;
use crate::wire::class_id::{ClassIdentifier, PacketClass};
use crate::wire::header::{
    FractionalTimestampType, IntegerTimestampType, PacketHeader, PacketType,
};
use crate::wire::payload::Payload;

/// The vendor OUI this runtime expects on every packet (`spec` §6).
pub const RADIO_OUI: u32 = 0x00_1C_2D;

/// How a parsed packet was classified (`spec` §4.1).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PacketKind {
    /// Audio RX/TX sample pairs.
    Audio,
    /// Opaque byte-stream data.
    Byte,
    /// Anything else.
    Unknown,
}

/// A fully decoded (or about-to-be-encoded) VITA-49 packet.
#[derive(Clone, PartialEq, Debug)]
pub struct VitaPacket {
    header: PacketHeader,
    stream_id: Option<u32>,
    class_id: Option<ClassIdentifier>,
    integer_timestamp: Option<u32>,
    fractional_timestamp: Option<u64>,
    payload: Payload,
}

impl VitaPacket {
    /// Builds a new audio packet (IF-data-with-stream-id, audio class).
    pub fn new_audio(stream_id: u32, information_class: u16, samples: Vec<(f32, f32)>) -> Self {
        let mut header = PacketHeader::new_audio_header();
        header.set_class_present(true);
        let mut class_id = ClassIdentifier::default();
        class_id.set_oui(RADIO_OUI);
        class_id.set_information_class_code(information_class);
        class_id.set_packet_class(PacketClass::AUDIO);
        let mut packet = VitaPacket {
            header,
            stream_id: Some(stream_id),
            class_id: Some(class_id),
            integer_timestamp: None,
            fractional_timestamp: None,
            payload: Payload::Audio(samples),
        };
        packet.update_length();
        packet
    }

    /// Builds a new byte-stream packet (ext-data-with-stream-id, byte
    /// class).
    pub fn new_byte(stream_id: u32, information_class: u16, data: Vec<u8>) -> Self {
        let mut header = PacketHeader::new_ext_data_header();
        header.set_class_present(true);
        let mut class_id = ClassIdentifier::default();
        class_id.set_oui(RADIO_OUI);
        class_id.set_information_class_code(information_class);
        class_id.set_packet_class(PacketClass::BYTE);
        let mut packet = VitaPacket {
            header,
            stream_id: Some(stream_id),
            class_id: Some(class_id),
            integer_timestamp: None,
            fractional_timestamp: None,
            payload: Payload::Byte(data),
        };
        packet.update_length();
        packet
    }

    /// Builds a new meter packet (ext-data-with-stream-id, no timestamp,
    /// no class id — `spec` §4.7/§6).
    pub fn new_meter(stream_id: u32, payload: Payload) -> Self {
        let header = PacketHeader::new_ext_data_header();
        let mut packet = VitaPacket {
            header,
            stream_id: Some(stream_id),
            class_id: None,
            integer_timestamp: None,
            fractional_timestamp: None,
            payload,
        };
        packet.update_length();
        packet
    }

    /// The packet header.
    pub fn header(&self) -> &PacketHeader {
        &self.header
    }
    /// The stream id, if one is included.
    pub fn stream_id(&self) -> Option<u32> {
        self.stream_id
    }
    /// The class identifier, if one is included.
    pub fn class_id(&self) -> Option<&ClassIdentifier> {
        self.class_id.as_ref()
    }
    /// The payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
    /// The 4-bit modulo-16 sequence counter.
    pub fn sequence(&self) -> u8 {
        self.header.sequence()
    }
    /// Sets the 4-bit modulo-16 sequence counter.
    pub fn set_sequence(&mut self, seq: u8) {
        self.header.set_sequence(seq);
    }

    /// Sets the integer timestamp and its type together (they must agree:
    /// `Some` value requires a non-`NotPresent` type and vice versa).
    pub fn set_integer_timestamp(&mut self, value: Option<u32>, kind: IntegerTimestampType) {
        self.integer_timestamp = value;
        self.header.set_integer_timestamp_type(kind);
        self.update_length();
    }

    /// Sets the fractional timestamp and its type together. Treated as a
    /// single big-endian 64-bit quantity throughout, per `spec` §9 (not
    /// two byte-swapped 32-bit halves).
    pub fn set_fractional_timestamp(&mut self, value: Option<u64>, kind: FractionalTimestampType) {
        self.fractional_timestamp = value;
        self.header.set_fractional_timestamp_type(kind);
        self.update_length();
    }

    /// Recomputes the header's length-in-words field from the current
    /// contents. Must be called after any mutation prior to `encode`.
    pub fn update_length(&mut self) {
        let mut words: u16 = 1; // header itself
        if self.header.stream_id_included() {
            words += 1;
        }
        if self.header.class_present() {
            words += 2;
        }
        if self.header.integer_timestamp_included() {
            words += 1;
        }
        if self.header.fractional_timestamp_included() {
            words += 2;
        }
        words += self.payload.size_words();
        self.header.set_length_words(words);
    }

    /// Returns the size, in bytes, of the fixed-field prefix (header
    /// through timestamps) this packet carries (`spec` §4.1).
    pub fn header_size(&self) -> usize {
        self.header.header_size()
    }

    /// Classifies this packet per the conjunction rules in `spec` §4.1.
    pub fn classify(&self) -> PacketKind {
        let Some(class_id) = &self.class_id else {
            return PacketKind::Unknown;
        };
        match self.header.packet_type() {
            PacketType::IfDataWithId if class_id.packet_class() == PacketClass::AUDIO => {
                PacketKind::Audio
            }
            PacketType::ExtDataWithId if class_id.packet_class() == PacketClass::BYTE => {
                PacketKind::Byte
            }
            _ => PacketKind::Unknown,
        }
    }

    /// Parses a network-order byte slice into a `VitaPacket`, validating
    /// declared length, vendor OUI, and information class against the
    /// radio's expected values (`spec` §4.1).
    pub fn parse(
        bytes: &[u8],
        expected_information_class: u16,
    ) -> Result<VitaPacket, DecodeError> {
        if bytes.len() < 4 {
            return Err(DecodeError::TooShort(bytes.len()));
        }
        let ((rest, _), header) = PacketHeader::from_bytes((bytes, 0))
            .map_err(|_| DecodeError::TooShort(bytes.len()))?;
        let declared_bytes = header.length_words() as usize * 4;
        if declared_bytes != bytes.len() {
            return Err(DecodeError::InvalidLength {
                declared: header.length_words(),
                received: bytes.len(),
            });
        }

        let mut cursor = rest;
        let mut stream_id = None;
        if header.stream_id_included() {
            let (rest2, id) = take_u32(cursor)?;
            stream_id = Some(id);
            cursor = rest2;
        }

        let mut class_id = None;
        if header.class_present() {
            let ((rest2, _), cid) = ClassIdentifier::from_bytes((cursor, 0))
                .map_err(|_| DecodeError::TooShort(cursor.len()))?;
            if cid.oui() != RADIO_OUI {
                return Err(DecodeError::InvalidOui {
                    found: cid.oui(),
                    expected: RADIO_OUI,
                });
            }
            if cid.information_class_code() != expected_information_class {
                return Err(DecodeError::InvalidClass {
                    found: cid.information_class_code(),
                    expected: expected_information_class,
                });
            }
            class_id = Some(cid);
            cursor = rest2;
        }

        let mut integer_timestamp = None;
        if header.integer_timestamp_included() {
            let (rest2, ts) = take_u32(cursor)?;
            integer_timestamp = Some(ts);
            cursor = rest2;
        }

        let mut fractional_timestamp = None;
        if header.fractional_timestamp_included() {
            let (rest2, ts) = take_u64(cursor)?;
            fractional_timestamp = Some(ts);
            cursor = rest2;
        }

        let payload_kind = {
            let probe = VitaPacket {
                header,
                stream_id,
                class_id,
                integer_timestamp,
                fractional_timestamp,
                payload: Payload::Unknown(Vec::new()),
            };
            probe.classify()
        };
        let payload = match payload_kind {
            PacketKind::Audio => Payload::decode_audio(cursor)?,
            PacketKind::Byte => Payload::decode_byte(cursor)?,
            PacketKind::Unknown => Payload::decode_unknown(cursor)?,
        };

        Ok(VitaPacket {
            header,
            stream_id,
            class_id,
            integer_timestamp,
            fractional_timestamp,
            payload,
        })
    }

    /// Encodes this packet to network-order bytes, recomputing the
    /// length field first.
    pub fn encode(&mut self) -> Vec<u8> {
        self.update_length();
        let mut out = Vec::with_capacity(self.header.length_words() as usize * 4);
        out.extend_from_slice(&self.header.to_bytes().expect("header always encodes"));
        if let Some(id) = self.stream_id {
            out.extend_from_slice(&id.to_be_bytes());
        }
        if let Some(class_id) = &self.class_id {
            out.extend_from_slice(&class_id.to_bytes().expect("class id always encodes"));
        }
        if let Some(ts) = self.integer_timestamp {
            out.extend_from_slice(&ts.to_be_bytes());
        }
        if let Some(ts) = self.fractional_timestamp {
            out.extend_from_slice(&ts.to_be_bytes());
        }
        out.extend_from_slice(&self.payload.encode());
        out
    }
}

fn take_u32(bytes: &[u8]) -> Result<(&[u8], u32), DecodeError> {
    if bytes.len() < 4 {
        return Err(DecodeError::TooShort(bytes.len()));
    }
    let (head, rest) = bytes.split_at(4);
    Ok((rest, u32::from_be_bytes(head.try_into().unwrap())))
}

fn take_u64(bytes: &[u8]) -> Result<(&[u8], u64), DecodeError> {
    if bytes.len() < 8 {
        return Err(DecodeError::TooShort(bytes.len()));
    }
    let (head, rest) = bytes.split_at(8);
    Ok((rest, u64::from_be_bytes(head.try_into().unwrap())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip_audio() {
        let mut packet = VitaPacket::new_audio(0xDEAD_BEEE, 0x1234, vec![(1.0, -1.0)]);
        let bytes = packet.encode();
        let parsed = VitaPacket::parse(&bytes, 0x1234).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn header_round_trip_byte() {
        let mut packet = VitaPacket::new_byte(0xCAFE_0001, 0x1234, vec![1, 2, 3]);
        let bytes = packet.encode();
        let parsed = VitaPacket::parse(&bytes, 0x1234).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn meter_packet_has_no_class_id_and_is_unknown() {
        let payload = Payload::Meter(vec![crate::wire::payload::MeterSlot { id: 1, value: 42 }]);
        let mut packet = VitaPacket::new_meter(0xBEEF_0001, payload);
        assert!(packet.class_id().is_none());
        assert_eq!(packet.classify(), PacketKind::Unknown);
        let bytes = packet.encode();
        assert_eq!(bytes.len(), packet.header().length_words() as usize * 4);
    }

    #[test]
    fn multiple_audio_sample_pairs_preserve_order() {
        let samples = vec![(1.0, -1.0), (2.0, -2.0), (3.0, -3.0)];
        let mut packet = VitaPacket::new_audio(1, 1, samples.clone());
        let bytes = packet.encode();
        let parsed = VitaPacket::parse(&bytes, 1).unwrap();
        match parsed.payload() {
            Payload::Audio(parsed_samples) => assert_eq!(parsed_samples, &samples),
            other => panic!("expected audio payload, got {other:?}"),
        }
    }

    #[test]
    fn invalid_oui_is_rejected() {
        let mut packet = VitaPacket::new_audio(1, 1, vec![(0.0, 0.0)]);
        let mut bytes = packet.encode();
        // Corrupt the low byte of the OUI word (header + stream id = 8
        // bytes, then the class id's first word).
        let oui_offset = 8;
        bytes[oui_offset + 3] ^= 0xFF;
        assert!(matches!(
            VitaPacket::parse(&bytes, 1),
            Err(DecodeError::InvalidOui { .. })
        ));
    }

    #[test]
    fn invalid_length_is_rejected() {
        let mut packet = VitaPacket::new_audio(1, 1, vec![(0.0, 0.0)]);
        let bytes = packet.encode();
        assert!(matches!(
            VitaPacket::parse(&bytes[..bytes.len() - 4], 1),
            Err(DecodeError::InvalidLength { .. })
        ));
    }

    #[test]
    fn invalid_information_class_is_rejected() {
        let mut packet = VitaPacket::new_audio(1, 1, vec![(0.0, 0.0)]);
        let bytes = packet.encode();
        assert!(matches!(
            VitaPacket::parse(&bytes, 0xFFFF),
            Err(DecodeError::InvalidClass { .. })
        ));
    }

    #[test]
    fn header_size_reflects_timestamp_presence() {
        let packet = VitaPacket::new_audio(1, 1, vec![]);
        assert_eq!(
            packet.header_size(),
            PacketHeader::WITHOUT_INT_TIMESTAMP_PREFIX_BYTES
        );
        let mut packet = packet;
        packet.set_integer_timestamp(Some(123), IntegerTimestampType::Utc);
        assert_eq!(
            packet.header_size(),
            PacketHeader::WITH_INT_TIMESTAMP_PREFIX_BYTES
        );
    }

    #[test]
    fn unclassified_packet_is_unknown() {
        let mut header = PacketHeader::new_audio_header();
        header.set_class_present(false);
        let mut packet = VitaPacket {
            header,
            stream_id: Some(1),
            class_id: None,
            integer_timestamp: None,
            fractional_timestamp: None,
            payload: Payload::Unknown(vec![1, 2, 3]),
        };
        packet.update_length();
        assert_eq!(packet.classify(), PacketKind::Unknown);
    }
}
