// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Payload shapes for the packet kinds this runtime cares about (`spec` §4.1,
§6): audio sample pairs, length-prefixed byte-stream data, meter value
slots (outgoing only), and a catch-all "unknown" word array.

Unlike 32-bit integer header fields, payloads are not decoded through
`deku`'s conditional-enum dispatch: which shape applies depends on the
*class identifier*, a sibling field the outer `VitaPacket` already parsed,
so `VitaPacket::parse` drives payload decoding explicitly instead.
*/

use crate::errors::DecodeError;

/// Maximum number of audio sample pairs in one packet (`spec` §6).
pub const MAX_AUDIO_SAMPLE_PAIRS: usize = 360;
/// Maximum number of payload bytes in one byte-stream packet (`spec` §6).
pub const MAX_BYTE_PAYLOAD_LEN: usize = 1436;
/// Maximum number of `{id, value}` slots in one meter packet (`spec` §4.7).
pub const MAX_METER_SLOTS: usize = 363;

/// One meter value slot as carried on the wire: `{id, value}` pair order
/// (see `spec` §9's resolution of the competing slot-order question).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct MeterSlot {
    /// Radio-assigned meter id.
    pub id: u16,
    /// Fixed-point meter value.
    pub value: i16,
}

/// The decoded/to-be-encoded packet payload.
#[derive(Clone, PartialEq, Debug)]
pub enum Payload {
    /// Audio RX/TX payload: up to 360 `(left, right)` 32-bit float pairs.
    Audio(Vec<(f32, f32)>),
    /// Byte-stream payload: up to 1436 bytes of opaque data.
    Byte(Vec<u8>),
    /// Meter payload: up to 363 `{id, value}` slots. Only ever produced
    /// locally for emission; never parsed off the wire (meter packets
    /// are waveform-to-radio only).
    Meter(Vec<MeterSlot>),
    /// Anything that didn't match the audio or byte class conjunction:
    /// delivered as raw 32-bit words, host byte order.
    Unknown(Vec<u32>),
}

impl Payload {
    /// Size of this payload in 32-bit words, as it would appear on the
    /// wire (used to compute the packet header's length field).
    pub fn size_words(&self) -> u16 {
        match self {
            Payload::Audio(samples) => (samples.len() * 2) as u16,
            Payload::Byte(data) => {
                // 1 word for the length prefix, then ceil(len / 4) words.
                1 + data.len().div_ceil(4) as u16
            }
            Payload::Meter(slots) => slots.len() as u16,
            Payload::Unknown(words) => words.len() as u16,
        }
    }

    /// Decodes `bytes` as an audio payload (network-order f32 pairs).
    pub fn decode_audio(bytes: &[u8]) -> Result<Payload, DecodeError> {
        if bytes.len() % 8 != 0 {
            return Err(DecodeError::TooShort(bytes.len()));
        }
        let mut samples = Vec::with_capacity(bytes.len() / 8);
        for chunk in bytes.chunks_exact(8) {
            let left = f32::from_be_bytes(chunk[0..4].try_into().unwrap());
            let right = f32::from_be_bytes(chunk[4..8].try_into().unwrap());
            samples.push((left, right));
        }
        Ok(Payload::Audio(samples))
    }

    /// Decodes `bytes` as a byte-stream payload: a 4-byte network-order
    /// length prefix followed by that many opaque bytes, delivered
    /// untouched (`spec` §4.1).
    pub fn decode_byte(bytes: &[u8]) -> Result<Payload, DecodeError> {
        if bytes.len() < 4 {
            return Err(DecodeError::TooShort(bytes.len()));
        }
        let len = u32::from_be_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let data = bytes.get(4..4 + len).ok_or(DecodeError::TooShort(bytes.len()))?;
        Ok(Payload::Byte(data.to_vec()))
    }

    /// Decodes `bytes` as a generic word array (audio/unknown are both
    /// word-swapped per `spec` §4.1).
    pub fn decode_unknown(bytes: &[u8]) -> Result<Payload, DecodeError> {
        if bytes.len() % 4 != 0 {
            return Err(DecodeError::TooShort(bytes.len()));
        }
        let words = bytes
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes(c.try_into().unwrap()))
            .collect();
        Ok(Payload::Unknown(words))
    }

    /// Encodes this payload's body to wire bytes (network byte order).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Payload::Audio(samples) => {
                let mut out = Vec::with_capacity(samples.len() * 8);
                for (l, r) in samples {
                    out.extend_from_slice(&l.to_be_bytes());
                    out.extend_from_slice(&r.to_be_bytes());
                }
                out
            }
            Payload::Byte(data) => {
                let mut out = Vec::with_capacity(4 + data.len());
                out.extend_from_slice(&(data.len() as u32).to_be_bytes());
                out.extend_from_slice(data);
                out
            }
            Payload::Meter(slots) => {
                let mut out = Vec::with_capacity(slots.len() * 4);
                for slot in slots {
                    out.extend_from_slice(&slot.id.to_be_bytes());
                    out.extend_from_slice(&slot.value.to_be_bytes());
                }
                out
            }
            Payload::Unknown(words) => {
                let mut out = Vec::with_capacity(words.len() * 4);
                for w in words {
                    out.extend_from_slice(&w.to_be_bytes());
                }
                out
            }
        }
    }
}
