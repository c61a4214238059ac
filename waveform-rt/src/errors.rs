// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Error types for the `waveform-rt` crate.
*/

use thiserror::Error;

/// Errors produced while parsing a wire-format VITA-49 packet (C1).
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum DecodeError {
    /// The packet's declared length (in 32-bit words) did not match the
    /// number of bytes actually received.
    #[error("declared length {declared} words does not match received length {received} bytes")]
    InvalidLength {
        /// Length declared in the packet header, in 32-bit words.
        declared: u16,
        /// Length actually received, in bytes.
        received: usize,
    },
    /// The class identifier's OUI did not match the radio vendor's OUI.
    #[error("OUI {found:#08x} does not match expected vendor OUI {expected:#08x}")]
    InvalidOui {
        /// OUI found in the packet.
        found: u32,
        /// OUI expected for this radio.
        expected: u32,
    },
    /// The class identifier's information class did not match the radio's.
    #[error("information class {found:#06x} does not match expected {expected:#06x}")]
    InvalidClass {
        /// Information class found in the packet.
        found: u16,
        /// Information class expected for this radio.
        expected: u16,
    },
    /// The packet was too short to contain even a header.
    #[error("packet too short: {0} bytes")]
    TooShort(usize),
    /// A class identifier was required (to classify the packet) but absent.
    #[error("packet has no class identifier")]
    MissingClassId,
    /// A stream identifier was required but absent.
    #[error("packet has no stream identifier")]
    MissingStreamId,
}

/// Top-level error type for the `waveform-rt` crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to decode a wire-format packet.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// A transport operation (TCP/UDP) failed.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    /// A control-plane line could not be tokenized or parsed.
    #[error("malformed control frame: {0}")]
    MalformedFrame(String),
    /// A meter value was set outside of its configured `[min, max]` range.
    #[error("meter value {value} out of range [{min}, {max}]")]
    MeterValueOutOfRange {
        /// The rejected value.
        value: f64,
        /// Minimum of the allowed range.
        min: f64,
        /// Maximum of the allowed range.
        max: f64,
    },
    /// A meter value was not a finite number.
    #[error("meter value {0} is not finite")]
    MeterValueNotFinite(f64),
    /// A meter with this name is already registered on the waveform.
    #[error("meter {0:?} already registered")]
    DuplicateMeterName(String),
    /// More meter values were ready to send than fit in one packet.
    #[error("{0} meter values ready to send exceeds the {1}-slot packet limit")]
    TooManyMeterSlots(usize, usize),
    /// An audio payload exceeded the 360-sample-pair limit.
    #[error("audio payload of {0} sample pairs exceeds the 360-pair limit")]
    AudioPayloadTooLarge(usize),
    /// A byte-stream payload exceeded the 1436-byte limit.
    #[error("byte payload of {0} bytes exceeds the 1436-byte limit")]
    ByteDataPayloadTooLarge(usize),
    /// A command was sent with a sequence number that has an outstanding
    /// response entry already (should not happen given the sequence
    /// counter's invariants; indicates caller misuse of a raw sequence).
    #[error("sequence {0} already has an outstanding response entry")]
    DuplicateSequence(u32),
}
