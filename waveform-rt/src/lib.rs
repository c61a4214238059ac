// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![deny(unstable_features, unused_import_braces, unreachable_pub)]
#![warn(rustdoc::unescaped_backticks)]
#![forbid(unsafe_code)]

pub mod control;
pub mod dataplane;
mod discovery;
mod errors;
mod meter;
mod radio;
mod rt;
mod slice;
mod waveform;
pub mod wire;

pub use crate::discovery::{discover, DISCOVERY_PORT};
pub use crate::errors::{DecodeError, Error};
pub use crate::meter::{Meter, MeterRegistry, Unit, MAX_METER_SLOTS, METER_STREAM_ID};
pub use crate::radio::Radio;
pub use crate::rt::Priority;
pub use crate::slice::{SliceState, SliceTransition};
pub use crate::waveform::{
    CallbackEntry, CallbackKind, CommandCallback, CompletionCallback, DataCallback, DataStream,
    QueuedCallback, StateCallback, StateEvent, StatusCallback, StreamIds, UserContext, Waveform,
    DEFAULT_FILTER_DEPTH,
};

/// Standard imports for the most commonly used types in `waveform-rt`.
pub mod prelude {
    pub use crate::control::ControlConnection;
    pub use crate::errors::{DecodeError, Error};
    pub use crate::meter::{Meter, MeterRegistry, Unit};
    pub use crate::radio::Radio;
    pub use crate::waveform::{CallbackEntry, CallbackKind, DataStream, StateEvent, Waveform};
    pub use crate::wire::{ClassIdentifier, PacketKind, VitaPacket};
}
