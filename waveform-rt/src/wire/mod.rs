// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The VITA-49 wire codec (C1): packet header, class identifier, payload
shapes, and the `VitaPacket` type that ties them together.
*/

pub mod class_id;
pub mod header;
pub mod packet;
pub mod payload;

pub use class_id::{ClassIdentifier, PacketClass};
pub use header::{FractionalTimestampType, IntegerTimestampType, PacketHeader, PacketType};
pub use packet::{PacketKind, VitaPacket, RADIO_OUI};
pub use payload::{MeterSlot, Payload};
