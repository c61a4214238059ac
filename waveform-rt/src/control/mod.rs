// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The control-plane protocol (C4/C5): line framing, tokenization, and the
TCP connection lifecycle described in `spec` §4.4/§4.5.
*/

pub mod connection;
pub mod frame;
pub mod tokenize;

pub use connection::ControlConnection;
pub use frame::Frame;
