// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The UDP data plane (C2/C3): socket I/O, packet classification, and the
ordered worker queue user callbacks run on, per `spec` §4.2/§4.3.
*/

pub mod socket;
pub mod worker;

pub use socket::DataSocket;
pub use worker::{WorkItem, WorkQueue};
