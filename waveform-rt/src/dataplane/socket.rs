// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The UDP data-plane socket and read loop (`spec` §4.2, component C2):
binds an OS-chosen local port, classifies incoming packets, learns
stream-id direction lazily, and pushes classified packets onto the
worker queue.
*/

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Socket, Type};

use crate::dataplane::worker::{WorkItem, WorkQueue};
use crate::errors::Error;
use crate::waveform::{DataStream, Waveform};
use crate::wire::{PacketKind, VitaPacket};

/// How long a single `recv_from` blocks before the loop re-checks the
/// shutdown flag. Stands in for "readiness event" polling in an
/// idiomatic Rust rendition of the source's non-blocking socket loop
/// (`spec` §4.2).
const POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// Largest datagram this runtime expects: a without-timestamp header
/// (16 bytes) plus the largest payload (1452 bytes), rounded up.
const RECV_BUF_LEN: usize = 2048;

/// The bound UDP socket for one waveform's data plane.
pub struct DataSocket {
    socket: UdpSocket,
    local_port: u16,
    radio_addr: SocketAddr,
}

impl DataSocket {
    /// Binds a non-blocking UDP socket on an OS-chosen local port
    /// (`spec` §4.2).
    pub fn bind(radio_addr: SocketAddr) -> Result<Self, Error> {
        let domain = if radio_addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket = Socket::new(domain, Type::DGRAM, None)?;
        let bind_addr: SocketAddr = if radio_addr.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        socket.bind(&bind_addr.into())?;
        let udp: UdpSocket = socket.into();
        udp.set_read_timeout(Some(POLL_TIMEOUT))?;
        let local_port = udp.local_addr()?.port();
        Ok(DataSocket { socket: udp, local_port, radio_addr })
    }

    /// The local UDP port this socket bound to, reported to the radio
    /// via `waveform set <name> udpport=<port>` and `client udpport
    /// <port>` (`spec` §4.2).
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Sends an already-encoded packet to the radio.
    pub fn send_to_radio(&self, bytes: &[u8]) -> Result<(), Error> {
        self.socket.send_to(bytes, self.radio_addr)?;
        Ok(())
    }

    /// Runs the read loop until `running` is cleared (`spec` §4.2/§5:
    /// this thread runs at the highest realtime FIFO priority the
    /// process holds and performs no user code itself).
    pub fn run(
        &self,
        running: &AtomicBool,
        expected_information_class: u16,
        waveform: &Arc<Waveform>,
        queue: &WorkQueue,
    ) {
        let mut buf = [0u8; RECV_BUF_LEN];
        while running.load(Ordering::Acquire) {
            match self.socket.recv_from(&mut buf) {
                Ok((n, _src)) => match VitaPacket::parse(&buf[..n], expected_information_class) {
                    Ok(packet) => classify_and_dispatch(waveform, queue, packet),
                    Err(e) => log::info!("dropping malformed VITA-49 packet: {e}"),
                },
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => log::error!("UDP data-plane read error: {e}"),
            }
        }
    }
}

fn classify_and_dispatch(waveform: &Arc<Waveform>, queue: &WorkQueue, packet: VitaPacket) {
    match packet.classify() {
        PacketKind::Audio => {
            let Some(stream_id) = packet.stream_id() else {
                log::info!("dropping audio packet with no stream id");
                return;
            };
            let is_tx = stream_id & 1 == 1;
            let mut ids = waveform.stream_ids();
            let seeded = if is_tx { ids.tx_audio_in } else { ids.rx_audio_in };
            match seeded {
                None => {
                    if is_tx {
                        ids.tx_audio_in = Some(stream_id);
                    } else {
                        ids.rx_audio_in = Some(stream_id);
                    }
                    waveform.set_stream_ids(ids);
                }
                Some(expected) if expected != stream_id => {
                    log::info!(
                        "dropping audio packet with stream id {stream_id:#010x}, expected {expected:#010x}"
                    );
                    return;
                }
                _ => {}
            }
            let stream = if is_tx { DataStream::TxAudio } else { DataStream::RxAudio };
            queue.push(WorkItem { waveform: Arc::clone(waveform), stream, packet });
        }
        PacketKind::Byte => {
            let Some(stream_id) = packet.stream_id() else {
                log::info!("dropping byte packet with no stream id");
                return;
            };
            let is_tx = stream_id & 1 == 1;
            let mut ids = waveform.stream_ids();
            match ids.byte_in {
                None => {
                    ids.byte_in = Some(stream_id);
                    waveform.set_stream_ids(ids);
                }
                Some(expected) if expected != stream_id => {
                    log::info!(
                        "dropping byte packet with stream id {stream_id:#010x}, expected {expected:#010x}"
                    );
                    return;
                }
                _ => {}
            }
            let stream = if is_tx { DataStream::TxByte } else { DataStream::RxByte };
            queue.push(WorkItem { waveform: Arc::clone(waveform), stream, packet });
        }
        PacketKind::Unknown => {
            queue.push(WorkItem { waveform: Arc::clone(waveform), stream: DataStream::Unknown, packet });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;

    #[test]
    fn binds_to_os_chosen_port() {
        let socket = DataSocket::bind("127.0.0.1:4991".parse().unwrap()).unwrap();
        assert_ne!(socket.local_port(), 0);
    }

    #[test]
    fn unknown_packets_are_enqueued_without_stream_learning() {
        let wf = StdArc::new(Waveform::new("Junk", "JUNK", "USB", "1.0.0", StdArc::new(())));
        let queue = WorkQueue::new();
        let packet = VitaPacket::new_meter(1, crate::wire::Payload::Unknown(vec![0xDEAD_BEEF]));
        assert_eq!(packet.classify(), PacketKind::Unknown);
        classify_and_dispatch(&wf, &queue, packet);
        assert_eq!(wf.stream_ids(), crate::waveform::StreamIds::default());
    }
}
