// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The `Radio` handle (`spec` §4.9, component C9): owns the control
connection, the waveform registry, and every activated waveform's data
plane. Slice activation/deactivation (`spec` §4.6) is wired to data-plane
setup and teardown through the normal-priority callback work-queue pool
(thread pool D, `spec` §5), so the control read loop (thread A) never
blocks on a UDP bind or a thread spawn.
*/

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::control::ControlConnection;
use crate::dataplane::{DataSocket, WorkQueue};
use crate::errors::Error;
use crate::rt;
use crate::slice::SliceTransition;
use crate::waveform::{CompletionCallback, Waveform};
use crate::wire::payload::{MAX_AUDIO_SAMPLE_PAIRS, MAX_BYTE_PAYLOAD_LEN};
use crate::wire::VitaPacket;

/// Number of normal-priority workers draining the callback work queue
/// (thread pool D, `spec` §5).
const CALLBACK_POOL_SIZE: usize = 2;

type Job = Box<dyn FnOnce() + Send>;

/// The running data plane for one activated waveform: its bound UDP
/// socket, worker queue, and the two threads (B/C) serving them.
struct DataPlane {
    socket: Arc<DataSocket>,
    queue: Arc<WorkQueue>,
    running: Arc<AtomicBool>,
    io_thread: Option<JoinHandle<()>>,
    worker_thread: Option<JoinHandle<()>>,
}

impl DataPlane {
    fn stop(mut self) {
        self.running.store(false, Ordering::Release);
        self.queue.stop();
        if let Some(h) = self.io_thread.take() {
            let _ = h.join();
        }
        if let Some(h) = self.worker_thread.take() {
            let _ = h.join();
        }
    }
}

/// Owns the control connection, the waveform registry, and every
/// activated waveform's data plane (`spec` §4.9).
pub struct Radio {
    control: Arc<ControlConnection>,
    waveforms: Arc<RwLock<Vec<Arc<Waveform>>>>,
    data_planes: Arc<Mutex<HashMap<String, DataPlane>>>,
    job_tx: Sender<Job>,
    pool: Vec<JoinHandle<()>>,
    control_thread: Option<JoinHandle<()>>,
}

impl Radio {
    /// Connects to the radio's control plane at `addr` and prepares an
    /// empty waveform registry. `information_class` is the VITA-49
    /// information class every registered waveform's data plane expects
    /// (`spec` §6).
    pub fn new(addr: SocketAddr, information_class: u16) -> Result<Self, Error> {
        let waveforms: Arc<RwLock<Vec<Arc<Waveform>>>> = Arc::new(RwLock::new(Vec::new()));
        let data_planes: Arc<Mutex<HashMap<String, DataPlane>>> = Arc::new(Mutex::new(HashMap::new()));

        let (job_tx, job_rx): (Sender<Job>, Receiver<Job>) = crossbeam_channel::unbounded();
        let pool = (0..CALLBACK_POOL_SIZE)
            .map(|i| {
                let job_rx = job_rx.clone();
                std::thread::Builder::new()
                    .name(format!("waveform-rt-callback-{i}"))
                    .spawn(move || {
                        for job in job_rx {
                            job();
                        }
                    })
                    .expect("failed to spawn callback worker thread")
            })
            .collect();

        // The hook closure is built before the control connection exists
        // (the connection needs the hook to be constructed first), but
        // `start_data_plane` needs the connection to announce the bound
        // UDP port back to the radio. `control_cell` is filled immediately
        // below, before `connect` can return control to any caller that
        // might trigger a slice transition.
        let control_cell: Arc<OnceLock<Arc<ControlConnection>>> = Arc::new(OnceLock::new());

        let hook_data_planes = Arc::clone(&data_planes);
        let hook_job_tx = job_tx.clone();
        let hook_control = Arc::clone(&control_cell);
        let hook = move |wf: &Arc<Waveform>, transition: SliceTransition| {
            let wf = Arc::clone(wf);
            let data_planes = Arc::clone(&hook_data_planes);
            match transition {
                SliceTransition::Activate(_) => {
                    let Some(control) = hook_control.get().cloned() else {
                        log::error!("slice activated before control connection was recorded");
                        return;
                    };
                    let _ = hook_job_tx.send(Box::new(move || {
                        start_data_plane(addr, information_class, wf, data_planes, control);
                    }));
                }
                SliceTransition::Deactivate => {
                    let _ = hook_job_tx.send(Box::new(move || {
                        stop_data_plane(wf, data_planes);
                    }));
                }
                SliceTransition::None => {}
            }
        };

        let control = Arc::new(ControlConnection::connect(addr, Box::new(hook))?);
        control_cell.set(Arc::clone(&control)).ok();

        Ok(Radio { control, waveforms, data_planes, job_tx, pool, control_thread: None })
    }

    /// Registers a waveform. Append-only while the control loop is
    /// running is the documented contract (`spec` §4.9's freeze-point
    /// clause); registering after `start` is accepted but its
    /// interaction with an in-flight dispatch is undefined, per `spec`
    /// §7's "startup ordering" clause.
    pub fn register_waveform(&self, waveform: Arc<Waveform>) {
        self.waveforms.write().expect("waveform list lock poisoned").push(waveform);
    }

    /// Sends the control-plane initialization sequence (`spec` §4.5 step
    /// 2) and starts the control read-loop thread (thread A, `spec`
    /// §5). Returns once the initialization commands are queued;
    /// responses are handled asynchronously by the read loop.
    pub fn start(&mut self) -> Result<(), Error> {
        let snapshot: Vec<Arc<Waveform>> = self.waveforms.read().expect("waveform list lock poisoned").clone();
        self.control.initialize(&snapshot)?;

        let control = Arc::clone(&self.control);
        let waveforms = Arc::clone(&self.waveforms);
        self.control_thread = Some(
            std::thread::Builder::new()
                .name("waveform-rt-control".to_string())
                .spawn(move || {
                    if let Err(e) = control.run(&waveforms) {
                        log::error!("control connection terminated: {e}");
                    }
                })
                .expect("failed to spawn control thread"),
        );
        Ok(())
    }

    /// Blocks until the control connection terminates, mirroring the
    /// source's blocking "wait" call (`spec` §4.9).
    pub fn wait(&mut self) {
        if let Some(handle) = self.control_thread.take() {
            let _ = handle.join();
        }
    }

    /// Shuts down the control connection, tears down every active
    /// waveform's data plane, and stops the callback work-queue pool
    /// (`spec` §4.9).
    pub fn destroy(mut self) {
        self.control.shutdown();
        self.wait();

        let planes: Vec<(String, DataPlane)> =
            self.data_planes.lock().expect("data plane table lock poisoned").drain().collect();
        for (_, plane) in planes {
            plane.stop();
        }

        drop(self.control);
        drop(self.job_tx);
        for handle in self.pool {
            let _ = handle.join();
        }
    }

    /// Sends an immediate control command with no follow-up callback.
    pub fn send_command(&self, command: &str) -> Result<u32, Error> {
        self.control.send_command(command)
    }

    /// Sends an immediate control command, registering a completion
    /// callback for its `R` frame.
    pub fn send_command_with_completion(
        &self,
        command: &str,
        completion: CompletionCallback,
    ) -> Result<u32, Error> {
        self.control.send_command_with_completion(command, completion)
    }

    /// Sends a time-scheduled control command (`spec` §4.4).
    pub fn send_timed_command(&self, secs: u64, usecs: u32, command: &str) -> Result<u32, Error> {
        self.control.send_timed_command(secs, usecs, command)
    }

    /// The radio's reported API version, once its `V` frame has arrived.
    pub fn api_version(&self) -> Option<(u32, u32, u32, u32)> {
        self.control.api_version()
    }

    /// The radio's session handle, once its `H` frame has arrived.
    pub fn session_handle(&self) -> Option<u32> {
        self.control.session_handle()
    }

    /// Sends an audio packet over `short_name`'s data-plane socket, if
    /// it is currently active (`spec` §4.2/§6). Silently drops the
    /// packet, logging a warning, if the waveform has no active data
    /// plane.
    pub fn send_audio(
        &self,
        short_name: &str,
        stream_id: u32,
        information_class: u16,
        samples: Vec<(f32, f32)>,
    ) -> Result<(), Error> {
        if samples.len() > MAX_AUDIO_SAMPLE_PAIRS {
            return Err(Error::AudioPayloadTooLarge(samples.len()));
        }
        self.send_packet(short_name, VitaPacket::new_audio(stream_id, information_class, samples))
    }

    /// Sends byte-stream data over `short_name`'s data-plane socket, if
    /// it is currently active.
    pub fn send_byte_data(
        &self,
        short_name: &str,
        stream_id: u32,
        information_class: u16,
        data: Vec<u8>,
    ) -> Result<(), Error> {
        if data.len() > MAX_BYTE_PAYLOAD_LEN {
            return Err(Error::ByteDataPayloadTooLarge(data.len()));
        }
        self.send_packet(short_name, VitaPacket::new_byte(stream_id, information_class, data))
    }

    /// Flushes `short_name`'s set meter values as a single packet, if
    /// the waveform is registered and its data plane is active (`spec`
    /// §4.7).
    pub fn send_meters(&self, short_name: &str, sequence: u8) -> Result<(), Error> {
        let packet = {
            let waveforms = self.waveforms.read().expect("waveform list lock poisoned");
            let Some(wf) = waveforms.iter().find(|w| w.short_name() == short_name) else {
                return Ok(());
            };
            wf.meters_mut().send_meters(sequence)?
        };
        if let Some(packet) = packet {
            self.send_packet(short_name, packet)?;
        }
        Ok(())
    }

    fn send_packet(&self, short_name: &str, mut packet: VitaPacket) -> Result<(), Error> {
        let planes = self.data_planes.lock().expect("data plane table lock poisoned");
        match planes.get(short_name) {
            Some(plane) => plane.socket.send_to_radio(&packet.encode()),
            None => {
                log::warn!("no active data plane for waveform {short_name:?}, dropping packet");
                Ok(())
            }
        }
    }
}

fn start_data_plane(
    radio_addr: SocketAddr,
    information_class: u16,
    waveform: Arc<Waveform>,
    data_planes: Arc<Mutex<HashMap<String, DataPlane>>>,
    control: Arc<ControlConnection>,
) {
    let mut planes = data_planes.lock().expect("data plane table lock poisoned");
    if planes.contains_key(waveform.short_name()) {
        log::warn!("waveform {} already has a running data plane", waveform.short_name());
        return;
    }
    let socket = match DataSocket::bind(radio_addr) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            log::error!("failed to bind data plane socket for {}: {e}", waveform.short_name());
            return;
        }
    };

    // Tell the radio where to send this waveform's data (`spec` §4.2):
    // the per-waveform port assignment, then the client-wide default.
    let port = socket.local_port();
    if let Err(e) = control.send_command(&format!("waveform set {} udpport={port}", waveform.short_name())) {
        log::error!("failed to announce udpport for waveform {}: {e}", waveform.short_name());
    }
    if let Err(e) = control.send_command(&format!("client udpport {port}")) {
        log::error!("failed to announce client udpport: {e}");
    }

    let queue = Arc::new(WorkQueue::new());
    let running = Arc::new(AtomicBool::new(true));

    let io_socket = Arc::clone(&socket);
    let io_running = Arc::clone(&running);
    let io_waveform = Arc::clone(&waveform);
    let io_queue = Arc::clone(&queue);
    let io_thread = rt::spawn_realtime(
        &format!("waveform-rt-io-{}", waveform.short_name()),
        rt::Priority::MAX,
        move || io_socket.run(&io_running, information_class, &io_waveform, &io_queue),
    )
    .ok();

    let worker_queue = Arc::clone(&queue);
    let worker_thread = rt::spawn_realtime(
        &format!("waveform-rt-worker-{}", waveform.short_name()),
        rt::Priority::MAX.offset(8),
        move || worker_queue.run_consumer(),
    )
    .ok();

    planes.insert(
        waveform.short_name().to_string(),
        DataPlane { socket, queue, running, io_thread, worker_thread },
    );
}

fn stop_data_plane(waveform: Arc<Waveform>, data_planes: Arc<Mutex<HashMap<String, DataPlane>>>) {
    let plane = { data_planes.lock().expect("data plane table lock poisoned").remove(waveform.short_name()) };
    if let Some(plane) = plane {
        plane.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;

    fn accept_once(listener: TcpListener) {
        std::thread::spawn(move || {
            let _ = listener.accept();
        });
    }

    #[test]
    fn connects_and_destroys_cleanly_with_no_waveforms() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        accept_once(listener);
        let mut radio = Radio::new(addr, 0x1234).unwrap();
        radio.start().unwrap();
        radio.destroy();
    }

    #[test]
    fn send_audio_rejects_payload_over_the_sample_pair_limit() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        accept_once(listener);
        let radio = Radio::new(addr, 0x1234).unwrap();
        let samples = vec![(0.0f32, 0.0f32); MAX_AUDIO_SAMPLE_PAIRS + 1];
        let err = radio.send_audio("JUNK", 1, 0x1234, samples).unwrap_err();
        assert!(matches!(err, Error::AudioPayloadTooLarge(n) if n == MAX_AUDIO_SAMPLE_PAIRS + 1));
    }

    #[test]
    fn send_byte_data_rejects_payload_over_the_byte_limit() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        accept_once(listener);
        let radio = Radio::new(addr, 0x1234).unwrap();
        let data = vec![0u8; MAX_BYTE_PAYLOAD_LEN + 1];
        let err = radio.send_byte_data("JUNK", 1, 0x1234, data).unwrap_err();
        assert!(matches!(err, Error::ByteDataPayloadTooLarge(n) if n == MAX_BYTE_PAYLOAD_LEN + 1));
    }

    #[test]
    fn start_and_stop_data_plane_tracks_table() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = std::thread::spawn(move || listener.accept().unwrap().0);
        let control = Arc::new(ControlConnection::connect(addr, Box::new(|_, _| {})).unwrap());
        let _peer = accept.join().unwrap();

        let data_planes: Arc<Mutex<HashMap<String, DataPlane>>> = Arc::new(Mutex::new(HashMap::new()));
        let wf = Arc::new(Waveform::new("Junk", "JUNK", "USB", "1.0.0", Arc::new(())));
        start_data_plane(addr, 0x1234, Arc::clone(&wf), Arc::clone(&data_planes), Arc::clone(&control));
        assert!(data_planes.lock().unwrap().contains_key("JUNK"));
        stop_data_plane(Arc::clone(&wf), Arc::clone(&data_planes));
        assert!(data_planes.lock().unwrap().is_empty());
    }

    #[test]
    fn start_data_plane_announces_udpport_to_the_radio() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = std::thread::spawn(move || listener.accept().unwrap().0);
        let control = Arc::new(ControlConnection::connect(addr, Box::new(|_, _| {})).unwrap());
        let mut peer = accept.join().unwrap();

        let data_planes: Arc<Mutex<HashMap<String, DataPlane>>> = Arc::new(Mutex::new(HashMap::new()));
        let wf = Arc::new(Waveform::new("Junk", "JUNK", "USB", "1.0.0", Arc::new(())));
        start_data_plane(addr, 0x1234, Arc::clone(&wf), Arc::clone(&data_planes), Arc::clone(&control));

        let bound_port = data_planes.lock().unwrap().get("JUNK").unwrap().socket.local_port();

        let mut reader = BufReader::new(peer.try_clone().unwrap());
        let mut waveform_set_line = String::new();
        reader.read_line(&mut waveform_set_line).unwrap();
        assert_eq!(waveform_set_line, format!("C0|waveform set JUNK udpport={bound_port}\n"));
        let mut client_line = String::new();
        reader.read_line(&mut client_line).unwrap();
        assert_eq!(client_line, format!("C1|client udpport {bound_port}\n"));

        stop_data_plane(Arc::clone(&wf), Arc::clone(&data_planes));
        drop(peer);
    }
}
