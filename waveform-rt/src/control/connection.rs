// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The control-plane TCP connection (`spec` §4.5, component C5): connect
and initialization sequencing, sequence assignment, the response
queue, and the line-dispatch loop.
*/

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::control::frame::{self, Frame};
use crate::control::tokenize::{find_kwarg, find_kwarg_as_int, tokenize};
use crate::errors::Error;
use crate::slice::{self, SliceState, SliceTransition};
use crate::waveform::{CompletionCallback, QueuedCallback, StateEvent, StreamIds, Waveform};

/// A waiting command's follow-up callbacks, removed once satisfied
/// (`spec` §3).
pub struct ResponseEntry {
    completion_cb: Option<CompletionCallback>,
    queued_cb: Option<QueuedCallback>,
}

impl ResponseEntry {
    fn completion_only(cb: CompletionCallback) -> Self {
        ResponseEntry { completion_cb: Some(cb), queued_cb: None }
    }
}

/// Parses the `waveform create` response message into the six stream
/// ids (`spec` §3/§4.5). The wire grammar for this message is not
/// specified; this runtime expects `key=value` tokens named after the
/// `StreamIds` fields (documented as an invented detail in DESIGN.md).
fn parse_stream_ids(message: &str) -> Option<StreamIds> {
    let argv = tokenize(message).ok()?;
    let get = |key: &str| find_kwarg_as_int(&argv, key).map(|v| v as u32);
    Some(StreamIds {
        tx_audio_in: get("tx_audio_in"),
        tx_audio_out: get("tx_audio_out"),
        rx_audio_in: get("rx_audio_in"),
        rx_audio_out: get("rx_audio_out"),
        byte_in: get("byte_in"),
        tx_byte_out: get("tx_byte_out"),
        rx_byte_out: get("rx_byte_out"),
    })
}

/// Owns the TCP control connection: writes commands, allocates
/// sequence numbers, tracks outstanding responses, and dispatches
/// incoming frames (`spec` §4.5).
/// Invoked whenever a waveform's slice state transitions, so the
/// caller can stand up or tear down that waveform's data plane
/// (`spec` §4.6: activation/deactivation drives C2).
pub type SliceTransitionHook = dyn Fn(&Arc<Waveform>, SliceTransition) + Send + Sync;

pub struct ControlConnection {
    write_stream: Mutex<TcpStream>,
    read_stream: TcpStream,
    sequence: AtomicU32,
    responses: Mutex<HashMap<u32, ResponseEntry>>,
    on_slice_transition: Option<Box<SliceTransitionHook>>,
    api_version: Mutex<Option<(u32, u32, u32, u32)>>,
    session_handle: Mutex<Option<u32>>,
}

impl ControlConnection {
    /// Opens the control TCP connection. Connect timeout/retry policy is
    /// delegated to the transport (`std::net::TcpStream`), per `spec`
    /// §4.5 step 1. `on_slice_transition` is called whenever a waveform
    /// activates or deactivates, so the caller can start/stop that
    /// waveform's UDP data plane (`spec` §4.6).
    pub fn connect(addr: SocketAddr, on_slice_transition: Box<SliceTransitionHook>) -> Result<Self, Error> {
        let stream = TcpStream::connect(addr)?;
        let read_stream = stream.try_clone()?;
        Ok(ControlConnection {
            write_stream: Mutex::new(stream),
            read_stream,
            sequence: AtomicU32::new(0),
            responses: Mutex::new(HashMap::new()),
            on_slice_transition: Some(on_slice_transition),
            api_version: Mutex::new(None),
            session_handle: Mutex::new(None),
        })
    }

    /// The radio's reported API version `(major, minor, build, sub)`,
    /// once its `V` frame has arrived (`spec` §8 scenario S2).
    pub fn api_version(&self) -> Option<(u32, u32, u32, u32)> {
        *self.api_version.lock().expect("api_version lock poisoned")
    }

    /// The radio's session handle, once its `H` frame has arrived
    /// (`spec` §8 scenario S2).
    pub fn session_handle(&self) -> Option<u32> {
        *self.session_handle.lock().expect("session_handle lock poisoned")
    }

    /// Allocates the next 31-bit sequence number: `(prev + 1) &
    /// 0x7fffffff` (`spec` §4.5/§8 property 4). Implemented with a
    /// single atomic fetch-add, resolving the race `spec` §9 flags in
    /// the original source. `fetch_add` returns the pre-increment
    /// value, which is already `prev`, so no further increment is
    /// needed.
    pub fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::SeqCst) & 0x7FFF_FFFF
    }

    fn write_line(&self, line: &str) -> Result<(), Error> {
        let mut stream = self.write_stream.lock().expect("write stream lock poisoned");
        stream.write_all(line.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    /// Sends an immediate command with no follow-up callback
    /// (fire-and-forget).
    pub fn send_command(&self, command: &str) -> Result<u32, Error> {
        let seq = self.next_sequence();
        self.write_line(&frame::format_command(seq, command))?;
        Ok(seq)
    }

    /// Sends an immediate command, registering a completion callback to
    /// be invoked when the matching `R` frame arrives. The response
    /// entry is inserted *before* the command is transmitted (`spec`
    /// §4.5).
    pub fn send_command_with_completion(
        &self,
        command: &str,
        completion: CompletionCallback,
    ) -> Result<u32, Error> {
        let seq = self.next_sequence();
        self.responses
            .lock()
            .expect("response queue lock poisoned")
            .insert(seq, ResponseEntry::completion_only(completion));
        self.write_line(&frame::format_command(seq, command))?;
        Ok(seq)
    }

    /// Sends a time-scheduled command (`spec` §4.4).
    pub fn send_timed_command(&self, secs: u64, usecs: u32, command: &str) -> Result<u32, Error> {
        let seq = self.next_sequence();
        self.write_line(&frame::format_timed_command(seq, secs, usecs, command))?;
        Ok(seq)
    }

    /// Runs the radio's control-plane initialization sequence (`spec`
    /// §4.5 step 2): subscriptions, then per-waveform creation and
    /// meter registration. All responses are handled asynchronously by
    /// `run`'s dispatch loop as they arrive.
    pub fn initialize(&self, waveforms: &[Arc<Waveform>]) -> Result<(), Error> {
        self.send_command("sub slice all")?;
        self.send_command("sub radio all")?;
        self.send_command("sub client all")?;

        for wf in waveforms {
            let create_cmd = format!(
                "waveform create name={} mode={} underlying_mode={} version={}",
                wf.full_name(),
                wf.short_name(),
                wf.underlying_mode(),
                wf.version(),
            );
            let target = Arc::clone(wf);
            self.send_command_with_completion(
                &create_cmd,
                Box::new(move |code, message| {
                    if code != 0 {
                        log::warn!("waveform create for {} failed: {message}", target.full_name());
                        return;
                    }
                    match parse_stream_ids(message) {
                        Some(ids) => target.set_stream_ids(ids),
                        None => log::warn!("could not parse stream ids from {message:?}"),
                    }
                }),
            )?;
            self.send_command(&format!("waveform set {} tx=1", wf.short_name()))?;
            self.send_command(&format!(
                "waveform set {} rx_filter depth={}",
                wf.short_name(),
                wf.rx_filter_depth()
            ))?;
            self.send_command(&format!(
                "waveform set {} tx_filter depth={}",
                wf.short_name(),
                wf.tx_filter_depth()
            ))?;

            for meter in wf.meters().iter() {
                let (min, max) = meter.range();
                let meter_cmd = format!(
                    "meter create name={} type=WAVEFORM min={min} max={max} unit={}",
                    meter.name(),
                    meter.unit().wire_name(),
                );
                let target = Arc::clone(wf);
                let name = meter.name().to_string();
                self.send_command_with_completion(
                    &meter_cmd,
                    Box::new(move |_code, message| match message.trim().parse::<u32>() {
                        Ok(id) if id <= u16::MAX as u32 => {
                            target.meters_mut().assign_id(&name, id as u16);
                        }
                        _ => {
                            log::warn!("meter {name:?} id {message:?} did not parse, unregistering");
                            target.meters_mut().unregister(&name);
                        }
                    }),
                )?;
            }
        }
        Ok(())
    }

    /// Shuts down the underlying socket, causing `run`'s read loop to
    /// observe EOF and return (`spec` §5 cooperative shutdown).
    pub fn shutdown(&self) {
        let stream = self.write_stream.lock().expect("write stream lock poisoned");
        let _ = stream.shutdown(std::net::Shutdown::Both);
    }

    fn dispatch_status(&self, waveforms: &RwLock<Vec<Arc<Waveform>>>, body: &str) -> Result<(), Error> {
        let argv = tokenize(body)?;
        let Some(subject) = argv.first().cloned() else {
            return Ok(());
        };
        let waveforms = waveforms.read().expect("waveform list lock poisoned");

        if subject == "slice" {
            if let (Some(slice_str), mode) = (argv.get(1), find_kwarg(&argv, "mode")) {
                if mode != "absent" {
                    if let Ok(slice_num) = slice_str.parse::<u8>() {
                        for wf in waveforms.iter() {
                            let transition =
                                slice::on_slice_status(wf.active_slice(), wf.short_name(), slice_num, mode);
                            match transition {
                                SliceTransition::Activate(s) => {
                                    wf.set_active_slice(SliceState::Active(s));
                                    wf.dispatch_state(StateEvent::Active(s));
                                    if let Some(hook) = &self.on_slice_transition {
                                        hook(wf, transition);
                                    }
                                }
                                SliceTransition::Deactivate => {
                                    wf.set_active_slice(SliceState::Inactive);
                                    wf.dispatch_state(StateEvent::Inactive);
                                    if let Some(hook) = &self.on_slice_transition {
                                        hook(wf, transition);
                                    }
                                }
                                SliceTransition::None => {}
                            }
                        }
                    }
                }
            }
        } else if subject == "interlock" {
            match find_kwarg(&argv, "state") {
                "PTT_REQUESTED" => {
                    for wf in waveforms.iter() {
                        if matches!(wf.active_slice(), SliceState::Active(_)) {
                            wf.dispatch_state(StateEvent::PttRequested);
                        }
                    }
                }
                "UNKEY_REQUESTED" => {
                    for wf in waveforms.iter() {
                        if matches!(wf.active_slice(), SliceState::Active(_)) {
                            wf.dispatch_state(StateEvent::UnkeyRequested);
                        }
                    }
                }
                _ => {}
            }
        }

        for wf in waveforms.iter() {
            wf.dispatch_status(&subject, &argv[1..]);
        }
        Ok(())
    }

    fn dispatch_command(&self, waveforms: &RwLock<Vec<Arc<Waveform>>>, sequence: u32, body: &str) -> Result<(), Error> {
        let argv = tokenize(body)?;
        if argv.len() < 3 {
            log::info!("dropping malformed radio-originated command: {body:?}");
            return Ok(());
        }
        let Ok(slice_num) = argv[1].parse::<u8>() else {
            log::info!("dropping radio-originated command with unparseable slice: {body:?}");
            return Ok(());
        };
        let verb = &argv[2];
        let callback_argv = &argv[3..];

        let mut last_status = None;
        {
            let waveforms = waveforms.read().expect("waveform list lock poisoned");
            for wf in waveforms.iter() {
                if wf.active_slice() == SliceState::Active(slice_num) {
                    for status in wf.dispatch_command(verb, callback_argv) {
                        last_status = Some(status);
                    }
                }
            }
        }

        if let Some(status) = last_status {
            let hex = frame::ack_code(status);
            let response_cmd = format!("waveform response {sequence}|{hex:x}");
            self.send_command(&response_cmd)?;
        }
        Ok(())
    }

    fn dispatch_response(&self, sequence: u32, code: u32, message: &str) {
        let mut responses = self.responses.lock().expect("response queue lock poisoned");
        if let Some(mut entry) = responses.remove(&sequence) {
            if let Some(mut cb) = entry.completion_cb.take() {
                cb(code, message);
            }
        }
    }

    fn dispatch_queued_ack(&self, sequence: u32, code: u32, message: &str) {
        let mut responses = self.responses.lock().expect("response queue lock poisoned");
        let remove = if let Some(entry) = responses.get_mut(&sequence) {
            if let Some(cb) = entry.queued_cb.as_mut() {
                cb(code, message);
            }
            code != 0
        } else {
            false
        };
        if remove {
            responses.remove(&sequence);
        }
    }

    /// Runs the read loop: accumulates bytes, drains complete lines,
    /// and dispatches each one (`spec` §4.5 step 3). Returns once the
    /// connection hits EOF, a read error, or `shutdown` is called.
    pub fn run(&self, waveforms: &RwLock<Vec<Arc<Waveform>>>) -> Result<(), Error> {
        let reader_stream = self.read_stream.try_clone()?;
        let mut reader = BufReader::new(reader_stream);
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                return Ok(()); // EOF: peer closed or we shut down.
            }
            match frame::parse_line(&line) {
                Ok(Frame::Version { major, minor, build, sub }) => {
                    log::info!("radio API version {major}.{minor}.{build}.{sub}");
                    *self.api_version.lock().expect("api_version lock poisoned") =
                        Some((major, minor, build, sub));
                }
                Ok(Frame::Handle(handle)) => {
                    log::info!("radio session handle {handle:#010x}");
                    *self.session_handle.lock().expect("session_handle lock poisoned") = Some(handle);
                }
                Ok(Frame::Log(message)) => {
                    log::info!("radio: {message}");
                }
                Ok(Frame::Status { body, .. }) => {
                    if let Err(e) = self.dispatch_status(waveforms, &body) {
                        log::info!("dropping malformed status {body:?}: {e}");
                    }
                }
                Ok(Frame::Response { sequence, code, message }) => {
                    self.dispatch_response(sequence, code, &message);
                }
                Ok(Frame::QueuedAck { sequence, code, message }) => {
                    self.dispatch_queued_ack(sequence, code, &message);
                }
                Ok(Frame::Command { sequence, body }) => {
                    if let Err(e) = self.dispatch_command(waveforms, sequence, &body) {
                        log::info!("dropping malformed radio command {body:?}: {e}");
                    }
                }
                Err(e) => {
                    log::info!("dropping unparseable control line {line:?}: {e}");
                }
            }
        }
    }
}
