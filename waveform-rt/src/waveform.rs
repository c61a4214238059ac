// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
A single configured mode on a radio (`spec` §3/§4.9, component C9):
name/version metadata, learned stream ids, the meter table, and the
callback lists user code registers against.
*/

use std::any::Any;
use std::sync::{Arc, RwLock};

use crate::meter::MeterRegistry;
use crate::slice::SliceState;
use crate::wire::VitaPacket;

/// Default RX/TX filter depth (`spec` §3).
pub const DEFAULT_FILTER_DEPTH: u32 = 8;

/// Opaque, user-supplied value associated with a waveform or a single
/// callback registration. Rust closures capture what they need directly,
/// so this exists for API parity with `spec` §3's "user-opaque context
/// pointer" rather than being threaded through every callback call.
pub type UserContext = Arc<dyn Any + Send + Sync>;

/// A state transition delivered to state callbacks (`spec` §4.6).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum StateEvent {
    /// The waveform became active on the given slice.
    Active(u8),
    /// The waveform became inactive.
    Inactive,
    /// The radio's interlock requested PTT; stop emitting RX packets
    /// before returning from this callback.
    PttRequested,
    /// The radio's interlock requested unkey.
    UnkeyRequested,
}

/// Which logical data stream a data callback is registered against
/// (`spec` §3/§4.2).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DataStream {
    /// Received audio samples.
    RxAudio,
    /// Audio samples to transmit.
    TxAudio,
    /// Received byte-stream data.
    RxByte,
    /// Byte-stream data to transmit.
    TxByte,
    /// Anything that didn't classify as audio or byte.
    Unknown,
}

/// Status callback: invoked with the status subject and its tokenized
/// body (`spec` §4.5).
pub type StatusCallback = Box<dyn Fn(&str, &[String]) + Send + Sync>;
/// State callback: invoked on slice activation/deactivation and
/// PTT/unkey interlock transitions (`spec` §4.6).
pub type StateCallback = Box<dyn Fn(StateEvent) + Send + Sync>;
/// Command callback: invoked for a radio-originated command whose verb
/// matches the registration key; the return value becomes the ack code
/// sent back to the radio (`spec` §4.5).
pub type CommandCallback = Box<dyn Fn(&[String]) -> i32 + Send + Sync>;
/// Data callback: invoked with a classified data packet (`spec` §4.2).
pub type DataCallback = Box<dyn Fn(&VitaPacket) + Send + Sync>;
/// Completion callback for a command response: invoked once with the
/// final `R` frame's code and message (`spec` §4.5).
pub type CompletionCallback = Box<dyn FnMut(u32, &str) + Send>;
/// Queued-acknowledgement callback: invoked on a `Q` frame (`spec` §4.5).
pub type QueuedCallback = Box<dyn FnMut(u32, &str) + Send>;

/// The tagged callback kinds a waveform can hold (`spec` §9 REDESIGN
/// FLAGS: a sum type replacing the source's implicit function-pointer
/// union). `Response`/`Queued` callbacks are one-shot and live on the
/// control connection's response queue instead of here — see
/// `control::connection::ResponseEntry`.
pub enum CallbackKind {
    /// See [`StatusCallback`].
    Status(StatusCallback),
    /// See [`StateCallback`].
    State(StateCallback),
    /// See [`CommandCallback`].
    Command(CommandCallback),
    /// See [`DataCallback`], tagged with which stream it watches.
    Data(DataStream, DataCallback),
}

/// One registered callback: its kind, an optional lookup key (status
/// subject or command verb; unused for state/data callbacks), and the
/// opaque context supplied at registration (`spec` §3).
pub struct CallbackEntry {
    /// The callback itself.
    pub kind: CallbackKind,
    /// Status subject / command verb this entry matches, if applicable.
    pub key: Option<String>,
    /// Opaque value supplied when this callback was registered.
    pub context: UserContext,
}

/// The six stream ids a waveform learns from the radio's `waveform
/// create` response (`spec` §3). The byte-stream fields follow `spec`
/// §9's resolution of the outgoing-selection open question, which only
/// makes sense if the outgoing id is chosen per-direction; see
/// DESIGN.md for the discrepancy with §3's literal "six" count.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct StreamIds {
    /// Incoming TX audio stream id (odd low bit).
    pub tx_audio_in: Option<u32>,
    /// Outgoing TX audio stream id.
    pub tx_audio_out: Option<u32>,
    /// Incoming RX audio stream id (even low bit).
    pub rx_audio_in: Option<u32>,
    /// Outgoing RX audio stream id.
    pub rx_audio_out: Option<u32>,
    /// Incoming byte-stream id (direction determined by classification).
    pub byte_in: Option<u32>,
    /// Outgoing byte-stream id used when sending as transmitted data.
    pub tx_byte_out: Option<u32>,
    /// Outgoing byte-stream id used when sending as received data.
    pub rx_byte_out: Option<u32>,
}

impl StreamIds {
    /// Selects the outgoing byte-stream id for the given direction
    /// (`spec` §9's resolved open question): `is_transmit` selects
    /// `tx_byte_out`, otherwise `rx_byte_out`.
    pub fn outgoing_byte_stream_id(&self, is_transmit: bool) -> Option<u32> {
        if is_transmit {
            self.tx_byte_out
        } else {
            self.rx_byte_out
        }
    }
}

/// A configured mode on a radio (`spec` §3).
pub struct Waveform {
    full_name: String,
    short_name: String,
    underlying_mode: String,
    version: String,
    rx_filter_depth: u32,
    tx_filter_depth: u32,
    active_slice: RwLock<SliceState>,
    stream_ids: RwLock<StreamIds>,
    meters: RwLock<MeterRegistry>,
    callbacks: RwLock<Vec<CallbackEntry>>,
    context: UserContext,
}

impl Waveform {
    /// Creates a new, inactive waveform. `short_name` must be at most 4
    /// characters (`spec` §3); longer names are truncated and a warning
    /// is logged, rather than failing construction, since this is a
    /// caller-contract detail and not a wire-level invariant.
    pub fn new(
        full_name: impl Into<String>,
        short_name: impl Into<String>,
        underlying_mode: impl Into<String>,
        version: impl Into<String>,
        context: UserContext,
    ) -> Self {
        let mut short_name = short_name.into();
        if short_name.len() > 4 {
            log::warn!("waveform short name {short_name:?} exceeds 4 characters, truncating");
            short_name.truncate(4);
        }
        Waveform {
            full_name: full_name.into(),
            short_name,
            underlying_mode: underlying_mode.into(),
            version: version.into(),
            rx_filter_depth: DEFAULT_FILTER_DEPTH,
            tx_filter_depth: DEFAULT_FILTER_DEPTH,
            active_slice: RwLock::new(SliceState::Inactive),
            stream_ids: RwLock::new(StreamIds::default()),
            meters: RwLock::new(MeterRegistry::new()),
            callbacks: RwLock::new(Vec::new()),
            context,
        }
    }

    /// The waveform's full name.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
    /// The waveform's short name (≤4 characters).
    pub fn short_name(&self) -> &str {
        &self.short_name
    }
    /// The radio's underlying base mode this waveform sits on top of.
    pub fn underlying_mode(&self) -> &str {
        &self.underlying_mode
    }
    /// The waveform's version string.
    pub fn version(&self) -> &str {
        &self.version
    }
    /// The configured RX filter depth.
    pub fn rx_filter_depth(&self) -> u32 {
        self.rx_filter_depth
    }
    /// The configured TX filter depth.
    pub fn tx_filter_depth(&self) -> u32 {
        self.tx_filter_depth
    }
    /// Overrides the RX filter depth. Must be called before `start`.
    pub fn set_rx_filter_depth(&mut self, depth: u32) {
        self.rx_filter_depth = depth;
    }
    /// Overrides the TX filter depth. Must be called before `start`.
    pub fn set_tx_filter_depth(&mut self, depth: u32) {
        self.tx_filter_depth = depth;
    }
    /// The opaque context supplied at construction.
    pub fn context(&self) -> &UserContext {
        &self.context
    }

    /// The currently active slice, if any.
    pub fn active_slice(&self) -> SliceState {
        *self.active_slice.read().expect("active_slice lock poisoned")
    }

    /// Replaces the active-slice state. Used by `slice.rs`'s transition
    /// logic; not part of the public registration surface.
    pub(crate) fn set_active_slice(&self, state: SliceState) {
        *self.active_slice.write().expect("active_slice lock poisoned") = state;
    }

    /// A snapshot of the learned stream ids.
    pub fn stream_ids(&self) -> StreamIds {
        *self.stream_ids.read().expect("stream_ids lock poisoned")
    }

    /// Overwrites the learned stream ids (called once the `waveform
    /// create` response arrives, `spec` §4.5).
    pub(crate) fn set_stream_ids(&self, ids: StreamIds) {
        *self.stream_ids.write().expect("stream_ids lock poisoned") = ids;
    }

    /// Read access to the meter registry.
    pub fn meters(&self) -> std::sync::RwLockReadGuard<'_, MeterRegistry> {
        self.meters.read().expect("meters lock poisoned")
    }
    /// Write access to the meter registry.
    pub fn meters_mut(&self) -> std::sync::RwLockWriteGuard<'_, MeterRegistry> {
        self.meters.write().expect("meters lock poisoned")
    }

    /// Registers a callback. Append-only while the control loop is
    /// running is the documented contract (`spec` §4.9); registering
    /// after `Radio::start` is accepted but its interaction with an
    /// in-flight dispatch is undefined, per `spec` §7's "startup
    /// ordering" clause.
    pub fn register_callback(&self, entry: CallbackEntry) {
        self.callbacks.write().expect("callbacks lock poisoned").push(entry);
    }

    /// Invokes every status callback whose key equals `subject`, in
    /// registration order (`spec` §4.5).
    pub fn dispatch_status(&self, subject: &str, argv: &[String]) {
        let callbacks = self.callbacks.read().expect("callbacks lock poisoned");
        for entry in callbacks.iter() {
            if let CallbackKind::Status(cb) = &entry.kind {
                if entry.key.as_deref() == Some(subject) {
                    cb(subject, argv);
                }
            }
        }
    }

    /// Invokes every state callback, in registration order.
    pub fn dispatch_state(&self, event: StateEvent) {
        let callbacks = self.callbacks.read().expect("callbacks lock poisoned");
        for entry in callbacks.iter() {
            if let CallbackKind::State(cb) = &entry.kind {
                cb(event);
            }
        }
    }

    /// Invokes every command callback whose key equals `verb`, in
    /// registration order, collecting their return codes (`spec` §4.5:
    /// "finds all command callbacks whose name equals the verb").
    pub fn dispatch_command(&self, verb: &str, argv: &[String]) -> Vec<i32> {
        let callbacks = self.callbacks.read().expect("callbacks lock poisoned");
        let mut results = Vec::new();
        for entry in callbacks.iter() {
            if let CallbackKind::Command(cb) = &entry.kind {
                if entry.key.as_deref() == Some(verb) {
                    results.push(cb(argv));
                }
            }
        }
        results
    }

    /// Invokes every data callback registered for `stream`, in
    /// registration order.
    pub fn dispatch_data(&self, stream: DataStream, packet: &VitaPacket) {
        let callbacks = self.callbacks.read().expect("callbacks lock poisoned");
        for entry in callbacks.iter() {
            if let CallbackKind::Data(s, cb) = &entry.kind {
                if *s == stream {
                    cb(packet);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> UserContext {
        Arc::new(())
    }

    #[test]
    fn short_name_truncates_past_four_chars() {
        let wf = Waveform::new("Junk Waveform", "TOOLONG", "USB", "1.0.0", ctx());
        assert_eq!(wf.short_name(), "TOOL");
    }

    #[test]
    fn filter_depths_default_to_eight() {
        let wf = Waveform::new("Junk Waveform", "JUNK", "USB", "1.0.0", ctx());
        assert_eq!(wf.rx_filter_depth(), 8);
        assert_eq!(wf.tx_filter_depth(), 8);
    }

    #[test]
    fn status_callbacks_with_same_key_fire_in_order() {
        let wf = Waveform::new("Junk Waveform", "JUNK", "USB", "1.0.0", ctx());
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            wf.register_callback(CallbackEntry {
                kind: CallbackKind::Status(Box::new(move |_subject, _argv| {
                    order.lock().unwrap().push(i);
                })),
                key: Some("slice".to_string()),
                context: ctx(),
            });
        }
        wf.dispatch_status("slice", &[]);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn command_callbacks_only_fire_for_matching_verb() {
        let wf = Waveform::new("Junk Waveform", "JUNK", "USB", "1.0.0", ctx());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        wf.register_callback(CallbackEntry {
            kind: CallbackKind::Command(Box::new(move |_argv| {
                calls2.fetch_add(1, Ordering::SeqCst);
                0
            })),
            key: Some("set".to_string()),
            context: ctx(),
        });
        wf.dispatch_command("get", &[]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        wf.dispatch_command("set", &[]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn outgoing_byte_stream_id_selects_by_direction() {
        let mut ids = StreamIds::default();
        ids.tx_byte_out = Some(10);
        ids.rx_byte_out = Some(20);
        assert_eq!(ids.outgoing_byte_stream_id(true), Some(10));
        assert_eq!(ids.outgoing_byte_stream_id(false), Some(20));
    }
}
