// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Meter registry (`spec` §4.7, component C7): named meters bound to
radio-assigned ids, fixed-point encoding, and coalesced emission as a
single VITA-49 extension packet.
*/

use crate::errors::Error;
use crate::wire::{MeterSlot, Payload, VitaPacket};

/// Maximum `{id, value}` slots in one meter packet (`spec` §4.7).
pub const MAX_METER_SLOTS: usize = crate::wire::payload::MAX_METER_SLOTS;

/// The stream id meter packets carry. `spec` §4.7/§6 name this
/// `METER_STREAM_ID` but never give its literal value; this runtime
/// assigns it `0x0000_0001` (see DESIGN.md's open-question resolution).
pub const METER_STREAM_ID: u32 = 0x0000_0001;

/// Sentinel meter value meaning "unset" (`spec` §3).
const UNSET: i32 = -1;

/// Measurement unit a meter reports in, each with a fixed encoding
/// radix and a clamped value range (`spec` §4.7).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Unit {
    /// Decibels.
    Db,
    /// Decibels relative to 1 milliwatt.
    Dbm,
    /// Decibels relative to full scale.
    Dbfs,
    /// Standing wave ratio.
    Swr,
    /// Volts.
    Volts,
    /// Amps.
    Amps,
    /// Degrees Fahrenheit.
    TempF,
    /// Degrees Celsius.
    TempC,
    /// Revolutions per minute.
    Rpm,
    /// Watts.
    Watts,
    /// Percent.
    Percent,
    /// No unit.
    None,
}

impl Unit {
    /// The fixed-point encoding radix for this unit (`spec` §4.7).
    pub fn radix(self) -> u32 {
        match self {
            Unit::Db | Unit::Dbm | Unit::Dbfs | Unit::Swr => 7,
            Unit::Volts | Unit::Amps => 8,
            Unit::TempF | Unit::TempC => 6,
            Unit::Rpm | Unit::Watts | Unit::Percent | Unit::None => 0,
        }
    }

    /// The wire name this unit is sent to the radio as (`meter create
    /// ... unit=<UNIT>`, `spec` §4.7).
    pub fn wire_name(self) -> &'static str {
        match self {
            Unit::Db => "DB",
            Unit::Dbm => "DBM",
            Unit::Dbfs => "DBFS",
            Unit::Swr => "SWR",
            Unit::Volts => "VOLTS",
            Unit::Amps => "AMPS",
            Unit::TempF => "TEMP_F",
            Unit::TempC => "TEMP_C",
            Unit::Rpm => "RPM",
            Unit::Watts => "WATTS",
            Unit::Percent => "PERCENT",
            Unit::None => "NONE",
        }
    }
}

/// A named meter bound to a radio-assigned id (`spec` §3).
pub struct Meter {
    name: String,
    min: f64,
    max: f64,
    unit: Unit,
    id: Option<u16>,
    value: i32,
}

impl Meter {
    fn new(name: String, min: f64, max: f64, unit: Unit) -> Self {
        Meter { name, min, max, unit, id: None, value: UNSET }
    }

    /// The meter's name.
    pub fn name(&self) -> &str {
        &self.name
    }
    /// The meter's configured range.
    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }
    /// The meter's unit.
    pub fn unit(&self) -> Unit {
        self.unit
    }
    /// The radio-assigned id, once known.
    pub fn id(&self) -> Option<u16> {
        self.id
    }
    /// Whether this meter currently holds a value.
    pub fn is_set(&self) -> bool {
        self.value != UNSET
    }

    /// Encodes `value` to this meter's fixed-point representation,
    /// validating range and finiteness first (`spec` §4.7/§8 properties
    /// 6-7). On success, stores the encoded value.
    pub fn set_value(&mut self, value: f64) -> Result<(), Error> {
        if !value.is_finite() {
            return Err(Error::MeterValueNotFinite(value));
        }
        if value < self.min || value > self.max {
            return Err(Error::MeterValueOutOfRange { value, min: self.min, max: self.max });
        }
        let scaled = (value * 2f64.powi(self.unit.radix() as i32)).round();
        // Two's-complement truncation to i16, not saturation (`spec` §4.7/§8
        // property 6): a float-to-i16 cast in Rust saturates, so truncate
        // through an integer type first to get real wraparound.
        self.value = (scaled as i64 as i16) as i32;
        Ok(())
    }

    /// Sets the meter's raw (already fixed-point) integer value,
    /// clamped to `i16` range.
    pub fn set_raw_value(&mut self, value: i32) {
        self.value = value.clamp(i16::MIN as i32, i16::MAX as i32);
    }

    fn take_slot(&mut self) -> Option<MeterSlot> {
        if self.value == UNSET {
            return None;
        }
        let id = self.id?;
        let value = self.value as i16;
        self.value = UNSET;
        Some(MeterSlot { id, value })
    }
}

/// A waveform's meter table (`spec` §4.7).
#[derive(Default)]
pub struct MeterRegistry {
    meters: Vec<Meter>,
}

impl MeterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        MeterRegistry::default()
    }

    /// Registers a new meter. A duplicate name is a no-op, logged as an
    /// error (`spec` §4.7).
    pub fn register(&mut self, name: impl Into<String>, min: f64, max: f64, unit: Unit) {
        let name = name.into();
        if self.meters.iter().any(|m| m.name == name) {
            log::error!("meter {name:?} already registered, ignoring");
            return;
        }
        self.meters.push(Meter::new(name, min, max, unit));
    }

    /// Iterates all registered meters.
    pub fn iter(&self) -> impl Iterator<Item = &Meter> {
        self.meters.iter()
    }

    /// Finds a meter by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Meter> {
        self.meters.iter_mut().find(|m| m.name == name)
    }

    /// Records the id the radio assigned a meter in response to its
    /// `meter create` command. A parse failure upstream should instead
    /// call [`MeterRegistry::unregister`] (`spec` §4.7).
    pub fn assign_id(&mut self, name: &str, id: u16) {
        if let Some(meter) = self.get_mut(name) {
            meter.id = Some(id);
        }
    }

    /// Removes a meter (used when the radio's id assignment fails to
    /// parse, `spec` §4.7).
    pub fn unregister(&mut self, name: &str) {
        self.meters.retain(|m| m.name != name);
    }

    /// Builds one without-timestamp VITA-49 extension packet carrying
    /// every set meter's current value, resetting each to unset as it's
    /// collected (`spec` §4.7). The meter-count guard uses `>=` per
    /// `spec` §9's resolved open question, so exactly `MAX_METER_SLOTS`
    /// pending values is already a [`Error::TooManyMeterSlots`].
    pub fn send_meters(&mut self, sequence: u8) -> Result<Option<VitaPacket>, Error> {
        let pending = self.meters.iter().filter(|m| m.is_set() && m.id.is_some()).count();
        if pending >= MAX_METER_SLOTS {
            return Err(Error::TooManyMeterSlots(pending, MAX_METER_SLOTS));
        }
        if pending == 0 {
            return Ok(None);
        }
        let mut slots = Vec::with_capacity(pending);
        for meter in self.meters.iter_mut() {
            if let Some(slot) = meter.take_slot() {
                slots.push(slot);
            }
        }
        let mut packet = VitaPacket::new_meter(METER_STREAM_ID, Payload::Meter(slots));
        packet.set_sequence(sequence & 0b1111);
        Ok(Some(packet))
    }
}
