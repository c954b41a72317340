//! Simulated hardware for tests: a OneWire line sharing a virtual clock with
//! its delay, and a scripted ADC.

use core::cell::RefCell;
use core::convert::Infallible;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;

use crate::adc::AnalogInput;
use crate::line::HardwareBus;

/// Low pulses at least this long reset the device.
const RESET_THRESHOLD_US: u64 = 480;
/// Low pulses at least this long are a written `0`.
const ZERO_THRESHOLD_US: u64 = 15;
const READ_SCRATCHPAD: u8 = 0xBE;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Event {
    Output,
    Input,
    Write(PinState),
    Read(PinState),
}

#[derive(Default)]
struct Wire {
    now_us: u64,
    output: bool,
    low_since: Option<u64>,
    events: Vec<Event>,
    delays: Vec<u32>,
    resets: usize,
    received_bits: Vec<bool>,
    received_bytes: Vec<u8>,
    shift: u8,
    shift_len: u8,
    answer: VecDeque<bool>,
    slot: Option<bool>,
    scratchpad: Option<[u8; 9]>,
}

impl Wire {
    fn release(&mut self) {
        let Some(since) = self.low_since.take() else {
            return;
        };
        let low_us = self.now_us - since;
        if low_us >= RESET_THRESHOLD_US {
            self.resets += 1;
            self.shift = 0;
            self.shift_len = 0;
            self.answer.clear();
        } else if !self.answer.is_empty() {
            self.slot = self.answer.pop_front();
        } else {
            self.receive(low_us < ZERO_THRESHOLD_US);
        }
    }

    fn receive(&mut self, bit: bool) {
        self.received_bits.push(bit);
        if bit {
            self.shift |= 0x01 << self.shift_len;
        }
        self.shift_len += 1;
        if self.shift_len == 8 {
            let byte = self.shift;
            self.shift = 0;
            self.shift_len = 0;
            self.received_bytes.push(byte);
            if byte == READ_SCRATCHPAD {
                if let Some(scratchpad) = self.scratchpad {
                    self.answer.extend(bits_of(&scratchpad));
                }
            }
        }
    }
}

fn bits_of(bytes: &[u8]) -> impl Iterator<Item = bool> + '_ {
    bytes
        .iter()
        .flat_map(|byte| (0..8).map(move |i| (byte >> i) & 0x01 == 0x01))
}

/// A OneWire line with a single simulated device on it.
///
/// The device decodes write slots from the length of each low pulse on the
/// virtual clock, answers read slots from its queued bits, and idles high.
#[derive(Clone, Default)]
pub struct SimBus(Rc<RefCell<Wire>>);

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that answers READ SCRATCHPAD with `scratchpad`.
    pub fn ds18b20(scratchpad: [u8; 9]) -> Self {
        let sim = Self::new();
        sim.0.borrow_mut().scratchpad = Some(scratchpad);
        sim
    }

    pub fn line(&self) -> SimLine {
        SimLine(self.clone())
    }

    pub fn clock(&self) -> SimClock {
        SimClock(self.clone())
    }

    /// Queue bits for the next read slots.
    pub fn respond_with(&self, bits: &[bool]) {
        self.0.borrow_mut().answer.extend(bits.iter().copied());
    }

    /// Answer the next read slots with every bit written so far.
    pub fn loop_back(&self) {
        let mut wire = self.0.borrow_mut();
        let bits = core::mem::take(&mut wire.received_bits);
        wire.received_bytes.clear();
        wire.answer.extend(bits);
    }

    pub fn delays(&self) -> Vec<u32> {
        self.0.borrow().delays.clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().events.clone()
    }

    pub fn received_bits(&self) -> Vec<bool> {
        self.0.borrow().received_bits.clone()
    }

    pub fn received_bytes(&self) -> Vec<u8> {
        self.0.borrow().received_bytes.clone()
    }

    pub fn resets(&self) -> usize {
        self.0.borrow().resets
    }

    pub fn elapsed_us(&self) -> u64 {
        self.0.borrow().now_us
    }
}

pub struct SimLine(SimBus);

impl HardwareBus for SimLine {
    type Error = Infallible;

    fn set_input(&mut self) -> Result<(), Infallible> {
        let mut wire = self.0.0.borrow_mut();
        wire.events.push(Event::Input);
        wire.output = false;
        wire.release();
        Ok(())
    }

    fn set_output(&mut self) -> Result<(), Infallible> {
        let mut wire = self.0.0.borrow_mut();
        wire.events.push(Event::Output);
        wire.output = true;
        Ok(())
    }

    fn write(&mut self, level: PinState) -> Result<(), Infallible> {
        let mut wire = self.0.0.borrow_mut();
        wire.events.push(Event::Write(level));
        match level {
            PinState::Low if wire.output && wire.low_since.is_none() => {
                wire.low_since = Some(wire.now_us);
            }
            PinState::Low => {}
            PinState::High => wire.release(),
        }
        Ok(())
    }

    fn read(&mut self) -> Result<PinState, Infallible> {
        let mut wire = self.0.0.borrow_mut();
        let level = match wire.slot.take() {
            Some(false) => PinState::Low,
            _ => PinState::High,
        };
        wire.events.push(Event::Read(level));
        Ok(level)
    }
}

/// Virtual clock. Records every microsecond delay it is asked for.
pub struct SimClock(SimBus);

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.0.0.borrow_mut().now_us += u64::from(ns.div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        let mut wire = self.0.0.borrow_mut();
        wire.delays.push(us);
        wire.now_us += u64::from(us);
    }
}

/// Converter returning queued results, then repeating the last one.
#[derive(Debug, Default)]
pub struct SimAdc {
    pub results: VecDeque<u16>,
    pub last: u16,
    pub channel: Option<u8>,
    pub starts: usize,
    pub reads: usize,
}

impl SimAdc {
    pub fn constant(value: u16) -> Self {
        Self {
            last: value,
            ..Self::default()
        }
    }

    pub fn sequence(values: &[u16]) -> Self {
        Self {
            results: values.iter().copied().collect(),
            ..Self::default()
        }
    }
}

impl AnalogInput for SimAdc {
    type Error = Infallible;

    fn select_channel(&mut self, channel: u8) -> Result<(), Infallible> {
        self.channel = Some(channel);
        Ok(())
    }

    fn start(&mut self) -> Result<(), Infallible> {
        self.starts += 1;
        Ok(())
    }

    fn result(&mut self) -> Result<u16, Infallible> {
        self.reads += 1;
        if let Some(value) = self.results.pop_front() {
            self.last = value;
        }
        Ok(self.last)
    }
}
