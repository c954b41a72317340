#![cfg_attr(not(test), no_std)]
#![crate_name = "poolguy_sensors"]

//! Water temperature and pH acquisition.
//!
//! Temperature comes from a DS18B20 on a bit-banged OneWire line with one
//! device on it. pH comes from an E201C probe sampled through an averaging
//! ADC path and linearised with a two-point calibration. The two stacks
//! share no state.
//!
//! ```no_run
//! use poolguy_sensors::{
//!     AnalogSampler, BusyWait, DS18B20, E201c, PinHandle, PortGroup, PortLine, Samd21Adc, Unit,
//! };
//!
//! let clock = BusyWait::new(48_000_000);
//!
//! let line = unsafe { PortLine::new(PinHandle::pin(PortGroup::A, 16)) };
//! let mut thermometer = DS18B20::new(line, clock);
//!
//! let mut adc = unsafe { Samd21Adc::new() };
//! adc.init();
//! let mut probe = E201c::new(AnalogSampler::new(adc, clock), 3.3, 1023, 4.0, 9.18, 0x07)?;
//!
//! let _water_c = thermometer.temperature(Unit::Celsius)?;
//! let _water_ph = probe.sensor_ph()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[macro_use]
mod fmt;

pub mod adc;
pub mod delay;
pub mod ds18b20;
pub mod line;
pub mod ph;
pub mod port;
pub mod timing;

#[cfg(test)]
mod sim;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;

pub use adc::{AnalogInput, AnalogSampler, Samd21Adc};
pub use delay::BusyWait;
pub use ds18b20::{DS18B20, MeasureResolution, Scratchpad, Temperature, Unit};
pub use line::{HardwareBus, OpenDrainLine};
pub use ph::{CalibrationPoint, CalibrationProfile, E201c, ReferencePoint};
pub use port::{PinHandle, PortGroup, PortLine};
pub use timing::Timing;

/// A caller contract violation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InvalidArgument {
    /// Temperature unit other than `C`, `c`, `F` or `f`
    TemperatureUnit(char),
    /// Averaging over zero samples
    SampleCount,
    /// Both calibration points share the same volume reference
    CalibrationVolumes,
    /// A calibration pH or volume reference that is NaN or infinite, or two
    /// points too far apart to give a finite slope
    CalibrationReference,
    /// ADC full-scale value of zero
    SensorMaxValue,
}

/// Failure of a bus or converter operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The pin or converter behind the driver failed
    Hardware(E),
    /// The call was rejected before touching the hardware
    InvalidArgument(InvalidArgument),
}

impl<E> From<InvalidArgument> for Error<E> {
    fn from(value: InvalidArgument) -> Self {
        Error::InvalidArgument(value)
    }
}

impl core::fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InvalidArgument::TemperatureUnit(unit) => {
                write!(f, "unknown temperature unit {unit:?}")
            }
            InvalidArgument::SampleCount => f.write_str("sample count must be at least 1"),
            InvalidArgument::CalibrationVolumes => {
                f.write_str("calibration points need different volume references")
            }
            InvalidArgument::CalibrationReference => {
                f.write_str("calibration references must be finite numbers")
            }
            InvalidArgument::SensorMaxValue => f.write_str("sensor max value must not be 0"),
        }
    }
}

impl core::error::Error for InvalidArgument {}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Hardware(e) => write!(f, "hardware error: {e:?}"),
            Error::InvalidArgument(e) => write!(f, "invalid argument: {e}"),
        }
    }
}

impl<E: core::fmt::Debug> core::error::Error for Error<E> {}

/// Master side of a OneWire line with exactly one device on it.
///
/// Every bit is one time slot, timed by busy-waiting on `D`. Each slot runs
/// inside a critical section, an interrupt in the middle of one would
/// corrupt it.
pub struct OneWire<B, D> {
    bus: B,
    delay: D,
    timing: Timing,
}

impl<B: HardwareBus, D: DelayNs> OneWire<B, D> {
    pub fn new(bus: B, delay: D) -> Self {
        Self::with_timing(bus, delay, Timing::default())
    }

    pub const fn with_timing(bus: B, delay: D, timing: Timing) -> Self {
        Self { bus, delay, timing }
    }

    pub const fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    /// Holds the line low for the reset window, then releases it for the
    /// presence window. The presence pulse is not sampled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hardware`] if the line fails.
    pub fn reset(&mut self) -> Result<(), Error<B::Error>> {
        trace!("onewire: reset");
        self.init_slot()?;
        self.delay.delay_us(self.timing.reset_us);
        self.bus.set_input().map_err(Error::Hardware)?;
        self.delay.delay_us(self.timing.presence_us);
        Ok(())
    }

    /// Drives the line low as output, the start of every slot.
    fn init_slot(&mut self) -> Result<(), Error<B::Error>> {
        self.bus.set_output().map_err(Error::Hardware)?;
        self.bus.write(PinState::Low).map_err(Error::Hardware)
    }

    /// Sends one bit in a single time slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hardware`] if the line fails.
    pub fn write_bit(&mut self, bit: bool) -> Result<(), Error<B::Error>> {
        let (low_us, high_us) = if bit {
            (self.timing.write_one_low_us, self.timing.slot_us)
        } else {
            (self.timing.write_zero_low_us, self.timing.recovery_us)
        };
        critical_section::with(|_| -> Result<(), Error<B::Error>> {
            self.init_slot()?;
            self.delay.delay_us(low_us);
            self.bus.set_input().map_err(Error::Hardware)?;
            self.delay.delay_us(high_us);
            Ok(())
        })
    }

    /// Receives one bit in a single time slot, sampled after the read window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hardware`] if the line fails.
    pub fn read_bit(&mut self) -> Result<bool, Error<B::Error>> {
        critical_section::with(|_| -> Result<bool, Error<B::Error>> {
            self.init_slot()?;
            self.delay.delay_us(self.timing.read_init_us);
            self.bus.set_input().map_err(Error::Hardware)?;
            self.delay.delay_us(self.timing.read_sample_us);
            let level = self.bus.read().map_err(Error::Hardware)?;
            self.delay.delay_us(self.timing.read_tail_us());
            Ok(level == PinState::High)
        })
    }

    /// Sends `byte` least significant bit first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hardware`] if the line fails.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error<B::Error>> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 0x01 == 0x01)?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Stops at the first byte the line fails on.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error<B::Error>> {
        for byte in bytes {
            self.write_byte(*byte)?;
        }
        Ok(())
    }

    /// Receives a byte, least significant bit first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hardware`] if the line fails.
    pub fn read_byte(&mut self) -> Result<u8, Error<B::Error>> {
        let mut byte = 0_u8;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 0x01 << i;
            }
        }
        Ok(byte)
    }

    /// Fills `dst` with consecutive bytes.
    ///
    /// # Errors
    ///
    /// Stops at the first byte the line fails on.
    pub fn read_bytes(&mut self, dst: &mut [u8]) -> Result<(), Error<B::Error>> {
        for byte in dst.iter_mut() {
            *byte = self.read_byte()?;
        }
        Ok(())
    }

    /// Busy-waits on the line's delay without touching the line.
    pub fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}
