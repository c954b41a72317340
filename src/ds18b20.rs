use byteorder::ByteOrder;
use byteorder::LittleEndian;
use embedded_hal::delay::DelayNs;

use crate::Error;
use crate::HardwareBus;
use crate::InvalidArgument;
use crate::OneWire;
use crate::Timing;

pub const SCRATCHPAD_LEN: usize = 9;

/// Sign bit of the MSB as this driver interprets it.
const NEGATIVE_MASK: u8 = 0x08;
const INTEGER_MSB_MASK: u8 = 0x07;
const FRACTION_BITS: u8 = 4;

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    SkipRom = 0xCC,
    Convert = 0x44,
    ReadScratchpad = 0xBE,
}

/// Conversion resolution, used only to size the conversion wait. The
/// device's configuration register is never written, so it converts at
/// whatever resolution it powers up with.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeasureResolution {
    /// 9 bits
    TC8,
    /// 10 bits
    TC4,
    /// 11 bits
    TC2,
    /// 12 bits
    TC,
}

impl MeasureResolution {
    /// Datasheet maximum conversion time.
    pub const fn time_ms(&self) -> u16 {
        match self {
            MeasureResolution::TC8 => 94,
            MeasureResolution::TC4 => 188,
            MeasureResolution::TC2 => 375,
            MeasureResolution::TC => 750,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Unit {
    Celsius,
    Fahrenheit,
}

impl TryFrom<char> for Unit {
    type Error = InvalidArgument;

    fn try_from(unit: char) -> Result<Self, Self::Error> {
        match unit {
            'C' | 'c' => Ok(Unit::Celsius),
            'F' | 'f' => Ok(Unit::Fahrenheit),
            other => Err(InvalidArgument::TemperatureUnit(other)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Temperature {
    celsius: f32,
}

impl Temperature {
    pub const fn from_celsius(celsius: f32) -> Self {
        Self { celsius }
    }

    pub const fn celsius(&self) -> f32 {
        self.celsius
    }

    pub fn fahrenheit(&self) -> f32 {
        self.celsius * 9.0 / 5.0 + 32.0
    }

    pub fn in_unit(&self, unit: Unit) -> f32 {
        match unit {
            Unit::Celsius => self.celsius(),
            Unit::Fahrenheit => self.fahrenheit(),
        }
    }
}

/// The nine bytes read back after READ SCRATCHPAD. Only the first four are
/// interpreted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Scratchpad([u8; SCRATCHPAD_LEN]);

impl Scratchpad {
    pub const fn new(bytes: [u8; SCRATCHPAD_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> &[u8; SCRATCHPAD_LEN] {
        &self.0
    }

    pub const fn lsb(&self) -> u8 {
        self.0[0]
    }

    pub const fn msb(&self) -> u8 {
        self.0[1]
    }

    pub const fn alarm_high(&self) -> u8 {
        self.0[2]
    }

    pub const fn alarm_low(&self) -> u8 {
        self.0[3]
    }

    /// LSB and MSB as one little-endian word.
    pub fn raw_temperature(&self) -> u16 {
        LittleEndian::read_u16(&self.0[0..2])
    }

    /// Readings with the sign bit set come back as 0.0 °C.
    ///
    /// The low nibble of the LSB is the fraction: every bit `i` that is
    /// *clear* adds `2^(i - 4)`. The integer part is the LSB's high nibble
    /// plus the MSB's low three bits shifted up by four.
    pub fn temperature(&self) -> Temperature {
        let (lsb, msb) = (self.lsb(), self.msb());

        if msb & NEGATIVE_MASK != 0 {
            warn!(
                "ds18b20: negative reading {=u16:#x}, reporting 0.0",
                self.raw_temperature()
            );
            return Temperature::from_celsius(0.0);
        }

        let mut fraction = 0.0_f32;
        for i in 0..FRACTION_BITS {
            if lsb & (0x01 << i) == 0 {
                fraction += 1.0 / f32::from(0x01_u8 << (FRACTION_BITS - i));
            }
        }
        let integer = u16::from(lsb >> FRACTION_BITS)
            + (u16::from(msb & INTEGER_MSB_MASK) << FRACTION_BITS);

        Temperature::from_celsius(f32::from(integer) + fraction)
    }
}

/// A DS18B20 alone on its line, addressed with SKIP ROM.
pub struct DS18B20<B, D> {
    wire: OneWire<B, D>,
}

impl<B: HardwareBus, D: DelayNs> DS18B20<B, D> {
    pub fn new(bus: B, delay: D) -> Self {
        Self::with_wire(OneWire::new(bus, delay))
    }

    pub fn with_timing(bus: B, delay: D, timing: Timing) -> Self {
        Self::with_wire(OneWire::with_timing(bus, delay, timing))
    }

    pub const fn with_wire(wire: OneWire<B, D>) -> Self {
        Self { wire }
    }

    pub fn release(self) -> OneWire<B, D> {
        self.wire
    }

    fn send(&mut self, command: Command) -> Result<(), Error<B::Error>> {
        trace!("ds18b20: command {=u8:#x}", command as u8);
        self.wire.write_byte(command as u8)
    }

    /// Reset, SKIP ROM, CONVERT. Does not wait for the conversion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hardware`] if the line fails.
    pub fn start_conversion(&mut self) -> Result<(), Error<B::Error>> {
        self.wire.reset()?;
        self.send(Command::SkipRom)?;
        self.send(Command::Convert)
    }

    /// Reset, SKIP ROM, READ SCRATCHPAD, then nine bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hardware`] if the line fails.
    pub fn read_scratchpad(&mut self) -> Result<Scratchpad, Error<B::Error>> {
        self.wire.reset()?;
        self.send(Command::SkipRom)?;
        self.send(Command::ReadScratchpad)?;
        let mut bytes = [0u8; SCRATCHPAD_LEN];
        self.wire.read_bytes(&mut bytes)?;
        debug!("ds18b20: scratchpad {=[u8]:#x}", bytes.as_slice());
        Ok(Scratchpad::new(bytes))
    }

    /// Runs a full conversion, waiting the fixed conversion time in between.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hardware`] if the line fails.
    pub fn measure(&mut self) -> Result<Temperature, Error<B::Error>> {
        self.start_conversion()?;
        let conversion_us = self.wire.timing().conversion_us;
        self.wire.delay_us(conversion_us);
        Ok(self.read_scratchpad()?.temperature())
    }

    /// Temperature in `unit`, from a full measurement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hardware`] if the line fails.
    pub fn temperature(&mut self, unit: Unit) -> Result<f32, Error<B::Error>> {
        Ok(self.measure()?.in_unit(unit))
    }

    /// Like [`DS18B20::temperature`] with the unit given as `'C'`, `'c'`,
    /// `'F'` or `'f'`. Any other character fails before the bus is touched.
    ///
    /// # Errors
    ///
    /// [`InvalidArgument::TemperatureUnit`] for an unknown unit, otherwise
    /// line errors.
    pub fn temperature_in(&mut self, unit: char) -> Result<f32, Error<B::Error>> {
        let unit = Unit::try_from(unit)?;
        self.temperature(unit)
    }
}
