//! Averaged analog acquisition.

use core::convert::Infallible;
use core::ptr::{read_volatile, write_volatile};

use embedded_hal::delay::DelayNs;

use crate::Error;
use crate::InvalidArgument;

/// Inter-sample settle time, about 100 cycles of a 48 MHz core.
pub const DEFAULT_SETTLE_NS: u32 = 2_000;

/// An analog-to-digital converter running in free-running mode.
pub trait AnalogInput {
    type Error;

    /// Routes `channel` to the converter's positive input.
    fn select_channel(&mut self, channel: u8) -> Result<(), Self::Error>;

    /// Flushes any conversion in progress and starts converting.
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Latest conversion result.
    fn result(&mut self) -> Result<u16, Self::Error>;
}

impl<T: AnalogInput + ?Sized> AnalogInput for &mut T {
    type Error = T::Error;

    fn select_channel(&mut self, channel: u8) -> Result<(), Self::Error> {
        T::select_channel(self, channel)
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        T::start(self)
    }

    fn result(&mut self) -> Result<u16, Self::Error> {
        T::result(self)
    }
}

pub struct AnalogSampler<A, D> {
    adc: A,
    delay: D,
    settle_ns: u32,
}

impl<A: AnalogInput, D: DelayNs> AnalogSampler<A, D> {
    pub const fn new(adc: A, delay: D) -> Self {
        Self::with_settle_ns(adc, delay, DEFAULT_SETTLE_NS)
    }

    pub const fn with_settle_ns(adc: A, delay: D, settle_ns: u32) -> Self {
        Self {
            adc,
            delay,
            settle_ns,
        }
    }

    pub fn release(self) -> (A, D) {
        (self.adc, self.delay)
    }

    /// Routes `channel` to the converter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hardware`] if the converter fails.
    pub fn configure(&mut self, channel: u8) -> Result<(), Error<A::Error>> {
        self.adc.select_channel(channel).map_err(Error::Hardware)
    }

    /// Mean of `samples` consecutive results, waiting the settle time after
    /// each one.
    ///
    /// # Errors
    ///
    /// [`InvalidArgument::SampleCount`] for zero samples, before the
    /// converter is started. Otherwise only converter errors.
    pub fn sample_average(&mut self, samples: u32) -> Result<f32, Error<A::Error>> {
        if samples == 0 {
            return Err(InvalidArgument::SampleCount.into());
        }

        self.adc.start().map_err(Error::Hardware)?;

        let mut sum = 0_u64;
        for _ in 0..samples {
            sum += u64::from(self.adc.result().map_err(Error::Hardware)?);
            self.delay.delay_ns(self.settle_ns);
        }

        let samples = u64::from(samples);
        // Whole part is at most u16::MAX, so both halves are exact in f32.
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let average = (sum / samples) as f32 + (sum % samples) as f32 / samples as f32;
        trace!("adc: average of {=u64} samples is {=f32}", samples, average);
        Ok(average)
    }
}

/// Address of the ADC peripheral on the SAMD21.
pub const ADC_BASE: usize = 0x4200_4000;

const CTRLA: usize = 0x00;
const REFCTRL: usize = 0x01;
const CTRLB: usize = 0x04;
const SWTRIG: usize = 0x0C;
const INPUTCTRL: usize = 0x10;
const STATUS: usize = 0x19;
const RESULT: usize = 0x1A;

const CTRLA_ENABLE: u8 = 1 << 1;
const CTRLA_RUNSTDBY: u8 = 1 << 2;
const REFCTRL_REFCOMP: u8 = 1 << 7;
const CTRLB_DIFFMODE: u16 = 1 << 0;
const CTRLB_LEFTADJ: u16 = 1 << 1;
const CTRLB_FREERUN: u16 = 1 << 2;
const CTRLB_CORREN: u16 = 1 << 3;
const CTRLB_RESSEL_MASK: u16 = 0b11 << 4;
const CTRLB_RESSEL_10BIT: u16 = 0x2 << 4;
const SWTRIG_FLUSH: u8 = 1 << 0;
const SWTRIG_START: u8 = 1 << 1;
const INPUTCTRL_MUXPOS_MASK: u32 = 0x1F;
const STATUS_SYNCBUSY: u8 = 1 << 7;

/// The SAMD21 ADC, accessed through its registers.
pub struct Samd21Adc {
    base: *mut u8,
}

impl Samd21Adc {
    /// # Safety
    ///
    /// The caller must own the ADC peripheral for the lifetime of the value.
    pub unsafe fn new() -> Self {
        unsafe { Self::with_base(ADC_BASE as *mut u8) }
    }

    /// # Safety
    ///
    /// `base` must point to an ADC register block (or memory laid out like
    /// one) that stays valid and unaliased for the lifetime of the value.
    pub const unsafe fn with_base(base: *mut u8) -> Self {
        Self { base }
    }

    #[inline]
    fn read<T: Copy>(&self, offset: usize) -> T {
        unsafe { read_volatile(self.base.wrapping_add(offset).cast::<T>()) }
    }

    #[inline]
    fn write<T: Copy>(&mut self, offset: usize, value: T) {
        unsafe { write_volatile(self.base.wrapping_add(offset).cast::<T>(), value) }
    }

    fn wait_sync(&self) {
        while self.read::<u8>(STATUS) & STATUS_SYNCBUSY != 0 {
            core::hint::spin_loop();
        }
    }

    /// 10-bit, right-adjusted, single-ended, free-running conversions with
    /// reference compensation and no digital correction, then enables the
    /// converter. Results are not kept in standby.
    pub fn init(&mut self) {
        let mut ctrlb = self.read::<u16>(CTRLB);
        ctrlb = (ctrlb & !CTRLB_RESSEL_MASK) | CTRLB_RESSEL_10BIT;
        ctrlb &= !(CTRLB_DIFFMODE | CTRLB_LEFTADJ | CTRLB_CORREN);
        ctrlb |= CTRLB_FREERUN;
        self.write(CTRLB, ctrlb);
        self.wait_sync();

        let ctrla = self.read::<u8>(CTRLA) & !CTRLA_RUNSTDBY;
        self.write(CTRLA, ctrla);
        self.write(REFCTRL, self.read::<u8>(REFCTRL) | REFCTRL_REFCOMP);
        self.wait_sync();

        self.write(CTRLA, CTRLA_ENABLE);
        self.wait_sync();
        debug!("adc: enabled, 10-bit free-running");
    }
}

impl AnalogInput for Samd21Adc {
    type Error = Infallible;

    fn select_channel(&mut self, channel: u8) -> Result<(), Infallible> {
        let inputctrl = self.read::<u32>(INPUTCTRL) & !INPUTCTRL_MUXPOS_MASK;
        self.write(
            INPUTCTRL,
            inputctrl | (u32::from(channel) & INPUTCTRL_MUXPOS_MASK),
        );
        self.wait_sync();
        Ok(())
    }

    fn start(&mut self) -> Result<(), Infallible> {
        self.write(SWTRIG, SWTRIG_START | SWTRIG_FLUSH);
        self.wait_sync();
        Ok(())
    }

    fn result(&mut self) -> Result<u16, Infallible> {
        Ok(self.read::<u16>(RESULT))
    }
}
