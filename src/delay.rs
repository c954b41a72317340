use embedded_hal::delay::DelayNs;

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const MICROS_PER_SECOND: u64 = 1_000_000;

/// Blocking delay that spins a loop calibrated to the processor clock.
///
/// Never yields. Nothing else runs on the core while a delay is in progress,
/// and there is no way to cancel one.
#[derive(Debug, Copy, Clone)]
pub struct BusyWait {
    clock_hz: u32,
}

impl BusyWait {
    pub const fn new(clock_hz: u32) -> Self {
        Self { clock_hz }
    }

    pub const fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Loop iterations needed to cover `us` microseconds, rounded up.
    pub const fn cycles_for_us(&self, us: u32) -> u64 {
        (us as u64 * self.clock_hz as u64).div_ceil(MICROS_PER_SECOND)
    }

    /// Loop iterations needed to cover `ns` nanoseconds, rounded up.
    pub const fn cycles_for_ns(&self, ns: u32) -> u64 {
        (ns as u64 * self.clock_hz as u64).div_ceil(NANOS_PER_SECOND)
    }

    #[inline(always)]
    fn spin(cycles: u64) {
        for _ in 0..cycles {
            core::hint::spin_loop();
        }
    }
}

impl DelayNs for BusyWait {
    fn delay_ns(&mut self, ns: u32) {
        Self::spin(self.cycles_for_ns(ns));
    }

    fn delay_us(&mut self, us: u32) {
        Self::spin(self.cycles_for_us(us));
    }

    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1_000);
        }
    }
}
