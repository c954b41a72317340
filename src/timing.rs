use crate::ds18b20::MeasureResolution;

/// Durations, in microseconds, of every phase of a OneWire transaction.
///
/// A write slot is `write_one_low_us + slot_us` for a `1` and
/// `write_zero_low_us + recovery_us` for a `0`. A read slot is
/// `read_init_us + read_sample_us + (slot_us - read_sample_us)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Line held low by the master to reset the bus
    pub reset_us: u32,
    /// Line released after a reset, during which the device may answer
    pub presence_us: u32,
    pub write_one_low_us: u32,
    pub write_zero_low_us: u32,
    /// Length of one time slot
    pub slot_us: u32,
    pub recovery_us: u32,
    pub read_init_us: u32,
    /// Delay between releasing the line and sampling it in a read slot
    pub read_sample_us: u32,
    /// Fixed wait between CONVERT and READ SCRATCHPAD
    pub conversion_us: u32,
}

impl Timing {
    pub const fn new() -> Self {
        Self {
            reset_us: 480,
            presence_us: 480,
            write_one_low_us: 1,
            write_zero_low_us: 60,
            slot_us: 60,
            recovery_us: 1,
            read_init_us: 1,
            read_sample_us: 15,
            conversion_us: 750,
        }
    }

    /// Default slot timing, with the conversion wait the DS18B20 datasheet
    /// gives for `resolution`.
    pub const fn for_resolution(resolution: MeasureResolution) -> Self {
        let mut timing = Self::new();
        timing.conversion_us = resolution.time_ms() as u32 * 1_000;
        timing
    }

    /// Wait after sampling a read slot until the slot is over.
    pub const fn read_tail_us(&self) -> u32 {
        self.slot_us.saturating_sub(self.read_sample_us)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_slot_table() {
        let timing = Timing::default();
        assert_eq!(timing.reset_us, 480);
        assert_eq!(timing.presence_us, 480);
        assert_eq!(timing.slot_us, 60);
        assert_eq!(timing.read_sample_us, 15);
        assert_eq!(timing.read_tail_us(), 45);
        assert_eq!(timing.conversion_us, 750);
    }

    #[test]
    fn resolution_only_changes_conversion_wait() {
        let timing = Timing::for_resolution(MeasureResolution::TC4);
        assert_eq!(timing.conversion_us, 188_000);
        assert_eq!(
            Timing {
                conversion_us: 750,
                ..timing
            },
            Timing::default()
        );
        assert_eq!(
            Timing::for_resolution(MeasureResolution::TC).conversion_us,
            750_000
        );
    }
}
