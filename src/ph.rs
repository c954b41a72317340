//! E201C pH probe read through an averaging ADC path.
//!
//! The probe's output voltage is mapped to pH by a line through two
//! calibration points:
//!
//! ```text
//! k      = (pH2 - pH1) / (V2 - V1)
//! offset = ((pH1 + pH2) - k * (V1 + V2)) / 2
//! pH     = k * voltage + offset
//! ```

use embedded_hal::delay::DelayNs;

use crate::AnalogInput;
use crate::AnalogSampler;
use crate::Error;
use crate::InvalidArgument;

pub const DEFAULT_SAMPLES: u32 = 50;

/// Volume references used when only the reference pH values are given.
pub const DEFAULT_VOLUME_REFERENCES: [f32; 2] = [1.93, 1.66];

/// A reference buffer: its pH and the volume reference measured for it.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationPoint {
    pub ph: f32,
    pub volume: f32,
}

impl CalibrationPoint {
    pub const fn new(ph: f32, volume: f32) -> Self {
        Self { ph, volume }
    }

    fn is_finite(&self) -> bool {
        self.ph.is_finite() && self.volume.is_finite()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReferencePoint {
    First,
    Second,
}

/// Everything needed to turn an averaged ADC result into pH.
///
/// Immutable: every change goes through a constructor that recomputes the
/// k-value and deviation offset, so the derived values always match the
/// points.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationProfile {
    reference_voltage: f32,
    sensor_max_value: u32,
    points: [CalibrationPoint; 2],
    k_value: f32,
    deviation_offset: f32,
}

impl CalibrationProfile {
    /// Derives the k-value and deviation offset from two points.
    ///
    /// # Errors
    ///
    /// - [`InvalidArgument::SensorMaxValue`] if `sensor_max_value` is 0
    /// - [`InvalidArgument::CalibrationReference`] if a reference is NaN or infinite
    /// - [`InvalidArgument::CalibrationVolumes`] if both volumes are equal
    #[allow(clippy::float_cmp)]
    pub fn new(
        reference_voltage: f32,
        sensor_max_value: u32,
        first: CalibrationPoint,
        second: CalibrationPoint,
    ) -> Result<Self, InvalidArgument> {
        if sensor_max_value == 0 {
            return Err(InvalidArgument::SensorMaxValue);
        }

        if !(first.is_finite() && second.is_finite()) {
            return Err(InvalidArgument::CalibrationReference);
        }
        if first.volume == second.volume {
            return Err(InvalidArgument::CalibrationVolumes);
        }

        let k_value = (second.ph - first.ph) / (second.volume - first.volume);
        if !k_value.is_finite() {
            return Err(InvalidArgument::CalibrationReference);
        }
        let deviation_offset =
            ((first.ph + second.ph) - k_value * (first.volume + second.volume)) / 2.0;
        debug!(
            "ph: calibrated k={=f32} offset={=f32}",
            k_value, deviation_offset
        );

        Ok(Self {
            reference_voltage,
            sensor_max_value,
            points: [first, second],
            k_value,
            deviation_offset,
        })
    }

    /// Same converter settings, new calibration points.
    ///
    /// # Errors
    ///
    /// As [`CalibrationProfile::new`].
    pub fn recalibrate(
        &self,
        first: CalibrationPoint,
        second: CalibrationPoint,
    ) -> Result<Self, InvalidArgument> {
        Self::new(self.reference_voltage, self.sensor_max_value, first, second)
    }

    /// Replaces one calibration point and keeps the other.
    ///
    /// # Errors
    ///
    /// As [`CalibrationProfile::new`].
    pub fn with_point(
        &self,
        which: ReferencePoint,
        point: CalibrationPoint,
    ) -> Result<Self, InvalidArgument> {
        let [mut first, mut second] = self.points;
        match which {
            ReferencePoint::First => first = point,
            ReferencePoint::Second => second = point,
        }
        self.recalibrate(first, second)
    }

    pub fn with_reference_voltage(&self, reference_voltage: f32) -> Self {
        Self {
            reference_voltage,
            ..*self
        }
    }

    /// # Errors
    ///
    /// [`InvalidArgument::SensorMaxValue`] if `sensor_max_value` is 0.
    pub fn with_sensor_max_value(&self, sensor_max_value: u32) -> Result<Self, InvalidArgument> {
        if sensor_max_value == 0 {
            return Err(InvalidArgument::SensorMaxValue);
        }
        Ok(Self {
            sensor_max_value,
            ..*self
        })
    }

    pub const fn reference_voltage(&self) -> f32 {
        self.reference_voltage
    }

    pub const fn sensor_max_value(&self) -> u32 {
        self.sensor_max_value
    }

    pub const fn point(&self, which: ReferencePoint) -> CalibrationPoint {
        match which {
            ReferencePoint::First => self.points[0],
            ReferencePoint::Second => self.points[1],
        }
    }

    pub const fn ph_reference(&self, which: ReferencePoint) -> f32 {
        self.point(which).ph
    }

    pub const fn volume_reference(&self, which: ReferencePoint) -> f32 {
        self.point(which).volume
    }

    pub const fn k_value(&self) -> f32 {
        self.k_value
    }

    pub const fn deviation_offset(&self) -> f32 {
        self.deviation_offset
    }

    /// Voltage at the converter input for an averaged raw result.
    #[allow(clippy::cast_precision_loss)]
    pub fn voltage(&self, raw_average: f32) -> f32 {
        raw_average * self.reference_voltage / self.sensor_max_value as f32
    }

    pub fn ph(&self, voltage: f32) -> f32 {
        self.k_value * voltage + self.deviation_offset
    }
}

/// Grove E201C-Blue pH probe on one ADC channel.
///
/// Every read returns its value; nothing about the last reading is kept.
pub struct E201c<A, D> {
    sampler: AnalogSampler<A, D>,
    channel: u8,
    samples: u32,
    calibration: CalibrationProfile,
}

impl<A: AnalogInput, D: DelayNs> E201c<A, D> {
    /// Calibration from the two reference pH values and the default volume
    /// references.
    ///
    /// # Errors
    ///
    /// As [`CalibrationProfile::new`].
    pub fn new(
        sampler: AnalogSampler<A, D>,
        reference_voltage: f32,
        sensor_max_value: u32,
        ph_ref1: f32,
        ph_ref2: f32,
        channel: u8,
    ) -> Result<Self, InvalidArgument> {
        let [v1, v2] = DEFAULT_VOLUME_REFERENCES;
        let calibration = CalibrationProfile::new(
            reference_voltage,
            sensor_max_value,
            CalibrationPoint::new(ph_ref1, v1),
            CalibrationPoint::new(ph_ref2, v2),
        )?;
        Ok(Self::with_calibration(sampler, calibration, channel))
    }

    pub const fn with_calibration(
        sampler: AnalogSampler<A, D>,
        calibration: CalibrationProfile,
        channel: u8,
    ) -> Self {
        Self {
            sampler,
            channel,
            samples: DEFAULT_SAMPLES,
            calibration,
        }
    }

    pub fn release(self) -> AnalogSampler<A, D> {
        self.sampler
    }

    pub const fn channel(&self) -> u8 {
        self.channel
    }

    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel;
    }

    pub const fn sample_count(&self) -> u32 {
        self.samples
    }

    /// # Errors
    ///
    /// [`InvalidArgument::SampleCount`] for 0, leaving the count unchanged.
    pub fn set_sample_count(&mut self, samples: u32) -> Result<(), InvalidArgument> {
        if samples == 0 {
            return Err(InvalidArgument::SampleCount);
        }
        self.samples = samples;
        Ok(())
    }

    pub const fn calibration(&self) -> &CalibrationProfile {
        &self.calibration
    }

    pub fn set_calibration(&mut self, calibration: CalibrationProfile) {
        self.calibration = calibration;
    }

    /// Averages `sample_count` conversions of the probe's channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hardware`] if the converter fails.
    pub fn sensor_voltage(&mut self) -> Result<f32, Error<A::Error>> {
        self.sampler.configure(self.channel)?;
        let average = self.sampler.sample_average(self.samples)?;
        Ok(self.calibration.voltage(average))
    }

    /// pH from one averaged acquisition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hardware`] if the converter fails.
    pub fn sensor_ph(&mut self) -> Result<f32, Error<A::Error>> {
        let voltage = self.sensor_voltage()?;
        Ok(self.calibration.ph(voltage))
    }
}
