//! A single digital line the OneWire engine drives and samples.

use embedded_hal::digital::{InputPin, OutputPin, PinState};

/// Direction and level control of one digital pin.
///
/// `write` is only meaningful while the line is an output and `read` only
/// while it is an input. Implementations perform the register effect
/// directly, without validating that the caller respects this.
pub trait HardwareBus {
    type Error;

    fn set_input(&mut self) -> Result<(), Self::Error>;

    fn set_output(&mut self) -> Result<(), Self::Error>;

    fn write(&mut self, level: PinState) -> Result<(), Self::Error>;

    fn read(&mut self) -> Result<PinState, Self::Error>;
}

impl<T: HardwareBus + ?Sized> HardwareBus for &mut T {
    type Error = T::Error;

    fn set_input(&mut self) -> Result<(), Self::Error> {
        T::set_input(self)
    }

    fn set_output(&mut self) -> Result<(), Self::Error> {
        T::set_output(self)
    }

    fn write(&mut self, level: PinState) -> Result<(), Self::Error> {
        T::write(self, level)
    }

    fn read(&mut self) -> Result<PinState, Self::Error> {
        T::read(self)
    }
}

/// Adapts an open-drain embedded-hal pin with an external pull-up.
///
/// Open-drain pins have no separate direction: switching to input releases
/// the line to the pull-up, switching to output leaves it as it is until the
/// next `write`.
pub struct OpenDrainLine<P> {
    pin: P,
}

impl<P, E> OpenDrainLine<P>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
{
    pub const fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P, E> HardwareBus for OpenDrainLine<P>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
{
    type Error = E;

    fn set_input(&mut self) -> Result<(), E> {
        self.pin.set_high()
    }

    fn set_output(&mut self) -> Result<(), E> {
        Ok(())
    }

    fn write(&mut self, level: PinState) -> Result<(), E> {
        self.pin.set_state(level)
    }

    fn read(&mut self) -> Result<PinState, E> {
        Ok(PinState::from(self.pin.is_high()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};

    #[test]
    fn input_releases_the_line() {
        let expectations = [PinTransaction::set(State::High)];
        let mut line = OpenDrainLine::new(PinMock::new(&expectations));

        line.set_input().unwrap();

        line.release().done();
    }

    #[test]
    fn output_direction_touches_nothing() {
        let mut line = OpenDrainLine::new(PinMock::new(&[]));

        line.set_output().unwrap();

        line.release().done();
    }

    #[test]
    fn write_and_read_map_levels() {
        let expectations = [
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
            PinTransaction::get(State::Low),
            PinTransaction::get(State::High),
        ];
        let mut line = OpenDrainLine::new(PinMock::new(&expectations));

        line.write(PinState::Low).unwrap();
        line.write(PinState::High).unwrap();
        assert_eq!(line.read().unwrap(), PinState::Low);
        assert_eq!(line.read().unwrap(), PinState::High);

        line.release().done();
    }

    #[test]
    fn borrowed_line_forwards() {
        let expectations = [PinTransaction::set(State::Low)];
        let mut line = OpenDrainLine::new(PinMock::new(&expectations));

        fn pull_low<B: HardwareBus>(mut bus: B) -> Result<(), B::Error> {
            bus.set_output()?;
            bus.write(PinState::Low)
        }
        pull_low(&mut line).unwrap();

        line.release().done();
    }
}
