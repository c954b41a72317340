//! SAMD21 PORT registers as a [`HardwareBus`].

use core::convert::Infallible;
use core::ptr::{read_volatile, write_volatile};

use embedded_hal::digital::PinState;

use crate::line::HardwareBus;

/// Address of the PORT peripheral on the SAMD21.
pub const PORT_BASE: usize = 0x4100_4400;

/// Distance between two port groups' register blocks.
const GROUP_STRIDE: usize = 0x80;

const DIRCLR: usize = 0x04;
const DIRSET: usize = 0x08;
const OUTCLR: usize = 0x14;
const OUTSET: usize = 0x18;
const IN: usize = 0x20;

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortGroup {
    A = 0,
    B = 1,
}

/// A pin identified the way the PORT peripheral addresses it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinHandle {
    group: PortGroup,
    mask: u32,
}

impl PinHandle {
    pub const fn new(group: PortGroup, mask: u32) -> Self {
        Self { group, mask }
    }

    /// `PA16` is `PinHandle::pin(PortGroup::A, 16)`.
    pub const fn pin(group: PortGroup, number: u8) -> Self {
        Self::new(group, 0x01 << number)
    }

    pub const fn group(&self) -> PortGroup {
        self.group
    }

    pub const fn mask(&self) -> u32 {
        self.mask
    }
}

/// One pin driven through the set/clear registers of its port group, so every
/// direction or level change is a single register write.
pub struct PortLine {
    group: *mut u8,
    mask: u32,
}

impl PortLine {
    /// # Safety
    ///
    /// The caller must own the pin described by `handle`: nothing else may
    /// change its direction or level while this line exists.
    pub unsafe fn new(handle: PinHandle) -> Self {
        unsafe { Self::with_base(PORT_BASE as *mut u8, handle) }
    }

    /// # Safety
    ///
    /// `base` must point to a PORT register block (or memory laid out like
    /// one) that stays valid for the lifetime of the line, and the caller
    /// must own the pin described by `handle`.
    pub unsafe fn with_base(base: *mut u8, handle: PinHandle) -> Self {
        Self {
            group: unsafe { base.add(handle.group as usize * GROUP_STRIDE) },
            mask: handle.mask,
        }
    }

    #[inline]
    fn register(&self, offset: usize) -> *mut u32 {
        self.group.wrapping_add(offset).cast::<u32>()
    }

    #[inline]
    fn set(&mut self, offset: usize) {
        unsafe { write_volatile(self.register(offset), self.mask) }
    }
}

impl HardwareBus for PortLine {
    type Error = Infallible;

    fn set_input(&mut self) -> Result<(), Infallible> {
        self.set(DIRCLR);
        Ok(())
    }

    fn set_output(&mut self) -> Result<(), Infallible> {
        self.set(DIRSET);
        Ok(())
    }

    fn write(&mut self, level: PinState) -> Result<(), Infallible> {
        match level {
            PinState::Low => self.set(OUTCLR),
            PinState::High => self.set(OUTSET),
        }
        Ok(())
    }

    fn read(&mut self) -> Result<PinState, Infallible> {
        let input = unsafe { read_volatile(self.register(IN)) };
        Ok(PinState::from(input & self.mask == self.mask))
    }
}
