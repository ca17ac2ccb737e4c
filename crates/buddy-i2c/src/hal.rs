//! Boundaries with the bus HAL and the motion interrupt.

use crate::status::RawStatus;

/// Timeout value meaning "wait forever".
pub const MAX_DELAY: u32 = u32::MAX;

/// Register address inside a memory-mapped I2C device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemAddress {
    Bits8(u8),
    Bits16(u16),
}

impl MemAddress {
    /// Address width in bits.
    pub const fn width(self) -> u8 {
        match self {
            MemAddress::Bits8(_) => 8,
            MemAddress::Bits16(_) => 16,
        }
    }

    /// Same width, moved forward by `by` bytes (wrapping).
    pub const fn offset(self, by: u16) -> Self {
        match self {
            MemAddress::Bits8(a) => MemAddress::Bits8(a.wrapping_add(by as u8)),
            MemAddress::Bits16(a) => MemAddress::Bits16(a.wrapping_add(by)),
        }
    }

    /// Big-endian wire form, as sent before the data.
    pub fn to_bytes(self, buf: &mut [u8; 2]) -> &[u8] {
        match self {
            MemAddress::Bits8(a) => {
                buf[0] = a;
                &buf[..1]
            }
            MemAddress::Bits16(a) => {
                *buf = a.to_be_bytes();
                &buf[..]
            }
        }
    }
}

/// One physical I2C peripheral.
///
/// Every call is a single transfer attempt; retrying, locking and
/// classification happen above this trait. Addresses are 7-bit.
#[allow(async_fn_in_trait)]
pub trait I2cHal {
    async fn master_transmit(
        &mut self,
        address: u8,
        data: &[u8],
        timeout_ms: u32,
    ) -> RawStatus;

    async fn master_receive(
        &mut self,
        address: u8,
        buffer: &mut [u8],
        timeout_ms: u32,
    ) -> RawStatus;

    async fn mem_write(
        &mut self,
        address: u8,
        mem: MemAddress,
        data: &[u8],
        timeout_ms: u32,
    ) -> RawStatus;

    async fn mem_read(
        &mut self,
        address: u8,
        mem: MemAddress,
        buffer: &mut [u8],
        timeout_ms: u32,
    ) -> RawStatus;

    async fn is_device_ready(
        &mut self,
        address: u8,
        trials: u32,
        timeout_ms: u32,
    ) -> RawStatus;

    /// Bring the peripheral back to a known state after a stuck transfer.
    fn reinit(&mut self) {}
}

/// Hook into the high-priority periodic motion interrupt.
pub trait MoveIsr {
    fn is_enabled(&self) -> bool;
    fn disable(&self);
    fn enable(&self);
}

impl<T: MoveIsr> MoveIsr for &T {
    fn is_enabled(&self) -> bool {
        T::is_enabled(self)
    }

    fn disable(&self) {
        T::disable(self)
    }

    fn enable(&self) {
        T::enable(self)
    }
}

/// Board without a motion interrupt.
pub struct NoMoveIsr;

impl MoveIsr for NoMoveIsr {
    fn is_enabled(&self) -> bool {
        false
    }

    fn disable(&self) {}

    fn enable(&self) {}
}

/// Keeps the move ISR off while alive, if it was on when created.
pub struct IsrSuspend<'a, I: MoveIsr> {
    isr: &'a I,
    was_enabled: bool,
}

impl<'a, I: MoveIsr> IsrSuspend<'a, I> {
    pub fn new(isr: &'a I) -> Self {
        let was_enabled = isr.is_enabled();
        if was_enabled {
            isr.disable();
        }
        Self { isr, was_enabled }
    }
}

impl<I: MoveIsr> Drop for IsrSuspend<'_, I> {
    fn drop(&mut self) {
        if self.was_enabled {
            self.isr.enable();
        }
    }
}
