use core::ops::{Deref, DerefMut};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::MutexGuard;

use crate::bus::BusId;

/// RAII guard giving exclusive access to one bus.
///
/// The channel is released when the guard is dropped, on every exit path of
/// the holding scope. Locking the same bus again while a guard is alive in
/// the same task deadlocks.
pub struct ChannelGuard<'a, M: RawMutex, B> {
    bus: BusId,
    inner: MutexGuard<'a, M, B>,
}

impl<'a, M: RawMutex, B> ChannelGuard<'a, M, B> {
    pub(crate) fn new(bus: BusId, inner: MutexGuard<'a, M, B>) -> Self {
        Self { bus, inner }
    }

    /// The bus this guard holds.
    pub fn bus(&self) -> BusId {
        self.bus
    }
}

impl<M: RawMutex, B> Deref for ChannelGuard<'_, M, B> {
    type Target = B;

    #[inline]
    fn deref(&self) -> &B {
        &self.inner
    }
}

impl<M: RawMutex, B> DerefMut for ChannelGuard<'_, M, B> {
    #[inline]
    fn deref_mut(&mut self) -> &mut B {
        &mut self.inner
    }
}

impl<M: RawMutex, B> Drop for ChannelGuard<'_, M, B> {
    fn drop(&mut self) {
        trace!("i2c{=u8}: released", self.bus.number());
    }
}
