use core::ops::ControlFlow;

use bus_manager::{BusFactory, BusId, BusManager, ChannelGuard};
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::fatal::{ErrCode, Fatal};
use crate::hal::{I2cHal, IsrSuspend, MemAddress, MoveIsr};
use crate::retry::Retry;
use crate::stats::{Stats, StatsSnapshot};
use crate::status::{classify, Attempt, I2cError, RawStatus};

/// Largest piece read back at once when verifying a memory write.
pub const VERIFY_CHUNK: usize = 32;

/// Retry bounds of the transaction engine.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineConfig {
    /// Attempts for transmit, receive and device-ready probes.
    pub transfer_retries: u32,
    /// Attempts for memory reads and writes.
    pub mem_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { transfer_retries: 20, mem_retries: 3 }
    }
}

/// Retrying I2C transactions on shared buses.
///
/// Every operation yields exactly one final result; transient busy outcomes
/// are retried internally. Implemented by [`I2cEngine`].
#[allow(async_fn_in_trait)]
pub trait I2cTransactions {
    async fn transmit(
        &self,
        bus: BusId,
        address: u8,
        data: &[u8],
        timeout_ms: u32,
    ) -> Result<(), I2cError>;

    async fn receive(
        &self,
        bus: BusId,
        address: u8,
        buffer: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), I2cError>;

    async fn mem_write(
        &self,
        bus: BusId,
        address: u8,
        mem: MemAddress,
        data: &[u8],
        timeout_ms: u32,
    ) -> Result<(), I2cError>;

    /// Memory write followed by a read-back compare. A mismatch counts as a
    /// failed attempt; running out of attempts on a mismatch is an error.
    ///
    /// Reads back right after the write, which suits devices that can answer
    /// at once. Parts with a programming time split and pace their writes
    /// themselves and verify afterwards, see the `st25dv64k` driver.
    async fn mem_write_verified(
        &self,
        bus: BusId,
        address: u8,
        mem: MemAddress,
        data: &[u8],
        timeout_ms: u32,
    ) -> Result<(), I2cError>;

    async fn mem_read(
        &self,
        bus: BusId,
        address: u8,
        mem: MemAddress,
        buffer: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), I2cError>;

    async fn is_device_ready(
        &self,
        bus: BusId,
        address: u8,
        trials: u32,
        timeout_ms: u32,
    ) -> Result<(), I2cError>;

    /// Re-initialize the peripheral of `bus`.
    async fn reinit(&self, bus: BusId);
}

/// The transaction engine.
///
/// Each attempt holds the bus channel for exactly one physical transfer with
/// the move ISR suspended, then records the raw outcome in the per-bus stats.
pub struct I2cEngine<'a, M, F, I, X, const N: usize>
where
    M: RawMutex,
    F: BusFactory<N>,
    F::Bus: I2cHal,
    I: MoveIsr,
    X: Fatal,
{
    buses: &'a BusManager<M, F, N>,
    isr: I,
    fatal: X,
    stats: Stats<N>,
    config: EngineConfig,
}

impl<'a, M, F, I, X, const N: usize> I2cEngine<'a, M, F, I, X, N>
where
    M: RawMutex,
    F: BusFactory<N>,
    F::Bus: I2cHal,
    I: MoveIsr,
    X: Fatal,
{
    pub fn new(
        buses: &'a BusManager<M, F, N>,
        isr: I,
        fatal: X,
        config: EngineConfig,
    ) -> Self {
        Self { buses, isr, fatal, stats: Stats::new(), config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self, bus: BusId) -> Option<StatsSnapshot> {
        self.stats.snapshot(bus)
    }

    /// Lock the channel of `bus`. Failing to bring the buses up is fatal.
    async fn channel(&self, bus: BusId) -> ChannelGuard<'a, M, F::Bus> {
        match self.buses.lock(bus).await {
            Ok(guard) => guard,
            Err(_) => {
                error!("no channel for i2c{=u8}", bus.number());
                self.fatal.fatal_error(ErrCode::I2cChannelInit)
            }
        }
    }

    /// Count the attempt and step the retry machine.
    fn settle(
        &self,
        bus: BusId,
        retry: &mut Retry,
        status: RawStatus,
    ) -> ControlFlow<Result<(), I2cError>> {
        self.stats.record(bus, status);
        retry.step(classify(status))
    }

    /// One write attempt plus read-back. Mismatch is a transient failure.
    async fn write_and_compare(
        &self,
        bus: BusId,
        address: u8,
        mem: MemAddress,
        data: &[u8],
        timeout_ms: u32,
    ) -> Attempt {
        let mut hal = self.channel(bus).await;
        let isr = IsrSuspend::new(&self.isr);
        let status = hal.mem_write(address, mem, data, timeout_ms).await;
        drop(isr);
        drop(hal);
        self.stats.record(bus, status);
        if status != RawStatus::Ok {
            return classify(status);
        }

        let mut scratch = [0u8; VERIFY_CHUNK];
        for (i, expected) in data.chunks(VERIFY_CHUNK).enumerate() {
            let read_back = &mut scratch[..expected.len()];
            let offset = (i * VERIFY_CHUNK) as u16;
            let mut hal = self.channel(bus).await;
            let isr = IsrSuspend::new(&self.isr);
            let status = hal
                .mem_read(address, mem.offset(offset), read_back, timeout_ms)
                .await;
            drop(isr);
            drop(hal);
            self.stats.record(bus, status);
            if status != RawStatus::Ok {
                return classify(status);
            }
            if read_back != expected {
                debug!("i2c{=u8}: read-back mismatch", bus.number());
                return Attempt::Retry(I2cError::Error);
            }
        }
        Attempt::Done(Ok(()))
    }
}

impl<'a, M, F, I, X, const N: usize> I2cTransactions
    for I2cEngine<'a, M, F, I, X, N>
where
    M: RawMutex,
    F: BusFactory<N>,
    F::Bus: I2cHal,
    I: MoveIsr,
    X: Fatal,
{
    async fn transmit(
        &self,
        bus: BusId,
        address: u8,
        data: &[u8],
        timeout_ms: u32,
    ) -> Result<(), I2cError> {
        let mut retry = Retry::new(self.config.transfer_retries);
        loop {
            let mut hal = self.channel(bus).await;
            let isr = IsrSuspend::new(&self.isr);
            let status = hal.master_transmit(address, data, timeout_ms).await;
            drop(isr);
            drop(hal);
            if let ControlFlow::Break(result) =
                self.settle(bus, &mut retry, status)
            {
                return result;
            }
        }
    }

    async fn receive(
        &self,
        bus: BusId,
        address: u8,
        buffer: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), I2cError> {
        let mut retry = Retry::new(self.config.transfer_retries);
        loop {
            let mut hal = self.channel(bus).await;
            let isr = IsrSuspend::new(&self.isr);
            let status = hal.master_receive(address, buffer, timeout_ms).await;
            drop(isr);
            drop(hal);
            if let ControlFlow::Break(result) =
                self.settle(bus, &mut retry, status)
            {
                return result;
            }
        }
    }

    async fn mem_write(
        &self,
        bus: BusId,
        address: u8,
        mem: MemAddress,
        data: &[u8],
        timeout_ms: u32,
    ) -> Result<(), I2cError> {
        let mut retry = Retry::new(self.config.mem_retries);
        loop {
            let mut hal = self.channel(bus).await;
            let isr = IsrSuspend::new(&self.isr);
            let status = hal.mem_write(address, mem, data, timeout_ms).await;
            drop(isr);
            drop(hal);
            if let ControlFlow::Break(result) =
                self.settle(bus, &mut retry, status)
            {
                return result;
            }
        }
    }

    async fn mem_write_verified(
        &self,
        bus: BusId,
        address: u8,
        mem: MemAddress,
        data: &[u8],
        timeout_ms: u32,
    ) -> Result<(), I2cError> {
        let mut retry = Retry::new(self.config.mem_retries);
        loop {
            let attempt = self
                .write_and_compare(bus, address, mem, data, timeout_ms)
                .await;
            if let ControlFlow::Break(result) = retry.step(attempt) {
                return result;
            }
        }
    }

    async fn mem_read(
        &self,
        bus: BusId,
        address: u8,
        mem: MemAddress,
        buffer: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), I2cError> {
        let mut retry = Retry::new(self.config.mem_retries);
        loop {
            let mut hal = self.channel(bus).await;
            let isr = IsrSuspend::new(&self.isr);
            let status = hal.mem_read(address, mem, buffer, timeout_ms).await;
            drop(isr);
            drop(hal);
            if let ControlFlow::Break(result) =
                self.settle(bus, &mut retry, status)
            {
                return result;
            }
        }
    }

    async fn is_device_ready(
        &self,
        bus: BusId,
        address: u8,
        trials: u32,
        timeout_ms: u32,
    ) -> Result<(), I2cError> {
        let mut retry = Retry::new(self.config.transfer_retries);
        loop {
            let mut hal = self.channel(bus).await;
            let isr = IsrSuspend::new(&self.isr);
            let status = hal.is_device_ready(address, trials, timeout_ms).await;
            drop(isr);
            drop(hal);
            if let ControlFlow::Break(result) =
                self.settle(bus, &mut retry, status)
            {
                return result;
            }
        }
    }

    async fn reinit(&self, bus: BusId) {
        let mut hal = self.channel(bus).await;
        debug!("i2c{=u8}: re-initializing", bus.number());
        hal.reinit();
    }
}
