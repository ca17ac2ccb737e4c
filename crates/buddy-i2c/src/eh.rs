//! [`I2cHal`] backend for any `embedded-hal-async` I2C peripheral.

use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{Error, ErrorKind, I2c, Operation};

use crate::hal::{I2cHal, MemAddress, MAX_DELAY};
use crate::status::RawStatus;

/// Map an embedded-hal error kind onto the raw status.
///
/// Lost arbitration means another master owns the bus right now, which is
/// the only condition worth retrying.
pub fn classify_error_kind(kind: ErrorKind) -> RawStatus {
    match kind {
        ErrorKind::ArbitrationLoss => RawStatus::Busy,
        _ => RawStatus::Error,
    }
}

fn status_of<E: Error>(result: Result<(), E>) -> RawStatus {
    match result {
        Ok(()) => RawStatus::Ok,
        Err(e) => classify_error_kind(e.kind()),
    }
}

/// Wraps an async I2C bus and a delay used to bound each transfer.
pub struct EhBus<I2C, D> {
    i2c: I2C,
    delay: D,
}

impl<I2C: I2c, D: DelayNs> EhBus<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self { i2c, delay }
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}

/// Race `op` against a `timeout_ms` delay.
async fn bounded<E: Error>(
    delay: &mut impl DelayNs,
    timeout_ms: u32,
    op: impl core::future::Future<Output = Result<(), E>>,
) -> RawStatus {
    if timeout_ms == MAX_DELAY {
        return status_of(op.await);
    }
    match select(op, delay.delay_ms(timeout_ms)).await {
        Either::First(result) => status_of(result),
        Either::Second(()) => RawStatus::Timeout,
    }
}

impl<I2C: I2c, D: DelayNs> I2cHal for EhBus<I2C, D> {
    async fn master_transmit(
        &mut self,
        address: u8,
        data: &[u8],
        timeout_ms: u32,
    ) -> RawStatus {
        let Self { i2c, delay } = self;
        bounded(delay, timeout_ms, i2c.write(address, data)).await
    }

    async fn master_receive(
        &mut self,
        address: u8,
        buffer: &mut [u8],
        timeout_ms: u32,
    ) -> RawStatus {
        let Self { i2c, delay } = self;
        bounded(delay, timeout_ms, i2c.read(address, buffer)).await
    }

    async fn mem_write(
        &mut self,
        address: u8,
        mem: MemAddress,
        data: &[u8],
        timeout_ms: u32,
    ) -> RawStatus {
        let Self { i2c, delay } = self;
        let mut raw = [0u8; 2];
        let mem = mem.to_bytes(&mut raw);
        // Adjacent writes go out back to back, without a repeated start.
        let mut ops = [Operation::Write(mem), Operation::Write(data)];
        bounded(delay, timeout_ms, i2c.transaction(address, &mut ops)).await
    }

    async fn mem_read(
        &mut self,
        address: u8,
        mem: MemAddress,
        buffer: &mut [u8],
        timeout_ms: u32,
    ) -> RawStatus {
        let Self { i2c, delay } = self;
        let mut raw = [0u8; 2];
        let mem = mem.to_bytes(&mut raw);
        bounded(delay, timeout_ms, i2c.write_read(address, mem, buffer)).await
    }

    async fn is_device_ready(
        &mut self,
        address: u8,
        trials: u32,
        timeout_ms: u32,
    ) -> RawStatus {
        let mut status = RawStatus::Error;
        for _ in 0..trials.max(1) {
            let Self { i2c, delay } = &mut *self;
            status = bounded(delay, timeout_ms, i2c.write(address, &[])).await;
            if status == RawStatus::Ok {
                break;
            }
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_async::i2c::NoAcknowledgeSource;

    #[test]
    fn only_arbitration_loss_is_busy() {
        assert_eq!(
            classify_error_kind(ErrorKind::ArbitrationLoss),
            RawStatus::Busy
        );
        assert_eq!(classify_error_kind(ErrorKind::Bus), RawStatus::Error);
        assert_eq!(
            classify_error_kind(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address
            )),
            RawStatus::Error
        );
        assert_eq!(classify_error_kind(ErrorKind::Overrun), RawStatus::Error);
    }
}
