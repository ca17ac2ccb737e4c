use embedded_hal_async::delay::DelayNs;
use heapless::Vec;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::error::{SerialError, TransmitError};
use crate::ring::RxConsumer;

/// One attempt at handing a buffer to the host.
#[allow(async_fn_in_trait)]
pub trait CdcTransmit {
    async fn transmit(&mut self, data: &[u8]) -> Result<(), TransmitError>;
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialConfig {
    /// Transmit attempts per flush.
    pub retries: u8,
    /// Pause between two attempts of the same flush.
    pub retry_delay_ms: u32,
    /// Consecutive failed flushes after which output is switched off.
    pub max_failures: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self { retries: 5, retry_delay_ms: 1, max_failures: 3 }
    }
}

/// Console port: `TX` bytes of line buffer in front of `port`, an input
/// ring behind it.
pub struct UsbSerial<'r, P, D, const TX: usize>
where
    P: CdcTransmit,
    D: DelayNs,
{
    rx: RxConsumer<'r>,
    tx: Vec<u8, TX>,
    port: P,
    delay: D,
    config: SerialConfig,
    enabled: AtomicBool,
    failures: AtomicU32,
}

impl<'r, P, D, const TX: usize> UsbSerial<'r, P, D, TX>
where
    P: CdcTransmit,
    D: DelayNs,
{
    /// A new port starts enabled.
    pub fn new(
        rx: RxConsumer<'r>,
        port: P,
        delay: D,
        config: SerialConfig,
    ) -> Self {
        Self {
            rx,
            tx: Vec::new(),
            port,
            delay,
            config,
            enabled: AtomicBool::new(true),
            failures: AtomicU32::new(0),
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Switch output back on and forget earlier failures.
    pub fn begin(&self) {
        self.failures.store(0, Ordering::Release);
        self.enabled.store(true, Ordering::Release);
    }

    pub fn end(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Failed flushes since the last successful one.
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    /// Queue one byte. A newline or a full buffer sends the line.
    ///
    /// Always reports one byte written; on a full buffer the byte is lost.
    pub async fn write(&mut self, byte: u8) -> usize {
        if self.tx.push(byte).is_err() {
            trace!("usb: output full, dropped {=u8:#x}", byte);
        }
        if byte == b'\n' || self.tx.is_full() {
            if let Err(e) = self.flush().await {
                debug!("usb: flush failed: {}", e);
            }
        }
        1
    }

    pub async fn write_all(&mut self, data: &[u8]) -> usize {
        for &byte in data {
            self.write(byte).await;
        }
        data.len()
    }

    /// Send whatever is buffered. Once attempted, the buffer is empty
    /// afterwards whether or not the host got it.
    ///
    /// While output is disabled nothing is attempted and the buffer is left
    /// as it is.
    pub async fn flush(&mut self) -> Result<(), SerialError> {
        if self.tx.is_empty() {
            return Ok(());
        }
        if !self.is_enabled() {
            return Err(SerialError::Disabled);
        }
        let sent = self.send().await;
        self.tx.clear();
        sent
    }

    async fn send(&mut self) -> Result<(), SerialError> {
        let mut last = TransmitError::Busy;
        for attempt in 0..self.config.retries.max(1) {
            if attempt > 0 {
                self.delay.delay_ms(self.config.retry_delay_ms).await;
            }
            match self.port.transmit(&self.tx).await {
                Ok(()) => {
                    self.failures.store(0, Ordering::Release);
                    return Ok(());
                }
                Err(e) => last = e,
            }
        }

        let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.config.max_failures {
            warn!("usb: {=u32} flushes failed, output disabled", failures);
            self.enabled.store(false, Ordering::Release);
            self.failures.store(0, Ordering::Release);
        }
        Err(last.into())
    }

    /// Bytes waiting in the input ring.
    pub fn available(&self) -> usize {
        self.rx.len()
    }

    pub fn available_for_write(&self) -> usize {
        TX - self.tx.len()
    }

    pub fn read(&mut self) -> Option<u8> {
        self.rx.pop()
    }

    pub fn peek(&self) -> Option<u8> {
        self.rx.peek()
    }

    /// Copy out as much input as fits into `buf`. Never waits.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.rx.pop() {
                Some(byte) => buf[n] = byte,
                None => break,
            }
            n += 1;
        }
        n
    }

    /// Like [`read_bytes`](Self::read_bytes), but stops right after
    /// copying `terminator`.
    pub fn read_bytes_until(
        &mut self,
        terminator: u8,
        buf: &mut [u8],
    ) -> usize {
        let mut n = 0;
        while n < buf.len() {
            let Some(byte) = self.rx.pop() else { break };
            buf[n] = byte;
            n += 1;
            if byte == terminator {
                break;
            }
        }
        n
    }
}
