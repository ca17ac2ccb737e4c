use buddy_i2c::{
    BusId, ErrCode, Fatal, I2cError, I2cTransactions, MemAddress, MAX_DELAY,
    VERIFY_CHUNK,
};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::delay::DelayNs;
use portable_atomic::{AtomicBool, Ordering};

use crate::error::EepromError;
use crate::registers::*;

/// Driver settings.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EepromConfig {
    /// Bus the tag sits on.
    pub bus: BusId,
    /// Write page size; a single write never crosses a block boundary.
    pub block_size: u16,
    /// Programming time to wait after every block write, in ms.
    pub settle_ms: u32,
    /// Outer attempts of every protocol operation.
    pub retries: u32,
    /// Per-transfer timeout handed to the bus, in ms.
    pub timeout_ms: u32,
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self {
            bus: BusId::I2C1,
            block_size: 4,
            settle_ms: 5,
            retries: 3,
            timeout_ms: MAX_DELAY,
        }
    }
}

/// ST25DV64K dynamic tag used as the board's configuration EEPROM.
///
/// Every multi-transfer step (a block write sequence with its read-back, or a
/// read) runs under a device lock, so concurrent callers never interleave
/// their steps. Between steps the bus itself is free for other devices.
///
/// Operations come in two flavours: `try_*` returns the failure, the plain
/// ones escalate it through [`Fatal`].
pub struct St25dv64k<'a, T, M, D, X>
where
    T: I2cTransactions,
    M: RawMutex,
    D: DelayNs,
    X: Fatal,
{
    i2c: &'a T,
    step: Mutex<M, D>,
    fatal: X,
    config: EepromConfig,
    initialised: AtomicBool,
}

impl<'a, T, M, D, X> St25dv64k<'a, T, M, D, X>
where
    T: I2cTransactions,
    M: RawMutex,
    D: DelayNs,
    X: Fatal,
{
    pub fn new(i2c: &'a T, delay: D, fatal: X, config: EepromConfig) -> Self {
        Self {
            i2c,
            step: Mutex::new(delay),
            fatal,
            config,
            initialised: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EepromConfig {
        &self.config
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised.load(Ordering::Acquire)
    }

    /// Read user memory. Failures are returned, never escalated.
    pub async fn try_read(
        &self,
        address: u16,
        buf: &mut [u8],
    ) -> Result<(), EepromError> {
        self.try_read_space(Space::Memory, address, buf).await
    }

    pub async fn read(&self, address: u16, buf: &mut [u8]) {
        if let Err(e) = self.try_read(address, buf).await {
            self.escalate(e.read_code())
        }
    }

    pub async fn read_u8(&self, address: u16) -> u8 {
        let mut byte = [0u8];
        self.read(address, &mut byte).await;
        byte[0]
    }

    /// Write user memory and read it back until it matches.
    pub async fn try_write(
        &self,
        address: u16,
        data: &[u8],
    ) -> Result<(), EepromError> {
        self.try_write_space(Space::Memory, address, data, true).await
    }

    pub async fn write(&self, address: u16, data: &[u8]) {
        if let Err(e) = self.try_write(address, data).await {
            self.escalate(e.write_code())
        }
    }

    pub async fn write_u8(&self, address: u16, value: u8) {
        self.write(address, &[value]).await
    }

    /// Write without read-back. Meant for dynamic registers, which do not
    /// read back what was written.
    pub async fn try_write_unverified(
        &self,
        address: u16,
        data: &[u8],
    ) -> Result<(), EepromError> {
        self.try_write_space(Space::Memory, address, data, false).await
    }

    pub async fn write_unverified(&self, address: u16, data: &[u8]) {
        if let Err(e) = self.try_write_unverified(address, data).await {
            self.escalate(e.write_code())
        }
    }

    /// Read one system configuration register.
    pub async fn read_cfg(&self, register: u16) -> u8 {
        let mut byte = [0u8];
        if let Err(e) =
            self.try_read_space(Space::Registers, register, &mut byte).await
        {
            self.escalate(e.read_code())
        }
        byte[0]
    }

    /// Write one system configuration register. Needs an open security
    /// session, see [`Self::present_password`].
    pub async fn write_cfg(&self, register: u16, value: u8) {
        if let Err(e) = self
            .try_write_space(Space::Registers, register, &[value], true)
            .await
        {
            self.escalate(e.write_code())
        }
    }

    /// Open the I2C security session. `None` presents the all-zero factory
    /// password.
    pub async fn present_password(&self, password: Option<&[u8; 8]>) {
        let frame = password_frame(password);
        let mut result = Err(EepromError::I2c(I2cError::Error));
        for _ in 0..self.config.retries.max(1) {
            {
                let _step = self.step.lock().await;
                result = self
                    .i2c
                    .transmit(
                        self.config.bus,
                        Space::Registers.address(),
                        &frame,
                        self.config.timeout_ms,
                    )
                    .await
                    .map_err(EepromError::from);
            }
            self.recover(result).await;
            if result.is_ok() {
                break;
            }
        }
        if let Err(e) = result {
            self.escalate(e.write_code())
        }
    }

    /// Set up the memory areas: area 1 (0x0000..=0x04FF) open to RF, the rest
    /// closed to RF. Runs once; later calls return immediately.
    pub async fn init(&self) {
        if self.initialised.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("st25dv64k: configuring memory areas");

        self.present_password(None).await;
        self.write_cfg(REG_ENDA3, ENDA3_LAYOUT).await;
        self.present_password(None).await;
        self.write_cfg(REG_ENDA2, ENDA2_LAYOUT).await;
        self.present_password(None).await;
        self.write_cfg(REG_ENDA1, ENDA1_LAYOUT).await;

        self.write_cfg(REG_RFA1SS, RF_AREA_OPEN).await;
        self.write_cfg(REG_RFA2SS, RF_AREA_CLOSED).await;
        self.write_cfg(REG_RFA3SS, RF_AREA_CLOSED).await;
    }

    /// Switch the RF interface off or back on.
    pub async fn set_rf_disabled(&self, disabled: bool) {
        let current = self.read_u8(MEM_RF_MNGT_DYN).await;
        let next = if disabled {
            current | RF_DISABLE
        } else {
            current & !RF_DISABLE
        };
        if next != current {
            self.write_unverified(MEM_RF_MNGT_DYN, &[next]).await;
        }
    }

    fn escalate(&self, code: ErrCode) -> ! {
        error!("st25dv64k: giving up, error {=u16}", code.code());
        self.fatal.fatal_error(code)
    }

    /// Re-initialize the bus after a failure that may have left it stuck.
    async fn recover(&self, result: Result<(), EepromError>) {
        if let Err(e) = result {
            if e.wants_reinit() {
                warn!("st25dv64k: resetting bus after failure");
                self.i2c.reinit(self.config.bus).await;
            }
        }
    }

    async fn read_once(
        &self,
        space: Space,
        address: u16,
        buf: &mut [u8],
    ) -> Result<(), EepromError> {
        self.i2c
            .mem_read(
                self.config.bus,
                space.address(),
                MemAddress::Bits16(address),
                buf,
                self.config.timeout_ms,
            )
            .await?;
        Ok(())
    }

    /// Write `data` in pieces that never cross a block boundary, waiting
    /// for the programming time after each one.
    async fn write_blocks(
        &self,
        delay: &mut D,
        space: Space,
        address: u16,
        data: &[u8],
    ) -> Result<(), EepromError> {
        let block = self.config.block_size.max(1);
        let mut address = address;
        let mut rest = data;
        while !rest.is_empty() {
            let room = usize::from(block - address % block);
            let (chunk, tail) = rest.split_at(room.min(rest.len()));
            self.i2c
                .mem_write(
                    self.config.bus,
                    space.address(),
                    MemAddress::Bits16(address),
                    chunk,
                    self.config.timeout_ms,
                )
                .await?;
            delay.delay_ms(self.config.settle_ms).await;
            address = address.wrapping_add(chunk.len() as u16);
            rest = tail;
        }
        Ok(())
    }

    async fn verify(
        &self,
        space: Space,
        address: u16,
        data: &[u8],
    ) -> Result<(), EepromError> {
        let mut scratch = [0u8; VERIFY_CHUNK];
        for (i, expected) in data.chunks(VERIFY_CHUNK).enumerate() {
            let read_back = &mut scratch[..expected.len()];
            let offset = (i * VERIFY_CHUNK) as u16;
            self.read_once(space, address.wrapping_add(offset), read_back)
                .await?;
            if read_back != expected {
                return Err(EepromError::VerifyMismatch);
            }
        }
        Ok(())
    }

    async fn try_read_space(
        &self,
        space: Space,
        address: u16,
        buf: &mut [u8],
    ) -> Result<(), EepromError> {
        if buf.is_empty() {
            return Ok(());
        }
        let mut result = Err(EepromError::I2c(I2cError::Error));
        for _ in 0..self.config.retries.max(1) {
            {
                let _step = self.step.lock().await;
                result = self.read_once(space, address, buf).await;
            }
            self.recover(result).await;
            if result.is_ok() {
                break;
            }
        }
        result
    }

    async fn try_write_space(
        &self,
        space: Space,
        address: u16,
        data: &[u8],
        verify: bool,
    ) -> Result<(), EepromError> {
        if data.is_empty() {
            return Ok(());
        }
        let mut result = Err(EepromError::I2c(I2cError::Error));
        for _ in 0..self.config.retries.max(1) {
            {
                let mut delay = self.step.lock().await;
                result =
                    self.write_blocks(&mut delay, space, address, data).await;
                if verify && result.is_ok() {
                    result = self.verify(space, address, data).await;
                }
            }
            self.recover(result).await;
            if result.is_ok() {
                break;
            }
            debug!("st25dv64k: write at {=u16:#x} failed, retrying", address);
        }
        result
    }
}
