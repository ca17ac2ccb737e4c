use buddy_i2c::{ErrCode, I2cError};

/// Failure of an EEPROM protocol operation, after all retries.
#[derive(derive_more::From, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EepromError {
    I2c(I2cError),
    /// The written bytes never read back identical.
    VerifyMismatch,
}

impl EepromError {
    /// Fatal code when this ends a write.
    pub const fn write_code(self) -> ErrCode {
        match self {
            EepromError::I2c(e) => ErrCode::for_write(e),
            EepromError::VerifyMismatch => ErrCode::I2cTxUndefined,
        }
    }

    /// Fatal code when this ends a read.
    pub const fn read_code(self) -> ErrCode {
        match self {
            EepromError::I2c(e) => ErrCode::for_read(e),
            EepromError::VerifyMismatch => ErrCode::I2cRxUndefined,
        }
    }

    /// Whether the bus should be re-initialized before trying again.
    pub(crate) const fn wants_reinit(self) -> bool {
        matches!(
            self,
            EepromError::I2c(I2cError::BusyAfterRetries | I2cError::Error)
        )
    }
}

impl core::fmt::Display for EepromError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EepromError::I2c(e) => write!(f, "EEPROM transfer failed: {}", e),
            EepromError::VerifyMismatch => {
                write!(f, "EEPROM read-back does not match written data")
            }
        }
    }
}
