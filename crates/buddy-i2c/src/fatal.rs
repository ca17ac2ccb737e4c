//! Fatal-error codes and the stop-the-world hook.

use crate::status::I2cError;

/// Error codes shown on the fatal error screen.
///
/// Codes are stable: they are looked up by support documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ErrCode {
    I2cTxBusy = 12301,
    I2cTxError = 12302,
    I2cTxTimeout = 12303,
    I2cTxUndefined = 12304,
    I2cRxBusy = 12305,
    I2cRxError = 12306,
    I2cRxTimeout = 12307,
    I2cRxUndefined = 12308,
    I2cChannelInit = 12309,
}

impl ErrCode {
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Code for a failed write transaction.
    pub const fn for_write(err: I2cError) -> Self {
        match err {
            I2cError::BusyAfterRetries => ErrCode::I2cTxBusy,
            I2cError::Error => ErrCode::I2cTxError,
            I2cError::Timeout => ErrCode::I2cTxTimeout,
        }
    }

    /// Code for a failed read transaction.
    pub const fn for_read(err: I2cError) -> Self {
        match err {
            I2cError::BusyAfterRetries => ErrCode::I2cRxBusy,
            I2cError::Error => ErrCode::I2cRxError,
            I2cError::Timeout => ErrCode::I2cRxTimeout,
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            ErrCode::I2cTxBusy => "I2C SEND BUSY",
            ErrCode::I2cTxError => "I2C SEND FAILED",
            ErrCode::I2cTxTimeout => "I2C SEND TIMEOUT",
            ErrCode::I2cTxUndefined => "I2C SEND UNDEFINED",
            ErrCode::I2cRxBusy => "I2C RECEIVE BUSY",
            ErrCode::I2cRxError => "I2C RECEIVE FAILED",
            ErrCode::I2cRxTimeout => "I2C RECEIVE TIMEOUT",
            ErrCode::I2cRxUndefined => "I2C RECEIVE UNDEFINED",
            ErrCode::I2cChannelInit => "I2C CHANNEL INIT FAILED",
        }
    }
}

impl core::fmt::Display for ErrCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{} {}", self.code(), self.title())
    }
}

/// Stop-the-world error display. Never returns.
pub trait Fatal {
    fn fatal_error(&self, code: ErrCode) -> !;
}

impl<T: Fatal> Fatal for &T {
    fn fatal_error(&self, code: ErrCode) -> ! {
        T::fatal_error(self, code)
    }
}
