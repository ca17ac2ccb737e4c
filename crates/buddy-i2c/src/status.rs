/// Raw outcome of one physical transfer, as reported by the bus HAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RawStatus {
    Ok,
    Error,
    Busy,
    Timeout,
}

/// Final failure of a logical transaction, after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cError {
    /// Bus or device error (NACK, arbitration, overrun, ...).
    Error,
    /// The bus stayed busy for every allowed attempt.
    BusyAfterRetries,
    /// The HAL timed out.
    Timeout,
}

impl core::fmt::Display for I2cError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            I2cError::Error => write!(f, "I2C error"),
            I2cError::BusyAfterRetries => write!(f, "I2C busy after retries"),
            I2cError::Timeout => write!(f, "I2C timeout"),
        }
    }
}

/// Classification of one attempt for the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Attempt {
    /// The transaction is over with this result.
    Done(Result<(), I2cError>),
    /// Transient failure; worth another attempt. The error is what the
    /// transaction reports if no attempts are left.
    Retry(I2cError),
}

/// Map a raw HAL status onto the retry classification.
///
/// This is the only place the vendor status is interpreted.
pub const fn classify(status: RawStatus) -> Attempt {
    match status {
        RawStatus::Ok => Attempt::Done(Ok(())),
        RawStatus::Busy => Attempt::Retry(I2cError::BusyAfterRetries),
        RawStatus::Error => Attempt::Done(Err(I2cError::Error)),
        RawStatus::Timeout => Attempt::Done(Err(I2cError::Timeout)),
    }
}
