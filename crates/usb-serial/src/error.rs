/// Why a single transmit attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmitError {
    /// The endpoint is still sending the previous packet.
    Busy,
    /// No host, or the host closed the port.
    Disconnected,
    /// The packet did not fit the endpoint buffer.
    Overflow,
}

#[derive(derive_more::From, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    /// Output is switched off; nothing was sent.
    Disabled,
    /// Every attempt of the flush failed, the last one with this.
    Transmit(TransmitError),
}

impl core::fmt::Display for TransmitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransmitError::Busy => write!(f, "endpoint busy"),
            TransmitError::Disconnected => write!(f, "host not connected"),
            TransmitError::Overflow => write!(f, "packet too large"),
        }
    }
}

impl core::fmt::Display for SerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SerialError::Disabled => write!(f, "serial output disabled"),
            SerialError::Transmit(e) => {
                write!(f, "serial transmit failed: {}", e)
            }
        }
    }
}
