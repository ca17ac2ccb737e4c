use crate::bus::BusId;

/// Errors that can occur while resolving a bus channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError<E: core::fmt::Debug> {
    /// The bus factory failed to create the buses.
    FactoryError(E),
    /// The bus id has no channel in this manager.
    UnknownBus(BusId),
    /// Bus manager is in an unrecoverable state.
    Poisoned,
}

impl<E: core::fmt::Debug> core::fmt::Display for BusError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BusError::FactoryError(err) => {
                write!(f, "bus creation failed: {:?}", err)
            }
            BusError::UnknownBus(bus) => write!(f, "no channel for {}", bus),
            BusError::Poisoned => write!(f, "bus manager poisoned"),
        }
    }
}
