/// Abstracts creation of the `N` buses owned by a
/// [`BusManager`](crate::BusManager).
///
/// Implementors define how to bring up every bus peripheral from the board
/// resources. Creation happens once, on the first lock of any bus.
pub trait BusFactory<const N: usize> {
    /// The bus type guarded by each channel mutex.
    type Bus;
    /// Resources needed to create all buses (peripheral handles, pins).
    type Resources;
    /// Error type for bus creation failures.
    type Error: core::fmt::Debug;

    /// Create all buses, in bus-number order.
    ///
    /// On failure, returns the error **and** the original resources so a
    /// later lock can try again.
    fn create(
        resources: Self::Resources,
    ) -> Result<[Self::Bus; N], (Self::Error, Self::Resources)>;
}
