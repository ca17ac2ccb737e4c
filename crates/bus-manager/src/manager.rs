use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use grounded::uninit::GroundedCell;
use portable_atomic::{AtomicBool, Ordering};

use crate::bus::BusId;
use crate::error::BusError;
use crate::factory::BusFactory;
use crate::guard::ChannelGuard;

/// Phase state machine for the one-time bus bring-up.
enum Phase<R> {
    /// Buses not created yet; resources are available.
    Idle(R),
    /// Buses are created and stored in `channels`.
    Active,
    /// Unrecoverable error state (should not normally be reached).
    Poisoned,
}

/// Owner of the `N` per-bus channel mutexes.
///
/// All buses are created together on the first [`lock`](Self::lock) of any
/// of them. Concurrent first locks are serialized on an internal init mutex,
/// so creation happens exactly once. The buses then live as long as the
/// manager.
pub struct BusManager<M: RawMutex, F: BusFactory<N>, const N: usize> {
    channels: GroundedCell<[Mutex<M, F::Bus>; N]>,
    state: Mutex<M, Phase<F::Resources>>,
    ready: AtomicBool,
}

impl<M: RawMutex, F: BusFactory<N>, const N: usize> BusManager<M, F, N> {
    /// Create a new bus manager with the given resources.
    pub const fn new(resources: F::Resources) -> Self {
        Self {
            channels: GroundedCell::uninit(),
            state: Mutex::new(Phase::Idle(resources)),
            ready: AtomicBool::new(false),
        }
    }

    /// Lock the channel of `bus`, waiting as long as it takes.
    ///
    /// Creates all buses first if this is the first lock ever.
    pub async fn lock(
        &self,
        bus: BusId,
    ) -> Result<ChannelGuard<'_, M, F::Bus>, BusError<F::Error>> {
        let channel = self.channel(bus).await?;
        let guard = channel.lock().await;
        trace!("i2c{=u8}: locked", bus.number());
        Ok(ChannelGuard::new(bus, guard))
    }

    /// Create all buses if that has not happened yet.
    ///
    /// Returns `Ok(())` when the buses are (already) active. A factory error
    /// leaves the manager idle so the next call can retry.
    pub async fn init(&self) -> Result<(), BusError<F::Error>> {
        let mut state = self.state.lock().await;

        match &*state {
            Phase::Active => Ok(()),
            Phase::Poisoned => Err(BusError::Poisoned),
            Phase::Idle(_) => {
                // Take resources out, replacing with Poisoned temporarily.
                let resources =
                    match core::mem::replace(&mut *state, Phase::Poisoned) {
                        Phase::Idle(r) => r,
                        _ => unreachable!(),
                    };

                match F::create(resources) {
                    Ok(buses) => {
                        // SAFETY: We hold the init mutex and `ready` is still
                        // false, so nobody has a reference into the cell yet.
                        unsafe {
                            self.channels.get().write(buses.map(Mutex::new));
                        }
                        *state = Phase::Active;
                        self.ready.store(true, Ordering::Release);
                        debug!("{=usize} bus channels created", N);
                        Ok(())
                    }
                    Err((err, resources)) => {
                        warn!("bus creation failed");
                        *state = Phase::Idle(resources);
                        Err(BusError::FactoryError(err))
                    }
                }
            }
        }
    }

    /// Returns `true` once the buses have been created.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn channel(
        &self,
        bus: BusId,
    ) -> Result<&Mutex<M, F::Bus>, BusError<F::Error>> {
        let index = bus.index();
        if index >= N {
            return Err(BusError::UnknownBus(bus));
        }

        if !self.ready.load(Ordering::Acquire) {
            self.init().await?;
        }

        // SAFETY: `ready` is set only after the cell was fully written, and
        // the cell is never written again.
        let channels = unsafe { &*self.channels.get() };
        Ok(&channels[index])
    }
}

impl<M: RawMutex, F: BusFactory<N>, const N: usize> Drop
    for BusManager<M, F, N>
{
    fn drop(&mut self) {
        if *self.ready.get_mut() {
            // SAFETY: `&mut self` means no guard is alive, and `ready`
            // guarantees the cell holds initialized channels.
            unsafe { core::ptr::drop_in_place(self.channels.get()) }
        }
    }
}
