use bus_manager::BusId;
use portable_atomic::{AtomicU32, Ordering};

use crate::status::RawStatus;

/// Outcome counters of one bus. Counters wrap and are never reset.
#[derive(Default)]
pub struct BusStats {
    ok: AtomicU32,
    busy: AtomicU32,
    error: AtomicU32,
    timeout: AtomicU32,
}

/// Plain copy of one bus's counters, for metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatsSnapshot {
    pub ok: u32,
    pub busy: u32,
    pub error: u32,
    pub timeout: u32,
}

impl BusStats {
    pub const fn new() -> Self {
        Self {
            ok: AtomicU32::new(0),
            busy: AtomicU32::new(0),
            error: AtomicU32::new(0),
            timeout: AtomicU32::new(0),
        }
    }

    pub fn record(&self, status: RawStatus) {
        let counter = match status {
            RawStatus::Ok => &self.ok,
            RawStatus::Busy => &self.busy,
            RawStatus::Error => &self.error,
            RawStatus::Timeout => &self.timeout,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ok: self.ok.load(Ordering::Relaxed),
            busy: self.busy.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            timeout: self.timeout.load(Ordering::Relaxed),
        }
    }
}

/// Per-bus statistics table.
pub struct Stats<const N: usize> {
    buses: [BusStats; N],
}

impl<const N: usize> Stats<N> {
    pub const fn new() -> Self {
        Self { buses: [const { BusStats::new() }; N] }
    }

    /// Count one attempt on `bus`. Unknown buses are ignored.
    pub fn record(&self, bus: BusId, status: RawStatus) {
        if let Some(stats) = self.buses.get(bus.index()) {
            stats.record(status);
        }
    }

    pub fn snapshot(&self, bus: BusId) -> Option<StatsSnapshot> {
        self.buses.get(bus.index()).map(BusStats::snapshot)
    }
}

impl<const N: usize> Default for Stats<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_bus_and_kind() {
        let stats: Stats<2> = Stats::new();
        stats.record(BusId::I2C1, RawStatus::Busy);
        stats.record(BusId::I2C1, RawStatus::Busy);
        stats.record(BusId::I2C1, RawStatus::Ok);
        stats.record(BusId::I2C2, RawStatus::Timeout);
        stats.record(BusId::I2C3, RawStatus::Error);

        assert_eq!(
            stats.snapshot(BusId::I2C1),
            Some(StatsSnapshot { ok: 1, busy: 2, error: 0, timeout: 0 })
        );
        assert_eq!(
            stats.snapshot(BusId::I2C2),
            Some(StatsSnapshot { ok: 0, busy: 0, error: 0, timeout: 1 })
        );
        assert_eq!(stats.snapshot(BusId::I2C3), None);
    }
}
