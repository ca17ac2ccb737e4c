#![no_std]
//! Retrying I2C transactions over shared buses.
//!
//! The [`I2cEngine`] sits between device drivers and the per-bus
//! [`BusManager`]. Each transaction takes the bus channel for one physical
//! attempt at a time, keeps the motion interrupt quiet for the duration of
//! the transfer, counts the raw outcome and retries while the bus reports
//! busy. Exhausted or hard failures surface as [`I2cError`]; drivers decide
//! whether that is fatal through [`Fatal`] and [`ErrCode`].

mod fmt;

mod engine;
mod fatal;
mod hal;
mod retry;
mod stats;
mod status;

pub mod eh;

pub use bus_manager::{BusError, BusFactory, BusId, BusManager};
pub use engine::{EngineConfig, I2cEngine, I2cTransactions, VERIFY_CHUNK};
pub use fatal::{ErrCode, Fatal};
pub use hal::{I2cHal, IsrSuspend, MemAddress, MoveIsr, NoMoveIsr, MAX_DELAY};
pub use retry::Retry;
pub use stats::{BusStats, Stats, StatsSnapshot};
pub use status::{classify, Attempt, I2cError, RawStatus};
