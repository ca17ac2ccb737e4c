#![no_std]
//! Per-bus channel mutexes for shared I2C peripherals.
//!
//! A [`BusManager`] owns one mutex per physical bus. The buses themselves are
//! created lazily, all at once, the first time any of them is locked. Locking
//! yields a [`ChannelGuard`] that gives exclusive access to that bus until it
//! is dropped.

mod fmt;

mod bus;
mod error;
mod factory;
mod guard;
mod manager;

pub use bus::BusId;
pub use error::BusError;
pub use factory::BusFactory;
pub use guard::ChannelGuard;
pub use manager::BusManager;
