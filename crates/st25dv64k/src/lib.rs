#![no_std]
//! Driver for the ST25DV64K dynamic NFC tag, used on the board as the
//! configuration EEPROM and, with the `nfc` feature, for handing Wi-Fi
//! credentials to the printer from a phone.
//!
//! All bus traffic goes through a [`buddy_i2c::I2cTransactions`]
//! implementation, so the tag shares its bus with other devices. Writes are
//! split into 4-byte blocks and verified by reading them back.

mod fmt;

mod device;
mod error;
pub mod registers;

#[cfg(feature = "nfc")]
pub mod nfc;

pub use device::{EepromConfig, St25dv64k};
pub use error::EepromError;
pub use registers::Space;
