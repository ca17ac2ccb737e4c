#![no_std]
//! Serial console over USB CDC-ACM.
//!
//! Output is collected in a line buffer and pushed to the host on newline,
//! when the buffer fills up, or on an explicit [`UsbSerial::flush`]. A
//! flush that keeps failing eventually disables the port until someone
//! calls [`UsbSerial::begin`] again, so a host that stopped listening does
//! not stall the printer.
//!
//! Input arrives in chunks from the USB receive path through an
//! [`RxProducer`] and is read back byte-wise by the owner of the
//! [`UsbSerial`].

mod fmt;

mod error;
mod ring;
mod serial;

#[cfg(feature = "embassy-usb")]
pub mod cdc;

pub use error::{SerialError, TransmitError};
pub use ring::{RxConsumer, RxProducer, RxRing};
pub use serial::{CdcTransmit, SerialConfig, UsbSerial};
