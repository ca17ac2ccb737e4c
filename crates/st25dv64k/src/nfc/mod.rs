//! Wi-Fi credential hand-over through the tag's RF interface.
//!
//! A phone writes a WSC (Wi-Fi Simple Configuration) NDEF message into the
//! exchange area at the start of user memory. When the RF field goes away
//! the controller parses it and then restores the area to the printer's own
//! identification record, so the same credentials are never picked up twice.

mod ndef;

pub use ndef::{
    iterate_ndef, try_parse_wifi_message, ByteSource, CapabilityContainer,
    OutOfRange, RecordHeader, WifiCredentials, MAX_PASSWORD, MAX_SSID,
    TLV_LONG_LENGTH, TLV_NDEF, TLV_TERMINATOR, TNF_MEDIA, WIFI_MIME_TYPE,
    WSC_CREDENTIAL, WSC_NETWORK_KEY, WSC_SSID,
};

use bitflags::bitflags;
use buddy_i2c::{Fatal, I2cTransactions};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use heapless::Vec;
use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::device::St25dv64k;
use crate::error::EepromError;
use crate::registers::{MEM_IT_STS_DYN, REG_LOCK_CCFILE};

bitflags! {
    /// IT_STS_Dyn interrupt status byte.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct ItStatus: u8 {
        const FIELD_FALLING = 1 << 3;
        const FIELD_RISING = 1 << 4;
    }
}

/// Longest product text stored in the identification record.
pub const MAX_PRODUCT_TEXT: usize = 64;

// TLV header, record header, "T", language tag, text, terminator
const LAYOUT_MAX: usize = 2 + 3 + 1 + 3 + MAX_PRODUCT_TEXT + 2;

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NfcConfig {
    /// Text of the record naming the printer, e.g. for phone apps.
    pub product: &'static str,
    /// End (exclusive) of the exchange area wiped after every hand-over.
    pub window_end: u16,
}

impl Default for NfcConfig {
    fn default() -> Self {
        Self { product: "PRUSA3D/MK4S", window_end: 128 }
    }
}

impl<T, M, D, X> ByteSource for St25dv64k<'_, T, M, D, X>
where
    T: I2cTransactions,
    M: RawMutex,
    D: DelayNs,
    X: Fatal,
{
    type Error = EepromError;

    async fn read_at(
        &self,
        offset: u16,
        buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.try_read(offset, buf).await
    }
}

/// NDEF message TLV holding one well-known text record with `text`,
/// followed by a terminator TLV.
fn identity_layout(text: &str) -> Vec<u8, LAYOUT_MAX> {
    let text = &text.as_bytes()[..text.len().min(MAX_PRODUCT_TEXT)];
    let payload_len = 3 + text.len() as u8;
    let end = 9 + text.len();

    let mut bytes = [0u8; LAYOUT_MAX];
    bytes[..9].copy_from_slice(&[
        TLV_NDEF,
        4 + payload_len,
        // MB | ME | SR, TNF well-known; type "T"
        0xD1,
        0x01,
        payload_len,
        b'T',
        // UTF-8, language "en"
        0x02,
        b'e',
        b'n',
    ]);
    bytes[9..end].copy_from_slice(text);
    bytes[end..end + 2].copy_from_slice(&[TLV_TERMINATOR, 0x00]);

    let mut layout = Vec::from_array(bytes);
    layout.truncate(end + 2);
    layout
}

/// Watches the tag for credentials written over RF.
pub struct NfcController<'d, 'a, T, M, D, X>
where
    T: I2cTransactions,
    M: RawMutex,
    D: DelayNs,
    X: Fatal,
{
    device: &'d St25dv64k<'a, T, M, D, X>,
    config: NfcConfig,
    last_status: AtomicU8,
    formatted: AtomicBool,
}

impl<'d, 'a, T, M, D, X> NfcController<'d, 'a, T, M, D, X>
where
    T: I2cTransactions,
    M: RawMutex,
    D: DelayNs,
    X: Fatal,
{
    pub fn new(
        device: &'d St25dv64k<'a, T, M, D, X>,
        config: NfcConfig,
    ) -> Self {
        Self {
            device,
            config,
            last_status: AtomicU8::new(0),
            formatted: AtomicBool::new(false),
        }
    }

    pub fn device(&self) -> &'d St25dv64k<'a, T, M, D, X> {
        self.device
    }

    pub fn config(&self) -> &NfcConfig {
        &self.config
    }

    /// Configure the tag and format the exchange area: memory areas, then
    /// the capability container (locked afterwards), then the
    /// identification record. Runs once.
    pub async fn init(&self) {
        self.device.init().await;
        if self.formatted.swap(true, Ordering::AcqRel) {
            return;
        }

        self.device.write_cfg(REG_LOCK_CCFILE, 0).await;
        self.device.present_password(None).await;
        self.device
            .write(0, &CapabilityContainer::DEFAULT.to_bytes())
            .await;
        self.device.write_cfg(REG_LOCK_CCFILE, 1).await;

        self.consume_data().await;
    }

    /// Poll the tag. Returns credentials once per RF session that left a
    /// valid WSC message behind.
    ///
    /// Nothing happens unless the interrupt status changed since the last
    /// successful poll. Bus failures count as "no data"; the status is then
    /// not remembered, so the next poll tries again.
    pub async fn try_detect_wifi_credentials(&self) -> Option<WifiCredentials> {
        let mut status = [0u8];
        self.device.try_read(MEM_IT_STS_DYN, &mut status).await.ok()?;
        let status = status[0];
        if status == self.last_status.load(Ordering::Acquire) {
            return None;
        }
        trace!("nfc: interrupt status {=u8:#x}", status);

        let mut credentials = None;
        if ItStatus::from_bits_retain(status).contains(ItStatus::FIELD_FALLING)
        {
            let mut tlv = [0u8; 4];
            self.device
                .try_read(CapabilityContainer::SIZE, &mut tlv)
                .await
                .ok()?;

            if tlv[0] == TLV_NDEF {
                let (header, length) = if tlv[1] == TLV_LONG_LENGTH {
                    (4, u16::from_be_bytes([tlv[2], tlv[3]]))
                } else {
                    (2, u16::from(tlv[1]))
                };
                let from = CapabilityContainer::SIZE + header;
                let to = from.saturating_add(length);
                credentials = iterate_ndef(self.device, from, to).await;
                if credentials.is_some() {
                    info!("nfc: received Wi-Fi credentials");
                } else {
                    debug!("nfc: message without usable credentials");
                }
                self.consume_data().await;
            }
        }

        self.last_status.store(status, Ordering::Release);
        credentials
    }

    /// Put the printer's identification record back and wipe the rest of
    /// the exchange area. Failures are logged and left for the next
    /// hand-over.
    pub async fn consume_data(&self) {
        let layout = identity_layout(self.config.product);
        let mut address = CapabilityContainer::SIZE;
        if let Err(e) = self.device.try_write(address, &layout).await {
            warn!("nfc: restoring record failed: {}", e);
            return;
        }
        address += layout.len() as u16;

        // small writes; long ones are more likely to get disturbed by RF
        const ZEROS: [u8; 4] = [0; 4];
        while address < self.config.window_end {
            let len = usize::from(self.config.window_end - address).min(4);
            let wiped = self.device.try_write(address, &ZEROS[..len]).await;
            if let Err(e) = wiped {
                warn!("nfc: wiping {=u16:#x} failed: {}", address, e);
                return;
            }
            address += len as u16;
        }
    }
}
