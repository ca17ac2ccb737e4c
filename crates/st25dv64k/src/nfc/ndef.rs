//! NDEF message walking and Wi-Fi Simple Configuration parsing.
//!
//! The parser reads through a [`ByteSource`] so the same code runs against
//! the tag and against a plain byte slice.

use bitflags::bitflags;
use heapless::Vec;

/// Capability container at the start of user memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapabilityContainer {
    pub magic: u8,
    pub version_and_access: u8,
    /// Memory size available for NDEF, in units of 8 bytes.
    pub mlen: u8,
    pub features: u8,
}

impl CapabilityContainer {
    pub const SIZE: u16 = 4;
    pub const MAGIC: u8 = 0xE1;

    /// Version 1.0, open access, 512 bytes, multi-block read.
    pub const DEFAULT: Self = Self {
        magic: Self::MAGIC,
        version_and_access: 0x40,
        mlen: 0x40,
        features: 0x01,
    };

    pub const fn to_bytes(self) -> [u8; 4] {
        [self.magic, self.version_and_access, self.mlen, self.features]
    }
}

pub const TLV_NDEF: u8 = 0x03;
pub const TLV_TERMINATOR: u8 = 0xFE;
/// Length byte announcing a big-endian 16-bit length after it.
pub const TLV_LONG_LENGTH: u8 = 0xFF;

bitflags! {
    /// First byte of an NDEF record.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct RecordHeader: u8 {
        const MESSAGE_BEGIN = 0x80;
        const MESSAGE_END = 0x40;
        const CHUNK = 0x20;
        const SHORT_RECORD = 0x10;
        const ID_LENGTH = 0x08;
        const TNF = 0x07;
    }
}

impl RecordHeader {
    pub fn type_name_format(self) -> u8 {
        (self & RecordHeader::TNF).bits()
    }
}

/// TNF value of a MIME media-type record.
pub const TNF_MEDIA: u8 = 0x02;

pub const WIFI_MIME_TYPE: &[u8] = b"application/vnd.wfa.wsc";

// Wi-Fi Simple Configuration attribute types
pub const WSC_CREDENTIAL: u16 = 0x100E;
pub const WSC_SSID: u16 = 0x1045;
pub const WSC_NETWORK_KEY: u16 = 0x1027;

pub const MAX_SSID: usize = 32;
pub const MAX_PASSWORD: usize = 64;

/// Network credentials handed over through the tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: Vec<u8, MAX_SSID>,
    pub password: Vec<u8, MAX_PASSWORD>,
}

/// Random-access bytes the parser walks over.
#[allow(async_fn_in_trait)]
pub trait ByteSource {
    type Error;

    /// Fill `buf` from `offset`.
    async fn read_at(&self, offset: u16, buf: &mut [u8])
        -> Result<(), Self::Error>;
}

/// Read past the end of a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutOfRange;

impl ByteSource for [u8] {
    type Error = OutOfRange;

    async fn read_at(
        &self,
        offset: u16,
        buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        let start = usize::from(offset);
        let src = self.get(start..start + buf.len()).ok_or(OutOfRange)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

/// Fill `buf` from `offset`, refusing anything that ends past `end`.
async fn read<S: ByteSource + ?Sized>(
    src: &S,
    offset: u32,
    end: u32,
    buf: &mut [u8],
) -> Option<()> {
    let last = offset.checked_add(u32::try_from(buf.len()).ok()?)?;
    if last > end {
        return None;
    }
    let offset = u16::try_from(offset).ok()?;
    src.read_at(offset, buf).await.ok()
}

/// Walk the records of the NDEF message in `from..to` and return the first
/// Wi-Fi credentials found.
///
/// Stops at the first record flagged as message end, at the end of the
/// range, or at anything it cannot parse (missing message begin on the
/// first record, chunked records, unreadable bytes). A record whose
/// declared lengths reach past `to` ends the walk without a result.
pub async fn iterate_ndef<S: ByteSource + ?Sized>(
    src: &S,
    from: u16,
    to: u16,
) -> Option<WifiCredentials> {
    let to = u32::from(to);
    let mut pos = u32::from(from);
    let mut first = true;

    while pos < to {
        let mut head = [0u8; 2];
        read(src, pos, to, &mut head).await?;
        let header = RecordHeader::from_bits_retain(head[0]);
        let type_length = head[1];
        pos += 2;

        if header.contains(RecordHeader::MESSAGE_BEGIN) != first {
            return None;
        }
        if header.contains(RecordHeader::CHUNK) {
            return None;
        }

        let payload_length = if header.contains(RecordHeader::SHORT_RECORD) {
            let mut len = [0u8; 1];
            read(src, pos, to, &mut len).await?;
            pos += 1;
            u32::from(len[0])
        } else {
            let mut len = [0u8; 4];
            read(src, pos, to, &mut len).await?;
            pos += 4;
            u32::from_be_bytes(len)
        };

        let id_length = if header.contains(RecordHeader::ID_LENGTH) {
            let mut len = [0u8; 1];
            read(src, pos, to, &mut len).await?;
            pos += 1;
            len[0]
        } else {
            0
        };

        let end = pos
            .checked_add(u32::from(type_length))?
            .checked_add(u32::from(id_length))?
            .checked_add(payload_length)?;
        if end > to {
            return None;
        }

        if header.type_name_format() == TNF_MEDIA {
            let found = try_parse_wifi_message(
                src,
                pos,
                type_length,
                payload_length,
                id_length,
            )
            .await;
            if found.is_some() {
                return found;
            }
        }

        if header.contains(RecordHeader::MESSAGE_END) {
            return None;
        }
        pos = end;
        first = false;
    }
    None
}

/// Parse one media record whose type field starts at `from`.
///
/// Returns credentials only when the type is the WSC MIME type and both
/// SSID and network key are present and fit. Nothing is read beyond the
/// end of the record. The credential attribute is a container; its members
/// are read in place.
pub async fn try_parse_wifi_message<S: ByteSource + ?Sized>(
    src: &S,
    from: u32,
    type_length: u8,
    payload_length: u32,
    id_length: u8,
) -> Option<WifiCredentials> {
    if usize::from(type_length) != WIFI_MIME_TYPE.len() {
        return None;
    }
    let mut pos = from
        .checked_add(u32::from(type_length))?
        .checked_add(u32::from(id_length))?;
    let stop = pos.checked_add(payload_length)?;

    let mut mime = [0u8; WIFI_MIME_TYPE.len()];
    read(src, from, stop, &mut mime).await?;
    if mime != WIFI_MIME_TYPE {
        return None;
    }

    let mut ssid = None;
    let mut password = None;

    while pos < stop {
        let mut attr = [0u8; 4];
        read(src, pos, stop, &mut attr).await?;
        let kind = u16::from_be_bytes([attr[0], attr[1]]);
        let length = u16::from_be_bytes([attr[2], attr[3]]);
        pos += 4;

        match kind {
            WSC_CREDENTIAL => continue,
            WSC_SSID => ssid = Some(read_value(src, pos, stop, length).await?),
            WSC_NETWORK_KEY => {
                password = Some(read_value(src, pos, stop, length).await?)
            }
            _ => {}
        }
        pos += u32::from(length);
    }

    Some(WifiCredentials { ssid: ssid?, password: password? })
}

/// Read an attribute value. Values longer than `N` are rejected.
async fn read_value<S: ByteSource + ?Sized, const N: usize>(
    src: &S,
    pos: u32,
    end: u32,
    length: u16,
) -> Option<Vec<u8, N>> {
    let mut value = Vec::<u8, N>::new();
    value.resize(usize::from(length), 0).ok()?;
    read(src, pos, end, &mut value).await?;
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_bits() {
        let header = RecordHeader::from_bits_retain(0xD2);
        assert!(header.contains(RecordHeader::MESSAGE_BEGIN));
        assert!(header.contains(RecordHeader::MESSAGE_END));
        assert!(header.contains(RecordHeader::SHORT_RECORD));
        assert!(!header.contains(RecordHeader::ID_LENGTH));
        assert_eq!(header.type_name_format(), TNF_MEDIA);
    }

    #[test]
    fn capability_container_layout() {
        assert_eq!(
            CapabilityContainer::DEFAULT.to_bytes(),
            [0xE1, 0x40, 0x40, 0x01]
        );
    }
}
