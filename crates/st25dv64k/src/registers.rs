//! Address spaces and register map.

/// The two I2C targets the tag answers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Space {
    /// User memory and dynamic registers.
    Memory,
    /// Static system configuration registers.
    Registers,
}

impl Space {
    /// 7-bit target address.
    pub const fn address(self) -> u8 {
        match self {
            Space::Memory => 0x53,
            Space::Registers => 0x57,
        }
    }
}

// System configuration registers (Space::Registers)
pub const REG_RFA1SS: u16 = 0x0004;
pub const REG_ENDA1: u16 = 0x0005;
pub const REG_RFA2SS: u16 = 0x0006;
pub const REG_ENDA2: u16 = 0x0007;
pub const REG_RFA3SS: u16 = 0x0008;
pub const REG_ENDA3: u16 = 0x0009;
pub const REG_LOCK_CCFILE: u16 = 0x000C;

// Dynamic registers (Space::Memory)
pub const MEM_RF_MNGT_DYN: u16 = 0x2003;
pub const MEM_IT_STS_DYN: u16 = 0x2005;

/// RF_MNGT_Dyn bit that switches the RF interface off.
pub const RF_DISABLE: u8 = 0x01;

/// Area 1 end: user memory 0x0000..=0x04FF.
pub const ENDA1_LAYOUT: u8 = 0x27;
/// Areas 2 and 3 end at the top of memory.
pub const ENDA2_LAYOUT: u8 = 0xFF;
pub const ENDA3_LAYOUT: u8 = 0xFF;
/// RF read/write, no password.
pub const RF_AREA_OPEN: u8 = 0b0000;
/// No RF access at all.
pub const RF_AREA_CLOSED: u8 = 0b1101;

/// Frame opening an I2C security session (or closing it with zeros).
pub const fn password_frame(password: Option<&[u8; 8]>) -> [u8; 19] {
    let mut frame = [0u8; 19];
    frame[0] = 0x09;
    frame[10] = 0x09;
    if let Some(pwd) = password {
        let mut i = 0;
        while i < 8 {
            frame[2 + i] = pwd[i];
            frame[11 + i] = pwd[i];
            i += 1;
        }
    }
    frame
}
