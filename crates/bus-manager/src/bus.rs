/// Identifier of one physical I2C peripheral.
///
/// Buses are numbered from 1, matching the board's `I2C1`..`I2C3` naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusId(u8);

impl BusId {
    pub const I2C1: Self = Self(1);
    pub const I2C2: Self = Self(2);
    pub const I2C3: Self = Self(3);

    /// Bus with the given 1-based number. Returns `None` for 0.
    pub const fn new(number: u8) -> Option<Self> {
        if number == 0 {
            None
        } else {
            Some(Self(number))
        }
    }

    pub const fn number(self) -> u8 {
        self.0
    }

    /// Zero-based slot in a per-bus table.
    pub const fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl core::fmt::Display for BusId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "i2c{}", self.0)
    }
}
