//! Transport rate enums for the SPEED command.
//!
//! The wire byte 0 is reserved for board-specific "custom" timing on both
//! transports and is rejected by SPEED; only the named rates are accepted.

/// Serial link rates. Wire values count *down* as the rate climbs, a quirk
/// of the deployed hosts' numbering kept for wire compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SerialRate {
    /// 921600 bps.
    B921600 = 0x01,
    /// 460800 bps.
    B460800 = 0x02,
    /// 230400 bps.
    B230400 = 0x03,
    /// 115200 bps (power-on default).
    B115200 = 0x04,
}

impl SerialRate {
    /// Power-on rate for the serial link.
    pub const DEFAULT: Self = Self::B115200;

    /// Decode a SPEED parameter byte.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::B921600),
            0x02 => Some(Self::B460800),
            0x03 => Some(Self::B230400),
            0x04 => Some(Self::B115200),
            _ => None,
        }
    }

    /// The wire byte for this rate.
    #[must_use]
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// The rate in bits per second.
    #[must_use]
    pub fn bps(self) -> u32 {
        match self {
            Self::B921600 => 921_600,
            Self::B460800 => 460_800,
            Self::B230400 => 230_400,
            Self::B115200 => 115_200,
        }
    }
}

/// Multi-drop bus rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BusRate {
    /// 1 Mbit/s.
    K1000 = 0x01,
    /// 500 kbit/s (power-on default).
    K500 = 0x02,
    /// 250 kbit/s.
    K250 = 0x03,
    /// 125 kbit/s.
    K125 = 0x04,
}

impl BusRate {
    /// Power-on rate for the bus.
    pub const DEFAULT: Self = Self::K500;

    /// Decode a SPEED parameter byte.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::K1000),
            0x02 => Some(Self::K500),
            0x03 => Some(Self::K250),
            0x04 => Some(Self::K125),
            _ => None,
        }
    }

    /// The wire byte for this rate.
    #[must_use]
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// The rate in bits per second.
    #[must_use]
    pub fn bps(self) -> u32 {
        match self {
            Self::K1000 => 1_000_000,
            Self::K500 => 500_000,
            Self::K250 => 250_000,
            Self::K125 => 125_000,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // tests use unwrap() for readable assertions
mod tests {
    use super::*;

    #[test]
    fn serial_rate_roundtrip() {
        for byte in 0x01..=0x04 {
            assert_eq!(SerialRate::from_wire(byte).unwrap().to_wire(), byte);
        }
    }

    #[test]
    fn serial_rate_rejects_custom_and_out_of_range() {
        assert_eq!(SerialRate::from_wire(0x00), None);
        assert_eq!(SerialRate::from_wire(0x05), None);
    }

    #[test]
    fn serial_wire_order_is_descending_in_speed() {
        assert!(SerialRate::B921600.to_wire() < SerialRate::B115200.to_wire());
        assert!(SerialRate::B921600.bps() > SerialRate::B115200.bps());
    }

    #[test]
    fn bus_rate_roundtrip() {
        for byte in 0x01..=0x04 {
            assert_eq!(BusRate::from_wire(byte).unwrap().to_wire(), byte);
        }
        assert_eq!(BusRate::from_wire(0x00), None);
        assert_eq!(BusRate::from_wire(0x05), None);
    }

    #[test]
    fn defaults_match_power_on_rates() {
        assert_eq!(SerialRate::DEFAULT.bps(), 115_200);
        assert_eq!(BusRate::DEFAULT.bps(), 500_000);
    }
}
