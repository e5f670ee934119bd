//! Command opcodes and the small wire ids that ride alongside them.
//!
//! A command exchange is symmetric across both transports: one opcode byte,
//! transport-framed parameters, and a reply that always starts with the pair
//! `(opcode, ACK_BYTE)` or `(opcode, NACK_BYTE)`.

/// Positive acknowledgment status byte. Shares its value with [`Opcode::Ack`].
pub const ACK_BYTE: u8 = 0x0F;

/// Negative acknowledgment status byte. Shares its value with [`Opcode::Nack`].
pub const NACK_BYTE: u8 = 0x00;

/// Version byte reported by the VERSION command.
pub const BUILD_VERSION: u8 = 0x01;

/// Bytes buffered per WRITE chunk before committing to flash.
pub const SEGMENT_SIZE: usize = 1024;

/// Command opcodes, one byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Opcode {
    /// Negative acknowledgment; aborts an in-flight sub-exchange.
    Nack = 0x00,
    /// Report the bootloader build version.
    Version = 0x01,
    /// Switch the active transport to a new rate.
    Speed = 0x02,
    /// Erase a flash region.
    Erase = 0x03,
    /// Stream a flash region back to the remote.
    Read = 0x04,
    /// One outbound data frame of a READ reply (bus transport).
    ReadSegment = 0x05,
    /// Program a flash region from chunked segments.
    Write = 0x06,
    /// One inbound data frame of a WRITE payload.
    WriteSegment = 0x07,
    /// Run the application verifier.
    Verify = 0x08,
    /// Persist application boot mode and reset.
    Execute = 0x09,
    /// Reserved secure-access command; currently acknowledge-only.
    Secure = 0x0A,
    /// Read one device identity field.
    ReadKey = 0x0B,
    /// Update one in-memory device identity field.
    WriteKey = 0x0C,
    /// Commit the in-memory identity record to flash.
    SaveKeys = 0x0D,
    /// Set a non-application boot mode and reset.
    Reset = 0x0E,
    /// Loopback liveness probe; also the session handshake byte.
    Ack = 0x0F,
}

impl Opcode {
    /// Decode a wire byte. Returns `None` for the unassigned range, which the
    /// engine answers with a nack framed around the raw value.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Nack),
            0x01 => Some(Self::Version),
            0x02 => Some(Self::Speed),
            0x03 => Some(Self::Erase),
            0x04 => Some(Self::Read),
            0x05 => Some(Self::ReadSegment),
            0x06 => Some(Self::Write),
            0x07 => Some(Self::WriteSegment),
            0x08 => Some(Self::Verify),
            0x09 => Some(Self::Execute),
            0x0A => Some(Self::Secure),
            0x0B => Some(Self::ReadKey),
            0x0C => Some(Self::WriteKey),
            0x0D => Some(Self::SaveKeys),
            0x0E => Some(Self::Reset),
            0x0F => Some(Self::Ack),
            _ => None,
        }
    }

    /// The wire byte for this opcode.
    #[must_use]
    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

/// Identity record field ids used by READ_KEY / WRITE_KEY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Key {
    /// Board id (1 byte).
    Board = 0x01,
    /// Node id (1 byte).
    Node = 0x02,
    /// Board revision (1 byte).
    Revision = 0x03,
    /// Part number (4 bytes).
    PartNumber = 0x04,
    /// Serial number (4 bytes).
    SerialNumber = 0x05,
    /// Manufacture date as month, day, year (3 bytes).
    ManufactureDate = 0x06,
}

impl Key {
    /// Decode a wire byte; unknown ids are nacked by the engine.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Board),
            0x02 => Some(Self::Node),
            0x03 => Some(Self::Revision),
            0x04 => Some(Self::PartNumber),
            0x05 => Some(Self::SerialNumber),
            0x06 => Some(Self::ManufactureDate),
            _ => None,
        }
    }

    /// The wire byte for this key.
    #[must_use]
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// Width of the value carried for this key, in bytes.
    #[must_use]
    pub fn value_len(self) -> usize {
        match self {
            Self::Board | Self::Node | Self::Revision => 1,
            Self::PartNumber | Self::SerialNumber => 4,
            Self::ManufactureDate => 3,
        }
    }
}

/// Target modes accepted by the RESET command.
///
/// Application mode is not reachable through RESET; EXECUTE owns that path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ResetTarget {
    /// Stay in this bootloader after the reset.
    ThisBootloader = 0x01,
    /// Hand off to the manufacturer's ROM bootloader after the reset.
    VendorBootloader = 0x02,
}

impl ResetTarget {
    /// Decode a wire byte; unknown targets are nacked without resetting.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::ThisBootloader),
            0x02 => Some(Self::VendorBootloader),
            _ => None,
        }
    }
}
