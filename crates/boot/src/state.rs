//! Boot state persisted in the battery-backed register bank.
//!
//! The record survives resets but not power removal, which is exactly the
//! lifetime the boot-mode handshake needs: a terminal command parks the
//! next boot's destination here, the reset fires, and the boot sequence
//! reads the verdict back out.
//!
//! Binary layout, 32 bytes packed little-endian into eight registers:
//!
//! ```text
//! offset  size  field
//!      0     4  magic (0xDEAD_BEEF)
//!      4     1  last reset cause
//!      5     1  (pad)
//!      6     2  boot mode
//!      8     1  bus rate selector
//!      9     3  (pad)
//!     12     4  bus settings
//!     16     1  counter
//!     17     7  (pad)
//!     24     8  mode flags
//! ```

use platform::BackupRegisters;
use protocol::BusRate;

/// Marker distinguishing an initialized record from power-on garbage.
pub const BOOT_STATE_MAGIC: u32 = 0xDEAD_BEEF;

/// First backup register used by the record.
const FIRST_REGISTER: usize = 0;

/// Cause of the most recent reset, as sampled from the reset status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetCause {
    #[default]
    Unknown,
    PowerOn,
    HardwarePin,
    Watchdog,
    Software,
}

impl ResetCause {
    /// Decode a stored cause byte. Unrecognized values collapse to
    /// `Unknown` rather than invalidating the whole record.
    #[must_use]
    pub fn from_stored(byte: u8) -> Self {
        match byte {
            0x01 => Self::PowerOn,
            0x02 => Self::HardwarePin,
            0x03 => Self::Watchdog,
            0x04 => Self::Software,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn to_stored(self) -> u8 {
        match self {
            Self::Unknown => 0x00,
            Self::PowerOn => 0x01,
            Self::HardwarePin => 0x02,
            Self::Watchdog => 0x03,
            Self::Software => 0x04,
        }
    }
}

/// Where the next boot should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum BootMode {
    /// Hand off to the vendor's ROM loader.
    VendorBootloader = 0xCAFE,
    /// Stay in this bootloader's command engine.
    ThisBootloader = 0xBABE,
    /// Verify and run the application.
    Application = 0xBEEF,
}

impl BootMode {
    #[must_use]
    pub fn from_stored(word: u16) -> Option<Self> {
        match word {
            0xCAFE => Some(Self::VendorBootloader),
            0xBABE => Some(Self::ThisBootloader),
            0xBEEF => Some(Self::Application),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_stored(self) -> u16 {
        self as u16
    }
}

/// Whether a load found a valid record or had to reinitialize it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadOutcome {
    Valid,
    Reinitialized,
}

/// The persistent boot state record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootState {
    pub last_reset_cause: ResetCause,
    pub boot_mode: BootMode,
    pub bus_rate: BusRate,
    /// Opaque bus tuning word, carried for the application's benefit.
    pub bus_settings: u32,
    /// Free-running boot counter, wraps at 255.
    pub counter: u8,
    /// Application-defined flag bits, preserved verbatim.
    pub mode_flags: u64,
}

impl Default for BootState {
    fn default() -> Self {
        Self {
            last_reset_cause: ResetCause::Unknown,
            boot_mode: BootMode::Application,
            bus_rate: BusRate::DEFAULT,
            bus_settings: 0,
            counter: 0,
            mode_flags: 0,
        }
    }
}

impl BootState {
    /// Encoded record size in bytes.
    pub const SIZE: usize = 32;
    /// Backup registers occupied by the record.
    pub const WORDS: usize = 8;

    #[allow(clippy::indexing_slicing)] // fixed offsets into a fixed-size array
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&BOOT_STATE_MAGIC.to_le_bytes());
        buf[4] = self.last_reset_cause.to_stored();
        buf[6..8].copy_from_slice(&self.boot_mode.to_stored().to_le_bytes());
        buf[8] = self.bus_rate.to_wire();
        buf[12..16].copy_from_slice(&self.bus_settings.to_le_bytes());
        buf[16] = self.counter;
        buf[24..32].copy_from_slice(&self.mode_flags.to_le_bytes());
        buf
    }

    /// Decode a stored record. `None` means the record is absent or
    /// corrupt and must be reinitialized.
    #[allow(clippy::indexing_slicing)] // fixed offsets into a fixed-size array
    #[must_use]
    pub fn decode(buf: &[u8; Self::SIZE]) -> Option<Self> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        if u32::from_le_bytes(magic) != BOOT_STATE_MAGIC {
            return None;
        }

        let mut mode = [0u8; 2];
        mode.copy_from_slice(&buf[6..8]);
        let boot_mode = BootMode::from_stored(u16::from_le_bytes(mode))?;
        let bus_rate = BusRate::from_wire(buf[8])?;

        let mut settings = [0u8; 4];
        settings.copy_from_slice(&buf[12..16]);
        let mut flags = [0u8; 8];
        flags.copy_from_slice(&buf[24..32]);

        Some(Self {
            last_reset_cause: ResetCause::from_stored(buf[4]),
            boot_mode,
            bus_rate,
            bus_settings: u32::from_le_bytes(settings),
            counter: buf[16],
            mode_flags: u64::from_le_bytes(flags),
        })
    }
}

/// Load the record, reinitializing and persisting defaults when it is
/// missing or corrupt.
pub fn load<B: BackupRegisters>(backup: &mut B) -> (BootState, LoadOutcome) {
    let mut buf = [0u8; BootState::SIZE];
    for word in 0..BootState::WORDS {
        let value = backup.read_word(FIRST_REGISTER + word).to_le_bytes();
        let offset = word * 4;
        if let Some(slot) = buf.get_mut(offset..offset + 4) {
            slot.copy_from_slice(&value);
        }
    }
    match BootState::decode(&buf) {
        Some(state) => (state, LoadOutcome::Valid),
        None => {
            let state = BootState::default();
            save(backup, &state);
            (state, LoadOutcome::Reinitialized)
        }
    }
}

/// Persist the record into the backup registers.
pub fn save<B: BackupRegisters>(backup: &mut B, state: &BootState) {
    let buf = state.encode();
    for word in 0..BootState::WORDS {
        let offset = word * 4;
        let mut value = [0u8; 4];
        if let Some(slot) = buf.get(offset..offset + 4) {
            value.copy_from_slice(slot);
        }
        backup.write_word(FIRST_REGISTER + word, u32::from_le_bytes(value));
    }
}
