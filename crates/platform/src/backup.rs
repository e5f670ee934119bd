//! Battery-backed register file seam.
//!
//! A small bank of 32-bit registers that survives resets (and, with a
//! battery, power loss). The persistent boot state lives here. Transfers
//! are whole words; a power loss between two writes can leave a mixed
//! old/new record, which the store layer above accepts as a platform risk.

/// Word-addressed battery-backed register file.
pub trait BackupRegisters {
    /// Read the 32-bit register at `index`.
    fn read_word(&self, index: usize) -> u32;

    /// Write the 32-bit register at `index`.
    fn write_word(&mut self, index: usize, value: u32);
}
