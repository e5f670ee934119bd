//! Flash controller seam.
//!
//! Mirrors the primitive set a typical embedded flash peripheral exposes:
//! unlock/lock gating, whole-sector erase, and program operations at word,
//! halfword, and byte width. The controller verifies each program/erase
//! internally; a reported failure means the cell contents are undefined.

/// Failure reported by the flash controller or the region layer above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Sector erase did not verify.
    Erase {
        /// Physical sector index.
        sector: u8,
    },
    /// Program operation did not verify at this address.
    Program {
        /// First byte of the failed transfer.
        address: u32,
    },
    /// Operation attempted while the controller was locked.
    Locked,
    /// Address or range falls outside the device's flash.
    OutOfBounds {
        /// Offending address.
        address: u32,
    },
}

/// Exclusive-access flash controller.
///
/// Callers bracket every erase/program sequence with [`unlock`] and
/// [`lock`], releasing unconditionally even on failure. The lock exists to
/// prevent accidental programming, not to arbitrate concurrent callers —
/// the bootloader is single-threaded.
///
/// [`unlock`]: FlashController::unlock
/// [`lock`]: FlashController::lock
pub trait FlashController {
    /// Open the controller for erase/program operations.
    fn unlock(&mut self);

    /// Close the controller again.
    fn lock(&mut self);

    /// Erase one physical sector to the all-ones pattern.
    fn erase_sector(&mut self, sector: u8) -> Result<(), FlashError>;

    /// Program a 32-bit word at a 4-byte-aligned address.
    fn program_word(&mut self, address: u32, value: u32) -> Result<(), FlashError>;

    /// Program a 16-bit halfword at a 2-byte-aligned address.
    fn program_halfword(&mut self, address: u32, value: u16) -> Result<(), FlashError>;

    /// Program a single byte.
    fn program_byte(&mut self, address: u32, value: u8) -> Result<(), FlashError>;

    /// Copy `buf.len()` bytes starting at `address` out of flash.
    /// Reads never require an unlock.
    fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), FlashError>;
}
