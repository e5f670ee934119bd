//! Region-level erase, program and read on top of the flash seam.
//!
//! The controller seam exposes raw word/halfword/byte programming and
//! per-sector erase. This layer adds the bracketing every caller needs:
//! unlock before touching flash, relock afterwards even on failure, erase
//! ascending across a sector range, and pick the widest program unit the
//! current alignment and remaining length allow.

use platform::{FlashController, FlashError};

use crate::regions::{self, Region};

/// Chunked flash access scoped to the fixed region map.
pub struct FlashManager<'a, F: FlashController> {
    dev: &'a mut F,
}

impl<'a, F: FlashController> FlashManager<'a, F> {
    pub fn new(dev: &'a mut F) -> Self {
        Self { dev }
    }

    /// Erase every sector of `region`, ascending.
    ///
    /// The controller is relocked before returning, success or not.
    pub fn erase_region(&mut self, region: Region) -> Result<(), FlashError> {
        self.erase_sectors(region.first_sector(), region.last_sector())
    }

    /// Erase sectors `first..=last`, ascending.
    pub fn erase_sectors(&mut self, first: u8, last: u8) -> Result<(), FlashError> {
        self.dev.unlock();
        let mut result = Ok(());
        for sector in first..=last {
            result = self.dev.erase_sector(sector);
            if result.is_err() {
                break;
            }
        }
        self.dev.lock();
        result
    }

    /// Program `bytes` starting at `address`.
    ///
    /// Each step uses the widest unit that both the current address
    /// alignment and the remaining length permit: a word, then a halfword,
    /// then single bytes. The controller is relocked before returning.
    pub fn program(&mut self, address: u32, bytes: &[u8]) -> Result<(), FlashError> {
        if !range_in_flash(address, bytes.len()) {
            return Err(FlashError::OutOfBounds { address });
        }
        self.dev.unlock();
        let result = self.program_unlocked(address, bytes);
        self.dev.lock();
        result
    }

    fn program_unlocked(&mut self, mut address: u32, mut bytes: &[u8]) -> Result<(), FlashError> {
        while !bytes.is_empty() {
            if address % 4 == 0 && bytes.len() >= 4 {
                let (head, tail) = bytes.split_at(4);
                let mut word = [0u8; 4];
                word.copy_from_slice(head);
                self.dev.program_word(address, u32::from_le_bytes(word))?;
                address += 4;
                bytes = tail;
            } else if address % 2 == 0 && bytes.len() >= 2 {
                let (head, tail) = bytes.split_at(2);
                let mut half = [0u8; 2];
                half.copy_from_slice(head);
                self.dev.program_halfword(address, u16::from_le_bytes(half))?;
                address += 2;
                bytes = tail;
            } else if let Some((&byte, tail)) = bytes.split_first() {
                self.dev.program_byte(address, byte)?;
                address += 1;
                bytes = tail;
            }
        }
        Ok(())
    }

    /// Read `buf.len()` bytes starting at `address`.
    pub fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        if !range_in_flash(address, buf.len()) {
            return Err(FlashError::OutOfBounds { address });
        }
        self.dev.read(address, buf)
    }
}

fn range_in_flash(address: u32, len: usize) -> bool {
    let Ok(len) = u32::try_from(len) else {
        return false;
    };
    let Some(end) = address.checked_add(len) else {
        return false;
    };
    address >= regions::FLASH_BASE && end <= regions::FLASH_END
}
