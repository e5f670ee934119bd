//! Device identity persisted in the UserData flash sector.
//!
//! Six fields, each addressable over the wire by a key selector: bus
//! addressing (board and node), hardware revision, part number, serial
//! number and manufacture date. Key writes only touch the in-memory copy;
//! a separate save command commits the whole record with an erase-program
//! cycle so the sector is rewritten at most once per session.
//!
//! Binary layout, 20 bytes little-endian at the UserData base:
//!
//! ```text
//! offset  size  field
//!      0     4  magic (0xCAFE_BABE)
//!      4     1  board address
//!      5     1  node address
//!      6     1  hardware revision
//!      7     1  (pad)
//!      8     4  part number
//!     12     4  serial number
//!     16     3  manufacture date (month, day, year)
//!     19     1  (pad)
//! ```

use platform::{FlashController, FlashError};
use protocol::Key;

use crate::flash::FlashManager;
use crate::regions::Region;
use crate::state::LoadOutcome;

/// Marker distinguishing a provisioned identity from erased flash.
pub const IDENTITY_MAGIC: u32 = 0xCAFE_BABE;

/// The persistent device identity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UserIdentity {
    /// Bus board address, low 4 bits significant.
    pub board: u8,
    /// Bus node address, low 4 bits significant.
    pub node: u8,
    pub revision: u8,
    pub part_number: u32,
    pub serial_number: u32,
    /// Month, day, year.
    pub manufacture_date: [u8; 3],
}

impl UserIdentity {
    /// Encoded record size in bytes.
    pub const SIZE: usize = 20;

    #[allow(clippy::indexing_slicing)] // fixed offsets into a fixed-size array
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&IDENTITY_MAGIC.to_le_bytes());
        buf[4] = self.board;
        buf[5] = self.node;
        buf[6] = self.revision;
        buf[8..12].copy_from_slice(&self.part_number.to_le_bytes());
        buf[12..16].copy_from_slice(&self.serial_number.to_le_bytes());
        buf[16..19].copy_from_slice(&self.manufacture_date);
        buf
    }

    /// Decode a stored record. `None` means the sector holds no
    /// provisioned identity.
    #[allow(clippy::indexing_slicing)] // fixed offsets into a fixed-size array
    #[must_use]
    pub fn decode(buf: &[u8; Self::SIZE]) -> Option<Self> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        if u32::from_le_bytes(magic) != IDENTITY_MAGIC {
            return None;
        }

        let mut part = [0u8; 4];
        part.copy_from_slice(&buf[8..12]);
        let mut serial = [0u8; 4];
        serial.copy_from_slice(&buf[12..16]);
        let mut date = [0u8; 3];
        date.copy_from_slice(&buf[16..19]);

        Some(Self {
            board: buf[4],
            node: buf[5],
            revision: buf[6],
            part_number: u32::from_le_bytes(part),
            serial_number: u32::from_le_bytes(serial),
            manufacture_date: date,
        })
    }

    /// Wire bytes for a key read, widest key first in the buffer.
    #[must_use]
    pub fn field_bytes(&self, key: Key) -> heapless::Vec<u8, 4> {
        let mut out = heapless::Vec::new();
        let bytes: &[u8] = match key {
            Key::Board => &[self.board],
            Key::Node => &[self.node],
            Key::Revision => &[self.revision],
            Key::PartNumber => &self.part_number.to_be_bytes(),
            Key::SerialNumber => &self.serial_number.to_be_bytes(),
            Key::ManufactureDate => &self.manufacture_date,
        };
        for &byte in bytes {
            // field widths never exceed the buffer capacity
            let _ = out.push(byte);
        }
        out
    }
}

/// Load the identity, provisioning and persisting a zeroed record when
/// the sector holds none.
pub fn load<F: FlashController>(
    flash: &mut FlashManager<'_, F>,
) -> Result<(UserIdentity, LoadOutcome), FlashError> {
    let mut buf = [0u8; UserIdentity::SIZE];
    flash.read(Region::UserData.base(), &mut buf)?;
    match UserIdentity::decode(&buf) {
        Some(identity) => Ok((identity, LoadOutcome::Valid)),
        None => {
            let identity = UserIdentity::default();
            save(flash, &identity)?;
            Ok((identity, LoadOutcome::Reinitialized))
        }
    }
}

/// Commit the identity to flash with an erase-program cycle.
pub fn save<F: FlashController>(
    flash: &mut FlashManager<'_, F>,
    identity: &UserIdentity,
) -> Result<(), FlashError> {
    flash.erase_region(Region::UserData)?;
    flash.program(Region::UserData.base(), &identity.encode())
}
