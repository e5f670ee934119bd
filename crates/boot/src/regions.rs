//! Fixed flash memory map.
//!
//! The device carries 512 KiB of on-chip flash split into eight sectors of
//! uneven size. Three logical regions sit on sector boundaries:
//!
//! | Region      | Base          | Size    | Sectors |
//! |-------------|---------------|---------|---------|
//! | Bootloader  | `0x0800_0000` | 16 KiB  | 0       |
//! | UserData    | `0x0800_4000` | 16 KiB  | 1       |
//! | Application | `0x0800_8000` | 480 KiB | 2..=7   |
//!
//! The first KiB of the application region is a metadata header; the vector
//! table and entry point sit immediately after it.

/// First byte of on-chip flash.
pub const FLASH_BASE: u32 = 0x0800_0000;

/// One past the last byte of on-chip flash (512 KiB part).
pub const FLASH_END: u32 = 0x0808_0000;

/// Sector base addresses, ascending.
pub const SECTOR_BASES: [u32; 8] = [
    0x0800_0000,
    0x0800_4000,
    0x0800_8000,
    0x0800_C000,
    0x0801_0000,
    0x0802_0000,
    0x0804_0000,
    0x0806_0000,
];

/// Size of the application metadata header, reserved at the region base.
pub const APPLICATION_HEADER_SIZE: u32 = 1024;

/// Map an address to the sector containing it.
#[must_use]
pub fn sector_of(address: u32) -> Option<u8> {
    if !(FLASH_BASE..FLASH_END).contains(&address) {
        return None;
    }
    let mut sector = 0u8;
    for (index, base) in SECTOR_BASES.iter().enumerate().skip(1) {
        if address < *base {
            break;
        }
        sector = index as u8;
    }
    Some(sector)
}

/// A logical flash region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Region {
    /// The resident bootloader image. Read-only over the wire.
    Bootloader,
    /// Persistent device identity, one sector of its own.
    UserData,
    /// The application image, metadata header included.
    Application,
}

impl Region {
    /// Decode a region selector byte from the wire.
    #[must_use]
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Bootloader),
            0x02 => Some(Self::UserData),
            0x03 => Some(Self::Application),
            _ => None,
        }
    }

    /// Wire encoding of this region selector.
    #[must_use]
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Bootloader => 0x01,
            Self::UserData => 0x02,
            Self::Application => 0x03,
        }
    }

    /// Base address of the region.
    #[must_use]
    pub fn base(self) -> u32 {
        match self {
            Self::Bootloader => 0x0800_0000,
            Self::UserData => 0x0800_4000,
            Self::Application => 0x0800_8000,
        }
    }

    /// Region size in bytes.
    #[must_use]
    pub fn size(self) -> u32 {
        match self {
            Self::Bootloader | Self::UserData => 16 * 1024,
            Self::Application => FLASH_END - self.base(),
        }
    }

    /// First sector covered by the region.
    #[must_use]
    pub fn first_sector(self) -> u8 {
        match self {
            Self::Bootloader => 0,
            Self::UserData => 1,
            Self::Application => 2,
        }
    }

    /// Last sector covered by the region.
    #[must_use]
    pub fn last_sector(self) -> u8 {
        match self {
            Self::Bootloader => 0,
            Self::UserData => 1,
            Self::Application => 7,
        }
    }

    /// Whether the wire protocol may erase or program this region.
    ///
    /// The bootloader never rewrites itself.
    #[must_use]
    pub fn writable(self) -> bool {
        !matches!(self, Self::Bootloader)
    }
}

/// Address of the application entry point, just past the metadata header.
#[must_use]
pub fn application_entry() -> u32 {
    Region::Application.base() + APPLICATION_HEADER_SIZE
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn regions_cover_flash_without_overlap() {
        assert_eq!(Region::Bootloader.base(), FLASH_BASE);
        assert_eq!(
            Region::Bootloader.base() + Region::Bootloader.size(),
            Region::UserData.base()
        );
        assert_eq!(
            Region::UserData.base() + Region::UserData.size(),
            Region::Application.base()
        );
        assert_eq!(
            Region::Application.base() + Region::Application.size(),
            FLASH_END
        );
    }

    #[test]
    fn sector_lookup_matches_bases() {
        for (index, base) in SECTOR_BASES.iter().enumerate() {
            assert_eq!(sector_of(*base), Some(index as u8));
            assert_eq!(sector_of(*base + 1), Some(index as u8));
        }
        assert_eq!(sector_of(FLASH_END - 1), Some(7));
        assert_eq!(sector_of(FLASH_END), None);
        assert_eq!(sector_of(FLASH_BASE - 1), None);
    }

    #[test]
    fn wire_selectors_round_trip() {
        for byte in [0x01, 0x02, 0x03] {
            let region = Region::from_wire(byte).unwrap();
            assert_eq!(region.to_wire(), byte);
        }
        assert_eq!(Region::from_wire(0x00), None);
        assert_eq!(Region::from_wire(0x04), None);
    }

    #[test]
    fn bootloader_region_is_protected() {
        assert!(!Region::Bootloader.writable());
        assert!(Region::UserData.writable());
        assert!(Region::Application.writable());
    }

    #[test]
    fn entry_point_sits_after_header() {
        assert_eq!(application_entry(), 0x0800_8400);
    }
}
