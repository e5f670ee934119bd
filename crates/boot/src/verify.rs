//! Application integrity checking.
//!
//! The first KiB of the application region holds a metadata header written
//! by the host-side image tool. The verifier trusts nothing until the
//! header magic matches, the stored length fits the image area, the stored
//! CRC is not an erased-flash or zero sentinel, and a full CRC32 (IEEE)
//! pass over the image bytes reproduces the stored value.
//!
//! Header layout, 20 bytes little-endian at the region base:
//!
//! ```text
//! offset  size  field
//!      0     4  magic (0xDEAD_BABE)
//!      4     4  image CRC32
//!      8     4  image length in bytes
//!     12     8  version string, NUL padded
//! ```

use platform::{FlashController, FlashError};

use crate::flash::FlashManager;
use crate::regions::{Region, APPLICATION_HEADER_SIZE};

/// Marker distinguishing a written header from erased flash.
pub const METADATA_MAGIC: u32 = 0xDEAD_BABE;

/// Bytes hashed per verifier step.
const SCAN_CHUNK: usize = 256;

/// The application metadata header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AppMetadata {
    pub crc: u32,
    pub length: u32,
    pub version: [u8; 8],
}

impl AppMetadata {
    /// Encoded header size in bytes.
    pub const SIZE: usize = 20;

    #[allow(clippy::indexing_slicing)] // fixed offsets into a fixed-size array
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&METADATA_MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&self.crc.to_le_bytes());
        buf[8..12].copy_from_slice(&self.length.to_le_bytes());
        buf[12..20].copy_from_slice(&self.version);
        buf
    }

    /// Decode a stored header. `None` means no header has been written.
    #[allow(clippy::indexing_slicing)] // fixed offsets into a fixed-size array
    #[must_use]
    pub fn decode(buf: &[u8; Self::SIZE]) -> Option<Self> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        if u32::from_le_bytes(magic) != METADATA_MAGIC {
            return None;
        }

        let mut crc = [0u8; 4];
        crc.copy_from_slice(&buf[4..8]);
        let mut length = [0u8; 4];
        length.copy_from_slice(&buf[8..12]);
        let mut version = [0u8; 8];
        version.copy_from_slice(&buf[12..20]);

        Some(Self {
            crc: u32::from_le_bytes(crc),
            length: u32::from_le_bytes(length),
            version,
        })
    }

    /// Whether the stored CRC and length look like real values rather
    /// than erased-flash or zero sentinels.
    #[must_use]
    pub fn is_plausible(&self) -> bool {
        self.crc != 0
            && self.crc != u32::MAX
            && self.length > 0
            && self.length <= image_capacity()
    }
}

/// Bytes available for the image proper, after the header.
#[must_use]
pub fn image_capacity() -> u32 {
    Region::Application.size() - APPLICATION_HEADER_SIZE
}

/// Read the metadata header from flash.
pub fn load_metadata<F: FlashController>(
    flash: &FlashManager<'_, F>,
) -> Result<Option<AppMetadata>, FlashError> {
    let mut buf = [0u8; AppMetadata::SIZE];
    flash.read(Region::Application.base(), &mut buf)?;
    Ok(AppMetadata::decode(&buf))
}

/// Number of bytes a READ of the application region should stream: the
/// recorded image length when the header is trustworthy, the whole region
/// otherwise.
pub fn readable_length<F: FlashController>(
    flash: &FlashManager<'_, F>,
) -> Result<u32, FlashError> {
    match load_metadata(flash)? {
        Some(meta) if meta.is_plausible() => Ok(meta.length),
        _ => Ok(Region::Application.size()),
    }
}

/// Run the full integrity check over the resident application.
pub fn verify<F: FlashController>(flash: &FlashManager<'_, F>) -> Result<bool, FlashError> {
    let Some(meta) = load_metadata(flash)? else {
        return Ok(false);
    };
    if !meta.is_plausible() {
        return Ok(false);
    }

    let mut hasher = crc32fast::Hasher::new();
    let mut address = Region::Application.base() + APPLICATION_HEADER_SIZE;
    let mut remaining = meta.length as usize;
    let mut chunk = [0u8; SCAN_CHUNK];
    while remaining > 0 {
        let step = remaining.min(SCAN_CHUNK);
        let Some(buf) = chunk.get_mut(..step) else {
            return Ok(false);
        };
        flash.read(address, buf)?;
        hasher.update(buf);
        address += step as u32;
        remaining -= step;
    }
    Ok(hasher.finalize() == meta.crc)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::mocks::MockFlash;
    use crate::regions::{FLASH_BASE, FLASH_END, SECTOR_BASES};

    fn mock() -> MockFlash {
        let mut sizes = Vec::new();
        for (index, base) in SECTOR_BASES.iter().enumerate() {
            let end = SECTOR_BASES.get(index + 1).copied().unwrap_or(FLASH_END);
            sizes.push(end - base);
        }
        MockFlash::new(FLASH_BASE, &sizes)
    }

    fn install_image(dev: &mut MockFlash, image: &[u8], crc: u32) {
        let meta = AppMetadata {
            crc,
            length: image.len() as u32,
            version: *b"v1.2.3\0\0",
        };
        let mut flash = FlashManager::new(dev);
        flash
            .program(Region::Application.base(), &meta.encode())
            .unwrap();
        flash
            .program(Region::Application.base() + APPLICATION_HEADER_SIZE, image)
            .unwrap();
    }

    fn crc_of(image: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(image);
        hasher.finalize()
    }

    #[test]
    fn metadata_round_trip() {
        let meta = AppMetadata {
            crc: 0x1234_5678,
            length: 2048,
            version: *b"v0.9\0\0\0\0",
        };
        assert_eq!(AppMetadata::decode(&meta.encode()).unwrap(), meta);
    }

    #[test]
    fn valid_image_passes() {
        let image: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
        let mut dev = mock();
        install_image(&mut dev, &image, crc_of(&image));
        let flash = FlashManager::new(&mut dev);
        assert!(verify(&flash).unwrap());
    }

    #[test]
    fn corrupted_byte_fails() {
        let image: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
        let mut dev = mock();
        install_image(&mut dev, &image, crc_of(&image) ^ 1);
        let flash = FlashManager::new(&mut dev);
        assert!(!verify(&flash).unwrap());
    }

    #[test]
    fn erased_flash_fails_without_scanning() {
        let mut dev = mock();
        let flash = FlashManager::new(&mut dev);
        assert!(!verify(&flash).unwrap());
    }

    #[test]
    fn sentinel_crc_values_fail() {
        let image = vec![0xABu8; 64];
        for sentinel in [0u32, u32::MAX] {
            let mut dev = mock();
            install_image(&mut dev, &image, sentinel);
            let flash = FlashManager::new(&mut dev);
            assert!(!verify(&flash).unwrap());
        }
    }

    #[test]
    fn oversized_length_fails() {
        let mut dev = mock();
        let meta = AppMetadata {
            crc: 0x1111_1111,
            length: image_capacity() + 1,
            version: [0; 8],
        };
        {
            let mut flash = FlashManager::new(&mut dev);
            flash
                .program(Region::Application.base(), &meta.encode())
                .unwrap();
        }
        let flash = FlashManager::new(&mut dev);
        assert!(!verify(&flash).unwrap());
    }

    #[test]
    fn readable_length_prefers_metadata() {
        let image = vec![0x5Au8; 300];
        let mut dev = mock();
        install_image(&mut dev, &image, crc_of(&image));
        let flash = FlashManager::new(&mut dev);
        assert_eq!(readable_length(&flash).unwrap(), 300);
    }

    #[test]
    fn readable_length_falls_back_to_region_size() {
        let mut dev = mock();
        let flash = FlashManager::new(&mut dev);
        assert_eq!(readable_length(&flash).unwrap(), Region::Application.size());
    }
}
