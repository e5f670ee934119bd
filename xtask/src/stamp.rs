//! Host-side image stamping: the producer of the metadata header the
//! bootloader's verifier checks on every boot.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use boot::regions::APPLICATION_HEADER_SIZE;
use boot::verify::{self, AppMetadata};
use colored::Colorize;

pub fn run(input: &Path, output: Option<&Path>, version: &str) -> Result<()> {
    let image = fs::read(input)
        .with_context(|| format!("failed to read application image {}", input.display()))?;
    if image.is_empty() {
        bail!("application image is empty");
    }
    let capacity = verify::image_capacity() as usize;
    if image.len() > capacity {
        bail!(
            "application image is {} bytes; only {} fit after the header",
            image.len(),
            capacity
        );
    }
    if version.len() > 8 {
        bail!("version string must fit in 8 bytes: {version:?}");
    }

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&image);
    let mut version_bytes = [0u8; 8];
    for (slot, byte) in version_bytes.iter_mut().zip(version.bytes()) {
        *slot = byte;
    }
    let meta = AppMetadata {
        crc: hasher.finalize(),
        length: image.len() as u32,
        version: version_bytes,
    };

    let mut blob = vec![0xFFu8; APPLICATION_HEADER_SIZE as usize];
    blob[..AppMetadata::SIZE].copy_from_slice(&meta.encode());
    blob.extend_from_slice(&image);

    let output = output.map_or_else(|| default_output(input), Path::to_path_buf);
    fs::write(&output, &blob)
        .with_context(|| format!("failed to write stamped image {}", output.display()))?;

    println!(
        "{}",
        format!(
            "✓ Stamped {} ({} image bytes, crc 0x{:08X}) -> {}",
            input.display(),
            meta.length,
            meta.crc,
            output.display()
        )
        .green()
    );
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("stamped.bin")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamped_blob_verifies_against_its_own_header() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("app.bin");
        let image: Vec<u8> = (0..3000u32).map(|i| (i % 201) as u8).collect();
        fs::write(&input, &image).unwrap();

        run(&input, None, "v1.0").unwrap();

        let blob = fs::read(dir.path().join("app.stamped.bin")).unwrap();
        assert_eq!(blob.len(), APPLICATION_HEADER_SIZE as usize + image.len());

        let mut header = [0u8; AppMetadata::SIZE];
        header.copy_from_slice(&blob[..AppMetadata::SIZE]);
        let meta = AppMetadata::decode(&header).unwrap();
        assert_eq!(meta.length as usize, image.len());
        assert_eq!(&meta.version[..4], b"v1.0");

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&blob[APPLICATION_HEADER_SIZE as usize..]);
        assert_eq!(hasher.finalize(), meta.crc);
    }

    #[test]
    fn oversized_image_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("huge.bin");
        fs::write(&input, vec![0u8; verify::image_capacity() as usize + 1]).unwrap();
        assert!(run(&input, None, "v1").is_err());
    }

    #[test]
    fn long_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("app.bin");
        fs::write(&input, [0xAA; 16]).unwrap();
        assert!(run(&input, None, "much-too-long").is_err());
    }
}
