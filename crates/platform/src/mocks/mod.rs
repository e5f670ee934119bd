//! Mock peripherals for host-side testing.
//!
//! Faithful enough to catch sequencing bugs: the flash mock enforces the
//! unlock/lock bracket and NOR program semantics (bits only clear, never
//! set, so programming a non-erased cell fails verification), and the bus
//! mock applies the installed acceptance filters to injected frames.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::indexing_slicing)] // mock memory indices are bounds-checked before use

use std::collections::VecDeque;
use std::vec::Vec;

use protocol::{AcceptanceFilter, BusRate, SerialRate};

use crate::bus::{BusFrame, BusInterface};
use crate::{BackupRegisters, FlashController, FlashError, SerialPort};

// ---------------------------------------------------------------------------
// MockFlash
// ---------------------------------------------------------------------------

/// In-memory flash with real sector geometry and NOR program semantics.
pub struct MockFlash {
    base: u32,
    mem: Vec<u8>,
    sector_bases: Vec<u32>,
    sector_sizes: Vec<u32>,
    locked: bool,
    /// When set, the Nth-from-now program operation reports failure.
    fail_program_in: Option<usize>,
    /// Sectors whose erase is forced to fail.
    failing_sectors: Vec<u8>,
}

impl MockFlash {
    /// Build a device at `base` from a list of sector sizes in bytes.
    #[must_use]
    pub fn new(base: u32, sector_sizes: &[u32]) -> Self {
        let mut sector_bases = Vec::with_capacity(sector_sizes.len());
        let mut addr = base;
        for &size in sector_sizes {
            sector_bases.push(addr);
            addr += size;
        }
        let total = (addr - base) as usize;
        Self {
            base,
            mem: std::vec![0xFF; total],
            sector_bases,
            sector_sizes: sector_sizes.to_vec(),
            locked: true,
            fail_program_in: None,
            failing_sectors: Vec::new(),
        }
    }

    /// Arrange for the program operation `n` calls from now to fail
    /// (0 = the very next one).
    pub fn fail_program_in(&mut self, n: usize) {
        self.fail_program_in = Some(n);
    }

    /// Force every erase of `sector` to fail.
    pub fn fail_erase_of(&mut self, sector: u8) {
        self.failing_sectors.push(sector);
    }

    /// Whether the controller is currently locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Direct view of the backing memory, for assertions.
    #[must_use]
    pub fn contents(&self, address: u32, len: usize) -> &[u8] {
        let offset = (address - self.base) as usize;
        &self.mem[offset..offset + len]
    }

    /// Write bytes directly, bypassing program semantics. Used by tests to
    /// seed images and metadata as a factory programmer would.
    pub fn seed(&mut self, address: u32, bytes: &[u8]) {
        let offset = (address - self.base) as usize;
        self.mem[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn offset_of(&self, address: u32, len: usize) -> Result<usize, FlashError> {
        let end = self.base + self.mem.len() as u32;
        if address < self.base || u64::from(address) + len as u64 > u64::from(end) {
            return Err(FlashError::OutOfBounds { address });
        }
        Ok((address - self.base) as usize)
    }

    fn program(&mut self, address: u32, bytes: &[u8]) -> Result<(), FlashError> {
        if self.locked {
            return Err(FlashError::Locked);
        }
        match self.fail_program_in {
            Some(0) => {
                self.fail_program_in = None;
                return Err(FlashError::Program { address });
            }
            Some(n) => self.fail_program_in = Some(n - 1),
            None => {}
        }
        let offset = self.offset_of(address, bytes.len())?;
        for (i, &byte) in bytes.iter().enumerate() {
            // NOR: programming can only clear bits
            self.mem[offset + i] &= byte;
            if self.mem[offset + i] != byte {
                return Err(FlashError::Program { address });
            }
        }
        Ok(())
    }
}

impl FlashController for MockFlash {
    fn unlock(&mut self) {
        self.locked = false;
    }

    fn lock(&mut self) {
        self.locked = true;
    }

    fn erase_sector(&mut self, sector: u8) -> Result<(), FlashError> {
        if self.locked {
            return Err(FlashError::Locked);
        }
        if self.failing_sectors.contains(&sector) {
            return Err(FlashError::Erase { sector });
        }
        let index = sector as usize;
        if index >= self.sector_bases.len() {
            return Err(FlashError::Erase { sector });
        }
        let offset = (self.sector_bases[index] - self.base) as usize;
        let size = self.sector_sizes[index] as usize;
        for byte in &mut self.mem[offset..offset + size] {
            *byte = 0xFF;
        }
        Ok(())
    }

    fn program_word(&mut self, address: u32, value: u32) -> Result<(), FlashError> {
        self.program(address, &value.to_le_bytes())
    }

    fn program_halfword(&mut self, address: u32, value: u16) -> Result<(), FlashError> {
        self.program(address, &value.to_le_bytes())
    }

    fn program_byte(&mut self, address: u32, value: u8) -> Result<(), FlashError> {
        self.program(address, &[value])
    }

    fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let offset = self.offset_of(address, buf.len())?;
        buf.copy_from_slice(&self.mem[offset..offset + buf.len()]);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockBackupDomain
// ---------------------------------------------------------------------------

/// Battery-backed register file; 20 words like the usual RTC backup bank.
pub struct MockBackupDomain {
    words: [u32; 20],
}

impl MockBackupDomain {
    /// Fresh domain with undefined (here: zero) contents, as after a
    /// battery swap.
    #[must_use]
    pub fn new() -> Self {
        Self { words: [0; 20] }
    }
}

impl Default for MockBackupDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupRegisters for MockBackupDomain {
    fn read_word(&self, index: usize) -> u32 {
        self.words.get(index).copied().unwrap_or(0)
    }

    fn write_word(&mut self, index: usize, value: u32) {
        if let Some(slot) = self.words.get_mut(index) {
            *slot = value;
        }
    }
}

// ---------------------------------------------------------------------------
// MockSerialPort
// ---------------------------------------------------------------------------

/// Scripted serial port: tests pre-load the receive queue and inspect the
/// transmit capture after the exchange.
pub struct MockSerialPort {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    rate: SerialRate,
}

impl MockSerialPort {
    /// Empty port at the default rate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            tx: Vec::new(),
            rate: SerialRate::DEFAULT,
        }
    }

    /// Queue bytes for the device to receive.
    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Drain and return everything the device transmitted so far.
    pub fn take_tx(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.tx)
    }

    /// The currently configured rate.
    #[must_use]
    pub fn rate(&self) -> SerialRate {
        self.rate
    }
}

impl Default for MockSerialPort {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPort for MockSerialPort {
    fn send(&mut self, byte: u8) {
        self.tx.push(byte);
    }

    fn poll(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn set_rate(&mut self, rate: SerialRate) {
        self.rate = rate;
    }
}

// ---------------------------------------------------------------------------
// MockBus
// ---------------------------------------------------------------------------

/// Scripted bus interface. Injected frames pass through the installed
/// acceptance filters exactly as the hardware mailbox would.
pub struct MockBus {
    rx: VecDeque<BusFrame>,
    tx: Vec<BusFrame>,
    filters: Vec<AcceptanceFilter>,
    rate: BusRate,
}

impl MockBus {
    /// Empty bus at the default rate with no filters (admit everything).
    #[must_use]
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            tx: Vec::new(),
            filters: Vec::new(),
            rate: BusRate::DEFAULT,
        }
    }

    /// Queue a frame for the device to receive.
    pub fn push_rx(&mut self, frame: BusFrame) {
        self.rx.push_back(frame);
    }

    /// Drain and return everything the device transmitted so far.
    pub fn take_tx(&mut self) -> Vec<BusFrame> {
        core::mem::take(&mut self.tx)
    }

    /// The currently configured rate.
    #[must_use]
    pub fn rate(&self) -> BusRate {
        self.rate
    }

    /// The filters the device installed.
    #[must_use]
    pub fn filters(&self) -> &[AcceptanceFilter] {
        &self.filters
    }

    fn admitted(&self, frame: &BusFrame) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.admits(frame.id))
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusInterface for MockBus {
    fn poll(&mut self) -> Option<BusFrame> {
        while let Some(frame) = self.rx.pop_front() {
            if self.admitted(&frame) {
                return Some(frame);
            }
            // filtered out in hardware; silently dropped
        }
        None
    }

    fn send(&mut self, frame: &BusFrame) {
        self.tx.push(frame.clone());
    }

    fn set_rate(&mut self, rate: BusRate) {
        self.rate = rate;
    }

    fn install_filters(&mut self, filters: &[AcceptanceFilter]) {
        self.filters = filters.to_vec();
    }
}
