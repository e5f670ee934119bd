//! Hardware seams for the bootloader engine.
//!
//! The engine never touches registers. Everything platform-specific sits
//! behind the traits in this crate, implemented once per board by the
//! bring-up layer and once here by the mocks:
//!
//! - [`FlashController`] — sector erase, width-specific program, read
//! - [`BackupRegisters`] — the battery-backed word file
//! - [`SerialPort`] — raw byte send and non-blocking poll
//! - [`BusInterface`] — addressed frame send/poll with acceptance filters
//!
//! All receive primitives are non-blocking polls; wait semantics (and the
//! poll budget that bounds them) belong to the transport bindings layered
//! on top.
//!
//! # Features
//!
//! - `std`: enable the [`mocks`] module for host-side testing
//! - `defmt`: derive `defmt::Format` on public types

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod backup;
pub mod bus;
pub mod flash;
pub mod serial;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

pub use backup::BackupRegisters;
pub use bus::{BusFrame, BusInterface, FRAME_CAPACITY};
pub use flash::{FlashController, FlashError};
pub use serial::SerialPort;
