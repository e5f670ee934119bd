//! Second-stage bootloader core.
//!
//! On every reset the device either runs the resident application or drops
//! into a maintenance engine that reprograms flash over one of two
//! transports: a point-to-point serial link and a multi-drop addressed bus.
//!
//! # Modules
//!
//! - [`regions`] — the fixed flash memory map and sector geometry
//! - [`flash`] — chunked, alignment-aware erase/program/read over a region
//! - [`state`] — boot state persisted in battery-backed registers
//! - [`identity`] — device identity persisted in its own flash sector
//! - [`verify`] — application integrity (magic + length + CRC32)
//! - [`link`] — the framing seam both transports implement
//! - [`serial_link`] / [`bus_link`] — the two transport bindings
//! - [`engine`] — the shared twelve-opcode command state machine
//! - [`runtime`] — the reset-time boot sequence and transport arbitration
//!
//! The crate is hardware-free: everything platform-specific enters through
//! the `platform` trait seams, so the whole engine runs under host tests
//! against the mock peripherals.

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

pub mod bus_link;
pub mod engine;
pub mod flash;
pub mod identity;
pub mod link;
pub mod regions;
pub mod runtime;
pub mod serial_link;
pub mod state;
pub mod verify;

pub use engine::{Engine, Exit};
pub use flash::FlashManager;
pub use identity::UserIdentity;
pub use link::{CommandLink, LinkError, SegmentEvent};
pub use regions::Region;
pub use runtime::{boot, run_engine, BootDecision, BootOutcome};
pub use state::{BootMode, BootState, LoadOutcome, ResetCause};
pub use verify::AppMetadata;
