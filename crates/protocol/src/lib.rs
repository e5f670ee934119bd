//! Bootloader wire protocol — transport-independent constants and codecs.
//!
//! # Modules
//!
//! - [`opcode`] — command opcodes, ack/nack bytes, key and reset-target ids
//! - [`rate`] — serial and bus rate enums with their wire bytes
//! - [`bus_id`] — 29-bit extended identifier pack/unpack and acceptance
//!   filter derivation for the multi-drop bus
//!
//! Everything here is pure data: no I/O, no hardware types. Both transport
//! bindings and host-side flashing tools consume the same definitions.

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

pub mod bus_id;
pub mod opcode;
pub mod rate;

pub use bus_id::{AcceptanceFilter, BroadcastScope, BusId, CommandType, NodeAddress, Priority};
pub use opcode::{Key, Opcode, ResetTarget, ACK_BYTE, BUILD_VERSION, NACK_BYTE, SEGMENT_SIZE};
pub use rate::{BusRate, SerialRate};
