//! Reset-time boot sequence and transport arbitration.
//!
//! [`boot`] decides what this power cycle is for: hand off to the vendor
//! ROM loader, run the verified application, or stay here and service
//! commands. [`run_engine`] is the stay-here path: both transports are
//! polled until a remote opens a session with the handshake byte, and the
//! winning transport keeps the engine until a terminal command asks for a
//! reset.
//!
//! Neither function touches a vector table or reset register; the
//! platform entry point acts on the returned decision.

use platform::{BackupRegisters, BusInterface, FlashController, FlashError, SerialPort};
use protocol::{bus_id, NodeAddress, Opcode, SerialRate, ACK_BYTE};

use crate::bus_link::BusLink;
use crate::engine::{Engine, Exit};
use crate::flash::FlashManager;
use crate::identity::{self, UserIdentity};
use crate::link::CommandLink;
use crate::serial_link::SerialLink;
use crate::state::{self, BootMode, BootState, LoadOutcome, ResetCause};
use crate::verify;

/// What this boot should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootDecision {
    /// Jump to the verified application.
    RunApplication,
    /// Hand off to the vendor's ROM loader.
    VendorHandoff,
    /// Stay in the bootloader and service commands.
    EnterEngine,
}

/// Everything the platform entry point needs after the boot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootOutcome {
    pub decision: BootDecision,
    pub state: BootState,
    pub identity: UserIdentity,
}

/// Run the boot sequence.
///
/// Loads and heals the persistent records, notes the reset cause, and
/// decides where this boot goes. A vendor handoff is one-shot: the parked
/// mode is rewound so the next reset lands back in the bootloader. An
/// unprovisioned device (no identity record) always stays in the
/// bootloader, whatever mode was parked.
pub fn boot<F: FlashController, B: BackupRegisters>(
    flash_dev: &mut F,
    backup: &mut B,
    reset_cause: ResetCause,
) -> Result<BootOutcome, FlashError> {
    let mut flash = FlashManager::new(flash_dev);

    let (mut state, _) = state::load(backup);
    state.last_reset_cause = reset_cause;
    state.counter = state.counter.wrapping_add(1);
    state::save(backup, &state);

    let (identity, identity_outcome) = identity::load(&mut flash)?;
    let mut boot_mode = state.boot_mode;
    if identity_outcome == LoadOutcome::Reinitialized {
        boot_mode = BootMode::ThisBootloader;
    }

    let decision = match boot_mode {
        BootMode::VendorBootloader => {
            state.boot_mode = BootMode::ThisBootloader;
            state::save(backup, &state);
            BootDecision::VendorHandoff
        }
        BootMode::ThisBootloader => BootDecision::EnterEngine,
        BootMode::Application => {
            if verify::verify(&flash)? {
                BootDecision::RunApplication
            } else {
                BootDecision::EnterEngine
            }
        }
    };

    #[cfg(feature = "defmt")]
    defmt::info!(
        "boot: cause={} mode={} -> {}",
        state.last_reset_cause,
        boot_mode,
        decision
    );

    Ok(BootOutcome {
        decision,
        state,
        identity,
    })
}

/// Service commands until a terminal one asks for a reset.
///
/// Both transports idle until one of them delivers the handshake byte;
/// that transport is acknowledged and owns the session from then on. The
/// other transport's traffic is ignored for the rest of the session, so a
/// host on each port cannot interleave half-exchanges.
pub fn run_engine<F, B, S, C>(
    flash_dev: &mut F,
    backup: &mut B,
    serial: &mut S,
    bus: &mut C,
    state: BootState,
    identity: UserIdentity,
    poll_budget: u32,
) -> Exit
where
    F: FlashController,
    B: BackupRegisters,
    S: SerialPort,
    C: BusInterface,
{
    let own = NodeAddress::new(identity.board, identity.node);
    serial.set_rate(SerialRate::DEFAULT);
    bus.install_filters(&bus_id::acceptance_filters(own));
    bus.set_rate(state.bus_rate);

    let mut engine = Engine::new(flash_dev, backup, state, identity);
    let mut serial_link = SerialLink::new(serial, poll_budget);
    let mut bus_link = BusLink::new(bus, own, poll_budget);

    loop {
        if let Some(byte) = serial_link.poll_command() {
            // Anything before the handshake is line noise.
            if byte == ACK_BYTE {
                #[cfg(feature = "defmt")]
                defmt::info!("session opened on serial");
                serial_link.ack(Opcode::Ack);
                return session(&mut engine, &mut serial_link);
            }
        }
        if let Some(opcode) = bus_link.poll_command() {
            if opcode == ACK_BYTE {
                #[cfg(feature = "defmt")]
                defmt::info!("session opened on bus");
                bus_link.ack(Opcode::Ack);
                return session(&mut engine, &mut bus_link);
            }
        }
    }
}

/// Drive the engine on the winning transport until a terminal command.
/// Timed-out exchanges are abandoned; the session itself never expires.
fn session<F, B, L>(engine: &mut Engine<'_, F, B>, link: &mut L) -> Exit
where
    F: FlashController,
    B: BackupRegisters,
    L: CommandLink,
{
    loop {
        if let Ok(Some(exit)) = engine.service(link) {
            return exit;
        }
    }
}
