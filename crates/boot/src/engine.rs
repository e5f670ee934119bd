//! The command engine shared by both transports.
//!
//! One exchange at a time: decode the opcode, pull the parameters the
//! command needs through the link, act, reply. Commands that move bulk
//! data split it into chunks of [`SEGMENT_SIZE`] bytes, each chunk
//! buffered in RAM and acknowledged only after it is committed to flash,
//! so the remote paces itself off the slowest step.
//!
//! Terminal commands do not reset the device themselves. They persist the
//! requested boot mode and surface an [`Exit`] value; the platform entry
//! point owns the actual reset.

use platform::{BackupRegisters, FlashController, FlashError};
use protocol::{Key, Opcode, ResetTarget, BUILD_VERSION, SEGMENT_SIZE};

use crate::flash::FlashManager;
use crate::identity::{self, UserIdentity};
use crate::link::{CommandLink, LinkError, SegmentEvent};
use crate::regions::Region;
use crate::state::{self, BootMode, BootState};
use crate::verify;

/// Why the engine wants the device reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Exit {
    /// EXECUTE accepted: boot mode is parked on the application.
    Execute,
    /// RESET accepted: boot mode is parked on the given target.
    Reset(ResetTarget),
}

/// The twelve-command maintenance engine.
pub struct Engine<'a, F: FlashController, B: BackupRegisters> {
    flash: FlashManager<'a, F>,
    backup: &'a mut B,
    state: BootState,
    identity: UserIdentity,
    segment: [u8; SEGMENT_SIZE],
}

impl<'a, F: FlashController, B: BackupRegisters> Engine<'a, F, B> {
    pub fn new(
        flash_dev: &'a mut F,
        backup: &'a mut B,
        state: BootState,
        identity: UserIdentity,
    ) -> Self {
        Self {
            flash: FlashManager::new(flash_dev),
            backup,
            state,
            identity,
            segment: [0xFF; SEGMENT_SIZE],
        }
    }

    /// The engine's view of the persistent boot state.
    #[must_use]
    pub fn state(&self) -> &BootState {
        &self.state
    }

    /// The in-memory identity record, including unsaved key writes.
    #[must_use]
    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    /// Wait for one command and service it.
    ///
    /// `Ok(Some(_))` means a terminal command was accepted and the caller
    /// should reset the device. A timeout abandons the exchange.
    pub fn service<L: CommandLink>(&mut self, link: &mut L) -> Result<Option<Exit>, LinkError> {
        let raw = link.next_command()?;
        self.dispatch(link, raw)
    }

    /// Service one command whose opcode byte has already been received.
    pub fn dispatch<L: CommandLink>(
        &mut self,
        link: &mut L,
        raw: u8,
    ) -> Result<Option<Exit>, LinkError> {
        let Some(opcode) = Opcode::from_wire(raw) else {
            link.nack_raw(raw);
            return Ok(None);
        };
        match self.handle(link, opcode) {
            // A request that arrived without its parameters is answered
            // and forgotten; the link itself is still healthy.
            Err(LinkError::Malformed) => {
                link.nack(opcode);
                Ok(None)
            }
            other => other,
        }
    }

    fn handle<L: CommandLink>(
        &mut self,
        link: &mut L,
        opcode: Opcode,
    ) -> Result<Option<Exit>, LinkError> {
        match opcode {
            // A stray abort marker between exchanges; answering it would
            // only start a nack volley.
            Opcode::Nack => Ok(None),
            Opcode::Ack => {
                link.ack(Opcode::Ack);
                Ok(None)
            }
            Opcode::Version => {
                link.reply(Opcode::Version, &[BUILD_VERSION]);
                Ok(None)
            }
            Opcode::Speed => self.handle_speed(link),
            Opcode::Erase => self.handle_erase(link),
            Opcode::Read => self.handle_read(link),
            Opcode::Write => self.handle_write(link),
            Opcode::Verify => self.handle_verify(link),
            Opcode::Execute => self.handle_execute(link),
            Opcode::Secure => self.handle_secure(link),
            Opcode::ReadKey => self.handle_read_key(link),
            Opcode::WriteKey => self.handle_write_key(link),
            Opcode::SaveKeys => self.handle_save_keys(link),
            Opcode::Reset => self.handle_reset(link),
            // Segment markers only make sense inside a bulk transfer.
            Opcode::ReadSegment | Opcode::WriteSegment => {
                link.nack(opcode);
                Ok(None)
            }
        }
    }

    fn handle_speed<L: CommandLink>(&mut self, link: &mut L) -> Result<Option<Exit>, LinkError> {
        let wire = link.param_u8()?;
        if link.supports_rate(wire) {
            // Acknowledge at the old rate, then switch.
            link.ack(Opcode::Speed);
            link.apply_rate(wire);
        } else {
            link.nack(Opcode::Speed);
        }
        Ok(None)
    }

    fn handle_erase<L: CommandLink>(&mut self, link: &mut L) -> Result<Option<Exit>, LinkError> {
        let Some(region) = writable_region(link.param_u8()?) else {
            link.nack(Opcode::Erase);
            return Ok(None);
        };
        link.ack(Opcode::Erase);
        match self.flash.erase_region(region) {
            Ok(()) => link.ack(Opcode::Erase),
            Err(_) => link.nack(Opcode::Erase),
        }
        Ok(None)
    }

    fn handle_read<L: CommandLink>(&mut self, link: &mut L) -> Result<Option<Exit>, LinkError> {
        let Some(region) = Region::from_wire(link.param_u8()?) else {
            link.nack(Opcode::Read);
            return Ok(None);
        };
        let length = match self.readable_length(region) {
            Ok(length) => length,
            Err(_) => {
                link.nack(Opcode::Read);
                return Ok(None);
            }
        };
        link.ack(Opcode::Read);
        link.send_u32(Opcode::Read, length);

        let mut address = region.base();
        let mut remaining = length as usize;
        let mut chunk = [0u8; 256];
        while remaining > 0 {
            let step = remaining.min(chunk.len());
            let Some(buf) = chunk.get_mut(..step) else {
                break;
            };
            if self.flash.read(address, buf).is_err() {
                link.nack(Opcode::Read);
                return Ok(None);
            }
            link.stream(Opcode::ReadSegment, buf);
            address += step as u32;
            remaining -= step;
        }
        link.ack(Opcode::Read);
        Ok(None)
    }

    fn readable_length(&self, region: Region) -> Result<u32, FlashError> {
        match region {
            Region::Bootloader => Ok(region.size()),
            // Only the identity record is meaningful; the rest of the
            // sector is erased filler.
            Region::UserData => Ok(UserIdentity::SIZE as u32),
            Region::Application => verify::readable_length(&self.flash),
        }
    }

    fn handle_write<L: CommandLink>(&mut self, link: &mut L) -> Result<Option<Exit>, LinkError> {
        let region_byte = link.param_u8()?;
        let length = link.param_u32()?;
        let Some(region) = writable_region(region_byte) else {
            link.nack(Opcode::Write);
            return Ok(None);
        };
        if length > region.size() {
            link.nack(Opcode::Write);
            return Ok(None);
        }
        link.ack(Opcode::Write);

        let mut address = region.base();
        let mut remaining = length as usize;
        let mut failed = false;
        while remaining > 0 {
            let chunk_len = remaining.min(SEGMENT_SIZE);
            self.segment.fill(0xFF);
            let mut fill = 0;
            while fill < chunk_len {
                let Some(buf) = self.segment.get_mut(fill..chunk_len) else {
                    break;
                };
                match link.read_segment(buf)? {
                    SegmentEvent::Bytes(n) => fill += n,
                    SegmentEvent::Aborted => {
                        // The remote gave up; no reply is expected.
                        return Ok(None);
                    }
                }
            }
            let Some(chunk) = self.segment.get(..chunk_len) else {
                break;
            };
            match self.flash.program(address, chunk) {
                Ok(()) => link.ack(Opcode::WriteSegment),
                Err(_) => {
                    link.nack(Opcode::WriteSegment);
                    failed = true;
                    break;
                }
            }
            address += chunk_len as u32;
            remaining -= chunk_len;
        }

        if failed {
            link.nack(Opcode::Write);
            return Ok(None);
        }
        link.ack(Opcode::Write);

        // A fresh application image must prove itself before the remote
        // trusts the transfer.
        if region == Region::Application {
            match verify::verify(&self.flash) {
                Ok(true) => link.ack(Opcode::Write),
                _ => link.nack(Opcode::Write),
            }
        }
        Ok(None)
    }

    fn handle_verify<L: CommandLink>(&mut self, link: &mut L) -> Result<Option<Exit>, LinkError> {
        link.ack(Opcode::Verify);
        match verify::verify(&self.flash) {
            Ok(true) => link.ack(Opcode::Verify),
            _ => link.nack(Opcode::Verify),
        }
        Ok(None)
    }

    fn handle_execute<L: CommandLink>(&mut self, link: &mut L) -> Result<Option<Exit>, LinkError> {
        link.ack(Opcode::Execute);
        self.state.boot_mode = BootMode::Application;
        state::save(self.backup, &self.state);
        Ok(Some(Exit::Execute))
    }

    fn handle_secure<L: CommandLink>(&mut self, link: &mut L) -> Result<Option<Exit>, LinkError> {
        // Reserved: region, type and access mode are accepted and
        // discarded until secure access is defined.
        let _region = link.param_u8()?;
        let _secure_type = link.param_u8()?;
        let _access = link.param_u8()?;
        link.ack(Opcode::Secure);
        Ok(None)
    }

    fn handle_read_key<L: CommandLink>(&mut self, link: &mut L) -> Result<Option<Exit>, LinkError> {
        let key_byte = link.param_u8()?;
        let Some(key) = Key::from_wire(key_byte) else {
            link.nack(Opcode::ReadKey);
            return Ok(None);
        };
        let mut payload = heapless::Vec::<u8, 5>::new();
        // key byte plus at most four value bytes
        let _ = payload.push(key_byte);
        let _ = payload.extend_from_slice(&self.identity.field_bytes(key));
        link.reply(Opcode::ReadKey, &payload);
        Ok(None)
    }

    fn handle_write_key<L: CommandLink>(
        &mut self,
        link: &mut L,
    ) -> Result<Option<Exit>, LinkError> {
        let Some(key) = Key::from_wire(link.param_u8()?) else {
            link.nack(Opcode::WriteKey);
            return Ok(None);
        };
        match key {
            Key::Board => self.identity.board = link.param_u8()?,
            Key::Node => self.identity.node = link.param_u8()?,
            Key::Revision => self.identity.revision = link.param_u8()?,
            Key::PartNumber => self.identity.part_number = link.param_u32()?,
            Key::SerialNumber => self.identity.serial_number = link.param_u32()?,
            Key::ManufactureDate => {
                for slot in &mut self.identity.manufacture_date {
                    *slot = link.param_u8()?;
                }
            }
        }
        link.ack(Opcode::WriteKey);
        Ok(None)
    }

    fn handle_save_keys<L: CommandLink>(
        &mut self,
        link: &mut L,
    ) -> Result<Option<Exit>, LinkError> {
        link.ack(Opcode::SaveKeys);
        match identity::save(&mut self.flash, &self.identity) {
            Ok(()) => link.ack(Opcode::SaveKeys),
            Err(_) => link.nack(Opcode::SaveKeys),
        }
        Ok(None)
    }

    fn handle_reset<L: CommandLink>(&mut self, link: &mut L) -> Result<Option<Exit>, LinkError> {
        let Some(target) = ResetTarget::from_wire(link.param_u8()?) else {
            link.nack(Opcode::Reset);
            return Ok(None);
        };
        link.ack(Opcode::Reset);
        self.state.boot_mode = match target {
            ResetTarget::ThisBootloader => BootMode::ThisBootloader,
            ResetTarget::VendorBootloader => BootMode::VendorBootloader,
        };
        state::save(self.backup, &self.state);
        Ok(Some(Exit::Reset(target)))
    }
}

fn writable_region(byte: u8) -> Option<Region> {
    Region::from_wire(byte).filter(|region| region.writable())
}
