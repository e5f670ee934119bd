//! End-to-end sessions against the mock peripherals: full flashing runs
//! over both transports, plus a provision-then-reboot cycle.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use boot::engine::Exit;
use boot::regions::{Region, APPLICATION_HEADER_SIZE, FLASH_BASE, FLASH_END, SECTOR_BASES};
use boot::runtime::{boot, run_engine, BootDecision};
use boot::state::{BootMode, BootState, ResetCause};
use boot::verify::AppMetadata;
use boot::UserIdentity;
use platform::mocks::{MockBackupDomain, MockBus, MockFlash, MockSerialPort};
use platform::BusFrame;
use protocol::{
    BroadcastScope, BusId, CommandType, NodeAddress, Opcode, Priority, ResetTarget, ACK_BYTE,
    NACK_BYTE,
};

const POLL_BUDGET: u32 = 64;

fn mock_flash() -> MockFlash {
    let mut sizes = Vec::new();
    for (index, base) in SECTOR_BASES.iter().enumerate() {
        let end = SECTOR_BASES.get(index + 1).copied().unwrap_or(FLASH_END);
        sizes.push(end - base);
    }
    MockFlash::new(FLASH_BASE, &sizes)
}

/// A flashable application blob: metadata header padded to the header
/// size, then the image itself.
fn app_blob(image: &[u8]) -> Vec<u8> {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(image);
    let meta = AppMetadata {
        crc: hasher.finalize(),
        length: image.len() as u32,
        version: *b"v2.1.0\0\0",
    };
    let mut blob = vec![0xFFu8; APPLICATION_HEADER_SIZE as usize];
    blob[..AppMetadata::SIZE].copy_from_slice(&meta.encode());
    blob.extend_from_slice(image);
    blob
}

/// Serial WRITE payload: every data byte rides behind its own segment
/// marker.
fn serial_segments(blob: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(blob.len() * 2);
    for &byte in blob {
        out.push(Opcode::WriteSegment.to_wire());
        out.push(byte);
    }
    out
}

#[test]
fn serial_session_flashes_and_launches_an_application() {
    let mut flash = mock_flash();
    let mut backup = MockBackupDomain::new();
    let mut serial = MockSerialPort::new();
    let mut bus = MockBus::new();

    let image: Vec<u8> = (0..1024u32).map(|i| (i % 241) as u8).collect();
    let blob = app_blob(&image);

    let mut rx = vec![ACK_BYTE];
    rx.push(0x01); // VERSION
    rx.extend_from_slice(&[0x03, 0x03]); // ERASE application
    rx.push(0x06); // WRITE application
    rx.push(0x03);
    rx.extend_from_slice(&(blob.len() as u32).to_be_bytes());
    rx.extend_from_slice(&serial_segments(&blob));
    rx.extend_from_slice(&[0x08]); // VERIFY
    rx.push(0x09); // EXECUTE

    serial.push_rx(&rx);
    let exit = run_engine(
        &mut flash,
        &mut backup,
        &mut serial,
        &mut bus,
        BootState::default(),
        UserIdentity::default(),
        POLL_BUDGET,
    );
    assert_eq!(exit, Exit::Execute);

    let mut expected = vec![ACK_BYTE, ACK_BYTE]; // handshake
    expected.extend_from_slice(&[0x01, ACK_BYTE, 0x01]); // version
    expected.extend_from_slice(&[0x03, ACK_BYTE, 0x03, ACK_BYTE]); // erase
    expected.extend_from_slice(&[0x06, ACK_BYTE]); // write accepted
    expected.extend_from_slice(&[0x07, ACK_BYTE, 0x07, ACK_BYTE]); // two chunks
    expected.extend_from_slice(&[0x06, ACK_BYTE]); // transfer complete
    expected.extend_from_slice(&[0x06, ACK_BYTE]); // image verified
    expected.extend_from_slice(&[0x08, ACK_BYTE, 0x08, ACK_BYTE]); // verify
    expected.extend_from_slice(&[0x09, ACK_BYTE]); // execute
    assert_eq!(serial.take_tx(), expected);

    // The blob landed where it was addressed.
    assert_eq!(
        flash.contents(Region::Application.base(), blob.len()),
        &blob[..]
    );

    // And the next boot runs it.
    let outcome = boot(&mut flash, &mut backup, ResetCause::Software).unwrap();
    assert_eq!(outcome.state.boot_mode, BootMode::Application);
    assert_eq!(outcome.decision, BootDecision::RunApplication);
}

#[test]
fn serial_write_with_bad_crc_is_rejected_after_transfer() {
    let mut flash = mock_flash();
    let mut backup = MockBackupDomain::new();
    let mut serial = MockSerialPort::new();
    let mut bus = MockBus::new();

    let image = vec![0x55u8; 512];
    let mut blob = app_blob(&image);
    // Corrupt the stored CRC.
    blob[4] ^= 0xFF;

    let mut rx = vec![ACK_BYTE];
    rx.push(0x06);
    rx.push(0x03);
    rx.extend_from_slice(&(blob.len() as u32).to_be_bytes());
    rx.extend_from_slice(&serial_segments(&blob));
    rx.extend_from_slice(&[0x0E, 0x01]); // RESET, stay here

    serial.push_rx(&rx);
    let exit = run_engine(
        &mut flash,
        &mut backup,
        &mut serial,
        &mut bus,
        BootState::default(),
        UserIdentity::default(),
        POLL_BUDGET,
    );
    assert_eq!(exit, Exit::Reset(ResetTarget::ThisBootloader));

    let tx = serial.take_tx();
    // ...write accepted, both chunks committed, transfer complete, but
    // the post-transfer verification says no.
    let tail = &tx[tx.len() - 4..];
    assert_eq!(tail, &[0x06, NACK_BYTE, 0x0E, ACK_BYTE]);
}

#[test]
fn serial_read_streams_the_identity_record() {
    let mut flash = mock_flash();
    let identity = UserIdentity {
        board: 2,
        node: 7,
        serial_number: 0xAABBCCDD,
        ..UserIdentity::default()
    };
    flash.seed(Region::UserData.base(), &identity.encode());

    let mut backup = MockBackupDomain::new();
    let mut serial = MockSerialPort::new();
    let mut bus = MockBus::new();

    serial.push_rx(&[ACK_BYTE, 0x04, 0x02, 0x0E, 0x01]);
    let exit = run_engine(
        &mut flash,
        &mut backup,
        &mut serial,
        &mut bus,
        BootState::default(),
        identity,
        POLL_BUDGET,
    );
    assert_eq!(exit, Exit::Reset(ResetTarget::ThisBootloader));

    let tx = serial.take_tx();
    // handshake ack, read ack, 4-byte length, 20 record bytes, read ack,
    // then the reset exchange.
    assert_eq!(&tx[..2], &[ACK_BYTE, ACK_BYTE]);
    assert_eq!(&tx[2..4], &[0x04, ACK_BYTE]);
    assert_eq!(&tx[4..8], &(UserIdentity::SIZE as u32).to_be_bytes());
    assert_eq!(&tx[8..8 + UserIdentity::SIZE], &identity.encode()[..]);
    assert_eq!(&tx[8 + UserIdentity::SIZE..10 + UserIdentity::SIZE], &[0x04, ACK_BYTE]);
}

fn bus_request(own: NodeAddress, opcode: Opcode, data: &[u8]) -> BusFrame {
    let id = BusId {
        command_type: CommandType::Request,
        opcode: opcode.to_wire(),
        destination: own,
        source: NodeAddress { board: 0, node: 1 },
        scope: BroadcastScope::None,
        priority: Priority::Medium,
    };
    BusFrame::new(id.pack(), data)
}

#[test]
fn bus_session_rewrites_the_identity_sector() {
    let mut flash = mock_flash();
    let identity = UserIdentity {
        board: 3,
        node: 4,
        ..UserIdentity::default()
    };
    flash.seed(Region::UserData.base(), &identity.encode());

    let mut backup = MockBackupDomain::new();
    let mut serial = MockSerialPort::new();
    let mut bus = MockBus::new();
    let own = NodeAddress::new(3, 4);

    let mut replacement = identity;
    replacement.part_number = 0x0001_1170;
    let record = replacement.encode();

    bus.push_rx(bus_request(own, Opcode::Ack, &[]));
    bus.push_rx(bus_request(own, Opcode::Version, &[]));
    // The sector still holds the old record; clear it first.
    bus.push_rx(bus_request(own, Opcode::Erase, &[0x02]));
    // WRITE the whole 20-byte record into UserData.
    let mut params = vec![0x02];
    params.extend_from_slice(&(record.len() as u32).to_be_bytes());
    bus.push_rx(bus_request(own, Opcode::Write, &params));
    for piece in record.chunks(8) {
        bus.push_rx(bus_request(own, Opcode::WriteSegment, piece));
    }
    // Read it back, then leave.
    bus.push_rx(bus_request(own, Opcode::Read, &[0x02]));
    bus.push_rx(bus_request(own, Opcode::Reset, &[0x01]));

    let exit = run_engine(
        &mut flash,
        &mut backup,
        &mut serial,
        &mut bus,
        BootState::default(),
        identity,
        POLL_BUDGET,
    );
    assert_eq!(exit, Exit::Reset(ResetTarget::ThisBootloader));

    let tx = bus.take_tx();
    let datas: Vec<Vec<u8>> = tx.iter().map(|f| f.data.to_vec()).collect();

    let mut cursor = 0;
    assert_eq!(datas[cursor], vec![ACK_BYTE]); // handshake
    cursor += 1;
    assert_eq!(datas[cursor], vec![ACK_BYTE, 0x01]); // version
    cursor += 1;
    assert_eq!(datas[cursor], vec![ACK_BYTE]); // erase accepted
    cursor += 1;
    assert_eq!(datas[cursor], vec![ACK_BYTE]); // erase complete
    cursor += 1;
    assert_eq!(datas[cursor], vec![ACK_BYTE]); // write accepted
    cursor += 1;
    assert_eq!(datas[cursor], vec![ACK_BYTE]); // chunk committed
    cursor += 1;
    assert_eq!(datas[cursor], vec![ACK_BYTE]); // transfer complete
    cursor += 1;
    assert_eq!(datas[cursor], vec![ACK_BYTE]); // read accepted
    cursor += 1;
    assert_eq!(datas[cursor], (UserIdentity::SIZE as u32).to_be_bytes().to_vec());
    cursor += 1;
    // 20 bytes stream as 8 + 8 + 4.
    let mut streamed = Vec::new();
    for _ in 0..3 {
        let frame = &tx[cursor];
        assert_eq!(BusId::unpack(frame.id).opcode, Opcode::ReadSegment.to_wire());
        streamed.extend_from_slice(&frame.data);
        cursor += 1;
    }
    assert_eq!(streamed, record.to_vec());
    assert_eq!(datas[cursor], vec![ACK_BYTE]); // read complete
    cursor += 1;
    assert_eq!(datas[cursor], vec![ACK_BYTE]); // reset
    assert_eq!(cursor + 1, tx.len());

    assert_eq!(
        flash.contents(Region::UserData.base(), record.len()),
        &record[..]
    );
}

#[test]
fn provisioning_survives_a_reboot() {
    let mut flash = mock_flash();
    let mut backup = MockBackupDomain::new();

    // First boot: nothing provisioned, we stay in the engine.
    let outcome = boot(&mut flash, &mut backup, ResetCause::PowerOn).unwrap();
    assert_eq!(outcome.decision, BootDecision::EnterEngine);

    // Provision the board id, commit, ask for a reset.
    let mut serial = MockSerialPort::new();
    let mut bus = MockBus::new();
    serial.push_rx(&[
        ACK_BYTE,
        0x0C, 0x01, 0x05, // WRITE_KEY board = 5
        0x0D, // SAVE_KEYS
        0x0E, 0x01, // RESET, stay here
    ]);
    let exit = run_engine(
        &mut flash,
        &mut backup,
        &mut serial,
        &mut bus,
        outcome.state,
        outcome.identity,
        POLL_BUDGET,
    );
    assert_eq!(exit, Exit::Reset(ResetTarget::ThisBootloader));

    // Reboot: the identity comes back from flash.
    let outcome = boot(&mut flash, &mut backup, ResetCause::Software).unwrap();
    assert_eq!(outcome.decision, BootDecision::EnterEngine);
    assert_eq!(outcome.identity.board, 5);

    // And READ_KEY reports it over a fresh session.
    let mut serial = MockSerialPort::new();
    serial.push_rx(&[ACK_BYTE, 0x0B, 0x01, 0x0E, 0x01]);
    let mut bus = MockBus::new();
    run_engine(
        &mut flash,
        &mut backup,
        &mut serial,
        &mut bus,
        outcome.state,
        outcome.identity,
        POLL_BUDGET,
    );
    let tx = serial.take_tx();
    assert_eq!(&tx[2..6], &[0x0B, ACK_BYTE, 0x01, 0x05]);
}
