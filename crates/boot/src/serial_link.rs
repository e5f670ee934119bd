//! Serial transport binding.
//!
//! Everything moves one byte at a time: parameters follow the opcode in
//! big-endian order, replies lead with the `(opcode, status)` pair, and a
//! WRITE payload arrives as a stream of two-byte sub-frames, each one a
//! `WRITE_SEGMENT` marker followed by one data byte.

use platform::SerialPort;
use protocol::{Opcode, SerialRate, ACK_BYTE, NACK_BYTE};

use crate::link::{CommandLink, LinkError, SegmentEvent};

/// [`CommandLink`] over a byte-oriented serial port.
pub struct SerialLink<'a, S: SerialPort> {
    port: &'a mut S,
    poll_budget: u32,
}

impl<'a, S: SerialPort> SerialLink<'a, S> {
    /// Bind to `port`. `poll_budget` bounds every blocking receive; when
    /// it runs out the current exchange is abandoned with a timeout.
    pub fn new(port: &'a mut S, poll_budget: u32) -> Self {
        Self { port, poll_budget }
    }

    fn recv(&mut self) -> Result<u8, LinkError> {
        for _ in 0..self.poll_budget {
            if let Some(byte) = self.port.poll() {
                return Ok(byte);
            }
        }
        Err(LinkError::Timeout)
    }
}

impl<S: SerialPort> CommandLink for SerialLink<'_, S> {
    fn poll_command(&mut self) -> Option<u8> {
        self.port.poll()
    }

    fn next_command(&mut self) -> Result<u8, LinkError> {
        self.recv()
    }

    fn param_u8(&mut self) -> Result<u8, LinkError> {
        self.recv()
    }

    fn param_u32(&mut self) -> Result<u32, LinkError> {
        let mut value = 0u32;
        for _ in 0..4 {
            value = (value << 8) | u32::from(self.recv()?);
        }
        Ok(value)
    }

    fn ack(&mut self, opcode: Opcode) {
        self.port.send(opcode.to_wire());
        self.port.send(ACK_BYTE);
    }

    fn nack_raw(&mut self, raw: u8) {
        self.port.send(raw);
        self.port.send(NACK_BYTE);
    }

    fn reply(&mut self, opcode: Opcode, payload: &[u8]) {
        self.ack(opcode);
        for &byte in payload {
            self.port.send(byte);
        }
    }

    fn send_u32(&mut self, _opcode: Opcode, value: u32) {
        for byte in value.to_be_bytes() {
            self.port.send(byte);
        }
    }

    fn stream(&mut self, _opcode: Opcode, data: &[u8]) {
        for &byte in data {
            self.port.send(byte);
        }
    }

    fn read_segment(&mut self, buf: &mut [u8]) -> Result<SegmentEvent, LinkError> {
        match self.recv()? {
            NACK_BYTE => Ok(SegmentEvent::Aborted),
            byte if byte == Opcode::WriteSegment.to_wire() => {
                let data = self.recv()?;
                match buf.first_mut() {
                    Some(slot) => {
                        *slot = data;
                        Ok(SegmentEvent::Bytes(1))
                    }
                    None => Ok(SegmentEvent::Bytes(0)),
                }
            }
            _ => Ok(SegmentEvent::Bytes(0)),
        }
    }

    fn supports_rate(&self, wire: u8) -> bool {
        SerialRate::from_wire(wire).is_some()
    }

    fn apply_rate(&mut self, wire: u8) {
        if let Some(rate) = SerialRate::from_wire(wire) {
            self.port.set_rate(rate);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use platform::mocks::MockSerialPort;

    #[test]
    fn param_u32_is_big_endian() {
        let mut port = MockSerialPort::new();
        port.push_rx(&[0x12, 0x34, 0x56, 0x78]);
        let mut link = SerialLink::new(&mut port, 16);
        assert_eq!(link.param_u32().unwrap(), 0x1234_5678);
    }

    #[test]
    fn silence_exhausts_the_poll_budget() {
        let mut port = MockSerialPort::new();
        let mut link = SerialLink::new(&mut port, 8);
        assert_eq!(link.next_command(), Err(LinkError::Timeout));
    }

    #[test]
    fn reply_leads_with_opcode_and_status() {
        let mut port = MockSerialPort::new();
        {
            let mut link = SerialLink::new(&mut port, 16);
            link.reply(Opcode::Version, &[0x01]);
        }
        assert_eq!(port.take_tx(), vec![0x01, ACK_BYTE, 0x01]);
    }

    #[test]
    fn segments_arrive_one_byte_per_marker() {
        let mut port = MockSerialPort::new();
        port.push_rx(&[0x07, 0xAA, 0x07, 0xBB]);
        let mut link = SerialLink::new(&mut port, 16);

        let mut buf = [0u8; 4];
        assert_eq!(
            link.read_segment(&mut buf).unwrap(),
            SegmentEvent::Bytes(1)
        );
        assert_eq!(buf[0], 0xAA);
        assert_eq!(
            link.read_segment(&mut buf[1..]).unwrap(),
            SegmentEvent::Bytes(1)
        );
        assert_eq!(buf[1], 0xBB);
    }

    #[test]
    fn nack_marker_aborts_the_segment_stream() {
        let mut port = MockSerialPort::new();
        port.push_rx(&[NACK_BYTE]);
        let mut link = SerialLink::new(&mut port, 16);
        let mut buf = [0u8; 4];
        assert_eq!(link.read_segment(&mut buf).unwrap(), SegmentEvent::Aborted);
    }

    #[test]
    fn unrelated_marker_is_skipped_not_fatal() {
        let mut port = MockSerialPort::new();
        port.push_rx(&[0x0F]);
        let mut link = SerialLink::new(&mut port, 16);
        let mut buf = [0u8; 4];
        assert_eq!(link.read_segment(&mut buf).unwrap(), SegmentEvent::Bytes(0));
    }

    #[test]
    fn rate_switch_applies_known_selectors_only() {
        let mut port = MockSerialPort::new();
        {
            let mut link = SerialLink::new(&mut port, 16);
            assert!(link.supports_rate(0x01));
            assert!(!link.supports_rate(0x05));
            link.apply_rate(0x01);
            link.apply_rate(0x05);
        }
        assert_eq!(port.rate(), SerialRate::B921600);
    }
}
