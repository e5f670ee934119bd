//! Multi-drop bus transport binding.
//!
//! A command arrives as one addressed frame: the opcode rides in the
//! 29-bit identifier and the parameters ride in the payload. Replies are
//! addressed back to the requester with the response bit set, and always
//! lead with the status byte. Bulk data in either direction moves as
//! segment frames of up to eight payload bytes.

use platform::{BusFrame, BusInterface, FRAME_CAPACITY};
use protocol::{BusId, BusRate, NodeAddress, Opcode, ACK_BYTE, NACK_BYTE};

use crate::link::{CommandLink, LinkError, SegmentEvent};

/// [`CommandLink`] over an addressed frame bus.
pub struct BusLink<'a, B: BusInterface> {
    bus: &'a mut B,
    own: NodeAddress,
    poll_budget: u32,
    /// Identifier of the request being serviced; replies are addressed
    /// from it.
    request: BusId,
    /// Parameter bytes of the current request and the read cursor.
    params: heapless::Vec<u8, FRAME_CAPACITY>,
    cursor: usize,
}

impl<'a, B: BusInterface> BusLink<'a, B> {
    /// Bind to `bus`, replying as `own`. `poll_budget` bounds every
    /// blocking receive.
    pub fn new(bus: &'a mut B, own: NodeAddress, poll_budget: u32) -> Self {
        Self {
            bus,
            own,
            poll_budget,
            request: BusId::reply_to(&BusId::unpack(0), own, 0),
            params: heapless::Vec::new(),
            cursor: 0,
        }
    }

    fn accept(&mut self, frame: &BusFrame) -> u8 {
        self.request = BusId::unpack(frame.id);
        self.params.clear();
        // frame payloads never exceed the params capacity
        let _ = self.params.extend_from_slice(&frame.data);
        self.cursor = 0;
        self.request.opcode
    }

    fn recv_frame(&mut self) -> Result<BusFrame, LinkError> {
        for _ in 0..self.poll_budget {
            if let Some(frame) = self.bus.poll() {
                return Ok(frame);
            }
        }
        Err(LinkError::Timeout)
    }

    fn send_reply(&mut self, opcode: u8, data: &[u8]) {
        let id = BusId::reply_to(&self.request, self.own, opcode);
        self.bus.send(&BusFrame::new(id.pack(), data));
    }
}

impl<B: BusInterface> CommandLink for BusLink<'_, B> {
    fn poll_command(&mut self) -> Option<u8> {
        let frame = self.bus.poll()?;
        Some(self.accept(&frame))
    }

    fn next_command(&mut self) -> Result<u8, LinkError> {
        let frame = self.recv_frame()?;
        Ok(self.accept(&frame))
    }

    fn param_u8(&mut self) -> Result<u8, LinkError> {
        let byte = self
            .params
            .get(self.cursor)
            .copied()
            .ok_or(LinkError::Malformed)?;
        self.cursor += 1;
        Ok(byte)
    }

    fn param_u32(&mut self) -> Result<u32, LinkError> {
        let mut value = 0u32;
        for _ in 0..4 {
            value = (value << 8) | u32::from(self.param_u8()?);
        }
        Ok(value)
    }

    fn ack(&mut self, opcode: Opcode) {
        self.send_reply(opcode.to_wire(), &[ACK_BYTE]);
    }

    fn nack_raw(&mut self, raw: u8) {
        self.send_reply(raw, &[NACK_BYTE]);
    }

    fn reply(&mut self, opcode: Opcode, payload: &[u8]) {
        let mut data = heapless::Vec::<u8, FRAME_CAPACITY>::new();
        // status plus payload always fit: replies carry at most 5 bytes
        let _ = data.push(ACK_BYTE);
        let _ = data.extend_from_slice(payload);
        self.send_reply(opcode.to_wire(), &data);
    }

    fn send_u32(&mut self, opcode: Opcode, value: u32) {
        self.send_reply(opcode.to_wire(), &value.to_be_bytes());
    }

    fn stream(&mut self, opcode: Opcode, data: &[u8]) {
        for piece in data.chunks(FRAME_CAPACITY) {
            self.send_reply(opcode.to_wire(), piece);
        }
    }

    fn read_segment(&mut self, buf: &mut [u8]) -> Result<SegmentEvent, LinkError> {
        let frame = self.recv_frame()?;
        let id = BusId::unpack(frame.id);
        if id.opcode == Opcode::Nack.to_wire() {
            return Ok(SegmentEvent::Aborted);
        }
        if id.opcode != Opcode::WriteSegment.to_wire() {
            return Ok(SegmentEvent::Bytes(0));
        }
        let mut copied = 0;
        for (slot, &byte) in buf.iter_mut().zip(frame.data.iter()) {
            *slot = byte;
            copied += 1;
        }
        Ok(SegmentEvent::Bytes(copied))
    }

    fn supports_rate(&self, wire: u8) -> bool {
        BusRate::from_wire(wire).is_some()
    }

    fn apply_rate(&mut self, wire: u8) {
        if let Some(rate) = BusRate::from_wire(wire) {
            self.bus.set_rate(rate);
        }
    }
}
