//! The framing seam between the command engine and its transports.
//!
//! Both transports speak the same exchanges but frame them differently:
//! serial moves one byte at a time, the bus moves addressed frames of up
//! to eight payload bytes. The engine talks only to this trait, so the
//! command semantics exist exactly once.
//!
//! Every blocking receive is bounded by a poll budget. A remote that goes
//! quiet mid-exchange produces [`LinkError::Timeout`] and the engine
//! abandons the exchange instead of hanging forever.

use protocol::Opcode;

/// Transport-level receive failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// The poll budget ran out while waiting for the remote.
    Timeout,
    /// The request frame did not carry the parameters the opcode needs.
    Malformed,
}

/// Outcome of waiting for one WRITE sub-frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SegmentEvent {
    /// `n` payload bytes were copied into the buffer; zero means an
    /// unrelated frame arrived and the caller should keep waiting.
    Bytes(usize),
    /// The remote sent a negative acknowledgment; abort the transfer.
    Aborted,
}

/// One command transport as the engine sees it.
pub trait CommandLink {
    /// Non-blocking check for the opcode byte of a new exchange.
    fn poll_command(&mut self) -> Option<u8>;

    /// Wait for the next command opcode under the poll budget.
    fn next_command(&mut self) -> Result<u8, LinkError>;

    /// Next parameter byte of the current exchange.
    fn param_u8(&mut self) -> Result<u8, LinkError>;

    /// Next big-endian 32-bit parameter of the current exchange.
    fn param_u32(&mut self) -> Result<u32, LinkError>;

    /// Positive reply for `opcode`.
    fn ack(&mut self, opcode: Opcode);

    /// Negative reply for `opcode`.
    fn nack(&mut self, opcode: Opcode) {
        self.nack_raw(opcode.to_wire());
    }

    /// Negative reply framed around a raw opcode byte, for commands that
    /// never decoded to an [`Opcode`].
    fn nack_raw(&mut self, raw: u8);

    /// Positive reply for `opcode` carrying `payload` after the status.
    fn reply(&mut self, opcode: Opcode, payload: &[u8]);

    /// Send a big-endian 32-bit value as the body of a `opcode` frame.
    fn send_u32(&mut self, opcode: Opcode, value: u32);

    /// Stream bulk data to the remote in transport-sized pieces, framed
    /// as `opcode` where the transport needs framing.
    fn stream(&mut self, opcode: Opcode, data: &[u8]);

    /// Wait for one WRITE sub-frame and copy its payload into `buf`.
    fn read_segment(&mut self, buf: &mut [u8]) -> Result<SegmentEvent, LinkError>;

    /// Whether this transport recognizes `wire` as a rate selector.
    fn supports_rate(&self, wire: u8) -> bool;

    /// Switch to the rate `wire` selects. The caller acknowledges at the
    /// old rate first; unknown selectors are ignored.
    fn apply_rate(&mut self, wire: u8);
}
