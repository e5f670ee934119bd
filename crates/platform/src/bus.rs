//! Multi-drop addressed bus seam.

use protocol::{AcceptanceFilter, BusRate};

/// Maximum payload bytes per bus frame.
pub const FRAME_CAPACITY: usize = 8;

/// One frame on the bus: a 29-bit extended identifier plus up to
/// [`FRAME_CAPACITY`] payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusFrame {
    /// Packed identifier; see `protocol::BusId` for the field layout.
    pub id: u32,
    /// Frame payload.
    pub data: heapless::Vec<u8, FRAME_CAPACITY>,
}

impl BusFrame {
    /// Build a frame, truncating `data` to the frame capacity.
    #[must_use]
    pub fn new(id: u32, data: &[u8]) -> Self {
        let mut payload = heapless::Vec::new();
        for &byte in data.iter().take(FRAME_CAPACITY) {
            // capacity checked by the take() above
            let _ = payload.push(byte);
        }
        Self { id, data: payload }
    }
}

/// Frame-oriented bus interface with hardware acceptance filtering.
pub trait BusInterface {
    /// Return the next admitted frame if one is pending.
    fn poll(&mut self) -> Option<BusFrame>;

    /// Transmit a frame, blocking until the controller accepts it.
    fn send(&mut self, frame: &BusFrame);

    /// Reconfigure the bus bit rate.
    fn set_rate(&mut self, rate: BusRate);

    /// Install the acceptance filters; frames failing every filter are
    /// dropped by hardware before [`poll`](BusInterface::poll) sees them.
    fn install_filters(&mut self, filters: &[AcceptanceFilter]);
}
