//! Point-to-point serial port seam.

use protocol::SerialRate;

/// Byte-oriented serial port.
///
/// `poll` never blocks. Blocking receives are busy loops over this
/// primitive, bounded by the transport binding's poll budget.
pub trait SerialPort {
    /// Transmit one byte, blocking until the transmitter accepts it.
    fn send(&mut self, byte: u8);

    /// Return a received byte if one is pending.
    fn poll(&mut self) -> Option<u8>;

    /// Reconfigure the port to `rate`. The caller is responsible for
    /// draining any in-flight reply before switching.
    fn set_rate(&mut self, rate: SerialRate);
}
