//! Transport layer abstraction
//!
//! The SmartScope exposes three bulk endpoints: a command OUT endpoint, a
//! command IN endpoint carrying fixed-size responses, and a data IN endpoint
//! streaming acquisition packets. Implementations perform exactly one USB
//! transfer per call and never buffer.

use std::time::Duration;

use crate::error::TransportError;

/// Bulk endpoints used by the instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Command frames, host to device
    CommandOut,
    /// Response frames, device to host
    CommandIn,
    /// Acquisition stream, device to host
    Data,
}

impl Endpoint {
    /// USB endpoint address
    pub const fn address(self) -> u8 {
        match self {
            Endpoint::CommandOut => crate::protocol::EP_CMD_OUT,
            Endpoint::CommandIn => crate::protocol::EP_CMD_IN,
            Endpoint::Data => crate::protocol::EP_DATA,
        }
    }
}

/// Raw USB I/O for one SmartScope
pub trait Transport {
    /// Write a buffer to the command OUT endpoint
    ///
    /// Returns the number of bytes the device accepted. Callers treat a count
    /// different from `data.len()` as a failed transfer.
    fn write_command(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Read one transfer from the command IN endpoint
    fn read_response(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Read at most `max_len` bytes from the data endpoint in one transfer
    ///
    /// The returned buffer may be shorter than requested; its length is
    /// decided by the device.
    fn read_stream(&mut self, max_len: usize, timeout: Duration)
        -> Result<Vec<u8>, TransportError>;

    /// Clear a halt condition on an endpoint
    fn clear_halt(&mut self, endpoint: Endpoint) -> Result<(), TransportError>;

    /// Wait for the device to settle
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_command(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        (**self).write_command(data, timeout)
    }

    fn read_response(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        (**self).read_response(timeout)
    }

    fn read_stream(
        &mut self,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).read_stream(max_len, timeout)
    }

    fn clear_halt(&mut self, endpoint: Endpoint) -> Result<(), TransportError> {
        (**self).clear_halt(endpoint)
    }

    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }
}
