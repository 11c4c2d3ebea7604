//! Device session

use crate::transport::Transport;

/// An open SmartScope
///
/// The session exclusively owns its transport. Every protocol layer (command
/// codec, register access, firmware loader, acquisition reader) is a set of
/// methods on this type borrowing it mutably, so at most one request is ever
/// in flight.
pub struct Scope<T: Transport> {
    transport: T,
}

impl<T: Transport> Scope<T> {
    /// Wrap an opened transport
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Shared access to the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Direct access to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport
    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for Scope<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("transport", &self.transport)
            .finish()
    }
}
