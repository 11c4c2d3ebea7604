//! Error types for smartscope-core
//!
//! Errors are split by where they originate: the USB link (`TransportError`),
//! a well-formed transfer carrying malformed content (`ProtocolError`), losing
//! the acquisition stream (`Error::Sync`), and requests rejected locally
//! before any I/O is attempted (`ConfigError`).

use thiserror::Error;

/// Failures of the raw USB link
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Transfer did not complete within its timeout
    #[error("USB transfer timed out")]
    Timeout,
    /// Endpoint is halted
    #[error("USB endpoint stalled")]
    Stall,
    /// Device went away
    #[error("USB device disconnected")]
    Disconnected,
    /// A write moved fewer bytes than requested
    #[error("short USB write: expected {expected} bytes, wrote {actual}")]
    ShortWrite {
        /// Bytes handed to the transfer
        expected: usize,
        /// Bytes the device accepted
        actual: usize,
    },
    /// Any other host-side USB failure
    #[error("USB I/O error: {0}")]
    Io(String),
}

/// Transfers that completed but carried unexpected content
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Command response was not exactly one response frame
    #[error("response to opcode 0x{opcode:02X} was {actual} bytes, expected {expected}")]
    ResponseLength {
        /// Opcode of the command that was answered
        opcode: u8,
        /// Expected frame size
        expected: usize,
        /// Received size
        actual: usize,
    },
    /// Header block carried the magic but was cut short
    #[error("acquisition header truncated to {0} bytes")]
    TruncatedHeader(usize),
    /// Data frame burst geometry is empty or larger than one fetch
    #[error("unfetchable payload: {bursts} bursts of {bytes_per_burst} bytes")]
    BadPayloadSize {
        /// Announced burst count
        bursts: u16,
        /// Announced burst size
        bytes_per_burst: u8,
    },
}

/// Requests rejected before reaching the device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Register has no slot in the acquisition header snapshot
    #[error("register {0} is not a header register")]
    NotHeaderRegister(&'static str),
    /// Strobe has no slot in the acquisition header snapshot
    #[error("strobe {0} is not a header strobe")]
    NotHeaderStrobe(&'static str),
    /// Name did not resolve to any known identifier
    #[error("unknown {kind} name: {name}")]
    UnknownName {
        /// Identifier family ("register", "strobe", ...)
        kind: &'static str,
        /// The name as given
        name: String,
    },
    /// Flash ROM access outside the user area
    #[error("flash ROM access 0x{addr:04X}+{len} exceeds 0x{limit:04X}")]
    RomOutOfRange {
        /// Start address
        addr: u32,
        /// Requested length
        len: usize,
        /// Exclusive end of the user area
        limit: u32,
    },
    /// Payload does not fit in a single command or response frame
    #[error("{what} of {len} bytes exceeds the {max}-byte limit")]
    TooLong {
        /// What was being encoded
        what: &'static str,
        /// Requested length
        len: usize,
        /// Maximum allowed length
        max: usize,
    },
    /// Firmware blob cannot be described by the upload handshake
    #[error("invalid firmware blob: {0}")]
    InvalidFirmware(String),
}

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// USB link failure
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Malformed frame from the device
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Acquisition stream could not be resynchronized
    #[error("no acquisition header after {misses} reads")]
    Sync {
        /// Number of consecutive non-header blocks read
        misses: usize,
    },
    /// Local validation failure
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias using the core Error type
pub type Result<T> = std::result::Result<T, Error>;
