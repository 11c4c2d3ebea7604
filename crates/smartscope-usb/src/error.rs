//! Error types for the SmartScope USB backend

use std::fmt;

/// Result type for USB backend operations
pub type Result<T> = std::result::Result<T, UsbError>;

/// Errors that can occur while finding and opening a SmartScope
#[derive(Debug)]
pub enum UsbError {
    /// No matching device on the bus
    DeviceNotFound,
    /// Failed to enumerate or open the device
    OpenFailed(String),
    /// Failed to claim the interface or its endpoints
    ClaimFailed(String),
    /// Option parsing error
    InvalidParameter(String),
    /// Protocol error after the device was opened
    Core(smartscope_core::Error),
}

impl fmt::Display for UsbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsbError::DeviceNotFound => {
                write!(f, "SmartScope not found (VID:04D8 PID:F4B5)")
            }
            UsbError::OpenFailed(msg) => write!(f, "Failed to open SmartScope: {}", msg),
            UsbError::ClaimFailed(msg) => write!(f, "Failed to claim interface: {}", msg),
            UsbError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            UsbError::Core(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for UsbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UsbError::Core(e) => Some(e),
            _ => None,
        }
    }
}

impl From<smartscope_core::Error> for UsbError {
    fn from(e: smartscope_core::Error) -> Self {
        UsbError::Core(e)
    }
}

impl From<nusb::Error> for UsbError {
    fn from(e: nusb::Error) -> Self {
        UsbError::OpenFailed(e.to_string())
    }
}
