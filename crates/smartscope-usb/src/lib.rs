//! smartscope-usb - USB backend for the LabNation SmartScope
//!
//! Implements [`smartscope_core::Transport`] over `nusb` bulk endpoints and
//! provides device enumeration.
//!
//! # Example
//!
//! ```no_run
//! use smartscope_usb::{open, parse_options};
//!
//! let config = parse_options(&[("index", "0")])?;
//! let mut scope = open(&config)?;
//! println!("PIC firmware {}", scope.pic_version()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Configuration Options
//!
//! - `device=N` or `index=N`: Select the Nth device (0-indexed)
//! - `serial=S`: Select device by USB serial number

mod device;
mod error;

pub use device::{
    list_devices, open, parse_options, split_options, ScopeDeviceInfo, UsbConfig, UsbTransport,
};
pub use error::{Result, UsbError};
