//! smartscope-core - Protocol stack for the LabNation SmartScope
//!
//! This crate implements everything needed to drive a SmartScope over an
//! abstract USB [`Transport`]: the PIC command codec, the FPGA register and
//! strobe contract, SPI access to the ADC, the FPGA bitstream loader, the
//! acquisition stream reader and the post-upload bring-up script. The
//! concrete USB backend lives in `smartscope-usb`.
//!
//! # Layers
//!
//! - [`transport`] - raw bulk I/O on the three device endpoints
//! - [`command`] - framed PIC commands and 16-byte responses
//! - [`registers`] - I2C-tunnelled FPGA registers and strobes, SPI-tunnelled
//!   ADC registers
//! - [`firmware`] - FPGA bitstream upload handshake
//! - [`acquisition`] - header resync, payload fetch and channel decoding
//! - [`bringup`] - the fixed configuration script run after an upload
//!
//! All of them are methods on [`Scope`], which owns the transport.
//!
//! # Example
//!
//! ```ignore
//! use smartscope_core::{Channel, Scope};
//!
//! let mut scope = Scope::new(transport);
//! println!("PIC firmware {}", scope.pic_version()?);
//! scope.bring_up()?;
//! let frame = scope.read_frame()?;
//! println!("{:?}: {} samples on A", frame.kind(), frame.channel(Channel::A).len());
//! ```

#![warn(rust_2018_idioms)]

pub mod acquisition;
pub mod bringup;
pub mod command;
pub mod control;
pub mod error;
pub mod firmware;
pub mod header;
pub mod protocol;
pub mod registers;
pub mod regs;
pub mod session;
pub mod transport;

#[cfg(test)]
mod mock;

pub use acquisition::{verify_adc_ramp, ChannelSamples, Frame};
pub use control::TriggerMode;
pub use error::{ConfigError, Error, ProtocolError, Result, TransportError};
pub use firmware::UploadPlan;
pub use header::{AcquisitionHeader, Channel, HeaderFlags, InputRange, PacketKind};
pub use protocol::PicVersion;
pub use registers::{FpgaVersion, RegisterDump};
pub use regs::{AdcRegister, Register, RomRegister, Strobe};
pub use session::Scope;
pub use transport::{Endpoint, Transport};
