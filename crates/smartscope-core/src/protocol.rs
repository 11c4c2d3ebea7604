//! SmartScope wire protocol constants and frame types
//!
//! Commands are short bulk frames `[HEADER_CMD_BYTE, opcode, operands...]`
//! sent to the PIC microcontroller that fronts the FPGA. Commands that
//! return data are answered with exactly one 16-byte frame on the command IN
//! endpoint; the first four bytes of that frame are reserved.

use std::time::Duration;

// USB device identifiers
pub const SMARTSCOPE_USB_VENDOR: u16 = 0x04D8;
pub const SMARTSCOPE_USB_PRODUCT: u16 = 0xF4B5;
pub const USB_INTERFACE: u8 = 0;

// USB endpoints
pub const EP_CMD_OUT: u8 = 0x02;
pub const EP_CMD_IN: u8 = 0x83;
pub const EP_DATA: u8 = 0x81;

// Frame markers
pub const HEADER_CMD_BYTE: u8 = 0xC0; // C0 as in Command
pub const HEADER_RESPONSE_BYTE: u8 = 0xAD;

/// Size of every response frame
pub const RESPONSE_SIZE: usize = 16;
/// Size of the command OUT endpoint buffer
pub const COMMAND_WRITE_EP_SIZE: usize = 32;

/// Offset of the payload inside most response frames
pub const RESPONSE_PAYLOAD_OFFSET: usize = 4;
/// Offset of the payload inside a flash ROM read response
pub const FLASH_RESPONSE_PAYLOAD_OFFSET: usize = 5;

/// Largest read answered by a single response (payload at offset 4)
pub const MAX_READ_LENGTH: usize = RESPONSE_SIZE - RESPONSE_PAYLOAD_OFFSET;
/// Largest flash ROM read answered by a single response (payload at offset 5)
pub const MAX_FLASH_READ_LENGTH: usize = RESPONSE_SIZE - FLASH_RESPONSE_PAYLOAD_OFFSET;

/// Largest I2C register write carried by a single `I2C_WRITE` frame
pub const I2C_MAX_WRITE_LENGTH: usize = 27;
/// Largest data chunk carried by a single `I2C_WRITE_BULK` frame
pub const I2C_MAX_WRITE_LENGTH_BULK: usize = 29;

/// End (exclusive) of the user-accessible flash ROM area
pub const FLASH_USER_LIMIT: u32 = 0x1000;
pub const FLASH_USER_ADDRESS_MASK: u32 = FLASH_USER_LIMIT - 1;

// Protocol timeouts
pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(500);
pub const HEADER_TIMEOUT: Duration = Duration::from_millis(1000);
pub const PAYLOAD_TIMEOUT: Duration = Duration::from_millis(3000);
pub const FLUSH_TIMEOUT: Duration = Duration::from_millis(100);

/// PIC controller commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PicCommand {
    PicVersion = 1,
    PicWrite = 2,
    PicRead = 3,
    PicReset = 4,
    PicBootloader = 5,
    EepromRead = 6,
    EepromWrite = 7,
    FlashRomRead = 8,
    FlashRomWrite = 9,
    I2cWrite = 10,
    I2cRead = 11,
    ProgramFpgaStart = 12,
    ProgramFpgaEnd = 13,
    I2cWriteStart = 14,
    I2cWriteBulk = 15,
    I2cWriteStop = 16,
}

impl PicCommand {
    /// Whether the PIC answers this command with a response frame
    pub fn has_response(self) -> bool {
        matches!(
            self,
            PicCommand::PicVersion
                | PicCommand::PicRead
                | PicCommand::EepromRead
                | PicCommand::FlashRomRead
                | PicCommand::I2cRead
        )
    }

    /// Offset of the returned data inside the response frame
    pub fn payload_offset(self) -> usize {
        match self {
            PicCommand::FlashRomRead => FLASH_RESPONSE_PAYLOAD_OFFSET,
            _ => RESPONSE_PAYLOAD_OFFSET,
        }
    }
}

/// A command frame under construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    opcode: PicCommand,
    bytes: Vec<u8>,
}

impl CommandFrame {
    /// Start a frame for `opcode`
    pub fn new(opcode: PicCommand) -> Self {
        let mut bytes = Vec::with_capacity(COMMAND_WRITE_EP_SIZE);
        bytes.push(HEADER_CMD_BYTE);
        bytes.push(opcode as u8);
        Self { opcode, bytes }
    }

    /// Append one operand byte
    pub fn push(mut self, byte: u8) -> Self {
        self.bytes.push(byte);
        self
    }

    /// Append operand bytes
    pub fn extend(mut self, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(data);
        self
    }

    /// Pad the frame with zeros up to `len` bytes
    pub fn pad_to(mut self, len: usize) -> Self {
        if self.bytes.len() < len {
            self.bytes.resize(len, 0);
        }
        self
    }

    /// Opcode carried by this frame
    pub fn opcode(&self) -> PicCommand {
        self.opcode
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A validated 16-byte response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    opcode: PicCommand,
    raw: [u8; RESPONSE_SIZE],
}

impl Response {
    /// Wrap a raw transfer, checking its length
    pub fn parse(opcode: PicCommand, data: &[u8]) -> Option<Self> {
        let raw: [u8; RESPONSE_SIZE] = data.try_into().ok()?;
        Some(Self { opcode, raw })
    }

    /// The raw frame
    pub fn raw(&self) -> &[u8; RESPONSE_SIZE] {
        &self.raw
    }

    /// Whether the reserved marker byte carries the answer marker
    pub fn has_marker(&self) -> bool {
        self.raw[0] == HEADER_RESPONSE_BYTE
    }

    /// Opcode-specific payload, starting at the opcode's payload offset
    pub fn payload(&self) -> &[u8] {
        &self.raw[self.opcode.payload_offset()..]
    }
}

/// PIC firmware version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PicVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl PicVersion {
    /// Decode from a `PIC_VERSION` response (bytes 6, 5, 4 = major, minor, patch)
    pub fn from_response(response: &Response) -> Self {
        let raw = response.raw();
        Self {
            major: raw[6],
            minor: raw[5],
            patch: raw[4],
        }
    }
}

impl std::fmt::Display for PicVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Hardware revision derived from a USB serial number (its last 3 characters)
pub fn hardware_revision(serial: &str) -> Option<&str> {
    let start = serial.char_indices().rev().nth(2)?.0;
    Some(&serial[start..])
}

/// File name of the FPGA bitstream for a hardware revision
pub fn firmware_file_name(hw_rev: &str) -> String {
    format!("SmartScope_{}.bin", hw_rev)
}
