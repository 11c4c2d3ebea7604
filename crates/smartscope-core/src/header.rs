//! Acquisition header parsing
//!
//! Every packet on the data endpoint starts with a 64-byte header: the `"LN"`
//! magic, the payload geometry, status flags and a snapshot of the header
//! registers and strobes that were in effect for the acquisition.

use bitflags::bitflags;
use zerocopy::little_endian::U16;
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

use crate::error::{ConfigError, ProtocolError};
use crate::regs::{header_offset, header_strobe_bit, Register, Strobe, HDR_N_REGS};

/// Header size in bytes
pub const HEADER_SIZE: usize = 64;
/// Header magic
pub const HEADER_MAGIC: [u8; 2] = *b"LN";
/// Largest payload following a header
pub const FETCH_SIZE_MAX: usize = 4096;
/// ADC sample period at `INPUT_DECIMATION = 0`, in seconds
pub const BASE_SAMPLE_PERIOD: f64 = 10e-9;
/// Smallest acquisition, at `ACQUISITION_DEPTH = 0`
pub const ACQUISITION_DEPTH_MIN: u64 = 2048;

const DIVIDERS: [f64; 3] = [1.0, 6.0, 36.0];
const MULTIPLIERS: [f64; 3] = [1.1, 2.0, 3.0];

/// Wire layout of the header
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct RawHeader {
    magic: [u8; 2],
    header_offset: i8,
    bytes_per_burst: u8,
    n_bursts: U16,
    offset: U16,
    _reserved0: [u8; 2],
    flags: u8,
    acquisition_id: u8,
    _reserved1: [u8; 3],
    registers: [u8; HDR_N_REGS],
    strobes: [u8; 2],
    _reserved2: [u8; 17],
}

const _: () = assert!(core::mem::size_of::<RawHeader>() == HEADER_SIZE);

bitflags! {
    /// Header status flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HeaderFlags: u8 {
        const ACQUIRING = 0x01;
        const IS_OVERVIEW = 0x02;
        const IS_LAST_ACQUISITION = 0x04;
        const ROLLING = 0x08;
        const TIMED_OUT = 0x10;
        const AWAITING_TRIGGER = 0x20;
        const ARMED = 0x40;
        const IS_FULL_ACQUISITION = 0x80;
    }
}

/// What a packet carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Decimated view of the whole acquisition buffer
    Overview,
    /// Part of a full-resolution acquisition dump
    Acquisition,
    /// The current viewport
    Viewport,
}

/// Analog input channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    /// Both channels, in wire order
    pub const ALL: [Channel; 2] = [Channel::A, Channel::B];

    /// 0 for A, 1 for B
    pub const fn index(self) -> usize {
        match self {
            Channel::A => 0,
            Channel::B => 1,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::A => f.write_str("A"),
            Channel::B => f.write_str("B"),
        }
    }
}

/// Input attenuation selected by `DIVIDER_MULTIPLIER`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputRange {
    /// Divider index (0..=2)
    pub divider_index: u8,
    /// Multiplier index (0..=2)
    pub multiplier_index: u8,
    /// Input divider ratio
    pub divider: f64,
    /// Amplifier gain
    pub multiplier: f64,
}

impl InputRange {
    /// Decode one channel's range from a `DIVIDER_MULTIPLIER` value
    ///
    /// Index 3 in either field selects no valid range.
    pub fn decode(divider_multiplier: u8, channel: Channel) -> Option<Self> {
        let shift = 4 * channel.index();
        let divider_index = (divider_multiplier >> shift) & 0x3;
        let multiplier_index = (divider_multiplier >> (shift + 2)) & 0x3;
        Some(Self {
            divider_index,
            multiplier_index,
            divider: *DIVIDERS.get(divider_index as usize)?,
            multiplier: *MULTIPLIERS.get(multiplier_index as usize)?,
        })
    }

    /// Encode back into the nibble for `channel`
    pub fn encode(&self, channel: Channel) -> u8 {
        ((self.multiplier_index << 2) | self.divider_index) << (4 * channel.index())
    }
}

/// A parsed acquisition header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionHeader {
    /// Raw header-offset byte
    pub header_offset: i8,
    pub bytes_per_burst: u8,
    pub n_bursts: u16,
    /// Raw offset field
    pub offset: u16,
    pub flags: HeaderFlags,
    pub acquisition_id: u8,
    /// Header register snapshot, see [`crate::regs::HEADER_REGISTERS`]
    pub registers: [u8; HDR_N_REGS],
    /// Header strobe snapshot, see [`crate::regs::HEADER_STROBES`]
    pub strobes: [u8; 2],
}

/// Whether `block` starts with the header magic
pub fn has_magic(block: &[u8]) -> bool {
    block.starts_with(&HEADER_MAGIC)
}

impl AcquisitionHeader {
    /// Parse a header block
    ///
    /// Returns `Ok(None)` when the block does not start with the magic, and an
    /// error when it does but is shorter than a full header.
    pub fn parse(block: &[u8]) -> Result<Option<Self>, ProtocolError> {
        if !has_magic(block) {
            return Ok(None);
        }
        let (raw, _) = RawHeader::read_from_prefix(block)
            .map_err(|_| ProtocolError::TruncatedHeader(block.len()))?;
        Ok(Some(Self {
            header_offset: raw.header_offset,
            bytes_per_burst: raw.bytes_per_burst,
            n_bursts: raw.n_bursts.get(),
            offset: raw.offset.get(),
            flags: HeaderFlags::from_bits_retain(raw.flags),
            acquisition_id: raw.acquisition_id,
            registers: raw.registers,
            strobes: raw.strobes,
        }))
    }

    /// Packet classification; the overview flag wins over everything
    pub fn kind(&self) -> PacketKind {
        if self.flags.contains(HeaderFlags::IS_OVERVIEW) {
            PacketKind::Overview
        } else if self.flags.contains(HeaderFlags::IS_FULL_ACQUISITION) {
            PacketKind::Acquisition
        } else {
            PacketKind::Viewport
        }
    }

    /// Payload bytes the burst geometry announces
    pub fn announced_len(&self) -> usize {
        self.n_bursts as usize * self.bytes_per_burst as usize
    }

    /// Number of payload bytes to request after this header
    ///
    /// Data frames without bursts, or announcing more than
    /// [`FETCH_SIZE_MAX`] bytes, cannot be fetched.
    pub fn payload_len(&self) -> Result<usize, ProtocolError> {
        if self.flags.contains(HeaderFlags::TIMED_OUT) {
            return Ok(0);
        }
        if self.flags.contains(HeaderFlags::IS_OVERVIEW) {
            return Ok(FETCH_SIZE_MAX);
        }
        let len = self.announced_len();
        if self.n_bursts == 0 || len > FETCH_SIZE_MAX {
            return Err(ProtocolError::BadPayloadSize {
                bursts: self.n_bursts,
                bytes_per_burst: self.bytes_per_burst,
            });
        }
        Ok(len)
    }

    /// Snapshot value of a header register
    pub fn register(&self, reg: Register) -> Result<u8, ConfigError> {
        Ok(self.registers[header_offset(reg)?])
    }

    /// Snapshot state of a header strobe
    pub fn strobe(&self, strobe: Strobe) -> Result<bool, ConfigError> {
        let bit = header_strobe_bit(strobe)?;
        Ok(u16::from_le_bytes(self.strobes) & (1 << bit) != 0)
    }

    // Only called with registers listed in HEADER_REGISTERS
    fn known_register(&self, reg: Register) -> u8 {
        self.register(reg).unwrap_or_default()
    }

    fn known_strobe(&self, strobe: Strobe) -> bool {
        self.strobe(strobe).unwrap_or_default()
    }

    fn known_le(&self, regs: &[Register]) -> u32 {
        regs.iter()
            .rev()
            .fold(0, |acc, &r| (acc << 8) | self.known_register(r) as u32)
    }

    /// Sample period in seconds, `10 ns * 2^INPUT_DECIMATION`
    pub fn sample_period(&self) -> f64 {
        let decimation = self.known_register(Register::InputDecimation);
        BASE_SAMPLE_PERIOD * 2f64.powi(decimation as i32)
    }

    /// Samples per acquisition, `2048 << ACQUISITION_DEPTH`
    pub fn acquisition_depth(&self) -> Option<u64> {
        let depth = self.known_register(Register::AcquisitionDepth) as u32;
        (depth <= 52).then(|| ACQUISITION_DEPTH_MIN << depth)
    }

    /// Trigger holdoff in samples
    pub fn trigger_holdoff(&self) -> u32 {
        self.known_le(&[
            Register::TriggerHoldoffB0,
            Register::TriggerHoldoffB1,
            Register::TriggerHoldoffB2,
            Register::TriggerHoldoffB3,
        ])
    }

    /// Viewport offset into the acquisition buffer
    pub fn view_offset(&self) -> u32 {
        self.known_le(&[
            Register::ViewOffsetB0,
            Register::ViewOffsetB1,
            Register::ViewOffsetB2,
        ])
    }

    pub fn view_excess(&self) -> u16 {
        self.known_le(&[Register::ViewExcessB0, Register::ViewExcessB1]) as u16
    }

    /// Input range of an analog channel
    pub fn input_range(&self, channel: Channel) -> Option<InputRange> {
        InputRange::decode(self.known_register(Register::DividerMultiplier), channel)
    }

    /// The channel carrying logic analyzer samples, if enabled
    pub fn logic_channel(&self) -> Option<Channel> {
        if !self.known_strobe(Strobe::LaEnable) {
            return None;
        }
        Some(if self.known_strobe(Strobe::LaChannel) {
            Channel::B
        } else {
            Channel::A
        })
    }

    /// Whether the AC/DC coupling strobe of `channel` selects DC
    pub fn dc_coupled(&self, channel: Channel) -> bool {
        self.known_strobe(match channel {
            Channel::A => Strobe::ChaDcCoupling,
            Channel::B => Strobe::ChbDcCoupling,
        })
    }

    pub fn rolling(&self) -> bool {
        self.known_strobe(Strobe::Roll)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a raw header block
    pub(crate) fn header_block(flags: u8, bursts: u16, bytes_per_burst: u8) -> Vec<u8> {
        let mut block = vec![0u8; HEADER_SIZE];
        block[..2].copy_from_slice(b"LN");
        block[3] = bytes_per_burst;
        block[4..6].copy_from_slice(&bursts.to_le_bytes());
        block[10] = flags;
        block
    }

    fn set_reg(block: &mut [u8], reg: Register, value: u8) {
        block[15 + header_offset(reg).unwrap()] = value;
    }

    #[test]
    fn test_parse_fields() {
        let mut block = header_block(0x01, 0x0102, 64);
        block[2] = 0xF0;
        block[6..8].copy_from_slice(&0xBEEFu16.to_le_bytes());
        block[11] = 7;
        block[45] = 0b1_0001;
        let hdr = AcquisitionHeader::parse(&block).unwrap().unwrap();
        assert_eq!(hdr.header_offset, -16);
        assert_eq!(hdr.bytes_per_burst, 64);
        assert_eq!(hdr.n_bursts, 0x0102);
        assert_eq!(hdr.offset, 0xBEEF);
        assert_eq!(hdr.acquisition_id, 7);
        assert_eq!(hdr.flags, HeaderFlags::ACQUIRING);
        assert_eq!(hdr.logic_channel(), Some(Channel::B));
    }

    #[test]
    fn test_no_magic_and_truncated() {
        assert_eq!(AcquisitionHeader::parse(&[0u8; 64]), Ok(None));
        assert_eq!(AcquisitionHeader::parse(b"XN"), Ok(None));
        let block = header_block(0, 0, 0);
        assert_eq!(
            AcquisitionHeader::parse(&block[..40]),
            Err(ProtocolError::TruncatedHeader(40))
        );
    }

    #[test]
    fn test_flags_acquiring_only() {
        let hdr = AcquisitionHeader::parse(&header_block(0x01, 0, 0))
            .unwrap()
            .unwrap();
        assert!(hdr.flags.contains(HeaderFlags::ACQUIRING));
        assert_eq!(hdr.flags.iter().count(), 1);
    }

    #[test]
    fn test_classification() {
        let kind = |flags| {
            AcquisitionHeader::parse(&header_block(flags, 0, 0))
                .unwrap()
                .unwrap()
                .kind()
        };
        assert_eq!(kind(0x02 | 0x80), PacketKind::Overview);
        assert_eq!(kind(0x80), PacketKind::Acquisition);
        assert_eq!(kind(0x01), PacketKind::Viewport);
    }

    #[test]
    fn test_payload_len() {
        let len = |flags, bursts, bpb| {
            AcquisitionHeader::parse(&header_block(flags, bursts, bpb))
                .unwrap()
                .unwrap()
                .payload_len()
        };
        assert_eq!(len(0x10 | 0x02, 64, 64), Ok(0));
        assert_eq!(len(0x10, 0, 0), Ok(0));
        assert_eq!(len(0x02, 1, 1), Ok(4096));
        assert_eq!(len(0x02, 0, 0), Ok(4096));
        assert_eq!(len(0x00, 16, 64), Ok(1024));
        assert_eq!(len(0x00, 64, 64), Ok(4096));
        assert_eq!(
            len(0x00, 128, 64),
            Err(ProtocolError::BadPayloadSize {
                bursts: 128,
                bytes_per_burst: 64
            })
        );
        assert_eq!(
            len(0x00, 0, 64),
            Err(ProtocolError::BadPayloadSize {
                bursts: 0,
                bytes_per_burst: 64
            })
        );
    }

    #[test]
    fn test_divider_multiplier_decoding() {
        let mut block = header_block(0, 0, 0);
        set_reg(&mut block, Register::DividerMultiplier, 0x99);
        let hdr = AcquisitionHeader::parse(&block).unwrap().unwrap();
        for ch in Channel::ALL {
            let range = hdr.input_range(ch).unwrap();
            assert_eq!(range.divider, 6.0);
            assert_eq!(range.multiplier, 3.0);
        }
        assert_eq!(InputRange::decode(0x03, Channel::A), None);
        assert!(InputRange::decode(0x03, Channel::B).is_some());
        let range = InputRange::decode(0x60, Channel::B).unwrap();
        assert_eq!(range.encode(Channel::B), 0x60);
    }

    #[test]
    fn test_register_helpers() {
        let mut block = header_block(0, 0, 0);
        set_reg(&mut block, Register::InputDecimation, 3);
        set_reg(&mut block, Register::AcquisitionDepth, 2);
        set_reg(&mut block, Register::TriggerHoldoffB0, 0x78);
        set_reg(&mut block, Register::TriggerHoldoffB3, 0x12);
        set_reg(&mut block, Register::ViewOffsetB1, 0x01);
        set_reg(&mut block, Register::ViewExcessB1, 0x02);
        let hdr = AcquisitionHeader::parse(&block).unwrap().unwrap();
        assert!((hdr.sample_period() - 80e-9).abs() < 1e-15);
        assert_eq!(hdr.acquisition_depth(), Some(8192));
        assert_eq!(hdr.trigger_holdoff(), 0x1200_0078);
        assert_eq!(hdr.view_offset(), 0x100);
        assert_eq!(hdr.view_excess(), 0x200);
        assert!(hdr.register(Register::SpiAddress).is_err());
        assert!(hdr.strobe(Strobe::AcqStart).is_err());
    }
}
