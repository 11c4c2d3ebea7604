//! Command codec
//!
//! One method per PIC primitive. Every method builds a single command frame,
//! writes it to the command endpoint and, for the response-bearing opcodes,
//! reads back exactly one response frame before returning.

use crate::error::{ConfigError, ProtocolError, Result, TransportError};
use crate::protocol::*;
use crate::regs::FPGA_I2C_ADDRESS_AWG;
use crate::session::Scope;
use crate::transport::Transport;

/// Largest payload of a `PIC_WRITE` / `EEPROM_WRITE` frame
const MAX_SHORT_WRITE_LENGTH: usize = COMMAND_WRITE_EP_SIZE - 4;
/// Largest payload of a `FLASH_ROM_WRITE` frame
const MAX_FLASH_WRITE_LENGTH: usize = COMMAND_WRITE_EP_SIZE - 5;

fn check_len(what: &'static str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(ConfigError::TooLong { what, len, max }.into());
    }
    Ok(())
}

fn check_flash_range(addr: u32, len: usize) -> Result<()> {
    if addr as usize + len > FLASH_USER_LIMIT as usize {
        return Err(ConfigError::RomOutOfRange {
            addr,
            len,
            limit: FLASH_USER_LIMIT,
        }
        .into());
    }
    Ok(())
}

impl<T: Transport> Scope<T> {
    /// Write one command frame
    ///
    /// A transfer that moves fewer bytes than the frame holds is an error.
    pub fn send(&mut self, frame: &CommandFrame) -> Result<()> {
        log::trace!("cmd out {:?}: {:02x?}", frame.opcode(), frame.as_bytes());
        self.write_raw(frame.as_bytes())
    }

    /// Write unframed bytes to the command endpoint (bitstream data)
    pub(crate) fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let written = self
            .transport_mut()
            .write_command(bytes, COMMAND_TIMEOUT)?;
        if written != bytes.len() {
            return Err(TransportError::ShortWrite {
                expected: bytes.len(),
                actual: written,
            }
            .into());
        }
        Ok(())
    }

    /// Write one command frame and read its response frame
    pub fn transact(&mut self, frame: &CommandFrame) -> Result<Response> {
        self.send(frame)?;
        let data = self.transport_mut().read_response(COMMAND_TIMEOUT)?;
        log::trace!("cmd in {:?}: {:02x?}", frame.opcode(), data);
        let response =
            Response::parse(frame.opcode(), &data).ok_or(ProtocolError::ResponseLength {
                opcode: frame.opcode() as u8,
                expected: RESPONSE_SIZE,
                actual: data.len(),
            })?;
        if !response.has_marker() {
            log::debug!(
                "response to {:?} lacks marker byte (got 0x{:02X})",
                frame.opcode(),
                response.raw()[0]
            );
        }
        Ok(response)
    }

    /// Send a raw frame, reading a response only when its opcode has one
    pub fn command(&mut self, frame: &CommandFrame) -> Result<Option<Response>> {
        if frame.opcode().has_response() {
            self.transact(frame).map(Some)
        } else {
            self.send(frame).map(|()| None)
        }
    }

    /// Query the PIC firmware version
    pub fn pic_version(&mut self) -> Result<PicVersion> {
        let response = self.transact(&CommandFrame::new(PicCommand::PicVersion))?;
        let version = PicVersion::from_response(&response);
        log::debug!("PIC firmware version {}", version);
        Ok(version)
    }

    /// Reset the PIC; the device re-enumerates afterwards
    pub fn pic_reset(&mut self) -> Result<()> {
        log::info!("Resetting SmartScope controller");
        self.send(&CommandFrame::new(PicCommand::PicReset))
    }

    /// Read PIC memory
    pub fn pic_read(&mut self, addr: u8, len: usize) -> Result<Vec<u8>> {
        self.short_read(PicCommand::PicRead, addr, len)
    }

    /// Write PIC memory
    pub fn pic_write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        self.short_write(PicCommand::PicWrite, addr, data)
    }

    /// Read the PIC EEPROM
    pub fn eeprom_read(&mut self, addr: u8, len: usize) -> Result<Vec<u8>> {
        self.short_read(PicCommand::EepromRead, addr, len)
    }

    /// Write the PIC EEPROM
    pub fn eeprom_write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        self.short_write(PicCommand::EepromWrite, addr, data)
    }

    fn short_read(&mut self, opcode: PicCommand, addr: u8, len: usize) -> Result<Vec<u8>> {
        check_len("read", len, MAX_READ_LENGTH)?;
        let frame = CommandFrame::new(opcode).push(addr).push(len as u8);
        let response = self.transact(&frame)?;
        Ok(response.payload()[..len].to_vec())
    }

    fn short_write(&mut self, opcode: PicCommand, addr: u8, data: &[u8]) -> Result<()> {
        check_len("write", data.len(), MAX_SHORT_WRITE_LENGTH)?;
        let frame = CommandFrame::new(opcode)
            .push(addr)
            .push(data.len() as u8)
            .extend(data);
        self.send(&frame)
    }

    /// Read up to 11 bytes of flash ROM with a single command
    pub fn flash_rom_read(&mut self, addr: u16, len: usize) -> Result<Vec<u8>> {
        check_flash_range(addr as u32, len)?;
        check_len("flash ROM read", len, MAX_FLASH_READ_LENGTH)?;
        let frame = CommandFrame::new(PicCommand::FlashRomRead)
            .push(addr as u8)
            .push(len as u8)
            .push((addr >> 8) as u8);
        let response = self.transact(&frame)?;
        Ok(response.payload()[..len].to_vec())
    }

    /// Write up to 27 bytes of flash ROM with a single command
    pub fn flash_rom_write(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        check_flash_range(addr as u32, data.len())?;
        check_len("flash ROM write", data.len(), MAX_FLASH_WRITE_LENGTH)?;
        let frame = CommandFrame::new(PicCommand::FlashRomWrite)
            .push(addr as u8)
            .push(data.len() as u8)
            .push((addr >> 8) as u8)
            .extend(data);
        self.send(&frame)
    }

    /// Read an arbitrary span of the calibration ROM
    ///
    /// The span is split into successive single-response reads.
    pub fn read_rom(&mut self, addr: u32, len: usize) -> Result<Vec<u8>> {
        self.read_rom_with_progress(addr, len, |_, _| {})
    }

    /// Like [`Scope::read_rom`], reporting `(bytes_done, total)` after each read
    pub fn read_rom_with_progress<F>(&mut self, addr: u32, len: usize, mut progress: F) -> Result<Vec<u8>>
    where
        F: FnMut(usize, usize),
    {
        check_flash_range(addr, len)?;
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            let chunk = (len - out.len()).min(MAX_FLASH_READ_LENGTH);
            let at = addr + out.len() as u32;
            let data = self.flash_rom_read(at as u16, chunk)?;
            out.extend_from_slice(&data);
            progress(out.len(), len);
        }
        Ok(out)
    }

    /// Announce an FPGA bitstream of `packets` 32-byte packets
    pub fn fpga_program_start(&mut self, packets: u16) -> Result<()> {
        let [hi, lo] = packets.to_be_bytes();
        self.send(&CommandFrame::new(PicCommand::ProgramFpgaStart).push(hi).push(lo))
    }

    /// Terminate an FPGA bitstream upload
    pub fn fpga_program_end(&mut self) -> Result<()> {
        self.send(&CommandFrame::new(PicCommand::ProgramFpgaEnd))
    }

    /// Write consecutive registers of an I2C target
    ///
    /// Writes longer than 27 bytes are split into several frames at
    /// increasing register addresses. An empty write only sets the target's
    /// register pointer.
    pub fn i2c_write(&mut self, i2c_addr: u8, reg: u8, data: &[u8]) -> Result<()> {
        let room = 0x100 - reg as usize;
        check_len("I2C register write", data.len(), room)?;

        if data.is_empty() {
            return self.i2c_write_frame(i2c_addr, reg, data);
        }
        for (i, chunk) in data.chunks(I2C_MAX_WRITE_LENGTH).enumerate() {
            let at = reg as usize + i * I2C_MAX_WRITE_LENGTH;
            self.i2c_write_frame(i2c_addr, at as u8, chunk)?;
        }
        Ok(())
    }

    fn i2c_write_frame(&mut self, i2c_addr: u8, reg: u8, data: &[u8]) -> Result<()> {
        let frame = CommandFrame::new(PicCommand::I2cWrite)
            .push(data.len() as u8 + 2)
            .push(i2c_addr << 1)
            .push(reg)
            .extend(data);
        self.send(&frame)
    }

    /// Read `len` bytes from an I2C target at its current register pointer
    pub fn i2c_read(&mut self, i2c_addr: u8, len: usize) -> Result<Vec<u8>> {
        check_len("I2C read", len, MAX_READ_LENGTH)?;
        let frame = CommandFrame::new(PicCommand::I2cRead)
            .push(i2c_addr)
            .push(len as u8);
        let response = self.transact(&frame)?;
        Ok(response.payload()[..len].to_vec())
    }

    /// Open a bulk write to the AWG memory at `addr`
    pub fn i2c_write_start(&mut self, addr: u8) -> Result<()> {
        let frame = CommandFrame::new(PicCommand::I2cWriteStart)
            .push(2)
            .push(FPGA_I2C_ADDRESS_AWG << 1)
            .push(addr);
        self.send(&frame)
    }

    /// Stream up to 29 bytes into an open bulk write
    pub fn i2c_write_bulk(&mut self, data: &[u8]) -> Result<()> {
        check_len("I2C bulk write", data.len(), I2C_MAX_WRITE_LENGTH_BULK)?;
        let frame = CommandFrame::new(PicCommand::I2cWriteBulk)
            .push(data.len() as u8)
            .extend(data)
            .pad_to(COMMAND_WRITE_EP_SIZE);
        self.send(&frame)
    }

    /// Close a bulk write
    pub fn i2c_write_stop(&mut self) -> Result<()> {
        self.send(&CommandFrame::new(PicCommand::I2cWriteStop).push(0))
    }

    /// Load waveform samples into the AWG memory
    ///
    /// Short writes use a plain `I2C_WRITE`; longer ones go through the bulk
    /// start/body/stop sequence.
    pub fn awg_write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        if data.len() <= I2C_MAX_WRITE_LENGTH {
            return self.i2c_write_frame(FPGA_I2C_ADDRESS_AWG, addr, data);
        }
        log::debug!("AWG bulk write of {} bytes at 0x{:02X}", data.len(), addr);
        self.i2c_write_start(addr)?;
        for chunk in data.chunks(I2C_MAX_WRITE_LENGTH_BULK) {
            self.i2c_write_bulk(chunk)?;
        }
        self.i2c_write_stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Event, MockTransport};

    fn scope() -> Scope<MockTransport> {
        Scope::new(MockTransport::new())
    }

    #[test]
    fn test_pic_version() {
        let mut s = scope();
        s.transport_mut().respond(4, &[9, 8, 7]);
        let v = s.pic_version().unwrap();
        assert_eq!(v.to_string(), "7.8.9");
        assert_eq!(
            s.transport().events,
            vec![Event::Write(vec![0xC0, 0x01]), Event::ReadResponse]
        );
    }

    #[test]
    fn test_response_length_mismatch_is_protocol_error() {
        let mut s = scope();
        s.transport_mut().responses.push_back(Ok(vec![0xAD; 15]));
        let err = s.pic_version().unwrap_err();
        assert_eq!(
            err,
            crate::Error::Protocol(ProtocolError::ResponseLength {
                opcode: 1,
                expected: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn test_timeout_is_transport_error() {
        let mut s = scope();
        let err = s.i2c_read(0x0D, 1).unwrap_err();
        assert_eq!(err, crate::Error::Transport(TransportError::Timeout));
    }

    #[test]
    fn test_short_write_is_transport_error() {
        let mut s = scope();
        s.transport_mut().write_limit = Some(3);
        let err = s.i2c_write(0x0C, 0, &[1, 2]).unwrap_err();
        assert_eq!(
            err,
            crate::Error::Transport(TransportError::ShortWrite {
                expected: 7,
                actual: 3
            })
        );
    }

    #[test]
    fn test_non_response_opcodes_do_not_read() {
        let mut s = scope();
        s.pic_reset().unwrap();
        s.fpga_program_start(0x1234).unwrap();
        s.fpga_program_end().unwrap();
        assert_eq!(
            s.transport().events,
            vec![
                Event::Write(vec![0xC0, 0x04]),
                Event::Write(vec![0xC0, 0x0C, 0x12, 0x34]),
                Event::Write(vec![0xC0, 0x0D]),
            ]
        );
    }

    #[test]
    fn test_i2c_read_returns_byte_four() {
        let mut s = scope();
        let mut raw = vec![0u8; 16];
        raw[3] = 0x33;
        raw[4] = 0x44;
        raw[5] = 0x55;
        s.transport_mut().responses.push_back(Ok(raw));
        assert_eq!(s.i2c_read(0x0D, 1).unwrap(), vec![0x44]);
        assert_eq!(s.transport().writes(), vec![vec![0xC0, 0x0B, 0x0D, 0x01]]);
    }

    #[test]
    fn test_i2c_write_splits_long_writes() {
        let mut s = scope();
        let data: Vec<u8> = (0..30).collect();
        s.i2c_write(0x0C, 3, &data).unwrap();
        let writes = s.transport().writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(&writes[0][..5], &[0xC0, 0x0A, 29, 0x18, 3]);
        assert_eq!(&writes[0][5..], &data[..27]);
        assert_eq!(writes[1], vec![0xC0, 0x0A, 5, 0x18, 30, 27, 28, 29]);
    }

    #[test]
    fn test_i2c_write_empty_sets_pointer() {
        let mut s = scope();
        s.i2c_write(0x0D, 4, &[]).unwrap();
        assert_eq!(s.transport().writes(), vec![vec![0xC0, 0x0A, 2, 0x1A, 4]]);
    }

    #[test]
    fn test_flash_rom_read_range_checked_before_io() {
        let mut s = scope();
        let err = s.flash_rom_read(0x0FFA, 8).unwrap_err();
        assert!(matches!(err, crate::Error::Config(ConfigError::RomOutOfRange { .. })));
        let err = s.read_rom(0x0F00, 0x200).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
        assert!(s.transport().events.is_empty());
    }

    #[test]
    fn test_read_rom_chunks_at_offset_five() {
        let mut s = scope();
        s.transport_mut().respond(5, &[0; 11]);
        s.transport_mut().respond(5, &[1, 2, 3]);
        let mut seen = Vec::new();
        let data = s
            .read_rom_with_progress(0x0123, 14, |done, total| seen.push((done, total)))
            .unwrap();
        assert_eq!(data.len(), 14);
        assert_eq!(&data[11..], &[1, 2, 3]);
        assert_eq!(seen, vec![(11, 14), (14, 14)]);
        assert_eq!(
            s.transport().writes(),
            vec![
                vec![0xC0, 0x08, 0x23, 11, 0x01],
                vec![0xC0, 0x08, 0x2E, 3, 0x01],
            ]
        );
    }

    #[test]
    fn test_oversize_reads_rejected() {
        let mut s = scope();
        assert!(s.i2c_read(0x0C, 13).is_err());
        assert!(s.eeprom_read(0, 13).is_err());
        assert!(s.flash_rom_read(0, 12).is_err());
        assert!(s.transport().events.is_empty());
    }

    #[test]
    fn test_awg_bulk_sequence() {
        let mut s = scope();
        let data = vec![0x5A; 40];
        s.awg_write(0x00, &data).unwrap();
        let writes = s.transport().writes();
        assert_eq!(writes.len(), 4);
        assert_eq!(writes[0], vec![0xC0, 0x0E, 2, 0x1C, 0x00]);
        assert_eq!(writes[1].len(), 32);
        assert_eq!(&writes[1][..3], &[0xC0, 0x0F, 29]);
        assert_eq!(writes[2].len(), 32);
        assert_eq!(&writes[2][..3], &[0xC0, 0x0F, 11]);
        assert!(writes[2][14..].iter().all(|&b| b == 0));
        assert_eq!(writes[3], vec![0xC0, 0x10, 0]);
    }

    #[test]
    fn test_eeprom_write_frame() {
        let mut s = scope();
        s.eeprom_write(0x10, &[0xAA, 0xBB]).unwrap();
        assert_eq!(
            s.transport().writes(),
            vec![vec![0xC0, 0x07, 0x10, 2, 0xAA, 0xBB]]
        );
    }
}
