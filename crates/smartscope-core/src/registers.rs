//! Register, strobe and ADC access
//!
//! The FPGA is reached over I2C tunnelled through the PIC. Settings live at
//! target `0x0C`, read-only status at `0x0D`. The MAX19506 ADC sits behind an
//! SPI bridge inside the FPGA, driven through three settings registers and the
//! `INIT_SPI_TRANSFER` strobe.

use std::fmt;

use crate::error::Result;
use crate::protocol::MAX_READ_LENGTH;
use crate::regs::*;
use crate::session::Scope;
use crate::transport::Transport;

/// FPGA bitstream version (git hash prefix stored in the FPGA ROM)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpgaVersion(pub u32);

impl FpgaVersion {
    /// Assemble from ROM bytes `FW_GIT0..=FW_GIT3`
    pub fn from_rom(git: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(git))
    }

    /// An unconfigured FPGA reads back all ones
    pub fn is_plausible(&self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Display for FpgaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Snapshot of every readable register, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDump {
    /// Settings registers, indexed by [`Register::index`]
    pub settings: Vec<u8>,
    /// FPGA ROM bytes, indexed by [`RomRegister::index`]
    pub rom: Vec<u8>,
    /// ADC registers in [`AdcRegister::ALL`] order
    pub adc: Vec<(AdcRegister, u8)>,
}

impl RegisterDump {
    /// Value of a settings register
    pub fn register(&self, reg: Register) -> u8 {
        self.settings[reg.index() as usize]
    }

    /// Live state of a strobe, decoded from the ROM strobe bytes
    pub fn strobe(&self, strobe: Strobe) -> bool {
        let (addr, bit) = strobe_rom_location(strobe);
        self.rom[addr as usize] & (1 << bit) != 0
    }

    /// FPGA version held in the dumped ROM bytes
    pub fn fpga_version(&self) -> FpgaVersion {
        FpgaVersion::from_rom([self.rom[0], self.rom[1], self.rom[2], self.rom[3]])
    }
}

impl<T: Transport> Scope<T> {
    /// Write consecutive registers of an FPGA I2C target
    pub fn write_register(&mut self, i2c_addr: u8, reg: u8, data: &[u8]) -> Result<()> {
        self.i2c_write(i2c_addr, reg, data)
    }

    /// Read one register of an FPGA I2C target
    pub fn read_register(&mut self, i2c_addr: u8, reg: u8) -> Result<u8> {
        let data = self.read_registers(i2c_addr, reg, 1)?;
        Ok(data[0])
    }

    /// Read `len` consecutive registers, 12 at a time
    pub fn read_registers(&mut self, i2c_addr: u8, reg: u8, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            let chunk = (len - out.len()).min(MAX_READ_LENGTH);
            self.i2c_write(i2c_addr, reg.wrapping_add(out.len() as u8), &[])?;
            out.extend(self.i2c_read(i2c_addr, chunk)?);
        }
        Ok(out)
    }

    /// Set one settings register
    pub fn set_register(&mut self, reg: Register, value: u8) -> Result<()> {
        self.set_registers(reg, &[value])
    }

    /// Set consecutive settings registers starting at `reg`
    pub fn set_registers(&mut self, reg: Register, values: &[u8]) -> Result<()> {
        log::debug!("{} <- {:02x?}", reg, values);
        self.write_register(FPGA_I2C_ADDRESS_SETTINGS, reg.index(), values)
    }

    /// Read back one settings register
    pub fn get_register(&mut self, reg: Register) -> Result<u8> {
        self.read_register(FPGA_I2C_ADDRESS_SETTINGS, reg.index())
    }

    /// Read one FPGA ROM location
    pub fn rom_register(&mut self, reg: RomRegister) -> Result<u8> {
        self.read_register(FPGA_I2C_ADDRESS_ROM, reg.index())
    }

    /// Drive a strobe
    pub fn set_strobe(&mut self, strobe: Strobe, state: bool) -> Result<()> {
        log::debug!("strobe {} <- {}", strobe, state as u8);
        self.write_register(
            FPGA_I2C_ADDRESS_SETTINGS,
            Register::StrobeUpdate.index(),
            &[strobe_update_value(strobe, state)],
        )
    }

    /// Read back the live state of a strobe
    pub fn strobe(&mut self, strobe: Strobe) -> Result<bool> {
        let (addr, bit) = strobe_rom_location(strobe);
        let byte = self.read_register(FPGA_I2C_ADDRESS_ROM, addr)?;
        Ok(byte & (1 << bit) != 0)
    }

    fn spi_transfer(&mut self) -> Result<()> {
        // The bridge starts on the rising edge
        self.set_strobe(Strobe::InitSpiTransfer, false)?;
        self.set_strobe(Strobe::InitSpiTransfer, true)
    }

    /// Write an ADC register
    pub fn spi_write(&mut self, reg: AdcRegister, value: u8) -> Result<()> {
        log::debug!("ADC {} <- 0x{:02X}", reg, value);
        self.set_register(Register::SpiAddress, reg.index())?;
        self.set_register(Register::SpiWriteValue, value)?;
        self.spi_transfer()
    }

    /// Read an ADC register
    pub fn spi_read(&mut self, reg: AdcRegister) -> Result<u8> {
        self.set_register(Register::SpiAddress, reg.index() | SPI_READ_FLAG)?;
        self.spi_transfer()?;
        let value = self.rom_register(RomRegister::SpiReceivedValue)?;
        log::debug!("ADC {} = 0x{:02X}", reg, value);
        Ok(value)
    }

    /// Read the FPGA bitstream version
    pub fn fpga_version(&mut self) -> Result<FpgaVersion> {
        let mut git = [0u8; 4];
        for (byte, reg) in git.iter_mut().zip([
            RomRegister::FwGit0,
            RomRegister::FwGit1,
            RomRegister::FwGit2,
            RomRegister::FwGit3,
        ]) {
            *byte = self.rom_register(reg)?;
        }
        let version = FpgaVersion::from_rom(git);
        log::debug!("FPGA version {}", version);
        Ok(version)
    }

    /// Read every settings register, the FPGA ROM and the ADC registers
    pub fn register_dump(&mut self) -> Result<RegisterDump> {
        let settings = self.read_registers(FPGA_I2C_ADDRESS_SETTINGS, 0, Register::ALL.len())?;
        let rom = self.read_registers(FPGA_I2C_ADDRESS_ROM, 0, RomRegister::ALL.len())?;
        let mut adc = Vec::with_capacity(AdcRegister::ALL.len());
        for &reg in AdcRegister::ALL {
            adc.push((reg, self.spi_read(reg)?));
        }
        Ok(RegisterDump { settings, rom, adc })
    }
}
