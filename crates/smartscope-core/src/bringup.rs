//! Post-upload configuration script
//!
//! A freshly programmed FPGA needs a fixed sequence of register, strobe and
//! ADC writes before it produces acquisitions. The sequence is data: a static
//! list of [`Step`]s executed strictly in order, stopping at the first error.

use crate::error::Result;
use crate::regs::{AdcRegister, Register, Strobe};
use crate::session::Scope;
use crate::transport::{Endpoint, Transport};

use Step::*;

/// One bring-up action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Write consecutive settings registers
    WriteRegs(Register, &'static [u8]),
    /// Drive a strobe
    SetStrobe(Strobe, bool),
    /// Raw `PIC_WRITE`
    PicWrite(u8, &'static [u8]),
    /// Write an ADC register over SPI
    AdcWrite(AdcRegister, u8),
    /// Clear a halt on the data endpoint
    ClearDataHalt,
}

/// Default input ranges, trigger and generator settings, written from
/// `DIVIDER_MULTIPLIER` onward
pub const DEFAULT_SETTINGS: [u8; 27] = [
    0x99, 0x70, 0x70, 0x00, 0x7e, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00,
];

/// The bring-up script
pub const BRING_UP: &[Step] = &[
    WriteRegs(Register::DigitalOut, &[0]),
    WriteRegs(Register::GeneratorSamplesB0, &[0xFF]),
    WriteRegs(Register::GeneratorSamplesB1, &[0x07]),
    SetStrobe(Strobe::GlobalReset, true),
    PicWrite(0, &[0]),
    // Zero the ADC, then zero the soft reset register as well
    AdcWrite(AdcRegister::PowerManagement, 0),
    AdcWrite(AdcRegister::OutputFormat, 0),
    AdcWrite(AdcRegister::OutputPowerManagement, 0),
    AdcWrite(AdcRegister::DataClkTiming, 0),
    AdcWrite(AdcRegister::ChaTermination, 0),
    AdcWrite(AdcRegister::ChbTermination, 0),
    AdcWrite(AdcRegister::FormatPattern, 0),
    AdcWrite(AdcRegister::CommonMode, 0),
    AdcWrite(AdcRegister::SoftReset, 0),
    WriteRegs(Register::DividerMultiplier, &DEFAULT_SETTINGS),
    WriteRegs(Register::DigitalTriggerFalling, &[0, 0, 0]),
    WriteRegs(Register::GeneratorDecimationB0, &[0, 0, 0]),
    SetStrobe(Strobe::GeneratorToAwg, false),
    SetStrobe(Strobe::LaEnable, false),
    SetStrobe(Strobe::ScopeEnable, true),
    SetStrobe(Strobe::ScopeUpdate, true),
    SetStrobe(Strobe::ForceTrigger, true),
    SetStrobe(Strobe::ViewUpdate, true),
    SetStrobe(Strobe::ViewSendOverview, false),
    SetStrobe(Strobe::ViewSendPartial, false),
    SetStrobe(Strobe::AcqStart, false),
    SetStrobe(Strobe::AcqStop, false),
    SetStrobe(Strobe::ChaDcCoupling, true),
    SetStrobe(Strobe::ChbDcCoupling, true),
    SetStrobe(Strobe::EnableAdc, true),
    SetStrobe(Strobe::EnableNeg, true),
    SetStrobe(Strobe::EnableRam, true),
    SetStrobe(Strobe::Dout3v5v, false),
    SetStrobe(Strobe::EnOpampB, false),
    SetStrobe(Strobe::GeneratorToDigital, false),
    SetStrobe(Strobe::Roll, false),
    SetStrobe(Strobe::LaChannel, false),
    SetStrobe(Strobe::ScopeUpdate, true),
    SetStrobe(Strobe::ViewUpdate, true),
    ClearDataHalt,
    // ADC init
    AdcWrite(AdcRegister::SoftReset, 0x5A),
    AdcWrite(AdcRegister::PowerManagement, 3),
    AdcWrite(AdcRegister::OutputFormat, 2),
    AdcWrite(AdcRegister::OutputPowerManagement, 0),
    AdcWrite(AdcRegister::DataClkTiming, 0x18),
    AdcWrite(AdcRegister::ChaTermination, 0),
    // Trigger level and mode, then viewport
    WriteRegs(Register::TriggerLevel, &[0x7F, 80]),
    WriteRegs(Register::AcquisitionDepth, &[1]),
    WriteRegs(Register::ViewDecimation, &[1, 0, 0, 0]),
    WriteRegs(Register::ViewBursts, &[6, 0, 0]),
    SetStrobe(Strobe::LaEnable, false),
    SetStrobe(Strobe::ViewSendOverview, false),
    SetStrobe(Strobe::ViewSendPartial, false),
    SetStrobe(Strobe::AcqStart, true),
    SetStrobe(Strobe::LaChannel, false),
    SetStrobe(Strobe::ScopeUpdate, true),
    SetStrobe(Strobe::ViewUpdate, true),
];

impl<T: Transport> Scope<T> {
    /// Execute one bring-up step
    pub fn run_step(&mut self, step: &Step) -> Result<()> {
        match *step {
            WriteRegs(reg, values) => self.set_registers(reg, values),
            SetStrobe(strobe, state) => self.set_strobe(strobe, state),
            PicWrite(addr, data) => self.pic_write(addr, data),
            AdcWrite(reg, value) => self.spi_write(reg, value),
            ClearDataHalt => Ok(self.transport_mut().clear_halt(Endpoint::Data)?),
        }
    }

    /// Run the bring-up script after a bitstream upload
    pub fn bring_up(&mut self) -> Result<()> {
        log::info!("Configuring SmartScope ({} steps)", BRING_UP.len());
        for (i, step) in BRING_UP.iter().enumerate() {
            if let Err(e) = self.run_step(step) {
                log::error!("Bring-up step {} ({:?}) failed: {}", i, step, e);
                return Err(e);
            }
        }
        log::info!("SmartScope configured");
        Ok(())
    }
}
