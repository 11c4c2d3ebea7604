//! Register, strobe and ADC access commands

use smartscope_core::{AdcRegister, Register, Scope, Strobe, Transport};

/// Read or write a settings register by name
pub fn run_reg<T: Transport>(
    scope: &mut Scope<T>,
    name: &str,
    value: Option<u8>,
) -> Result<(), Box<dyn std::error::Error>> {
    let reg: Register = name.parse()?;
    match value {
        Some(value) => {
            scope.set_register(reg, value)?;
            println!("{} <- 0x{:02X}", reg, value);
        }
        None => println!("{} = 0x{:02X}", reg, scope.get_register(reg)?),
    }
    Ok(())
}

/// Drive a strobe, or read its live state back from the FPGA ROM
pub fn run_strobe<T: Transport>(
    scope: &mut Scope<T>,
    name: &str,
    state: Option<bool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let strobe: Strobe = name.parse()?;
    match state {
        Some(state) => {
            scope.set_strobe(strobe, state)?;
            println!("{} <- {}", strobe, state as u8);
        }
        None => println!("{} = {}", strobe, scope.strobe(strobe)? as u8),
    }
    Ok(())
}

/// Read or write an ADC register
pub fn run_adc<T: Transport>(
    scope: &mut Scope<T>,
    name: &str,
    value: Option<u8>,
) -> Result<(), Box<dyn std::error::Error>> {
    let reg: AdcRegister = name.parse()?;
    match value {
        Some(value) => {
            scope.spi_write(reg, value)?;
            println!("ADC {} <- 0x{:02X}", reg, value);
        }
        None => println!("ADC {} = 0x{:02X}", reg, scope.spi_read(reg)?),
    }
    Ok(())
}
