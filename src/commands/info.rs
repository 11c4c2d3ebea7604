//! Info and register dump commands

use smartscope_core::{Channel, InputRange, Register, RomRegister, Scope, Strobe, Transport};

/// Show firmware versions of the PIC and the FPGA
pub fn run_info<T: Transport>(scope: &mut Scope<T>) -> Result<(), Box<dyn std::error::Error>> {
    let pic = scope.pic_version()?;
    let fpga = scope.fpga_version()?;

    println!("SmartScope Information");
    println!("======================");
    println!();
    println!("PIC firmware:    {}", pic);
    if fpga.is_plausible() {
        println!("FPGA firmware:   {}", fpga);
    } else {
        println!("FPGA firmware:   not configured");
    }
    Ok(())
}

/// Print every readable register
pub fn run_dump<T: Transport>(scope: &mut Scope<T>) -> Result<(), Box<dyn std::error::Error>> {
    let dump = scope.register_dump()?;

    println!("Settings registers:");
    for reg in Register::ALL {
        println!(
            "  {:3} {:<24} 0x{:02X}",
            reg.index(),
            reg.name(),
            dump.register(*reg)
        );
    }

    let dm = dump.register(Register::DividerMultiplier);
    for ch in Channel::ALL {
        match InputRange::decode(dm, ch) {
            Some(range) => println!(
                "  Channel {}: divider {}, multiplier {}",
                ch, range.divider, range.multiplier
            ),
            None => println!("  Channel {}: invalid input range", ch),
        }
    }

    println!();
    println!("ROM:");
    for reg in RomRegister::ALL {
        println!("  {:3} {:<24} 0x{:02X}", reg.index(), reg.name(), dump.rom[reg.index() as usize]);
    }
    println!("  FPGA version {}", dump.fpga_version());

    println!();
    println!("Strobes:");
    for strobe in Strobe::ALL {
        println!(
            "  {:3} {:<24} {}",
            strobe.index(),
            strobe.name(),
            dump.strobe(*strobe) as u8
        );
    }

    println!();
    println!("ADC registers:");
    for (reg, value) in &dump.adc {
        println!("  0x{:02X} {:<24} 0x{:02X}", reg.index(), reg.name(), value);
    }
    Ok(())
}
