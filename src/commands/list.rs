//! List command implementation

/// List all connected SmartScopes
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = smartscope_usb::list_devices()?;
    if devices.is_empty() {
        println!("No SmartScope found");
        return Ok(());
    }

    println!("{:<6} {:<6} {:<8} {:<16} {:<8}", "Index", "Bus", "Address", "Serial", "HW rev");
    println!("{}", "-".repeat(48));

    for (index, dev) in devices.iter().enumerate() {
        println!(
            "{:<6} {:<6} {:<8} {:<16} {:<8}",
            index,
            dev.bus,
            dev.address,
            dev.serial.as_deref().unwrap_or("-"),
            dev.hardware_revision().unwrap_or("-")
        );
    }
    Ok(())
}
