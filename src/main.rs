//! smartscope - command-line tool for the LabNation SmartScope
//!
//! Drives the scope through `smartscope-core` over the `smartscope-usb`
//! transport: device listing, FPGA bitstream upload and bring-up, register
//! and strobe access, and acquisition capture.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::firmware::FirmwareSource;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Commands::List = cli.command {
        return commands::list_devices();
    }

    let options = smartscope_usb::split_options(&cli.device)?;
    let config = smartscope_usb::parse_options(&options)?;
    let mut scope = smartscope_usb::open(&config)?;

    let firmware = FirmwareSource {
        file: cli.firmware,
        dir: cli.firmware_dir,
    };

    match cli.command {
        Commands::List => Ok(()),
        Commands::Info => commands::info::run_info(&mut scope),
        Commands::Upload { force } => commands::firmware::run_upload(&mut scope, &firmware, force),
        Commands::Init => commands::firmware::run_init(&mut scope, &firmware),
        Commands::Capture {
            count,
            output,
            args,
        } => commands::capture::run_capture(&mut scope, count, output.as_deref(), &args),
        Commands::Reg { name, value } => commands::registers::run_reg(&mut scope, &name, value),
        Commands::Strobe { name, state } => {
            commands::registers::run_strobe(&mut scope, &name, state)
        }
        Commands::Adc { name, value } => commands::registers::run_adc(&mut scope, &name, value),
        Commands::Rom {
            start,
            length,
            output,
        } => commands::rom::run_rom(&mut scope, start, length, output.as_deref()),
        Commands::Dump => commands::info::run_dump(&mut scope),
        Commands::Reset => {
            scope.pic_reset()?;
            println!("PIC reset, the device will re-enumerate");
            Ok(())
        }
        Commands::Selftest => commands::capture::run_selftest(&mut scope),
    }
}
