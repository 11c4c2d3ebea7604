//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal byte
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let value = parse_hex_u32(s)?;
    u8::try_from(value).map_err(|_| format!("Value out of range for a byte: {}", s))
}

/// Parse a strobe state
fn parse_state(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "high" => Ok(true),
        "0" | "off" | "false" | "low" => Ok(false),
        _ => Err(format!("Invalid state '{}', expected 0/1 or on/off", s)),
    }
}

#[derive(Parser)]
#[command(name = "smartscope")]
#[command(author, version, about = "LabNation SmartScope USB tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Device selection as key=value pairs (index=N, serial=S)
    #[arg(short, long, global = true, default_value = "")]
    pub device: String,

    /// FPGA bitstream to upload instead of searching for SmartScope_<rev>.bin
    #[arg(long, global = true)]
    pub firmware: Option<PathBuf>,

    /// Extra directory to search for FPGA bitstreams
    /// Defaults to ./firmware/ and /usr/share/smartscope/firmware/
    #[arg(long, global = true)]
    pub firmware_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Acquisition settings shared by capture commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct CaptureArgs {
    /// Sample rate in Hz (rounded down to 100 MHz / 2^n)
    #[arg(long)]
    pub sample_rate: Option<u64>,

    /// Acquisition depth in samples (rounded up to 2048 * 2^n)
    #[arg(long)]
    pub depth: Option<u64>,

    /// Samples kept before the trigger
    #[arg(long, default_value_t = 0)]
    pub pre_trigger: u32,

    /// Force a trigger after arming
    #[arg(long)]
    pub force: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List connected SmartScopes
    List,

    /// Show PIC and FPGA firmware versions
    Info,

    /// Upload the FPGA bitstream
    Upload {
        /// Upload even when the FPGA already reports a version
        #[arg(long)]
        force: bool,
    },

    /// Upload the bitstream if needed and run the bring-up script
    Init,

    /// Capture frames from the acquisition stream
    Capture {
        /// Number of frames to read
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Write de-interleaved samples (A then B per frame) to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        args: CaptureArgs,
    },

    /// Read or write an FPGA settings register
    Reg {
        /// Register name (e.g. TRIGGER_LEVEL)
        name: String,

        /// Value to write (hex or decimal); reads when omitted
        #[arg(value_parser = parse_hex_u8)]
        value: Option<u8>,
    },

    /// Read or drive a strobe
    Strobe {
        /// Strobe name (e.g. ACQ_START)
        name: String,

        /// State to drive (0/1, on/off); reads when omitted
        #[arg(value_parser = parse_state)]
        state: Option<bool>,
    },

    /// Read or write an ADC register over SPI
    Adc {
        /// ADC register name (e.g. FORMAT_PATTERN)
        name: String,

        /// Value to write (hex or decimal); reads when omitted
        #[arg(value_parser = parse_hex_u8)]
        value: Option<u8>,
    },

    /// Read the PIC flash ROM
    Rom {
        /// Start address (hex, e.g., 0x100)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Number of bytes to read (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x1000")]
        length: u32,

        /// Output file path (hex dump to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Dump every readable register
    Dump,

    /// Reset the PIC; the device re-enumerates
    Reset,

    /// Check the ADC with its ramp test pattern
    Selftest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex_u32("0x1000"), Ok(0x1000));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert_eq!(parse_hex_u8("0x7F"), Ok(0x7F));
        assert!(parse_hex_u8("256").is_err());
    }

    #[test]
    fn test_parse_state() {
        assert_eq!(parse_state("on"), Ok(true));
        assert_eq!(parse_state("0"), Ok(false));
        assert!(parse_state("maybe").is_err());
    }

    #[test]
    fn test_cli_parses_device_options() {
        let cli = Cli::try_parse_from(["smartscope", "-d", "serial=ABC", "reg", "TRIGGER_LEVEL", "0x80"])
            .unwrap();
        assert_eq!(cli.device, "serial=ABC");
        assert!(matches!(
            cli.command,
            Commands::Reg { ref name, value: Some(0x80) } if name == "TRIGGER_LEVEL"
        ));
    }
}
