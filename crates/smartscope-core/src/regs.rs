//! FPGA register, strobe, ROM and ADC identifiers
//!
//! This is the closed register contract of the SmartScope FPGA image. The
//! numeric values, the header snapshot tables and the canonical names must
//! track the FPGA firmware version; they are not discovered at runtime.
//!
//! Names resolve through static tables so user input (CLI arguments, scripts)
//! is mapped onto identifiers once, at parse time.

use crate::error::ConfigError;

/// I2C address of the FPGA settings register file
pub const FPGA_I2C_ADDRESS_SETTINGS: u8 = 0x0C;
/// I2C address of the FPGA read-only memory (version, SPI result, strobes)
pub const FPGA_I2C_ADDRESS_ROM: u8 = 0x0D;
/// I2C address of the arbitrary waveform generator memory (write only)
pub const FPGA_I2C_ADDRESS_AWG: u8 = 0x0E;

/// Bit set in `SPI_ADDRESS` to request an ADC register read
pub const SPI_READ_FLAG: u8 = 0x80;

macro_rules! named_ids {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl $name {
            /// Every identifier, in ascending numeric order
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Numeric address/index
            pub const fn index(self) -> u8 {
                self as u8
            }

            /// Canonical upper-case name
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Look up an identifier by its numeric value
            pub fn from_index(index: u8) -> Option<Self> {
                Self::ALL.iter().copied().find(|id| id.index() == index)
            }

            /// Resolve a name (case-insensitive)
            pub fn from_name(name: &str) -> Result<Self, ConfigError> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|id| id.name().eq_ignore_ascii_case(name.trim()))
                    .ok_or_else(|| ConfigError::UnknownName {
                        kind: $kind,
                        name: name.to_string(),
                    })
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl core::str::FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_name(s)
            }
        }
    };
}

named_ids! {
    /// FPGA settings registers (I2C target `0x0C`)
    pub enum Register: "register" {
        /// Strobe write port: `(strobe << 1) | state`
        StrobeUpdate = 0 => "STROBE_UPDATE",
        /// ADC register address for the SPI tunnel
        SpiAddress = 1 => "SPI_ADDRESS",
        /// ADC register value for the SPI tunnel
        SpiWriteValue = 2 => "SPI_WRITE_VALUE",
        /// Input range selection, CHA bits 3:0, CHB bits 7:4
        DividerMultiplier = 3 => "DIVIDER_MULTIPLIER",
        ChaYOffsetVoltage = 4 => "CHA_YOFFSET_VOLTAGE",
        ChbYOffsetVoltage = 5 => "CHB_YOFFSET_VOLTAGE",
        TriggerPwm = 6 => "TRIGGER_PWM",
        /// 0x80 is 0 V
        TriggerLevel = 7 => "TRIGGER_LEVEL",
        TriggerMode = 8 => "TRIGGER_MODE",
        TriggerPwMinB0 = 9 => "TRIGGER_PW_MIN_B0",
        TriggerPwMinB1 = 10 => "TRIGGER_PW_MIN_B1",
        TriggerPwMinB2 = 11 => "TRIGGER_PW_MIN_B2",
        TriggerPwMaxB0 = 12 => "TRIGGER_PW_MAX_B0",
        TriggerPwMaxB1 = 13 => "TRIGGER_PW_MAX_B1",
        TriggerPwMaxB2 = 14 => "TRIGGER_PW_MAX_B2",
        /// Sample rate = 100 MHz / 2^INPUT_DECIMATION
        InputDecimation = 15 => "INPUT_DECIMATION",
        /// Samples per acquisition = 2048 * 2^ACQUISITION_DEPTH
        AcquisitionDepth = 16 => "ACQUISITION_DEPTH",
        TriggerHoldoffB0 = 17 => "TRIGGERHOLDOFF_B0",
        TriggerHoldoffB1 = 18 => "TRIGGERHOLDOFF_B1",
        TriggerHoldoffB2 = 19 => "TRIGGERHOLDOFF_B2",
        TriggerHoldoffB3 = 20 => "TRIGGERHOLDOFF_B3",
        ViewDecimation = 21 => "VIEW_DECIMATION",
        ViewOffsetB0 = 22 => "VIEW_OFFSET_B0",
        ViewOffsetB1 = 23 => "VIEW_OFFSET_B1",
        ViewOffsetB2 = 24 => "VIEW_OFFSET_B2",
        ViewAcquisitions = 25 => "VIEW_ACQUISITIONS",
        /// Number of data bursts = 2^VIEW_BURSTS
        ViewBursts = 26 => "VIEW_BURSTS",
        ViewExcessB0 = 27 => "VIEW_EXCESS_B0",
        ViewExcessB1 = 28 => "VIEW_EXCESS_B1",
        DigitalTriggerRising = 29 => "DIGITAL_TRIGGER_RISING",
        DigitalTriggerFalling = 30 => "DIGITAL_TRIGGER_FALLING",
        DigitalTriggerHigh = 31 => "DIGITAL_TRIGGER_HIGH",
        DigitalTriggerLow = 32 => "DIGITAL_TRIGGER_LOW",
        DigitalOut = 33 => "DIGITAL_OUT",
        GeneratorDecimationB0 = 34 => "GENERATOR_DECIMATION_B0",
        GeneratorDecimationB1 = 35 => "GENERATOR_DECIMATION_B1",
        GeneratorDecimationB2 = 36 => "GENERATOR_DECIMATION_B2",
        GeneratorSamplesB0 = 37 => "GENERATOR_SAMPLES_B0",
        GeneratorSamplesB1 = 38 => "GENERATOR_SAMPLES_B1",
    }
}

named_ids! {
    /// FPGA control strobes, written through `STROBE_UPDATE`
    pub enum Strobe: "strobe" {
        GlobalReset = 0 => "GLOBAL_RESET",
        /// Edge-triggered: 0 then 1 starts an SPI transfer
        InitSpiTransfer = 1 => "INIT_SPI_TRANSFER",
        GeneratorToAwg = 2 => "GENERATOR_TO_AWG",
        /// Enables the logic analyzer
        LaEnable = 3 => "LA_ENABLE",
        /// Must be set to perform acquisitions
        ScopeEnable = 4 => "SCOPE_ENABLE",
        /// Applies pending register values
        ScopeUpdate = 5 => "SCOPE_UPDATE",
        ForceTrigger = 6 => "FORCE_TRIGGER",
        /// Requests an updated view packet after view registers changed
        ViewUpdate = 7 => "VIEW_UPDATE",
        /// Enables overview packets
        ViewSendOverview = 8 => "VIEW_SEND_OVERVIEW",
        ViewSendPartial = 9 => "VIEW_SEND_PARTIAL",
        AcqStart = 10 => "ACQ_START",
        AcqStop = 11 => "ACQ_STOP",
        ChaDcCoupling = 12 => "CHA_DCCOUPLING",
        ChbDcCoupling = 13 => "CHB_DCCOUPLING",
        /// Must be set to perform acquisitions
        EnableAdc = 14 => "ENABLE_ADC",
        EnableNeg = 15 => "ENABLE_NEG",
        EnableRam = 16 => "ENABLE_RAM",
        Dout3v5v = 17 => "DOUT_3V_5V",
        EnOpampB = 18 => "EN_OPAMP_B",
        GeneratorToDigital = 19 => "GENERATOR_TO_DIGITAL",
        Roll = 20 => "ROLL",
        /// Channel carrying logic samples, 0: CHA, 1: CHB
        LaChannel = 21 => "LA_CHANNEL",
    }
}

named_ids! {
    /// FPGA ROM locations (I2C target `0x0D`)
    pub enum RomRegister: "ROM register" {
        FwGit0 = 0 => "FW_GIT0",
        FwGit1 = 1 => "FW_GIT1",
        FwGit2 = 2 => "FW_GIT2",
        FwGit3 = 3 => "FW_GIT3",
        /// Result of the last SPI read
        SpiReceivedValue = 4 => "SPI_RECEIVED_VALUE",
        Strobes0 = 5 => "STROBES0",
        Strobes1 = 6 => "STROBES1",
        Strobes2 = 7 => "STROBES2",
    }
}

named_ids! {
    /// MAX19506 ADC registers, reached through the FPGA SPI tunnel
    pub enum AdcRegister: "ADC register" {
        PowerManagement = 0x00 => "POWER_MANAGEMENT",
        OutputFormat = 0x01 => "OUTPUT_FORMAT",
        OutputPowerManagement = 0x02 => "OUTPUT_PWR_MNGMNT",
        DataClkTiming = 0x03 => "DATA_CLK_TIMING",
        ChaTermination = 0x04 => "CHA_TERMINATION",
        ChbTermination = 0x05 => "CHB_TERMINATION",
        FormatPattern = 0x06 => "FORMAT_PATTERN",
        CommonMode = 0x08 => "COMMON_MODE",
        SoftReset = 0x0A => "SOFT_RESET",
    }
}

/// Number of register bytes in the acquisition header snapshot
pub const HDR_N_REGS: usize = 30;
/// Number of strobes in the acquisition header snapshot
pub const HDR_N_STROBES: usize = 5;

/// Register → byte offset inside the header register snapshot
pub const HEADER_REGISTERS: [(Register, usize); HDR_N_REGS] = [
    (Register::TriggerLevel, 0),
    (Register::TriggerMode, 1),
    (Register::TriggerHoldoffB0, 2),
    (Register::TriggerHoldoffB1, 3),
    (Register::TriggerHoldoffB2, 4),
    (Register::TriggerHoldoffB3, 5),
    (Register::ChaYOffsetVoltage, 6),
    (Register::ChbYOffsetVoltage, 7),
    (Register::DividerMultiplier, 8),
    (Register::InputDecimation, 9),
    (Register::TriggerPwMinB0, 10),
    (Register::TriggerPwMinB1, 11),
    (Register::TriggerPwMinB2, 12),
    (Register::TriggerPwMaxB0, 13),
    (Register::TriggerPwMaxB1, 14),
    (Register::TriggerPwMaxB2, 15),
    (Register::TriggerPwm, 16),
    (Register::DigitalTriggerRising, 17),
    (Register::DigitalTriggerFalling, 18),
    (Register::DigitalTriggerHigh, 19),
    (Register::DigitalTriggerLow, 20),
    (Register::AcquisitionDepth, 21),
    (Register::ViewDecimation, 22),
    (Register::ViewOffsetB0, 23),
    (Register::ViewOffsetB1, 24),
    (Register::ViewOffsetB2, 25),
    (Register::ViewAcquisitions, 26),
    (Register::ViewBursts, 27),
    (Register::ViewExcessB0, 28),
    (Register::ViewExcessB1, 29),
];

/// Strobe → bit position inside the header strobe snapshot
pub const HEADER_STROBES: [(Strobe, usize); HDR_N_STROBES] = [
    (Strobe::LaEnable, 0),
    (Strobe::ChaDcCoupling, 1),
    (Strobe::ChbDcCoupling, 2),
    (Strobe::Roll, 3),
    (Strobe::LaChannel, 4),
];

/// Offset of `reg` inside the header register snapshot
///
/// The table must contain exactly one entry for the register.
pub fn header_offset(reg: Register) -> Result<usize, ConfigError> {
    let mut matches = HEADER_REGISTERS.iter().filter(|(r, _)| *r == reg);
    match (matches.next(), matches.next()) {
        (Some(&(_, offset)), None) => Ok(offset),
        _ => Err(ConfigError::NotHeaderRegister(reg.name())),
    }
}

/// Bit position of `strobe` inside the header strobe snapshot
pub fn header_strobe_bit(strobe: Strobe) -> Result<usize, ConfigError> {
    let mut matches = HEADER_STROBES.iter().filter(|(s, _)| *s == strobe);
    match (matches.next(), matches.next()) {
        (Some(&(_, bit)), None) => Ok(bit),
        _ => Err(ConfigError::NotHeaderStrobe(strobe.name())),
    }
}

/// Value written to `STROBE_UPDATE` to drive `strobe` to `state`
pub const fn strobe_update_value(strobe: Strobe, state: bool) -> u8 {
    (strobe.index() << 1) | state as u8
}

/// ROM location holding the live state of `strobe`, and its bit
pub const fn strobe_rom_location(strobe: Strobe) -> (u8, u8) {
    (
        RomRegister::Strobes0.index() + strobe.index() / 8,
        strobe.index() % 8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_offset_matches_table_membership() {
        for &reg in Register::ALL {
            let in_table = HEADER_REGISTERS.iter().any(|(r, _)| *r == reg);
            match header_offset(reg) {
                Ok(offset) => {
                    assert!(in_table, "{} resolved but is not in the table", reg);
                    assert!(offset < HDR_N_REGS);
                }
                Err(e) => {
                    assert!(!in_table, "{} is in the table but failed", reg);
                    assert_eq!(e, ConfigError::NotHeaderRegister(reg.name()));
                }
            }
        }
        assert_eq!(header_offset(Register::InputDecimation), Ok(9));
        assert_eq!(header_offset(Register::DividerMultiplier), Ok(8));
        assert!(header_offset(Register::StrobeUpdate).is_err());
        assert!(header_offset(Register::GeneratorSamplesB1).is_err());
    }

    #[test]
    fn test_header_strobe_matches_table_membership() {
        for &strobe in Strobe::ALL {
            let in_table = HEADER_STROBES.iter().any(|(s, _)| *s == strobe);
            assert_eq!(header_strobe_bit(strobe).is_ok(), in_table, "{}", strobe);
        }
        assert_eq!(header_strobe_bit(Strobe::LaChannel), Ok(4));
        assert_eq!(
            header_strobe_bit(Strobe::AcqStart),
            Err(ConfigError::NotHeaderStrobe("ACQ_START"))
        );
    }

    #[test]
    fn test_header_offsets_are_unique() {
        let mut seen = [false; HDR_N_REGS];
        for (_, offset) in HEADER_REGISTERS {
            assert!(!seen[offset]);
            seen[offset] = true;
        }
    }

    #[test]
    fn test_names_round_trip_and_indices_are_dense() {
        for (i, &reg) in Register::ALL.iter().enumerate() {
            assert_eq!(reg.index() as usize, i);
            assert_eq!(Register::from_name(reg.name()), Ok(reg));
        }
        for (i, &strobe) in Strobe::ALL.iter().enumerate() {
            assert_eq!(strobe.index() as usize, i);
        }
        assert_eq!(Register::ALL.len(), 39);
        assert_eq!(Strobe::ALL.len(), 22);
    }

    #[test]
    fn test_from_name() {
        assert_eq!("scope_update".parse::<Strobe>(), Ok(Strobe::ScopeUpdate));
        assert_eq!(
            AdcRegister::from_name("SOFT_RESET"),
            Ok(AdcRegister::SoftReset)
        );
        assert!(matches!(
            Register::from_name("NOT_A_REGISTER"),
            Err(ConfigError::UnknownName {
                kind: "register",
                ..
            })
        ));
        assert_eq!(AdcRegister::from_index(0x07), None);
        assert_eq!(AdcRegister::from_index(0x08), Some(AdcRegister::CommonMode));
    }

    #[test]
    fn test_strobe_encoding() {
        assert_eq!(strobe_update_value(Strobe::GlobalReset, true), 0x01);
        assert_eq!(strobe_update_value(Strobe::ScopeUpdate, true), 0x0B);
        assert_eq!(strobe_update_value(Strobe::InitSpiTransfer, false), 0x02);
        assert_eq!(strobe_rom_location(Strobe::LaChannel), (7, 5));
        assert_eq!(strobe_rom_location(Strobe::ViewUpdate), (5, 7));
    }
}
