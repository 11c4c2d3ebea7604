//! Acquisition control
//!
//! Sample rate, acquisition depth and trigger configuration, plus the ADC
//! test-pattern self test.

use crate::acquisition::verify_adc_ramp;
use crate::error::{Error, ProtocolError, Result, TransportError};
use crate::header::{Channel, PacketKind};
use crate::regs::{AdcRegister, Register, Strobe};
use crate::session::Scope;
use crate::transport::Transport;

/// Undecimated ADC sample rate
pub const MAX_SAMPLE_RATE: u64 = 100_000_000;
/// Slowest supported sample rate (`INPUT_DECIMATION = 9`)
pub const MIN_SAMPLE_RATE: u64 = 195_312;
/// Shortest acquisition
pub const MIN_ACQUISITION: u64 = 2048;
/// Longest acquisition
pub const MAX_ACQUISITION: u64 = 4 * 1024 * 1024;

/// ADC `FORMAT_PATTERN` value enabling the ramp test pattern
pub const ADC_PATTERN_RAMP: u8 = 0x50;

const SELFTEST_TRIES: usize = 10;

/// When the scope re-arms after a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionMode {
    /// Free-running when no trigger arrives
    #[default]
    Auto,
    /// Re-arm after every trigger
    Normal,
    /// One acquisition, then stop
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerEdge {
    #[default]
    Rising,
    Falling,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerSource {
    /// One of the analog channels
    #[default]
    Channel,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerKind {
    #[default]
    Edge,
    Timeout,
    Pulse,
    /// Logic analyzer pattern, see [`Scope::set_digital_triggers`]
    Digital,
}

/// Contents of the `TRIGGER_MODE` register
///
/// ```text
/// | 7:6 acquisition | 5:4 edge | 3 source | 2 channel | 1:0 kind |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerMode {
    pub acquisition: AcquisitionMode,
    pub edge: TriggerEdge,
    pub source: TriggerSource,
    pub channel: Channel,
    pub kind: TriggerKind,
}

impl Default for TriggerMode {
    fn default() -> Self {
        Self {
            acquisition: AcquisitionMode::default(),
            edge: TriggerEdge::default(),
            source: TriggerSource::default(),
            channel: Channel::A,
            kind: TriggerKind::default(),
        }
    }
}

impl TriggerMode {
    /// Register encoding
    pub fn bits(&self) -> u8 {
        let acquisition = match self.acquisition {
            AcquisitionMode::Auto => 0,
            AcquisitionMode::Normal => 1,
            AcquisitionMode::Single => 2,
        };
        let edge = match self.edge {
            TriggerEdge::Rising => 0,
            TriggerEdge::Falling => 1,
            TriggerEdge::Any => 2,
        };
        let source = match self.source {
            TriggerSource::Channel => 0,
            TriggerSource::External => 1,
        };
        let kind = match self.kind {
            TriggerKind::Edge => 0,
            TriggerKind::Timeout => 1,
            TriggerKind::Pulse => 2,
            TriggerKind::Digital => 3,
        };
        (acquisition << 6) | (edge << 4) | (source << 3) | ((self.channel.index() as u8) << 2) | kind
    }

    /// Decode a register value; reserved field values yield `None`
    pub fn from_bits(bits: u8) -> Option<Self> {
        Some(Self {
            acquisition: match bits >> 6 {
                0 => AcquisitionMode::Auto,
                1 => AcquisitionMode::Normal,
                2 => AcquisitionMode::Single,
                _ => return None,
            },
            edge: match (bits >> 4) & 0x3 {
                0 => TriggerEdge::Rising,
                1 => TriggerEdge::Falling,
                2 => TriggerEdge::Any,
                _ => return None,
            },
            source: if bits & 0x08 != 0 {
                TriggerSource::External
            } else {
                TriggerSource::Channel
            },
            channel: if bits & 0x04 != 0 {
                Channel::B
            } else {
                Channel::A
            },
            kind: match bits & 0x3 {
                0 => TriggerKind::Edge,
                1 => TriggerKind::Timeout,
                2 => TriggerKind::Pulse,
                _ => TriggerKind::Digital,
            },
        })
    }
}

/// `INPUT_DECIMATION` for the fastest rate not above `hz`, after clamping
pub fn sample_rate_decimation(hz: u64) -> u8 {
    let hz = hz.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE);
    let mut power = 0;
    while (MAX_SAMPLE_RATE >> power) > hz {
        power += 1;
    }
    power
}

/// `ACQUISITION_DEPTH` for the shortest depth holding `samples`, after clamping
pub fn acquisition_depth_power(samples: u64) -> u8 {
    let samples = samples.clamp(MIN_ACQUISITION, MAX_ACQUISITION);
    let mut power = 0;
    while (MIN_ACQUISITION << power) < samples {
        power += 1;
    }
    power
}

impl<T: Transport> Scope<T> {
    /// Select the input decimation; returns the effective rate in Hz
    pub fn set_sample_rate(&mut self, hz: u64) -> Result<u64> {
        let power = sample_rate_decimation(hz);
        let rate = MAX_SAMPLE_RATE >> power;
        log::debug!("input decimation {} => {} Hz", power, rate);
        self.set_register(Register::InputDecimation, power)?;
        Ok(rate)
    }

    /// Select the acquisition length; returns the effective sample count
    pub fn set_acquisition_depth(&mut self, samples: u64) -> Result<u64> {
        let power = acquisition_depth_power(samples);
        let depth = MIN_ACQUISITION << power;
        log::debug!("acquisition depth {} => {} samples", power, depth);
        self.set_register(Register::AcquisitionDepth, power)?;
        Ok(depth)
    }

    /// Configure the logic analyzer trigger masks
    pub fn set_digital_triggers(&mut self, rising: u8, falling: u8, high: u8, low: u8) -> Result<()> {
        self.set_registers(Register::DigitalTriggerRising, &[rising, falling, high, low])
    }

    pub fn set_trigger_mode(&mut self, mode: TriggerMode) -> Result<()> {
        self.set_register(Register::TriggerMode, mode.bits())
    }

    /// Arm an acquisition keeping `pre_trigger_samples` before the trigger
    pub fn start_acquisition(&mut self, pre_trigger_samples: u32) -> Result<()> {
        self.set_registers(Register::TriggerHoldoffB0, &pre_trigger_samples.to_le_bytes())?;
        self.set_strobe(Strobe::ScopeUpdate, true)?;
        self.set_strobe(Strobe::AcqStart, true)
    }

    pub fn stop_acquisition(&mut self) -> Result<()> {
        self.set_strobe(Strobe::AcqStop, true)
    }

    pub fn force_trigger(&mut self) -> Result<()> {
        self.set_strobe(Strobe::ForceTrigger, true)
    }

    /// Capture the ADC ramp test pattern and check it
    ///
    /// Switches the ADC to its ramp pattern, forces single acquisitions until
    /// a full acquisition arrives (at most ten frames), verifies it and puts
    /// the ADC back into normal output. Returns whether the ramp was intact.
    pub fn adc_selftest(&mut self) -> Result<bool> {
        log::info!("Running ADC ramp self test");
        self.spi_write(AdcRegister::FormatPattern, ADC_PATTERN_RAMP)?;
        self.set_register(Register::AcquisitionDepth, 1)?;
        self.set_trigger_mode(TriggerMode {
            acquisition: AcquisitionMode::Single,
            ..TriggerMode::default()
        })?;
        self.set_strobe(Strobe::ViewSendOverview, false)?;
        self.set_strobe(Strobe::ViewSendPartial, false)?;
        self.set_strobe(Strobe::LaChannel, false)?;
        self.set_strobe(Strobe::LaEnable, false)?;
        self.set_strobe(Strobe::ScopeUpdate, true)?;
        self.set_strobe(Strobe::AcqStart, true)?;

        let mut passed = None;
        for _ in 0..SELFTEST_TRIES {
            let frame = match self.read_frame() {
                Ok(frame) => frame,
                Err(Error::Transport(TransportError::Timeout)) => {
                    self.force_trigger()?;
                    continue;
                }
                Err(Error::Protocol(ProtocolError::BadPayloadSize { .. })) => continue,
                Err(e) => return Err(e),
            };
            if frame.payload.is_empty() {
                self.set_strobe(Strobe::AcqStart, true)?;
                self.force_trigger()?;
                continue;
            }
            if frame.kind() != PacketKind::Acquisition {
                continue;
            }
            log::debug!("checking {} ramp samples", frame.payload.len());
            passed = Some(verify_adc_ramp(&frame.payload));
            break;
        }

        self.force_trigger()?;
        self.flush_data_pipe()?;
        self.spi_write(AdcRegister::FormatPattern, 0)?;
        self.stop_acquisition()?;

        match passed {
            Some(true) => log::info!("ADC ramp intact"),
            Some(false) => log::warn!("ADC ramp pattern corrupted"),
            None => log::warn!("No full acquisition received during self test"),
        }
        Ok(passed.unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::tests::header_block;
    use crate::mock::MockTransport;

    #[test]
    fn test_trigger_mode_bits() {
        let mode = TriggerMode {
            acquisition: AcquisitionMode::Single,
            edge: TriggerEdge::Any,
            source: TriggerSource::Channel,
            channel: Channel::A,
            kind: TriggerKind::Digital,
        };
        assert_eq!(mode.bits(), 0xA3);
        assert_eq!(TriggerMode::from_bits(0xA3), Some(mode));
        let mode = TriggerMode::from_bits(0x50).unwrap();
        assert_eq!(mode.acquisition, AcquisitionMode::Normal);
        assert_eq!(mode.edge, TriggerEdge::Falling);
        assert_eq!(TriggerMode::from_bits(0xC0), None);
        assert_eq!(TriggerMode::from_bits(0x30), None);
    }

    #[test]
    fn test_sample_rate_decimation() {
        assert_eq!(sample_rate_decimation(200_000_000), 0);
        assert_eq!(sample_rate_decimation(100_000_000), 0);
        assert_eq!(sample_rate_decimation(50_000_000), 1);
        assert_eq!(sample_rate_decimation(40_000_000), 2);
        assert_eq!(sample_rate_decimation(1), 9);
    }

    #[test]
    fn test_acquisition_depth_power() {
        assert_eq!(acquisition_depth_power(0), 0);
        assert_eq!(acquisition_depth_power(2048), 0);
        assert_eq!(acquisition_depth_power(2049), 1);
        assert_eq!(acquisition_depth_power(u64::MAX), 11);
    }

    #[test]
    fn test_set_sample_rate_writes_register() {
        let mut s = Scope::new(MockTransport::new());
        assert_eq!(s.set_sample_rate(30_000_000).unwrap(), 25_000_000);
        assert_eq!(s.set_acquisition_depth(10_000).unwrap(), 16384);
        assert_eq!(
            s.transport().writes(),
            vec![
                vec![0xC0, 0x0A, 3, 0x18, 15, 2],
                vec![0xC0, 0x0A, 3, 0x18, 16, 3],
            ]
        );
    }

    #[test]
    fn test_start_acquisition() {
        let mut s = Scope::new(MockTransport::new());
        s.start_acquisition(0x0102_0304).unwrap();
        assert_eq!(
            s.transport().writes(),
            vec![
                vec![0xC0, 0x0A, 6, 0x18, 17, 0x04, 0x03, 0x02, 0x01],
                vec![0xC0, 0x0A, 3, 0x18, 0, 0x0B],
                vec![0xC0, 0x0A, 3, 0x18, 0, 0x15],
            ]
        );
    }

    #[test]
    fn test_digital_triggers() {
        let mut s = Scope::new(MockTransport::new());
        s.set_digital_triggers(1, 2, 4, 8).unwrap();
        assert_eq!(
            s.transport().writes(),
            vec![vec![0xC0, 0x0A, 6, 0x18, 29, 1, 2, 4, 8]]
        );
    }

    #[test]
    fn test_adc_selftest_passes_on_ramp() {
        let mut s = Scope::new(MockTransport::new());
        s.transport_mut().push_stream(header_block(0x10, 0, 0));
        s.transport_mut().push_stream(header_block(0x01, 2, 4));
        s.transport_mut().push_stream(vec![0; 8]);
        s.transport_mut().push_stream(header_block(0x80, 2, 4));
        s.transport_mut().push_stream(vec![5, 9, 6, 10, 7, 11, 8, 12]);
        assert!(s.adc_selftest().unwrap());
        let writes = s.transport().writes();
        // pattern enabled first, disabled before the final stop
        assert_eq!(writes[0], vec![0xC0, 0x0A, 3, 0x18, 1, 0x06]);
        assert_eq!(writes[1], vec![0xC0, 0x0A, 3, 0x18, 2, 0x50]);
        assert_eq!(
            writes[writes.len() - 4],
            vec![0xC0, 0x0A, 3, 0x18, 2, 0x00]
        );
        assert_eq!(writes.last(), Some(&vec![0xC0, 0x0A, 3, 0x18, 0, 0x17]));
    }

    #[test]
    fn test_adc_selftest_skips_unfetchable_frame() {
        let mut s = Scope::new(MockTransport::new());
        s.transport_mut().push_stream(header_block(0x80, 0, 4));
        s.transport_mut().push_stream(header_block(0x80, 2, 4));
        s.transport_mut().push_stream(vec![5, 9, 6, 10, 7, 11, 8, 12]);
        assert!(s.adc_selftest().unwrap());
    }

    #[test]
    fn test_adc_selftest_detects_corruption() {
        let mut s = Scope::new(MockTransport::new());
        s.transport_mut().push_stream(header_block(0x80, 2, 4));
        s.transport_mut().push_stream(vec![5, 9, 6, 10, 0, 11, 8, 12]);
        assert!(!s.adc_selftest().unwrap());
    }
}
