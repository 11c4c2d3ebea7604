//! Acquisition stream reader
//!
//! The data endpoint carries a stream of `header, payload` packets. Reading
//! a frame first seeks the `"LN"` magic in 64-byte reads, parses the header,
//! then fetches a payload whose size follows from the header flags and burst
//! geometry. The reader tolerates a bounded number of non-header blocks
//! before giving up with [`Error::Sync`].

use crate::error::{Error, Result, TransportError};
use crate::header::{AcquisitionHeader, Channel, PacketKind, FETCH_SIZE_MAX, HEADER_SIZE};
use crate::protocol::{FLUSH_TIMEOUT, HEADER_TIMEOUT, PAYLOAD_TIMEOUT};
use crate::session::Scope;
use crate::transport::Transport;

/// Non-header blocks tolerated while seeking a header
pub const MAX_HEADER_MISSES: usize = 64;

/// Samples of one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSamples {
    /// Raw 8-bit ADC codes
    Analog(Vec<u8>),
    /// One byte per sample, one bit per digital input
    Logic(Vec<u8>),
}

impl ChannelSamples {
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ChannelSamples::Analog(data) | ChannelSamples::Logic(data) => data,
        }
    }
}

/// One header plus the payload that followed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: AcquisitionHeader,
    /// Interleaved payload, channel A on even bytes
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn kind(&self) -> PacketKind {
        self.header.kind()
    }

    /// De-interleaved samples of `channel`, tagged analog or logic
    pub fn channel(&self, channel: Channel) -> ChannelSamples {
        let samples: Vec<u8> = self
            .payload
            .iter()
            .skip(channel.index())
            .step_by(2)
            .copied()
            .collect();
        if self.header.logic_channel() == Some(channel) {
            ChannelSamples::Logic(samples)
        } else {
            ChannelSamples::Analog(samples)
        }
    }

    /// Both channels, A first
    pub fn channels(&self) -> [ChannelSamples; 2] {
        [self.channel(Channel::A), self.channel(Channel::B)]
    }
}

/// Check a test-pattern capture
///
/// With the ADC ramp pattern enabled every sample is the sample two positions
/// earlier (same channel) plus one, wrapping at 256.
pub fn verify_adc_ramp(samples: &[u8]) -> bool {
    if samples.len() < 4 {
        return false;
    }
    samples.windows(3).all(|w| w[0].wrapping_add(1) == w[2])
}

impl<T: Transport> Scope<T> {
    /// Read blocks until one carries the header magic
    ///
    /// Up to [`MAX_HEADER_MISSES`] non-matching blocks are skipped; the next
    /// miss fails with [`Error::Sync`]. A timeout is reported as a transport
    /// error and ends the seek.
    pub fn seek_header(&mut self) -> Result<AcquisitionHeader> {
        let mut misses = 0;
        loop {
            let block = self
                .transport_mut()
                .read_stream(HEADER_SIZE, HEADER_TIMEOUT)?;
            if let Some(header) = AcquisitionHeader::parse(&block)? {
                if misses > 0 {
                    log::warn!("Resynchronized after skipping {} blocks", misses);
                }
                return Ok(header);
            }
            misses += 1;
            log::trace!("no header in {}-byte block ({} misses)", block.len(), misses);
            if misses > MAX_HEADER_MISSES {
                log::warn!("Lost acquisition stream sync");
                return Err(Error::Sync { misses });
            }
        }
    }

    /// Read the next complete frame
    ///
    /// A data frame with unusable burst geometry fails with
    /// [`crate::ProtocolError::BadPayloadSize`]. When it announces more than one
    /// fetch, the announced bytes are drained first so the next read starts
    /// at a header.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let header = self.seek_header()?;
        let len = match header.payload_len() {
            Ok(len) => len,
            Err(e) => {
                log::warn!("Dropping frame id={}: {}", header.acquisition_id, e);
                let announced = header.announced_len();
                if announced > 0 {
                    let drained = self.drain_stream(announced)?;
                    log::debug!("drained {} of {} announced bytes", drained, announced);
                }
                return Err(e.into());
            }
        };
        let payload = if len == 0 {
            Vec::new()
        } else {
            self.transport_mut().read_stream(len, PAYLOAD_TIMEOUT)?
        };
        log::debug!(
            "frame {:?} id={} flags={:?}: {} of {} bytes",
            header.kind(),
            header.acquisition_id,
            header.flags,
            payload.len(),
            len
        );
        Ok(Frame { header, payload })
    }

    /// Discard up to `len` bytes of payload, stopping early when the
    /// endpoint runs dry
    fn drain_stream(&mut self, len: usize) -> Result<usize> {
        let mut drained = 0;
        while drained < len {
            let want = (len - drained).min(FETCH_SIZE_MAX);
            match self.transport_mut().read_stream(want, PAYLOAD_TIMEOUT) {
                Ok(block) if block.is_empty() => break,
                Ok(block) => drained += block.len(),
                Err(TransportError::Timeout) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(drained)
    }

    /// Drain stale packets from the data endpoint
    ///
    /// Returns the number of bytes discarded.
    pub fn flush_data_pipe(&mut self) -> Result<usize> {
        let mut flushed = 0;
        loop {
            match self.transport_mut().read_stream(HEADER_SIZE, FLUSH_TIMEOUT) {
                Ok(block) if block.is_empty() => break,
                Ok(block) => flushed += block.len(),
                Err(TransportError::Timeout) => break,
                Err(e) => return Err(e.into()),
            }
        }
        log::debug!("flushed {} bytes from data endpoint", flushed);
        Ok(flushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::header::tests::header_block;
    use crate::mock::MockTransport;

    fn scope() -> Scope<MockTransport> {
        Scope::new(MockTransport::new())
    }

    #[test]
    fn test_sync_after_64_misses() {
        let mut s = scope();
        for _ in 0..64 {
            s.transport_mut().push_stream(vec![0u8; 64]);
        }
        s.transport_mut().push_stream(header_block(0x10, 0, 0));
        let frame = s.read_frame().unwrap();
        assert!(frame.payload.is_empty());
        assert_eq!(s.transport().stream_requests().len(), 65);
    }

    #[test]
    fn test_sync_error_on_65th_miss() {
        let mut s = scope();
        for _ in 0..65 {
            s.transport_mut().push_stream(vec![0xAA; 64]);
        }
        s.transport_mut().push_stream(header_block(0, 0, 0));
        assert_eq!(s.read_frame().unwrap_err(), Error::Sync { misses: 65 });
        assert_eq!(s.transport().stream.len(), 1);
    }

    #[test]
    fn test_truncated_header() {
        let mut s = scope();
        s.transport_mut().push_stream(header_block(0, 0, 0)[..20].to_vec());
        assert_eq!(
            s.read_frame().unwrap_err(),
            Error::Protocol(ProtocolError::TruncatedHeader(20))
        );
    }

    #[test]
    fn test_seek_timeout_is_transport_error() {
        let mut s = scope();
        assert_eq!(
            s.seek_header().unwrap_err(),
            Error::Transport(TransportError::Timeout)
        );
    }

    #[test]
    fn test_payload_request_and_deinterleave() {
        let mut s = scope();
        s.transport_mut().push_stream(header_block(0x80, 2, 4));
        s.transport_mut().push_stream(vec![0, 10, 1, 11, 2, 12]);
        let frame = s.read_frame().unwrap();
        assert_eq!(s.transport().stream_requests(), vec![64, 8]);
        assert_eq!(frame.kind(), PacketKind::Acquisition);
        assert_eq!(
            frame.channels(),
            [
                ChannelSamples::Analog(vec![0, 1, 2]),
                ChannelSamples::Analog(vec![10, 11, 12]),
            ]
        );
    }

    #[test]
    fn test_logic_channel_tagging() {
        let mut block = header_block(0x02, 0, 0);
        block[45] = 0b0_0001;
        let frame = Frame {
            header: AcquisitionHeader::parse(&block).unwrap().unwrap(),
            payload: vec![0xF0, 0x80, 0x0F, 0x81],
        };
        assert_eq!(
            frame.channel(Channel::A),
            ChannelSamples::Logic(vec![0xF0, 0x0F])
        );
        assert_eq!(
            frame.channel(Channel::B),
            ChannelSamples::Analog(vec![0x80, 0x81])
        );
    }

    #[test]
    fn test_overview_requests_full_fetch() {
        let mut s = scope();
        s.transport_mut().push_stream(header_block(0x02, 1, 1));
        s.transport_mut().push_stream(vec![0; 100]);
        let frame = s.read_frame().unwrap();
        assert_eq!(s.transport().stream_requests(), vec![64, 4096]);
        assert_eq!(frame.payload.len(), 100);
    }

    #[test]
    fn test_zero_bursts_fails_without_reading_payload() {
        let mut s = scope();
        s.transport_mut().push_stream(header_block(0x01, 0, 64));
        s.transport_mut().push_stream(header_block(0x80, 1, 8));
        s.transport_mut().push_stream(vec![1; 8]);

        assert_eq!(
            s.read_frame().unwrap_err(),
            Error::Protocol(ProtocolError::BadPayloadSize {
                bursts: 0,
                bytes_per_burst: 64
            })
        );
        assert_eq!(s.transport().stream_requests(), vec![64]);

        // the following frame is still intact
        let frame = s.read_frame().unwrap();
        assert_eq!(frame.kind(), PacketKind::Acquisition);
        assert_eq!(frame.payload, vec![1; 8]);
    }

    #[test]
    fn test_oversize_payload_is_drained_and_rejected() {
        let mut s = scope();
        s.transport_mut().push_stream(header_block(0x80, 128, 64));
        s.transport_mut().push_stream(vec![0xAA; 4096]);
        s.transport_mut().push_stream(vec![0xBB; 4096]);
        s.transport_mut().push_stream(header_block(0x80, 1, 4));
        s.transport_mut().push_stream(vec![2; 4]);

        assert_eq!(
            s.read_frame().unwrap_err(),
            Error::Protocol(ProtocolError::BadPayloadSize {
                bursts: 128,
                bytes_per_burst: 64
            })
        );
        assert_eq!(s.transport().stream_requests(), vec![64, 4096, 4096]);

        let frame = s.read_frame().unwrap();
        assert_eq!(frame.payload, vec![2; 4]);
    }

    #[test]
    fn test_oversize_drain_stops_when_endpoint_runs_dry() {
        let mut s = scope();
        s.transport_mut().push_stream(header_block(0x80, 200, 64));
        s.transport_mut().push_stream(vec![0xAA; 4096]);
        assert!(matches!(
            s.read_frame(),
            Err(Error::Protocol(ProtocolError::BadPayloadSize { .. }))
        ));
        // the second drain read times out on the empty mock
        assert_eq!(s.transport().stream_requests(), vec![64, 4096, 4096]);
    }

    #[test]
    fn test_flush_data_pipe() {
        let mut s = scope();
        s.transport_mut().push_stream(vec![1; 64]);
        s.transport_mut().push_stream(vec![2; 10]);
        assert_eq!(s.flush_data_pipe().unwrap(), 74);
        s.transport_mut().push_stream(vec![1; 64]);
        s.transport_mut().push_stream(Vec::new());
        s.transport_mut().push_stream(vec![1; 64]);
        assert_eq!(s.flush_data_pipe().unwrap(), 64);
        assert_eq!(s.transport().stream.len(), 1);
    }

    #[test]
    fn test_verify_adc_ramp() {
        assert!(verify_adc_ramp(&[0, 100, 1, 101, 2, 102, 3]));
        assert!(verify_adc_ramp(&[255, 7, 0, 8]));
        assert!(!verify_adc_ramp(&[0, 100, 1, 101, 3, 102]));
        assert!(!verify_adc_ramp(&[0, 0, 1]));
    }
}
