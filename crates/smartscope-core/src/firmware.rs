//! FPGA bitstream upload
//!
//! The PIC programs the FPGA from a stream of 32-byte packets written to the
//! command endpoint. The handshake is:
//!
//! 1. `PROGRAM_FPGA_START` announcing `ceil(len / 32) + 256` packets
//! 2. clear the data endpoint halt, wait one second
//! 3. the bitstream in 2048-byte transfers
//! 4. 256 packets of `0xFF` padding
//! 5. `PROGRAM_FPGA_END`, clear the data endpoint halt again
//!
//! The padding is part of the announced packet count and is always sent.

use std::time::Duration;

use crate::error::{ConfigError, Error, Result};
use crate::registers::FpgaVersion;
use crate::session::Scope;
use crate::transport::{Endpoint, Transport};

/// Size of one bitstream packet as counted by `PROGRAM_FPGA_START`
pub const FIRMWARE_PACKET_SIZE: usize = 32;
/// Size of each bitstream transfer
pub const FIRMWARE_CHUNK_SIZE: usize = 2048;
/// Trailing `0xFF` packets sent after the bitstream
pub const FIRMWARE_PADDING_PACKETS: usize = 256;
/// Settle time between the start command and the first chunk
pub const FPGA_SETTLE_TIME: Duration = Duration::from_secs(1);

/// Upload handshake progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Started,
    /// Number of bitstream chunks written so far
    ChunkSent(usize),
    Padded,
    Ended,
}

/// Geometry of an upload, validated before any I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPlan {
    blob_len: usize,
    packets: u16,
}

impl UploadPlan {
    /// Validate a blob length
    pub fn new(blob_len: usize) -> std::result::Result<Self, ConfigError> {
        if blob_len == 0 {
            return Err(ConfigError::InvalidFirmware("empty bitstream".into()));
        }
        let packets = blob_len.div_ceil(FIRMWARE_PACKET_SIZE) + FIRMWARE_PADDING_PACKETS;
        let packets = u16::try_from(packets).map_err(|_| {
            ConfigError::InvalidFirmware(format!(
                "bitstream of {} bytes needs {} packets, more than {}",
                blob_len,
                packets,
                u16::MAX
            ))
        })?;
        Ok(Self { blob_len, packets })
    }

    /// Packet count announced by `PROGRAM_FPGA_START`
    pub fn packet_count(&self) -> u16 {
        self.packets
    }

    pub fn chunk_count(&self) -> usize {
        self.blob_len.div_ceil(FIRMWARE_CHUNK_SIZE)
    }

    pub fn last_chunk_len(&self) -> usize {
        match self.blob_len % FIRMWARE_CHUNK_SIZE {
            0 => FIRMWARE_CHUNK_SIZE,
            n => n,
        }
    }

    /// Bytes written after the start command, padding included
    pub fn total_bytes(&self) -> usize {
        self.blob_len + FIRMWARE_PADDING_PACKETS * FIRMWARE_PACKET_SIZE
    }
}

impl<T: Transport> Scope<T> {
    /// Upload an FPGA bitstream
    pub fn upload_firmware(&mut self, blob: &[u8]) -> Result<()> {
        self.upload_firmware_with_progress(blob, |_, _| {})
    }

    /// Upload an FPGA bitstream, reporting `(bytes_done, total)`
    ///
    /// Any failure aborts the upload; the FPGA is left unconfigured and the
    /// whole handshake has to be restarted.
    pub fn upload_firmware_with_progress<F>(&mut self, blob: &[u8], mut progress: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        let plan = UploadPlan::new(blob.len())?;
        log::info!(
            "Uploading FPGA bitstream: {} bytes, {} packets",
            blob.len(),
            plan.packet_count()
        );

        let mut state = UploadState::Idle;
        let result = self.run_upload(blob, &plan, &mut state, &mut progress);
        match &result {
            Ok(()) => log::info!("FPGA bitstream uploaded"),
            Err(e) => log::error!("FPGA upload failed in state {:?}: {}", state, e),
        }
        result
    }

    fn run_upload(
        &mut self,
        blob: &[u8],
        plan: &UploadPlan,
        state: &mut UploadState,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        let total = plan.total_bytes();
        let mut done = 0;

        self.fpga_program_start(plan.packet_count())?;
        self.transport_mut().clear_halt(Endpoint::Data)?;
        self.transport_mut().delay(FPGA_SETTLE_TIME);
        *state = UploadState::Started;

        for (i, chunk) in blob.chunks(FIRMWARE_CHUNK_SIZE).enumerate() {
            self.write_raw(chunk)?;
            *state = UploadState::ChunkSent(i + 1);
            done += chunk.len();
            progress(done, total);
        }
        log::debug!("wrote {} bitstream chunks", plan.chunk_count());

        let padding = [0xFFu8; FIRMWARE_PACKET_SIZE];
        for _ in 0..FIRMWARE_PADDING_PACKETS {
            self.write_raw(&padding)?;
            done += padding.len();
            progress(done, total);
        }
        *state = UploadState::Padded;

        self.fpga_program_end()?;
        self.transport_mut().clear_halt(Endpoint::Data)?;
        *state = UploadState::Ended;
        Ok(())
    }

    /// Make sure the FPGA is configured
    ///
    /// Reads the FPGA version; when it is not plausible, obtains a bitstream
    /// from `load`, uploads it and reads the version again. Returns the
    /// version and whether an upload took place.
    pub fn ensure_fpga<F, E>(&mut self, load: F) -> std::result::Result<(FpgaVersion, bool), E>
    where
        F: FnOnce() -> std::result::Result<Vec<u8>, E>,
        E: From<Error>,
    {
        let version = self.fpga_version()?;
        if version.is_plausible() {
            log::info!("FPGA already configured, version {}", version);
            return Ok((version, false));
        }

        log::info!("FPGA not configured");
        let blob = load()?;
        self.upload_firmware(&blob)?;
        let version = self.fpga_version()?;
        if !version.is_plausible() {
            log::warn!("FPGA still reports no version after upload");
        }
        Ok((version, true))
    }
}
