//! FPGA bitstream upload and device initialization

use smartscope_core::{Scope, UploadPlan};
use smartscope_usb::{ScopeDeviceInfo, UsbTransport};
use std::path::{Path, PathBuf};

/// Directories searched for `SmartScope_<rev>.bin` after `--firmware-dir`
const DEFAULT_FIRMWARE_DIRS: &[&str] = &[
    "firmware",
    "/usr/share/smartscope/firmware",
    "/usr/local/share/smartscope/firmware",
];

/// Where to find the FPGA bitstream
#[derive(Debug, Clone, Default)]
pub struct FirmwareSource {
    /// Explicit bitstream file, bypasses the search
    pub file: Option<PathBuf>,
    /// Directory searched before the defaults
    pub dir: Option<PathBuf>,
}

impl FirmwareSource {
    /// Locate the bitstream for a device
    pub fn locate(&self, device: &ScopeDeviceInfo) -> Result<PathBuf, Box<dyn std::error::Error>> {
        if let Some(file) = &self.file {
            return Ok(file.clone());
        }

        let name = device
            .firmware_file_name()
            .ok_or("Device reports no serial number, pass --firmware <file>")?;

        let dirs = self
            .dir
            .iter()
            .cloned()
            .chain(DEFAULT_FIRMWARE_DIRS.iter().map(PathBuf::from));
        for dir in dirs {
            let path = dir.join(&name);
            if path.is_file() {
                log::debug!("Found bitstream {}", path.display());
                return Ok(path);
            }
            log::trace!("No {} in {}", name, dir.display());
        }

        Err(format!("FPGA bitstream {} not found, pass --firmware or --firmware-dir", name).into())
    }

    /// Locate and read the bitstream for a device
    pub fn load(&self, device: &ScopeDeviceInfo) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let path = self.locate(device)?;
        read_bitstream(&path)
    }
}

fn read_bitstream(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let blob = std::fs::read(path)
        .map_err(|e| format!("Failed to read bitstream {}: {}", path.display(), e))?;
    log::info!("Loaded {} ({} bytes)", path.display(), blob.len());
    Ok(blob)
}

/// Upload the FPGA bitstream with a progress bar
pub fn run_upload(
    scope: &mut Scope<UsbTransport>,
    source: &FirmwareSource,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !force {
        let version = scope.fpga_version()?;
        if version.is_plausible() {
            println!(
                "FPGA already configured (version {}), use --force to upload anyway",
                version
            );
            return Ok(());
        }
    }

    let blob = source.load(scope.transport().info())?;
    let plan = UploadPlan::new(blob.len())?;

    let pb = super::byte_progress(plan.total_bytes() as u64)?;
    scope.upload_firmware_with_progress(&blob, |done, _| pb.set_position(done as u64))?;
    pb.finish_with_message("Upload complete");

    let version = scope.fpga_version()?;
    if version.is_plausible() {
        println!("FPGA version: {}", version);
    } else {
        return Err("FPGA reports no version after upload".into());
    }
    Ok(())
}

/// Make sure the FPGA is configured, then run the bring-up script
pub fn run_init(
    scope: &mut Scope<UsbTransport>,
    source: &FirmwareSource,
) -> Result<(), Box<dyn std::error::Error>> {
    let device = scope.transport().info().clone();
    let (version, uploaded) = scope.ensure_fpga(|| source.load(&device))?;
    if uploaded {
        println!("Uploaded bitstream, FPGA version {}", version);
    } else {
        println!("FPGA version {}", version);
    }

    scope.bring_up()?;
    println!("SmartScope ready");
    Ok(())
}
