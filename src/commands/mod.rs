//! CLI command implementations
//!
//! Everything except `list` runs against an open [`Scope`] session. Most
//! commands are generic over the transport; the firmware commands need the
//! USB transport to learn the device serial number.
//!
//! [`Scope`]: smartscope_core::Scope

pub mod capture;
pub mod firmware;
pub mod info;
mod list;
pub mod registers;
pub mod rom;

pub use list::list_devices;

use indicatif::{ProgressBar, ProgressStyle};

/// Byte progress bar used by uploads and ROM reads
pub(crate) fn byte_progress(total: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}
