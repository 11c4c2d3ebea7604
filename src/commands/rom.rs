//! PIC flash ROM read command

use smartscope_core::{Scope, Transport};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Read `length` bytes of PIC flash ROM from `start`
pub fn run_rom<T: Transport>(
    scope: &mut Scope<T>,
    start: u32,
    length: u32,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let length = length as usize;
    let pb = super::byte_progress(length as u64)?;
    let data = scope.read_rom_with_progress(start, length, |done, _| pb.set_position(done as u64))?;
    pb.finish_with_message("Read complete");

    match output {
        Some(path) => {
            let mut file = File::create(path)?;
            file.write_all(&data)?;
            println!("Wrote {} bytes to {:?}", data.len(), path);
        }
        None => print!("{}", hex_dump(start, &data)),
    }
    Ok(())
}

/// Format `data` as 16-byte hex dump lines starting at `base`
fn hex_dump(base: u32, data: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        out.push_str(&format!(
            "{:08x}  {:<47}  |{}|\n",
            base as usize + i * 16,
            hex.join(" "),
            ascii
        ));
    }
    out
}
