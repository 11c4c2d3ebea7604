//! Acquisition capture and ADC self test

use crate::cli::CaptureArgs;
use indicatif::{ProgressBar, ProgressStyle};
use smartscope_core::{Frame, Scope, Transport};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One line summary of a frame
fn describe(frame: &Frame) -> String {
    let header = &frame.header;
    let mut line = format!(
        "#{:3} {:?} {} bytes",
        header.acquisition_id,
        frame.kind(),
        frame.payload.len()
    );
    if let Some(depth) = header.acquisition_depth() {
        line.push_str(&format!(
            ", {} samples @ {:.0} Hz",
            depth,
            1.0 / header.sample_period()
        ));
    }
    if header.rolling() {
        line.push_str(", rolling");
    }
    if let Some(ch) = header.logic_channel() {
        line.push_str(&format!(", logic on {}", ch));
    }
    line
}

/// Arm the scope and read `count` frames
pub fn run_capture<T: Transport>(
    scope: &mut Scope<T>,
    count: usize,
    output: Option<&Path>,
    args: &CaptureArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(hz) = args.sample_rate {
        let rate = scope.set_sample_rate(hz)?;
        println!("Sample rate: {} Hz", rate);
    }
    if let Some(samples) = args.depth {
        let depth = scope.set_acquisition_depth(samples)?;
        println!("Acquisition depth: {} samples", depth);
    }

    let mut writer = match output {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };

    scope.start_acquisition(args.pre_trigger)?;
    if args.force {
        scope.force_trigger()?;
    }

    let pb = ProgressBar::new(count as u64);
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos}/{len} frames {msg}")?);

    // The scope keeps streaming until stopped, so stop on failure too
    let result = read_frames(scope, count, writer.as_mut().map(|w| w as &mut dyn Write), &pb);
    let stopped = scope.stop_acquisition();
    let bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            pb.abandon_with_message("capture failed");
            return Err(e);
        }
    };
    stopped?;
    pb.finish_with_message(format!("{} payload bytes", bytes));

    if let (Some(mut w), Some(path)) = (writer, output) {
        w.flush()?;
        println!("Wrote {} bytes to {:?}", bytes, path);
    }
    Ok(())
}

/// Read `count` frames, writing their samples to `out`; returns payload bytes
fn read_frames<T: Transport>(
    scope: &mut Scope<T>,
    count: usize,
    mut out: Option<&mut dyn Write>,
    pb: &ProgressBar,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut bytes = 0usize;
    for _ in 0..count {
        let frame = scope.read_frame()?;
        pb.println(describe(&frame));
        if let Some(w) = out.as_mut() {
            for samples in frame.channels() {
                w.write_all(samples.as_bytes())?;
            }
        }
        bytes += frame.payload.len();
        pb.inc(1);
    }
    Ok(bytes)
}

/// Run the ADC ramp self test
pub fn run_selftest<T: Transport>(scope: &mut Scope<T>) -> Result<(), Box<dyn std::error::Error>> {
    if scope.adc_selftest()? {
        println!("ADC self test passed");
        Ok(())
    } else {
        Err("ADC self test failed".into())
    }
}
