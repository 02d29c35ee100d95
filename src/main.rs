use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::info;

use edf_export::container::SCF_EXTENSION;
use edf_export::{export_recording, ContainerWriter, EdfReader, ExportOptions};

#[derive(Parser)]
#[command(
    name = "edf-export",
    version,
    about = "Convert an EDF+ recording into a segment container file"
)]
struct Cli {
    /// EDF+ file to read
    input: PathBuf,

    /// Destination file; defaults to the input path with a .scf extension
    output: Option<PathBuf>,

    /// Free-text description stored with the recording
    #[arg(long, default_value = "EDF+ recording")]
    description: String,

    /// Sample rate in Hz; derived from the header when omitted
    #[arg(long)]
    sample_rate: Option<f64>,

    /// Stored as Recording.Type metadata
    #[arg(long)]
    recording_type: Option<String>,

    /// Stored as Recording.Software metadata
    #[arg(long, default_value = "edf-export")]
    software: String,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension(SCF_EXTENSION));

    let mut reader = EdfReader::open(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    let file = File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = ContainerWriter::new(BufWriter::new(file))?;

    let options = ExportOptions {
        description: cli.description.clone(),
        sample_rate: cli.sample_rate,
        software: cli.software.clone(),
        original_filename: Some(cli.input.display().to_string()),
        recording_type: cli.recording_type.clone(),
    };

    let summary = export_recording(&mut reader, &mut writer, &options)
        .with_context(|| format!("Failed to export {}", cli.input.display()))?;
    writer.finish()?;

    info!(
        "Wrote {} samples per channel, {} annotations, {} unreadable annotation spans",
        summary.samples_per_channel, summary.annotations, summary.skipped_annotation_spans
    );
    println!("Filename: {}", cli.input.display());
    println!("Container: {}", output.display());

    Ok(())
}
