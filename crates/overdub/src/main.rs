use anyhow::{Context, Result};
use clap::Parser;
use overdub::{CompositionRequest, Config, HttpComposer, Orchestrator, SectionSpec};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Augment a MIDI file with new instrument tracks from a generative
/// composition service.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source MIDI file
    #[arg(short, long)]
    input: PathBuf,

    /// Output MIDI file
    #[arg(short, long)]
    output: PathBuf,

    /// Instrument to generate a part for (repeatable)
    #[arg(short = 'I', long = "instrument", required = true)]
    instruments: Vec<String>,

    /// Genre hint for the generative service
    #[arg(long)]
    genre: Option<String>,

    /// Subgenre hint, used together with --genre
    #[arg(long)]
    subgenre: Option<String>,

    /// JSON file with an array of section specs
    #[arg(long)]
    sections: Option<PathBuf>,

    /// Config file (defaults to ./overdub.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = Config::load_from(cli.config.as_deref())?;

    let sections: Vec<SectionSpec> = match &cli.sections {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read sections file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse sections file {}", path.display()))?
        }
        None => Vec::new(),
    };

    let request = CompositionRequest {
        source: cli.input.clone(),
        genre: cli.genre,
        subgenre: cli.subgenre,
        instruments: cli.instruments,
        sections,
    };

    // Credential check happens here, before any bytes are read or calls made.
    let composer = HttpComposer::from_config(&config)?;

    let source_bytes = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read input MIDI {}", cli.input.display()))?;

    let mut orchestrator = Orchestrator::new(Box::new(composer));
    let output_bytes = orchestrator.run(&source_bytes, &request).await?;

    std::fs::write(&cli.output, &output_bytes)
        .with_context(|| format!("failed to write output MIDI {}", cli.output.display()))?;

    tracing::info!(
        output = %cli.output.display(),
        bytes = output_bytes.len(),
        "wrote augmented MIDI"
    );

    Ok(())
}
