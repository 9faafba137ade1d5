//! preproc: turn one or more continuous recordings into a single epochs file.
//!
//! Each `--input` is a raw safetensors recording; its file stem is the
//! recording name used to look up ICA exclusions. When a recording has
//! exclusions, its solution is read from `<ica-dir>/<name>.safetensors`.
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use megdec::{
    concatenate_epochs,
    config::load_json,
    io::{load_ica, load_raw, save_epochs},
    preprocess_recording, PreprocessConfig,
};

#[derive(Parser)]
#[command(name = "preproc", about = "MEG recording → epochs")]
struct Args {
    /// Raw recording(s), safetensors.
    #[arg(long, required = true)]
    input: Vec<PathBuf>,

    /// Epochs output path.
    #[arg(long)]
    output: PathBuf,

    /// JSON `PreprocessConfig`; defaults are used for missing fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding `<recording>.safetensors` ICA solutions.
    #[arg(long)]
    ica_dir: Option<PathBuf>,

    /// Low-pass cutoff in Hz, overrides the config.
    #[arg(long)]
    h_freq: Option<f64>,

    /// High-pass cutoff in Hz, overrides the config.
    #[arg(long)]
    l_freq: Option<f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();
    let args = Args::parse();

    let mut cfg: PreprocessConfig = match &args.config {
        Some(path) => load_json(path)?,
        None => PreprocessConfig::default(),
    };
    if args.h_freq.is_some() {
        cfg.h_freq = args.h_freq;
    }
    if args.l_freq.is_some() {
        cfg.l_freq = args.l_freq;
    }
    cfg.validate()?;

    let mut parts = Vec::with_capacity(args.input.len());
    for path in &args.input {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("cannot derive a recording name from {}", path.display()))?
            .to_string();
        let raw = load_raw(path)?;
        tracing::info!(
            recording = %name,
            channels = raw.n_channels(),
            samples = raw.n_times(),
            sfreq = raw.sfreq,
            "loaded"
        );

        let ica = match (cfg.ica_exclusions.get(&name), &args.ica_dir) {
            (Some(_), Some(dir)) => Some(load_ica(&dir.join(format!("{name}.safetensors")))?),
            _ => None,
        };
        let epochs = preprocess_recording(&name, raw, &cfg, ica.as_ref())
            .with_context(|| format!("preprocessing {name}"))?;
        parts.push(epochs);
    }

    let epochs = concatenate_epochs(parts)?;
    tracing::info!(epochs = epochs.n_epochs(), counts = ?epochs.counts(), "concatenated");
    save_epochs(&epochs, &args.output)?;
    tracing::info!(path = %args.output.display(), "written");
    Ok(())
}
