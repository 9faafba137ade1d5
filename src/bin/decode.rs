//! decode: time-resolved decoding of an epochs file with a permutation null.
//!
//! Triggers may be given as codes (`11`) or condition names
//! (`self_positive`); names resolve through the condition table, which is
//! the built-in one unless `--conditions` points at a JSON map.
//!
//! Output keys (safetensors):
//!   times, accuracy, lower, upper, p_values   [T]     f64
//!   null                                      [T, N]  f64
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use megdec::{
    config::load_json,
    decode,
    io::{load_epochs, save_outcome},
    ClassifierConfig, ConditionTable, DecodingConfig, LogisticRegression, Penalty,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Model {
    Logistic,
    Centroid,
}

#[derive(Parser)]
#[command(name = "decode", about = "Per-sample MEG decoding with a permutation null")]
struct Args {
    /// Epochs file written by `preproc`.
    #[arg(long)]
    input: PathBuf,

    /// Summary output path (safetensors).
    #[arg(long)]
    output: PathBuf,

    /// Also write the summary as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    /// JSON `DecodingConfig`; command-line options override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON condition → code table.
    #[arg(long)]
    conditions: Option<PathBuf>,

    /// Trigger to keep (code or condition name), repeatable.
    #[arg(long = "trigger")]
    triggers: Vec<String>,

    /// Pair merged into one class, `A:B` (codes or names), repeatable.
    #[arg(long)]
    combine: Vec<String>,

    #[arg(long)]
    folds: Option<usize>,

    #[arg(long)]
    shuffle_folds: bool,

    #[arg(long)]
    permutations: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum)]
    model: Option<Model>,

    /// Inverse regularization strength of logistic regression.
    #[arg(long)]
    c: Option<f64>,

    /// Fit logistic regression without penalty.
    #[arg(long)]
    no_penalty: bool,

    /// Worker threads: 0 = all cores, 1 = sequential.
    #[arg(long)]
    n_jobs: Option<usize>,
}

fn parse_pair(token: &str, table: &ConditionTable) -> Result<[i64; 2]> {
    let (a, b) = token
        .split_once(':')
        .with_context(|| format!("combine pair {token:?} is not of the form A:B"))?;
    let resolve = |t: &str| table.resolve(t).map_err(|e| anyhow!(e));
    Ok([resolve(a)?, resolve(b)?])
}

fn build_config(args: &Args) -> Result<DecodingConfig> {
    let table: ConditionTable = match &args.conditions {
        Some(path) => load_json(path)?,
        None => ConditionTable::default(),
    };
    let mut cfg: DecodingConfig = match &args.config {
        Some(path) => load_json(path)?,
        None => DecodingConfig::default(),
    };

    if !args.triggers.is_empty() {
        cfg.triggers = args
            .triggers
            .iter()
            .map(|t| table.resolve(t).map_err(|e| anyhow!(e)))
            .collect::<Result<Vec<_>>>()?;
    }
    if !args.combine.is_empty() {
        cfg.combine = args
            .combine
            .iter()
            .map(|p| parse_pair(p, &table))
            .collect::<Result<Vec<_>>>()?;
    }
    if let Some(k) = args.folds {
        cfg.n_folds = k;
    }
    if args.shuffle_folds {
        cfg.shuffle_folds = true;
    }
    if let Some(n) = args.permutations {
        cfg.n_permutations = n;
    }
    if let Some(s) = args.seed {
        cfg.seed = s;
    }
    if let Some(n) = args.n_jobs {
        cfg.n_jobs = n;
    }

    match args.model {
        Some(Model::Centroid) => cfg.classifier = ClassifierConfig::NearestCentroid,
        Some(Model::Logistic) if !matches!(cfg.classifier, ClassifierConfig::LogisticRegression(_)) => {
            cfg.classifier = ClassifierConfig::LogisticRegression(LogisticRegression::default());
        }
        _ => {}
    }
    if args.c.is_some() || args.no_penalty {
        let ClassifierConfig::LogisticRegression(lr) = &mut cfg.classifier else {
            bail!("--c and --no-penalty apply to logistic regression only");
        };
        if let Some(c) = args.c {
            lr.c = c;
        }
        if args.no_penalty {
            lr.penalty = Penalty::None;
        }
    }

    cfg.validate()?;
    Ok(cfg)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();
    let args = Args::parse();
    let cfg = build_config(&args)?;

    let epochs = load_epochs(&args.input)?;
    tracing::info!(
        epochs = epochs.n_epochs(),
        channels = epochs.data.dim().1,
        samples = epochs.times.len(),
        "loaded"
    );
    let trials = epochs.into_trial_set()?;

    let outcome = decode::run(&trials, &cfg)?;
    tracing::info!(classes = ?outcome.class_counts, "class sizes after balancing");

    save_outcome(&outcome, &args.output)?;
    if let Some(path) = &args.json {
        let text = serde_json::to_string_pretty(&outcome.summary)?;
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    }
    tracing::info!(path = %args.output.display(), "written");
    Ok(())
}
