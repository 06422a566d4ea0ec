use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tandem_svm::{
    config::{RunConfig, Selector},
    pipeline,
};

/// Tandem SVM classification of hemodynamic response patterns.
#[derive(Parser)]
#[command(name = "tandem-svm")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Subject number, or `example` for the bundled demonstration data
    selector: Selector,

    /// Directory holding `data/`, `results/` and `example/`
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Fold shuffling seed; 0 reproduces the same split on every run
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tandem_svm=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = RunConfig::new(&cli.root, cli.selector);
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }

    let report = pipeline::run(&config)
        .with_context(|| format!("tandem classification of {} aborted", cli.selector))?;

    println!("Training time: {:.3} s", report.training_time.as_secs_f64());
    println!(
        "Execution time: {:.3} ms",
        report.inference_time.as_secs_f64() * 1000.0
    );
    println!("Tandem classification error: {:.2}%", report.error);

    Ok(())
}
