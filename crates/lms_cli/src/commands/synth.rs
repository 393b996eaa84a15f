//! Synth command - compose the stack and write the template.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use lms_compose::{MoodleStack, StackConfig};

#[derive(Args)]
pub struct SynthArgs {
    /// Path to the stack configuration file
    #[arg(short, long, default_value = "stack.yaml")]
    config: PathBuf,

    /// Write the rendered template here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn execute(args: SynthArgs) -> Result<()> {
    let config = StackConfig::from_file(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    info!(stack = %config.stack_name, "composing stack");

    let template = MoodleStack::synth(&config)?;
    let rendered = template.to_json_pretty()?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("writing template to {}", path.display()))?;
            println!("Template written to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
