//! CLI command definitions.
//!
//! Each subcommand maps to one operator workflow: render the stack
//! template, or inspect what is already deployed.

use clap::{Parser, Subcommand};

pub mod stacks;
pub mod synth;

/// lmstack - Moodle hosting stack composer
#[derive(Parser)]
#[command(name = "lms")]
#[command(version, about = "lmstack - Moodle hosting stack composer")]
#[command(long_about = r#"
lmstack composes the complete cloud resource graph for a serverless
Moodle hosting environment and renders it as a deployable template.

WORKFLOWS:
  synth   → Compose the stack from a config file and write the template
  stacks  → List deployed stacks, their status and outputs

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration/composition error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compose the stack and render the deployable template
    Synth(synth::SynthArgs),

    /// List deployed stacks for the active account and region
    Stacks(stacks::StacksArgs),
}
