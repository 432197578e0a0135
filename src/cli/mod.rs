// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Parses the command line with clap and hands the resulting
// config to Layer 2. No evaluation logic lives here.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::EvalArgs;

use crate::application::eval_use_case::EvalUseCase;

/// Evaluate a trained website-fingerprinting checkpoint on a test split.
#[derive(Parser, Debug)]
#[command(name = "wf-eval", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub args: EvalArgs,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        tracing::info!(
            "Evaluating on dataset '{}' from {}",
            self.args.dataset,
            self.args.data_dir.display()
        );
        EvalUseCase::new(self.args.into()).execute()?;
        Ok(())
    }
}
