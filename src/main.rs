#![recursion_limit = "256"]

mod cli;
mod application;
mod domain;
mod data;
mod ml;
mod infra;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use infra::checkpoint::CheckpointError;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wf_eval=info")),
        )
        .init();

    exit_code(Cli::parse().run())
}

/// A missing checkpoint prints `No valid checkpoint!`; every error,
/// that one included, exits with a failure status.
fn exit_code(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.downcast_ref::<CheckpointError>().is_some() => {
            println!("No valid checkpoint!");
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_checkpoint_exits_non_zero() {
        let err = CheckpointError::NotFound(PathBuf::from("runs/x/model.mpk.gz"));
        assert_eq!(exit_code(Err(err.into())), ExitCode::FAILURE);
        assert_eq!(exit_code(Err(CheckpointError::NotProvided.into())), ExitCode::FAILURE);
    }

    #[test]
    fn test_other_errors_and_success() {
        assert_eq!(exit_code(Err(anyhow::anyhow!("bad json"))), ExitCode::FAILURE);
        assert_eq!(exit_code(Ok(())), ExitCode::SUCCESS);
    }
}
