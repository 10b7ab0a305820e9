use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use clap_complete::{Shell, generate, generate_to};
use tracing::info;

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write the script into this directory instead of stdout.
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

/// Emit a completion script for `docket`.
///
/// # Errors
///
/// Returns an error if the script cannot be written to `--out-dir`.
pub fn run_completions(args: &CompletionsArgs, command: &mut clap::Command) -> Result<()> {
    match &args.out_dir {
        Some(dir) => {
            let path = generate_to(args.shell, command, "docket", dir)
                .with_context(|| format!("Failed to write completions into {}", dir.display()))?;
            info!(path = %path.display(), "wrote completions");
        }
        None => generate(args.shell, command, "docket", &mut std::io::stdout()),
    }
    Ok(())
}
