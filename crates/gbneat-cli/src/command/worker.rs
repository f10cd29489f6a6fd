use std::io::{self, Write as _};

use anyhow::Context as _;

use crate::evaluation::EpisodeJob;

#[derive(Debug, Clone, clap::Args)]
pub(super) struct WorkerArg {}

/// Reads one job from stdin, plays it, and prints the result line on stdout.
pub(super) fn run(_arg: &WorkerArg) -> anyhow::Result<()> {
    let job: EpisodeJob =
        serde_json::from_reader(io::stdin().lock()).context("Failed to read job from stdin")?;
    let result = job.execute()?;

    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &result).context("Failed to write result")?;
    writeln!(stdout).context("Failed to write result")?;
    stdout.flush().context("Failed to flush result")?;
    Ok(())
}
