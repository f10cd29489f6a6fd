use std::path::PathBuf;

use gbneat_evaluator::action;

use super::{EpisodeArg, RomArg};
use crate::{evaluation, model::winner::WinnerModel};

#[derive(Debug, Clone, clap::Args)]
pub(super) struct PlayArg {
    /// Winner model written by `train`
    model: PathBuf,
    #[command(flatten)]
    rom: RomArg,
    #[command(flatten)]
    episode: EpisodeArg,
    /// Write the episode's action log into this directory
    #[arg(long)]
    action_log_dir: Option<PathBuf>,
    /// Seed for the initial action history
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

pub(super) fn run(arg: &PlayArg) -> anyhow::Result<()> {
    let model = WinnerModel::open(&arg.model)?;
    let game = model.game;
    let (rom, state) = arg.rom.resolve(game)?;
    let episode = arg.episode.resolve(game);

    eprintln!(
        "Playing genome {} ({game}, trained at {}, fitness {:.3})",
        model.genome.key, model.trained_at, model.fitness
    );
    let network = model.network(episode.history_len);
    let outcome = evaluation::play(game, &rom, state.as_deref(), episode, network, arg.seed)?;

    eprintln!("Episode finished: {}", outcome.reason);
    eprintln!("  Fitness: {:.3}", outcome.fitness);
    eprintln!("  Steps: {}", outcome.steps);

    if let Some(dir) = &arg.action_log_dir {
        let path = action::write_action_log(dir, model.genome.key, &outcome.actions)?;
        eprintln!("  Action log: {}", path.display());
    }
    Ok(())
}
