use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gbneat_evaluator::{episode::EpisodeConfig, game::Game};

use self::{peek::PeekArg, play::PlayArg, train::TrainArg, worker::WorkerArg};

mod peek;
mod play;
mod train;
mod worker;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Evolve a controller with NEAT
    Train(#[clap(flatten)] TrainArg),
    /// Play one episode described by a job on stdin (used by `train`)
    #[command(hide = true)]
    Worker(#[clap(flatten)] WorkerArg),
    /// Print a memory byte every frame
    Peek(#[clap(flatten)] PeekArg),
    /// Replay a saved winner model
    Play(#[clap(flatten)] PlayArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Train(arg) => train::run(&arg)?,
        Mode::Worker(arg) => worker::run(&arg)?,
        Mode::Peek(arg) => peek::run(&arg)?,
        Mode::Play(arg) => play::run(&arg)?,
    }
    Ok(())
}

/// ROM and save-state selection, defaulting to the game's standard files.
#[derive(Debug, Clone, clap::Args)]
struct RomArg {
    /// Game Boy ROM image
    #[arg(long)]
    rom: Option<PathBuf>,
    /// Save state to start every episode from
    #[arg(long, conflicts_with = "no_state")]
    state: Option<PathBuf>,
    /// Boot the ROM and play the intro instead of loading a save state
    #[arg(long)]
    no_state: bool,
}

impl RomArg {
    fn rom_path(&self, game: Game) -> PathBuf {
        self.rom
            .clone()
            .unwrap_or_else(|| game.default_rom_path().to_owned())
    }

    fn state_path(&self, game: Game) -> Option<PathBuf> {
        if self.no_state {
            return None;
        }
        Some(
            self.state
                .clone()
                .unwrap_or_else(|| game.default_state_path().to_owned()),
        )
    }

    /// Resolves both paths and checks that the files exist.
    fn resolve(&self, game: Game) -> anyhow::Result<(PathBuf, Option<PathBuf>)> {
        let rom = self.rom_path(game);
        anyhow::ensure!(rom.is_file(), "ROM not found: {}", rom.display());
        let state = self.state_path(game);
        if let Some(state) = &state {
            anyhow::ensure!(state.is_file(), "save state not found: {}", state.display());
        }
        Ok((rom, state))
    }
}

/// Overrides for the game's episode defaults.
#[derive(Debug, Clone, Default, clap::Args)]
struct EpisodeArg {
    /// Emulation speed multiplier, 0 for unthrottled
    #[arg(long)]
    speed: Option<u32>,
    /// Frames to advance after each action
    #[arg(long)]
    wait: Option<u32>,
    /// Rewardless steps before an episode is cut off
    #[arg(long)]
    stall_limit: Option<u32>,
}

impl EpisodeArg {
    fn resolve(&self, game: Game) -> EpisodeConfig {
        let defaults = game.default_episode_config();
        EpisodeConfig {
            wait_for_action: self.wait.unwrap_or(defaults.wait_for_action),
            stall_limit: self.stall_limit.unwrap_or(defaults.stall_limit),
            emulation_speed: self.speed.unwrap_or(defaults.emulation_speed),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        CommandArgs::command().debug_assert();
    }

    #[test]
    fn test_episode_overrides() {
        let arg = EpisodeArg {
            wait: Some(3),
            ..EpisodeArg::default()
        };
        let config = arg.resolve(Game::PokemonRed);
        assert_eq!(config.wait_for_action, 3);
        assert_eq!(config.stall_limit, 2000);
        assert_eq!(config.emulation_speed, 10);
    }

    #[test]
    fn test_train_defaults() {
        let args = CommandArgs::try_parse_from(["gbneat", "train"]).unwrap();
        let Mode::Train(arg) = args.mode else {
            panic!("expected train");
        };
        assert_eq!(arg.game, Game::Tetris);
        assert_eq!(arg.generations, 20);
        assert_eq!(arg.checkpoint_interval, 5);
        assert_eq!(arg.checkpoint_prefix, "neat-checkpoint-");
        assert_eq!(arg.config, PathBuf::from("config-neat.json"));
        assert_eq!(
            arg.rom.state_path(arg.game),
            Some(PathBuf::from("ROM/states/game_start.state"))
        );
    }

    #[test]
    fn test_no_state_conflicts_with_state() {
        let err = CommandArgs::try_parse_from([
            "gbneat",
            "train",
            "--no-state",
            "--state",
            "x.state",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);

        let args =
            CommandArgs::try_parse_from(["gbneat", "train", "--game", "pokemon-red", "--no-state"])
                .unwrap();
        let Mode::Train(arg) = args.mode else {
            panic!("expected train");
        };
        assert_eq!(arg.rom.state_path(arg.game), None);
        assert_eq!(arg.rom.rom_path(arg.game), PathBuf::from("ROM/PokemonRed.gb"));
    }

    #[test]
    fn test_missing_rom_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let arg = RomArg {
            rom: Some(dir.path().join("Tetris.gb")),
            state: None,
            no_state: true,
        };
        let err = arg.resolve(Game::Tetris).unwrap_err();
        assert!(err.to_string().contains("ROM not found"));
    }
}
