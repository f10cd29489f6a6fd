use std::path::{Path, PathBuf};

use anyhow::Context as _;
use gbneat_engine::read_save_state;
use gbneat_evaluator::{
    action,
    episode::{ControllerError, EpisodeConfig, EpisodeOutcome},
    game::Game,
};
use gbneat_training::{fitness::FitnessResult, genome::GenomeKey, network::FeedForwardNetwork};
use rand::SeedableRng as _;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::emulator;

/// One candidate's episode, sent to a worker process on stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeJob {
    pub key: GenomeKey,
    pub game: Game,
    pub rom: PathBuf,
    pub state: Option<PathBuf>,
    pub episode: EpisodeConfig,
    pub network: FeedForwardNetwork,
    /// Where to write the action log of a candidate that scores above the threshold.
    pub action_log_dir: Option<PathBuf>,
    /// Seeds the initial recent-action history.
    pub seed: u64,
}

impl EpisodeJob {
    /// Plays the episode in this process.
    pub fn execute(self) -> anyhow::Result<FitnessResult> {
        let Self {
            key,
            game,
            rom,
            state,
            episode,
            network,
            action_log_dir,
            seed,
        } = self;

        let outcome = play(game, &rom, state.as_deref(), episode, network, seed)
            .with_context(|| format!("Episode of genome {key} failed"))?;
        Ok(finish(key, &outcome, action_log_dir.as_deref()))
    }
}

/// Turns a finished episode into the worker's result, writing the action log when
/// the candidate scored above the threshold. A failed log write is only reported.
fn finish(
    key: GenomeKey,
    outcome: &EpisodeOutcome,
    action_log_dir: Option<&Path>,
) -> FitnessResult {
    tracing::debug!(
        key,
        fitness = outcome.fitness,
        steps = outcome.steps,
        reason = %outcome.reason,
        "episode finished"
    );

    if let Some(dir) = action_log_dir
        && action::should_write_action_log(outcome.fitness)
    {
        match action::write_action_log(dir, key, &outcome.actions) {
            Ok(path) => tracing::info!(key, path = %path.display(), "wrote action log"),
            Err(e) => tracing::warn!(
                key,
                dir = %dir.display(),
                error = %e,
                "failed to write action log"
            ),
        }
    }

    FitnessResult {
        key,
        fitness: outcome.fitness,
    }
}

/// Runs one episode of `network` on a fresh emulator.
pub fn play(
    game: Game,
    rom: &Path,
    state: Option<&Path>,
    episode: EpisodeConfig,
    mut network: FeedForwardNetwork,
    seed: u64,
) -> anyhow::Result<EpisodeOutcome> {
    let save_state = state
        .map(|path| {
            read_save_state(path)
                .with_context(|| format!("Failed to read save state {}", path.display()))
        })
        .transpose()?;
    let emulator = emulator::open(rom)?;
    let controller = move |inputs: &[f64]| network.activate(inputs).map_err(ControllerError::new);
    let mut rng = Pcg32::seed_from_u64(seed);
    let outcome = game.run_episode(emulator, controller, episode, save_state.as_deref(), &mut rng)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use gbneat_engine::Button;
    use gbneat_evaluator::{action::Action, episode::TerminalReason};
    use gbneat_training::{config::GenomeConfig, genome::Genome};
    use rand::SeedableRng as _;

    use super::*;

    #[test]
    fn test_job_wire_format() {
        let config = GenomeConfig::new(3, 2);
        let genome = Genome::random(7, &config, &mut Pcg32::seed_from_u64(0));
        let job = EpisodeJob {
            key: 7,
            game: Game::PokemonRed,
            rom: PathBuf::from("ROM/PokemonRed.gb"),
            state: None,
            episode: Game::PokemonRed.default_episode_config(),
            network: FeedForwardNetwork::create(&genome, &config),
            action_log_dir: Some(PathBuf::from("checkpoints")),
            seed: 42,
        };

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["key"], 7);
        assert_eq!(json["game"], "pokemon-red");
        assert_eq!(json["episode"]["wait_for_action"], 150);

        let decoded: EpisodeJob = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.key, job.key);
        assert_eq!(decoded.network.output_count(), 2);
    }

    fn outcome(fitness: f64) -> EpisodeOutcome {
        EpisodeOutcome {
            fitness,
            steps: 3,
            reason: TerminalReason::Stalled,
            actions: vec![Action::Press(Button::A), Action::Noop, Action::Noop],
        }
    }

    #[test]
    fn test_finish_writes_action_log_above_threshold() {
        let dir = tempfile::tempdir().unwrap();

        let result = finish(4, &outcome(12.0), Some(dir.path()));
        assert_eq!(result, FitnessResult { key: 4, fitness: 12.0 });
        assert!(dir.path().join("4_actions.txt").is_file());

        let result = finish(5, &outcome(1.0), Some(dir.path()));
        assert_eq!(result, FitnessResult { key: 5, fitness: 1.0 });
        assert!(!dir.path().join("5_actions.txt").exists());
    }

    #[test]
    fn test_unwritable_action_log_keeps_fitness() {
        // a regular file where the log directory should be
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let dir = blocker.path().join("checkpoints");

        let result = finish(8, &outcome(40.0), Some(&dir));

        assert_eq!(result, FitnessResult { key: 8, fitness: 40.0 });
        assert!(!dir.exists());
    }

    #[test]
    fn test_missing_save_state_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let config = GenomeConfig::new(1, 1);
        let genome = Genome::random(1, &config, &mut Pcg32::seed_from_u64(0));
        let err = play(
            Game::Tetris,
            &dir.path().join("Tetris.gb"),
            Some(&dir.path().join("missing.state")),
            EpisodeConfig::default(),
            FeedForwardNetwork::create(&genome, &config),
            0,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("missing.state"));
    }
}
