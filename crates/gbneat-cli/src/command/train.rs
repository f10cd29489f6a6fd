use std::{cell::RefCell, fs, path::PathBuf, rc::Rc};

use anyhow::Context as _;
use chrono::Utc;
use gbneat_evaluator::game::Game;
use gbneat_training::{
    checkpoint::{self, Checkpointer},
    config::NeatConfig,
    population::Population,
    reporter::{StatisticsReporter, StdOutReporter},
};
use rand::SeedableRng as _;
use rand_pcg::Pcg32;

use super::{EpisodeArg, RomArg};
use crate::{
    emulator,
    evaluation::{GenerationEvaluator, JobTemplate, WorkerPool},
    model::winner::WinnerModel,
    util::Output,
};

#[derive(Debug, Clone, clap::Args)]
pub(super) struct TrainArg {
    /// Game to train on
    #[arg(long, default_value = "tetris")]
    pub(super) game: Game,
    #[command(flatten)]
    pub(super) rom: RomArg,
    /// Override `neat.pop_size` from the config
    #[arg(long)]
    pub(super) population_size: Option<usize>,
    /// Number of generations to run
    #[arg(long, default_value_t = 20)]
    pub(super) generations: usize,
    /// NEAT config file
    #[arg(long, default_value = "config-neat.json")]
    pub(super) config: PathBuf,
    /// Continue from the checkpoint written after this generation
    #[arg(long, value_name = "GENERATION")]
    pub(super) resume: Option<usize>,
    #[arg(long, default_value = Checkpointer::DEFAULT_PREFIX)]
    pub(super) checkpoint_prefix: String,
    #[arg(long, default_value_t = Checkpointer::DEFAULT_INTERVAL)]
    pub(super) checkpoint_interval: usize,
    /// Directory for action logs of candidates that scored
    #[arg(long, default_value = "checkpoints")]
    pub(super) action_log_dir: PathBuf,
    /// Winner model output path (stdout if omitted)
    #[arg(long)]
    pub(super) output: Option<PathBuf>,
    /// Random seed (random if omitted)
    #[arg(long)]
    pub(super) seed: Option<u64>,
    #[command(flatten)]
    pub(super) episode: EpisodeArg,
}

pub(super) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    let game = arg.game;
    let mut config = NeatConfig::from_file(&arg.config)
        .with_context(|| format!("Failed to load NEAT config {}", arg.config.display()))?;
    if let Some(pop_size) = arg.population_size {
        config.neat.pop_size = pop_size;
        config.validate()?;
    }

    let (rom, state) = arg.rom.resolve(game)?;
    let episode = arg.episode.resolve(game);
    check_dimensions(&config, game, episode.history_len)?;
    emulator::ensure_backend()?;

    let seed = arg.seed.unwrap_or_else(rand::random);
    let mut population = match arg.resume {
        Some(generation) => {
            let path = Checkpointer::new(&arg.checkpoint_prefix, 1).path_for(generation);
            let state = checkpoint::restore(&path)?;
            eprintln!("Resuming from {} at generation {}", path.display(), state.generation);
            Population::from_state(config, state)
        }
        None => {
            eprintln!("Starting a new run with seed {seed}");
            Population::new(config, Pcg32::seed_from_u64(seed))
        }
    };
    population.add_reporter(StdOutReporter::new(true));
    let stats = Rc::new(RefCell::new(StatisticsReporter::new()));
    population.add_reporter(Rc::clone(&stats));
    population.set_checkpointer(Checkpointer::new(
        &arg.checkpoint_prefix,
        arg.checkpoint_interval,
    ));

    fs::create_dir_all(&arg.action_log_dir).with_context(|| {
        format!(
            "Failed to create action log directory {}",
            arg.action_log_dir.display()
        )
    })?;
    let template = JobTemplate {
        game,
        rom,
        state,
        episode,
        action_log_dir: Some(arg.action_log_dir.clone()),
    };
    let mut evaluator =
        GenerationEvaluator::new(WorkerPool::current_exe()?, template, Pcg32::new(seed, 1));

    let winner = population.run(&mut evaluator, Some(arg.generations))?;

    eprintln!("\nBest genome:\n{winner}");
    let stats = stats.borrow();
    if let Some(last) = stats.fitness_stats().last() {
        eprintln!(
            "Last generation fitness: mean {:.3}, stdev {:.3}",
            last.mean, last.std_dev
        );
    }
    eprintln!("Best fitness per generation:");
    for (i, genome) in stats.most_fit_genomes().iter().enumerate() {
        eprintln!("  {i:3}: {:.3} (genome {})", genome.fitness, genome.key);
    }

    let model = WinnerModel {
        game,
        trained_at: Utc::now(),
        fitness: winner.fitness,
        genome: winner,
    };
    Output::save_json(&model, arg.output.clone())?;

    eprintln!();
    eprintln!("Model saved successfully");
    if let Some(path) = &arg.output {
        eprintln!("  Path: {}", path.display());
    }
    eprintln!("  Game: {}", model.game);
    eprintln!("  Trained at: {}", model.trained_at);
    eprintln!("  Fitness: {:.3}", model.fitness);

    Ok(())
}

/// Checks that the config's network shape fits the game's observation and actions.
fn check_dimensions(config: &NeatConfig, game: Game, history_len: usize) -> anyhow::Result<()> {
    let inputs = game.input_count(history_len);
    let outputs = game.output_count();
    anyhow::ensure!(
        config.genome.num_inputs == inputs,
        "config has {} inputs but {game} observations have {inputs}",
        config.genome.num_inputs
    );
    anyhow::ensure!(
        config.genome.num_outputs == outputs,
        "config has {} outputs but {game} has {outputs} actions",
        config.genome.num_outputs
    );
    Ok(())
}
