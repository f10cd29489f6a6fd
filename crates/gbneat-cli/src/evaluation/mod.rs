//! Generation evaluation in isolated worker processes.

use std::{collections::BTreeMap, path::PathBuf};

use gbneat_evaluator::{episode::EpisodeConfig, game::Game};
use gbneat_training::{
    config::NeatConfig,
    fitness,
    genome::{Genome, GenomeKey},
    network::FeedForwardNetwork,
    population::{EvaluationError, GenomeEvaluator},
};
use rand::Rng as _;
use rand_pcg::Pcg32;

pub use self::{
    job::{EpisodeJob, play},
    pool::WorkerPool,
};

mod job;
mod pool;

/// Settings shared by every job of a run.
#[derive(Debug, Clone)]
pub struct JobTemplate {
    pub game: Game,
    pub rom: PathBuf,
    pub state: Option<PathBuf>,
    pub episode: EpisodeConfig,
    pub action_log_dir: Option<PathBuf>,
}

impl JobTemplate {
    fn job(&self, key: GenomeKey, network: FeedForwardNetwork, seed: u64) -> EpisodeJob {
        EpisodeJob {
            key,
            game: self.game,
            rom: self.rom.clone(),
            state: self.state.clone(),
            episode: self.episode,
            network,
            action_log_dir: self.action_log_dir.clone(),
            seed,
        }
    }
}

/// Plays one episode per genome, each in its own worker process.
#[derive(Debug)]
pub struct GenerationEvaluator {
    pool: WorkerPool,
    template: JobTemplate,
    rng: Pcg32,
}

impl GenerationEvaluator {
    pub fn new(pool: WorkerPool, template: JobTemplate, rng: Pcg32) -> Self {
        Self {
            pool,
            template,
            rng,
        }
    }
}

impl GenomeEvaluator for GenerationEvaluator {
    fn evaluate(
        &mut self,
        genomes: &mut BTreeMap<GenomeKey, Genome>,
        config: &NeatConfig,
    ) -> Result<(), EvaluationError> {
        fitness::reset_fitness(genomes);

        let jobs = genomes
            .values()
            .map(|genome| {
                let network = FeedForwardNetwork::create(genome, &config.genome);
                let job = self.template.job(genome.key, network, self.rng.random());
                (genome.key, job)
            })
            .collect::<Vec<_>>();
        let results = self.pool.run(jobs);

        let report = fitness::assign_fitness(genomes, results);
        if !report.missing.is_empty() {
            tracing::warn!(
                missing = ?report.missing,
                "candidates without a result keep fitness 0"
            );
        }
        tracing::debug!(
            assigned = report.assigned,
            total = genomes.len(),
            "generation evaluated"
        );
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use rand::SeedableRng as _;

    use super::*;

    fn template() -> JobTemplate {
        JobTemplate {
            game: Game::Tetris,
            rom: PathBuf::from("ROM/Tetris.gb"),
            state: None,
            episode: EpisodeConfig::default(),
            action_log_dir: None,
        }
    }

    #[test]
    fn test_results_are_matched_and_failures_keep_zero() {
        // genome 2's worker dies, every other worker scores 10 per key
        let script = r#"job=$(cat); key=$(printf '%s' "$job" | sed 's/^{"key":\([0-9]*\).*/\1/'); [ "$key" = 2 ] && kill -9 $$; printf '{"key":%s,"fitness":%s0.0}\n' "$key" "$key""#;
        let mut evaluator = GenerationEvaluator::new(
            WorkerPool::new("sh", ["-c", script]),
            template(),
            Pcg32::seed_from_u64(0),
        );
        let config = NeatConfig::new(3, 2, 1);
        let mut rng = Pcg32::seed_from_u64(1);
        let mut genomes = (1..=3)
            .map(|k| {
                let mut g = Genome::random(k, &config.genome, &mut rng);
                g.fitness = 99.0;
                (k, g)
            })
            .collect::<BTreeMap<_, _>>();

        evaluator.evaluate(&mut genomes, &config).unwrap();

        assert_eq!(genomes[&1].fitness, 10.0);
        assert_eq!(genomes[&2].fitness, 0.0);
        assert_eq!(genomes[&3].fitness, 30.0);
    }
}
