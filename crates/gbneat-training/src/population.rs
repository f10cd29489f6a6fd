//! The generational run loop.

use std::{collections::BTreeMap, fmt};

use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::{
    checkpoint::{CheckpointError, Checkpointer},
    config::NeatConfig,
    genome::{Genome, GenomeKey},
    reporter::{Reporter, ReporterSet},
    reproduction::Reproduction,
    species::SpeciesSet,
};

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("fitness evaluation failed: {message}")]
pub struct EvaluationError {
    message: String,
}

impl EvaluationError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum RunError {
    #[display("all species went extinct")]
    CompleteExtinction,
    #[display("population is empty")]
    EmptyPopulation,
    #[display("{_0}")]
    Evaluation(EvaluationError),
    #[display("{_0}")]
    Checkpoint(CheckpointError),
}

/// Assigns a fitness to every genome of one generation.
pub trait GenomeEvaluator {
    fn evaluate(
        &mut self,
        genomes: &mut BTreeMap<GenomeKey, Genome>,
        config: &NeatConfig,
    ) -> Result<(), EvaluationError>;
}

impl<F> GenomeEvaluator for F
where
    F: FnMut(&mut BTreeMap<GenomeKey, Genome>, &NeatConfig) -> Result<(), EvaluationError>,
{
    fn evaluate(
        &mut self,
        genomes: &mut BTreeMap<GenomeKey, Genome>,
        config: &NeatConfig,
    ) -> Result<(), EvaluationError> {
        self(genomes, config)
    }
}

/// Everything needed to continue a run, as stored in checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationState {
    pub population: BTreeMap<GenomeKey, Genome>,
    pub species: SpeciesSet,
    /// Generation the population is about to be evaluated in.
    pub generation: usize,
    pub reproduction: Reproduction,
    pub best_genome: Option<Genome>,
    pub rng: Pcg32,
}

pub struct Population {
    config: NeatConfig,
    state: PopulationState,
    reporters: ReporterSet,
    checkpointer: Option<Checkpointer>,
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Population")
            .field("generation", &self.state.generation)
            .field("size", &self.state.population.len())
            .field("species", &self.state.species.len())
            .finish_non_exhaustive()
    }
}

impl Population {
    /// Creates and speciates a random initial population.
    #[must_use]
    pub fn new(config: NeatConfig, mut rng: Pcg32) -> Self {
        let mut reproduction = Reproduction::new();
        let population = reproduction.create_new(&config, config.neat.pop_size, &mut rng);
        let mut species = SpeciesSet::new();
        species.speciate(&config, &population, 0);
        Self::from_state(
            config,
            PopulationState {
                population,
                species,
                generation: 0,
                reproduction,
                best_genome: None,
                rng,
            },
        )
    }

    /// Resumes from a saved state.
    #[must_use]
    pub fn from_state(config: NeatConfig, state: PopulationState) -> Self {
        Self {
            config,
            state,
            reporters: ReporterSet::default(),
            checkpointer: None,
        }
    }

    pub fn add_reporter<R>(&mut self, reporter: R)
    where
        R: Reporter + 'static,
    {
        self.reporters.add(reporter);
    }

    pub fn set_checkpointer(&mut self, checkpointer: Checkpointer) {
        self.checkpointer = Some(checkpointer);
    }

    #[must_use]
    pub fn config(&self) -> &NeatConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &PopulationState {
        &self.state
    }

    #[must_use]
    pub fn generation(&self) -> usize {
        self.state.generation
    }

    /// Runs up to `generations` generations, or forever with `None`.
    ///
    /// Each generation is evaluated, checked against the fitness threshold, then
    /// reproduced and speciated. Returns the best genome seen during the run.
    pub fn run<E>(
        &mut self,
        evaluator: &mut E,
        generations: Option<usize>,
    ) -> Result<Genome, RunError>
    where
        E: GenomeEvaluator + ?Sized,
    {
        let config = &self.config;
        let state = &mut self.state;
        let reporters = &mut self.reporters;

        let mut k = 0;
        while generations.is_none_or(|n| k < n) {
            k += 1;
            reporters.start_generation(state.generation);

            evaluator.evaluate(&mut state.population, config)?;

            let best = state
                .population
                .values()
                .reduce(|best, g| if g.fitness > best.fitness { g } else { best })
                .ok_or(RunError::EmptyPopulation)?
                .clone();
            reporters.post_evaluate(config, &state.population, &state.species, &best);

            if state
                .best_genome
                .as_ref()
                .is_none_or(|b| best.fitness > b.fitness)
            {
                state.best_genome = Some(best.clone());
            }

            if !config.neat.no_fitness_termination {
                let value = config
                    .neat
                    .fitness_criterion
                    .reduce(state.population.values().map(|g| g.fitness));
                if value.is_some_and(|v| v >= config.neat.fitness_threshold) {
                    reporters.found_solution(config, state.generation, &best);
                    break;
                }
            }

            let mut population = state.reproduction.reproduce(
                config,
                &mut state.species,
                &state.population,
                config.neat.pop_size,
                state.generation,
                &mut *reporters,
                &mut state.rng,
            );

            if state.species.is_empty() {
                reporters.complete_extinction();
                if !config.neat.reset_on_extinction {
                    return Err(RunError::CompleteExtinction);
                }
                population =
                    state
                        .reproduction
                        .create_new(config, config.neat.pop_size, &mut state.rng);
            }

            state.population = population;
            state
                .species
                .speciate(config, &state.population, state.generation);
            reporters.end_generation(config, &state.population, &state.species);

            let finished = state.generation;
            state.generation += 1;
            if let Some(checkpointer) = &mut self.checkpointer {
                checkpointer.end_generation(finished, state)?;
            }
        }

        if config.neat.no_fitness_termination
            && let Some(best) = &state.best_genome
        {
            reporters.found_solution(config, state.generation, best);
        }

        state.best_genome.clone().ok_or(RunError::EmptyPopulation)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use rand::SeedableRng as _;

    use super::*;
    use crate::{checkpoint, reporter::StatisticsReporter};

    /// Fitness is the sum of connection weights, which NEAT can push upward.
    fn weight_sum(
        genomes: &mut BTreeMap<GenomeKey, Genome>,
        _config: &NeatConfig,
    ) -> Result<(), EvaluationError> {
        for genome in genomes.values_mut() {
            genome.fitness = genome.connections.values().map(|c| c.weight).sum();
        }
        Ok(())
    }

    fn config() -> NeatConfig {
        let mut config = NeatConfig::new(20, 3, 2);
        config.reproduction.elitism = 1;
        config
    }

    #[test]
    fn test_run_fixed_generations() {
        let mut population = Population::new(config(), Pcg32::seed_from_u64(1));
        let stats = Rc::new(RefCell::new(StatisticsReporter::new()));
        population.add_reporter(Rc::clone(&stats));

        let best = population.run(&mut weight_sum, Some(5)).unwrap();

        assert_eq!(population.generation(), 5);
        assert_eq!(stats.borrow().most_fit_genomes().len(), 5);
        let best_seen = stats.borrow().best_genome().map(|g| g.fitness);
        assert_eq!(Some(best.fitness), best_seen);
    }

    #[test]
    fn test_run_stops_at_fitness_threshold() {
        let mut config = config();
        config.neat.fitness_threshold = 1.0;
        let mut population = Population::new(config, Pcg32::seed_from_u64(2));
        let mut always_high =
            |genomes: &mut BTreeMap<GenomeKey, Genome>,
             _: &NeatConfig|
             -> Result<(), EvaluationError> {
            for g in genomes.values_mut() {
                g.fitness = 2.0;
            }
            Ok(())
        };

        let best = population.run(&mut always_high, Some(10)).unwrap();

        assert_eq!(best.fitness, 2.0);
        assert_eq!(population.generation(), 0);
    }

    #[test]
    fn test_evaluation_error_aborts_run() {
        let mut population = Population::new(config(), Pcg32::seed_from_u64(3));
        let mut failing =
            |_: &mut BTreeMap<GenomeKey, Genome>,
             _: &NeatConfig|
             -> Result<(), EvaluationError> { Err(EvaluationError::new("boom")) };
        let err = population.run(&mut failing, Some(1)).unwrap_err();
        assert!(matches!(err, RunError::Evaluation(_)));
    }

    #[test]
    fn test_resume_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("neat-checkpoint-").display().to_string();

        let mut population = Population::new(config(), Pcg32::seed_from_u64(4));
        population.set_checkpointer(Checkpointer::new(prefix.clone(), 2));
        population.run(&mut weight_sum, Some(4)).unwrap();

        // generations 1 and 3 are due with an interval of 2
        let path = dir.path().join("neat-checkpoint-1");
        let state = checkpoint::restore(&path).unwrap();
        assert_eq!(state.generation, 2);
        assert!(dir.path().join("neat-checkpoint-3").exists());

        let mut resumed = Population::from_state(config(), state);
        resumed.run(&mut weight_sum, Some(1)).unwrap();
        assert_eq!(resumed.generation(), 3);
    }
}
