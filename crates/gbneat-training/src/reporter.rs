//! Progress reporting hooks for the run loop.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    rc::Rc,
    time::{Duration, Instant},
};

use crate::{
    config::NeatConfig,
    genome::{Genome, GenomeKey},
    species::{Species, SpeciesKey, SpeciesSet},
    statistics::DescriptiveStats,
};

/// Observer of the run loop. Every hook defaults to doing nothing.
pub trait Reporter {
    fn start_generation(&mut self, _generation: usize) {}

    fn end_generation(
        &mut self,
        _config: &NeatConfig,
        _population: &BTreeMap<GenomeKey, Genome>,
        _species: &SpeciesSet,
    ) {
    }

    fn post_evaluate(
        &mut self,
        _config: &NeatConfig,
        _population: &BTreeMap<GenomeKey, Genome>,
        _species: &SpeciesSet,
        _best: &Genome,
    ) {
    }

    fn post_reproduction(
        &mut self,
        _config: &NeatConfig,
        _population: &BTreeMap<GenomeKey, Genome>,
        _species: &SpeciesSet,
    ) {
    }

    fn complete_extinction(&mut self) {}

    fn found_solution(&mut self, _config: &NeatConfig, _generation: usize, _best: &Genome) {}

    fn species_stagnant(&mut self, _key: SpeciesKey, _species: &Species) {}

    fn info(&mut self, _message: &str) {}
}

/// Shared reporters, so the caller can read statistics after the run.
impl<R> Reporter for Rc<RefCell<R>>
where
    R: Reporter + ?Sized,
{
    fn start_generation(&mut self, generation: usize) {
        self.borrow_mut().start_generation(generation);
    }

    fn end_generation(
        &mut self,
        config: &NeatConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        species: &SpeciesSet,
    ) {
        self.borrow_mut().end_generation(config, population, species);
    }

    fn post_evaluate(
        &mut self,
        config: &NeatConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        species: &SpeciesSet,
        best: &Genome,
    ) {
        self.borrow_mut()
            .post_evaluate(config, population, species, best);
    }

    fn post_reproduction(
        &mut self,
        config: &NeatConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        species: &SpeciesSet,
    ) {
        self.borrow_mut()
            .post_reproduction(config, population, species);
    }

    fn complete_extinction(&mut self) {
        self.borrow_mut().complete_extinction();
    }

    fn found_solution(&mut self, config: &NeatConfig, generation: usize, best: &Genome) {
        self.borrow_mut().found_solution(config, generation, best);
    }

    fn species_stagnant(&mut self, key: SpeciesKey, species: &Species) {
        self.borrow_mut().species_stagnant(key, species);
    }

    fn info(&mut self, message: &str) {
        self.borrow_mut().info(message);
    }
}

/// Fans every hook out to the registered reporters, in registration order.
#[derive(Default)]
pub struct ReporterSet {
    reporters: Vec<Box<dyn Reporter>>,
}

impl std::fmt::Debug for ReporterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReporterSet")
            .field("len", &self.reporters.len())
            .finish()
    }
}

impl ReporterSet {
    pub fn add<R>(&mut self, reporter: R)
    where
        R: Reporter + 'static,
    {
        self.reporters.push(Box::new(reporter));
    }
}

impl Reporter for ReporterSet {
    fn start_generation(&mut self, generation: usize) {
        for r in &mut self.reporters {
            r.start_generation(generation);
        }
    }

    fn end_generation(
        &mut self,
        config: &NeatConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        species: &SpeciesSet,
    ) {
        for r in &mut self.reporters {
            r.end_generation(config, population, species);
        }
    }

    fn post_evaluate(
        &mut self,
        config: &NeatConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        species: &SpeciesSet,
        best: &Genome,
    ) {
        for r in &mut self.reporters {
            r.post_evaluate(config, population, species, best);
        }
    }

    fn post_reproduction(
        &mut self,
        config: &NeatConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        species: &SpeciesSet,
    ) {
        for r in &mut self.reporters {
            r.post_reproduction(config, population, species);
        }
    }

    fn complete_extinction(&mut self) {
        for r in &mut self.reporters {
            r.complete_extinction();
        }
    }

    fn found_solution(&mut self, config: &NeatConfig, generation: usize, best: &Genome) {
        for r in &mut self.reporters {
            r.found_solution(config, generation, best);
        }
    }

    fn species_stagnant(&mut self, key: SpeciesKey, species: &Species) {
        for r in &mut self.reporters {
            r.species_stagnant(key, species);
        }
    }

    fn info(&mut self, message: &str) {
        for r in &mut self.reporters {
            r.info(message);
        }
    }
}

/// Prints a human-readable progress log to stderr.
#[derive(Debug)]
pub struct StdOutReporter {
    show_species_detail: bool,
    generation: usize,
    generation_start: Option<Instant>,
    generation_times: Vec<Duration>,
    extinctions: usize,
}

impl StdOutReporter {
    #[must_use]
    pub fn new(show_species_detail: bool) -> Self {
        Self {
            show_species_detail,
            generation: 0,
            generation_start: None,
            generation_times: vec![],
            extinctions: 0,
        }
    }
}

impl Reporter for StdOutReporter {
    fn start_generation(&mut self, generation: usize) {
        self.generation = generation;
        eprintln!("\n ****** Running generation {generation} ****** \n");
        self.generation_start = Some(Instant::now());
    }

    #[expect(clippy::cast_precision_loss)]
    fn end_generation(
        &mut self,
        _config: &NeatConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        species: &SpeciesSet,
    ) {
        eprintln!(
            "Population of {} members in {} species:",
            population.len(),
            species.len()
        );
        if self.show_species_detail {
            eprintln!("   ID   age  size   fitness   adj fit  stag");
            eprintln!("  ====  ===  ====  =========  =======  ====");
            for (key, s) in &species.species {
                let age = self.generation.saturating_sub(s.created);
                let stagnation = self.generation.saturating_sub(s.last_improved);
                let fitness = s.fitness.map_or("--".to_owned(), |f| format!("{f:.3}"));
                let adjusted = s
                    .adjusted_fitness
                    .map_or("--".to_owned(), |f| format!("{f:.3}"));
                eprintln!(
                    "  {key:>4}  {age:>3}  {:>4}  {fitness:>9}  {adjusted:>7}  {stagnation:>4}",
                    s.members.len()
                );
            }
        }
        eprintln!("Total extinctions: {}", self.extinctions);

        if let Some(start) = self.generation_start.take() {
            let elapsed = start.elapsed();
            self.generation_times.push(elapsed);
            let recent = &self.generation_times[self.generation_times.len().saturating_sub(10)..];
            let average = recent.iter().sum::<Duration>().as_secs_f64() / recent.len() as f64;
            if self.generation_times.len() > 1 {
                eprintln!(
                    "Generation time: {:.3} sec ({average:.3} average)",
                    elapsed.as_secs_f64()
                );
            } else {
                eprintln!("Generation time: {:.3} sec", elapsed.as_secs_f64());
            }
        }
    }

    fn post_evaluate(
        &mut self,
        _config: &NeatConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        species: &SpeciesSet,
        best: &Genome,
    ) {
        if let Some(stats) = DescriptiveStats::new(population.values().map(|g| g.fitness)) {
            eprintln!(
                "Population's average fitness: {:.5} stdev: {:.5}",
                stats.mean, stats.std_dev
            );
        }
        let (nodes, connections) = best.size();
        let species_key = species
            .species_of(best.key)
            .map_or("--".to_owned(), |k| k.to_string());
        eprintln!(
            "Best fitness: {:.5} - size: ({nodes}, {connections}) - species {species_key} - id {}",
            best.fitness, best.key
        );
    }

    fn complete_extinction(&mut self) {
        self.extinctions += 1;
        eprintln!("All species extinct.");
    }

    fn found_solution(&mut self, _config: &NeatConfig, generation: usize, best: &Genome) {
        let (nodes, connections) = best.size();
        eprintln!(
            "\nBest individual in generation {generation} meets fitness threshold - complexity: ({nodes}, {connections})"
        );
    }

    fn species_stagnant(&mut self, key: SpeciesKey, species: &Species) {
        if self.show_species_detail {
            eprintln!(
                "\nSpecies {key} with {} members is stagnated: removing it",
                species.members.len()
            );
        }
    }

    fn info(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// Records the best genome and fitness distribution of every generation.
#[derive(Debug, Clone, Default)]
pub struct StatisticsReporter {
    most_fit_genomes: Vec<Genome>,
    generation_fitness: Vec<Vec<f64>>,
}

impl StatisticsReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Best genome of each generation, oldest first.
    #[must_use]
    pub fn most_fit_genomes(&self) -> &[Genome] {
        &self.most_fit_genomes
    }

    /// Best genome seen in any generation.
    #[must_use]
    pub fn best_genome(&self) -> Option<&Genome> {
        self.most_fit_genomes
            .iter()
            .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
    }

    #[must_use]
    pub fn fitness_stats(&self) -> Vec<DescriptiveStats> {
        self.generation_fitness
            .iter()
            .filter_map(|f| DescriptiveStats::new(f.iter().copied()))
            .collect()
    }

    #[must_use]
    pub fn fitness_mean(&self) -> Vec<f64> {
        self.fitness_stats().iter().map(|s| s.mean).collect()
    }

    #[must_use]
    pub fn fitness_stdev(&self) -> Vec<f64> {
        self.fitness_stats().iter().map(|s| s.std_dev).collect()
    }
}

impl Reporter for StatisticsReporter {
    fn post_evaluate(
        &mut self,
        _config: &NeatConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        _species: &SpeciesSet,
        best: &Genome,
    ) {
        self.most_fit_genomes.push(best.clone());
        self.generation_fitness
            .push(population.values().map(|g| g.fitness).collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn population(fitnesses: &[f64]) -> BTreeMap<GenomeKey, Genome> {
        fitnesses
            .iter()
            .enumerate()
            .map(|(i, &f)| {
                let key = i as GenomeKey;
                let mut g = Genome::new(key);
                g.fitness = f;
                (key, g)
            })
            .collect()
    }

    #[test]
    fn test_statistics_reporter_tracks_generations() {
        let config = NeatConfig::new(3, 1, 1);
        let species = SpeciesSet::new();
        let mut stats = StatisticsReporter::new();

        let first = population(&[1.0, 2.0, 3.0]);
        stats.post_evaluate(&config, &first, &species, &first[&2]);
        let second = population(&[0.0, 0.0, 6.0]);
        stats.post_evaluate(&config, &second, &species, &second[&2]);

        assert_eq!(stats.most_fit_genomes().len(), 2);
        assert_eq!(stats.fitness_mean(), vec![2.0, 2.0]);
        assert_eq!(stats.best_genome().map(|g| g.fitness), Some(6.0));
        assert!(stats.fitness_stdev()[1] > stats.fitness_stdev()[0]);
    }

    #[test]
    fn test_shared_reporter_receives_hooks() {
        let config = NeatConfig::new(1, 1, 1);
        let stats = Rc::new(RefCell::new(StatisticsReporter::new()));
        let mut set = ReporterSet::default();
        set.add(Rc::clone(&stats));

        let pop = population(&[4.0]);
        set.post_evaluate(&config, &pop, &SpeciesSet::new(), &pop[&0]);

        assert_eq!(stats.borrow().most_fit_genomes().len(), 1);
    }
}
