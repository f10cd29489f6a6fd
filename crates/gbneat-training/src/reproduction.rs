//! Creation of new generations from the surviving species.
//!
//! Each non-stagnant species receives an offspring quota proportional to its
//! adjusted fitness: the mean member fitness rescaled against the whole
//! population's fitness range. Quotas move only halfway from the previous species
//! size toward the target, which damps oscillation between generations. Within a
//! species the elites are copied unchanged and the remaining offspring are bred
//! from the top `survival_threshold` fraction of members.

use std::collections::BTreeMap;

use rand::{Rng, seq::IndexedRandom as _};
use serde::{Deserialize, Serialize};

use crate::{
    config::NeatConfig,
    genome::{Genome, GenomeKey},
    reporter::Reporter,
    species::SpeciesSet,
    stagnation,
};

/// Genome key allocation and lineage tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reproduction {
    next_genome_key: GenomeKey,
    /// Parents of each genome. Genomes of the initial population have none.
    ancestors: BTreeMap<GenomeKey, Option<(GenomeKey, GenomeKey)>>,
}

impl Default for Reproduction {
    fn default() -> Self {
        Self::new()
    }
}

impl Reproduction {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_genome_key: 1,
            ancestors: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn parents(&self, key: GenomeKey) -> Option<(GenomeKey, GenomeKey)> {
        self.ancestors.get(&key).copied().flatten()
    }

    fn allocate_key(&mut self) -> GenomeKey {
        let key = self.next_genome_key;
        self.next_genome_key += 1;
        key
    }

    /// Creates `count` random genomes.
    pub fn create_new<R>(
        &mut self,
        config: &NeatConfig,
        count: usize,
        rng: &mut R,
    ) -> BTreeMap<GenomeKey, Genome>
    where
        R: Rng + ?Sized,
    {
        (0..count)
            .map(|_| {
                let key = self.allocate_key();
                self.ancestors.insert(key, None);
                (key, Genome::random(key, &config.genome, rng))
            })
            .collect()
    }

    /// Produces the next generation.
    ///
    /// Stagnant species are removed from `species_set`. Surviving species keep their
    /// representative and lose their members until the next speciation. Returns an
    /// empty population when every species is stagnant.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::too_many_arguments
    )]
    pub fn reproduce<R>(
        &mut self,
        config: &NeatConfig,
        species_set: &mut SpeciesSet,
        population: &BTreeMap<GenomeKey, Genome>,
        pop_size: usize,
        generation: usize,
        reporter: &mut dyn Reporter,
        rng: &mut R,
    ) -> BTreeMap<GenomeKey, Genome>
    where
        R: Rng + ?Sized,
    {
        let settings = &config.reproduction;

        let mut all_fitnesses = vec![];
        let mut remaining = vec![];
        for status in stagnation::update(config, species_set, population, generation) {
            let Some(species) = species_set.species.get(&status.species) else {
                continue;
            };
            if status.stagnant {
                reporter.species_stagnant(status.species, species);
            } else {
                all_fitnesses.extend(species.member_fitnesses(population));
                remaining.push(status.species);
            }
        }

        if remaining.is_empty() {
            species_set.species.clear();
            return BTreeMap::new();
        }

        let min_fitness = all_fitnesses.iter().copied().fold(f64::INFINITY, f64::min);
        let max_fitness = all_fitnesses
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let fitness_range = f64::max(1.0, max_fitness - min_fitness);

        let mut adjusted_fitnesses = vec![];
        let mut previous_sizes = vec![];
        for key in &remaining {
            let Some(species) = species_set.species.get_mut(key) else {
                continue;
            };
            let fitnesses = species.member_fitnesses(population);
            let mean = fitnesses.iter().sum::<f64>() / fitnesses.len().max(1) as f64;
            let adjusted = (mean - min_fitness) / fitness_range;
            species.adjusted_fitness = Some(adjusted);
            adjusted_fitnesses.push(adjusted);
            previous_sizes.push(species.members.len());
        }
        let average_adjusted =
            adjusted_fitnesses.iter().sum::<f64>() / adjusted_fitnesses.len() as f64;
        reporter.info(&format!("Average adjusted fitness: {average_adjusted:.3}"));

        let min_species_size = settings.min_species_size.max(settings.elitism);
        let spawn_amounts = compute_spawn(
            &adjusted_fitnesses,
            &previous_sizes,
            pop_size,
            min_species_size,
        );

        let mut survivors = BTreeMap::new();
        let mut next_population = BTreeMap::new();
        for (key, spawn) in remaining.into_iter().zip(spawn_amounts) {
            let Some(mut species) = species_set.species.remove(&key) else {
                continue;
            };
            let mut spawn = spawn.max(settings.elitism);

            let mut members = std::mem::take(&mut species.members)
                .into_iter()
                .filter_map(|k| population.get(&k))
                .collect::<Vec<_>>();
            members.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
            survivors.insert(key, species);

            for elite in members.iter().take(settings.elitism) {
                next_population.insert(elite.key, (*elite).clone());
                spawn = spawn.saturating_sub(1);
            }
            if spawn == 0 || members.is_empty() {
                continue;
            }

            let cutoff = (settings.survival_threshold * members.len() as f64).ceil() as usize;
            members.truncate(cutoff.max(2));

            for _ in 0..spawn {
                let (Some(parent1), Some(parent2)) = (members.choose(rng), members.choose(rng))
                else {
                    break;
                };
                let key = self.allocate_key();
                let mut child = Genome::crossover(key, parent1, parent2, rng);
                child.mutate(&config.genome, rng);
                self.ancestors.insert(key, Some((parent1.key, parent2.key)));
                next_population.insert(key, child);
            }
        }
        species_set.species = survivors;

        next_population
    }
}

/// Computes the number of offspring for each species.
///
/// Each species moves halfway from its previous size toward its fitness-proportional
/// share, by at least one genome. The amounts are then rescaled to `pop_size` and
/// never drop below `min_species_size`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn compute_spawn(
    adjusted_fitnesses: &[f64],
    previous_sizes: &[usize],
    pop_size: usize,
    min_species_size: usize,
) -> Vec<usize> {
    let af_sum = adjusted_fitnesses.iter().sum::<f64>();

    let spawn_amounts = adjusted_fitnesses
        .iter()
        .zip(previous_sizes)
        .map(|(&af, &ps)| {
            let target = if af_sum > 0.0 {
                f64::max(min_species_size as f64, af / af_sum * pop_size as f64)
            } else {
                min_species_size as f64
            };
            let d = (target - ps as f64) * 0.5;
            let c = d.round_ties_even() as i64;
            let mut spawn = ps as i64;
            if c != 0 {
                spawn += c;
            } else if d > 0.0 {
                spawn += 1;
            } else if d < 0.0 {
                spawn -= 1;
            }
            spawn
        })
        .collect::<Vec<_>>();

    let total = spawn_amounts.iter().sum::<i64>();
    let norm = if total > 0 {
        pop_size as f64 / total as f64
    } else {
        1.0
    };
    spawn_amounts
        .into_iter()
        .map(|n| {
            let scaled = (n as f64 * norm).round_ties_even().max(0.0) as usize;
            scaled.max(min_species_size)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;
    use crate::reporter::ReporterSet;

    #[test]
    fn test_compute_spawn_moves_halfway() {
        // targets are 7.5 and 2.5 from sizes 5 and 5
        let spawn = compute_spawn(&[0.75, 0.25], &[5, 5], 10, 1);
        assert_eq!(spawn, vec![6, 4]);
    }

    #[test]
    fn test_compute_spawn_respects_min_species_size() {
        let spawn = compute_spawn(&[1.0, 0.0], &[8, 2], 10, 2);
        // 9 and 2 rescaled from 11 down to 10
        assert_eq!(spawn, vec![8, 2]);
    }

    #[test]
    fn test_compute_spawn_without_fitness() {
        let spawn = compute_spawn(&[0.0, 0.0], &[4, 4], 8, 1);
        // both shrink toward one, then get rescaled back to the population size
        assert_eq!(spawn, vec![4, 4]);
    }

    #[test]
    fn test_create_new_assigns_sequential_keys() {
        let config = NeatConfig::new(4, 2, 1);
        let mut rng = Pcg32::seed_from_u64(0);
        let mut reproduction = Reproduction::new();

        let population = reproduction.create_new(&config, 4, &mut rng);

        assert_eq!(population.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(population.iter().all(|(k, g)| g.key == *k));
        assert_eq!(reproduction.parents(1), None);
    }

    #[test]
    fn test_reproduce_keeps_elites_and_population_size() {
        let mut config = NeatConfig::new(10, 3, 2);
        config.reproduction.elitism = 2;
        let mut rng = Pcg32::seed_from_u64(3);
        let mut reproduction = Reproduction::new();
        let mut population = reproduction.create_new(&config, 10, &mut rng);
        for (i, genome) in population.values_mut().enumerate() {
            genome.fitness = i as f64;
        }
        let mut species = SpeciesSet::new();
        species.speciate(&config, &population, 0);

        let mut reporters = ReporterSet::default();
        let next = reproduction.reproduce(
            &config,
            &mut species,
            &population,
            10,
            0,
            &mut reporters,
            &mut rng,
        );

        assert!(!next.is_empty());
        assert!(next.len() >= 10 - species.len() && next.len() <= 10 + species.len());
        // the fittest genome of each species is carried over unchanged
        assert_eq!(next.get(&10), population.get(&10));
        for (&key, genome) in &next {
            if key > 10 {
                let (p1, p2) = reproduction.parents(key).unwrap();
                assert!(population.contains_key(&p1) && population.contains_key(&p2));
                assert_eq!(genome.key, key);
            }
        }
        assert!(species.species.values().all(|s| s.members.is_empty()));
    }

    #[test]
    fn test_reproduce_returns_empty_when_all_stagnant() {
        let mut config = NeatConfig::new(4, 2, 1);
        config.stagnation.max_stagnation = 0;
        let mut rng = Pcg32::seed_from_u64(4);
        let mut reproduction = Reproduction::new();
        let population = reproduction.create_new(&config, 4, &mut rng);
        let mut species = SpeciesSet::new();
        species.speciate(&config, &population, 0);

        let next = reproduction.reproduce(
            &config,
            &mut species,
            &population,
            4,
            0,
            &mut ReporterSet::default(),
            &mut rng,
        );

        assert!(next.is_empty());
        assert!(species.is_empty());
    }
}
