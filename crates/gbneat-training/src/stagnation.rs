//! Detection of species that stopped improving.

use std::collections::BTreeMap;

use crate::{
    config::NeatConfig,
    genome::{Genome, GenomeKey},
    species::{SpeciesKey, SpeciesSet},
};

/// Stagnation verdict for one species.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagnationStatus {
    pub species: SpeciesKey,
    pub fitness: f64,
    pub stagnant: bool,
}

/// Updates species fitness and history, then marks stagnant species.
///
/// A species improves when its fitness exceeds the best value in its history. The
/// result is ordered by ascending species fitness. The `species_elitism` best species
/// are never stagnant, and stagnation never reduces the number of surviving species
/// below `species_elitism`.
pub fn update(
    config: &NeatConfig,
    species_set: &mut SpeciesSet,
    population: &BTreeMap<GenomeKey, Genome>,
    generation: usize,
) -> Vec<StagnationStatus> {
    let stagnation = &config.stagnation;

    let mut data = vec![];
    for (&key, species) in &mut species_set.species {
        let previous_best = species
            .fitness_history
            .iter()
            .copied()
            .reduce(f64::max);
        let fitness = stagnation
            .species_fitness_func
            .apply(&species.member_fitnesses(population));
        species.fitness = Some(fitness);
        species.fitness_history.push(fitness);
        species.adjusted_fitness = None;
        if previous_best.is_none_or(|best| fitness > best) {
            species.last_improved = generation;
        }
        data.push((key, fitness, species.last_improved));
    }
    data.sort_by(|a, b| a.1.total_cmp(&b.1));

    let species_count = data.len();
    let mut non_stagnant = species_count;
    let mut result = Vec::with_capacity(species_count);
    for (idx, (key, fitness, last_improved)) in data.into_iter().enumerate() {
        let mut stagnant = false;
        if non_stagnant > stagnation.species_elitism {
            stagnant = generation.saturating_sub(last_improved) >= stagnation.max_stagnation;
        }
        if species_count - idx <= stagnation.species_elitism {
            stagnant = false;
        }
        if stagnant {
            non_stagnant -= 1;
        }
        result.push(StagnationStatus {
            species: key,
            fitness,
            stagnant,
        });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::Species;

    fn setup(fitnesses: &[f64]) -> (SpeciesSet, BTreeMap<GenomeKey, Genome>) {
        let mut set = SpeciesSet::new();
        let mut population = BTreeMap::new();
        for (i, &fitness) in fitnesses.iter().enumerate() {
            let key = i as GenomeKey;
            let mut genome = Genome::new(key);
            genome.fitness = fitness;
            let mut species = Species::new(key + 1, 0, genome.clone());
            species.members = vec![key];
            set.species.insert(key + 1, species);
            population.insert(key, genome);
        }
        (set, population)
    }

    #[test]
    fn test_improvement_resets_last_improved() {
        let config = NeatConfig::new(2, 1, 1);
        let (mut set, mut population) = setup(&[1.0]);
        update(&config, &mut set, &population, 0);

        population.get_mut(&0).unwrap().fitness = 0.5;
        update(&config, &mut set, &population, 3);
        assert_eq!(set.species[&1].last_improved, 0);

        population.get_mut(&0).unwrap().fitness = 2.0;
        update(&config, &mut set, &population, 4);
        assert_eq!(set.species[&1].last_improved, 4);
        assert_eq!(set.species[&1].fitness_history, vec![1.0, 0.5, 2.0]);
        assert_eq!(set.species[&1].fitness, Some(2.0));
    }

    #[test]
    fn test_stagnant_after_max_stagnation() {
        let mut config = NeatConfig::new(2, 1, 1);
        config.stagnation.max_stagnation = 2;
        let (mut set, population) = setup(&[1.0, 3.0]);
        update(&config, &mut set, &population, 0);
        update(&config, &mut set, &population, 1);
        let result = update(&config, &mut set, &population, 2);

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|s| s.stagnant));
        // ascending fitness order
        assert_eq!(result[0].species, 1);
        assert_eq!(result[1].species, 2);
    }

    #[test]
    fn test_species_elitism_protects_best() {
        let mut config = NeatConfig::new(3, 1, 1);
        config.stagnation.max_stagnation = 1;
        config.stagnation.species_elitism = 1;
        let (mut set, population) = setup(&[5.0, 1.0, 3.0]);
        update(&config, &mut set, &population, 0);
        let result = update(&config, &mut set, &population, 1);

        let stagnant = result
            .iter()
            .map(|s| (s.species, s.stagnant))
            .collect::<Vec<_>>();
        assert_eq!(stagnant, vec![(2, true), (3, true), (1, false)]);
    }
}
