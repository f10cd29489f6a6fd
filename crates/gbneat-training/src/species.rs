//! Speciation: grouping genomes by genetic distance.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    config::NeatConfig,
    genome::{Genome, GenomeKey},
};

pub type SpeciesKey = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub key: SpeciesKey,
    /// Generation in which the species appeared.
    pub created: usize,
    pub last_improved: usize,
    pub representative: Genome,
    pub members: Vec<GenomeKey>,
    pub fitness: Option<f64>,
    pub adjusted_fitness: Option<f64>,
    pub fitness_history: Vec<f64>,
}

impl Species {
    #[must_use]
    pub fn new(key: SpeciesKey, generation: usize, representative: Genome) -> Self {
        Self {
            key,
            created: generation,
            last_improved: generation,
            representative,
            members: vec![],
            fitness: None,
            adjusted_fitness: None,
            fitness_history: vec![],
        }
    }

    /// Fitness of each member present in `population`.
    #[must_use]
    pub fn member_fitnesses(&self, population: &BTreeMap<GenomeKey, Genome>) -> Vec<f64> {
        self.members
            .iter()
            .filter_map(|k| population.get(k))
            .map(|g| g.fitness)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeciesSet {
    pub species: BTreeMap<SpeciesKey, Species>,
    genome_to_species: HashMap<GenomeKey, SpeciesKey>,
    next_key: SpeciesKey,
}

impl SpeciesSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_key: 1,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn species_of(&self, genome: GenomeKey) -> Option<SpeciesKey> {
        self.genome_to_species.get(&genome).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.species.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Partitions `population` into species.
    ///
    /// Each existing species first claims the genome closest to its old
    /// representative as the new representative. Remaining genomes join the species
    /// with the closest representative below the compatibility threshold, or found a
    /// new species. Species that claim no genome disappear.
    pub fn speciate(
        &mut self,
        config: &NeatConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        generation: usize,
    ) {
        let threshold = config.species_set.compatibility_threshold;
        let genome_config = &config.genome;
        let mut distances = DistanceCache::default();

        let mut unspeciated = population.keys().copied().collect::<BTreeSet<_>>();
        let mut representatives = BTreeMap::<SpeciesKey, GenomeKey>::new();
        let mut members = BTreeMap::<SpeciesKey, Vec<GenomeKey>>::new();

        for (&sid, species) in &self.species {
            let closest = unspeciated
                .iter()
                .map(|&gid| {
                    let d = species.representative.distance(&population[&gid], genome_config);
                    (d, gid)
                })
                .min_by(|a, b| a.0.total_cmp(&b.0));
            let Some((_, gid)) = closest else {
                break;
            };
            representatives.insert(sid, gid);
            members.insert(sid, vec![gid]);
            unspeciated.remove(&gid);
        }

        while let Some(gid) = unspeciated.pop_first() {
            let genome = &population[&gid];
            let best = representatives
                .iter()
                .map(|(&sid, &rid)| {
                    let d = distances.get(&population[&rid], genome, config);
                    (d, sid)
                })
                .filter(|&(d, _)| d < threshold)
                .min_by(|a, b| a.0.total_cmp(&b.0));
            if let Some((_, sid)) = best {
                members.entry(sid).or_default().push(gid);
            } else {
                let sid = self.next_key;
                self.next_key += 1;
                representatives.insert(sid, gid);
                members.insert(sid, vec![gid]);
            }
        }

        self.genome_to_species.clear();
        let mut species = BTreeMap::new();
        for (sid, rid) in representatives {
            let mut s = self
                .species
                .remove(&sid)
                .unwrap_or_else(|| Species::new(sid, generation, population[&rid].clone()));
            s.representative = population[&rid].clone();
            s.members = members.remove(&sid).unwrap_or_default();
            for &gid in &s.members {
                self.genome_to_species.insert(gid, sid);
            }
            species.insert(sid, s);
        }
        self.species = species;

        tracing::debug!(
            species = self.species.len(),
            mean_distance = distances.mean(),
            "speciated population"
        );
    }
}

/// Memoizes pairwise distances, which are symmetric.
#[derive(Debug, Default)]
struct DistanceCache {
    distances: HashMap<(GenomeKey, GenomeKey), f64>,
}

impl DistanceCache {
    fn get(&mut self, a: &Genome, b: &Genome, config: &NeatConfig) -> f64 {
        let key = (a.key.min(b.key), a.key.max(b.key));
        *self
            .distances
            .entry(key)
            .or_insert_with(|| a.distance(b, &config.genome))
    }

    #[expect(clippy::cast_precision_loss)]
    fn mean(&self) -> f64 {
        if self.distances.is_empty() {
            return 0.0;
        }
        self.distances.values().sum::<f64>() / self.distances.len() as f64
    }
}
