//! Matching externally computed fitness values to genomes.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::genome::{Genome, GenomeKey};

/// Fitness of one candidate, as reported by whoever evaluated it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessResult {
    pub key: GenomeKey,
    pub fitness: f64,
}

/// What happened to a batch of results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignReport {
    pub assigned: usize,
    /// Results whose key is not in the population.
    pub unknown: Vec<GenomeKey>,
    /// Results for a key that already received one.
    pub duplicate: Vec<GenomeKey>,
    /// Genomes that received no result and keep fitness `0.0`.
    pub missing: Vec<GenomeKey>,
}

pub fn reset_fitness(population: &mut BTreeMap<GenomeKey, Genome>) {
    for genome in population.values_mut() {
        genome.fitness = 0.0;
    }
}

/// Stores each result's fitness on the genome with the same key.
///
/// The first result for a key wins.
pub fn assign_fitness<I>(population: &mut BTreeMap<GenomeKey, Genome>, results: I) -> AssignReport
where
    I: IntoIterator<Item = FitnessResult>,
{
    let mut report = AssignReport::default();
    let mut seen = HashSet::new();
    for result in results {
        let Some(genome) = population.get_mut(&result.key) else {
            tracing::warn!(key = result.key, "ignoring fitness result for unknown genome");
            report.unknown.push(result.key);
            continue;
        };
        if !seen.insert(result.key) {
            tracing::warn!(key = result.key, "ignoring duplicate fitness result");
            report.duplicate.push(result.key);
            continue;
        }
        genome.fitness = result.fitness;
        report.assigned += 1;
    }
    report.missing = population
        .keys()
        .copied()
        .filter(|k| !seen.contains(k))
        .collect();
    report
}
