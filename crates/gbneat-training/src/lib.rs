//! NeuroEvolution of Augmenting Topologies (NEAT).
//!
//! This crate evolves the weights *and* the wiring of small neural networks. A
//! population of genomes is evaluated by an external fitness function, grouped into
//! species by genetic distance, and bred into the next generation. Species protect
//! new structural innovations from competing directly with mature networks.
//!
//! # How Training Works
//!
//! 1. **Population** - Create random genomes (inputs wired to outputs, no hidden nodes)
//! 2. **Evaluation** - A [`GenomeEvaluator`](population::GenomeEvaluator) assigns every genome a fitness
//! 3. **Termination** - Stop when the fitness criterion reaches the threshold
//! 4. **Stagnation** - Drop species whose fitness has not improved for too long
//! 5. **Reproduction** - Split the offspring quota among species by adjusted fitness,
//!    keep the elites, breed the rest by crossover and mutation
//! 6. **Speciation** - Regroup the new population around the species representatives
//!
//! # Architecture
//!
//! ```text
//! Population::run
//!     ↓ evaluates via
//! GenomeEvaluator (caller-supplied fitness)
//!     ↓ then
//! Reproduction (stagnation, spawn quotas, crossover, mutation)
//!     ↓ then
//! SpeciesSet::speciate
//!     ↓ observed by
//! Reporters, Checkpointer
//! ```
//!
//! - [`config`] - [`NeatConfig`](config::NeatConfig), the JSON hyperparameter document
//! - [`genome`] - node and connection genes, mutation, crossover, distance
//! - [`network`] - [`FeedForwardNetwork`](network::FeedForwardNetwork) compiled from a genome
//! - [`species`], [`stagnation`], [`reproduction`] - the generational operators
//! - [`population`] - the run loop and its resumable state
//! - [`reporter`], [`checkpoint`] - progress output and snapshots
//! - [`fitness`] - [`FitnessResult`](fitness::FitnessResult) and matching results to genomes
//!
//! # Node keys
//!
//! Input nodes use keys `-1, -2, ..., -num_inputs` and exist only implicitly. Output
//! nodes use `0..num_outputs`. Hidden nodes created by mutation take the next key
//! above the genome's current maximum. A connection is identified by its
//! `(from, to)` node pair, so identical structure in two genomes lines up during
//! crossover and distance computation.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use gbneat_training::{
//!     config::NeatConfig,
//!     genome::{Genome, GenomeKey},
//!     network::FeedForwardNetwork,
//!     population::{EvaluationError, Population},
//! };
//! use rand::SeedableRng as _;
//! use rand_pcg::Pcg32;
//!
//! let config = NeatConfig::new(10, 2, 1);
//! let mut population = Population::new(config, Pcg32::seed_from_u64(0));
//!
//! let mut evaluate = |genomes: &mut BTreeMap<GenomeKey, Genome>,
//!                     config: &NeatConfig|
//!  -> Result<(), EvaluationError> {
//!     for genome in genomes.values_mut() {
//!         let mut net = FeedForwardNetwork::create(genome, &config.genome);
//!         let out = net.activate(&[1.0, 0.0]).map_err(EvaluationError::new)?;
//!         genome.fitness = out[0];
//!     }
//!     Ok(())
//! };
//!
//! let best = population.run(&mut evaluate, Some(3)).unwrap();
//! assert!((0.0..=1.0).contains(&best.fitness));
//! ```

pub mod activation;
pub mod attribute;
pub mod checkpoint;
pub mod config;
pub mod fitness;
pub mod genome;
pub mod graph;
pub mod network;
pub mod population;
pub mod reporter;
pub mod reproduction;
pub mod species;
pub mod stagnation;
pub mod statistics;
