//! NEAT hyperparameters.
//!
//! The configuration is one JSON document with five sections:
//!
//! ```json
//! {
//!   "neat": { "pop_size": 3, "fitness_threshold": 100000.0 },
//!   "genome": { "num_inputs": 4327, "num_outputs": 7 },
//!   "species_set": { "compatibility_threshold": 3.0 },
//!   "stagnation": { "max_stagnation": 20 },
//!   "reproduction": { "elitism": 2 }
//! }
//! ```
//!
//! Only `neat.pop_size`, `genome.num_inputs` and `genome.num_outputs` are required.
//! Every other key has a default, and unknown keys are rejected so that a typo never
//! silently falls back to a default.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    activation::{ActivationFunction, AggregationFunction},
    attribute::FloatAttributeConfig,
};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("failed to read NEAT config {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to parse NEAT config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("invalid NEAT config: {message}")]
    Invalid { message: String },
}

/// How the population's fitness values are reduced for the termination check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessCriterion {
    #[default]
    Max,
    Min,
    Mean,
}

impl FitnessCriterion {
    #[expect(clippy::cast_precision_loss)]
    pub fn reduce<I>(self, values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        let values = values.into_iter().collect::<Vec<_>>();
        if values.is_empty() {
            return None;
        }
        Some(match self {
            FitnessCriterion::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            FitnessCriterion::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            FitnessCriterion::Mean => values.iter().sum::<f64>() / values.len() as f64,
        })
    }
}

/// How a species' fitness is derived from its members'.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesFitnessFunction {
    #[default]
    Max,
    Min,
    Mean,
    Median,
}

impl SpeciesFitnessFunction {
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn apply(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            SpeciesFitnessFunction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            SpeciesFitnessFunction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            SpeciesFitnessFunction::Mean => values.iter().sum::<f64>() / values.len() as f64,
            SpeciesFitnessFunction::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                sorted[sorted.len() / 2]
            }
        }
    }
}

/// Initial wiring of a freshly created genome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialConnection {
    /// No connections at all.
    Unconnected,
    /// One random input connected to every hidden and output node.
    FsNeatNohidden,
    /// Every input to every hidden node, every hidden node to every output. Inputs
    /// reach outputs directly only when there are no hidden nodes.
    #[default]
    FullNohidden,
    /// Every input to every hidden and output node, hidden to outputs.
    FullDirect,
    /// Like `full_nohidden`, keeping each connection with `connection_fraction`.
    PartialNohidden,
    /// Like `full_direct`, keeping each connection with `connection_fraction`.
    PartialDirect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeatSection {
    pub pop_size: usize,
    #[serde(default)]
    pub fitness_criterion: FitnessCriterion,
    #[serde(default = "default_fitness_threshold")]
    pub fitness_threshold: f64,
    #[serde(default)]
    pub no_fitness_termination: bool,
    #[serde(default)]
    pub reset_on_extinction: bool,
}

fn default_fitness_threshold() -> f64 {
    f64::MAX
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenomeConfig {
    pub num_inputs: usize,
    pub num_outputs: usize,
    #[serde(default)]
    pub num_hidden: usize,
    #[serde(default = "default_true")]
    pub feed_forward: bool,
    #[serde(default)]
    pub initial_connection: InitialConnection,
    #[serde(default = "default_connection_fraction")]
    pub connection_fraction: f64,

    #[serde(default = "default_disjoint_coefficient")]
    pub compatibility_disjoint_coefficient: f64,
    #[serde(default = "default_weight_coefficient")]
    pub compatibility_weight_coefficient: f64,

    #[serde(default = "default_structural_prob")]
    pub conn_add_prob: f64,
    #[serde(default = "default_structural_prob")]
    pub conn_delete_prob: f64,
    #[serde(default = "default_node_prob")]
    pub node_add_prob: f64,
    #[serde(default = "default_node_prob")]
    pub node_delete_prob: f64,
    /// Apply at most one structural mutation per call.
    #[serde(default)]
    pub single_structural_mutation: bool,
    /// Re-enable an existing connection instead of skipping when the chosen pair is
    /// already connected, and add a connection when splitting an empty genome.
    #[serde(default)]
    pub structural_mutation_surer: bool,

    #[serde(default = "default_true")]
    pub enabled_default: bool,
    #[serde(default = "default_enabled_mutate_rate")]
    pub enabled_mutate_rate: f64,

    #[serde(default = "default_activation")]
    pub activation_default: ActivationFunction,
    #[serde(default)]
    pub activation_mutate_rate: f64,
    #[serde(default = "default_activation_options")]
    pub activation_options: Vec<ActivationFunction>,

    #[serde(default = "default_aggregation")]
    pub aggregation_default: AggregationFunction,
    #[serde(default)]
    pub aggregation_mutate_rate: f64,
    #[serde(default = "default_aggregation_options")]
    pub aggregation_options: Vec<AggregationFunction>,

    #[serde(default)]
    pub bias: FloatAttributeConfig,
    #[serde(default = "default_response")]
    pub response: FloatAttributeConfig,
    #[serde(default)]
    pub weight: FloatAttributeConfig,
}

fn default_true() -> bool {
    true
}

fn default_connection_fraction() -> f64 {
    0.5
}

fn default_disjoint_coefficient() -> f64 {
    1.0
}

fn default_weight_coefficient() -> f64 {
    0.5
}

fn default_structural_prob() -> f64 {
    0.5
}

fn default_node_prob() -> f64 {
    0.2
}

fn default_enabled_mutate_rate() -> f64 {
    0.01
}

fn default_activation() -> ActivationFunction {
    ActivationFunction::Sigmoid
}

fn default_activation_options() -> Vec<ActivationFunction> {
    vec![ActivationFunction::Sigmoid]
}

fn default_aggregation() -> AggregationFunction {
    AggregationFunction::Sum
}

fn default_aggregation_options() -> Vec<AggregationFunction> {
    vec![AggregationFunction::Sum]
}

fn default_response() -> FloatAttributeConfig {
    FloatAttributeConfig::fixed(1.0)
}

impl GenomeConfig {
    /// Creates a config with the given dimensions and default everything else.
    #[must_use]
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
            num_hidden: 0,
            feed_forward: true,
            initial_connection: InitialConnection::default(),
            connection_fraction: default_connection_fraction(),
            compatibility_disjoint_coefficient: default_disjoint_coefficient(),
            compatibility_weight_coefficient: default_weight_coefficient(),
            conn_add_prob: default_structural_prob(),
            conn_delete_prob: default_structural_prob(),
            node_add_prob: default_node_prob(),
            node_delete_prob: default_node_prob(),
            single_structural_mutation: false,
            structural_mutation_surer: false,
            enabled_default: true,
            enabled_mutate_rate: default_enabled_mutate_rate(),
            activation_default: default_activation(),
            activation_mutate_rate: 0.0,
            activation_options: default_activation_options(),
            aggregation_default: default_aggregation(),
            aggregation_mutate_rate: 0.0,
            aggregation_options: default_aggregation_options(),
            bias: FloatAttributeConfig::default(),
            response: default_response(),
            weight: FloatAttributeConfig::default(),
        }
    }

    /// Input node keys, `-1..=-num_inputs`.
    pub fn input_keys(&self) -> impl Iterator<Item = i64> + '_ {
        (1..=to_key(self.num_inputs)).map(|k| -k)
    }

    /// Output node keys, `0..num_outputs`.
    pub fn output_keys(&self) -> impl Iterator<Item = i64> + '_ {
        0..to_key(self.num_outputs)
    }

    #[must_use]
    pub fn is_output(&self, key: i64) -> bool {
        (0..to_key(self.num_outputs)).contains(&key)
    }
}

pub(crate) fn to_key(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeciesSetConfig {
    pub compatibility_threshold: f64,
}

impl Default for SpeciesSetConfig {
    fn default() -> Self {
        Self {
            compatibility_threshold: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StagnationConfig {
    pub species_fitness_func: SpeciesFitnessFunction,
    /// Generations without improvement after which a species is stagnant.
    pub max_stagnation: usize,
    /// Number of best species protected from stagnation.
    pub species_elitism: usize,
}

impl Default for StagnationConfig {
    fn default() -> Self {
        Self {
            species_fitness_func: SpeciesFitnessFunction::Max,
            max_stagnation: 15,
            species_elitism: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReproductionConfig {
    /// Best members of each species copied unchanged into the next generation.
    pub elitism: usize,
    /// Fraction of each species allowed to reproduce.
    pub survival_threshold: f64,
    pub min_species_size: usize,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            elitism: 0,
            survival_threshold: 0.2,
            min_species_size: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeatConfig {
    pub neat: NeatSection,
    pub genome: GenomeConfig,
    #[serde(default)]
    pub species_set: SpeciesSetConfig,
    #[serde(default)]
    pub stagnation: StagnationConfig,
    #[serde(default)]
    pub reproduction: ReproductionConfig,
}

impl NeatConfig {
    /// Creates a config with default hyperparameters.
    #[must_use]
    pub fn new(pop_size: usize, num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            neat: NeatSection {
                pop_size,
                fitness_criterion: FitnessCriterion::default(),
                fitness_threshold: default_fitness_threshold(),
                no_fitness_termination: false,
                reset_on_extinction: false,
            },
            genome: GenomeConfig::new(num_inputs, num_outputs),
            species_set: SpeciesSetConfig::default(),
            stagnation: StagnationConfig::default(),
            reproduction: ReproductionConfig::default(),
        }
    }

    pub fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid { message };
        if self.neat.pop_size == 0 {
            return Err(invalid("neat.pop_size must be positive".to_owned()));
        }
        if self.genome.num_outputs == 0 {
            return Err(invalid("genome.num_outputs must be positive".to_owned()));
        }
        if self.genome.activation_options.is_empty() {
            return Err(invalid("genome.activation_options is empty".to_owned()));
        }
        if self.genome.aggregation_options.is_empty() {
            return Err(invalid("genome.aggregation_options is empty".to_owned()));
        }
        if !(0.0..=1.0).contains(&self.genome.connection_fraction) {
            return Err(invalid(
                "genome.connection_fraction must be within [0, 1]".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.reproduction.survival_threshold) {
            return Err(invalid(
                "reproduction.survival_threshold must be within [0, 1]".to_owned(),
            ));
        }
        for (name, attr) in [
            ("genome.bias", &self.genome.bias),
            ("genome.response", &self.genome.response),
            ("genome.weight", &self.genome.weight),
        ] {
            attr.validate(name).map_err(invalid)?;
        }
        Ok(())
    }
}
