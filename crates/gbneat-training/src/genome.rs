//! Genomes: node and connection genes plus the operators that vary them.
//!
//! Node keys follow the usual NEAT numbering. Inputs are `-1..=-num_inputs`, outputs
//! are `0..num_outputs`, and hidden nodes take keys from `num_outputs` upwards.
//! Connection genes are keyed by their `(from, to)` node pair, which doubles as the
//! innovation identifier when aligning two genomes.

use std::{collections::BTreeMap, fmt};

use rand::{Rng, seq::IteratorRandom as _};
use serde::{Deserialize, Serialize};

use crate::{
    activation::{ActivationFunction, AggregationFunction},
    attribute::{mutate_bool, mutate_choice},
    config::{GenomeConfig, InitialConnection, to_key},
    graph,
};

/// Identifies a genome within a run.
pub type GenomeKey = u64;

/// Identifies a node within a genome.
pub type NodeKey = i64;

/// `(from, to)` node pair.
pub type ConnectionKey = (NodeKey, NodeKey);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGene {
    pub key: NodeKey,
    pub bias: f64,
    pub response: f64,
    pub activation: ActivationFunction,
    pub aggregation: AggregationFunction,
}

impl NodeGene {
    pub fn random<R>(key: NodeKey, config: &GenomeConfig, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self {
            key,
            bias: config.bias.init_value(rng),
            response: config.response.init_value(rng),
            activation: config.activation_default,
            aggregation: config.aggregation_default,
        }
    }

    fn mutate<R>(&mut self, config: &GenomeConfig, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.bias = config.bias.mutate_value(self.bias, rng);
        self.response = config.response.mutate_value(self.response, rng);
        self.activation = mutate_choice(
            self.activation,
            &config.activation_options,
            config.activation_mutate_rate,
            rng,
        );
        self.aggregation = mutate_choice(
            self.aggregation,
            &config.aggregation_options,
            config.aggregation_mutate_rate,
            rng,
        );
    }

    fn crossover<R>(&self, other: &Self, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self {
            key: self.key,
            bias: pick(rng, self.bias, other.bias),
            response: pick(rng, self.response, other.response),
            activation: pick(rng, self.activation, other.activation),
            aggregation: pick(rng, self.aggregation, other.aggregation),
        }
    }

    fn distance(&self, other: &Self, config: &GenomeConfig) -> f64 {
        let mut d = (self.bias - other.bias).abs() + (self.response - other.response).abs();
        if self.activation != other.activation {
            d += 1.0;
        }
        if self.aggregation != other.aggregation {
            d += 1.0;
        }
        d * config.compatibility_weight_coefficient
    }
}

impl fmt::Display for NodeGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NodeGene(key={}, bias={:.3}, response={:.3}, activation={}, aggregation={})",
            self.key, self.bias, self.response, self.activation, self.aggregation
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGene {
    pub key: ConnectionKey,
    pub weight: f64,
    pub enabled: bool,
}

impl ConnectionGene {
    pub fn random<R>(key: ConnectionKey, config: &GenomeConfig, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self {
            key,
            weight: config.weight.init_value(rng),
            enabled: config.enabled_default,
        }
    }

    fn mutate<R>(&mut self, config: &GenomeConfig, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.weight = config.weight.mutate_value(self.weight, rng);
        self.enabled = mutate_bool(self.enabled, config.enabled_mutate_rate, rng);
    }

    fn crossover<R>(&self, other: &Self, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self {
            key: self.key,
            weight: pick(rng, self.weight, other.weight),
            enabled: pick(rng, self.enabled, other.enabled),
        }
    }

    fn distance(&self, other: &Self, config: &GenomeConfig) -> f64 {
        let mut d = (self.weight - other.weight).abs();
        if self.enabled != other.enabled {
            d += 1.0;
        }
        d * config.compatibility_weight_coefficient
    }
}

impl fmt::Display for ConnectionGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConnectionGene(in={}, out={}, weight={:.3}, enabled={})",
            self.key.0, self.key.1, self.weight, self.enabled
        )
    }
}

fn pick<T, R>(rng: &mut R, a: T, b: T) -> T
where
    R: Rng + ?Sized,
{
    if rng.random_bool(0.5) { a } else { b }
}

#[derive(Debug, Clone, Copy)]
enum StructuralMutation {
    AddNode,
    DeleteNode,
    AddConnection,
    DeleteConnection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub key: GenomeKey,
    /// Fitness from the latest evaluation. Reset to `0.0` before each evaluation.
    pub fitness: f64,
    /// Hidden and output nodes. Input nodes are implicit.
    pub nodes: BTreeMap<NodeKey, NodeGene>,
    #[serde(with = "connection_list")]
    pub connections: BTreeMap<ConnectionKey, ConnectionGene>,
}

impl Genome {
    #[must_use]
    pub fn new(key: GenomeKey) -> Self {
        Self {
            key,
            fitness: 0.0,
            nodes: BTreeMap::new(),
            connections: BTreeMap::new(),
        }
    }

    /// Creates a genome with the configured output/hidden nodes and initial wiring.
    pub fn random<R>(key: GenomeKey, config: &GenomeConfig, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut genome = Self::new(key);
        for node in config.output_keys() {
            genome.nodes.insert(node, NodeGene::random(node, config, rng));
        }
        let hidden = (0..config.num_hidden)
            .map(|i| to_key(config.num_outputs + i))
            .collect::<Vec<_>>();
        for &node in &hidden {
            genome.nodes.insert(node, NodeGene::random(node, config, rng));
        }

        let inputs = config.input_keys().collect::<Vec<_>>();
        let outputs = config.output_keys().collect::<Vec<_>>();
        let fraction = match config.initial_connection {
            InitialConnection::PartialNohidden | InitialConnection::PartialDirect => {
                config.connection_fraction
            }
            _ => 1.0,
        };
        let pairs = match config.initial_connection {
            InitialConnection::Unconnected => vec![],
            InitialConnection::FsNeatNohidden => {
                let Some(&input) = inputs.iter().choose(rng) else {
                    return genome;
                };
                hidden
                    .iter()
                    .chain(&outputs)
                    .map(|&node| (input, node))
                    .collect()
            }
            InitialConnection::FullNohidden | InitialConnection::PartialNohidden => {
                full_connections(&inputs, &hidden, &outputs, false)
            }
            InitialConnection::FullDirect | InitialConnection::PartialDirect => {
                full_connections(&inputs, &hidden, &outputs, true)
            }
        };
        for key in pairs {
            if fraction >= 1.0 || rng.random::<f64>() < fraction {
                genome
                    .connections
                    .insert(key, ConnectionGene::random(key, config, rng));
            }
        }
        genome
    }

    /// Creates a child from two parents.
    ///
    /// Matching genes mix attributes from both parents. Disjoint and excess genes
    /// come from the fitter parent only.
    pub fn crossover<R>(key: GenomeKey, parent1: &Genome, parent2: &Genome, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let (fit, other) = if parent1.fitness >= parent2.fitness {
            (parent1, parent2)
        } else {
            (parent2, parent1)
        };

        let mut child = Self::new(key);
        for (&k, gene) in &fit.connections {
            let gene = match other.connections.get(&k) {
                Some(other_gene) => gene.crossover(other_gene, rng),
                None => gene.clone(),
            };
            child.connections.insert(k, gene);
        }
        for (&k, gene) in &fit.nodes {
            let gene = match other.nodes.get(&k) {
                Some(other_gene) => gene.crossover(other_gene, rng),
                None => gene.clone(),
            };
            child.nodes.insert(k, gene);
        }
        child
    }

    /// Applies structural mutations, then perturbs every gene's attributes.
    pub fn mutate<R>(&mut self, config: &GenomeConfig, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        let probs = [
            (StructuralMutation::AddNode, config.node_add_prob),
            (StructuralMutation::DeleteNode, config.node_delete_prob),
            (StructuralMutation::AddConnection, config.conn_add_prob),
            (StructuralMutation::DeleteConnection, config.conn_delete_prob),
        ];
        if config.single_structural_mutation {
            let div = probs.iter().map(|(_, p)| p).sum::<f64>().max(1.0);
            let mut r = rng.random::<f64>();
            for (mutation, p) in probs {
                let p = p / div;
                if r < p {
                    self.apply_structural(mutation, config, rng);
                    break;
                }
                r -= p;
            }
        } else {
            for (mutation, p) in probs {
                if rng.random::<f64>() < p {
                    self.apply_structural(mutation, config, rng);
                }
            }
        }

        for gene in self.connections.values_mut() {
            gene.mutate(config, rng);
        }
        for gene in self.nodes.values_mut() {
            gene.mutate(config, rng);
        }
    }

    fn apply_structural<R>(
        &mut self,
        mutation: StructuralMutation,
        config: &GenomeConfig,
        rng: &mut R,
    ) where
        R: Rng + ?Sized,
    {
        match mutation {
            StructuralMutation::AddNode => self.mutate_add_node(config, rng),
            StructuralMutation::DeleteNode => self.mutate_delete_node(config, rng),
            StructuralMutation::AddConnection => self.mutate_add_connection(config, rng),
            StructuralMutation::DeleteConnection => self.mutate_delete_connection(rng),
        }
    }

    fn next_node_key(&self, config: &GenomeConfig) -> NodeKey {
        let floor = to_key(config.num_outputs);
        self.nodes
            .keys()
            .next_back()
            .map_or(floor, |&max| (max + 1).max(floor))
    }

    /// Splits a random connection `a -> b` into `a -> new -> b`.
    ///
    /// The old connection is disabled. The incoming link gets weight 1 and the
    /// outgoing link inherits the old weight, so behavior is initially preserved.
    pub fn mutate_add_node<R>(&mut self, config: &GenomeConfig, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        let Some(&split) = self.connections.keys().choose(rng) else {
            if config.structural_mutation_surer {
                self.mutate_add_connection(config, rng);
            }
            return;
        };
        let new_node = self.next_node_key(config);
        self.nodes
            .insert(new_node, NodeGene::random(new_node, config, rng));

        let Some(old) = self.connections.get_mut(&split) else {
            return;
        };
        old.enabled = false;
        let weight = old.weight;
        let (from, to) = split;
        self.add_connection((from, new_node), 1.0, true);
        self.add_connection((new_node, to), weight, true);
    }

    pub fn add_connection(&mut self, key: ConnectionKey, weight: f64, enabled: bool) {
        self.connections.insert(
            key,
            ConnectionGene {
                key,
                weight,
                enabled,
            },
        );
    }

    /// Connects a random pair of nodes.
    ///
    /// Never targets an input, never links two outputs, and in feed-forward mode
    /// never closes a cycle.
    pub fn mutate_add_connection<R>(&mut self, config: &GenomeConfig, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        let Some(&to) = self.nodes.keys().choose(rng) else {
            return;
        };
        let Some(from) = self.nodes.keys().copied().chain(config.input_keys()).choose(rng) else {
            return;
        };
        let key = (from, to);

        if let Some(existing) = self.connections.get_mut(&key) {
            if config.structural_mutation_surer {
                existing.enabled = true;
            }
            return;
        }
        if config.is_output(from) && config.is_output(to) {
            return;
        }
        if config.feed_forward && graph::creates_cycle(self.connections.keys().copied(), key) {
            return;
        }
        self.connections
            .insert(key, ConnectionGene::random(key, config, rng));
    }

    /// Removes a random hidden node and every connection touching it.
    pub fn mutate_delete_node<R>(&mut self, config: &GenomeConfig, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        let Some(&node) = self.nodes.keys().filter(|&&k| !config.is_output(k)).choose(rng) else {
            return;
        };
        self.connections
            .retain(|&(from, to), _| from != node && to != node);
        self.nodes.remove(&node);
    }

    pub fn mutate_delete_connection<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        if let Some(&key) = self.connections.keys().choose(rng) {
            self.connections.remove(&key);
        }
    }

    /// Genetic distance used for speciation.
    ///
    /// For nodes and connections separately: the attribute distance of matching
    /// genes plus `compatibility_disjoint_coefficient` per unmatched gene, divided
    /// by the larger gene count.
    #[must_use]
    pub fn distance(&self, other: &Genome, config: &GenomeConfig) -> f64 {
        gene_distance(&self.nodes, &other.nodes, config, NodeGene::distance)
            + gene_distance(
                &self.connections,
                &other.connections,
                config,
                ConnectionGene::distance,
            )
    }

    /// `(node count, enabled connection count)`.
    #[must_use]
    pub fn size(&self) -> (usize, usize) {
        let enabled = self.connections.values().filter(|c| c.enabled).count();
        (self.nodes.len(), enabled)
    }

    /// Enabled connection keys.
    pub fn enabled_connections(&self) -> impl Iterator<Item = ConnectionKey> + '_ {
        self.connections
            .values()
            .filter(|c| c.enabled)
            .map(|c| c.key)
    }
}

#[expect(clippy::cast_precision_loss)]
fn gene_distance<K, G>(
    a: &BTreeMap<K, G>,
    b: &BTreeMap<K, G>,
    config: &GenomeConfig,
    distance: fn(&G, &G, &GenomeConfig) -> f64,
) -> f64
where
    K: Ord,
{
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let mut homologous = 0.0;
    let mut unmatched = b.keys().filter(|k| !a.contains_key(k)).count();
    for (k, gene) in a {
        match b.get(k) {
            Some(other) => homologous += distance(gene, other, config),
            None => unmatched += 1,
        }
    }
    let max_genes = a.len().max(b.len()) as f64;
    (homologous + config.compatibility_disjoint_coefficient * unmatched as f64) / max_genes
}

fn full_connections(
    inputs: &[NodeKey],
    hidden: &[NodeKey],
    outputs: &[NodeKey],
    direct: bool,
) -> Vec<ConnectionKey> {
    let mut pairs = vec![];
    for &i in inputs {
        for &h in hidden {
            pairs.push((i, h));
        }
    }
    for &h in hidden {
        for &o in outputs {
            pairs.push((h, o));
        }
    }
    if direct || hidden.is_empty() {
        for &i in inputs {
            for &o in outputs {
                pairs.push((i, o));
            }
        }
    }
    pairs
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Key: {}", self.key)?;
        writeln!(f, "Fitness: {}", self.fitness)?;
        writeln!(f, "Nodes:")?;
        for node in self.nodes.values() {
            writeln!(f, "\t{} {node}", node.key)?;
        }
        write!(f, "Connections:")?;
        let mut connections = self.connections.values().collect::<Vec<_>>();
        connections.sort_by_key(|c| c.key);
        for connection in connections {
            write!(f, "\n\t{connection}")?;
        }
        Ok(())
    }
}

/// JSON object keys must be strings, so connections are stored as a plain list of
/// genes and re-keyed on load.
mod connection_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize as _, Deserializer, Serializer};

    use super::{ConnectionGene, ConnectionKey};

    pub fn serialize<S>(
        connections: &BTreeMap<ConnectionKey, ConnectionGene>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(connections.values())
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<ConnectionKey, ConnectionGene>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let genes = Vec::<ConnectionGene>::deserialize(deserializer)?;
        Ok(genes.into_iter().map(|g| (g.key, g)).collect())
    }
}
