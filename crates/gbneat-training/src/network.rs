//! Feed-forward phenotype compiled from a genome.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    activation::{ActivationFunction, AggregationFunction},
    config::GenomeConfig,
    genome::{Genome, NodeKey},
    graph,
};

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum NetworkError {
    #[display("network expects {expected} inputs, got {actual}")]
    InputLength { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEval {
    pub node: NodeKey,
    pub activation: ActivationFunction,
    pub aggregation: AggregationFunction,
    pub bias: f64,
    pub response: f64,
    pub links: Vec<(NodeKey, f64)>,
}

/// A network evaluated layer by layer, with no recurrent state.
///
/// Nodes that cannot influence an output are dropped at compile time. An output
/// that no input can reach always reads `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedForwardNetwork {
    input_nodes: Vec<NodeKey>,
    output_nodes: Vec<NodeKey>,
    node_evals: Vec<NodeEval>,
    #[serde(skip)]
    values: HashMap<NodeKey, f64>,
}

impl FeedForwardNetwork {
    /// Compiles the enabled part of `genome`.
    #[must_use]
    pub fn create(genome: &Genome, config: &GenomeConfig) -> Self {
        let input_nodes = config.input_keys().collect::<Vec<_>>();
        let output_nodes = config.output_keys().collect::<Vec<_>>();
        let connections = genome.enabled_connections().collect::<Vec<_>>();
        let layers = graph::feed_forward_layers(&input_nodes, &output_nodes, &connections);

        let mut node_evals = vec![];
        for node in layers.into_iter().flatten() {
            let Some(gene) = genome.nodes.get(&node) else {
                continue;
            };
            let links = genome
                .connections
                .values()
                .filter(|c| c.enabled && c.key.1 == node)
                .map(|c| (c.key.0, c.weight))
                .collect();
            node_evals.push(NodeEval {
                node,
                activation: gene.activation,
                aggregation: gene.aggregation,
                bias: gene.bias,
                response: gene.response,
                links,
            });
        }

        Self {
            input_nodes,
            output_nodes,
            node_evals,
            values: HashMap::new(),
        }
    }

    #[must_use]
    pub fn input_count(&self) -> usize {
        self.input_nodes.len()
    }

    #[must_use]
    pub fn output_count(&self) -> usize {
        self.output_nodes.len()
    }

    #[must_use]
    pub fn node_evals(&self) -> &[NodeEval] {
        &self.node_evals
    }

    pub fn activate(&mut self, inputs: &[f64]) -> Result<Vec<f64>, NetworkError> {
        if inputs.len() != self.input_nodes.len() {
            return Err(NetworkError::InputLength {
                expected: self.input_nodes.len(),
                actual: inputs.len(),
            });
        }

        self.values.clear();
        for (&node, &value) in self.input_nodes.iter().zip(inputs) {
            self.values.insert(node, value);
        }

        let mut weighted = vec![];
        for eval in &self.node_evals {
            weighted.clear();
            weighted.extend(
                eval.links
                    .iter()
                    .map(|&(from, w)| self.values.get(&from).copied().unwrap_or(0.0) * w),
            );
            let s = eval.aggregation.apply(&weighted);
            let value = eval.activation.apply(eval.bias + eval.response * s);
            self.values.insert(eval.node, value);
        }

        Ok(self
            .output_nodes
            .iter()
            .map(|node| self.values.get(node).copied().unwrap_or(0.0))
            .collect())
    }
}
