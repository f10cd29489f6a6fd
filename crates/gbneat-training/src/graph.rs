//! Directed-graph helpers over connection lists.
//!
//! Nodes are identified by their integer key and edges by `(from, to)` pairs. These
//! functions only look at topology, so callers pass the enabled connections.

use std::collections::{BTreeSet, HashSet};

/// Returns whether adding `test` to `connections` would create a cycle.
///
/// A self-loop is always a cycle.
#[must_use]
pub fn creates_cycle<I>(connections: I, test: (i64, i64)) -> bool
where
    I: IntoIterator<Item = (i64, i64)> + Clone,
{
    let (input, output) = test;
    if input == output {
        return true;
    }

    // can `input` be reached from `output`?
    let mut visited = HashSet::from([output]);
    loop {
        let mut added = false;
        for (a, b) in connections.clone() {
            if visited.contains(&a) && !visited.contains(&b) {
                if b == input {
                    return true;
                }
                visited.insert(b);
                added = true;
            }
        }
        if !added {
            return false;
        }
    }
}

/// Collects the nodes whose state is needed to compute the outputs.
///
/// Input nodes are never included. Output nodes always are.
#[must_use]
pub fn required_for_output(
    inputs: &[i64],
    outputs: &[i64],
    connections: &[(i64, i64)],
) -> BTreeSet<i64> {
    let inputs = inputs.iter().copied().collect::<HashSet<_>>();
    let mut required = outputs.iter().copied().collect::<BTreeSet<_>>();
    let mut frontier = required.clone();
    loop {
        let layer = connections
            .iter()
            .filter(|(a, b)| frontier.contains(b) && !frontier.contains(a))
            .map(|&(a, _)| a)
            .collect::<BTreeSet<_>>();
        if layer.is_empty() {
            break;
        }
        let layer_nodes = layer
            .iter()
            .copied()
            .filter(|n| !inputs.contains(n))
            .collect::<BTreeSet<_>>();
        if layer_nodes.is_empty() {
            break;
        }
        required.extend(layer_nodes.iter().copied());
        frontier.extend(layer);
    }
    required
}

/// Groups required nodes into layers that can be evaluated in order.
///
/// Every node in a layer depends only on inputs and nodes of earlier layers.
#[must_use]
pub fn feed_forward_layers(
    inputs: &[i64],
    outputs: &[i64],
    connections: &[(i64, i64)],
) -> Vec<Vec<i64>> {
    let required = required_for_output(inputs, outputs, connections);

    let mut layers = vec![];
    let mut known = inputs.iter().copied().collect::<HashSet<_>>();
    loop {
        let candidates = connections
            .iter()
            .filter(|(a, b)| known.contains(a) && !known.contains(b))
            .map(|&(_, b)| b)
            .collect::<BTreeSet<_>>();
        let layer = candidates
            .into_iter()
            .filter(|n| {
                required.contains(n)
                    && connections
                        .iter()
                        .filter(|(_, b)| b == n)
                        .all(|(a, _)| known.contains(a))
            })
            .collect::<Vec<_>>();
        if layer.is_empty() {
            break;
        }
        known.extend(layer.iter().copied());
        layers.push(layer);
    }
    layers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_cycle() {
        let connections = [(-1, 2), (2, 3), (3, 0)];
        assert!(creates_cycle(connections, (0, 0)));
        assert!(creates_cycle(connections, (3, 2)));
        assert!(creates_cycle(connections, (0, 2)));
        assert!(!creates_cycle(connections, (-1, 3)));
        assert!(!creates_cycle(connections, (2, 0)));
    }

    #[test]
    fn test_required_for_output_skips_dead_ends() {
        // node 5 feeds nothing, node 4 has no path from the inputs but feeds output 0
        let connections = [(-1, 3), (3, 0), (-2, 5), (4, 0)];
        let required = required_for_output(&[-1, -2], &[0], &connections);
        assert_eq!(required, BTreeSet::from([0, 3, 4]));
    }

    #[test]
    fn test_feed_forward_layers() {
        let connections = [(-1, 2), (-2, 2), (2, 0), (-1, 0), (-2, 1)];
        let layers = feed_forward_layers(&[-1, -2], &[0, 1], &connections);
        assert_eq!(layers, vec![vec![1, 2], vec![0]]);
    }

    #[test]
    fn test_feed_forward_layers_without_connections() {
        let layers = feed_forward_layers(&[-1], &[0], &[]);
        assert!(layers.is_empty());
    }
}
