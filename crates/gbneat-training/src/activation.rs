//! Node activation and aggregation functions.
//!
//! A node's output is `activation(bias + response * aggregation(inputs))`, where
//! `inputs` are the incoming values each multiplied by its connection weight.
//!
//! The activation set mirrors the functions commonly available to NEAT genomes.
//! Functions that would overflow for large arguments clamp their input first, so
//! every function maps finite input to finite output.

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    #[display("sigmoid")]
    Sigmoid,
    #[display("tanh")]
    Tanh,
    #[display("sin")]
    Sin,
    #[display("gauss")]
    Gauss,
    #[display("relu")]
    Relu,
    #[display("elu")]
    Elu,
    #[display("lelu")]
    Lelu,
    #[display("selu")]
    Selu,
    #[display("softplus")]
    Softplus,
    #[display("identity")]
    Identity,
    #[display("clamped")]
    Clamped,
    #[display("inv")]
    Inv,
    #[display("log")]
    Log,
    #[display("exp")]
    Exp,
    #[display("abs")]
    Abs,
    #[display("hat")]
    Hat,
    #[display("square")]
    Square,
    #[display("cube")]
    Cube,
}

impl ActivationFunction {
    #[must_use]
    pub fn apply(self, z: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let z = (5.0 * z).clamp(-60.0, 60.0);
                1.0 / (1.0 + (-z).exp())
            }
            ActivationFunction::Tanh => (2.5 * z).clamp(-60.0, 60.0).tanh(),
            ActivationFunction::Sin => (5.0 * z).clamp(-60.0, 60.0).sin(),
            ActivationFunction::Gauss => {
                let z = z.clamp(-3.4, 3.4);
                (-5.0 * z * z).exp()
            }
            ActivationFunction::Relu => z.max(0.0),
            ActivationFunction::Elu => {
                if z > 0.0 {
                    z
                } else {
                    z.exp() - 1.0
                }
            }
            ActivationFunction::Lelu => {
                if z > 0.0 {
                    z
                } else {
                    0.005 * z
                }
            }
            ActivationFunction::Selu => {
                const LAMBDA: f64 = 1.050_700_987_355_480_5;
                const ALPHA: f64 = 1.673_263_242_354_377_3;
                if z > 0.0 {
                    LAMBDA * z
                } else {
                    LAMBDA * ALPHA * (z.exp() - 1.0)
                }
            }
            ActivationFunction::Softplus => {
                let z = (5.0 * z).clamp(-60.0, 60.0);
                0.2 * (1.0 + z.exp()).ln()
            }
            ActivationFunction::Identity => z,
            ActivationFunction::Clamped => z.clamp(-1.0, 1.0),
            ActivationFunction::Inv => {
                if z == 0.0 {
                    0.0
                } else {
                    1.0 / z
                }
            }
            ActivationFunction::Log => z.max(1e-7).ln(),
            ActivationFunction::Exp => z.clamp(-60.0, 60.0).exp(),
            ActivationFunction::Abs => z.abs(),
            ActivationFunction::Hat => (1.0 - z.abs()).max(0.0),
            ActivationFunction::Square => z * z,
            ActivationFunction::Cube => z * z * z,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum AggregationFunction {
    #[display("sum")]
    Sum,
    #[display("product")]
    Product,
    #[display("max")]
    Max,
    #[display("min")]
    Min,
    #[display("maxabs")]
    #[serde(rename = "maxabs")]
    MaxAbs,
    #[display("median")]
    Median,
    #[display("mean")]
    Mean,
}

impl AggregationFunction {
    /// Combines weighted inputs. An empty input aggregates to `0.0`.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn apply(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            AggregationFunction::Sum => values.iter().sum(),
            AggregationFunction::Product => values.iter().product(),
            AggregationFunction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregationFunction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggregationFunction::MaxAbs => values
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(0.0),
            AggregationFunction::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 1 {
                    sorted[mid]
                } else {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                }
            }
            AggregationFunction::Mean => values.iter().sum::<f64>() / values.len() as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIVATIONS: [ActivationFunction; 18] = [
        ActivationFunction::Sigmoid,
        ActivationFunction::Tanh,
        ActivationFunction::Sin,
        ActivationFunction::Gauss,
        ActivationFunction::Relu,
        ActivationFunction::Elu,
        ActivationFunction::Lelu,
        ActivationFunction::Selu,
        ActivationFunction::Softplus,
        ActivationFunction::Identity,
        ActivationFunction::Clamped,
        ActivationFunction::Inv,
        ActivationFunction::Log,
        ActivationFunction::Exp,
        ActivationFunction::Abs,
        ActivationFunction::Hat,
        ActivationFunction::Square,
        ActivationFunction::Cube,
    ];

    #[test]
    fn test_sigmoid_shape() {
        let f = ActivationFunction::Sigmoid;
        assert!((f.apply(0.0) - 0.5).abs() < 1e-12);
        assert!(f.apply(100.0) > 0.999);
        assert!(f.apply(-100.0) < 0.001);
    }

    #[test]
    fn test_activations_are_finite() {
        for f in ALL_ACTIVATIONS {
            for z in [-1e6, -3.0, -0.5, 0.0, 0.5, 3.0] {
                assert!(f.apply(z).is_finite(), "{f}({z}) is not finite");
            }
        }
    }

    #[test]
    fn test_aggregations() {
        let values = [1.0, -4.0, 3.0, 2.0];
        assert_eq!(AggregationFunction::Sum.apply(&values), 2.0);
        assert_eq!(AggregationFunction::Product.apply(&values), -24.0);
        assert_eq!(AggregationFunction::Max.apply(&values), 3.0);
        assert_eq!(AggregationFunction::Min.apply(&values), -4.0);
        assert_eq!(AggregationFunction::MaxAbs.apply(&values), -4.0);
        assert_eq!(AggregationFunction::Median.apply(&values), 1.5);
        assert_eq!(AggregationFunction::Mean.apply(&values), 0.5);
        assert_eq!(AggregationFunction::Sum.apply(&[]), 0.0);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&AggregationFunction::MaxAbs).unwrap(),
            "\"maxabs\""
        );
        let f: ActivationFunction = serde_json::from_str("\"relu\"").unwrap();
        assert_eq!(f, ActivationFunction::Relu);
    }
}
