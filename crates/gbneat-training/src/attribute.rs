//! Gene attributes: how they are initialized and how they mutate.

use rand::{Rng, seq::IndexedRandom};
use rand_distr::{Distribution as _, Normal};
use serde::{Deserialize, Serialize};

/// Distribution used to draw a fresh float attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitType {
    #[default]
    Gaussian,
    Uniform,
}

/// Parameters of a real-valued gene attribute (bias, response, weight).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FloatAttributeConfig {
    pub init_mean: f64,
    pub init_stdev: f64,
    pub init_type: InitType,
    pub max_value: f64,
    pub min_value: f64,
    /// Standard deviation of the perturbation applied on mutation.
    pub mutate_power: f64,
    /// Probability of perturbing the value.
    pub mutate_rate: f64,
    /// Probability of replacing the value with a fresh draw.
    pub replace_rate: f64,
}

impl Default for FloatAttributeConfig {
    fn default() -> Self {
        Self {
            init_mean: 0.0,
            init_stdev: 1.0,
            init_type: InitType::Gaussian,
            max_value: 30.0,
            min_value: -30.0,
            mutate_power: 0.5,
            mutate_rate: 0.7,
            replace_rate: 0.1,
        }
    }
}

impl FloatAttributeConfig {
    /// Config for an attribute that starts at `value` and never changes.
    #[must_use]
    pub fn fixed(value: f64) -> Self {
        Self {
            init_mean: value,
            init_stdev: 0.0,
            mutate_power: 0.0,
            mutate_rate: 0.0,
            replace_rate: 0.0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min_value, self.max_value)
    }

    pub fn init_value<R>(&self, rng: &mut R) -> f64
    where
        R: Rng + ?Sized,
    {
        match self.init_type {
            InitType::Gaussian => self.clamp(gaussian(rng, self.init_mean, self.init_stdev)),
            InitType::Uniform => {
                let low = self.min_value.max(self.init_mean - 2.0 * self.init_stdev);
                let high = self.max_value.min(self.init_mean + 2.0 * self.init_stdev);
                if low < high {
                    rng.random_range(low..=high)
                } else {
                    self.clamp(self.init_mean)
                }
            }
        }
    }

    /// Perturbs, replaces or keeps `value`.
    ///
    /// A single draw decides: below `mutate_rate` perturbs, the next `replace_rate`
    /// replaces, anything else keeps.
    pub fn mutate_value<R>(&self, value: f64, rng: &mut R) -> f64
    where
        R: Rng + ?Sized,
    {
        let r = rng.random::<f64>();
        if r < self.mutate_rate {
            return self.clamp(value + gaussian(rng, 0.0, self.mutate_power));
        }
        if r < self.mutate_rate + self.replace_rate {
            return self.init_value(rng);
        }
        value
    }

    pub(crate) fn validate(&self, name: &str) -> Result<(), String> {
        if self.min_value > self.max_value {
            return Err(format!("{name}.min_value is greater than {name}.max_value"));
        }
        if !(self.init_stdev >= 0.0 && self.mutate_power >= 0.0) {
            return Err(format!(
                "{name}.init_stdev and {name}.mutate_power must be non-negative"
            ));
        }
        Ok(())
    }
}

/// Flips a boolean attribute to a random value with probability `rate`.
pub fn mutate_bool<R>(value: bool, rate: f64, rng: &mut R) -> bool
where
    R: Rng + ?Sized,
{
    if rate > 0.0 && rng.random::<f64>() < rate {
        rng.random_bool(0.5)
    } else {
        value
    }
}

/// Replaces a categorical attribute with a random option with probability `rate`.
pub fn mutate_choice<T, R>(value: T, options: &[T], rate: f64, rng: &mut R) -> T
where
    T: Copy,
    R: Rng + ?Sized,
{
    if rate > 0.0 && rng.random::<f64>() < rate {
        options.choose(rng).copied().unwrap_or(value)
    } else {
        value
    }
}

pub(crate) fn gaussian<R>(rng: &mut R, mean: f64, stdev: f64) -> f64
where
    R: Rng + ?Sized,
{
    Normal::new(mean, stdev).map_or(mean, |normal| normal.sample(rng))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    #[test]
    fn test_init_respects_bounds() {
        let mut rng = Pcg32::seed_from_u64(0);
        let config = FloatAttributeConfig {
            init_stdev: 100.0,
            min_value: -1.0,
            max_value: 1.0,
            ..FloatAttributeConfig::default()
        };
        for _ in 0..1000 {
            let v = config.init_value(&mut rng);
            assert!((-1.0..=1.0).contains(&v));
        }
        let uniform = FloatAttributeConfig {
            init_type: InitType::Uniform,
            ..config
        };
        for _ in 0..1000 {
            let v = uniform.init_value(&mut rng);
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_fixed_attribute_never_changes() {
        let mut rng = Pcg32::seed_from_u64(1);
        let config = FloatAttributeConfig::fixed(1.0);
        assert_eq!(config.init_value(&mut rng), 1.0);
        for _ in 0..100 {
            assert_eq!(config.mutate_value(1.0, &mut rng), 1.0);
        }
    }

    #[test]
    fn test_mutation_always_perturbs_at_rate_one() {
        let mut rng = Pcg32::seed_from_u64(2);
        let config = FloatAttributeConfig {
            mutate_rate: 1.0,
            replace_rate: 0.0,
            ..FloatAttributeConfig::default()
        };
        let changed = (0..100)
            .filter(|_| config.mutate_value(0.25, &mut rng) != 0.25)
            .count();
        assert_eq!(changed, 100);
    }

    #[test]
    fn test_choice_and_bool_mutation_with_zero_rate() {
        let mut rng = Pcg32::seed_from_u64(3);
        assert_eq!(mutate_choice(1, &[2, 3], 0.0, &mut rng), 1);
        assert!(mutate_bool(true, 0.0, &mut rng));
        let picked = mutate_choice(1, &[2, 3], 1.0, &mut rng);
        assert!(picked == 2 || picked == 3);
    }
}
