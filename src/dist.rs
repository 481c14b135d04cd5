use rand::Rng;

use crate::errors::EngineError;

/// Weighted categorical sampler over an arbitrary value type. Builds a
/// cumulative table once at construction so `sample()` is an O(log n)
/// binary search rather than a linear scan, per the prefix-sum design note.
#[derive(Debug, Clone)]
pub struct DiscreteDistribution<T> {
    values: Vec<T>,
    /// Non-decreasing, `cumulative[cumulative.len() - 1] == 1.0`.
    cumulative: Vec<f64>,
}

impl<T: Clone> DiscreteDistribution<T> {
    pub fn new(values: Vec<T>, weights: Vec<f64>) -> Result<Self, EngineError> {
        if values.len() != weights.len() || values.is_empty() {
            return Err(EngineError::InvalidConfig(
                "DiscreteDistribution requires equal-length, non-empty values/weights".to_string(),
            ));
        }
        if weights.iter().any(|w| *w < 0.0) {
            return Err(EngineError::InvalidConfig(
                "DiscreteDistribution weights must be non-negative".to_string(),
            ));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "DiscreteDistribution requires at least one strictly positive weight".to_string(),
            ));
        }

        let mut cumulative = Vec::with_capacity(weights.len());
        let mut running = 0.0;
        for w in &weights {
            running += w / total;
            cumulative.push(running);
        }
        // guard against floating point drift so the last bin always contains 1.0
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }

        Ok(Self { values, cumulative })
    }

    /// A distribution that always returns `value`, used for the degenerate
    /// weight-vector-of-length-one constructor path.
    pub fn constant(value: T) -> Self {
        Self {
            values: vec![value],
            cumulative: vec![1.0],
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        let draw: f64 = rng.gen_range(0.0..1.0);
        let idx = match self
            .cumulative
            .binary_search_by(|bin| bin.partial_cmp(&draw).unwrap())
        {
            Ok(i) => i,
            Err(i) => i,
        };
        let idx = idx.min(self.values.len() - 1);
        self.values[idx].clone()
    }

    /// Index `i` minimizing `|cumulative[i] - 0.5|` — the "representative"
    /// value of the distribution, used to pick a nominal fragment length.
    pub fn mean_index(&self) -> usize {
        self.cumulative
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (**a - 0.5).abs().partial_cmp(&(**b - 0.5).abs()).unwrap()
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    pub fn mean_value(&self) -> &T {
        &self.values[self.mean_index()]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(DiscreteDistribution::new(vec![1, 2], vec![1.0]).is_err());
    }

    #[test]
    fn rejects_all_zero_weights() {
        assert!(DiscreteDistribution::new(vec![1, 2], vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn degenerate_distribution_always_returns_its_value() {
        let dist = DiscreteDistribution::constant(42);
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..10 {
            assert_eq!(dist.sample(&mut rng), 42);
        }
    }

    #[test]
    fn sampling_is_deterministic_for_a_fixed_seed() {
        let dist = DiscreteDistribution::new(vec!["a", "b", "c"], vec![1.0, 1.0, 1.0]).unwrap();
        let draw = |seed: u64| {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            (0..20).map(|_| dist.sample(&mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(draw(99), draw(99));
    }

    #[test]
    fn mean_index_picks_the_median_bin() {
        let dist = DiscreteDistribution::new(vec![100, 200, 300], vec![1.0, 1.0, 1.0]).unwrap();
        assert_eq!(*dist.mean_value(), 200);
    }
}
