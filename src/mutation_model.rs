use std::collections::HashMap;
use std::ops::Range;

use rand::Rng;

use crate::dist::DiscreteDistribution;
use crate::errors::EngineError;
use crate::variant::Variant;

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Per-site substitution/indel kernels plus trinucleotide context bias and
/// sparse per-region rate multipliers. One instance is shared across all
/// windows of a run; it carries no mutable state of its own.
pub struct MutationModel {
    pub mutation_rate: f64,
    /// Fraction of mutations that are indels rather than substitutions.
    pub indel_fraction: f64,
    /// Of the indel share, the fraction that are insertions (remainder deletions).
    pub insertion_fraction: f64,
    /// Fraction of random mutations applied to every ploid at once.
    pub homozygous_frequency: f64,
    trinucleotide_matrix: HashMap<[u8; 3], DiscreteDistribution<u8>>,
    insertion_lengths: DiscreteDistribution<usize>,
    deletion_lengths: DiscreteDistribution<usize>,
    /// Sorted, non-overlapping `(region, multiplier)` pairs from a mutation-rate BED.
    region_multipliers: Vec<(Range<usize>, f64)>,
}

impl MutationModel {
    pub fn new(
        mutation_rate: f64,
        indel_fraction: f64,
        insertion_fraction: f64,
        homozygous_frequency: f64,
        region_multipliers: Vec<(Range<usize>, f64)>,
    ) -> Result<Self, EngineError> {
        if !(0.0..=1.0).contains(&mutation_rate) {
            return Err(EngineError::InvalidConfig(format!(
                "mutation rate {mutation_rate} out of range [0,1]"
            )));
        }
        let mut sorted = region_multipliers;
        sorted.sort_by_key(|(range, _)| range.start);

        Ok(Self {
            mutation_rate,
            indel_fraction,
            insertion_fraction,
            homozygous_frequency,
            trinucleotide_matrix: default_trinucleotide_matrix(),
            insertion_lengths: default_indel_length_distribution(),
            deletion_lengths: default_indel_length_distribution(),
            region_multipliers: sorted,
        })
    }

    pub fn with_indel_length_distributions(
        mut self,
        insertion_lengths: DiscreteDistribution<usize>,
        deletion_lengths: DiscreteDistribution<usize>,
    ) -> Self {
        self.insertion_lengths = insertion_lengths;
        self.deletion_lengths = deletion_lengths;
        self
    }

    pub fn with_trinucleotide_matrix(
        mut self,
        matrix: HashMap<[u8; 3], DiscreteDistribution<u8>>,
    ) -> Self {
        self.trinucleotide_matrix = matrix;
        self
    }

    /// The rate multiplier at `pos`, `1.0` when no BED region covers it.
    pub fn rate_multiplier(&self, pos: usize) -> f64 {
        self.region_multipliers
            .iter()
            .find(|(range, _)| range.contains(&pos))
            .map(|(_, scale)| *scale)
            .unwrap_or(1.0)
    }

    /// Draws random variants across `[window_start, window_end)`. Expected
    /// count is `sum(rate * multiplier(pos))`; positions are independent
    /// Bernoulli draws so they land proportional to `multiplier(pos)` by
    /// construction. `reference` is the full contig so trinucleotide context
    /// can look one base either side of the window.
    pub fn generate_window_variants<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        reference: &[u8],
        window_start: usize,
        window_end: usize,
        ploidy: usize,
    ) -> Vec<Variant> {
        let mut variants = Vec::new();
        for pos in window_start..window_end.min(reference.len()) {
            let base = reference[pos];
            if base == b'N' {
                continue;
            }
            let p = (self.mutation_rate * self.rate_multiplier(pos)).min(1.0);
            if p <= 0.0 || !rng.gen_bool(p) {
                continue;
            }

            let genotype = self.generate_genotype(ploidy, rng);
            if rng.gen_bool(self.indel_fraction) {
                if let Some(variant) =
                    self.generate_indel(rng, reference, pos, window_end, genotype)
                {
                    variants.push(variant);
                }
            } else if let Some(variant) = self.generate_snp(rng, reference, pos, genotype) {
                variants.push(variant);
            }
        }
        variants
    }

    fn generate_snp<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        reference: &[u8],
        pos: usize,
        genotype: Vec<bool>,
    ) -> Option<Variant> {
        let reference_base = *reference.get(pos)?;
        let context = trinucleotide_context(reference, pos);
        let dist = self
            .trinucleotide_matrix
            .get(&context)
            .or_else(|| self.trinucleotide_matrix.get(&[b'A', reference_base, b'A']));
        let alt = dist.map(|d| d.sample(rng)).unwrap_or_else(|| {
            *BASES
                .iter()
                .filter(|b| **b != reference_base)
                .nth(rng.gen_range(0..3))
                .unwrap()
        });
        if alt == reference_base {
            return None;
        }
        Some(Variant::Snp {
            pos,
            reference: reference_base,
            alt,
            genotype,
        })
    }

    fn generate_indel<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        reference: &[u8],
        pos: usize,
        window_end: usize,
        genotype: Vec<bool>,
    ) -> Option<Variant> {
        if rng.gen_bool(self.insertion_fraction) {
            let len = self.insertion_lengths.sample(rng).max(1);
            let seq: Vec<u8> = (0..len).map(|_| BASES[rng.gen_range(0..4)]).collect();
            Some(Variant::Ins { pos, seq, genotype })
        } else {
            let max_len = window_end.saturating_sub(pos + 1).max(1);
            let len = self.deletion_lengths.sample(rng).clamp(1, max_len);
            if reference[pos..(pos + len).min(reference.len())]
                .iter()
                .any(|b| *b == b'N')
            {
                return None;
            }
            Some(Variant::Del { pos, len, genotype })
        }
    }

    fn generate_genotype<R: Rng + ?Sized>(&self, ploidy: usize, rng: &mut R) -> Vec<bool> {
        if ploidy == 0 {
            return Vec::new();
        }
        if rng.gen_bool(self.homozygous_frequency) {
            vec![true; ploidy]
        } else {
            let carrier = rng.gen_range(0..ploidy);
            (0..ploidy).map(|p| p == carrier).collect()
        }
    }
}

fn trinucleotide_context(reference: &[u8], pos: usize) -> [u8; 3] {
    let prev = if pos == 0 { b'N' } else { reference[pos - 1] };
    let cur = reference[pos];
    let next = reference.get(pos + 1).copied().unwrap_or(b'N');
    [prev, cur, next]
}

/// A uniform built-in matrix: every context maps to the three non-reference
/// bases with equal weight. Callers loading an external model file replace
/// this via `with_trinucleotide_matrix`.
fn default_trinucleotide_matrix() -> HashMap<[u8; 3], DiscreteDistribution<u8>> {
    let mut matrix = HashMap::with_capacity(64);
    for &a in &BASES {
        for &b in &BASES {
            for &c in &BASES {
                let alts: Vec<u8> = BASES.iter().copied().filter(|x| *x != b).collect();
                let weights = vec![1.0; alts.len()];
                if let Ok(dist) = DiscreteDistribution::new(alts, weights) {
                    matrix.insert([a, b, c], dist);
                }
            }
        }
    }
    matrix
}

fn default_indel_length_distribution() -> DiscreteDistribution<usize> {
    // Geometric-ish falloff favoring short indels, lengths 1..=10.
    let lengths: Vec<usize> = (1..=10).collect();
    let weights: Vec<f64> = (1..=10).map(|l| 1.0 / (l as f64)).collect();
    DiscreteDistribution::new(lengths, weights).expect("static weights are always valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn model() -> MutationModel {
        MutationModel::new(0.01, 0.2, 0.5, 0.5, Vec::new()).unwrap()
    }

    #[test]
    fn rejects_out_of_range_rate() {
        assert!(MutationModel::new(1.5, 0.2, 0.5, 0.5, Vec::new()).is_err());
    }

    #[test]
    fn region_multiplier_defaults_to_one_outside_bed_regions() {
        let model = MutationModel::new(0.01, 0.2, 0.5, 0.5, vec![(100..200, 5.0)]).unwrap();
        assert_eq!(model.rate_multiplier(50), 1.0);
        assert_eq!(model.rate_multiplier(150), 5.0);
    }

    #[test]
    fn skips_n_positions() {
        let model = model();
        let reference = vec![b'N'; 200];
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let variants = model.generate_window_variants(&mut rng, &reference, 0, 200, 2);
        assert!(variants.is_empty());
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let model = model();
        let reference: Vec<u8> = b"ACGT".iter().cycle().take(2000).copied().collect();
        let draw = |seed: u64| {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            model.generate_window_variants(&mut rng, &reference, 0, 2000, 2)
        };
        assert_eq!(draw(42), draw(42));
    }

    #[test]
    fn deletion_length_never_crosses_window_end() {
        let model = model();
        let reference: Vec<u8> = b"ACGT".iter().cycle().take(500).copied().collect();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        for _ in 0..200 {
            let variants = model.generate_window_variants(&mut rng, &reference, 0, 50, 1);
            for v in variants {
                if let Variant::Del { pos, len, .. } = v {
                    assert!(pos + len <= 50);
                }
            }
        }
    }
}
