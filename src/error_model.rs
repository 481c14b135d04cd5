use std::collections::HashMap;

use rand::Rng;

use crate::contig::reverse_complement;
use crate::dist::DiscreteDistribution;

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Per-cycle quality-score Markov chain plus mismatch kernel. One instance
/// is shared across all reads of a run.
///
/// Cycle 0's prior quality state is not specified by the model this was
/// distilled from (see design notes); it is exposed here as `initial_quality`
/// rather than hard-coded.
pub struct ErrorModel {
    pub read_length: usize,
    /// Phred offset added to the numeric quality to produce the output character; 33 by default.
    pub off_q: u8,
    /// Qualities at or below this value are emitted as `N` bases.
    pub min_quality_to_n: u8,
    /// Requested average error rate, used only when `rescale_qual` is set.
    pub error_rate: f64,
    pub rescale_qual: bool,
    initial_quality: DiscreteDistribution<u8>,
    /// Indexed by cycle (clamped to the last entry past `read_length`); maps
    /// the previous cycle's quality to a distribution over this cycle's.
    quality_transitions: Vec<HashMap<u8, DiscreteDistribution<u8>>>,
    /// Indexed by cycle; maps the true base to a distribution over the
    /// mismatch base emitted in its place.
    substitutions: Vec<HashMap<u8, DiscreteDistribution<u8>>>,
    baseline_error_rate: f64,
}

impl ErrorModel {
    pub fn new(
        read_length: usize,
        off_q: u8,
        min_quality_to_n: u8,
        error_rate: f64,
        rescale_qual: bool,
        initial_quality: DiscreteDistribution<u8>,
        quality_transitions: Vec<HashMap<u8, DiscreteDistribution<u8>>>,
        substitutions: Vec<HashMap<u8, DiscreteDistribution<u8>>>,
    ) -> Self {
        let baseline_error_rate = mean_error_rate(&initial_quality);
        Self {
            read_length,
            off_q,
            min_quality_to_n,
            error_rate,
            rescale_qual,
            initial_quality,
            quality_transitions,
            substitutions,
            baseline_error_rate,
        }
    }

    /// Walks `bases` left to right (reverse-complementing first if
    /// `is_reverse`), drawing a quality per cycle and emitting mismatches
    /// according to the quality-derived error probability. Returns
    /// `(bases', qualities)` where `qualities` are ASCII Phred+`off_q`
    /// characters, ready to write straight into a FASTQ quality line.
    pub fn apply<R: Rng + ?Sized>(&self, bases: &[u8], is_reverse: bool, rng: &mut R) -> (Vec<u8>, Vec<u8>) {
        let oriented = if is_reverse {
            reverse_complement(bases)
        } else {
            bases.to_vec()
        };

        let mut out_bases = Vec::with_capacity(oriented.len());
        let mut out_quals = Vec::with_capacity(oriented.len());
        let mut prev_qual: Option<u8> = None;

        for (cycle, &base) in oriented.iter().enumerate() {
            let raw_qual = self.draw_quality(cycle, prev_qual, rng);
            prev_qual = Some(raw_qual);
            let qual = if self.rescale_qual {
                self.rescale(raw_qual)
            } else {
                raw_qual
            };

            let error_prob = quality_to_error_prob(qual).min(1.0);
            let mut emitted = if rng.gen_bool(error_prob) {
                self.substitution_base(cycle, base, rng)
            } else {
                base
            };
            if qual <= self.min_quality_to_n {
                emitted = b'N';
            }

            out_bases.push(emitted);
            out_quals.push(qual + self.off_q);
        }

        (out_bases, out_quals)
    }

    fn draw_quality<R: Rng + ?Sized>(&self, cycle: usize, prev_qual: Option<u8>, rng: &mut R) -> u8 {
        match prev_qual {
            None => self.initial_quality.sample(rng),
            Some(prev) => {
                let cycle = cycle.min(self.quality_transitions.len().saturating_sub(1));
                self.quality_transitions
                    .get(cycle)
                    .and_then(|table| table.get(&prev))
                    .map(|dist| dist.sample(rng))
                    .unwrap_or(prev)
            }
        }
    }

    fn substitution_base<R: Rng + ?Sized>(&self, cycle: usize, base: u8, rng: &mut R) -> u8 {
        let cycle = cycle.min(self.substitutions.len().saturating_sub(1));
        self.substitutions
            .get(cycle)
            .and_then(|table| table.get(&base))
            .map(|dist| dist.sample(rng))
            .unwrap_or_else(|| {
                *BASES
                    .iter()
                    .filter(|b| **b != base)
                    .nth(rng.gen_range(0..3))
                    .unwrap_or(&b'N')
            })
    }

    /// Linearly rescales a drawn quality so the realized error rate tracks
    /// `error_rate` rather than whatever the raw model implies.
    fn rescale(&self, qual: u8) -> u8 {
        let raw_p = quality_to_error_prob(qual);
        let scale = self.error_rate / self.baseline_error_rate.max(1e-9);
        let rescaled_p = (raw_p * scale).clamp(1e-6, 0.75);
        error_prob_to_quality(rescaled_p)
    }
}

fn quality_to_error_prob(qual: u8) -> f64 {
    10f64.powf(-(qual as f64) / 10.0)
}

fn error_prob_to_quality(p: f64) -> u8 {
    (-10.0 * p.log10()).round().clamp(0.0, 93.0) as u8
}

fn mean_error_rate(initial_quality: &DiscreteDistribution<u8>) -> f64 {
    quality_to_error_prob(*initial_quality.mean_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn toy_model(rescale_qual: bool, error_rate: f64) -> ErrorModel {
        let initial_quality = DiscreteDistribution::new(vec![30u8], vec![1.0]).unwrap();
        ErrorModel::new(100, 33, 2, error_rate, rescale_qual, initial_quality, Vec::new(), Vec::new())
    }

    #[test]
    fn output_lengths_match_input() {
        let model = toy_model(false, 0.01);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let (bases, quals) = model.apply(b"ACGTACGTAC", false, &mut rng);
        assert_eq!(bases.len(), 10);
        assert_eq!(quals.len(), 10);
    }

    #[test]
    fn reverse_reads_are_reverse_complemented_before_errors() {
        let initial_quality = DiscreteDistribution::new(vec![93u8], vec![1.0]).unwrap();
        let model = ErrorModel::new(4, 33, 0, 0.0, false, initial_quality, Vec::new(), Vec::new());
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let (bases, _) = model.apply(b"ACGT", true, &mut rng);
        assert_eq!(bases, b"ACGT");
    }

    #[test]
    fn quality_characters_use_the_configured_offset() {
        let model = toy_model(false, 0.01);
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let (_, quals) = model.apply(b"A", false, &mut rng);
        assert_eq!(quals[0], 30 + 33);
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let model = toy_model(true, 0.02);
        let run = |seed| {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            model.apply(b"ACGTACGTACGTACGT", false, &mut rng)
        };
        assert_eq!(run(11), run(11));
    }
}
