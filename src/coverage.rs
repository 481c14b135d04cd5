use std::ops::Range;

use crate::errors::EngineError;

/// A per-base coverage multiplier vector for one window, anchored at
/// `start` in reference coordinates.
#[derive(Debug, Clone)]
pub struct CoverageVector {
    pub start: usize,
    pub values: Vec<f64>,
    /// `prefix[i] = sum(values[0..i])`, length `values.len() + 1`. Lets
    /// start-position sampling do a prefix-sum + binary search instead of
    /// recomputing a cumulative table per read.
    prefix: Vec<f64>,
}

impl CoverageVector {
    fn new(start: usize, values: Vec<f64>) -> Self {
        let mut prefix = Vec::with_capacity(values.len() + 1);
        prefix.push(0.0);
        for v in &values {
            prefix.push(prefix.last().unwrap() + v);
        }
        Self { start, values, prefix }
    }

    pub fn sum(&self) -> f64 {
        *self.prefix.last().unwrap_or(&0.0)
    }

    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum() / self.values.len() as f64
        }
    }

    /// Mean of `values[offset..offset+span]` clamped to the vector's bounds.
    pub fn mean_over(&self, offset: usize, span: usize) -> f64 {
        let end = (offset + span).min(self.values.len());
        if offset >= end {
            return 0.0;
        }
        (self.prefix[end] - self.prefix[offset]) / (end - offset) as f64
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Computes per-base coverage multipliers from GC bias and target/discard
/// masks. One instance is shared across all windows and contigs of a run.
pub struct CoverageProfile {
    pub gc_window_size: usize,
    gc_bias_table: Vec<f64>,
    pub off_target_scalar: f64,
    pub low_cov_threshold: f64,
}

impl CoverageProfile {
    pub fn new(
        gc_window_size: usize,
        gc_bias_table: Vec<f64>,
        off_target_scalar: f64,
        low_cov_threshold: f64,
    ) -> Result<Self, EngineError> {
        if gc_bias_table.len() != gc_window_size + 1 {
            return Err(EngineError::InvalidConfig(format!(
                "GC bias table must have {} entries (one per GC count 0..={gc_window_size}), got {}",
                gc_window_size + 1,
                gc_bias_table.len()
            )));
        }
        if !(0.0..=1.0).contains(&off_target_scalar) {
            return Err(EngineError::InvalidConfig(format!(
                "off-target scalar {off_target_scalar} out of range [0,1]"
            )));
        }
        Ok(Self {
            gc_window_size,
            gc_bias_table,
            off_target_scalar,
            low_cov_threshold,
        })
    }

    fn gc_scale(&self, window_ref: &[u8], local_pos: usize) -> f64 {
        let end = (local_pos + self.gc_window_size).min(window_ref.len());
        if local_pos >= end {
            return *self.gc_bias_table.first().unwrap_or(&1.0);
        }
        let gc_count = window_ref[local_pos..end]
            .iter()
            .filter(|b| matches!(b, b'G' | b'C'))
            .count();
        let bucket = (gc_count * self.gc_window_size / (end - local_pos).max(1))
            .min(self.gc_bias_table.len() - 1);
        self.gc_bias_table[bucket]
    }

    /// Builds the coverage vector for `window_ref` (anchored at
    /// `window_start` in reference coordinates). Returns `None` if the
    /// window overlaps a discard interval or the total coverage falls below
    /// `low_cov_threshold`.
    ///
    /// `targets_configured` distinguishes "no target BED was supplied at
    /// all" (full weight everywhere) from "a target BED was supplied but
    /// this contig has no entries in it" (off-target weight everywhere) —
    /// both show up as an empty `targets` slice, but they mean different
    /// things.
    pub fn compute(
        &self,
        window_ref: &[u8],
        window_start: usize,
        targets: &[Range<usize>],
        targets_configured: bool,
        discards: &[Range<usize>],
    ) -> Option<CoverageVector> {
        let mut values = Vec::with_capacity(window_ref.len());
        for local_pos in 0..window_ref.len() {
            let global_pos = window_start + local_pos;
            if discards.iter().any(|d| d.contains(&global_pos)) {
                return None;
            }
            let gc = self.gc_scale(window_ref, local_pos);
            let target_scale = if !targets_configured || targets.iter().any(|t| t.contains(&global_pos)) {
                1.0
            } else {
                self.off_target_scalar
            };
            values.push((gc * target_scale).clamp(0.0, 1.0));
        }

        let vector = CoverageVector::new(window_start, values);
        if vector.sum() < self.low_cov_threshold {
            return None;
        }
        Some(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_profile() -> CoverageProfile {
        CoverageProfile::new(10, vec![1.0; 11], 0.02, 50.0).unwrap()
    }

    #[test]
    fn rejects_mismatched_gc_table_length() {
        assert!(CoverageProfile::new(10, vec![1.0; 5], 0.02, 50.0).is_err());
    }

    #[test]
    fn uniform_gc_and_no_targets_gives_flat_coverage() {
        let profile = flat_profile();
        let window = vec![b'A'; 200];
        let vector = profile.compute(&window, 0, &[], false, &[]).unwrap();
        assert!(vector.values.iter().all(|v| (*v - 1.0).abs() < 1e-9));
    }

    #[test]
    fn off_target_positions_are_scaled_down() {
        let profile = flat_profile();
        let window = vec![b'A'; 200];
        let vector = profile.compute(&window, 0, &[50..100], true, &[]).unwrap();
        assert!((vector.values[10] - 0.02).abs() < 1e-9);
        assert!((vector.values[60] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn contig_with_no_entries_in_a_configured_target_bed_is_fully_off_target() {
        let profile = flat_profile();
        let window = vec![b'A'; 200];
        let vector = profile.compute(&window, 0, &[], true, &[]).unwrap();
        assert!(vector.values.iter().all(|v| (*v - 0.02).abs() < 1e-9));
    }

    #[test]
    fn discard_interval_overlap_skips_the_whole_window() {
        let profile = flat_profile();
        let window = vec![b'A'; 200];
        assert!(profile.compute(&window, 0, &[], false, &[80..120]).is_none());
    }

    #[test]
    fn low_total_coverage_skips_the_window() {
        let profile = CoverageProfile::new(10, vec![1.0; 11], 0.02, 50.0).unwrap();
        let window = vec![b'A'; 10];
        assert!(profile.compute(&window, 0, &[], false, &[]).is_none());
    }

    #[test]
    fn prefix_sum_mean_over_matches_direct_average() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        let vector = CoverageVector::new(0, values.clone());
        assert_eq!(vector.mean_over(1, 2), (2.0 + 3.0) / 2.0);
    }
}
