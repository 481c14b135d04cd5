use std::ops::Range;

use rand::Rng;

use crate::contig::NRegionMap;

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// How reads that touch an `N` base are handled at sample time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NHandlingPolicy {
    /// Any read touching an N is discarded.
    Ignore,
    /// N bases are replaced with a random base before error injection, so
    /// paired-end fragment lengths stay valid.
    Random,
}

/// Partitions a contig into maximal N / non-N spans, folding short N runs
/// (below `min_run_length`) back into the surrounding non-N span so the
/// scheduler doesn't fragment windows over single stray ambiguity codes.
pub struct NRegionFinder {
    pub policy: NHandlingPolicy,
    pub min_run_length: usize,
}

impl NRegionFinder {
    pub fn new(policy: NHandlingPolicy, read_len: usize, fragment_size: Option<usize>) -> Self {
        Self {
            policy,
            min_run_length: read_len.max(fragment_size.unwrap_or(0)),
        }
    }

    pub fn find(&self, sequence: &[u8]) -> NRegionMap {
        if sequence.is_empty() {
            return NRegionMap::default();
        }

        let raw_runs = raw_runs(sequence);
        let merged = merge_short_n_runs(raw_runs, self.min_run_length);

        let mut n = Vec::new();
        let mut non_n = Vec::new();
        for (is_n, range) in merged {
            if is_n {
                n.push(range);
            } else {
                non_n.push(range);
            }
        }
        NRegionMap::new(n, non_n)
    }

    /// Applies this policy to a slice of read bases in place. Returns
    /// `false` if the read should be discarded (`Ignore` policy with an N
    /// present), `true` otherwise.
    pub fn handle_read<R: Rng + ?Sized>(&self, bases: &mut [u8], rng: &mut R) -> bool {
        match self.policy {
            NHandlingPolicy::Ignore => !bases.contains(&b'N'),
            NHandlingPolicy::Random => {
                for b in bases.iter_mut() {
                    if *b == b'N' {
                        *b = BASES[rng.gen_range(0..4)];
                    }
                }
                true
            }
        }
    }
}

fn raw_runs(sequence: &[u8]) -> Vec<(bool, Range<usize>)> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut current_is_n = sequence[0] == b'N';
    for (i, base) in sequence.iter().enumerate().skip(1) {
        let is_n = *base == b'N';
        if is_n != current_is_n {
            runs.push((current_is_n, start..i));
            start = i;
            current_is_n = is_n;
        }
    }
    runs.push((current_is_n, start..sequence.len()));
    runs
}

fn merge_short_n_runs(
    raw_runs: Vec<(bool, Range<usize>)>,
    min_run_length: usize,
) -> Vec<(bool, Range<usize>)> {
    let mut merged: Vec<(bool, Range<usize>)> = Vec::new();
    for (is_n, range) in raw_runs {
        let kind = is_n && (range.end - range.start) >= min_run_length;
        match merged.last_mut() {
            Some(last) if last.0 == kind => last.1.end = range.end,
            _ => merged.push((kind, range)),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn long_n_run_is_reported_as_n() {
        let mut sequence = vec![b'A'; 1000];
        sequence.extend(vec![b'N'; 500]);
        sequence.extend(vec![b'A'; 1000]);
        let finder = NRegionFinder::new(NHandlingPolicy::Ignore, 100, None);
        let map = finder.find(&sequence);
        assert_eq!(map.n, vec![1000..1500]);
        assert_eq!(map.non_n, vec![0..1000, 1500..2500]);
    }

    #[test]
    fn short_n_run_is_merged_into_non_n() {
        let mut sequence = vec![b'A'; 50];
        sequence.extend(vec![b'N'; 3]);
        sequence.extend(vec![b'A'; 50]);
        let finder = NRegionFinder::new(NHandlingPolicy::Ignore, 100, None);
        let map = finder.find(&sequence);
        assert!(map.n.is_empty());
        assert_eq!(map.non_n, vec![0..103]);
    }

    #[test]
    fn ignore_policy_rejects_reads_with_n() {
        let finder = NRegionFinder::new(NHandlingPolicy::Ignore, 100, None);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert!(!finder.handle_read(&mut [b'A', b'N', b'C'], &mut rng));
        assert!(finder.handle_read(&mut [b'A', b'C', b'G'], &mut rng));
    }

    #[test]
    fn random_policy_replaces_n_and_keeps_read() {
        let finder = NRegionFinder::new(NHandlingPolicy::Random, 100, None);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut bases = [b'A', b'N', b'C'];
        assert!(finder.handle_read(&mut bases, &mut rng));
        assert_ne!(bases[1], b'N');
    }
}
