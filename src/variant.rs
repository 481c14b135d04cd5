use std::cmp::Ordering;

use indexmap::IndexSet;
use log::info;

/// A ground-truth variant, tagged by kind rather than shaped as the
/// `(pos, ref, alts, genotype)` tuple VCF uses natively. Clearer to pattern
/// match against when building haplotypes and CIGAR maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Variant {
    Snp {
        pos: usize,
        reference: u8,
        alt: u8,
        genotype: Vec<bool>,
    },
    Ins {
        pos: usize,
        seq: Vec<u8>,
        genotype: Vec<bool>,
    },
    Del {
        pos: usize,
        len: usize,
        genotype: Vec<bool>,
    },
}

impl Variant {
    pub fn pos(&self) -> usize {
        match self {
            Variant::Snp { pos, .. } | Variant::Ins { pos, .. } | Variant::Del { pos, .. } => *pos,
        }
    }

    pub fn genotype(&self) -> &[bool] {
        match self {
            Variant::Snp { genotype, .. } | Variant::Ins { genotype, .. } | Variant::Del { genotype, .. } => {
                genotype
            }
        }
    }

    pub fn is_carried_by(&self, ploid: usize) -> bool {
        self.genotype().get(ploid).copied().unwrap_or(false)
    }

    /// Reference bases this variant spans: 1 for a SNP or insertion anchor
    /// base, `len` for a deletion.
    pub fn ref_span(&self) -> usize {
        match self {
            Variant::Snp { .. } | Variant::Ins { .. } => 1,
            Variant::Del { len, .. } => *len,
        }
    }

    /// `|len(alt) - len(ref)|`, floored at 1 — the window-extension buffer
    /// from the scheduler's fixed-point loop.
    pub fn indel_buffer(&self) -> usize {
        match self {
            Variant::Snp { .. } => 1,
            Variant::Ins { seq, .. } => seq.len().max(1),
            Variant::Del { len, .. } => (*len).max(1),
        }
    }

    fn sort_key(&self) -> (usize, u8, Vec<u8>) {
        match self {
            Variant::Snp { pos, reference, alt, .. } => (*pos, 0, vec![*reference, *alt]),
            Variant::Ins { pos, seq, .. } => (*pos, 1, seq.clone()),
            Variant::Del { pos, len, .. } => (*pos, 2, vec![*len as u8]),
        }
    }
}

impl PartialOrd for Variant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// All successfully introduced variants for one contig, deduplicated by
/// identity and kept sorted for VCF emission.
#[derive(Debug, Default)]
pub struct VariantLedger {
    entries: IndexSet<Variant>,
}

impl VariantLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `variant`, returning `false` if an identical entry was
    /// already present.
    pub fn insert(&mut self, variant: Variant) -> bool {
        self.entries.insert(variant)
    }

    pub fn contains_pos(&self, pos: usize) -> bool {
        self.entries.iter().any(|v| v.pos() == pos)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Variants sorted by position, ready for output.
    pub fn sorted(&self) -> Vec<&Variant> {
        let mut out: Vec<&Variant> = self.entries.iter().collect();
        out.sort();
        out
    }
}

/// Per-contig VCF ingest skip counters, per spec.md §6/§7's three buckets.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestReport {
    pub ref_mismatch: usize,
    pub n_overlap: usize,
    pub non_acgt_alt: usize,
    pub accepted: usize,
}

impl IngestReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_skipped(&self) -> usize {
        self.ref_mismatch + self.n_overlap + self.non_acgt_alt
    }

    pub fn log_summary(&self, contig: &str) {
        if self.total_skipped() == 0 {
            info!(
                "{}: accepted {} VCF variant(s), none skipped",
                contig, self.accepted
            );
        } else {
            info!(
                "{}: accepted {} VCF variant(s); skipped {} (ref-mismatch={}, N-overlap={}, non-ACGT-alt={})",
                contig,
                self.accepted,
                self.total_skipped(),
                self.ref_mismatch,
                self.n_overlap,
                self.non_acgt_alt
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_dedupes_identical_variants() {
        let mut ledger = VariantLedger::new();
        let v = Variant::Snp {
            pos: 10,
            reference: b'A',
            alt: b'G',
            genotype: vec![true, false],
        };
        assert!(ledger.insert(v.clone()));
        assert!(!ledger.insert(v));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn ledger_sorts_by_position() {
        let mut ledger = VariantLedger::new();
        ledger.insert(Variant::Snp {
            pos: 50,
            reference: b'A',
            alt: b'T',
            genotype: vec![true],
        });
        ledger.insert(Variant::Del {
            pos: 10,
            len: 3,
            genotype: vec![true],
        });
        let sorted = ledger.sorted();
        assert_eq!(sorted[0].pos(), 10);
        assert_eq!(sorted[1].pos(), 50);
    }

    #[test]
    fn indel_buffer_is_at_least_one() {
        let snp = Variant::Snp {
            pos: 0,
            reference: b'A',
            alt: b'G',
            genotype: vec![true],
        };
        assert_eq!(snp.indel_buffer(), 1);
    }
}
