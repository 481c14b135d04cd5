use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use rust_htslib::bam::record::{Cigar, CigarString, CigarStringView};

use crate::coverage::CoverageVector;
use crate::dist::DiscreteDistribution;
use crate::error_model::ErrorModel;
use crate::errors::EngineError;
use crate::mutation_model::MutationModel;
use crate::n_regions::NRegionFinder;
use crate::reads::cigar_builder::CigarBuilder;
use crate::reads::cigar_utils::CigarUtils;
use crate::variant::{Variant, VariantLedger};

/// One sampled record: `[ref_pos_or_None, cigar, bases, qualities]` per
/// spec.md §4.6.5. `ref_pos` is `None` when the read falls entirely inside
/// an insertion and has no reference anchor.
#[derive(Debug, Clone)]
pub struct ReadRecord {
    pub ref_pos: Option<usize>,
    pub cigar: Option<CigarString>,
    pub bases: Vec<u8>,
    pub quals: Vec<u8>,
    pub is_reverse: bool,
}

#[derive(Debug, Clone)]
pub enum SampledRead {
    Single(ReadRecord),
    Paired(ReadRecord, ReadRecord),
}

/// Per-ploid mutated haplotype: the raw bases plus the alignment back to
/// the reference window (`ref_to_hap`) and the precomputed CIGAR map.
struct Ploid {
    bases: Vec<u8>,
    /// Indexed by local (window-relative) reference offset; `None` where
    /// that reference base was deleted on this haplotype.
    ref_to_hap: Vec<Option<usize>>,
    /// Indexed by local reference offset; populated for `0..=window_len -
    /// read_len`, `None` elsewhere and wherever `ref_to_hap` is `None`.
    cigar_map: Vec<Option<CigarString>>,
}

/// Internal, window-local mirror of `Variant` used while building
/// haplotype segments, so segment construction never has to re-subtract
/// the window start.
enum LocalVariant {
    Snp { pos: usize, alt: u8 },
    Ins { pos: usize, seq: Vec<u8> },
    Del { pos: usize, len: usize },
}

impl LocalVariant {
    fn from_variant(variant: &Variant, window_start: usize) -> Option<Self> {
        let pos = variant.pos().checked_sub(window_start)?;
        Some(match variant {
            Variant::Snp { alt, .. } => LocalVariant::Snp { pos, alt: *alt },
            Variant::Ins { seq, .. } => LocalVariant::Ins { pos, seq: seq.clone() },
            Variant::Del { len, .. } => LocalVariant::Del { pos, len: *len },
        })
    }

    fn pos(&self) -> usize {
        match self {
            LocalVariant::Snp { pos, .. } | LocalVariant::Ins { pos, .. } | LocalVariant::Del { pos, .. } => *pos,
        }
    }
}

/// A run of haplotype construction: matched reference bases (possibly
/// substituted by a SNP), an insertion, or a deletion.
enum Seg {
    Match { ref_start: usize, len: usize },
    Ins { seq: Vec<u8> },
    Del { len: usize },
}

fn seg_hap_len(seg: &Seg) -> usize {
    match seg {
        Seg::Match { len, .. } => *len,
        Seg::Ins { seq } => seq.len(),
        Seg::Del { .. } => 0,
    }
}

/// Folds a ploid's sorted, non-overlapping variant list into an ordered
/// segment list covering `[0, window_len)`. Overlapping variants on the
/// same ploid (a modeling error upstream) are defensively dropped rather
/// than panicking.
fn build_segments(window_len: usize, variants: &[LocalVariant]) -> (Vec<Seg>, HashMap<usize, u8>) {
    let mut segs = Vec::new();
    let mut overrides = HashMap::new();
    let mut cursor = 0usize;

    for variant in variants {
        let pos = variant.pos();
        if pos < cursor || pos >= window_len {
            continue;
        }
        match variant {
            LocalVariant::Snp { pos, alt } => {
                if *pos > cursor {
                    segs.push(Seg::Match { ref_start: cursor, len: pos - cursor });
                }
                segs.push(Seg::Match { ref_start: *pos, len: 1 });
                overrides.insert(*pos, *alt);
                cursor = pos + 1;
            }
            LocalVariant::Ins { pos, seq } => {
                if *pos > cursor {
                    segs.push(Seg::Match { ref_start: cursor, len: pos - cursor });
                }
                segs.push(Seg::Ins { seq: seq.clone() });
                cursor = *pos;
            }
            LocalVariant::Del { pos, len } => {
                if *pos > cursor {
                    segs.push(Seg::Match { ref_start: cursor, len: pos - cursor });
                }
                let del_len = (*len).min(window_len.saturating_sub(*pos));
                if del_len > 0 {
                    segs.push(Seg::Del { len: del_len });
                }
                cursor = pos + del_len;
            }
        }
    }
    if cursor < window_len {
        segs.push(Seg::Match { ref_start: cursor, len: window_len - cursor });
    }
    (segs, overrides)
}

fn haplotype_bytes(window_ref: &[u8], segs: &[Seg], overrides: &HashMap<usize, u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(window_ref.len());
    for seg in segs {
        match seg {
            Seg::Match { ref_start, len } => {
                for i in *ref_start..*ref_start + len {
                    out.push(*overrides.get(&i).unwrap_or(&window_ref[i]));
                }
            }
            Seg::Ins { seq } => out.extend_from_slice(seq),
            Seg::Del { .. } => {}
        }
    }
    out
}

/// Builds one ploid's complete mutated sequence for a whole contig from a
/// final variant ledger, for FASTA-only output. The windowed sampling path
/// never calls this; it folds variants window-by-window instead via
/// `rebuild_haplotypes`.
pub fn build_contig_haplotype(reference: &[u8], variants: &[Variant], ploid: usize) -> Vec<u8> {
    let mut locals: Vec<LocalVariant> = variants
        .iter()
        .filter(|v| v.is_carried_by(ploid))
        .filter_map(|v| LocalVariant::from_variant(v, 0))
        .collect();
    locals.sort_by_key(LocalVariant::pos);
    let (segs, overrides) = build_segments(reference.len(), &locals);
    haplotype_bytes(reference, &segs, &overrides)
}

/// Returns the per-local-ref-offset haplotype position (`None` inside a
/// deletion) and the cumulative haplotype length preceding each segment.
fn ref_to_hap_map(window_len: usize, segs: &[Seg]) -> (Vec<Option<usize>>, Vec<usize>) {
    let mut ref_to_hap = vec![None; window_len];
    let mut hap_start_of_seg = Vec::with_capacity(segs.len());
    let mut hap_pos = 0usize;
    for seg in segs {
        hap_start_of_seg.push(hap_pos);
        match seg {
            Seg::Match { ref_start, len } => {
                for i in 0..*len {
                    ref_to_hap[ref_start + i] = Some(hap_pos + i);
                }
                hap_pos += len;
            }
            Seg::Ins { seq } => hap_pos += seq.len(),
            Seg::Del { .. } => {}
        }
    }
    (ref_to_hap, hap_start_of_seg)
}

/// Builds the CIGAR anchored at haplotype position `start_hap`, walking
/// forward through `segs` until exactly `read_len` read-consuming bases
/// have been emitted (M + I), including any D ops straddled along the way.
fn build_cigar_from_hap_start(
    segs: &[Seg],
    hap_start_of_seg: &[usize],
    start_hap: usize,
    read_len: usize,
) -> Result<CigarString, EngineError> {
    let mut seg_idx = None;
    for (i, seg) in segs.iter().enumerate() {
        let len = seg_hap_len(seg);
        if len == 0 {
            continue;
        }
        if hap_start_of_seg[i] <= start_hap && start_hap < hap_start_of_seg[i] + len {
            seg_idx = Some(i);
            break;
        }
    }
    let mut idx = seg_idx.ok_or_else(|| {
        EngineError::CigarInvariant("no haplotype segment contains the requested start".to_string())
    })?;
    let mut offset_in_seg = start_hap - hap_start_of_seg[idx];

    let mut builder = CigarBuilder::new(true);
    let mut remaining = read_len as u32;
    while remaining > 0 {
        let seg = segs.get(idx).ok_or_else(|| {
            EngineError::CigarInvariant("haplotype exhausted before read_len bases were consumed".to_string())
        })?;
        match seg {
            Seg::Match { len, .. } => {
                let avail = (*len - offset_in_seg) as u32;
                let take = avail.min(remaining);
                builder.add(Cigar::Match(take))?;
                remaining -= take;
                offset_in_seg += take as usize;
                if offset_in_seg >= *len {
                    idx += 1;
                    offset_in_seg = 0;
                }
            }
            Seg::Ins { seq } => {
                let avail = (seq.len() - offset_in_seg) as u32;
                let take = avail.min(remaining);
                builder.add(Cigar::Ins(take))?;
                remaining -= take;
                offset_in_seg += take as usize;
                if offset_in_seg >= seq.len() {
                    idx += 1;
                    offset_in_seg = 0;
                }
            }
            Seg::Del { len } => {
                builder.add(Cigar::Del(*len as u32))?;
                idx += 1;
                offset_in_seg = 0;
            }
        }
    }

    let result = builder.make_and_record_deletions_removed_result()?;
    let view = CigarStringView::new(result.cigar.clone(), 0);
    let consumed = CigarUtils::read_length_from_cigar(&view);
    if consumed != read_len as u32 {
        return Err(EngineError::CigarInvariant(format!(
            "cigar consumed {consumed} read bases, expected {read_len}"
        )));
    }
    Ok(result.cigar)
}

fn build_cigar_map(
    segs: &[Seg],
    hap_start_of_seg: &[usize],
    ref_to_hap: &[Option<usize>],
    window_len: usize,
    read_len: usize,
) -> Result<Vec<Option<CigarString>>, EngineError> {
    let mut map = vec![None; window_len];
    if read_len == 0 || read_len > window_len {
        return Ok(map);
    }
    let max_start = window_len - read_len;
    for r in 0..=max_start {
        if let Some(start_hap) = ref_to_hap[r] {
            map[r] = Some(build_cigar_from_hap_start(segs, hap_start_of_seg, start_hap, read_len)?);
        }
    }
    Ok(map)
}

fn cigar_is_all_insertion(cigar: &CigarString) -> bool {
    cigar.iter().all(|c| matches!(c, Cigar::Ins(_)))
}

/// The heart of the system: per-ploidy mutated haplotypes with CIGAR maps,
/// random mutation injection, coverage-weighted start sampling, and the
/// read sampler itself. Created once per contig, then `update()`d in place
/// for each subsequent window.
pub struct SequenceContainer {
    start: usize,
    end: usize,
    read_len: usize,
    overlap: usize,
    ploidy: usize,
    max_retries: usize,
    applied: BTreeMap<usize, Variant>,
    ploids: Vec<Ploid>,
    start_distribution: Option<DiscreteDistribution<usize>>,
    avg_coverage_multiplier: f64,
}

impl SequenceContainer {
    pub fn new(ploidy: usize, read_len: usize, overlap: usize, max_retries: usize) -> Self {
        Self {
            start: 0,
            end: 0,
            read_len,
            overlap,
            ploidy,
            max_retries,
            applied: BTreeMap::new(),
            ploids: Vec::new(),
            start_distribution: None,
            avg_coverage_multiplier: 0.0,
        }
    }

    pub fn window_span(&self) -> usize {
        self.end - self.start
    }

    pub fn applied_variant_count(&self) -> usize {
        self.applied.len()
    }

    pub fn ploid_bases(&self, ploid: usize) -> &[u8] {
        &self.ploids[ploid].bases
    }

    pub fn average_coverage_multiplier(&self) -> f64 {
        self.avg_coverage_multiplier
    }

    /// All variants currently applied to this window, for the scheduler's
    /// overlap carry-state computation.
    pub fn applied_variants(&self) -> Vec<Variant> {
        self.applied.values().cloned().collect()
    }

    /// Rebuilds the container for a new window `[start, end)` against the
    /// full contig `reference`. `carried_variants` are the overlap-carried
    /// variants from the previous window; `vcf_variants` are the ones
    /// belonging to this window. Both are folded into the ledger and the
    /// applied set before random mutations are drawn.
    #[allow(clippy::too_many_arguments)]
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        reference: &[u8],
        start: usize,
        end: usize,
        carried_variants: Vec<Variant>,
        vcf_variants: Vec<Variant>,
        mutation_model: &MutationModel,
        ledger: &mut VariantLedger,
        rng: &mut R,
    ) -> Result<(), EngineError> {
        if end < start || end > reference.len() {
            return Err(EngineError::InvalidConfig(format!(
                "window [{start}, {end}) out of bounds for a {}-base reference",
                reference.len()
            )));
        }
        self.start = start;
        self.end = end;
        self.applied.clear();

        for variant in carried_variants.into_iter().chain(vcf_variants) {
            ledger.insert(variant.clone());
            self.applied.insert(variant.pos(), variant);
        }

        self.inject_random_mutations(reference, mutation_model, ledger, rng);
        self.rebuild_haplotypes(reference)?;
        Ok(())
    }

    fn inject_random_mutations<R: Rng + ?Sized>(
        &mut self,
        reference: &[u8],
        model: &MutationModel,
        ledger: &mut VariantLedger,
        rng: &mut R,
    ) {
        let lo = self.start + self.overlap;
        let hi = self.end.saturating_sub(self.overlap);
        if lo >= hi {
            return;
        }
        for variant in model.generate_window_variants(rng, reference, lo, hi, self.ploidy) {
            let pos = variant.pos();
            // Ties with a user variant resolve in favor of the user variant.
            if self.applied.contains_key(&pos) {
                continue;
            }
            ledger.insert(variant.clone());
            self.applied.insert(pos, variant);
        }
    }

    fn rebuild_haplotypes(&mut self, reference: &[u8]) -> Result<(), EngineError> {
        let window_ref = &reference[self.start..self.end];
        let window_len = window_ref.len();

        let mut ploids = Vec::with_capacity(self.ploidy);
        for ploid_idx in 0..self.ploidy {
            let mut locals: Vec<LocalVariant> = self
                .applied
                .values()
                .filter(|v| v.is_carried_by(ploid_idx))
                .filter_map(|v| LocalVariant::from_variant(v, self.start))
                .collect();
            locals.sort_by_key(|v| v.pos());

            let (segs, overrides) = build_segments(window_len, &locals);
            let bases = haplotype_bytes(window_ref, &segs, &overrides);
            let (ref_to_hap, hap_start_of_seg) = ref_to_hap_map(window_len, &segs);
            let cigar_map = build_cigar_map(&segs, &hap_start_of_seg, &ref_to_hap, window_len, self.read_len)?;
            ploids.push(Ploid { bases, ref_to_hap, cigar_map });
        }
        self.ploids = ploids;
        Ok(())
    }

    /// Builds the sampling distribution over read start positions from
    /// `coverage`, weighting each start by the mean coverage over a
    /// representative span (the fragment-length distribution's mean value
    /// for paired-end, else `read_len`). Returns the window-average
    /// coverage multiplier used to size the read budget.
    pub fn initialize_coverage(
        &mut self,
        coverage: &CoverageVector,
        fragment_lengths: Option<&DiscreteDistribution<usize>>,
    ) -> Result<f64, EngineError> {
        let window_len = self.window_span();
        if self.read_len == 0 || self.read_len > window_len {
            self.start_distribution = None;
            self.avg_coverage_multiplier = 0.0;
            return Ok(0.0);
        }
        let span = fragment_lengths.map(|d| *d.mean_value()).unwrap_or(self.read_len);
        let max_start = window_len - self.read_len;

        let positions: Vec<usize> = (0..=max_start).collect();
        let weights: Vec<f64> = positions
            .iter()
            .map(|s| coverage.mean_over(*s, span.min(window_len - s).max(1)).max(0.0))
            .collect();

        self.avg_coverage_multiplier = coverage.average();
        if weights.iter().all(|w| *w <= 0.0) {
            self.start_distribution = None;
            return Ok(self.avg_coverage_multiplier);
        }
        self.start_distribution = Some(DiscreteDistribution::new(positions, weights)?);
        Ok(self.avg_coverage_multiplier)
    }

    /// Picks a ploid uniformly, draws a start from the coverage
    /// distribution, and slices/errors a single-end read or paired-end
    /// fragment. Returns `None` if no valid start is found within
    /// `max_retries` attempts.
    pub fn sample_read<R: Rng + ?Sized>(
        &self,
        error_model: &ErrorModel,
        fragment_len: Option<usize>,
        n_finder: &NRegionFinder,
        rng: &mut R,
    ) -> Option<SampledRead> {
        let dist = self.start_distribution.as_ref()?;
        if self.ploidy == 0 {
            return None;
        }

        for _ in 0..self.max_retries {
            let ploid_idx = rng.gen_range(0..self.ploidy);
            let local_start = dist.sample(rng);
            let ploid = &self.ploids[ploid_idx];

            let sampled = match fragment_len {
                None => self
                    .try_single_end(ploid, local_start, error_model, n_finder, rng)
                    .map(SampledRead::Single),
                Some(frag) => self
                    .try_paired_end(ploid, local_start, frag, error_model, n_finder, rng)
                    .map(|(m1, m2)| SampledRead::Paired(m1, m2)),
            };
            if sampled.is_some() {
                return sampled;
            }
        }
        None
    }

    fn try_single_end<R: Rng + ?Sized>(
        &self,
        ploid: &Ploid,
        local_start: usize,
        error_model: &ErrorModel,
        n_finder: &NRegionFinder,
        rng: &mut R,
    ) -> Option<ReadRecord> {
        let cigar = ploid.cigar_map.get(local_start)?.clone()?;
        let hap_start = (*ploid.ref_to_hap.get(local_start)?)?;
        let mut bases = ploid.bases.get(hap_start..hap_start + self.read_len)?.to_vec();
        if !n_finder.handle_read(&mut bases, rng) {
            return None;
        }
        let (bases, quals) = error_model.apply(&bases, false, rng);
        let ref_pos = if cigar_is_all_insertion(&cigar) {
            None
        } else {
            Some(self.start + local_start)
        };
        Some(ReadRecord { ref_pos, cigar: Some(cigar), bases, quals, is_reverse: false })
    }

    fn try_paired_end<R: Rng + ?Sized>(
        &self,
        ploid: &Ploid,
        local_start: usize,
        fragment_len: usize,
        error_model: &ErrorModel,
        n_finder: &NRegionFinder,
        rng: &mut R,
    ) -> Option<(ReadRecord, ReadRecord)> {
        if fragment_len < self.read_len {
            return None;
        }
        let hap_start = (*ploid.ref_to_hap.get(local_start)?)?;
        if hap_start + fragment_len > ploid.bases.len() {
            return None;
        }
        let mate1_cigar = ploid.cigar_map.get(local_start)?.clone()?;
        let mate2_hap_start = hap_start + fragment_len - self.read_len;
        let mate2_local = (local_start..ploid.ref_to_hap.len())
            .find(|l| ploid.ref_to_hap[*l] == Some(mate2_hap_start));

        let mut mate1_bases = ploid.bases[hap_start..hap_start + self.read_len].to_vec();
        let mut mate2_bases = ploid.bases[mate2_hap_start..mate2_hap_start + self.read_len].to_vec();
        if !n_finder.handle_read(&mut mate1_bases, rng) || !n_finder.handle_read(&mut mate2_bases, rng) {
            return None;
        }

        let (mate1_bases, mate1_quals) = error_model.apply(&mate1_bases, false, rng);
        let (mate2_bases, mate2_quals) = error_model.apply(&mate2_bases, true, rng);

        let ref_pos1 = if cigar_is_all_insertion(&mate1_cigar) {
            None
        } else {
            Some(self.start + local_start)
        };
        let mate2_cigar = mate2_local.and_then(|l| ploid.cigar_map.get(l).cloned().flatten());
        let ref_pos2 = match (&mate2_cigar, mate2_local) {
            (Some(cigar), Some(l)) if !cigar_is_all_insertion(cigar) => Some(self.start + l),
            _ => None,
        };

        Some((
            ReadRecord { ref_pos: ref_pos1, cigar: Some(mate1_cigar), bases: mate1_bases, quals: mate1_quals, is_reverse: false },
            ReadRecord { ref_pos: ref_pos2, cigar: mate2_cigar, bases: mate2_bases, quals: mate2_quals, is_reverse: true },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::n_regions::NHandlingPolicy;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn error_model() -> ErrorModel {
        let q = DiscreteDistribution::new(vec![93u8], vec![1.0]).unwrap();
        ErrorModel::new(100, 33, 0, 0.0, false, q, Vec::new(), Vec::new())
    }

    fn flat_coverage(window_len: usize) -> CoverageVector {
        let profile = crate::coverage::CoverageProfile::new(10, vec![1.0; 11], 0.02, 0.0).unwrap();
        profile.compute(&vec![b'A'; window_len], 0, &[], false, &[]).unwrap()
    }

    #[test]
    fn haplotype_with_no_variants_matches_reference() {
        let mut container = SequenceContainer::new(1, 10, 5, 50);
        let reference = vec![b'A'; 100];
        let mut ledger = VariantLedger::new();
        let mutation_model = MutationModel::new(0.0, 0.0, 0.5, 0.5, Vec::new()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        container
            .update(&reference, 0, 50, Vec::new(), Vec::new(), &mutation_model, &mut ledger, &mut rng)
            .unwrap();
        assert_eq!(container.ploid_bases(0), &reference[0..50]);
    }

    #[test]
    fn every_cigar_in_the_map_consumes_exactly_read_len_bases() {
        let mut container = SequenceContainer::new(2, 10, 5, 50);
        let reference: Vec<u8> = b"ACGT".iter().cycle().take(200).copied().collect();
        let mut ledger = VariantLedger::new();
        ledger.insert(Variant::Snp { pos: 30, reference: reference[30], alt: b'T', genotype: vec![true, false] });
        ledger.insert(Variant::Ins { pos: 40, seq: vec![b'A', b'A'], genotype: vec![false, true] });
        ledger.insert(Variant::Del { pos: 60, len: 3, genotype: vec![true, true] });
        let applied: Vec<Variant> = ledger.sorted().into_iter().cloned().collect();
        let mutation_model = MutationModel::new(0.0, 0.0, 0.5, 0.5, Vec::new()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut ledger2 = VariantLedger::new();
        container
            .update(&reference, 0, 100, applied, Vec::new(), &mutation_model, &mut ledger2, &mut rng)
            .unwrap();

        for ploid in 0..2 {
            for cigar in container.ploids[ploid].cigar_map.iter().flatten() {
                let view = CigarStringView::new(cigar.clone(), 0);
                assert_eq!(CigarUtils::read_length_from_cigar(&view), 10);
            }
        }
    }

    #[test]
    fn sample_read_is_deterministic_for_a_fixed_seed() {
        let mut container = SequenceContainer::new(1, 20, 10, 50);
        let reference = vec![b'A'; 500];
        let mutation_model = MutationModel::new(0.0, 0.0, 0.5, 0.5, Vec::new()).unwrap();
        let mut ledger = VariantLedger::new();
        let mut setup_rng = ChaCha20Rng::seed_from_u64(1);
        container
            .update(&reference, 0, 200, Vec::new(), Vec::new(), &mutation_model, &mut ledger, &mut setup_rng)
            .unwrap();
        let coverage = flat_coverage(200);
        container.initialize_coverage(&coverage, None).unwrap();

        let error_model = error_model();
        let n_finder = NRegionFinder::new(NHandlingPolicy::Ignore, 20, None);

        let run = |seed: u64| {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            match container.sample_read(&error_model, None, &n_finder, &mut rng) {
                Some(SampledRead::Single(record)) => Some((record.ref_pos, record.bases)),
                _ => None,
            }
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn paired_end_mates_are_read_len_apart_at_most_fragment_len() {
        let mut container = SequenceContainer::new(1, 20, 30, 50);
        let reference = vec![b'A'; 500];
        let mutation_model = MutationModel::new(0.0, 0.0, 0.5, 0.5, Vec::new()).unwrap();
        let mut ledger = VariantLedger::new();
        let mut setup_rng = ChaCha20Rng::seed_from_u64(1);
        container
            .update(&reference, 0, 200, Vec::new(), Vec::new(), &mutation_model, &mut ledger, &mut setup_rng)
            .unwrap();
        let coverage = flat_coverage(200);
        let fragment_lengths = DiscreteDistribution::new(vec![60usize], vec![1.0]).unwrap();
        container.initialize_coverage(&coverage, Some(&fragment_lengths)).unwrap();

        let error_model = error_model();
        let n_finder = NRegionFinder::new(NHandlingPolicy::Ignore, 20, Some(60));
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        if let Some(SampledRead::Paired(m1, m2)) = container.sample_read(&error_model, Some(60), &n_finder, &mut rng) {
            assert_eq!(m1.bases.len(), 20);
            assert_eq!(m2.bases.len(), 20);
            if let (Some(p1), Some(p2)) = (m1.ref_pos, m2.ref_pos) {
                assert!(p2 >= p1);
                assert!(p2 - p1 <= 60);
            }
        }
    }
}
