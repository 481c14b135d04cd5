use std::ops::Range;

use log::info;
use rand::Rng;

use crate::contig::{Contig, NRegionMap};
use crate::coverage::CoverageProfile;
use crate::dist::DiscreteDistribution;
use crate::error_model::ErrorModel;
use crate::errors::EngineError;
use crate::mutation_model::MutationModel;
use crate::n_regions::NRegionFinder;
use crate::output_sink::OutputSink;
use crate::sequence_container::{ReadRecord, SampledRead, SequenceContainer};
use crate::variant::{Variant, VariantLedger};

/// Per-contig recoverable-error counters, surfaced at the end of the run
/// rather than just logged (spec.md §7).
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowStats {
    pub windows_processed: usize,
    pub windows_skipped_narrow: usize,
    pub windows_skipped_low_coverage: usize,
    pub windows_skipped_offtarget: usize,
    pub reads_sampled: usize,
    pub reads_dropped: usize,
}

impl WindowStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_summary(&self, contig: &str) {
        info!(
            "{}: {} window(s) processed, {} skipped (narrow={}, low-coverage={}, off-target={}); \
             {} reads sampled, {} dropped at sampling time",
            contig,
            self.windows_processed,
            self.windows_skipped_narrow + self.windows_skipped_low_coverage + self.windows_skipped_offtarget,
            self.windows_skipped_narrow,
            self.windows_skipped_low_coverage,
            self.windows_skipped_offtarget,
            self.reads_sampled,
            self.reads_dropped,
        );
    }
}

/// Drives windows over a contig's non-N spans, carrying overlap variants and
/// a single reused `SequenceContainer` across windows. One instance of state
/// (`stats`, the read-name counter) is scoped to a single contig.
pub struct WindowScheduler {
    read_len: usize,
    /// Representative (mean) fragment length; `None` for single-end.
    fragment_size: Option<usize>,
    overlap: usize,
    overlap_min_window_size: usize,
    ploidy: usize,
    coverage: f64,
    force_coverage: bool,
    discard_offtarget: bool,
    /// Whether a target BED was supplied at all, distinct from a contig
    /// simply having no target entries in one that was.
    targets_configured: bool,
    max_retries: usize,
    pub stats: WindowStats,
    read_id_counter: u64,
}

impl WindowScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        read_len: usize,
        fragment_size: Option<usize>,
        max_fragment_size: Option<usize>,
        ploidy: usize,
        coverage: f64,
        force_coverage: bool,
        discard_offtarget: bool,
        targets_configured: bool,
        max_retries: usize,
    ) -> Self {
        Self {
            read_len,
            fragment_size,
            overlap: fragment_size.unwrap_or(read_len),
            overlap_min_window_size: max_fragment_size.unwrap_or(read_len) + 10,
            ploidy,
            coverage,
            force_coverage,
            discard_offtarget,
            targets_configured,
            max_retries,
            stats: WindowStats::new(),
            read_id_counter: 0,
        }
    }

    /// Walks every non-N span of `contig`, sampling reads into `sink` and
    /// accumulating variants into `ledger`. Emits the ledger's VCF records
    /// once all windows are processed (spec.md §4.7 step 3 plus the VCF
    /// output contract from §4.8/§4.13).
    #[allow(clippy::too_many_arguments)]
    pub fn run_contig<R: Rng + ?Sized>(
        &mut self,
        contig: &Contig,
        n_map: &NRegionMap,
        vcf_variants: &[Variant],
        mutation_model: &MutationModel,
        coverage_profile: &CoverageProfile,
        fragment_lengths: Option<&DiscreteDistribution<usize>>,
        error_model: &ErrorModel,
        n_finder: &NRegionFinder,
        targets: &[Range<usize>],
        discards: &[Range<usize>],
        ledger: &mut VariantLedger,
        rng: &mut R,
        sink: &mut dyn OutputSink,
    ) -> Result<(), EngineError> {
        let mut container: Option<SequenceContainer> = None;
        let mut carry_variants: Vec<Variant> = Vec::new();

        for span in &n_map.non_n {
            self.process_span(
                contig,
                span,
                vcf_variants,
                mutation_model,
                coverage_profile,
                fragment_lengths,
                error_model,
                n_finder,
                targets,
                discards,
                ledger,
                rng,
                sink,
                &mut container,
                &mut carry_variants,
            )?;
        }

        for variant in ledger.sorted() {
            let (reference, alts) = variant_alleles(contig, variant);
            let genotype = variant
                .genotype()
                .iter()
                .map(|carried| if *carried { "1" } else { "0" })
                .collect::<Vec<_>>()
                .join("|");
            sink.write_vcf(&contig.name, variant.pos() + 1, ".", &reference, &alts, 60.0, "PASS", &genotype)?;
        }
        self.stats.log_summary(&contig.name);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_span<R: Rng + ?Sized>(
        &mut self,
        contig: &Contig,
        span: &Range<usize>,
        vcf_variants: &[Variant],
        mutation_model: &MutationModel,
        coverage_profile: &CoverageProfile,
        fragment_lengths: Option<&DiscreteDistribution<usize>>,
        error_model: &ErrorModel,
        n_finder: &NRegionFinder,
        targets: &[Range<usize>],
        discards: &[Range<usize>],
        ledger: &mut VariantLedger,
        rng: &mut R,
        sink: &mut dyn OutputSink,
        container: &mut Option<SequenceContainer>,
        carry_variants: &mut Vec<Variant>,
    ) -> Result<(), EngineError> {
        let span_len = span.end - span.start;
        if span_len < self.overlap_min_window_size {
            return Ok(());
        }
        let target_size = 100 * self.fragment_size.unwrap_or(self.read_len);
        let num_windows = (span_len / target_size.max(1)).max(1);
        let pitch = (span_len / num_windows).max(1);

        let mut start = span.start;
        loop {
            let mut end = (start + pitch).min(span.end);

            loop {
                let mut extended = false;
                for v in vcf_variants.iter().filter(|v| v.pos() > start && v.pos() < end) {
                    let required = v.pos() + v.indel_buffer() + self.overlap + 2;
                    if required > end {
                        end = required;
                        extended = true;
                    }
                }
                end = end.min(span.end);
                if !extended {
                    break;
                }
            }

            let next_start = end.saturating_sub(self.overlap);
            let next_end = (next_start + pitch).min(span.end);
            let is_last = next_end.saturating_sub(next_start) < pitch;
            let window_end = if is_last { next_end } else { end };

            self.process_window(
                contig,
                start,
                window_end,
                vcf_variants,
                mutation_model,
                coverage_profile,
                fragment_lengths,
                error_model,
                n_finder,
                targets,
                discards,
                ledger,
                rng,
                sink,
                container,
                carry_variants,
            )?;

            if is_last {
                sink.flush(window_end + 1)?;
                break;
            }
            sink.flush(next_start)?;
            start = next_start;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_window<R: Rng + ?Sized>(
        &mut self,
        contig: &Contig,
        start: usize,
        end: usize,
        vcf_variants: &[Variant],
        mutation_model: &MutationModel,
        coverage_profile: &CoverageProfile,
        fragment_lengths: Option<&DiscreteDistribution<usize>>,
        error_model: &ErrorModel,
        n_finder: &NRegionFinder,
        targets: &[Range<usize>],
        discards: &[Range<usize>],
        ledger: &mut VariantLedger,
        rng: &mut R,
        sink: &mut dyn OutputSink,
        container: &mut Option<SequenceContainer>,
        carry_variants: &mut Vec<Variant>,
    ) -> Result<(), EngineError> {
        if end <= start || end - start < self.overlap_min_window_size {
            self.stats.windows_skipped_narrow += 1;
            carry_variants.clear();
            return Ok(());
        }

        let window_ref = contig.slice(start, end);
        let coverage = match coverage_profile.compute(window_ref, start, targets, self.targets_configured, discards) {
            Some(vector) => vector,
            None => {
                self.stats.windows_skipped_low_coverage += 1;
                carry_variants.clear();
                return Ok(());
            }
        };

        if self.discard_offtarget {
            let target_hits = (start..end).filter(|pos| targets.iter().any(|t| t.contains(pos))).count();
            if target_hits <= self.read_len {
                self.stats.windows_skipped_offtarget += 1;
                carry_variants.clear();
                return Ok(());
            }
        }

        let vcf_in_window: Vec<Variant> = vcf_variants
            .iter()
            .filter(|v| v.pos() > start && v.pos() < end)
            .cloned()
            .collect();

        let ploidy = self.ploidy;
        let read_len = self.read_len;
        let overlap = self.overlap;
        let max_retries = self.max_retries;
        let sc = container.get_or_insert_with(|| SequenceContainer::new(ploidy, read_len, overlap, max_retries));

        sc.update(
            &contig.sequence,
            start,
            end,
            std::mem::take(carry_variants),
            vcf_in_window,
            mutation_model,
            ledger,
            rng,
        )?;

        let avg_multiplier = sc.initialize_coverage(&coverage, fragment_lengths)?;
        let multiplier = if self.force_coverage { 1.0 } else { avg_multiplier };
        let k = if self.fragment_size.is_some() { 2.0 } else { 1.0 };
        let window_span = (end - start) as f64;
        let budget = ((window_span * self.coverage * multiplier) / (k * self.read_len as f64)).ceil() as u64 + 1;

        for _ in 0..budget {
            match sc.sample_read(error_model, self.fragment_size, n_finder, rng) {
                Some(SampledRead::Single(record)) => {
                    self.emit_single(contig, &record, sink)?;
                    self.stats.reads_sampled += 1;
                }
                Some(SampledRead::Paired(mate1, mate2)) => {
                    self.emit_pair(contig, &mate1, &mate2, sink)?;
                    self.stats.reads_sampled += 1;
                }
                None => self.stats.reads_dropped += 1,
            }
        }

        self.stats.windows_processed += 1;
        *carry_variants = sc
            .applied_variants()
            .into_iter()
            .filter(|v| v.pos() + self.overlap + 1 >= end)
            .collect();
        Ok(())
    }

    fn next_read_name(&mut self) -> String {
        let id = self.read_id_counter;
        self.read_id_counter += 1;
        format!("readforge:{id}")
    }

    fn emit_single(&mut self, contig: &Contig, record: &ReadRecord, sink: &mut dyn OutputSink) -> Result<(), EngineError> {
        let name = self.next_read_name();
        sink.write_fastq(&name, &record.bases, &record.quals, None)?;
        let flag = match (record.ref_pos.is_none(), record.is_reverse) {
            (true, _) => 4,
            (false, true) => 16,
            (false, false) => 0,
        };
        sink.write_bam(contig.index, &name, record.ref_pos, record.cigar.as_ref(), &record.bases, &record.quals, flag, None, Some(60))?;
        Ok(())
    }

    fn emit_pair(&mut self, contig: &Contig, mate1: &ReadRecord, mate2: &ReadRecord, sink: &mut dyn OutputSink) -> Result<(), EngineError> {
        let name = self.next_read_name();
        sink.write_fastq(&name, &mate1.bases, &mate1.quals, Some((&mate2.bases, &mate2.quals)))?;

        let flag1 = pe_flag(mate1, mate2, true);
        let flag2 = pe_flag(mate2, mate1, false);
        sink.write_bam(contig.index, &name, mate1.ref_pos, mate1.cigar.as_ref(), &mate1.bases, &mate1.quals, flag1, mate2.ref_pos, Some(60))?;
        sink.write_bam(contig.index, &name, mate2.ref_pos, mate2.cigar.as_ref(), &mate2.bases, &mate2.quals, flag2, mate1.ref_pos, Some(60))?;
        Ok(())
    }
}

fn pe_flag(this: &ReadRecord, mate: &ReadRecord, is_first: bool) -> u16 {
    let mut flag = 1u16;
    if this.ref_pos.is_some() && mate.ref_pos.is_some() {
        flag |= 2;
    }
    if this.ref_pos.is_none() {
        flag |= 4;
    }
    if mate.ref_pos.is_none() {
        flag |= 8;
    }
    if this.is_reverse {
        flag |= 16;
    }
    if mate.is_reverse {
        flag |= 32;
    }
    flag |= if is_first { 64 } else { 128 };
    flag
}

/// `(ref, [alt])` fields for VCF emission, using the standard anchor-base
/// convention for indels (one base before the event, taken from the
/// reference since it's never itself mutated in this model).
pub fn variant_alleles(contig: &Contig, variant: &Variant) -> (String, Vec<String>) {
    match variant {
        Variant::Snp { reference, alt, .. } => ((*reference as char).to_string(), vec![(*alt as char).to_string()]),
        Variant::Ins { pos, seq, .. } => {
            let anchor_pos = pos.saturating_sub(1);
            let anchor = contig.sequence.get(anchor_pos).copied().unwrap_or(b'N');
            let reference = (anchor as char).to_string();
            let alt = format!("{}{}", anchor as char, String::from_utf8_lossy(seq));
            (reference, vec![alt])
        }
        Variant::Del { pos, len, .. } => {
            let anchor_pos = pos.saturating_sub(1);
            let reference = contig
                .sequence
                .get(anchor_pos..(anchor_pos + len + 1).min(contig.len()))
                .map(|s| String::from_utf8_lossy(s).to_string())
                .unwrap_or_default();
            let alt = contig
                .sequence
                .get(anchor_pos)
                .map(|b| (*b as char).to_string())
                .unwrap_or_default();
            (reference, vec![alt])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::n_regions::NHandlingPolicy;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[derive(Default)]
    struct CountingSink {
        fastq_records: usize,
        bam_records: usize,
        vcf_records: usize,
    }

    impl OutputSink for CountingSink {
        fn write_fastq(&mut self, _: &str, _: &[u8], _: &[u8], _: Option<(&[u8], &[u8])>) -> Result<(), EngineError> {
            self.fastq_records += 1;
            Ok(())
        }
        fn write_bam(&mut self, _: usize, _: &str, _: Option<usize>, _: Option<&rust_htslib::bam::record::CigarString>, _: &[u8], _: &[u8], _: u16, _: Option<usize>, _: Option<u8>) -> Result<(), EngineError> {
            self.bam_records += 1;
            Ok(())
        }
        fn write_vcf(&mut self, _: &str, _: usize, _: &str, _: &str, _: &[String], _: f64, _: &str, _: &str) -> Result<(), EngineError> {
            self.vcf_records += 1;
            Ok(())
        }
        fn flush(&mut self, _: usize) -> Result<(), EngineError> {
            Ok(())
        }
        fn close(&mut self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn toy_error_model(read_len: usize) -> ErrorModel {
        let q = DiscreteDistribution::new(vec![40u8], vec![1.0]).unwrap();
        ErrorModel::new(read_len, 33, 0, 0.0, false, q, Vec::new(), Vec::new())
    }

    #[test]
    fn single_end_run_samples_approximately_budgeted_reads() {
        let sequence: Vec<u8> = b"ACGT".iter().cycle().take(10_000).copied().collect();
        let contig = Contig::new("chr1", sequence, 0);
        let n_finder = NRegionFinder::new(NHandlingPolicy::Ignore, 100, None);
        let n_map = n_finder.find(&contig.sequence);
        let mutation_model = MutationModel::new(0.0, 0.0, 0.5, 0.5, Vec::new()).unwrap();
        let coverage_profile = CoverageProfile::new(10, vec![1.0; 11], 0.02, 0.0).unwrap();
        let error_model = toy_error_model(100);
        let mut ledger = VariantLedger::new();
        let mut rng = ChaCha20Rng::seed_from_u64(1234);
        let mut sink = CountingSink::default();

        let mut scheduler = WindowScheduler::new(100, None, None, 1, 10.0, false, false, false, 50);
        scheduler
            .run_contig(
                &contig,
                &n_map,
                &[],
                &mutation_model,
                &coverage_profile,
                None,
                &error_model,
                &n_finder,
                &[],
                &[],
                &mut ledger,
                &mut rng,
                &mut sink,
            )
            .unwrap();

        assert!(scheduler.stats.reads_sampled > 0);
        assert_eq!(sink.fastq_records, scheduler.stats.reads_sampled);
    }

    #[test]
    fn n_gap_spans_are_skipped_entirely() {
        let mut sequence = vec![b'A'; 1000];
        sequence.extend(vec![b'N'; 500]);
        sequence.extend(vec![b'A'; 1000]);
        let contig = Contig::new("chr1", sequence, 0);
        let n_finder = NRegionFinder::new(NHandlingPolicy::Ignore, 100, None);
        let n_map = n_finder.find(&contig.sequence);
        assert_eq!(n_map.n, vec![1000..1500]);
    }
}
