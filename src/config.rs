use crate::errors::EngineError;

/// Which output sinks a run produces. A VCF/FASTA-only run skips read
/// sampling entirely and so can safely use `rayon` across contigs (spec.md
/// §5); a BAM/FASTQ run must stay single-threaded per contig to preserve the
/// monotonic-position ordering guarantee `OutputSink` requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    FastaOnly,
    VcfOnly,
    Full,
}

/// Explicitly out of scope (SPEC_FULL.md §4.14): accepting this field is
/// rejected at validation time rather than silently ignored.
#[derive(Debug, Clone, Default)]
pub struct TumorNormalConfig {
    pub tumor_purity: f64,
}

/// Fully resolved, validated run configuration. Every range check in
/// spec.md §6's option table lives in `validate()`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub reference_path: String,
    pub read_length: usize,
    pub coverage: f64,
    pub ploidy: usize,
    pub paired_end_mean: Option<f64>,
    pub paired_end_std: Option<f64>,
    pub fragment_length_model_path: Option<String>,
    pub gc_bias_model_path: Option<String>,
    pub error_model_path: Option<String>,
    pub error_rate_rescale: Option<f64>,
    pub mutation_model_path: Option<String>,
    pub mutation_rate: f64,
    pub mutation_rate_rescale: Option<f64>,
    pub mutation_rate_bed_path: Option<String>,
    pub target_bed_path: Option<String>,
    pub discard_bed_path: Option<String>,
    pub off_target_scalar: f64,
    pub n_quality_threshold: u8,
    pub discard_offtarget: bool,
    pub force_coverage: bool,
    pub rescale_qual: bool,
    pub seed: u64,
    pub vcf_path: Option<String>,
    pub out_fastq: Option<String>,
    pub out_fastq_mate2: Option<String>,
    pub out_fasta: Option<String>,
    pub out_bam: Option<String>,
    pub out_vcf: Option<String>,
    pub tumor_normal: Option<TumorNormalConfig>,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut problems = Vec::new();

        if !(10..=1_000_000).contains(&self.read_length) {
            problems.push(format!(
                "read length {} out of range [10, 1000000]",
                self.read_length
            ));
        }
        if !(0.0..=1_000_000.0).contains(&self.coverage) {
            problems.push(format!("coverage {} out of range [0, 1000000]", self.coverage));
        }
        if !(1..=100).contains(&self.ploidy) {
            problems.push(format!("ploidy {} out of range [1, 100]", self.ploidy));
        }
        if self.paired_end_mean.is_some() != self.paired_end_std.is_some() {
            problems.push("paired-end mean and std must both be set or both unset".to_string());
        }
        if let Some(rate) = self.error_rate_rescale {
            if !(0.0..=0.3).contains(&rate) {
                problems.push(format!("error rate rescale {rate} out of range [0, 0.3]"));
            }
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            problems.push(format!("mutation rate {} out of range [0, 1]", self.mutation_rate));
        }
        if let Some(rate) = self.mutation_rate_rescale {
            if !(0.0..=0.3).contains(&rate) {
                problems.push(format!("mutation rate rescale {rate} out of range [0, 0.3]"));
            }
        }
        if !(0.0..=1.0).contains(&self.off_target_scalar) {
            problems.push(format!(
                "off-target scalar {} out of range [0, 1]",
                self.off_target_scalar
            ));
        }
        if !(1..=40).contains(&self.n_quality_threshold) {
            problems.push(format!(
                "N-quality threshold {} out of range [1, 40]",
                self.n_quality_threshold
            ));
        }
        if !(self.out_fastq.is_some() || self.out_fasta.is_some() || self.out_bam.is_some() || self.out_vcf.is_some())
        {
            problems.push("at least one output selector (fastq/fasta/bam/vcf) must be set".to_string());
        }

        if !problems.is_empty() {
            return Err(EngineError::InvalidConfig(problems.join("; ")));
        }

        if self.tumor_normal.is_some() {
            return Err(EngineError::Unsupported {
                feature: "tumor/normal paired simulation".to_string(),
            });
        }

        Ok(())
    }

    pub fn run_mode(&self) -> RunMode {
        if self.out_bam.is_some() || self.out_fastq.is_some() {
            RunMode::Full
        } else if self.out_vcf.is_some() && self.out_fasta.is_none() {
            RunMode::VcfOnly
        } else {
            RunMode::FastaOnly
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> EngineConfig {
        EngineConfig {
            reference_path: "ref.fa".to_string(),
            read_length: 100,
            coverage: 10.0,
            ploidy: 2,
            paired_end_mean: None,
            paired_end_std: None,
            fragment_length_model_path: None,
            gc_bias_model_path: None,
            error_model_path: None,
            error_rate_rescale: None,
            mutation_model_path: None,
            mutation_rate: 0.001,
            mutation_rate_rescale: None,
            mutation_rate_bed_path: None,
            target_bed_path: None,
            discard_bed_path: None,
            off_target_scalar: 0.02,
            n_quality_threshold: 1,
            discard_offtarget: false,
            force_coverage: false,
            rescale_qual: false,
            seed: 42,
            vcf_path: None,
            out_fastq: Some("out.fastq".to_string()),
            out_fastq_mate2: None,
            out_fasta: None,
            out_bam: None,
            out_vcf: Some("out.vcf".to_string()),
            tumor_normal: None,
        }
    }

    #[test]
    fn a_well_formed_config_validates() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn rejects_read_length_out_of_range() {
        let mut config = valid_config();
        config.read_length = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_mismatched_paired_end_params() {
        let mut config = valid_config();
        config.paired_end_mean = Some(300.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_no_output_selected() {
        let mut config = valid_config();
        config.out_fastq = None;
        config.out_vcf = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tumor_normal_is_an_unsupported_feature() {
        let mut config = valid_config();
        config.tumor_normal = Some(TumorNormalConfig { tumor_purity: 0.7 });
        assert!(matches!(config.validate(), Err(EngineError::Unsupported { .. })));
    }
}
