use clap::Parser;

use crate::config::EngineConfig;

/// Windowed read simulator: mutated haplotypes, CIGAR-accurate coordinate
/// maps, and coverage-aware read sampling.
#[derive(Debug, Parser)]
#[command(name = "readforge", version, about)]
pub struct Cli {
    /// Reference genome, FASTA (may be gzipped).
    #[arg(long, short = 'r')]
    pub reference: String,

    /// Read length in bases.
    #[arg(long, default_value_t = 150)]
    pub read_length: usize,

    /// Target average coverage depth.
    #[arg(long, short = 'c', default_value_t = 10.0)]
    pub coverage: f64,

    /// Ploidy of the simulated sample.
    #[arg(long, default_value_t = 2)]
    pub ploidy: usize,

    /// Paired-end fragment length mean. Requires `--pe-std`; omit both for single-end.
    #[arg(long)]
    pub pe_mean: Option<f64>,

    /// Paired-end fragment length standard deviation. Requires `--pe-mean`.
    #[arg(long)]
    pub pe_std: Option<f64>,

    /// Empirical fragment-length model file (overrides `--pe-mean`/`--pe-std`).
    #[arg(long)]
    pub fragment_model: Option<String>,

    /// Empirical GC-bias model file. Defaults to a flat built-in table.
    #[arg(long)]
    pub gc_model: Option<String>,

    /// Empirical error model file. Defaults to a flat built-in model.
    #[arg(long)]
    pub error_model: Option<String>,

    /// Rescale drawn qualities so the realized error rate matches this value.
    #[arg(long)]
    pub error_rate: Option<f64>,

    /// Mutation model file (trinucleotide substitution + indel-length matrices).
    #[arg(long)]
    pub mutation_model: Option<String>,

    /// Expected per-base random mutation rate.
    #[arg(long, default_value_t = 0.001)]
    pub mutation_rate: f64,

    /// Rescale the mutation rate to this value.
    #[arg(long)]
    pub mutation_rate_rescale: Option<f64>,

    /// BED file of per-region mutation-rate multipliers (4th column).
    #[arg(long)]
    pub mutation_bed: Option<String>,

    /// Input VCF of user-specified variants to apply.
    #[arg(long)]
    pub vcf: Option<String>,

    /// BED file of target regions.
    #[arg(long)]
    pub target_bed: Option<String>,

    /// BED file of discard regions.
    #[arg(long)]
    pub discard_bed: Option<String>,

    /// Coverage multiplier applied outside target regions.
    #[arg(long, default_value_t = 0.02)]
    pub off_target_scalar: f64,

    /// Qualities at or below this value are emitted as `N`.
    #[arg(long, default_value_t = 1)]
    pub n_quality_threshold: u8,

    /// Drop reads sampled entirely outside target regions.
    #[arg(long)]
    pub discard_offtarget: bool,

    /// Use uniform coverage instead of GC-bias/target scaling.
    #[arg(long)]
    pub force_coverage: bool,

    /// Rescale qualities to match `--error-rate`.
    #[arg(long)]
    pub rescale_qual: bool,

    /// RNG seed.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// FASTQ output path (mate 1, or the only file for single-end).
    #[arg(long)]
    pub out_fastq: Option<String>,

    /// FASTQ output path for mate 2, paired-end only.
    #[arg(long)]
    pub out_fastq2: Option<String>,

    /// FASTA output path (per-ploid mutated haplotypes).
    #[arg(long)]
    pub out_fasta: Option<String>,

    /// BAM output path.
    #[arg(long)]
    pub out_bam: Option<String>,

    /// Ground-truth VCF output path.
    #[arg(long)]
    pub out_vcf: Option<String>,

    /// Verbose logging (debug level).
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Quiet logging (errors only).
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

impl Cli {
    pub fn into_config(self) -> EngineConfig {
        EngineConfig {
            reference_path: self.reference,
            read_length: self.read_length,
            coverage: self.coverage,
            ploidy: self.ploidy,
            paired_end_mean: self.pe_mean,
            paired_end_std: self.pe_std,
            fragment_length_model_path: self.fragment_model,
            gc_bias_model_path: self.gc_model,
            error_model_path: self.error_model,
            error_rate_rescale: self.error_rate,
            mutation_model_path: self.mutation_model,
            mutation_rate: self.mutation_rate,
            mutation_rate_rescale: self.mutation_rate_rescale,
            mutation_rate_bed_path: self.mutation_bed,
            target_bed_path: self.target_bed,
            discard_bed_path: self.discard_bed,
            off_target_scalar: self.off_target_scalar,
            n_quality_threshold: self.n_quality_threshold,
            discard_offtarget: self.discard_offtarget,
            force_coverage: self.force_coverage,
            rescale_qual: self.rescale_qual,
            seed: self.seed,
            vcf_path: self.vcf,
            out_fastq: self.out_fastq,
            out_fastq_mate2: self.out_fastq2,
            out_fasta: self.out_fasta,
            out_bam: self.out_bam,
            out_vcf: self.out_vcf,
            tumor_normal: None,
        }
    }

    /// Mirrors the teacher's `set_log_level`: `-v`/`-q` pick a level,
    /// `RUST_LOG` overrides it if set.
    pub fn init_logging(&self) {
        let level = if self.verbose {
            log::LevelFilter::Debug
        } else if self.quiet {
            log::LevelFilter::Error
        } else {
            log::LevelFilter::Info
        };

        let mut builder = env_logger::Builder::new();
        builder.filter_level(level);
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
        let _ = builder.try_init();
    }
}
