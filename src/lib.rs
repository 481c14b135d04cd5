pub mod config;
pub mod contig;
pub mod coverage;
pub mod dist;
pub mod error_model;
pub mod errors;
pub mod io;
pub mod mutation_model;
pub mod n_regions;
pub mod output_sink;
pub mod reads;
pub mod reference;
pub mod sequence_container;
pub mod variant;
pub mod window_scheduler;

pub mod cli;

use std::ops::Range;
use std::path::Path;

use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

use config::{EngineConfig, RunMode};
use contig::Contig;
use coverage::CoverageProfile;
use dist::DiscreteDistribution;
use errors::EngineError;
use mutation_model::MutationModel;
use n_regions::{NHandlingPolicy, NRegionFinder};
use output_sink::{BamSink, CompositeSink, FastaSink, FastqSink, NullSink, OutputSink, VcfSink};
use reference::ReferenceIndex;
use sequence_container::build_contig_haplotype;
use variant::VariantLedger;
use window_scheduler::WindowScheduler;

/// Runs one full simulation per `config`, writing to whichever output sinks
/// the configuration selects. This is the library's single public entry
/// point; the CLI binary is a thin wrapper around it.
pub fn run(config: EngineConfig) -> Result<(), EngineError> {
    config.validate()?;

    let reference = ReferenceIndex::open(&config.reference_path)?;
    let mutation_model = build_mutation_model(&config)?;
    let error_model_rate = config.error_rate_rescale.unwrap_or(0.0);
    let error_model = match &config.error_model_path {
        Some(path) => io::models::read_error_model(path, error_model_rate, config.rescale_qual)?,
        None => io::models::default_error_model_tables(
            config.read_length,
            error_model_rate,
            config.rescale_qual,
        ),
    };
    let gc_bias_table = match &config.gc_bias_model_path {
        Some(path) => {
            let dist: DiscreteDistribution<u8> = io::models::read_empirical_distribution(path)?;
            (0..=100u8).map(|gc| *dist.mean_value() as f64 / 100.0 * gc as f64 / 100.0 + 1.0).collect::<Vec<_>>()
        }
        None => io::models::default_gc_bias_table(100),
    };
    let coverage_profile = CoverageProfile::new(
        gc_bias_table.len().saturating_sub(1).max(1),
        gc_bias_table,
        config.off_target_scalar,
        0.0,
    )?;

    let fragment_lengths = build_fragment_length_distribution(&config)?;

    let targets = load_region_map(&config.target_bed_path, reference.contigs())?;
    let discards = load_region_map(&config.discard_bed_path, reference.contigs())?;
    let mutation_rate_bed = match &config.mutation_rate_bed_path {
        Some(path) => io::bed::read_bed_multipliers(path, reference.contigs())?,
        None => Default::default(),
    };

    let vcf_by_contig = match &config.vcf_path {
        Some(path) => io::vcf::read_vcf_variants(path, reference.contigs(), config.ploidy)?,
        None => Default::default(),
    };

    // Paired-end runs replace N bases with random bases instead of discarding
    // the read outright, so fragment lengths stay valid across the gap.
    let n_handling = if config.paired_end_mean.is_some() {
        NHandlingPolicy::Random
    } else {
        NHandlingPolicy::Ignore
    };
    let n_finder = NRegionFinder::new(n_handling, config.read_length, fragment_size(&config));

    let run_mode = config.run_mode();
    info!("starting run in {:?} mode over {} contig(s)", run_mode, reference.contigs().len());

    if run_mode == RunMode::Full {
        run_sequential(
            &config,
            &reference,
            &mutation_model,
            &coverage_profile,
            fragment_lengths.as_ref(),
            &error_model,
            &n_finder,
            &targets,
            &discards,
            &mutation_rate_bed,
            &vcf_by_contig,
        )
    } else {
        run_parallel(
            &config,
            &reference,
            &mutation_model,
            &coverage_profile,
            fragment_lengths.as_ref(),
            &error_model,
            &n_finder,
            &targets,
            &discards,
            &mutation_rate_bed,
            &vcf_by_contig,
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn run_sequential(
    config: &EngineConfig,
    reference: &ReferenceIndex,
    mutation_model: &MutationModel,
    coverage_profile: &CoverageProfile,
    fragment_lengths: Option<&DiscreteDistribution<usize>>,
    error_model: &error_model::ErrorModel,
    n_finder: &NRegionFinder,
    targets: &std::collections::HashMap<String, Vec<Range<usize>>>,
    discards: &std::collections::HashMap<String, Vec<Range<usize>>>,
    mutation_rate_bed: &std::collections::HashMap<String, Vec<(Range<usize>, f64)>>,
    vcf_by_contig: &std::collections::HashMap<String, (Vec<variant::Variant>, variant::IngestReport)>,
) -> Result<(), EngineError> {
    let mut sink = build_sink(config, reference)?;
    let mut rng = ChaCha20Rng::seed_from_u64(config.seed);
    let mut fasta_sink = config.out_fasta.as_ref().map(|p| FastaSink::new(Path::new(p))).transpose()?;

    for contig in reference.contigs() {
        let ledger = process_contig(
            config,
            contig,
            mutation_model,
            coverage_profile,
            fragment_lengths,
            error_model,
            n_finder,
            targets,
            discards,
            mutation_rate_bed,
            vcf_by_contig,
            &mut rng,
            sink.as_mut(),
        )?;
        write_fasta_for_contig(fasta_sink.as_mut(), contig, &ledger, config.ploidy)?;
    }
    sink.close()
}

fn write_fasta_for_contig(
    fasta_sink: Option<&mut FastaSink>,
    contig: &Contig,
    ledger: &VariantLedger,
    ploidy: usize,
) -> Result<(), EngineError> {
    let Some(fasta_sink) = fasta_sink else { return Ok(()) };
    let variants: Vec<variant::Variant> = ledger.sorted().into_iter().cloned().collect();
    for ploid in 0..ploidy {
        let haplotype = build_contig_haplotype(&contig.sequence, &variants, ploid);
        fasta_sink.write_haplotype(&contig.name, ploid, &haplotype)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_parallel(
    config: &EngineConfig,
    reference: &ReferenceIndex,
    mutation_model: &MutationModel,
    coverage_profile: &CoverageProfile,
    fragment_lengths: Option<&DiscreteDistribution<usize>>,
    error_model: &error_model::ErrorModel,
    n_finder: &NRegionFinder,
    targets: &std::collections::HashMap<String, Vec<Range<usize>>>,
    discards: &std::collections::HashMap<String, Vec<Range<usize>>>,
    mutation_rate_bed: &std::collections::HashMap<String, Vec<(Range<usize>, f64)>>,
    vcf_by_contig: &std::collections::HashMap<String, (Vec<variant::Variant>, variant::IngestReport)>,
) -> Result<(), EngineError> {
    // No BAM ordering guarantee to uphold in VCF-only/FASTA-only mode, so
    // contigs can run independently: each thread drives its own
    // `NullSink` and RNG stream (derived from the run seed), and only the
    // resulting ledgers are written out, sequentially, once every contig
    // has finished. Writing the shared VCF/FASTA files from multiple
    // threads at once would otherwise race on the same file handle.
    let ledgers: Vec<Result<VariantLedger, EngineError>> = reference
        .contigs()
        .par_iter()
        .map(|contig| -> Result<VariantLedger, EngineError> {
            let mut rng = ChaCha20Rng::seed_from_u64(config.seed ^ (contig.index as u64).wrapping_add(1));
            let mut ledger = VariantLedger::new();
            let mut sink = NullSink;
            run_one_contig(
                config,
                contig,
                mutation_model,
                coverage_profile,
                fragment_lengths,
                error_model,
                n_finder,
                targets,
                discards,
                mutation_rate_bed,
                vcf_by_contig,
                &mut rng,
                &mut ledger,
                &mut sink,
            )?;
            Ok(ledger)
        })
        .collect();

    let mut vcf_sink = config
        .out_vcf
        .as_ref()
        .map(|p| VcfSink::new(Path::new(p), &reference.header_entries()))
        .transpose()?;
    let mut fasta_sink = config.out_fasta.as_ref().map(|p| FastaSink::new(Path::new(p))).transpose()?;

    for (contig, ledger) in reference.contigs().iter().zip(ledgers) {
        let ledger = ledger?;
        if let Some(vcf_sink) = vcf_sink.as_mut() {
            for variant in ledger.sorted() {
                write_vcf_record(vcf_sink, contig, variant)?;
            }
        }
        write_fasta_for_contig(fasta_sink.as_mut(), contig, &ledger, config.ploidy)?;
    }
    if let Some(vcf_sink) = vcf_sink.as_mut() {
        vcf_sink.close()?;
    }
    Ok(())
}

fn write_vcf_record(sink: &mut VcfSink, contig: &Contig, variant: &variant::Variant) -> Result<(), EngineError> {
    let (reference, alts) = window_scheduler::variant_alleles(contig, variant);
    let genotype = variant
        .genotype()
        .iter()
        .map(|carried| if *carried { "1" } else { "0" })
        .collect::<Vec<_>>()
        .join("|");
    sink.write_vcf(&contig.name, variant.pos() + 1, ".", &reference, &alts, 60.0, "PASS", &genotype)
}

#[allow(clippy::too_many_arguments)]
fn process_contig(
    config: &EngineConfig,
    contig: &Contig,
    mutation_model: &MutationModel,
    coverage_profile: &CoverageProfile,
    fragment_lengths: Option<&DiscreteDistribution<usize>>,
    error_model: &error_model::ErrorModel,
    n_finder: &NRegionFinder,
    targets: &std::collections::HashMap<String, Vec<Range<usize>>>,
    discards: &std::collections::HashMap<String, Vec<Range<usize>>>,
    mutation_rate_bed: &std::collections::HashMap<String, Vec<(Range<usize>, f64)>>,
    vcf_by_contig: &std::collections::HashMap<String, (Vec<variant::Variant>, variant::IngestReport)>,
    rng: &mut ChaCha20Rng,
    sink: &mut dyn OutputSink,
) -> Result<VariantLedger, EngineError> {
    let mut ledger = VariantLedger::new();
    run_one_contig(
        config,
        contig,
        mutation_model,
        coverage_profile,
        fragment_lengths,
        error_model,
        n_finder,
        targets,
        discards,
        mutation_rate_bed,
        vcf_by_contig,
        rng,
        &mut ledger,
        sink,
    )?;
    Ok(ledger)
}

#[allow(clippy::too_many_arguments)]
fn run_one_contig(
    config: &EngineConfig,
    contig: &Contig,
    mutation_model: &MutationModel,
    coverage_profile: &CoverageProfile,
    fragment_lengths: Option<&DiscreteDistribution<usize>>,
    error_model: &error_model::ErrorModel,
    n_finder: &NRegionFinder,
    targets: &std::collections::HashMap<String, Vec<Range<usize>>>,
    discards: &std::collections::HashMap<String, Vec<Range<usize>>>,
    mutation_rate_bed: &std::collections::HashMap<String, Vec<(Range<usize>, f64)>>,
    vcf_by_contig: &std::collections::HashMap<String, (Vec<variant::Variant>, variant::IngestReport)>,
    rng: &mut ChaCha20Rng,
    ledger: &mut VariantLedger,
    sink: &mut dyn OutputSink,
) -> Result<(), EngineError> {
    let n_map = n_finder.find(&contig.sequence);

    let per_contig_model = mutation_rate_bed
        .get(&contig.name)
        .map(|regions| {
            MutationModel::new(
                mutation_model.mutation_rate,
                mutation_model.indel_fraction,
                mutation_model.insertion_fraction,
                mutation_model.homozygous_frequency,
                regions.clone(),
            )
        })
        .transpose()?;
    let mutation_model = per_contig_model.as_ref().unwrap_or(mutation_model);

    let empty = Vec::new();
    let vcf_variants = vcf_by_contig.get(&contig.name).map(|(v, _)| v).unwrap_or(&empty);
    let target_ranges = targets.get(&contig.name).cloned().unwrap_or_default();
    let discard_ranges = discards.get(&contig.name).cloned().unwrap_or_default();

    let mut scheduler = WindowScheduler::new(
        config.read_length,
        fragment_size(config),
        max_fragment_size(config),
        config.ploidy,
        config.coverage,
        config.force_coverage,
        config.discard_offtarget,
        config.target_bed_path.is_some(),
        50,
    );

    scheduler.run_contig(
        contig,
        &n_map,
        vcf_variants,
        mutation_model,
        coverage_profile,
        fragment_lengths,
        error_model,
        n_finder,
        &target_ranges,
        &discard_ranges,
        ledger,
        rng,
        sink,
    )
}

fn build_mutation_model(config: &EngineConfig) -> Result<MutationModel, EngineError> {
    let base = MutationModel::new(
        config.mutation_rate_rescale.unwrap_or(config.mutation_rate),
        0.2,
        0.5,
        0.5,
        Vec::new(),
    )?;
    match &config.mutation_model_path {
        Some(path) => {
            let insertion_lengths: DiscreteDistribution<usize> =
                io::models::read_empirical_distribution(&format!("{path}.ins"))?;
            let deletion_lengths: DiscreteDistribution<usize> =
                io::models::read_empirical_distribution(&format!("{path}.del"))?;
            Ok(base.with_indel_length_distributions(insertion_lengths, deletion_lengths))
        }
        None => Ok(base),
    }
}

fn build_fragment_length_distribution(
    config: &EngineConfig,
) -> Result<Option<DiscreteDistribution<usize>>, EngineError> {
    if let Some(path) = &config.fragment_length_model_path {
        return Ok(Some(io::models::read_empirical_distribution(path)?));
    }
    match (config.paired_end_mean, config.paired_end_std) {
        (Some(mean), Some(std)) => {
            let lengths: Vec<usize> = ((mean - 3.0 * std).max(config.read_length as f64) as usize
                ..=(mean + 3.0 * std) as usize)
                .step_by(((std / 5.0).max(1.0)) as usize)
                .collect();
            let weights: Vec<f64> = lengths
                .iter()
                .map(|l| gaussian_density(*l as f64, mean, std))
                .collect();
            Ok(Some(DiscreteDistribution::new(lengths, weights)?))
        }
        _ => Ok(None),
    }
}

fn gaussian_density(x: f64, mean: f64, std: f64) -> f64 {
    let z = (x - mean) / std.max(1e-9);
    (-0.5 * z * z).exp()
}

fn fragment_size(config: &EngineConfig) -> Option<usize> {
    config.paired_end_mean.map(|m| m as usize)
}

fn max_fragment_size(config: &EngineConfig) -> Option<usize> {
    match (config.paired_end_mean, config.paired_end_std) {
        (Some(mean), Some(std)) => Some((mean + 3.0 * std) as usize),
        _ => None,
    }
}

fn load_region_map(
    path: &Option<String>,
    contigs: &[Contig],
) -> Result<std::collections::HashMap<String, Vec<Range<usize>>>, EngineError> {
    match path {
        Some(path) => io::bed::read_bed_intervals(path, contigs),
        None => Ok(Default::default()),
    }
}

fn build_sink(config: &EngineConfig, reference: &ReferenceIndex) -> Result<Box<dyn OutputSink>, EngineError> {
    let mut sinks: Vec<Box<dyn OutputSink>> = Vec::new();
    if let Some(path1) = &config.out_fastq {
        let path2 = config.out_fastq_mate2.as_ref().map(std::path::Path::new);
        sinks.push(Box::new(FastqSink::new(Path::new(path1), path2)?));
    }
    if let Some(path) = &config.out_bam {
        sinks.push(Box::new(BamSink::new(Path::new(path), &reference.header_entries())?));
    }
    if let Some(path) = &config.out_vcf {
        sinks.push(Box::new(VcfSink::new(Path::new(path), &reference.header_entries())?));
    }
    Ok(Box::new(CompositeSink::new(sinks)))
}
