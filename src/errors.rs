use thiserror::Error;

/// Errors surfaced by the library. Fatal errors (per SPEC_FULL.md §7) are
/// returned up to the caller; recoverable per-record/per-read problems are
/// aggregated into counters instead (see `crate::variant::IngestReport` and
/// `crate::window_scheduler::WindowStats`) and never become an `EngineError`.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load model file {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("reference error: {0}")]
    ReferenceIo(String),

    #[error("VCF parse error: {0}")]
    VcfParse(String),

    #[error("BED parse error: {0}")]
    BedParse(String),

    #[error("cigar invariant violated: {0}")]
    CigarInvariant(String),

    #[error("haplotype drifted from reference: {0}")]
    HaplotypeDrift(String),

    #[error("output sink error: {0}")]
    OutputSink(String),

    #[error("cigar builder error: {0}")]
    CigarBuilder(String),

    #[error("{feature} is not implemented")]
    Unsupported { feature: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
