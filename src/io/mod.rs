pub mod bed;
pub mod models;
pub mod vcf;

pub use bed::{read_bed_intervals, read_bed_multipliers};
pub use models::{default_error_model_tables, default_gc_bias_table, read_empirical_distribution};
pub use vcf::read_vcf_variants;
