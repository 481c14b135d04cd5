use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

use serde::{Deserialize, Serialize};

use crate::dist::DiscreteDistribution;
use crate::error_model::ErrorModel;
use crate::errors::EngineError;

/// On-disk shape of an empirical `(values, weights)` pair — fragment-length
/// and GC-bias models both deserialize into this.
#[derive(Debug, Serialize, Deserialize)]
struct EmpiricalTable<T> {
    values: Vec<T>,
    weights: Vec<f64>,
}

/// On-disk shape of the quality/substitution matrix set backing `ErrorModel`.
#[derive(Debug, Serialize, Deserialize)]
struct ErrorModelFile {
    read_length: usize,
    off_q: u8,
    min_quality_to_n: u8,
    initial_quality: EmpiricalTable<u8>,
    quality_transitions: Vec<HashMap<u8, EmpiricalTable<u8>>>,
    substitutions: Vec<HashMap<u8, EmpiricalTable<u8>>>,
}

/// Deserializes a `bincode`-encoded `(values, weights)` model file into a
/// ready-to-sample distribution.
pub fn read_empirical_distribution<T>(path: &str) -> Result<DiscreteDistribution<T>, EngineError>
where
    T: serde::de::DeserializeOwned + Clone,
{
    let file = File::open(path).map_err(|e| EngineError::ModelLoad {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    let table: EmpiricalTable<T> =
        bincode::deserialize_from(BufReader::new(file)).map_err(|e| EngineError::ModelLoad {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    DiscreteDistribution::new(table.values, table.weights)
}

/// Deserializes a `bincode`-encoded error model file into a ready-to-use
/// `ErrorModel`, built with `rescale_qual`/`error_rate` applied by the caller.
pub fn read_error_model(
    path: &str,
    error_rate: f64,
    rescale_qual: bool,
) -> Result<ErrorModel, EngineError> {
    let file = File::open(path).map_err(|e| EngineError::ModelLoad {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    let parsed: ErrorModelFile =
        bincode::deserialize_from(BufReader::new(file)).map_err(|e| EngineError::ModelLoad {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

    let initial_quality = DiscreteDistribution::new(parsed.initial_quality.values, parsed.initial_quality.weights)?;
    let quality_transitions = parsed
        .quality_transitions
        .into_iter()
        .map(convert_table_map)
        .collect::<Result<Vec<_>, _>>()?;
    let substitutions = parsed
        .substitutions
        .into_iter()
        .map(convert_table_map)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ErrorModel::new(
        parsed.read_length,
        parsed.off_q,
        parsed.min_quality_to_n,
        error_rate,
        rescale_qual,
        initial_quality,
        quality_transitions,
        substitutions,
    ))
}

fn convert_table_map(
    map: HashMap<u8, EmpiricalTable<u8>>,
) -> Result<HashMap<u8, DiscreteDistribution<u8>>, EngineError> {
    map.into_iter()
        .map(|(k, table)| Ok((k, DiscreteDistribution::new(table.values, table.weights)?)))
        .collect()
}

/// Built-in GC-bias table used when no `--gc-model` file is supplied: flat
/// (no bias), matching the teacher's "no model configured" default.
pub fn default_gc_bias_table(gc_window_size: usize) -> Vec<f64> {
    vec![1.0; gc_window_size + 1]
}

/// Built-in quality model used when no `--error-model` file is supplied: a
/// flat high-quality Phred-30 prior with no cycle-dependent drift, standing
/// in for NEAT's bundled `errorModel_toy.p` until a real model is loaded.
pub fn default_error_model_tables(read_length: usize, error_rate: f64, rescale_qual: bool) -> ErrorModel {
    let initial_quality =
        DiscreteDistribution::new(vec![30u8], vec![1.0]).expect("static weights are always valid");
    ErrorModel::new(
        read_length,
        33,
        2,
        error_rate,
        rescale_qual,
        initial_quality,
        Vec::new(),
        Vec::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn round_trips_an_empirical_table_through_bincode() {
        let table = EmpiricalTable {
            values: vec![100usize, 200, 300],
            weights: vec![1.0, 2.0, 1.0],
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let encoded = bincode::serialize(&table).unwrap();
        file.write_all(&encoded).unwrap();

        let dist: DiscreteDistribution<usize> =
            read_empirical_distribution(file.path().to_str().unwrap()).unwrap();
        assert_eq!(*dist.mean_value(), 200);
    }

    #[test]
    fn missing_model_file_is_a_model_load_error() {
        let result: Result<DiscreteDistribution<usize>, _> =
            read_empirical_distribution("/nonexistent/model.bin");
        assert!(matches!(result, Err(EngineError::ModelLoad { .. })));
    }

    #[test]
    fn default_gc_bias_table_is_flat() {
        let table = default_gc_bias_table(10);
        assert_eq!(table.len(), 11);
        assert!(table.iter().all(|v| (*v - 1.0).abs() < 1e-9));
    }

    #[test]
    fn default_error_model_honors_requested_rescale() {
        let model = default_error_model_tables(100, 0.05, true);
        assert_eq!(model.error_rate, 0.05);
        assert!(model.rescale_qual);
    }
}
