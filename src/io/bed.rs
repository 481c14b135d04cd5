use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;

use log::warn;

use crate::contig::Contig;
use crate::errors::EngineError;

/// Reads a plain BED (0-based, half-open) interval file into per-contig
/// interval lists, used for target and discard masks. A BED chromosome name
/// is resolved against `contigs` with `chr`-prefix normalization and keyed
/// by the reference's own contig name, so lookups by contig name always
/// agree regardless of which naming convention the BED file used.
pub fn read_bed_intervals(path: &str, contigs: &[Contig]) -> Result<HashMap<String, Vec<Range<usize>>>, EngineError> {
    let mut out: HashMap<String, Vec<Range<usize>>> = HashMap::new();
    let mut warned = std::collections::HashSet::new();
    for fields in bed_lines(path)? {
        if fields.len() < 3 {
            return Err(EngineError::BedParse(format!("malformed BED record: {:?}", fields)));
        }
        let (chrom, start, end) = parse_interval(&fields)?;
        let Some(contig) = contigs.iter().find(|c| names_match(&c.name, &chrom)) else {
            if warned.insert(chrom.clone()) {
                warn!("BED contig '{chrom}' not found in reference, dropping its intervals");
            }
            continue;
        };
        out.entry(contig.name.clone()).or_default().push(start..end);
    }
    Ok(out)
}

/// Reads a BED file whose 4th column is a per-region rate multiplier (used
/// for the mutation-rate BED). Falls back to `1.0` for lines missing it.
/// Contig names are resolved the same way as `read_bed_intervals`.
pub fn read_bed_multipliers(
    path: &str,
    contigs: &[Contig],
) -> Result<HashMap<String, Vec<(Range<usize>, f64)>>, EngineError> {
    let mut out: HashMap<String, Vec<(Range<usize>, f64)>> = HashMap::new();
    let mut warned = std::collections::HashSet::new();
    for fields in bed_lines(path)? {
        if fields.len() < 3 {
            return Err(EngineError::BedParse(format!("malformed BED record: {:?}", fields)));
        }
        let (chrom, start, end) = parse_interval(&fields)?;
        let multiplier = fields
            .get(3)
            .map(|s| s.parse::<f64>())
            .transpose()
            .map_err(|_| EngineError::BedParse(format!("bad multiplier column: {:?}", fields)))?
            .unwrap_or(1.0);
        let Some(contig) = contigs.iter().find(|c| names_match(&c.name, &chrom)) else {
            if warned.insert(chrom.clone()) {
                warn!("BED contig '{chrom}' not found in reference, dropping its intervals");
            }
            continue;
        };
        out.entry(contig.name.clone()).or_default().push((start..end, multiplier));
    }
    Ok(out)
}

fn parse_interval(fields: &[String]) -> Result<(String, usize, usize), EngineError> {
    let chrom = fields[0].clone();
    let start: usize = fields[1]
        .parse()
        .map_err(|_| EngineError::BedParse(format!("bad start column: {:?}", fields)))?;
    let end: usize = fields[2]
        .parse()
        .map_err(|_| EngineError::BedParse(format!("bad end column: {:?}", fields)))?;
    if end < start {
        return Err(EngineError::BedParse(format!(
            "interval end {end} precedes start {start} for {chrom}"
        )));
    }
    Ok((chrom, start, end))
}

fn bed_lines(path: &str) -> Result<Vec<Vec<String>>, EngineError> {
    let file = File::open(path).map_err(|e| EngineError::BedParse(format!("{path}: {e}")))?;
    let reader = BufReader::new(file);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| EngineError::BedParse(e.to_string()))?;
        if line.is_empty() || line.starts_with('#') || line.starts_with("track") || line.starts_with("browser") {
            continue;
        }
        lines.push(line.split_whitespace().map(str::to_string).collect());
    }
    Ok(lines)
}

/// Normalizes a contig name and its BED-file counterpart so `chr1`/`1` match.
pub fn names_match(reference_name: &str, bed_name: &str) -> bool {
    reference_name == bed_name
        || reference_name.trim_start_matches("chr") == bed_name.trim_start_matches("chr")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn reference() -> Vec<Contig> {
        vec![Contig::new("chr1", b"A".repeat(1000), 0)]
    }

    #[test]
    fn reads_plain_intervals() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t100\t200").unwrap();
        writeln!(file, "chr1\t300\t400").unwrap();
        let intervals = read_bed_intervals(file.path().to_str().unwrap(), &reference()).unwrap();
        assert_eq!(intervals["chr1"], vec![100..200, 300..400]);
    }

    #[test]
    fn fourth_column_becomes_a_multiplier() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t100\t200\t5.0").unwrap();
        writeln!(file, "chr1\t300\t400").unwrap();
        let intervals = read_bed_multipliers(file.path().to_str().unwrap(), &reference()).unwrap();
        assert_eq!(intervals["chr1"][0], (100..200, 5.0));
        assert_eq!(intervals["chr1"][1], (300..400, 1.0));
    }

    #[test]
    fn rejects_inverted_interval() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t200\t100").unwrap();
        assert!(read_bed_intervals(file.path().to_str().unwrap(), &reference()).is_err());
    }

    #[test]
    fn comment_and_track_lines_are_skipped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "track name=foo").unwrap();
        writeln!(file, "# a comment").unwrap();
        writeln!(file, "chr1\t0\t10").unwrap();
        let intervals = read_bed_intervals(file.path().to_str().unwrap(), &reference()).unwrap();
        assert_eq!(intervals["chr1"], vec![0..10]);
    }

    #[test]
    fn chr_prefix_is_normalized() {
        let contigs = vec![Contig::new("1", b"A".repeat(1000), 0)];
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t0\t10").unwrap();
        let intervals = read_bed_intervals(file.path().to_str().unwrap(), &contigs).unwrap();
        assert!(intervals.contains_key("1"));
    }
}
