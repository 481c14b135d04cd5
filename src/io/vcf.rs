use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};

use log::warn;

use crate::contig::Contig;
use crate::errors::EngineError;
use crate::variant::{IngestReport, Variant};

/// Reads a VCF file and splits its records per contig, validating each
/// against the reference and returning both the accepted variants and an
/// ingest report of what was skipped and why.
///
/// This is a minimal, permissive reader: no INFO/FORMAT schema validation,
/// tab-split records, first sample column only. Good enough for ground-truth
/// variant injection, not a general-purpose VCF parser.
pub fn read_vcf_variants(
    path: &str,
    contigs: &[Contig],
    ploidy: usize,
) -> Result<HashMap<String, (Vec<Variant>, IngestReport)>, EngineError> {
    let file = File::open(path).map_err(|e| EngineError::VcfParse(format!("{path}: {e}")))?;
    let reader = BufReader::new(file);

    let mut by_contig: HashMap<String, (Vec<Variant>, IngestReport)> = HashMap::new();
    let mut warned_contigs = std::collections::HashSet::new();

    for line in reader.lines() {
        let line = line.map_err(|e| EngineError::VcfParse(e.to_string()))?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 5 {
            return Err(EngineError::VcfParse(format!("malformed record: {line}")));
        }

        let chrom = fields[0];
        let Some(contig) = contigs.iter().find(|c| names_match(&c.name, chrom)) else {
            if warned_contigs.insert(chrom.to_string()) {
                warn!("VCF contig '{chrom}' not found in reference, dropping its variants");
            }
            continue;
        };

        let pos_1based: usize = fields[1]
            .parse()
            .map_err(|_| EngineError::VcfParse(format!("bad POS in: {line}")))?;
        let id = fields[2];
        let reference = fields[3];
        let alt_field = fields[4];
        let alt = alt_field.split(',').next().unwrap_or(alt_field);
        let genotype = fields
            .get(9)
            .and_then(|sample| parse_genotype(sample, ploidy))
            .unwrap_or_else(|| vec![true; ploidy]);

        let entry = by_contig
            .entry(contig.name.clone())
            .or_insert_with(|| (Vec::new(), IngestReport::new()));

        match classify(&contig.sequence, pos_1based, reference, alt, genotype) {
            Classified::Accepted(variant) => {
                entry.0.push(variant);
                entry.1.accepted += 1;
            }
            Classified::RefMismatch => entry.1.ref_mismatch += 1,
            Classified::NOverlap => entry.1.n_overlap += 1,
            Classified::NonAcgtAlt => entry.1.non_acgt_alt += 1,
        }
        let _ = id;
    }

    for (contig_name, (_, report)) in &by_contig {
        report.log_summary(contig_name);
    }
    Ok(by_contig)
}

enum Classified {
    Accepted(Variant),
    RefMismatch,
    NOverlap,
    NonAcgtAlt,
}

fn classify(sequence: &[u8], pos_1based: usize, reference: &str, alt: &str, genotype: Vec<bool>) -> Classified {
    let reference = reference.as_bytes();
    let alt = alt.as_bytes();
    if !alt.iter().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T')) {
        return Classified::NonAcgtAlt;
    }

    let zero_based = pos_1based.saturating_sub(1);
    let span_end = (zero_based + reference.len()).min(sequence.len());
    if zero_based >= sequence.len() || &sequence[zero_based..span_end] != reference {
        return Classified::RefMismatch;
    }
    if sequence[zero_based..span_end].contains(&b'N') {
        return Classified::NOverlap;
    }

    if reference.len() == 1 && alt.len() == 1 {
        return Classified::Accepted(Variant::Snp {
            pos: zero_based,
            reference: reference[0],
            alt: alt[0],
            genotype,
        });
    }
    if alt.len() > reference.len() {
        return Classified::Accepted(Variant::Ins {
            pos: pos_1based,
            seq: alt[reference.len()..].to_vec(),
            genotype,
        });
    }
    if reference.len() > alt.len() {
        return Classified::Accepted(Variant::Del {
            pos: pos_1based,
            len: reference.len() - alt.len(),
            genotype,
        });
    }
    Classified::NonAcgtAlt
}

fn parse_genotype(sample: &str, ploidy: usize) -> Option<Vec<bool>> {
    let gt = sample.split(':').next()?;
    let mut alleles: Vec<bool> = gt
        .split(|c| c == '/' || c == '|')
        .map(|a| a != "0" && a != ".")
        .collect();
    if alleles.is_empty() {
        return None;
    }
    alleles.resize(ploidy, *alleles.last().unwrap_or(&false));
    Some(alleles)
}

fn names_match(reference_name: &str, vcf_name: &str) -> bool {
    reference_name == vcf_name
        || reference_name.trim_start_matches("chr") == vcf_name.trim_start_matches("chr")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn reference() -> Vec<Contig> {
        vec![Contig::new("chr1", b"ACGTACGTACGTACGT".to_vec(), 0)]
    }

    fn write_vcf(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "##fileformat=VCFv4.2").unwrap();
        writeln!(file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSAMPLE").unwrap();
        write!(file, "{body}").unwrap();
        file
    }

    #[test]
    fn accepts_a_matching_snp() {
        let contigs = reference();
        let file = write_vcf("chr1\t1\t.\tA\tG\t.\t.\t.\tGT\t1/1\n");
        let result = read_vcf_variants(file.path().to_str().unwrap(), &contigs, 2).unwrap();
        let (variants, report) = &result["chr1"];
        assert_eq!(variants.len(), 1);
        assert_eq!(report.accepted, 1);
        assert!(matches!(variants[0], Variant::Snp { pos: 0, .. }));
    }

    #[test]
    fn ref_mismatch_is_skipped_and_counted() {
        let contigs = reference();
        let file = write_vcf("chr1\t1\t.\tT\tG\t.\t.\t.\tGT\t1/1\n");
        let result = read_vcf_variants(file.path().to_str().unwrap(), &contigs, 2).unwrap();
        let (variants, report) = &result["chr1"];
        assert!(variants.is_empty());
        assert_eq!(report.ref_mismatch, 1);
    }

    #[test]
    fn chr_prefix_is_normalized() {
        let contigs = vec![Contig::new("1", b"ACGTACGT".to_vec(), 0)];
        let file = write_vcf("chr1\t1\t.\tA\tG\t.\t.\t.\tGT\t1/1\n");
        let result = read_vcf_variants(file.path().to_str().unwrap(), &contigs, 2).unwrap();
        assert!(result.contains_key("1"));
    }

    #[test]
    fn insertion_records_the_inserted_tail() {
        let contigs = reference();
        let file = write_vcf("chr1\t2\t.\tC\tCGG\t.\t.\t.\tGT\t1/1\n");
        let result = read_vcf_variants(file.path().to_str().unwrap(), &contigs, 2).unwrap();
        let (variants, _) = &result["chr1"];
        match &variants[0] {
            Variant::Ins { pos, seq, .. } => {
                assert_eq!(*pos, 2);
                assert_eq!(seq, b"GG");
            }
            other => panic!("expected Ins, got {other:?}"),
        }
    }
}
