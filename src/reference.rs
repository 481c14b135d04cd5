use bio::io::fasta;

use crate::contig::Contig;
use crate::errors::EngineError;

/// Reference genome loaded from FASTA: every contig in file order, uppercased
/// and with non-ACGTN IUPAC ambiguity codes folded to `N` at ingest, so
/// downstream modules never see anything outside that five-symbol alphabet.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    contigs: Vec<Contig>,
}

impl ReferenceIndex {
    pub fn open(path: &str) -> Result<Self, EngineError> {
        let reader = fasta::Reader::from_file(path)
            .map_err(|e| EngineError::ReferenceIo(format!("{path}: {e}")))?;

        let mut contigs = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| EngineError::ReferenceIo(format!("{path}: {e}")))?;
            let sequence = fold_to_canonical_alphabet(record.seq());
            contigs.push(Contig::new(record.id().to_string(), sequence, index));
        }

        if contigs.is_empty() {
            return Err(EngineError::ReferenceIo(format!(
                "{path}: no contigs found in reference FASTA"
            )));
        }
        Ok(Self { contigs })
    }

    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    pub fn get(&self, name: &str) -> Option<&Contig> {
        self.contigs.iter().find(|c| c.name == name)
    }

    /// `(name, length)` pairs in file order, for `@SQ`/`##contig` headers.
    pub fn header_entries(&self) -> Vec<(String, usize)> {
        self.contigs.iter().map(|c| (c.name.clone(), c.len())).collect()
    }
}

fn fold_to_canonical_alphabet(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .map(|b| match b.to_ascii_uppercase() {
            b'A' => b'A',
            b'C' => b'C',
            b'G' => b'G',
            b'T' => b'T',
            _ => b'N',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn lowercase_and_iupac_codes_are_folded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ">chr1\nacgtRYKMn\nACGT").unwrap();
        let reference = ReferenceIndex::open(file.path().to_str().unwrap()).unwrap();
        let contig = reference.get("chr1").unwrap();
        assert_eq!(contig.sequence, b"ACGTNNNNNACGT");
    }

    #[test]
    fn contigs_are_indexed_in_file_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ">a\nACGT\n>b\nTTTT").unwrap();
        let reference = ReferenceIndex::open(file.path().to_str().unwrap()).unwrap();
        assert_eq!(reference.get("a").unwrap().index, 0);
        assert_eq!(reference.get("b").unwrap().index, 1);
    }

    #[test]
    fn rejects_missing_file() {
        assert!(ReferenceIndex::open("/nonexistent/path.fa").is_err());
    }
}
