use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use rust_htslib::bam::header::HeaderRecord;
use rust_htslib::bam::record::{Cigar, CigarString, Record};
use rust_htslib::bam::{self, Header, Writer as BamWriter};

use crate::errors::EngineError;

/// Accepts reads, variants, and unmapped records. `write_bam` calls within a
/// contig must arrive in non-decreasing `pos` up to the next `flush`; sinks
/// that don't write BAM (FASTQ/VCF) simply no-op the calls that don't apply
/// to them, so a scheduler can hold one `&mut dyn OutputSink` regardless of
/// which outputs were requested.
pub trait OutputSink {
    fn write_fastq(
        &mut self,
        name: &str,
        bases: &[u8],
        quals: &[u8],
        mate: Option<(&[u8], &[u8])>,
    ) -> Result<(), EngineError>;

    #[allow(clippy::too_many_arguments)]
    fn write_bam(
        &mut self,
        contig_idx: usize,
        name: &str,
        pos: Option<usize>,
        cigar: Option<&CigarString>,
        bases: &[u8],
        quals: &[u8],
        flag: u16,
        mate_pos: Option<usize>,
        mapq: Option<u8>,
    ) -> Result<(), EngineError>;

    #[allow(clippy::too_many_arguments)]
    fn write_vcf(
        &mut self,
        contig: &str,
        pos_1based: usize,
        id: &str,
        reference: &str,
        alts: &[String],
        qual: f64,
        filter: &str,
        genotype: &str,
    ) -> Result<(), EngineError>;

    fn flush(&mut self, bam_max_pos: usize) -> Result<(), EngineError>;

    /// Must be idempotent; a host may call this after an aborted run.
    fn close(&mut self) -> Result<(), EngineError>;
}

fn open_writer(path: &Path) -> Result<Box<dyn Write>, EngineError> {
    let file = File::create(path)?;
    let buffered = BufWriter::new(file);
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(GzEncoder::new(buffered, Compression::default())))
    } else {
        Ok(Box::new(buffered))
    }
}

fn write_fastq_record(
    writer: &mut dyn Write,
    name: &str,
    bases: &[u8],
    quals: &[u8],
    mate_number: u8,
) -> Result<(), EngineError> {
    writeln!(writer, "@{name}/{mate_number}")?;
    writer.write_all(bases)?;
    writeln!(writer)?;
    writeln!(writer, "+")?;
    writer.write_all(quals)?;
    writeln!(writer)?;
    Ok(())
}

/// Buffered single- or paired-end FASTQ writer; gzips automatically when the
/// output path ends in `.gz`.
pub struct FastqSink {
    mate1: Box<dyn Write>,
    mate2: Option<Box<dyn Write>>,
}

impl FastqSink {
    pub fn new(path1: &Path, path2: Option<&Path>) -> Result<Self, EngineError> {
        let mate1 = open_writer(path1)?;
        let mate2 = path2.map(open_writer).transpose()?;
        Ok(Self { mate1, mate2 })
    }
}

impl OutputSink for FastqSink {
    fn write_fastq(
        &mut self,
        name: &str,
        bases: &[u8],
        quals: &[u8],
        mate: Option<(&[u8], &[u8])>,
    ) -> Result<(), EngineError> {
        write_fastq_record(&mut *self.mate1, name, bases, quals, 1)?;
        if let (Some((mate_bases, mate_quals)), Some(writer)) = (mate, self.mate2.as_deref_mut()) {
            write_fastq_record(writer, name, mate_bases, mate_quals, 2)?;
        }
        Ok(())
    }

    fn write_bam(&mut self, _: usize, _: &str, _: Option<usize>, _: Option<&CigarString>, _: &[u8], _: &[u8], _: u16, _: Option<usize>, _: Option<u8>) -> Result<(), EngineError> {
        Ok(())
    }

    fn write_vcf(&mut self, _: &str, _: usize, _: &str, _: &str, _: &[String], _: f64, _: &str, _: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn flush(&mut self, _bam_max_pos: usize) -> Result<(), EngineError> {
        self.mate1.flush()?;
        if let Some(writer) = self.mate2.as_deref_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.flush(0)
    }
}

/// Minimal VCF writer: `##fileformat`/`##contig` header plus one record per
/// ledger entry, sorted by position by the caller.
pub struct VcfSink {
    writer: Box<dyn Write>,
}

impl VcfSink {
    pub fn new(path: &Path, contigs: &[(String, usize)]) -> Result<Self, EngineError> {
        let mut writer = open_writer(path)?;
        writeln!(writer, "##fileformat=VCFv4.2")?;
        for (name, len) in contigs {
            writeln!(writer, "##contig=<ID={name},length={len}>")?;
        }
        writeln!(writer, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSAMPLE")?;
        Ok(Self { writer })
    }
}

impl OutputSink for VcfSink {
    fn write_fastq(&mut self, _: &str, _: &[u8], _: &[u8], _: Option<(&[u8], &[u8])>) -> Result<(), EngineError> {
        Ok(())
    }

    fn write_bam(&mut self, _: usize, _: &str, _: Option<usize>, _: Option<&CigarString>, _: &[u8], _: &[u8], _: u16, _: Option<usize>, _: Option<u8>) -> Result<(), EngineError> {
        Ok(())
    }

    fn write_vcf(
        &mut self,
        contig: &str,
        pos_1based: usize,
        id: &str,
        reference: &str,
        alts: &[String],
        qual: f64,
        filter: &str,
        genotype: &str,
    ) -> Result<(), EngineError> {
        let alt_field = if alts.is_empty() { ".".to_string() } else { alts.join(",") };
        writeln!(
            self.writer,
            "{contig}\t{pos_1based}\t{id}\t{reference}\t{alt_field}\t{qual:.1}\t{filter}\t.\tGT\t{genotype}"
        )?;
        Ok(())
    }

    fn flush(&mut self, _bam_max_pos: usize) -> Result<(), EngineError> {
        self.writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.flush(0)
    }
}

/// `rust-htslib`-backed BAM writer. Unmapped records are buffered and
/// written in `close()`, after every mapped record, per spec.md §5's
/// ordering guarantee.
pub struct BamSink {
    writer: BamWriter,
    unmapped: Vec<Record>,
}

impl BamSink {
    pub fn new(path: &Path, contigs: &[(String, usize)]) -> Result<Self, EngineError> {
        let mut header = Header::new();
        for (name, len) in contigs {
            let mut record = HeaderRecord::new(b"SQ");
            record.push_tag(b"SN", name);
            record.push_tag(b"LN", *len as i64);
            header.push_record(&record);
        }
        let writer = BamWriter::from_path(path, &header, bam::Format::Bam)
            .map_err(|e| EngineError::OutputSink(e.to_string()))?;
        Ok(Self { writer, unmapped: Vec::new() })
    }

    fn write_record(&mut self, record: &Record) -> Result<(), EngineError> {
        self.writer.write(record).map_err(|e| EngineError::OutputSink(e.to_string()))
    }
}

impl OutputSink for BamSink {
    fn write_fastq(&mut self, _: &str, _: &[u8], _: &[u8], _: Option<(&[u8], &[u8])>) -> Result<(), EngineError> {
        Ok(())
    }

    fn write_bam(
        &mut self,
        contig_idx: usize,
        name: &str,
        pos: Option<usize>,
        cigar: Option<&CigarString>,
        bases: &[u8],
        quals: &[u8],
        flag: u16,
        mate_pos: Option<usize>,
        mapq: Option<u8>,
    ) -> Result<(), EngineError> {
        let mut record = Record::new();
        let empty_cigar = CigarString(Vec::new());
        record.set(name.as_bytes(), Some(cigar.unwrap_or(&empty_cigar)), bases, quals);
        record.set_tid(contig_idx as i32);
        record.set_pos(pos.map(|p| p as i64).unwrap_or(-1));
        record.set_flags(flag);
        if let Some(mapq) = mapq {
            record.set_mapq(mapq);
        }
        if let Some(mate_pos) = mate_pos {
            record.set_mtid(contig_idx as i32);
            record.set_mpos(mate_pos as i64);
        }

        if pos.is_none() {
            self.unmapped.push(record);
            Ok(())
        } else {
            self.write_record(&record)
        }
    }

    fn write_vcf(&mut self, _: &str, _: usize, _: &str, _: &str, _: &[String], _: f64, _: &str, _: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn flush(&mut self, _bam_max_pos: usize) -> Result<(), EngineError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        for record in self.unmapped.drain(..) {
            self.writer.write(&record).map_err(|e| EngineError::OutputSink(e.to_string()))?;
        }
        Ok(())
    }
}

/// Writes the final mutated haplotype per ploid per contig for
/// `RunMode::FastaOnly`. Not an `OutputSink` — it's driven directly by the
/// scheduler once a contig's windows are exhausted, not per-read.
pub struct FastaSink {
    writer: Box<dyn Write>,
}

impl FastaSink {
    pub fn new(path: &Path) -> Result<Self, EngineError> {
        Ok(Self { writer: open_writer(path)? })
    }

    pub fn write_haplotype(&mut self, contig: &str, ploid: usize, bases: &[u8]) -> Result<(), EngineError> {
        writeln!(self.writer, ">{contig}_ploid{ploid}")?;
        for chunk in bases.chunks(70) {
            self.writer.write_all(chunk)?;
            writeln!(self.writer)?;
        }
        Ok(())
    }
}

/// Discards everything. Used to drive `WindowScheduler` when a run only
/// wants its final variant ledger or FASTA haplotypes, with no per-read
/// output — still needs to sample reads to reach the right code paths, but
/// nothing reads that output.
#[derive(Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write_fastq(&mut self, _: &str, _: &[u8], _: &[u8], _: Option<(&[u8], &[u8])>) -> Result<(), EngineError> {
        Ok(())
    }

    fn write_bam(&mut self, _: usize, _: &str, _: Option<usize>, _: Option<&CigarString>, _: &[u8], _: &[u8], _: u16, _: Option<usize>, _: Option<u8>) -> Result<(), EngineError> {
        Ok(())
    }

    fn write_vcf(&mut self, _: &str, _: usize, _: &str, _: &str, _: &[String], _: f64, _: &str, _: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn flush(&mut self, _: usize) -> Result<(), EngineError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Fans a call out to every sink requested for this run (any subset of
/// FASTQ/BAM/VCF).
#[derive(Default)]
pub struct CompositeSink {
    sinks: Vec<Box<dyn OutputSink>>,
}

impl CompositeSink {
    pub fn new(sinks: Vec<Box<dyn OutputSink>>) -> Self {
        Self { sinks }
    }
}

impl OutputSink for CompositeSink {
    fn write_fastq(&mut self, name: &str, bases: &[u8], quals: &[u8], mate: Option<(&[u8], &[u8])>) -> Result<(), EngineError> {
        for sink in &mut self.sinks {
            sink.write_fastq(name, bases, quals, mate)?;
        }
        Ok(())
    }

    fn write_bam(
        &mut self,
        contig_idx: usize,
        name: &str,
        pos: Option<usize>,
        cigar: Option<&CigarString>,
        bases: &[u8],
        quals: &[u8],
        flag: u16,
        mate_pos: Option<usize>,
        mapq: Option<u8>,
    ) -> Result<(), EngineError> {
        for sink in &mut self.sinks {
            sink.write_bam(contig_idx, name, pos, cigar, bases, quals, flag, mate_pos, mapq)?;
        }
        Ok(())
    }

    fn write_vcf(
        &mut self,
        contig: &str,
        pos_1based: usize,
        id: &str,
        reference: &str,
        alts: &[String],
        qual: f64,
        filter: &str,
        genotype: &str,
    ) -> Result<(), EngineError> {
        for sink in &mut self.sinks {
            sink.write_vcf(contig, pos_1based, id, reference, alts, qual, filter, genotype)?;
        }
        Ok(())
    }

    fn flush(&mut self, bam_max_pos: usize) -> Result<(), EngineError> {
        for sink in &mut self.sinks {
            sink.flush(bam_max_pos)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        for sink in &mut self.sinks {
            sink.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn fastq_sink_writes_both_mates() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = dir.path().join("r1.fastq");
        let p2 = dir.path().join("r2.fastq");
        let mut sink = FastqSink::new(&p1, Some(&p2)).unwrap();
        sink.write_fastq("read0", b"ACGT", b"IIII", Some((b"TGCA", b"JJJJ"))).unwrap();
        sink.close().unwrap();

        let mut contents1 = String::new();
        File::open(&p1).unwrap().read_to_string(&mut contents1).unwrap();
        assert!(contents1.contains("@read0/1"));
        assert!(contents1.contains("ACGT"));

        let mut contents2 = String::new();
        File::open(&p2).unwrap().read_to_string(&mut contents2).unwrap();
        assert!(contents2.contains("@read0/2"));
        assert!(contents2.contains("TGCA"));
    }

    #[test]
    fn vcf_sink_writes_header_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.vcf");
        let mut sink = VcfSink::new(&path, &[("chr1".to_string(), 1000)]).unwrap();
        sink.write_vcf("chr1", 101, ".", "A", &["G".to_string()], 60.0, "PASS", "1|0").unwrap();
        sink.close().unwrap();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert!(contents.contains("##contig=<ID=chr1,length=1000>"));
        assert!(contents.contains("chr1\t101\t.\tA\tG\t60.0\tPASS\t.\tGT\t1|0"));
    }

    #[test]
    fn fasta_sink_wraps_at_seventy_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.fasta");
        let mut sink = FastaSink::new(&path).unwrap();
        let bases = vec![b'A'; 150];
        sink.write_haplotype("chr1", 0, &bases).unwrap();
        drop(sink);

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], ">chr1_ploid0");
        assert_eq!(lines[1].len(), 70);
        assert_eq!(lines[2].len(), 70);
        assert_eq!(lines[3].len(), 10);
    }
}
