//! Alignment source
//!
//! Streams SAM/BAM/CRAM records (format detected by htslib) and groups
//! contiguous runs sharing a reference id into [`Batch`]es. Records are
//! converted into owned [`AlignmentRecord`]s on the reader thread, since
//! `bam::Record` holds an `Rc<HeaderView>` and must not cross threads.

use anyhow::{Context, Result};
use log::{debug, info};
use rust_htslib::{bam, bam::Read as BamRead};

use crate::read_projector::{AlignOp, AlignmentRecord};
use crate::seq_decode::RecordBuffers;

const PROGRESS_INTERVAL: usize = 1_000_000;

/// All records of one contiguous reference run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub reference: String,
    pub records: Vec<AlignmentRecord>,
}

impl Batch {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Counters kept by the reader thread
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceStats {
    pub records_read: usize,
    pub unmapped: usize,
    pub batches: usize,
}

/// Build chromosome name lookup from BAM header
pub fn build_tid_lookup(header: &bam::HeaderView) -> Vec<String> {
    (0..header.target_count())
        .map(|tid| String::from_utf8_lossy(header.tid2name(tid)).into_owned())
        .collect()
}

/// Copy the fields the projector needs out of an htslib record.
pub fn to_alignment_record(read: &bam::Record, buffers: &mut RecordBuffers) -> AlignmentRecord {
    buffers.fill(read);
    AlignmentRecord {
        reference_id: read.tid(),
        position: read.pos(),
        mapping_quality: read.mapq(),
        ops: read.cigar().iter().map(AlignOp::from_cigar).collect(),
        sequence: buffers.sequence.clone(),
        qualities: buffers.qualities.clone(),
    }
}

/// Splits a record stream into per-reference batches
#[derive(Debug)]
pub struct BatchBuilder {
    names: Vec<String>,
    current_tid: Option<i32>,
    current: Option<Batch>,
}

impl BatchBuilder {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            current_tid: None,
            current: None,
        }
    }

    /// Add a record; returns the previous batch once the reference changes.
    pub fn push(&mut self, record: AlignmentRecord) -> Option<Batch> {
        let mut finished = None;
        if self.current_tid != Some(record.reference_id) {
            finished = self.current.take();
            self.current_tid = Some(record.reference_id);
            self.current = Some(Batch::new(self.reference_name(record.reference_id)));
        }
        if let Some(batch) = self.current.as_mut() {
            batch.records.push(record);
        }
        finished
    }

    pub fn finish(self) -> Option<Batch> {
        self.current
    }

    fn reference_name(&self, tid: i32) -> String {
        usize::try_from(tid)
            .ok()
            .and_then(|i| self.names.get(i))
            .cloned()
            .unwrap_or_else(|| format!("tid{}", tid))
    }
}

/// Read an alignment file, handing each completed batch to `emit`.
///
/// Unmapped records are counted and skipped. Any read error, or an error
/// returned by `emit`, stops the stream.
pub fn read_batches<F>(path: &str, read_threads: usize, mut emit: F) -> Result<SourceStats>
where
    F: FnMut(Batch) -> Result<()>,
{
    let mut bam = bam::Reader::from_path(path)
        .with_context(|| format!("Failed to open alignment file {}", path))?;
    if read_threads > 1 {
        bam.set_threads(read_threads).ok();
    }
    let names = build_tid_lookup(bam.header());
    info!("Reading {} ({} reference sequences)", path, names.len());

    let mut stats = SourceStats::default();
    let mut builder = BatchBuilder::new(names);
    let mut buffers = RecordBuffers::new();
    let mut record = bam::Record::new();

    while let Some(result) = bam.read(&mut record) {
        result.with_context(|| {
            format!("Failed to read record {} from {}", stats.records_read + 1, path)
        })?;
        stats.records_read += 1;

        if record.is_unmapped() || record.tid() < 0 {
            stats.unmapped += 1;
            continue;
        }

        if let Some(batch) = builder.push(to_alignment_record(&record, &mut buffers)) {
            debug!("Dispatching batch {} ({} records)", batch.reference, batch.len());
            stats.batches += 1;
            emit(batch)?;
        }

        if stats.records_read % PROGRESS_INTERVAL == 0 {
            info!("  {} records read, {} batches dispatched", stats.records_read, stats.batches);
        }
    }

    if let Some(batch) = builder.finish() {
        debug!("Dispatching batch {} ({} records)", batch.reference, batch.len());
        stats.batches += 1;
        emit(batch)?;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_htslib::bam::record::{Cigar, CigarString};

    fn alignment(tid: i32, pos: i64) -> AlignmentRecord {
        AlignmentRecord {
            reference_id: tid,
            position: pos,
            mapping_quality: 40,
            ops: vec![AlignOp::Match(3)],
            sequence: b"ACG".to_vec(),
            qualities: vec![30; 3],
        }
    }

    #[test]
    fn test_to_alignment_record() {
        let cigar = CigarString(vec![Cigar::SoftClip(1), Cigar::Match(3), Cigar::Del(2), Cigar::Match(1)]);
        let mut rec = bam::Record::new();
        rec.set(b"read1", Some(&cigar), b"NACGT", &[5, 30, 31, 32, 33]);
        rec.set_tid(2);
        rec.set_pos(1234);
        rec.set_mapq(42);

        let mut buffers = RecordBuffers::new();
        let aln = to_alignment_record(&rec, &mut buffers);
        assert_eq!(aln.reference_id, 2);
        assert_eq!(aln.position, 1234);
        assert_eq!(aln.mapping_quality, 42);
        assert_eq!(
            aln.ops,
            vec![AlignOp::SoftClip(1), AlignOp::Match(3), AlignOp::Deletion(2), AlignOp::Match(1)]
        );
        assert_eq!(aln.sequence, b"NACGT".to_vec());
        assert_eq!(aln.qualities, vec![5, 30, 31, 32, 33]);
    }

    #[test]
    fn test_batches_follow_reference_runs() {
        let mut builder = BatchBuilder::new(vec!["chrA".into(), "chrB".into()]);
        assert!(builder.push(alignment(0, 10)).is_none());
        assert!(builder.push(alignment(0, 20)).is_none());

        let first = builder.push(alignment(1, 5)).unwrap();
        assert_eq!(first.reference, "chrA");
        assert_eq!(first.len(), 2);

        assert!(builder.push(alignment(1, 6)).is_none());
        let last = builder.finish().unwrap();
        assert_eq!(last.reference, "chrB");
        assert_eq!(last.records.iter().map(|r| r.position).collect::<Vec<_>>(), vec![5, 6]);
    }

    #[test]
    fn test_reference_missing_from_header() {
        let mut builder = BatchBuilder::new(vec!["chrA".into()]);
        builder.push(alignment(7, 1));
        assert_eq!(builder.finish().unwrap().reference, "tid7");
    }

    #[test]
    fn test_empty_stream_has_no_batch() {
        assert!(BatchBuilder::new(Vec::new()).finish().is_none());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = read_batches("/nonexistent/reads.bam", 1, |_| Ok(())).unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
