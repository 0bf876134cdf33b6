//! Read projection onto reference coordinates
//!
//! Turns one alignment record into a [`MappedRead`]: the bases and qualities
//! the read contributes at each reference position, starting at its leftmost
//! mapped base.
//!
//! ## CIGAR Operations
//! - M/=/X: consume both ref and query, copied verbatim
//! - I/S: consume query only, dropped
//! - D/N: consume ref only, filled with `*` and quality 0
//! - H/P: consume neither (hard-clipped bases are not stored in SEQ)

use anyhow::Result;
use rust_htslib::bam::record::Cigar;

use crate::config::CorrConfig;
use crate::error::CorrError;

/// Placeholder base for reference positions the read does not observe
pub const PLACEHOLDER_BASE: u8 = b'*';
/// Quality paired with [`PLACEHOLDER_BASE`]
pub const PLACEHOLDER_QUAL: u8 = 0;

/// One alignment operation with its length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignOp {
    Match(u32),
    Equal(u32),
    Diff(u32),
    Insertion(u32),
    SoftClip(u32),
    HardClip(u32),
    Deletion(u32),
    Skip(u32),
    Padding(u32),
}

impl AlignOp {
    pub fn from_cigar(op: &Cigar) -> Self {
        match *op {
            Cigar::Match(len) => AlignOp::Match(len),
            Cigar::Equal(len) => AlignOp::Equal(len),
            Cigar::Diff(len) => AlignOp::Diff(len),
            Cigar::Ins(len) => AlignOp::Insertion(len),
            Cigar::SoftClip(len) => AlignOp::SoftClip(len),
            Cigar::HardClip(len) => AlignOp::HardClip(len),
            Cigar::Del(len) => AlignOp::Deletion(len),
            Cigar::RefSkip(len) => AlignOp::Skip(len),
            Cigar::Pad(len) => AlignOp::Padding(len),
        }
    }
}

/// Owned, thread-safe copy of an alignment record
///
/// htslib records carry a non-`Send` header handle, so the reader converts
/// every record into this form before it leaves the reader thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub reference_id: i32,
    /// 0-based leftmost reference position
    pub position: i64,
    pub mapping_quality: u8,
    pub ops: Vec<AlignOp>,
    /// Decoded read bases (ASCII)
    pub sequence: Vec<u8>,
    /// Phred base qualities, 1:1 with `sequence`
    pub qualities: Vec<u8>,
}

/// Section of a read mapped onto the reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRead {
    /// Reference coordinate of the leftmost mapped base
    pub position: usize,
    /// Reference-frame bases, uppercase, `*` where deleted or skipped
    pub bases: Vec<u8>,
    /// Qualities aligned 1:1 with `bases`
    pub qualities: Vec<u8>,
}

impl MappedRead {
    pub fn new(position: usize, bases: Vec<u8>, qualities: Vec<u8>) -> Self {
        debug_assert_eq!(bases.len(), qualities.len());
        Self {
            position,
            bases,
            qualities,
        }
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Last reference position this read can overlap (`position + len`)
    pub fn span_end(&self) -> usize {
        self.position + self.bases.len()
    }
}

/// Why a record did not become a [`MappedRead`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    MappingQuality,
    EmptySequence,
}

/// Per-batch projection counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProjectionStats {
    pub reads_used: usize,
    pub discard_mapping_quality: usize,
    pub discard_empty_sequence: usize,
}

impl ProjectionStats {
    pub fn record(&mut self, outcome: &Result<MappedRead, Exclusion>) {
        match outcome {
            Ok(_) => self.reads_used += 1,
            Err(Exclusion::MappingQuality) => self.discard_mapping_quality += 1,
            Err(Exclusion::EmptySequence) => self.discard_empty_sequence += 1,
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            reads_used: self.reads_used + other.reads_used,
            discard_mapping_quality: self.discard_mapping_quality + other.discard_mapping_quality,
            discard_empty_sequence: self.discard_empty_sequence + other.discard_empty_sequence,
        }
    }
}

/// Mapping-quality filter plus CIGAR projection
#[derive(Debug, Clone, Copy)]
pub struct ReadProjector {
    min_mapping_quality: u8,
    max_mapping_quality: u8,
}

impl ReadProjector {
    pub fn new(config: &CorrConfig) -> Self {
        Self {
            min_mapping_quality: config.min_mapping_quality,
            max_mapping_quality: config.max_mapping_quality,
        }
    }

    /// Keeps `min < mapq <= max`.
    pub fn passes_mapping_quality(&self, mapq: u8) -> bool {
        mapq > self.min_mapping_quality && mapq <= self.max_mapping_quality
    }

    /// Project a record, or report why it was excluded.
    ///
    /// The outer `Result` carries fatal problems only (malformed records).
    pub fn project(&self, record: &AlignmentRecord) -> Result<Result<MappedRead, Exclusion>> {
        if !self.passes_mapping_quality(record.mapping_quality) {
            return Ok(Err(Exclusion::MappingQuality));
        }
        if record.sequence.is_empty() {
            return Ok(Err(Exclusion::EmptySequence));
        }
        if record.position < 0 {
            return Err(malformed(record, "negative position on a mapped record").into());
        }
        if record.qualities.len() != record.sequence.len() {
            return Err(malformed(
                record,
                &format!(
                    "{} qualities for {} bases",
                    record.qualities.len(),
                    record.sequence.len()
                ),
            )
            .into());
        }

        let mut bases = Vec::with_capacity(record.sequence.len());
        let mut qualities = Vec::with_capacity(record.sequence.len());
        let mut query_pos: usize = 0;

        for op in &record.ops {
            match *op {
                AlignOp::Match(len) | AlignOp::Equal(len) | AlignOp::Diff(len) => {
                    let end = query_pos + len as usize;
                    if end > record.sequence.len() {
                        return Err(malformed(record, "CIGAR consumes more bases than SEQ").into());
                    }
                    bases.extend(record.sequence[query_pos..end].iter().map(u8::to_ascii_uppercase));
                    qualities.extend_from_slice(&record.qualities[query_pos..end]);
                    query_pos = end;
                }
                AlignOp::Insertion(len) | AlignOp::SoftClip(len) => {
                    query_pos += len as usize;
                    if query_pos > record.sequence.len() {
                        return Err(malformed(record, "CIGAR consumes more bases than SEQ").into());
                    }
                }
                AlignOp::Deletion(len) | AlignOp::Skip(len) => {
                    bases.extend(std::iter::repeat(PLACEHOLDER_BASE).take(len as usize));
                    qualities.extend(std::iter::repeat(PLACEHOLDER_QUAL).take(len as usize));
                }
                AlignOp::HardClip(_) | AlignOp::Padding(_) => {}
            }
        }

        Ok(Ok(MappedRead::new(record.position as usize, bases, qualities)))
    }
}

fn malformed(record: &AlignmentRecord, reason: &str) -> CorrError {
    CorrError::MalformedRecord {
        position: record.position,
        reason: reason.to_string(),
    }
}
