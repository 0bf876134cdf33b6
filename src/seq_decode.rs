use rust_htslib::bam;

// Same table rust-htslib uses for its 4-bit base codes (bam/record.rs `DECODE_BASE`).
const DECODE_BASE: &[u8; 16] = b"=ACMGRSVTWYHKDBN";

/// htslib fills QUAL with 0xFF when the record has none
const MISSING_QUAL: u8 = 0xFF;

/// Reusable decode buffers for the reader thread
///
/// Each record is decoded into the same two allocations; only the final
/// owned copy handed to a worker allocates.
#[derive(Debug, Default)]
pub struct RecordBuffers {
    pub sequence: Vec<u8>,
    pub qualities: Vec<u8>,
}

impl RecordBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode bases and qualities of `read`.
    ///
    /// A record without stored qualities gets all-zero qualities so none of
    /// its bases pass a base-quality threshold.
    pub fn fill(&mut self, read: &bam::Record) {
        decode_seq_into(read, &mut self.sequence);
        self.qualities.clear();
        let qual = read.qual();
        if qual.first() == Some(&MISSING_QUAL) {
            self.qualities.resize(qual.len(), 0);
        } else {
            self.qualities.extend_from_slice(qual);
        }
    }
}

/// Decode a BAM record's 4-bit packed sequence into `out` (high nibble first).
pub fn decode_seq_into(read: &bam::Record, out: &mut Vec<u8>) {
    let seq = read.seq();
    let len = seq.len();

    out.clear();
    out.reserve(len);
    for packed in seq.encoded.iter().copied() {
        out.push(DECODE_BASE[(packed >> 4) as usize]);
        if out.len() == len {
            break;
        }
        out.push(DECODE_BASE[(packed & 0x0F) as usize]);
        if out.len() == len {
            break;
        }
    }
}
