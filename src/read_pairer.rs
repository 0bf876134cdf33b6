//! Overlapping read pairing
//!
//! Streams position-sorted [`MappedRead`]s for one reference sequence and
//! reports every pair whose reference spans overlap, exactly once, without
//! holding more than the reads that could still overlap a future read.
//!
//! # Algorithm
//! 1. Before accepting `current`, evict every head read whose span ends
//!    before `current.position`; nothing arriving later can overlap it.
//! 2. When a head is evicted, pair it with the following window reads from
//!    the front, stopping at the first one that starts past its span.
//! 3. At end of stream, flush the remaining window the same way.

use std::collections::VecDeque;

use anyhow::Result;

use crate::error::CorrError;
use crate::read_projector::MappedRead;

/// Counters for one pairing run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PairingStats {
    /// Reads accepted into the window
    pub reads_seen: usize,
    /// Overlapping pairs reported
    pub pairs_yielded: usize,
    /// Largest window held at any time
    pub max_window: usize,
}

/// Sliding window over position-sorted reads
#[derive(Debug, Default)]
pub struct WindowPairer {
    window: VecDeque<MappedRead>,
    last_position: Option<usize>,
    stats: PairingStats,
}

impl WindowPairer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &PairingStats {
        &self.stats
    }

    /// Accept the next read, reporting pairs for every head it expires.
    ///
    /// Fails with [`CorrError::UnsortedInput`] when `current` starts before the
    /// previous read; an unsorted stream would otherwise drop pairs silently.
    pub fn push<F>(&mut self, current: MappedRead, mut on_pair: F) -> Result<()>
    where
        F: FnMut(&MappedRead, &MappedRead),
    {
        if let Some(previous) = self.last_position {
            if current.position < previous {
                return Err(CorrError::UnsortedInput {
                    previous,
                    current: current.position,
                }
                .into());
            }
        }
        self.last_position = Some(current.position);

        while let Some(head) = self.window.front() {
            if head.span_end() >= current.position {
                break;
            }
            self.evict_head(&mut on_pair);
        }

        self.window.push_back(current);
        self.stats.reads_seen += 1;
        self.stats.max_window = self.stats.max_window.max(self.window.len());
        Ok(())
    }

    /// Flush the remaining window and return the run's counters.
    pub fn finish<F>(mut self, mut on_pair: F) -> PairingStats
    where
        F: FnMut(&MappedRead, &MappedRead),
    {
        while !self.window.is_empty() {
            self.evict_head(&mut on_pair);
        }
        self.stats
    }

    fn evict_head<F>(&mut self, on_pair: &mut F)
    where
        F: FnMut(&MappedRead, &MappedRead),
    {
        let Some(anchor) = self.window.pop_front() else {
            return;
        };
        for candidate in self.window.iter() {
            if candidate.position > anchor.span_end() {
                break;
            }
            on_pair(&anchor, candidate);
            self.stats.pairs_yielded += 1;
        }
    }
}

/// Pair a whole sorted read stream, collecting the pairs' start positions.
///
/// Convenience for callers that do not need streaming.
pub fn overlapping_pairs<I>(reads: I) -> Result<Vec<(usize, usize)>>
where
    I: IntoIterator<Item = MappedRead>,
{
    let mut pairs = Vec::new();
    let mut pairer = WindowPairer::new();
    for read in reads {
        pairer.push(read, |a, b| pairs.push((a.position, b.position)))?;
    }
    pairer.finish(|a, b| pairs.push((a.position, b.position)));
    Ok(pairs)
}
