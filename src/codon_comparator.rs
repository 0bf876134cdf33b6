//! Codon-aware comparison of two overlapping reads
//!
//! Only third codon positions are evaluated, i.e. reference positions `p`
//! with `(p + 1) % 3 == 0`, and only where both reads hold the two preceding
//! bases so a full codon can be translated. A site is observed only when both
//! bases are canonical, both pass the base-quality threshold, and the two
//! codons ending there encode the same amino acid.

use crate::config::CorrConfig;
use crate::genetic_code::GeneticCode;
use crate::read_projector::MappedRead;

/// Distance between consecutive evaluated sites
pub const CODON_LEN: usize = 3;

/// Outcome at one evaluated third-codon position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteObservation {
    /// Excluded: ambiguous base, low quality or non-synonymous context
    Missing,
    Identical,
    Substituted,
}

impl SiteObservation {
    /// Substitution indicator, `None` when missing.
    #[inline]
    pub fn value(self) -> Option<f64> {
        match self {
            SiteObservation::Missing => None,
            SiteObservation::Identical => Some(0.0),
            SiteObservation::Substituted => Some(1.0),
        }
    }
}

/// Substitution indicators for one compared pair
///
/// Entry `k` sits at reference position `first_site + 3 * k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionProfile {
    /// Start of the later read of the pair
    pub anchor_position: usize,
    /// Reference position of the first observation
    pub first_site: usize,
    pub observations: Vec<SiteObservation>,
}

impl SubstitutionProfile {
    pub fn site_position(&self, index: usize) -> usize {
        self.first_site + index * CODON_LEN
    }

    /// `(reference position, observation)` in increasing position order
    pub fn sites(&self) -> impl Iterator<Item = (usize, SiteObservation)> + '_ {
        self.observations
            .iter()
            .enumerate()
            .map(move |(k, &obs)| (self.site_position(k), obs))
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observed(&self) -> usize {
        self.observations
            .iter()
            .filter(|o| **o != SiteObservation::Missing)
            .count()
    }
}

#[inline]
fn is_acgt(base: u8) -> bool {
    matches!(base, b'A' | b'C' | b'G' | b'T')
}

/// Compares overlapping read pairs under one genetic code and quality floor
#[derive(Debug, Clone, Copy)]
pub struct CodonComparator<'a> {
    code: &'a GeneticCode,
    min_base_quality: u8,
}

impl<'a> CodonComparator<'a> {
    pub fn new(code: &'a GeneticCode, config: &CorrConfig) -> Self {
        Self {
            code,
            min_base_quality: config.min_base_quality,
        }
    }

    /// Build the substitution profile of `b` against `a`.
    ///
    /// Requires `a.position <= b.position`. Deterministic: the same pair always
    /// yields the same profile.
    pub fn compare(&self, a: &MappedRead, b: &MappedRead) -> SubstitutionProfile {
        debug_assert!(a.position <= b.position);
        let lag = b.position - a.position;
        // j ranges over b's offsets that also fall inside a
        let end = a.len().saturating_sub(lag).min(b.len());

        // first j >= 2 with (b.position + j + 1) % 3 == 0
        let phase = (CODON_LEN - (b.position + 1) % CODON_LEN) % CODON_LEN;
        let start = if phase >= 2 { phase } else { phase + CODON_LEN };

        let mut observations = Vec::with_capacity(end.saturating_sub(start) / CODON_LEN + 1);
        let mut j = start;
        while j < end {
            observations.push(self.observe(a, j + lag, b, j));
            j += CODON_LEN;
        }

        SubstitutionProfile {
            anchor_position: b.position,
            first_site: b.position + start,
            observations,
        }
    }

    fn observe(&self, a: &MappedRead, i: usize, b: &MappedRead, j: usize) -> SiteObservation {
        let (base_a, base_b) = (a.bases[i], b.bases[j]);
        if !is_acgt(base_a) || !is_acgt(base_b) {
            return SiteObservation::Missing;
        }
        if a.qualities[i] <= self.min_base_quality || b.qualities[j] <= self.min_base_quality {
            return SiteObservation::Missing;
        }

        let aa_a = self.code.translate(&a.bases[i - 2..=i]);
        let aa_b = self.code.translate(&b.bases[j - 2..=j]);
        match (aa_a, aa_b) {
            (Some(x), Some(y)) if x == y => {
                if base_a != base_b {
                    SiteObservation::Substituted
                } else {
                    SiteObservation::Identical
                }
            }
            _ => SiteObservation::Missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACGT: [u8; 4] = [b'A', b'C', b'G', b'T'];

    /// Every codon translates to the same amino acid
    fn uniform_code() -> GeneticCode {
        let mut codons = Vec::with_capacity(64);
        for &x in &ACGT {
            for &y in &ACGT {
                for &z in &ACGT {
                    codons.push(([x, y, z], b'X'));
                }
            }
        }
        GeneticCode::from_codons("uniform", codons)
    }

    fn read(position: usize, bases: &[u8]) -> MappedRead {
        MappedRead::new(position, bases.to_vec(), vec![40; bases.len()])
    }

    #[test]
    fn test_evaluated_positions_are_third_codon_sites() {
        let code = uniform_code();
        let cmp = CodonComparator::new(&code, &CorrConfig::default());
        let a = read(100, b"ATGAAATTTGGGCCCAAA");
        let b = read(103, b"AAATTTGGGCCCAAATTT");
        let profile = cmp.compare(&a, &b);

        // overlap is 103..118; third sites with j > 1 are 107, 110, 113, 116
        assert_eq!(profile.anchor_position, 103);
        assert_eq!(profile.first_site, 107);
        let positions: Vec<usize> = profile.sites().map(|(p, _)| p).collect();
        assert_eq!(positions, vec![107, 110, 113, 116]);
        for p in positions {
            assert_eq!((p + 1) % 3, 0);
        }
    }

    #[test]
    fn test_identical_overlap_is_all_zero() {
        let code = uniform_code();
        let cmp = CodonComparator::new(&code, &CorrConfig::default());
        let a = read(99, b"ATGAAATTTGGGCCC");
        let b = read(99, b"ATGAAATTTGGGCCC");
        let profile = cmp.compare(&a, &b);
        // (99 + j + 1) % 3 == 0 for j = 2, 5, 8, 11, 14
        assert_eq!(profile.len(), 5);
        assert!(profile
            .observations
            .iter()
            .all(|o| *o == SiteObservation::Identical));
    }

    #[test]
    fn test_differing_bases_register_substitution() {
        let code = uniform_code();
        let cmp = CodonComparator::new(&code, &CorrConfig::default());
        let a = read(99, b"ATGAAATTTGGG");
        let b = read(99, b"ATCAAATTAGGG");
        let profile = cmp.compare(&a, &b);
        assert_eq!(
            profile.observations,
            vec![
                SiteObservation::Substituted,
                SiteObservation::Identical,
                SiteObservation::Substituted,
                SiteObservation::Identical,
            ]
        );
        assert_eq!(profile.observed(), 4);
    }

    #[test]
    fn test_ambiguous_and_placeholder_bases_missing() {
        let code = uniform_code();
        let cmp = CodonComparator::new(&code, &CorrConfig::default());
        let a = read(99, b"ATNAAATTTGG*");
        let b = read(99, b"ATGAAATTTGGG");
        let profile = cmp.compare(&a, &b);
        assert_eq!(profile.observations[0], SiteObservation::Missing);
        assert_eq!(profile.observations[1], SiteObservation::Identical);
        assert_eq!(profile.observations[3], SiteObservation::Missing);
    }

    #[test]
    fn test_low_quality_missing() {
        let code = uniform_code();
        let config = CorrConfig::default();
        let cmp = CodonComparator::new(&code, &config);
        let a = read(99, b"ATGAAA");
        let mut b = read(99, b"ATGAAA");
        b.qualities[2] = config.min_base_quality; // not strictly above
        let profile = cmp.compare(&a, &b);
        assert_eq!(profile.observations[0], SiteObservation::Missing);
        assert_eq!(profile.observations[1], SiteObservation::Identical);
    }

    #[test]
    fn test_nonsynonymous_context_missing() {
        let code = GeneticCode::ncbi("11").unwrap();
        let cmp = CodonComparator::new(&code, &CorrConfig::default());
        // GCA vs GCT: Ala/Ala -> substitution; TTT vs TTA: Phe/Leu -> missing
        let a = read(99, b"GCATTT");
        let b = read(99, b"GCTTTA");
        let profile = cmp.compare(&a, &b);
        assert_eq!(
            profile.observations,
            vec![SiteObservation::Substituted, SiteObservation::Missing]
        );
    }

    #[test]
    fn test_codon_absent_from_table_is_missing() {
        let code = GeneticCode::from_codons("partial", [(*b"AAA", b'K')]);
        let cmp = CodonComparator::new(&code, &CorrConfig::default());
        let a = read(99, b"CCC");
        let b = read(99, b"CCC");
        let profile = cmp.compare(&a, &b);
        assert_eq!(profile.observations, vec![SiteObservation::Missing]);
    }

    #[test]
    fn test_first_codon_of_read_skipped() {
        let code = uniform_code();
        let cmp = CodonComparator::new(&code, &CorrConfig::default());
        // b starts at 101, so 101 is a third site at j = 0 and is skipped
        let a = read(95, b"AAAAAAAAAAAA");
        let b = read(101, b"AAAAAA");
        let profile = cmp.compare(&a, &b);
        assert_eq!(profile.first_site, 104);
        assert_eq!(profile.len(), 1);
    }

    #[test]
    fn test_no_overlap_empty_profile() {
        let code = uniform_code();
        let cmp = CodonComparator::new(&code, &CorrConfig::default());
        let a = read(0, b"AAAAA");
        let b = read(5, b"AAAAA");
        assert!(cmp.compare(&a, &b).is_empty());
    }

    #[test]
    fn test_compare_is_idempotent() {
        let code = GeneticCode::ncbi("11").unwrap();
        let cmp = CodonComparator::new(&code, &CorrConfig::default());
        let a = read(10, b"ATGGCTGCAGCGGCCTTAGGTNNA");
        let b = read(16, b"GCAGCCGCCTTGGGCTTA");
        assert_eq!(cmp.compare(&a, &b), cmp.compare(&a, &b));
    }

    #[test]
    fn test_evaluates_exactly_the_common_third_sites() {
        let code = uniform_code();
        let cmp = CodonComparator::new(&code, &CorrConfig::default());
        for a_pos in 0..6usize {
            for shift in 0..12usize {
                let a = read(a_pos, &[b'A'; 20]);
                let b = read(a_pos + shift, &[b'C'; 15]);
                let profile = cmp.compare(&a, &b);

                let expected: Vec<usize> = (2..15usize)
                    .filter(|&j| j + shift < 20)
                    .map(|j| b.position + j)
                    .filter(|p| (p + 1) % 3 == 0)
                    .collect();
                let got: Vec<usize> = profile.sites().map(|(p, _)| p).collect();
                assert_eq!(got, expected, "a at {}, shift {}", a_pos, shift);
            }
        }
    }
}
