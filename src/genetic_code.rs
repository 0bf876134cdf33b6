//! Genetic code lookup
//!
//! NCBI translation tables, built from the 64-letter amino-acid strings NCBI
//! publishes (codons enumerated with each position in TCAG order). Only the
//! Codon Comparator queries these, read-only and shared across workers.

use rustc_hash::FxHashMap;

use crate::error::CorrError;

const BASE_ORDER: [u8; 4] = [b'T', b'C', b'A', b'G'];

// (id, name, amino acids in TCAG x TCAG x TCAG order)
const NCBI_TABLES: &[(&str, &str, &[u8; 64])] = &[
    (
        "1",
        "Standard",
        b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    ),
    (
        "2",
        "Vertebrate Mitochondrial",
        b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSS**VVVVAAAADDEEGGGG",
    ),
    (
        "3",
        "Yeast Mitochondrial",
        b"FFLLSSSSYY**CCWWTTTTPPPPHHQQRRRRIIMMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    ),
    (
        "4",
        "Mold, Protozoan, and Coelenterate Mitochondrial; Mycoplasma; Spiroplasma",
        b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    ),
    (
        "5",
        "Invertebrate Mitochondrial",
        b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSSSSVVVVAAAADDEEGGGG",
    ),
    (
        "6",
        "Ciliate, Dasycladacean and Hexamita Nuclear",
        b"FFLLSSSSYYQQCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    ),
    (
        "11",
        "Bacterial, Archaeal and Plant Plastid",
        b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    ),
];

/// Codon to amino-acid lookup
#[derive(Debug, Clone)]
pub struct GeneticCode {
    pub id: String,
    pub name: String,
    table: FxHashMap<[u8; 3], u8>,
}

impl GeneticCode {
    /// Look up an NCBI translation table by id (e.g. `"11"`).
    pub fn ncbi(id: &str) -> Result<Self, CorrError> {
        let (id, name, amino_acids) = NCBI_TABLES
            .iter()
            .find(|(table_id, _, _)| *table_id == id)
            .ok_or_else(|| CorrError::UnknownGeneticCode(id.to_string()))?;

        let mut table = FxHashMap::default();
        table.reserve(64);
        for (i, &first) in BASE_ORDER.iter().enumerate() {
            for (j, &second) in BASE_ORDER.iter().enumerate() {
                for (k, &third) in BASE_ORDER.iter().enumerate() {
                    table.insert([first, second, third], amino_acids[i * 16 + j * 4 + k]);
                }
            }
        }

        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            table,
        })
    }

    /// Build a custom table from explicit codon assignments.
    pub fn from_codons<I>(name: &str, codons: I) -> Self
    where
        I: IntoIterator<Item = ([u8; 3], u8)>,
    {
        Self {
            id: "custom".to_string(),
            name: name.to_string(),
            table: codons.into_iter().collect(),
        }
    }

    /// Ids accepted by [`GeneticCode::ncbi`].
    pub fn available_ids() -> impl Iterator<Item = &'static str> {
        NCBI_TABLES.iter().map(|(id, _, _)| *id)
    }

    /// Amino acid for an uppercase codon; `None` for anything not in the table.
    #[inline]
    pub fn translate(&self, codon: &[u8]) -> Option<u8> {
        let key: [u8; 3] = codon.try_into().ok()?;
        self.table.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
