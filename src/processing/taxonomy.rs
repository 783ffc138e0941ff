//! Taxonomic identity of a record.

use std::fmt;

use crate::ingestion::Record;

/// Names shorter than this (in characters) are placeholders such as `sp` or `In`.
pub const MIN_NAME_LEN: usize = 3;

/// Coarsest rank a record's name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdLevel {
    Family,
    Genus,
    Species,
}

impl IdLevel {
    /// Lower-case label stored in the species table.
    pub fn as_str(self) -> &'static str {
        match self {
            IdLevel::Family => "family",
            IdLevel::Genus => "genus",
            IdLevel::Species => "species",
        }
    }
}

impl fmt::Display for IdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplication identity: family, genus and lower-cased species.
///
/// The derived ordering compares family, then genus, then species, which is the sort order used
/// for surrogate id assignment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaxonKey {
    pub family: String,
    pub genus: String,
    pub species: String,
}

impl TaxonKey {
    /// Build a key, lower-casing the species.
    pub fn new(family: &str, genus: &str, species: &str) -> Self {
        Self {
            family: family.to_string(),
            genus: genus.to_string(),
            species: species.to_lowercase(),
        }
    }

    /// Key of a record.
    pub fn of(record: &Record) -> Self {
        Self::new(&record.family, &record.genus, &record.species)
    }
}

/// A key plus its resolved identification level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonEntry {
    pub key: TaxonKey,
    pub level: IdLevel,
    /// `true` iff `level` is [`IdLevel::Species`].
    pub full_id: bool,
}

/// Identification level from name lengths alone.
pub fn identification_level(genus: &str, species: &str) -> IdLevel {
    if species.chars().count() < MIN_NAME_LEN {
        if genus.chars().count() < MIN_NAME_LEN {
            IdLevel::Family
        } else {
            IdLevel::Genus
        }
    } else {
        IdLevel::Species
    }
}

/// Resolve a record's taxon.
pub fn resolve(record: &Record) -> TaxonEntry {
    let level = identification_level(&record.genus, &record.species);
    TaxonEntry {
        key: TaxonKey::of(record),
        level,
        full_id: level == IdLevel::Species,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(family: &str, genus: &str, species: &str) -> Record {
        Record {
            line: "1".to_string(),
            family: family.to_string(),
            genus: genus.to_string(),
            species: species.to_string(),
            liana: "N".to_string(),
            count: "1".to_string(),
            stems: vec![],
            site_code: "plotA".to_string(),
            row: 2,
        }
    }

    #[test]
    fn species_level_needs_three_characters() {
        let e = resolve(&record("Fabaceae", "Inga", "Edulis"));
        assert_eq!(e.level, IdLevel::Species);
        assert!(e.full_id);
        assert_eq!(e.key.species, "edulis");
    }

    #[test]
    fn short_species_falls_back_to_genus() {
        let e = resolve(&record("Fabaceae", "Inga", "Sp"));
        assert_eq!(e.level, IdLevel::Genus);
        assert!(!e.full_id);
    }

    #[test]
    fn short_genus_and_species_fall_back_to_family() {
        let e = resolve(&record("Whatever", "In", "sp"));
        assert_eq!(e.level, IdLevel::Family);
        assert!(!e.full_id);

        let blank = resolve(&record("", "", ""));
        assert_eq!(blank.level, IdLevel::Family);
    }

    #[test]
    fn long_species_wins_even_with_short_genus() {
        assert_eq!(identification_level("", "Edulis"), IdLevel::Species);
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        // Two characters, four bytes.
        assert_eq!(identification_level("Ñé", "Ñé"), IdLevel::Family);
    }

    #[test]
    fn keys_order_field_by_field() {
        // Joined as "A c x" / "A b a x" these would sort the other way round.
        let a = TaxonKey::new("A", "c", "x");
        let b = TaxonKey::new("A b", "a", "x");
        assert!(a < b);
        assert!(TaxonKey::new("F", "G", "A") < TaxonKey::new("F", "G", "b"));
        assert_eq!(TaxonKey::new("F", "G", "Edulis"), TaxonKey::new("F", "G", "edulis"));
    }
}
