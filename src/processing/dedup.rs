//! Species deduplication and surrogate id assignment.

use std::collections::HashMap;

use crate::error::{PipelineError, PipelineResult};

use super::taxonomy::{IdLevel, TaxonEntry, TaxonKey};

/// One row of the species dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeciesRow {
    /// Dense surrogate id, starting at 1.
    pub species_id: u32,
    pub family: String,
    pub genus: String,
    /// Lower-cased species epithet.
    pub species: String,
    pub level: IdLevel,
    pub full_id: bool,
}

impl SpeciesRow {
    /// The key this row was created for.
    pub fn key(&self) -> TaxonKey {
        TaxonKey {
            family: self.family.clone(),
            genus: self.genus.clone(),
            species: self.species.clone(),
        }
    }
}

/// Deduplicated species dictionary plus the key → id lookup used to build fact rows.
///
/// Built once per run and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SpeciesCatalog {
    rows: Vec<SpeciesRow>,
    ids: HashMap<TaxonKey, u32>,
}

impl SpeciesCatalog {
    /// Species rows in id order (ids are exactly `1..=len`).
    pub fn species(&self) -> &[SpeciesRow] {
        &self.rows
    }

    /// Number of distinct taxa.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// `true` if no taxa were seen.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Surrogate id of `key`.
    ///
    /// A miss means the catalog was not built from the records being looked up.
    pub fn species_id(&self, key: &TaxonKey) -> PipelineResult<u32> {
        self.ids
            .get(key)
            .copied()
            .ok_or_else(|| PipelineError::LookupMiss {
                family: key.family.clone(),
                genus: key.genus.clone(),
                species: key.species.clone(),
            })
    }
}

/// Deduplicate taxon entries into a [`SpeciesCatalog`].
pub fn deduplicate(entries: Vec<TaxonEntry>) -> PipelineResult<SpeciesCatalog> {
    deduplicate_with_progress(entries, 0, |_| {})
}

/// Deduplicate taxon entries, calling `progress` with the running number of distinct taxa every
/// `every` new taxa (`every == 0` disables the callback).
///
/// Entries are stable-sorted by [`TaxonKey`] (family, genus, species) and ids are handed out in
/// that order, so the result does not depend on the order records arrived in.
pub fn deduplicate_with_progress<F>(
    mut entries: Vec<TaxonEntry>,
    every: usize,
    mut progress: F,
) -> PipelineResult<SpeciesCatalog>
where
    F: FnMut(usize),
{
    entries.sort_by(|a, b| a.key.cmp(&b.key));

    let mut catalog = SpeciesCatalog::default();
    for entry in entries {
        if let Some(last) = catalog.rows.last() {
            if last.family == entry.key.family
                && last.genus == entry.key.genus
                && last.species == entry.key.species
            {
                if last.level != entry.level || last.full_id != entry.full_id {
                    return Err(PipelineError::InconsistentTaxon {
                        family: entry.key.family,
                        genus: entry.key.genus,
                        species: entry.key.species,
                    });
                }
                continue;
            }
        }

        let species_id = u32::try_from(catalog.rows.len() + 1).map_err(|_| {
            PipelineError::SchemaMismatch {
                message: "more distinct taxa than species ids".to_string(),
            }
        })?;
        catalog.ids.insert(entry.key.clone(), species_id);
        catalog.rows.push(SpeciesRow {
            species_id,
            family: entry.key.family,
            genus: entry.key.genus,
            species: entry.key.species,
            level: entry.level,
            full_id: entry.full_id,
        });

        if every > 0 && catalog.rows.len() % every == 0 {
            progress(catalog.rows.len());
        }
    }

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::taxonomy::identification_level;

    fn entry(family: &str, genus: &str, species: &str) -> TaxonEntry {
        let level = identification_level(genus, species);
        TaxonEntry {
            key: TaxonKey::new(family, genus, species),
            level,
            full_id: level == IdLevel::Species,
        }
    }

    #[test]
    fn ids_are_dense_and_follow_key_order() {
        let catalog = deduplicate(vec![
            entry("Moraceae", "Ficus", "Insipida"),
            entry("Fabaceae", "Inga", "Edulis"),
            entry("Fabaceae", "Inga", "Alba"),
            entry("Moraceae", "Ficus", "insipida"),
        ])
        .unwrap();

        let ids: Vec<u32> = catalog.species().iter().map(|r| r.species_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let names: Vec<(&str, &str)> = catalog
            .species()
            .iter()
            .map(|r| (r.genus.as_str(), r.species.as_str()))
            .collect();
        assert_eq!(names, vec![("Inga", "alba"), ("Inga", "edulis"), ("Ficus", "insipida")]);
    }

    #[test]
    fn recurring_keys_share_an_id() {
        let catalog = deduplicate(vec![
            entry("Fabaceae", "Inga", "Edulis"),
            entry("Annonaceae", "Guatteria", "Sp"),
            entry("Fabaceae", "Inga", "EDULIS"),
        ])
        .unwrap();
        assert_eq!(catalog.len(), 2);
        let a = catalog.species_id(&TaxonKey::new("Fabaceae", "Inga", "Edulis")).unwrap();
        let b = catalog.species_id(&TaxonKey::new("Fabaceae", "Inga", "edulis")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, 2);
        assert_eq!(
            catalog.species()[1].key(),
            TaxonKey::new("Fabaceae", "Inga", "edulis")
        );
    }

    #[test]
    fn arrival_order_does_not_change_ids() {
        let forward = vec![
            entry("B", "Bbb", "Bbb"),
            entry("A", "Aaa", "Aaa"),
            entry("A", "Aaa", "Sp"),
        ];
        let mut backward = forward.clone();
        backward.reverse();
        assert_eq!(
            deduplicate(forward).unwrap().species(),
            deduplicate(backward).unwrap().species()
        );
    }

    #[test]
    fn conflicting_levels_for_one_key_are_rejected() {
        let mut odd = entry("Fabaceae", "Inga", "Edulis");
        odd.level = IdLevel::Genus;
        odd.full_id = false;
        let err = deduplicate(vec![entry("Fabaceae", "Inga", "Edulis"), odd]).unwrap_err();
        assert!(matches!(err, PipelineError::InconsistentTaxon { .. }));
    }

    #[test]
    fn lookup_miss_is_an_error() {
        let catalog = deduplicate(vec![entry("Fabaceae", "Inga", "Edulis")]).unwrap();
        let err = catalog
            .species_id(&TaxonKey::new("Lauraceae", "Ocotea", "Sp"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::LookupMiss { .. }));
    }

    #[test]
    fn progress_fires_every_n_new_taxa() {
        let entries: Vec<TaxonEntry> = (0..25)
            .map(|i| entry("Fam", "Genus", &format!("sp{i:02}")))
            .collect();
        let mut seen = Vec::new();
        let catalog = deduplicate_with_progress(entries, 10, |n| seen.push(n)).unwrap();
        assert_eq!(catalog.len(), 25);
        assert_eq!(seen, vec![10, 20]);
    }

    #[test]
    fn empty_input_gives_empty_catalog() {
        let catalog = deduplicate(Vec::new()).unwrap();
        assert!(catalog.is_empty());
    }
}
