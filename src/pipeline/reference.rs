use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use super::table::{Cell, Table};
use crate::constants::{REFERENCE_KEY_COLUMN, REFERENCE_VALUE_COLUMN, REGION_BRAND_PREFIX};
use crate::error::Result;

/// Natural key to surrogate id lookup, immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTable {
    name: String,
    entries: HashMap<String, String>,
}

impl ReferenceTable {
    pub fn from_pairs<K, V>(name: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Read a lookup CSV. Later duplicate keys overwrite earlier ones; keys and
    /// values are kept verbatim.
    pub fn load(path: &Path, key_column: &str, value_column: &str) -> Result<Self> {
        let table = Table::read_csv(path, path.display().to_string())?;
        Self::from_table(&table, key_column, value_column, Vec::new())
    }

    /// Build from an already loaded table. `seed` entries go in first, so a
    /// table row with the same key takes precedence over them.
    pub fn from_table(
        table: &Table,
        key_column: &str,
        value_column: &str,
        seed: Vec<(String, String)>,
    ) -> Result<Self> {
        let keys = table.column_values(key_column)?;
        let values = table.column_values(value_column)?;

        let mut entries: HashMap<String, String> = seed.into_iter().collect();
        let mut skipped = 0usize;
        for (key, value) in keys.into_iter().zip(values) {
            match (key, value) {
                (Some(k), Some(v)) => {
                    entries.insert(k.to_string(), v.to_string());
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!(table = %table.name(), skipped, "Skipped reference rows without key or id");
        }

        Ok(Self {
            name: table.name().to_string(),
            entries,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mapped id, or the raw value unchanged when there is no entry.
    pub fn map_with_fallback(&self, raw: Option<&str>) -> Cell {
        let raw = raw?;
        Some(self.get(raw).unwrap_or(raw).to_string())
    }

    /// Mapped id, or absent when there is no entry.
    pub fn map_with_absence(&self, raw: Option<&str>) -> Cell {
        raw.and_then(|r| self.get(r)).map(str::to_string)
    }
}

/// One-off corrections for a historical region export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionFixup {
    /// Remove a brand prefix from every region name
    StripNamePrefix(String),
    /// Add `alias` pointing at the id of the existing `source` entry
    Alias { source: String, alias: String },
}

impl RegionFixup {
    fn apply(&self, table: Table, seed: &mut Vec<(String, String)>) -> Result<Table> {
        match self {
            RegionFixup::StripNamePrefix(prefix) => {
                table.map_column(REFERENCE_KEY_COLUMN, |name| name.map(|n| n.replace(prefix.as_str(), "")))
            }
            RegionFixup::Alias { source, alias } => {
                let id: Option<String> = {
                    let names = table.column_values(REFERENCE_KEY_COLUMN)?;
                    let ids = table.column_values(REFERENCE_VALUE_COLUMN)?;
                    names
                        .iter()
                        .zip(ids.iter())
                        .find(|(name, _)| **name == Some(source.as_str()))
                        .and_then(|(_, id)| *id)
                        .map(str::to_string)
                };
                match id {
                    Some(id) => seed.push((alias.clone(), id)),
                    None => warn!(%source, %alias, "Region alias source not found, alias skipped"),
                }
                Ok(table)
            }
        }
    }
}

/// Shape of the region reference export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionTableShape {
    /// Names used as given
    Plain,
    /// Names carry the brand prefix and lack the full UAE name
    Branded,
}

impl RegionTableShape {
    pub fn fixups(&self) -> Vec<RegionFixup> {
        match self {
            RegionTableShape::Plain => Vec::new(),
            RegionTableShape::Branded => vec![
                RegionFixup::StripNamePrefix(REGION_BRAND_PREFIX.to_string()),
                RegionFixup::Alias {
                    source: "UAE".to_string(),
                    alias: "United Arab Emirates".to_string(),
                },
            ],
        }
    }
}

/// Load the region table applying the fix-ups of `shape`.
pub fn load_region_table(path: &Path, shape: RegionTableShape) -> Result<ReferenceTable> {
    let mut table = Table::read_csv(path, "regions")?;
    let mut seed = Vec::new();
    for fixup in shape.fixups() {
        table = fixup.apply(table, &mut seed)?;
    }
    let regions = ReferenceTable::from_table(&table, REFERENCE_KEY_COLUMN, REFERENCE_VALUE_COLUMN, seed)?;
    info!(shape = ?shape, entries = regions.len(), "Loaded region table");
    Ok(regions)
}

/// Load the company name to id table.
pub fn load_company_table(path: &Path) -> Result<ReferenceTable> {
    let companies = ReferenceTable::load(path, REFERENCE_KEY_COLUMN, REFERENCE_VALUE_COLUMN)?;
    info!(entries = companies.len(), "Loaded company table");
    Ok(companies)
}
