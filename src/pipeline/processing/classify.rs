use std::collections::{HashMap, HashSet};

use crate::pipeline::reference::ReferenceTable;
use crate::pipeline::table::Cell;
use crate::rules::{IdentityRules, TitleRules, VariantGroup};

use super::normalize::derive_email;

/// Fold a raw country spelling onto its canonical name. Groups are checked in
/// order and the first containing `raw` wins; no match keeps `raw`.
pub fn canonicalize_country(raw: Option<&str>, groups: &[VariantGroup]) -> Cell {
    let raw = raw?;
    let canonical = groups
        .iter()
        .find(|group| group.contains(raw))
        .map(|group| group.name.as_str())
        .unwrap_or(raw);
    Some(canonical.to_string())
}

/// Region id for a raw country via its region group, absent when the country
/// is in no group or the group has no id.
pub fn assign_region_group(
    raw: Option<&str>,
    groups: &[VariantGroup],
    region_ids: &ReferenceTable,
) -> Cell {
    let raw = raw?;
    groups
        .iter()
        .rev()
        .find(|group| group.contains(raw))
        .and_then(|group| region_ids.get(&group.name))
        .map(str::to_string)
}

/// Exact-match title table: a listed variant maps to an honorific or to "no title".
#[derive(Debug, Clone, Default)]
pub struct TitleTable {
    entries: HashMap<String, Option<String>>,
}

impl TitleTable {
    pub fn from_rules(rules: &TitleRules) -> Self {
        let mut entries: HashMap<String, Option<String>> = rules
            .cleared
            .iter()
            .map(|raw| (raw.clone(), None))
            .collect();
        for (raw, honorific) in &rules.honorifics {
            entries.insert(raw.clone(), Some(honorific.clone()));
        }
        Self { entries }
    }

    pub fn lookup(&self, raw: &str) -> Option<&Option<String>> {
        self.entries.get(raw)
    }
}

/// Normalize an honorific. Unlisted values pass through unchanged.
pub fn canonicalize_title(raw: Option<&str>, titles: &TitleTable) -> Cell {
    let raw = raw?;
    match titles.lookup(raw) {
        Some(mapped) => mapped.clone(),
        None => Some(raw.to_string()),
    }
}

/// Turns raw owner names into registered operator emails.
#[derive(Debug, Clone)]
pub struct OwnerIdentityPolicy {
    domain: String,
    admin: String,
    deprecated: HashSet<String>,
    unregistered: HashSet<String>,
    corrections: Vec<(String, String)>,
}

impl OwnerIdentityPolicy {
    pub fn new(rules: &IdentityRules, domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            admin: rules.admin.clone(),
            deprecated: rules.deprecated.iter().cloned().collect(),
            unregistered: rules.unregistered.iter().cloned().collect(),
            corrections: rules
                .corrections
                .iter()
                .map(|c| (c.from.clone(), c.to.clone()))
                .collect(),
        }
    }

    /// Derive the owner email, move deprecated identities to the admin,
    /// apply spelling corrections in order, then move unregistered identities
    /// to the admin.
    pub fn resolve(&self, raw_name: Option<&str>) -> String {
        let mut email = derive_email(raw_name, &self.domain);

        if self.deprecated.contains(&email) {
            email = self.admin.clone();
        }
        for (from, to) in &self.corrections {
            if &email == from {
                email = to.clone();
            }
        }
        if self.unregistered.contains(&email) {
            email = self.admin.clone();
        }
        email
    }
}
