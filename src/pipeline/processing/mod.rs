//! Table-level transform stages.
//!
//! Each stage takes ownership of a [`Table`] and returns the transformed
//! table. Field-level problems never fail a stage: values fall back to the
//! codec or mapper default and are tallied in [`StepStats`]. Only a missing
//! column is an error.

pub mod classify;
pub mod codecs;
pub mod normalize;

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use self::classify::{
    assign_region_group, canonicalize_country, canonicalize_title, OwnerIdentityPolicy, TitleTable,
};
use self::codecs::{parse_phone, ArrayCodec};
use crate::constants::{is_missing, EMPTY_ARRAY};
use crate::error::Result;
use crate::pipeline::pipeline_config::RegionMode;
use crate::pipeline::reference::ReferenceTable;
use crate::pipeline::table::Table;
use crate::rules::{ClassificationRules, VariantGroup};

/// Rules prepared for lookups during a run
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub identity: OwnerIdentityPolicy,
    pub titles: TitleTable,
    pub countries: Vec<VariantGroup>,
    pub regions: Vec<VariantGroup>,
    pub calling_codes: HashMap<String, String>,
}

impl CompiledRules {
    pub fn new(rules: &ClassificationRules, email_domain: &str) -> Self {
        Self {
            identity: OwnerIdentityPolicy::new(&rules.identity, email_domain),
            titles: TitleTable::from_rules(&rules.titles),
            countries: rules.countries.clone(),
            regions: rules.regions.clone(),
            calling_codes: rules.calling_codes.clone(),
        }
    }
}

/// Values that fell back to a default during a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepStats {
    pub owners_without_email: usize,
    pub cleared_titles: usize,
    pub unresolved_companies: usize,
    pub unparsed_phones: usize,
    pub rows_without_region: usize,
}

/// Replace raw owner names with consolidated owner emails.
pub fn normalize_owners(
    table: Table,
    column: &str,
    policy: &OwnerIdentityPolicy,
    stats: &mut StepStats,
) -> Result<Table> {
    info!(column, "Normalizing owner identities");
    table.map_column(column, |raw| {
        let email = policy.resolve(raw);
        if email.is_empty() {
            stats.owners_without_email += 1;
        }
        Some(email)
    })
}

pub fn normalize_titles(
    table: Table,
    column: &str,
    titles: &TitleTable,
    stats: &mut StepStats,
) -> Result<Table> {
    info!(column, "Normalizing titles");
    table.map_column(column, |raw| {
        let title = canonicalize_title(raw, titles);
        if raw.is_some() && title.is_none() {
            stats.cleared_titles += 1;
        }
        title
    })
}

/// Resolve company names to ids; unresolved names stay visible as-is.
pub fn resolve_companies(
    table: Table,
    source: &str,
    target: &str,
    companies: &ReferenceTable,
    stats: &mut StepStats,
) -> Result<Table> {
    info!(source, target, "Mapping company names to ids");
    table.derive_column(source, target, |raw| {
        if let Some(name) = raw {
            if !companies.contains(name) {
                debug!(company = name, "Company name not in reference table");
                stats.unresolved_companies += 1;
            }
        }
        companies.map_with_fallback(raw)
    })
}

pub fn encode_array_fields(
    mut table: Table,
    fields: &[(String, ArrayCodec)],
    calling_codes: &HashMap<String, String>,
    stats: &mut StepStats,
) -> Result<Table> {
    info!(fields = fields.len(), "Formatting array fields");
    for (column, codec) in fields {
        table = table.map_column(column, |raw| {
            if *codec == ArrayCodec::Phone
                && !is_missing(raw)
                && raw.map(str::trim) != Some(EMPTY_ARRAY)
                && parse_phone(raw, calling_codes).is_none()
            {
                debug!(column = %column, codec = codec.name(), value = ?raw, "Phone without calling code");
                stats.unparsed_phones += 1;
            }
            Some(codec.encode(raw, calling_codes))
        })?;
    }
    Ok(table)
}

pub fn canonicalize_countries(table: Table, column: &str, groups: &[VariantGroup]) -> Result<Table> {
    info!(column, groups = groups.len(), "Canonicalizing countries");
    table.map_column(column, |raw| canonicalize_country(raw, groups))
}

/// Write a region id for each row into `target`; rows whose country cannot
/// be placed get no region.
pub fn assign_regions(
    table: Table,
    country_column: &str,
    target: &str,
    mode: RegionMode,
    groups: &[VariantGroup],
    regions: &ReferenceTable,
    stats: &mut StepStats,
) -> Result<Table> {
    info!(country_column, target, mode = ?mode, "Assigning regions");
    table.derive_column(country_column, target, |country| {
        let region = match mode {
            RegionMode::Direct => regions.map_with_absence(country),
            RegionMode::Grouped => assign_region_group(country, groups, regions),
        };
        if region.is_none() {
            stats.rows_without_region += 1;
        }
        region
    })
}

/// Drop source-only columns, then rename to the target schema.
pub fn project(table: Table, drop: &[String], rename: &[(String, String)]) -> Result<Table> {
    info!(dropped = drop.len(), renamed = rename.len(), "Projecting to target schema");
    Ok(table.drop_columns(drop)?.rename_columns(rename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::table::Cell;

    fn s(v: &str) -> Cell {
        Some(v.to_string())
    }

    fn rules() -> CompiledRules {
        CompiledRules::new(&ClassificationRules::embedded().unwrap(), "inheaden.io")
    }

    #[test]
    fn owners_are_consolidated() {
        let table = Table::from_rows(
            "contacts",
            &["Contact Owner"],
            vec![vec![s("Ahmed Elshamanhory")], vec![s("-")], vec![None]],
        );
        let mut stats = StepStats::default();

        let out = normalize_owners(table, "Contact Owner", &rules().identity, &mut stats).unwrap();

        assert_eq!(out.get(0, "Contact Owner"), Some("admin@inheaden.io"));
        assert_eq!(out.get(1, "Contact Owner"), Some(""));
        assert_eq!(stats.owners_without_email, 2);
    }

    #[test]
    fn array_fields_count_unparsed_phones() {
        let table = Table::from_rows(
            "contacts",
            &["Tag", "Home Phone", "Private Email"],
            vec![
                vec![s("VIP, Lead"), s("+41 44 123 45 67"), s("x@y.ch")],
                vec![None, s("044 123"), None],
            ],
        );
        let fields = vec![
            ("Tag".to_string(), ArrayCodec::CommaList),
            ("Home Phone".to_string(), ArrayCodec::Phone),
            ("Private Email".to_string(), ArrayCodec::StringArray),
        ];
        let mut stats = StepStats::default();

        let out = encode_array_fields(table, &fields, &rules().calling_codes, &mut stats).unwrap();

        assert_eq!(out.get(0, "Tag"), Some(r#"["VIP","Lead"]"#));
        assert_eq!(
            out.get(0, "Home Phone"),
            Some(r#"[{"number":"441234567","callingCode":"+41","countryCode":"CH"}]"#)
        );
        assert_eq!(out.get(0, "Private Email"), Some(r#"["x@y.ch"]"#));
        assert_eq!(out.get(1, "Tag"), Some("[]"));
        assert_eq!(out.get(1, "Home Phone"), Some("[]"));
        assert_eq!(stats.unparsed_phones, 1);
    }

    #[test]
    fn company_names_fall_back_to_raw() {
        let table = Table::from_rows(
            "contacts",
            &["Company Name"],
            vec![vec![s("Acme")], vec![s("Globex")], vec![None]],
        );
        let companies = ReferenceTable::from_pairs("companies", [("Acme", "c-1")]);
        let mut stats = StepStats::default();

        let out = resolve_companies(table, "Company Name", "Company Id", &companies, &mut stats).unwrap();

        assert_eq!(out.get(0, "Company Id"), Some("c-1"));
        assert_eq!(out.get(1, "Company Id"), Some("Globex"));
        assert_eq!(out.get(2, "Company Id"), None);
        assert_eq!(out.len(), 3);
        assert_eq!(stats.unresolved_companies, 1);
    }

    #[test]
    fn direct_regions_leave_unknown_unset() {
        let table = Table::from_rows("companies", &["Country"], vec![vec![s("India")], vec![s("Peru")]]);
        let regions = ReferenceTable::from_pairs("regions", [("India", "0")]);
        let mut stats = StepStats::default();

        let out = assign_regions(
            table,
            "Country",
            "Company Region / Id",
            RegionMode::Direct,
            &[],
            &regions,
            &mut stats,
        )
        .unwrap();

        assert_eq!(out.get(0, "Company Region / Id"), Some("0"));
        assert_eq!(out.get(1, "Company Region / Id"), None);
        assert_eq!(stats.rows_without_region, 1);
    }

    #[test]
    fn missing_stage_column_is_an_error() {
        let table = Table::from_rows("contacts", &["Name"], vec![]);
        let mut stats = StepStats::default();

        assert!(normalize_titles(table, "Title", &rules().titles, &mut stats).is_err());
    }
}
