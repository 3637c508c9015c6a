/// Canonical empty form of every array-encoded cell.
pub const EMPTY_ARRAY: &str = "[]";

/// Text produced for a missing value by upstream exports that stringified NaN.
pub const MISSING_MARKER: &str = "nan";

/// Placeholder used by the source CRM for "no owner".
pub const OWNER_PLACEHOLDER: &str = "-";

// Dataset names (used in logs, metrics and the CLI)
pub const COMPANIES_DATASET: &str = "companies";
pub const CONTACTS_DATASET: &str = "contacts";

// Reference table columns
pub const REFERENCE_KEY_COLUMN: &str = "Name";
pub const REFERENCE_VALUE_COLUMN: &str = "Id";

/// Brand prefix carried by region names in the branded region export.
pub const REGION_BRAND_PREFIX: &str = "Inheaden ";

/// Returns true when a raw cell should be treated as absent.
pub fn is_missing(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v == MISSING_MARKER || v.trim().is_empty(),
    }
}
