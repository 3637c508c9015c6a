use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{MigrationError, Result};

/// Rules shipped with the binary
pub const EMBEDDED_RULES: &str = include_str!("../config/rules.toml");

/// Declarative mapping tables used by the classification stages
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationRules {
    pub identity: IdentityRules,
    /// Calling code (e.g. `+49`) to ISO country code
    #[serde(default)]
    pub calling_codes: HashMap<String, String>,
    /// Country spellings folded onto a canonical country, checked in order
    #[serde(default)]
    pub countries: Vec<VariantGroup>,
    /// Countries grouped by region name, checked in order
    #[serde(default)]
    pub regions: Vec<VariantGroup>,
    #[serde(default)]
    pub titles: TitleRules,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityRules {
    pub admin: String,
    #[serde(default)]
    pub deprecated: Vec<String>,
    #[serde(default)]
    pub unregistered: Vec<String>,
    #[serde(default)]
    pub corrections: Vec<Correction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Correction {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantGroup {
    pub name: String,
    pub variants: Vec<String>,
}

impl VariantGroup {
    pub fn contains(&self, raw: &str) -> bool {
        self.variants.iter().any(|v| v == raw)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TitleRules {
    #[serde(default)]
    pub honorifics: HashMap<String, String>,
    #[serde(default)]
    pub cleared: Vec<String>,
}

impl ClassificationRules {
    /// Parse and validate the rules compiled into the binary.
    pub fn embedded() -> Result<Self> {
        Self::from_toml(EMBEDDED_RULES)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MigrationError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let rules = Self::from_toml(&content)?;
        info!(path = %path.display(), "Loaded classification rules");
        Ok(rules)
    }

    /// `from_file` when a path is given, the embedded rules otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Self::embedded(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let rules: ClassificationRules = toml::from_str(content)?;
        rules.validate()?;
        Ok(rules)
    }

    /// Reject rule sets whose outcome would depend on iteration order.
    pub fn validate(&self) -> Result<()> {
        check_disjoint("countries", &self.countries)?;
        check_disjoint("regions", &self.regions)?;

        if let Some(raw) = self
            .titles
            .cleared
            .iter()
            .find(|raw| self.titles.honorifics.contains_key(raw.as_str()))
        {
            return Err(MigrationError::Config(format!(
                "title '{raw}' is listed both as an honorific and as cleared"
            )));
        }

        if self.identity.admin.trim().is_empty() {
            return Err(MigrationError::Config(
                "identity.admin must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_disjoint(section: &str, groups: &[VariantGroup]) -> Result<()> {
    let mut names = HashSet::new();
    let mut owner: HashMap<&str, &str> = HashMap::new();

    for group in groups {
        if !names.insert(group.name.as_str()) {
            return Err(MigrationError::Config(format!(
                "{section}: group '{}' is defined twice",
                group.name
            )));
        }
        for variant in &group.variants {
            if let Some(previous) = owner.insert(variant.as_str(), group.name.as_str()) {
                if previous != group.name {
                    return Err(MigrationError::Config(format!(
                        "{section}: variant '{variant}' belongs to both '{previous}' and '{}'",
                        group.name
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_rules_are_valid() {
        let rules = ClassificationRules::embedded().unwrap();

        assert_eq!(rules.identity.admin, "admin@inheaden.io");
        assert_eq!(rules.calling_codes.get("+49").map(String::as_str), Some("DE"));
        assert_eq!(rules.calling_codes.len(), 10);
        assert_eq!(
            rules.countries.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
            vec!["India", "United Arab Emirates", "Germany"]
        );
        assert_eq!(rules.regions.len(), 3);
        assert_eq!(rules.titles.honorifics.get("Dr").map(String::as_str), Some("Dr."));
        assert!(rules.titles.cleared.iter().any(|t| t == "CEO"));
    }

    #[test]
    fn overlapping_region_variants_are_rejected() {
        let toml = r#"
            [identity]
            admin = "admin@example.com"

            [[regions]]
            name = "Europe"
            variants = ["Germany", "Turkey"]

            [[regions]]
            name = "Middle East"
            variants = ["UAE", "Turkey"]
        "#;

        let err = ClassificationRules::from_toml(toml).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Turkey"), "{msg}");
        assert!(msg.contains("Europe") && msg.contains("Middle East"), "{msg}");
    }

    #[test]
    fn duplicate_variant_within_one_group_is_allowed() {
        let toml = r#"
            [identity]
            admin = "admin@example.com"

            [[countries]]
            name = "Germany"
            variants = ["Germany", "Germany"]
        "#;

        assert!(ClassificationRules::from_toml(toml).is_ok());
    }

    #[test]
    fn conflicting_title_entries_are_rejected() {
        let toml = r#"
            [identity]
            admin = "admin@example.com"

            [titles]
            honorifics = { "Dr" = "Dr." }
            cleared = ["Dr"]
        "#;

        assert!(matches!(
            ClassificationRules::from_toml(toml),
            Err(MigrationError::Config(_))
        ));
    }

    #[test]
    fn missing_rules_file() {
        let err = ClassificationRules::load(Some(Path::new("/nonexistent/rules.toml"))).unwrap_err();
        assert!(matches!(err, MigrationError::FileNotFound(_)));
    }
}
