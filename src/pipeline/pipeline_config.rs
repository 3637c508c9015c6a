use crate::constants::{COMPANIES_DATASET, CONTACTS_DATASET};
use crate::error::{MigrationError, Result};
use crate::pipeline::processing::codecs::ArrayCodec;
use crate::pipeline::reference::RegionTableShape;

/// Configuration for a complete dataset migration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub name: String,
    pub description: String,
    pub steps: Vec<PipelineStepConfig>,
    /// How the region reference export is read for this dataset
    pub region_shape: RegionTableShape,
}

/// How a region id is obtained from the country column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionMode {
    /// Country name looked up directly in the region table
    Direct,
    /// Country looked up in a region group, group name resolved to an id
    Grouped,
}

/// Configuration for individual pipeline steps
#[derive(Debug, Clone)]
pub enum PipelineStepConfig {
    OwnerIdentity {
        column: String,
    },
    Titles {
        column: String,
    },
    CompanyReference {
        source: String,
        target: String,
    },
    ArrayFields {
        fields: Vec<(String, ArrayCodec)>,
    },
    CountryCanonicalization {
        column: String,
    },
    RegionAssignment {
        country_column: String,
        target: String,
        mode: RegionMode,
    },
    Projection {
        drop: Vec<String>,
        rename: Vec<(String, String)>,
    },
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

impl PipelineConfig {
    /// Companies export: country cleanup, direct region lookup, projection.
    pub fn companies() -> Self {
        Self {
            name: COMPANIES_DATASET.to_string(),
            description: "Companies export to Twenty company import".to_string(),
            steps: vec![
                PipelineStepConfig::CountryCanonicalization {
                    column: "Country".to_string(),
                },
                PipelineStepConfig::RegionAssignment {
                    country_column: "Country".to_string(),
                    target: "Company Region / Id".to_string(),
                    mode: RegionMode::Direct,
                },
                PipelineStepConfig::Projection {
                    drop: strings(&[
                        "Company Id",
                        "Company Owner.id",
                        "Company Owner",
                        "Email",
                        "Phone",
                        "Tag",
                        "Created By.id",
                        "Created By",
                        "Modified By.id",
                        "Modified By",
                        "Modified Time",
                    ]),
                    rename: pairs(&[
                        ("Company Name", "Name"),
                        ("Website", "Website / Link URL"),
                        ("Created Time", "Creation Date"),
                        ("Last Activity Time", "Last update"),
                        ("Address", "Address / Address 1"),
                        ("Country", "Address / Country"),
                    ]),
                },
            ],
            region_shape: RegionTableShape::Branded,
        }
    }

    /// Contacts export: owners, titles, company ids, array fields, region groups, projection.
    pub fn contacts() -> Self {
        Self {
            name: CONTACTS_DATASET.to_string(),
            description: "Contacts export to Twenty people import".to_string(),
            steps: vec![
                PipelineStepConfig::OwnerIdentity {
                    column: "Contact Owner".to_string(),
                },
                PipelineStepConfig::Titles {
                    column: "Title".to_string(),
                },
                PipelineStepConfig::CompanyReference {
                    source: "Company Name".to_string(),
                    target: "Company Id".to_string(),
                },
                PipelineStepConfig::ArrayFields {
                    fields: vec![
                        ("Tag".to_string(), ArrayCodec::CommaList),
                        ("Home Phone".to_string(), ArrayCodec::Phone),
                        ("Private Email".to_string(), ArrayCodec::StringArray),
                    ],
                },
                PipelineStepConfig::RegionAssignment {
                    country_column: "Country".to_string(),
                    target: "Contact Region / Id".to_string(),
                    mode: RegionMode::Grouped,
                },
                PipelineStepConfig::Projection {
                    drop: strings(&[
                        "Contact Id",
                        "Contact Owner.id",
                        "Contact Name",
                        "Created By.id",
                        "Created By",
                        "Modified By.id",
                        "Modified By",
                        "Modified Time",
                        "Company Name.id",
                        "Secondary Email",
                        "Company Name",
                        "Unsubscribed Mode",
                        "Unsubscribed Time",
                        "Data Source",
                    ]),
                    rename: pairs(&[
                        ("First Name", "Name / First Name"),
                        ("Last Name", "Name / Last Name"),
                        ("Contact Owner", "Contact Owner / User Email"),
                        ("Position", "Job Title"),
                        ("Email", "Emails / Primary Email"),
                        ("Private Email", "Emails / Additional Emails"),
                        ("Phone", "Phones / Primary Phone"),
                        ("Home Phone", "Phones / Additional Phones"),
                        ("Tag", "Tags"),
                        ("Social Media", "Linkedin / Link URL"),
                        ("Created Time", "Creation Date"),
                        ("Mobile", "Mobile / Primary Phone Number"),
                        ("Last Activity Time", "Last Update"),
                        ("Address", "Address / Address 1"),
                        ("Country", "Address / Country"),
                        ("Primary Language Spoken", "Primary Language"),
                        ("Secondary Language Spoken", "Secondary Language"),
                    ]),
                },
            ],
            region_shape: RegionTableShape::Plain,
        }
    }

    /// Look up a built-in dataset profile by name
    pub fn for_dataset(name: &str) -> Option<Self> {
        match name {
            COMPANIES_DATASET => Some(Self::companies()),
            CONTACTS_DATASET => Some(Self::contacts()),
            _ => None,
        }
    }

    /// True when a step resolves company names, so the company table is required.
    pub fn needs_company_table(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s, PipelineStepConfig::CompanyReference { .. }))
    }

    /// Validate the pipeline configuration.
    ///
    /// Steps must follow the fixed stage order, each at most once, and the
    /// projection must be present and last.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(MigrationError::Pipeline(
                "Pipeline must have at least one step".to_string(),
            ));
        }

        let mut previous: Option<&PipelineStepConfig> = None;
        for step in &self.steps {
            if let Some(prev) = previous {
                if step.stage() <= prev.stage() {
                    return Err(MigrationError::Pipeline(format!(
                        "Step '{}' cannot follow '{}'",
                        step.step_name(),
                        prev.step_name()
                    )));
                }
            }
            previous = Some(step);
        }

        match self.steps.last() {
            Some(PipelineStepConfig::Projection { drop, rename }) => {
                if let Some(col) = drop.iter().find(|d| rename.iter().any(|(from, _)| from == *d)) {
                    return Err(MigrationError::Pipeline(format!(
                        "Column '{col}' is both dropped and renamed"
                    )));
                }
                Ok(())
            }
            _ => Err(MigrationError::Pipeline(
                "Pipeline must end with the projection step".to_string(),
            )),
        }
    }
}

impl PipelineStepConfig {
    /// Get the step name for logging and validation messages
    pub fn step_name(&self) -> &'static str {
        match self {
            PipelineStepConfig::OwnerIdentity { .. } => "owner_identity",
            PipelineStepConfig::Titles { .. } => "titles",
            PipelineStepConfig::CompanyReference { .. } => "company_reference",
            PipelineStepConfig::ArrayFields { .. } => "array_fields",
            PipelineStepConfig::CountryCanonicalization { .. } => "country_canonicalization",
            PipelineStepConfig::RegionAssignment { .. } => "region_assignment",
            PipelineStepConfig::Projection { .. } => "projection",
        }
    }

    fn stage(&self) -> u8 {
        match self {
            PipelineStepConfig::OwnerIdentity { .. } => 1,
            PipelineStepConfig::Titles { .. } => 2,
            PipelineStepConfig::CompanyReference { .. } => 3,
            PipelineStepConfig::ArrayFields { .. } => 4,
            PipelineStepConfig::CountryCanonicalization { .. } => 5,
            PipelineStepConfig::RegionAssignment { .. } => 6,
            PipelineStepConfig::Projection { .. } => 7,
        }
    }
}
