// Record transform pipeline: load, transform, project, write

pub mod pipeline_config;
pub mod processing;
pub mod reference;
pub mod table;

use std::path::PathBuf;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{info, instrument, warn};

use self::pipeline_config::{PipelineConfig, PipelineStepConfig, RegionMode};
use self::processing::{CompiledRules, StepStats};
use self::reference::{load_company_table, load_region_table, ReferenceTable};
use self::table::Table;
use crate::error::{MigrationError, Result};
use crate::rules::ClassificationRules;

/// File locations for one dataset run
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub input: PathBuf,
    pub output: PathBuf,
    pub region_table: PathBuf,
    pub company_table: Option<PathBuf>,
}

/// Reference tables loaded once per run and shared read-only by every stage
#[derive(Debug, Clone)]
pub struct References {
    pub regions: ReferenceTable,
    pub companies: Option<ReferenceTable>,
}

impl References {
    /// Load every reference table the pipeline needs. Any missing file fails
    /// the run before a single row is transformed.
    pub fn load(config: &PipelineConfig, paths: &DatasetPaths) -> Result<Self> {
        let regions = load_region_table(&paths.region_table, config.region_shape)?;
        let companies = if config.needs_company_table() {
            let path = paths.company_table.as_ref().ok_or_else(|| {
                MigrationError::Config(format!(
                    "dataset '{}' needs a company reference table",
                    config.name
                ))
            })?;
            Some(load_company_table(path)?)
        } else {
            None
        };
        Ok(Self { regions, companies })
    }
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub dataset: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub output_file: String,
    /// SHA-256 of the written bytes; equal digests confirm an idempotent re-run
    pub sha256: String,
    pub stats: StepStats,
}

pub struct Pipeline {
    config: PipelineConfig,
    rules: CompiledRules,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, rules: &ClassificationRules, email_domain: &str) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rules: CompiledRules::new(rules, email_domain),
        })
    }

    /// Apply every configured step, in order, to `table`.
    pub fn transform(&self, table: Table, refs: &References) -> Result<(Table, StepStats)> {
        let mut stats = StepStats::default();
        let mut table = table;

        for step in &self.config.steps {
            table = self.apply_step(step, table, refs, &mut stats)?;
        }

        Ok((table, stats))
    }

    fn apply_step(
        &self,
        step: &PipelineStepConfig,
        table: Table,
        refs: &References,
        stats: &mut StepStats,
    ) -> Result<Table> {
        match step {
            PipelineStepConfig::OwnerIdentity { column } => {
                processing::normalize_owners(table, column, &self.rules.identity, stats)
            }
            PipelineStepConfig::Titles { column } => {
                processing::normalize_titles(table, column, &self.rules.titles, stats)
            }
            PipelineStepConfig::CompanyReference { source, target } => {
                let companies = refs.companies.as_ref().ok_or_else(|| {
                    MigrationError::Config("company reference table not loaded".to_string())
                })?;
                processing::resolve_companies(table, source, target, companies, stats)
            }
            PipelineStepConfig::ArrayFields { fields } => {
                processing::encode_array_fields(table, fields, &self.rules.calling_codes, stats)
            }
            PipelineStepConfig::CountryCanonicalization { column } => {
                processing::canonicalize_countries(table, column, &self.rules.countries)
            }
            PipelineStepConfig::RegionAssignment {
                country_column,
                target,
                mode,
            } => {
                if *mode == RegionMode::Grouped {
                    self.check_region_groups(&refs.regions)?;
                }
                processing::assign_regions(
                    table,
                    country_column,
                    target,
                    *mode,
                    &self.rules.regions,
                    &refs.regions,
                    stats,
                )
            }
            PipelineStepConfig::Projection { drop, rename } => processing::project(table, drop, rename),
        }
    }

    /// Every region group must resolve to an id in the loaded region table.
    fn check_region_groups(&self, regions: &ReferenceTable) -> Result<()> {
        match self.rules.regions.iter().find(|g| !regions.contains(&g.name)) {
            Some(group) => Err(MigrationError::Config(format!(
                "region group '{}' has no id in the region table",
                group.name
            ))),
            None => Ok(()),
        }
    }

    /// Run the complete pipeline: load inputs, transform, write the output.
    #[instrument(skip(self, paths), fields(dataset = %self.config.name))]
    pub fn run(&self, paths: &DatasetPaths) -> Result<PipelineResult> {
        let dataset = self.config.name.clone();
        info!("Starting pipeline: {}", self.config.description);
        counter!("crm_pipeline_runs_total", "dataset" => dataset.clone()).increment(1);
        let started = Instant::now();

        // Step 1: load everything before touching any row
        let raw = Table::read_csv(&paths.input, dataset.clone())?;
        let refs = References::load(&self.config, paths)?;
        info!(rows = raw.len(), "Loaded raw records");

        // Steps 2-7
        let (processed, stats) = self.transform(raw, &refs)?;

        // Step 8
        let written = processed.write_csv(&paths.output)?;

        counter!("crm_rows_processed_total", "dataset" => dataset.clone()).increment(written.rows as u64);
        counter!("crm_unparsed_phones_total", "dataset" => dataset.clone())
            .increment(stats.unparsed_phones as u64);
        counter!("crm_unresolved_companies_total", "dataset" => dataset.clone())
            .increment(stats.unresolved_companies as u64);
        counter!("crm_rows_without_region_total", "dataset" => dataset.clone())
            .increment(stats.rows_without_region as u64);
        histogram!("crm_pipeline_duration_seconds", "dataset" => dataset.clone())
            .record(started.elapsed().as_secs_f64());

        if stats.rows_without_region > 0 {
            warn!(rows = stats.rows_without_region, "Rows left without region");
        }
        info!(rows = written.rows, output = %written.path.display(), "Pipeline finished");

        Ok(PipelineResult {
            dataset,
            rows: written.rows,
            columns: processed.columns().to_vec(),
            output_file: written.path.to_string_lossy().to_string(),
            sha256: written.sha256,
            stats,
        })
    }
}
