use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use crm_migrate::config::Config;
use crm_migrate::logging;
use crm_migrate::pipeline::pipeline_config::PipelineConfig;
use crm_migrate::pipeline::{DatasetPaths, Pipeline, PipelineResult};
use crm_migrate::rules::ClassificationRules;
use crm_migrate::server;

#[derive(Parser)]
#[command(name = "crm_migrate")]
#[command(about = "Prepare CRM exports for import into Twenty")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (defaults to $CRM_MIGRATE_CONFIG, then config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Classification rules overriding the built-in ones
    #[arg(long, global = true)]
    rules: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform the companies export
    Companies {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Region table with brand-prefixed names
        #[arg(long)]
        regions: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Transform the contacts export
    Contacts {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        regions: Option<PathBuf>,
        /// Company name to id table
        #[arg(long)]
        companies: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the webhook receiver
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn run_dataset(
    pipeline_config: PipelineConfig,
    rules: &ClassificationRules,
    config: &Config,
    paths: DatasetPaths,
) -> anyhow::Result<PipelineResult> {
    let name = pipeline_config.name.clone();
    let pipeline = Pipeline::new(pipeline_config, rules, &config.identity.email_domain)?;
    let result = pipeline
        .run(&paths)
        .with_context(|| format!("{name} pipeline failed"))?;

    println!("\n📊 Pipeline results for {}:", result.dataset);
    println!("   Rows: {}", result.rows);
    println!("   Columns: {}", result.columns.len());
    println!("   Unparsed phones: {}", result.stats.unparsed_phones);
    println!("   Unresolved companies: {}", result.stats.unresolved_companies);
    println!("   Rows without region: {}", result.stats.rows_without_region);
    println!("   Output file: {}", result.output_file);
    println!("   SHA-256: {}", result.sha256);
    Ok(result)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let _guard = logging::init_logging(&config.paths.log_dir);
    let rules = ClassificationRules::load(cli.rules.as_deref()).context("loading classification rules")?;

    let outcome = match cli.command {
        Commands::Companies {
            input,
            regions,
            output,
        } => {
            let paths = DatasetPaths {
                input: input.unwrap_or_else(|| config.paths.companies_input.clone()),
                output: output.unwrap_or_else(|| config.paths.companies_output.clone()),
                region_table: regions.unwrap_or_else(|| config.paths.region_table.clone()),
                company_table: None,
            };
            run_dataset(PipelineConfig::companies(), &rules, &config, paths).map(|_| ())
        }
        Commands::Contacts {
            input,
            regions,
            companies,
            output,
        } => {
            let paths = DatasetPaths {
                input: input.unwrap_or_else(|| config.paths.contacts_input.clone()),
                output: output.unwrap_or_else(|| config.paths.contacts_output.clone()),
                region_table: regions.unwrap_or_else(|| config.paths.region_table.clone()),
                company_table: Some(companies.unwrap_or_else(|| config.paths.company_table.clone())),
            };
            run_dataset(PipelineConfig::contacts(), &rules, &config, paths).map(|_| ())
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            info!(port, "Starting webhook receiver");
            server::start_server(&config.server.host, port).await
        }
    };

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    outcome
}
