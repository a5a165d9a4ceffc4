//! Retail ETL CLI
//!
//! # Main Commands
//!
//! ```bash
//! retail-etl run --config config/pipeline.yaml         # Full extract, clean, load, tighten
//! retail-etl run --config config/pipeline.yaml --only cards --only stores
//! retail-etl tighten --config config/pipeline.yaml     # Schema step only
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! retail-etl clean products data/products.csv         # Clean a local file, CSV on stdout
//! retail-etl parse-date "2005 December 02"            # Probe the date parser
//! retail-etl convert-weight "12 x 100g"               # Probe the weight converter
//! ```

use clap::{Parser, Subcommand};
use retail_etl::logging::init_logging;
use retail_etl::pipeline::tighten;
use retail_etl::{
    clean_file, convert_weight, parse_date, CleanOptions, Entity, NullPolicy, Pipeline,
    PipelineConfig, RunSummary, TightenSummary, WeightClass,
};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "retail-etl")]
#[command(about = "Clean retail sales sources and load the star-schema warehouse", long_about = None)]
struct Cli {
    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline
    Run {
        /// Pipeline YAML file
        #[arg(short, long)]
        config: PathBuf,

        /// Only run these entities (repeatable)
        #[arg(long, value_parser = parse_entity)]
        only: Vec<Entity>,

        /// Skip the schema tightening step
        #[arg(long)]
        no_tighten: bool,
    },

    /// Clean a local CSV or JSON file without any connection
    Clean {
        /// Entity the file holds (users, cards, stores, products, orders, date_times)
        #[arg(value_parser = parse_entity)]
        entity: Entity,

        /// Input CSV or JSON file
        input: PathBuf,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep rows whose values could not be coerced, with nulls
        #[arg(long)]
        retain_nulls: bool,
    },

    /// Narrow column types and add foreign keys on the warehouse
    Tighten {
        /// Pipeline YAML file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Show what the date parser makes of a value
    ParseDate {
        text: String,
    },

    /// Show what the weight converter makes of a value
    ConvertWeight {
        text: String,
    },
}

fn parse_entity(value: &str) -> Result<Entity, String> {
    value.parse()
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let result = match cli.command {
        Commands::Run {
            config,
            only,
            no_tighten,
        } => cmd_run(&config, only, no_tighten).await,

        Commands::Clean {
            entity,
            input,
            output,
            retain_nulls,
        } => cmd_clean(entity, &input, output.as_deref(), retain_nulls),

        Commands::Tighten { config } => cmd_tighten(&config).await,

        Commands::ParseDate { text } => cmd_parse_date(&text),

        Commands::ConvertWeight { text } => cmd_convert_weight(&text),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

async fn cmd_run(config: &Path, only: Vec<Entity>, no_tighten: bool) -> CliResult {
    let config = PipelineConfig::load(config)?;
    let mut pipeline = Pipeline::new(config).only(only);
    if no_tighten {
        pipeline = pipeline.without_tightening();
    }

    let summary = pipeline.run().await?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    for run in &summary.entities {
        eprintln!("{}", run.report.summary());
        for drop in run.report.drops.iter().filter(|d| d.count > 0) {
            eprintln!("   - {}: {}", drop.step, drop.count);
        }
        eprintln!("   -> {} ({})", run.load.destination, run.load.target);
    }
    if let Some(schema) = &summary.schema {
        print_schema(schema);
    }
    eprintln!(
        "Done: {} rows loaded, {} rows dropped",
        summary.rows_loaded(),
        summary.rows_dropped()
    );
}

fn cmd_clean(entity: Entity, input: &Path, output: Option<&Path>, retain_nulls: bool) -> CliResult {
    let options = CleanOptions {
        residual_nulls: if retain_nulls {
            NullPolicy::Retain
        } else {
            NullPolicy::Drop
        },
    };

    let cleaned = clean_file(entity, input, &options)?;
    eprintln!("{}", cleaned.report.summary());
    for drop in cleaned.report.drops.iter().filter(|d| d.count > 0) {
        eprintln!("   - {}: {}", drop.step, drop.count);
    }

    match output {
        Some(path) => {
            cleaned.table.write_csv(BufWriter::new(File::create(path)?))?;
            eprintln!("Saved to: {}", path.display());
        }
        None => cleaned.table.write_csv(io::stdout().lock())?,
    }
    Ok(())
}

async fn cmd_tighten(config: &Path) -> CliResult {
    let config = PipelineConfig::load(config)?;
    let summary = tighten(&config).await?;
    print_schema(&summary);
    Ok(())
}

fn print_schema(schema: &TightenSummary) {
    eprintln!(
        "Schema: {} tables altered, {} foreign keys added",
        schema.altered.len(),
        schema.foreign_keys.len()
    );
    for (name, error) in schema.failed_tables.iter().chain(&schema.failed_foreign_keys) {
        eprintln!("   ! {}: {}", name, error);
    }
}

fn cmd_parse_date(text: &str) -> CliResult {
    match parse_date(text) {
        Some(date) => println!("{}", date),
        None => println!("(missing)"),
    }
    Ok(())
}

fn cmd_convert_weight(text: &str) -> CliResult {
    match convert_weight(text) {
        Some(kg) => println!("{} kg ({})", kg, WeightClass::from_kg(kg)),
        None => println!("(missing)"),
    }
    Ok(())
}
