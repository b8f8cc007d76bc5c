//! Schema Validator CLI
//!
//! Loads JSON Schema documents and validates instances against them.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use familiar_jsonschema::{compile_with, Draft, SchemaError, SchemaGraph, ValidationReport, ValidatorConfig};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-validator")]
#[command(about = "Load JSON Schemas and validate instances against them")]
struct Cli {
    /// Configuration file (overrides jsonschema.toml lookups)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Abort on the first error-level loading issue
    #[arg(long, global = true)]
    strict: bool,

    /// Draft for schemas without a recognized $schema (draft3, draft4, draft6)
    #[arg(long, global = true)]
    draft: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a schema and print its loading report
    Check {
        /// Schema file
        schema: PathBuf,
    },

    /// Validate instance files against a schema
    Validate {
        /// Schema file
        schema: PathBuf,
        /// Instance files
        #[arg(required = true)]
        instances: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match ValidatorConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match run(cli, config) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Ok(false) when a schema or instance failed
fn run(cli: Cli, mut config: ValidatorConfig) -> Result<bool> {
    if cli.strict {
        config.loader.strict = true;
    }
    if let Some(name) = &cli.draft {
        config.loader.default_draft = Draft::from_name(name).ok_or_else(|| anyhow!("unknown draft '{}'", name))?;
    }
    let loader = config.build_loader()?;

    match cli.command {
        Commands::Check { schema } => {
            let graph = match loader.load_file(&schema) {
                Ok(graph) => graph,
                Err(e) => return report_load_failure(&schema, e, cli.json),
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(graph.report())?);
            } else {
                println!("✅ {} loaded ({} schema nodes)", schema.display(), graph.len());
                print_issues(&graph);
            }
            Ok(true)
        }

        Commands::Validate { schema, instances } => {
            let graph = match loader.load_file(&schema) {
                Ok(graph) => graph,
                Err(e) => return report_load_failure(&schema, e, cli.json),
            };
            if !cli.json {
                print_issues(&graph);
            }
            let validator = compile_with(&graph, &config.compile_options())?;

            let mut all_valid = true;
            let mut results = Vec::new();
            for path in &instances {
                let instance = read_json(path)?;
                let mut report = ValidationReport::new();
                let valid = validator.validate(&instance, &mut report);
                all_valid &= valid;

                if cli.json {
                    results.push(serde_json::json!({
                        "instance": path.display().to_string(),
                        "valid": valid,
                        "error": report.error(),
                    }));
                } else if valid {
                    println!("✅ {} - valid", path.display());
                } else {
                    println!("❌ {} - INVALID", path.display());
                    if let Some(error) = report.error() {
                        for line in error.format_tree().lines() {
                            println!("   {}", line);
                        }
                    }
                }
            }

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            }
            Ok(all_valid)
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn print_issues(graph: &SchemaGraph) {
    for issue in graph.report().all() {
        println!("  ⚠️  {}", issue);
    }
}

/// Loading reports are printed; any other error is propagated
fn report_load_failure(schema: &Path, error: SchemaError, json: bool) -> Result<bool> {
    let Some(report) = error.loading_report() else {
        return Err(error.into());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("❌ {} failed to load", schema.display());
        print!("{}", report.format_all());
    }
    Ok(false)
}
