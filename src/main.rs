//! datacore CLI - schema validation and inspection
//!
//! Usage: datacore <COMMAND>
//!
//! Commands:
//!   check   Load a schema directory and run every startup validation
//!   parse   Parse and display schema definitions (debugging)

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use datacore::graph::DependencyGraph;
use datacore::registry::DataCore;

/// datacore - schema-driven field derivation engine
#[derive(Parser, Debug)]
#[command(name = "datacore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output as JSON for CI
    #[arg(long, default_value = "false")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a schema directory and run every startup validation
    Check {
        /// Path to the schema directory
        #[arg(short, long, default_value = "schema")]
        source: PathBuf,
    },

    /// Parse and display schema definitions (debugging)
    Parse {
        /// Path to the schema directory
        #[arg(short, long, default_value = "schema")]
        source: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { source } => cmd_check(&source, cli.json),
        Commands::Parse { source } => cmd_parse(&source, cli.json),
    }
}

fn cmd_check(source: &PathBuf, json: bool) -> Result<ExitCode> {
    if !json {
        println!("🔎 datacore check");
        println!("Source: {}", source.display());
        println!();
    }

    let outcome = check_schema(source);

    match outcome {
        Ok(summary) => {
            if json {
                let output = serde_json::json!({
                    "event": "check",
                    "status": "ok",
                    "types": summary.types,
                    "fields": summary.fields,
                    "derived": summary.derived,
                });
                println!("{}", serde_json::to_string(&output)?);
            } else {
                println!(
                    "✓ {} types, {} fields ({} derived)",
                    summary.types, summary.fields, summary.derived
                );
                println!("✓ no dependency cycles");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            if json {
                let output = serde_json::json!({
                    "event": "check",
                    "status": "error",
                    "message": err.to_string(),
                });
                println!("{}", serde_json::to_string(&output)?);
            } else {
                eprintln!("✗ {err}");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

struct CheckSummary {
    types: usize,
    fields: usize,
    derived: usize,
}

fn check_schema(source: &PathBuf) -> datacore::SchemaResult<CheckSummary> {
    let registry = datacore::load_registry(source)?;
    registry.validate()?;

    let graph = DependencyGraph::build(&registry)?;
    graph.validate()?;

    let fields: usize = registry.types().map(|t| t.fields.len()).sum();
    let derived = registry
        .types()
        .flat_map(|t| &t.fields)
        .filter(|f| f.data_core.is_some())
        .count();

    Ok(CheckSummary {
        types: registry.len(),
        fields,
        derived,
    })
}

fn cmd_parse(source: &PathBuf, json: bool) -> Result<ExitCode> {
    let registry = match datacore::load_registry(source) {
        Ok(reg) => reg,
        Err(err) => {
            eprintln!("✗ {err}");
            return Ok(ExitCode::FAILURE);
        }
    };

    if json {
        for ty in registry.types() {
            let output = serde_json::json!({
                "event": "type",
                "name": ty.name,
                "extends": ty.extends,
                "abstract": ty.is_abstract,
                "fields": ty.fields.len(),
            });
            println!("{}", serde_json::to_string(&output)?);
        }
        return Ok(ExitCode::SUCCESS);
    }

    println!("Found {} types:\n", registry.len());
    for ty in registry.types() {
        println!("┌─ {}", ty.name);
        if let Some(parent) = &ty.extends {
            println!("│  Extends: {parent}");
        }
        if ty.is_abstract {
            println!("│  Abstract");
        }
        for field in &ty.fields {
            let strategy = match &field.data_core {
                None => "stored",
                Some(DataCore::Static(_)) => "static",
                Some(DataCore::InstanceStatic { .. }) => "instance-static",
                Some(DataCore::DirectDerived { .. }) => "direct-derived",
                Some(DataCore::Derived { .. }) => "derived",
                Some(DataCore::SelfParent { .. }) => "self-parent",
                Some(DataCore::MultiParentList { .. }) => "multi-parent",
            };
            println!("│  {} ({strategy})", field.name);
        }
        println!("└─");
    }

    Ok(ExitCode::SUCCESS)
}
