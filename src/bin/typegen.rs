//! Schema Typegen CLI
//!
//! Compiles JSON Schema documents into type declarations with contracts.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use schema_typegen::{compile_str, GeneratedOutput, Runtime, TypegenConfig};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "schema-typegen")]
#[command(about = "Compile JSON Schema into typed declarations")]
struct Cli {
    /// Configuration file (layered over typegen.toml and TYPEGEN_* variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the target package name
    #[arg(short, long)]
    package: Option<String>,

    /// Treat every diagnostic as an error
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one schema and print (or write) the declarations
    Compile {
        /// Schema document
        schema: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile one schema, report diagnostics, optionally check an instance
    Check {
        /// Schema document
        schema: PathBuf,
        /// Instance document to round-trip through the generated contracts
        #[arg(short, long, requires = "type_name")]
        instance: Option<PathBuf>,
        /// Declared type the instance is decoded as
        #[arg(short = 't', long = "type")]
        type_name: Option<String>,
    },

    /// Compile every *.json schema under a directory
    Batch {
        /// Directory to walk
        dir: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<TypegenConfig> {
    let mut config = TypegenConfig::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(package) = &cli.package {
        config.codegen.package = package.clone();
    }
    if cli.strict {
        config.codegen.diagnostics = schema_typegen::codegen::DiagnosticsConfig::strict();
    }
    Ok(config)
}

fn compile_file(path: &Path, config: &TypegenConfig) -> anyhow::Result<GeneratedOutput> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    compile_str(&text, &config.codegen)
        .with_context(|| format!("Failed to compile {}", path.display()))
}

/// Returns `Ok(false)` when the command ran but found failures
fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Compile { schema, output } => {
            let compiled = compile_file(&schema, &config)?;
            for item in &compiled.diagnostics {
                eprintln!("⚠️  {}", item);
            }

            let rendered = config.render(&compiled)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("✅ {} type(s) written to {}", compiled.type_count(), path.display());
                }
                None => println!("{}", rendered),
            }
            Ok(true)
        }

        Commands::Check {
            schema,
            instance,
            type_name,
        } => {
            println!("🔍 Checking {}", schema.display());
            let compiled = compile_file(&schema, &config)?;

            for name in compiled.names() {
                println!("  • {}", name);
            }
            if compiled.diagnostics.is_empty() {
                println!("✅ {} type(s), no diagnostics", compiled.type_count());
            } else {
                print!("{}", compiled.diagnostics.format_all());
            }

            let (Some(instance), Some(type_name)) = (instance, type_name) else {
                return Ok(true);
            };

            let text = std::fs::read_to_string(&instance)
                .with_context(|| format!("Failed to read {}", instance.display()))?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", instance.display()))?;

            let runtime = Runtime::new(&compiled);
            match runtime.round_trip(&type_name, &value) {
                Ok(encoded) => {
                    println!("✅ {} is a valid {}", instance.display(), type_name);
                    println!("{}", config.render(&encoded)?);
                    Ok(true)
                }
                Err(e) => {
                    println!("❌ {} is not a valid {}", instance.display(), type_name);
                    println!("   └─ {}", e);
                    Ok(false)
                }
            }
        }

        Commands::Batch { dir } => {
            println!("🔍 Compiling schemas under {}", dir.display());

            let mut compiled = 0usize;
            let mut failed = 0usize;

            for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                let is_schema = path.extension().map_or(false, |ext| ext == "json")
                    && !path.to_string_lossy().ends_with(&config.output.extension);
                if !entry.file_type().is_file() || !is_schema {
                    continue;
                }

                match compile_file(path, &config) {
                    Ok(output) => {
                        let target = config.output_path(path);
                        if let Some(parent) = target.parent() {
                            std::fs::create_dir_all(parent)?;
                        }
                        std::fs::write(&target, config.render(&output)?)?;
                        println!(
                            "  ✅ {} -> {} ({} types, {} warnings)",
                            path.display(),
                            target.display(),
                            output.type_count(),
                            output.diagnostics.warning_count()
                        );
                        compiled += 1;
                    }
                    Err(e) => {
                        println!("  ❌ {}: {:#}", path.display(), e);
                        failed += 1;
                    }
                }
            }

            println!();
            println!("{} compiled, {} failed", compiled, failed);
            Ok(failed == 0)
        }
    }
}
