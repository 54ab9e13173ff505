//! schemaport CLI - Cross-dialect schema translation and staged DDL application.

use clap::{Parser, Subcommand};
use schemaport::{
    drivers, Catalog, Config, ConnectionConfig, Dialect, MemoryTarget, Orchestrator, RunReport,
    SchemaError, SchemaReader, TargetExecutor,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemaport")]
#[command(about = "Cross-dialect schema translation and staged DDL application")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Override the table name prefix that defines the working set
    #[arg(long)]
    prefix: Option<String>,

    /// Drop existing tables before creating them
    #[arg(long)]
    drop_existing: bool,

    /// Render against an in-memory target instead of connecting to one
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reflect the source schema and write a catalog file
    Export {
        /// Output path for the catalog
        #[arg(short, long, default_value = "catalog.json")]
        output: PathBuf,

        /// Dialect to refine for [default: the configured target's]
        #[arg(long)]
        target_dialect: Option<String>,
    },

    /// Apply a catalog file to the target
    Import {
        /// Catalog file produced by export
        #[arg(long, default_value = "catalog.json")]
        catalog: PathBuf,
    },

    /// Reflect the source and apply it to the target in one run
    Migrate,

    /// Compare the target against a catalog file
    Verify {
        /// Catalog file produced by export
        #[arg(long, default_value = "catalog.json")]
        catalog: PathBuf,
    },

    /// List new, existing and orphaned tables for a catalog file
    Diff {
        /// Catalog file produced by export
        #[arg(long, default_value = "catalog.json")]
        catalog: PathBuf,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, SchemaError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let mut options = config.options.clone();
    if let Some(prefix) = &cli.prefix {
        options.prefix = prefix.clone();
    }
    if cli.drop_existing {
        options.drop_existing = true;
    }
    let orchestrator = Orchestrator::new(options);

    match &cli.command {
        Commands::Export {
            output,
            target_dialect,
        } => {
            let target = match target_dialect {
                Some(name) => name.parse::<Dialect>()?,
                None => config.target.dialect()?,
            };
            let mut source = drivers::connect(require_source(&config)?).await?;
            let export = orchestrator.export(&mut *source, target).await?;
            export.catalog.save(output)?;

            if cli.output_json {
                let summary = serde_json::json!({
                    "catalog": output,
                    "tables": export.catalog.names(),
                    "reflection_failures": export.reflection_failures,
                    "refinements": export.refinements,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("\nExport completed!");
                println!("  Catalog: {}", output.display());
                println!("  Tables: {}", export.catalog.len());
                for failure in &export.reflection_failures {
                    println!("  Omitted {}: {}", failure.table, failure.error);
                }
            }
        }

        Commands::Import { catalog } => {
            let mut catalog = Catalog::load(catalog)?;
            let mut target = open_target(&config.target, cli.dry_run).await?;
            let report = orchestrator.import(&mut catalog, &mut *target).await;
            return print_run(&report, cli.output_json, cli.dry_run);
        }

        Commands::Migrate => {
            let mut source = drivers::connect(require_source(&config)?).await?;
            let mut target = open_target(&config.target, cli.dry_run).await?;
            let report = orchestrator.migrate(&mut *source, &mut *target).await?;
            return print_run(&report, cli.output_json, cli.dry_run);
        }

        Commands::Verify { catalog } => {
            let catalog = Catalog::load(catalog)?;
            let mut target = open_target(&config.target, cli.dry_run).await?;
            let report = orchestrator.verify(&catalog, &mut *target).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Verification Summary:");
                for table in &report.tables {
                    let status = if table.is_clean() { "✓ OK" } else { "✗ Differs" };
                    println!("  {} {}", status, table.table);
                    for issue in &table.issues {
                        println!("      {:?}", issue);
                    }
                }
                println!("  Tables checked: {}", report.summary.tables_checked);
                println!("  Tables missing: {}", report.summary.tables_missing);
                println!("  Tables with issues: {}", report.summary.tables_with_issues);
            }
            if !report.is_clean() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Diff { catalog } => {
            let catalog = Catalog::load(catalog)?;
            let mut target = open_target(&config.target, cli.dry_run).await?;
            let diff = orchestrator.diff(&catalog, &mut *target).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&diff)?);
            } else {
                println!("Schema differences:");
                println!("  New ({}): {}", diff.new.len(), diff.new.join(", "));
                println!("  Existing ({}): {}", diff.existing.len(), diff.existing.join(", "));
                println!("  Orphaned ({}): {}", diff.orphaned.len(), diff.orphaned.join(", "));
                println!(
                    "\n  Overall: {}",
                    if diff.is_in_sync() { "IN SYNC" } else { "DIFFERS" }
                );
            }
        }

        Commands::HealthCheck => {
            let mut checks = Vec::new();
            if let Some(source) = &config.source {
                checks.push(("source", check_connection(source).await));
            }
            checks.push(("target", check_connection(&config.target).await));
            let healthy = checks.iter().all(|(_, c)| c.error.is_none());

            if cli.output_json {
                let results: Vec<_> = checks
                    .iter()
                    .map(|(role, c)| {
                        serde_json::json!({
                            "role": role,
                            "database": c.database,
                            "connected": c.error.is_none(),
                            "latency_ms": c.latency_ms,
                            "error": c.error,
                        })
                    })
                    .collect();
                let result = serde_json::json!({ "healthy": healthy, "checks": results });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                for (role, c) in &checks {
                    println!(
                        "  {} ({}): {} ({}ms)",
                        role,
                        c.database,
                        if c.error.is_none() { "OK" } else { "FAILED" },
                        c.latency_ms
                    );
                    if let Some(err) = &c.error {
                        println!("    Error: {}", err);
                    }
                }
                println!(
                    "\n  Overall: {}",
                    if healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !healthy {
                return Err(SchemaError::connection(
                    "Health check failed",
                    "one or more databases are unreachable",
                ));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn require_source(config: &Config) -> Result<&ConnectionConfig, SchemaError> {
    config
        .source
        .as_ref()
        .ok_or_else(|| SchemaError::Config("source is required for this command".to_string()))
}

/// Connect to the target, or stand in an empty in-memory one for dry runs.
async fn open_target(
    config: &ConnectionConfig,
    dry_run: bool,
) -> Result<Box<dyn TargetExecutor>, SchemaError> {
    if dry_run {
        let dialect = config.dialect()?;
        info!("Dry run: rendering {} DDL without connecting", dialect);
        return Ok(Box::new(MemoryTarget::new(dialect)));
    }
    drivers::connect(config).await
}

struct ConnectionCheck {
    database: String,
    latency_ms: u64,
    error: Option<String>,
}

async fn check_connection(config: &ConnectionConfig) -> ConnectionCheck {
    let start = Instant::now();
    let result = match drivers::connect(config).await {
        Ok(mut session) => session.list_tables("").await.map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        warn!("{}: {}", config.describe(), e);
    }
    ConnectionCheck {
        database: config.describe(),
        latency_ms: start.elapsed().as_millis() as u64,
        error: result.err().map(|e| e.to_string()),
    }
}

fn print_run(report: &RunReport, output_json: bool, dry_run: bool) -> Result<ExitCode, SchemaError> {
    if output_json {
        println!("{}", report.to_json()?);
    } else {
        let status_msg = if dry_run { "Dry run completed!" } else { "Schema run completed!" };
        println!("\n{}", status_msg);
        println!("  Run ID: {}", report.run_id);
        println!("  Status: {}", report.status);
        println!("  Duration: {:.2}s", report.duration_seconds);
        println!(
            "  Tables: {} created, {} present, {} failed (of {})",
            report.tables_created, report.tables_present, report.tables_failed, report.tables_total
        );
        println!(
            "  Indexes: {} created, {} failed",
            report.indexes_created, report.indexes_failed
        );
        for warning in &report.apply.session_warnings {
            println!("  Session warning: {}", warning.statement);
        }
        if !report.failed_tables.is_empty() {
            println!("  Failed tables: {:?}", report.failed_tables);
        }
        if let Some(verification) = &report.verification {
            println!(
                "  Verification: {} tables with issues",
                verification.summary.tables_with_issues
            );
        }
    }

    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
