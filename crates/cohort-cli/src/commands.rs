use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use cohort_orchestrator::{
    CohortService, Extraction, FileType, IntegrityReport, JsonFileGateway, PipelineError,
    ProcessFileReport, RecordStatus,
};
use cohort_server::{CohortServer, ServerConfig};
use colored::Colorize;
use serde_json::{json, Value};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Process(args) => cmd_process(args, format).await,
        Command::Extract(args) => cmd_extract(args, format).await,
        Command::Serve(args) => cmd_serve(args).await,
    }
}

/// One input file and what processing it produced.
struct FileRun {
    path: String,
    outcome: Result<ProcessFileReport, PipelineError>,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

fn build_service(config: &ServerConfig) -> anyhow::Result<CohortService> {
    Ok(CohortService::in_memory(
        Arc::new(JsonFileGateway::new()),
        config.pipeline.clone(),
        config.reference(),
    )?)
}

async fn process_all(service: &CohortService, input: &InputArgs) -> anyhow::Result<Vec<FileRun>> {
    let file_type: FileType = input.file_type.parse()?;
    let mut runs = Vec::with_capacity(input.paths.len());
    for path in &input.paths {
        let path = path.display().to_string();
        let outcome = service.process_file(&path, file_type).await;
        if let Err(err) = &outcome {
            tracing::warn!(path = %path, error = %err, "file failed");
        }
        runs.push(FileRun { path, outcome });
    }
    Ok(runs)
}

fn ensure_all_processed(runs: &[FileRun]) -> anyhow::Result<()> {
    let failed = runs.iter().filter(|r| r.outcome.is_err()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} files failed", runs.len());
    }
    Ok(())
}

async fn cmd_process(args: ProcessArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.input.config.as_deref())?;
    let service = build_service(&config)?;
    let runs = process_all(&service, &args.input).await?;

    let mut statuses = Vec::with_capacity(runs.len());
    for run in &runs {
        let rows = match (&run.outcome, args.records) {
            (Ok(report), true) => service.record_statuses(report.file_id).await?,
            _ => Vec::new(),
        };
        statuses.push(rows);
    }

    match format {
        OutputFormat::Text => {
            for (run, rows) in runs.iter().zip(&statuses) {
                print_run(run);
                if !rows.is_empty() {
                    print_records(rows);
                }
            }
        }
        OutputFormat::Json => {
            let files: Vec<Value> = runs
                .iter()
                .zip(&statuses)
                .map(|(run, rows)| {
                    let mut value = run_json(run);
                    if args.records {
                        value["records"] = json!(rows);
                    }
                    value
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json!({ "files": files }))?);
        }
    }
    ensure_all_processed(&runs)
}

async fn cmd_extract(args: ExtractArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.input.config.as_deref())?;
    let service = build_service(&config)?;
    let runs = process_all(&service, &args.input).await?;

    let extraction = service.extract(args.limit)?;
    let integrity = if args.verify {
        service.verify_replay(&extraction)?;
        Some(service.ledger_integrity()?)
    } else {
        None
    };

    match format {
        OutputFormat::Text => {
            for run in &runs {
                print_run(run);
            }
            print_extraction(&extraction);
            if let Some(report) = &integrity {
                print_integrity(report);
            }
        }
        OutputFormat::Json => {
            let files: Vec<Value> = runs.iter().map(run_json).collect();
            let mut body = json!({
                "files": files,
                "extraction": {
                    "request_id": extraction.request_id,
                    "count": extraction.len(),
                    "records": extraction.records,
                },
            });
            if let Some(report) = &integrity {
                body["integrity"] = integrity_json(report);
            }
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }
    ensure_all_processed(&runs)
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    println!("Cohort server on {}", config.bind_addr.to_string().bold());
    CohortServer::new(config)?.serve().await?;
    Ok(())
}

fn print_run(run: &FileRun) {
    match &run.outcome {
        Ok(report) => {
            let mark = if report.has_errors {
                "!".yellow().bold()
            } else {
                "✓".green().bold()
            };
            println!(
                "{} {} (file {}, {})",
                mark,
                run.path.bold(),
                report.file_id.to_string().cyan(),
                report.content_hash.get(..12).unwrap_or(&report.content_hash).dimmed()
            );
            println!(
                "  Records: {} processed, {} skipped, {} passed, {} failed",
                report.records_processed,
                report.records_skipped,
                report.records_passed.to_string().green(),
                report.records_failed.to_string().red()
            );
            println!(
                "  Distributed: {}  Exceptions: {}  Stage: {}",
                report.records_distributed, report.exceptions_created, report.current_stage
            );
        }
        Err(err) => println!("{} {}: {}", "✗".red().bold(), run.path.bold(), err),
    }
}

fn print_records(rows: &[RecordStatus]) {
    for row in rows {
        let verdict = if row.has_validation_errors || row.has_transformation_errors {
            "failed".red()
        } else if row.distributed {
            "distributed".green()
        } else {
            "pending".yellow()
        };
        println!(
            "    {:>12}  {:<24} {}  warnings {}  exceptions {}",
            row.key.to_string(),
            row.current_stage.to_string(),
            verdict,
            row.warning_count,
            row.exception_count
        );
    }
}

fn print_extraction(extraction: &Extraction) {
    if extraction.is_empty() {
        println!("Nothing pending; request {} is empty.", extraction.request_id.to_string().yellow());
        return;
    }
    println!(
        "{} Extracted {} records under request {}",
        "✓".green().bold(),
        extraction.len(),
        extraction.request_id.to_string().yellow()
    );
    for record in &extraction.records {
        println!(
            "  {}  {}",
            record.id.to_string().dimmed(),
            record.fields.nhs_number
        );
    }
}

fn print_integrity(report: &IntegrityReport) {
    let verdict = if report.is_valid() {
        "✓ intact".green().bold()
    } else {
        "✗ violations".red().bold()
    };
    println!(
        "Replay verified. Ledger {}: {} records, {} pending, {} extracted",
        verdict, report.record_count, report.pending, report.extracted
    );
    for violation in &report.violations {
        println!("  {} {}", violation.id.to_string().red(), violation.description);
    }
}

fn run_json(run: &FileRun) -> Value {
    match &run.outcome {
        Ok(report) => json!({ "path": run.path, "report": report }),
        Err(err) => json!({ "path": run.path, "error": err.to_string() }),
    }
}

fn integrity_json(report: &IntegrityReport) -> Value {
    json!({
        "valid": report.is_valid(),
        "record_count": report.record_count,
        "pending": report.pending,
        "extracted": report.extracted,
        "violations": report
            .violations
            .iter()
            .map(|v| json!({ "id": v.id, "description": v.description }))
            .collect::<Vec<_>>(),
    })
}
