use crate::infra::{build_engine, parse_date};
use crate::server;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use voter_vetting::config::AppConfig;
use voter_vetting::error::AppError;
use voter_vetting::telemetry::{self, LogSink};
use voter_vetting::workflows::matching::{MatchQuery, MatchResult};
use voter_vetting::workflows::roll::{ImportBatch, ImportError, ImportPreview};

#[derive(Parser, Debug)]
#[command(
    name = "Voter Roll Reconciliation",
    about = "Import voter rolls, look up registrations, and serve the vetting API",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Work with voter roll exports
    Roll {
        #[command(subcommand)]
        command: RollCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RollCommand {
    /// Import a roll export and print the batch summary
    Import(ImportArgs),
    /// Validate a roll export without importing it
    Preview(PreviewArgs),
    /// Search a roll export for a person
    Match(MatchArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV export from the elections office
    pub(crate) csv: PathBuf,
    /// Date the list was produced (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) list_date: NaiveDate,
}

#[derive(Args, Debug)]
pub(crate) struct PreviewArgs {
    pub(crate) csv: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct MatchArgs {
    #[arg(long)]
    pub(crate) first: String,
    #[arg(long)]
    pub(crate) last: String,
    #[arg(long, value_parser = parse_date)]
    pub(crate) dob: Option<NaiveDate>,
    #[arg(long)]
    pub(crate) birth_year: Option<i32>,
    /// Village or precinct name
    #[arg(long)]
    pub(crate) jurisdiction: Option<String>,
    /// Roll export to load before searching
    #[arg(long, requires = "list_date")]
    pub(crate) roll: Option<PathBuf>,
    #[arg(long, value_parser = parse_date)]
    pub(crate) list_date: Option<NaiveDate>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Roll { command } => run_roll(command),
    }
}

fn run_roll(command: RollCommand) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, LogSink::Stderr)?;
    let engine = build_engine(&config.reconciliation);
    let importer = &engine.roll.importer;

    match command {
        RollCommand::Import(args) => {
            let batch = importer.import_file(&args.csv, args.list_date)?;
            print_batch(&batch);
        }
        RollCommand::Preview(args) => {
            let preview = importer.preview_file(&args.csv)?;
            print_preview(&preview);
        }
        RollCommand::Match(args) => {
            if let (Some(path), Some(list_date)) = (&args.roll, args.list_date) {
                importer.import_file(path, list_date)?;
            }
            let query = MatchQuery {
                first_name: args.first,
                last_name: args.last,
                dob: args.dob,
                birth_year: args.birth_year,
                jurisdiction_name: args.jurisdiction,
            };
            let result = engine
                .roll
                .matcher
                .find_candidates(&query)
                .map_err(ImportError::Repository)?;
            print_matches(&result);
        }
    }
    Ok(())
}

fn print_batch(batch: &ImportBatch) {
    let counts = &batch.counts;
    println!("Batch {} ({})", batch.id.0, batch.list_date);
    println!("  Rows read:        {}", counts.total);
    println!("  New:              {}", counts.new);
    println!("  Updated:          {}", counts.updated);
    println!("  Transferred:      {}", counts.transferred);
    println!("  Removed:          {}", counts.removed);
    println!("  Skipped:          {}", counts.skipped);
    println!("  Ambiguous DOB:    {}", counts.ambiguous_dob);
    println!("  Unknown village:  {}", counts.unresolved_jurisdiction);
    for error in &batch.row_errors {
        println!("  row {}: {}", error.row, error.reason);
    }
}

fn print_preview(preview: &ImportPreview) {
    println!(
        "{} of {} rows valid ({} ambiguous DOB, {} unknown village)",
        preview.valid_rows,
        preview.total_rows,
        preview.ambiguous_dob,
        preview.unresolved_jurisdiction
    );
    for entry in &preview.sample {
        let birth = entry
            .dob
            .map(|dob| dob.to_string())
            .or_else(|| entry.birth_year.map(|year| year.to_string()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {} | {} | {}",
            entry.first_name, entry.last_name, birth, entry.jurisdiction_name
        );
    }
    for error in &preview.errors {
        println!("  row {}: {}", error.row, error.reason);
    }
}

fn print_matches(result: &MatchResult) {
    let Some(tier) = result.tier else {
        println!("No roll matches.");
        return;
    };
    println!(
        "Tier {} matched {} record(s)",
        tier.number(),
        result.match_count()
    );
    for candidate in &result.candidates {
        let record = &candidate.record;
        println!(
            "  #{} {} {} | {} | {} | {}",
            record.id.0,
            record.first_name,
            record.last_name,
            record.jurisdiction_name,
            record.registration_number.as_deref().unwrap_or("-"),
            candidate.confidence.label()
        );
    }
}
