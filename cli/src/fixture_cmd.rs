//! Fixture CLI commands
//!
//! - `replay inspect <FILE> [--json]` - list the stubs a fixture holds
//! - `replay validate <FILE>` - report entries the loader would skip
//! - `replay normalize <QUERY>` - print the canonical form of a GraphQL query

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use replay_core::Stub;
use replay_core::identifier::normalize_query;
use replay_core::loader;
use serde_json::Value;
use serde_json::json;

/// Exit code when every entry loaded.
pub const EXIT_OK: i32 = 0;
/// Exit code when at least one entry was skipped.
pub const EXIT_SKIPPED: i32 = 1;
/// Exit code when the file itself could not be read.
pub const EXIT_UNREADABLE: i32 = 2;

/// Inspect and validate replay fixtures
#[derive(Debug, Parser)]
#[command(name = "replay", version)]
pub struct ReplayCli {
    #[command(subcommand)]
    pub command: ReplaySubcommand,
}

impl ReplayCli {
    pub fn run(self) -> i32 {
        match self.command {
            ReplaySubcommand::Inspect(args) => run_inspect(args),
            ReplaySubcommand::Validate(args) => run_validate(args),
            ReplaySubcommand::Normalize(args) => run_normalize(args),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ReplaySubcommand {
    /// List the stubs stored in a fixture file, in replay order
    Inspect(InspectArgs),

    /// Check that every entry of a fixture file can be loaded
    ///
    /// Exits 1 when any entry would be skipped and 2 when the file is unreadable.
    Validate(ValidateArgs),

    /// Print the normalized form of a GraphQL query document
    Normalize(NormalizeArgs),
}

#[derive(Debug, Parser)]
pub struct InspectArgs {
    /// Fixture file to read
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output as JSON for automation
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct ValidateArgs {
    /// Fixture file to check
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Debug, Parser)]
pub struct NormalizeArgs {
    /// Query document
    #[arg(value_name = "QUERY")]
    pub query: String,
}

/// How a stub's body is stored on disk.
fn body_kind(stub: &Stub) -> &'static str {
    if stub.response.error.is_some() {
        return "error";
    }
    let encoded = stub.to_json();
    let mock = &encoded["mock"];
    ["json", "text", "base64"]
        .into_iter()
        .find(|kind| mock.get(kind).is_some())
        .unwrap_or("empty")
}

fn summarize(stub: &Stub) -> Value {
    json!({
        "type": stub.identifier.kind(),
        "identifier": stub.identifier.to_string(),
        "statusCode": stub.response.status_code,
        "body": body_kind(stub),
    })
}

pub fn run_inspect(args: InspectArgs) -> i32 {
    let report = match loader::load_with_report(&args.file) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("error: {err}");
            return EXIT_UNREADABLE;
        }
    };

    if args.json {
        let output = json!({
            "file": args.file.display().to_string(),
            "stubs": report.stubs.iter().map(summarize).collect::<Vec<_>>(),
            "skipped": report.skipped.len(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return EXIT_OK;
    }

    for (index, stub) in report.stubs.iter().enumerate() {
        println!(
            "{index:>3}  {:<9}  {:>3}  {:<6}  {}",
            stub.identifier.kind(),
            stub.response.status_code,
            body_kind(stub),
            stub.identifier
        );
    }
    println!(
        "{} stub(s), {} skipped",
        report.stubs.len(),
        report.skipped.len()
    );
    EXIT_OK
}

pub fn run_validate(args: ValidateArgs) -> i32 {
    let report = match loader::load_with_report(&args.file) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("error: {err}");
            return EXIT_UNREADABLE;
        }
    };

    if report.skipped.is_empty() {
        println!("ok: {} entries", report.stubs.len());
        return EXIT_OK;
    }

    for skipped in &report.skipped {
        println!("entry {}: {}", skipped.index, skipped.reason);
    }
    println!(
        "{} of {} entries would be skipped",
        report.skipped.len(),
        report.skipped.len() + report.stubs.len()
    );
    EXIT_SKIPPED
}

pub fn run_normalize(args: NormalizeArgs) -> i32 {
    println!("{}", normalize_query(&args.query));
    EXIT_OK
}
