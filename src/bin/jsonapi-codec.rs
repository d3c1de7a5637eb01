//! JSON:API Codec CLI
//!
//! Command-line checks for JSON:API request documents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use jsonapi_codec::{check_document, envelope_schema, DecodeError, DocumentKind};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "jsonapi-codec")]
#[command(about = "Check JSON:API request documents against the envelope rules")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    /// Resource creation document (client id optional)
    Post,
    /// Resource update document (type and id required)
    Patch,
    /// Standalone to-one relationship document
    ToOne,
    /// Standalone to-many relationship document
    ToMany,
}

impl KindArg {
    fn kind(self) -> DocumentKind {
        match self {
            KindArg::Post => DocumentKind::Post,
            KindArg::Patch => DocumentKind::Patch,
            KindArg::ToOne => DocumentKind::ToOneRelationship,
            KindArg::ToMany => DocumentKind::ToManyRelationship,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check a request document file against a document envelope
    Check {
        /// Document file to check
        document: PathBuf,

        /// Envelope to check against
        #[arg(long, value_enum)]
        kind: KindArg,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Print a built-in envelope schema
    Schema {
        /// Envelope to print
        #[arg(value_enum)]
        kind: KindArg,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            document,
            kind,
            json,
        } => run_check(&document, kind.kind(), json),
        Commands::Schema { kind, pretty } => run_schema(kind.kind(), pretty),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_check(path: &Path, kind: DocumentKind, json_output: bool) -> Result<(), u8> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        report_error(json_output, &format!("cannot read {}: {}", path.display(), e));
        3u8
    })?;

    let document: Value = serde_json::from_str(&content).map_err(|e| {
        report_error(json_output, &format!("invalid JSON: {}", e));
        2u8
    })?;

    match check_document(kind, &document) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid {} document", kind.name());
            }
            Ok(())
        }
        Err(DecodeError::Envelope { errors, .. }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Not a valid {} document:", kind.name());
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

fn run_schema(kind: DocumentKind, pretty: bool) -> Result<(), u8> {
    let schema = envelope_schema(kind);

    let output = if pretty {
        serde_json::to_string_pretty(&schema)
    } else {
        serde_json::to_string(&schema)
    }
    .map_err(|e| {
        eprintln!("Error serializing schema: {}", e);
        2u8
    })?;

    println!("{}", output);
    Ok(())
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        let output = serde_json::json!({ "valid": false, "error": msg });
        println!("{}", output);
    } else {
        eprintln!("Error: {}", msg);
    }
}
