//! bookmark-organiser CLI
//!
//! Reorganises Chrome/Brave/Firefox bookmark exports with a language model.
//! Logs go to stderr; each command prints a compact JSON report to stdout.

use anyhow::Result;
use bookmark_organiser::pipeline::{
    run_compare, run_html, run_metadata, run_organise, run_parse, CompareArgs, HtmlArgs,
    MetadataArgs, OrganiseArgs, ParseArgs,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bookmark-organiser")]
#[command(author = "RoyalBit Inc.")]
#[command(version)]
#[command(about = "Reorganise Chrome/Brave bookmark exports with an LLM")]
#[command(long_about = "Parses a Netscape bookmark export, enriches it with page metadata, asks an \
LLM for a cleaner folder structure and writes a validated bookmark file.\n\nCommands:\n  \
parse      Export bookmarks to JSON\n  \
metadata   Add page titles, descriptions and keywords\n  \
organise   Full pipeline (aliases: llm, all)\n  \
html       Rebuild HTML from reorganised JSON\n  \
compare    Validate a reorganised HTML file")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the bookmark export into JSON records
    Parse(ParseArgs),
    /// Parse and fetch page metadata for every bookmark
    Metadata(MetadataArgs),
    /// Parse, enrich, reorganise with the LLM, render and validate
    #[command(visible_alias = "llm", alias = "all")]
    Organise(OrganiseArgs),
    /// Rebuild the HTML file from reorganised JSON records
    Html(HtmlArgs),
    /// Validate a reorganised HTML file against the original export
    Compare(CompareArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Parse(args) => run_parse(args).await,
        Commands::Metadata(args) => run_metadata(args).await,
        Commands::Organise(args) => run_organise(args).await,
        Commands::Html(args) => run_html(args).await,
        Commands::Compare(args) => run_compare(args).await,
    }
}
