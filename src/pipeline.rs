//! Workflow commands: parse, metadata, organise, html, compare
//!
//! Progress goes to the log, one compact JSON report goes to stdout.

use crate::client::{OpenAiClient, OpenAiConfig, DEFAULT_BASE_URL};
use crate::config::{
    OrganiserConfig, RetryPolicy, DEFAULT_BATCH_SIZE, DEFAULT_MODEL, MAX_FOLDER_DEPTH,
};
use crate::metadata::{enrich_with_metadata, EnrichMode, MetadataConfig};
use crate::organiser::BookmarkOrganiser;
use crate::parser::parse_bookmark_file;
use crate::render::write_bookmark_html;
use crate::schema::BookmarkRecord;
use crate::snapshot::{load_snapshot, write_snapshot};
use crate::validator::validate_reorganisation;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

const STAGE_PARSE: &str = "[Parse bookmark export]";
const STAGE_PERSIST: &str = "[Persist intermediate JSON]";
const STAGE_ENRICH: &str = "[Enrich with page metadata]";
const STAGE_REORGANISE: &str = "[LLM reorganisation & HTML rebuild]";
const STAGE_VALIDATE: &str = "[Validation]";

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Exported bookmarks HTML file
    #[arg(long, env = "BOOKMARKS_EXPORT_FILE", value_name = "FILE")]
    pub input: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct JsonOutputArgs {
    /// Where to write the intermediate JSON records
    #[arg(long, default_value = "bookmarks.json", value_name = "FILE")]
    pub json_output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct HtmlOutputArgs {
    /// Where to write the reorganised bookmarks HTML
    #[arg(long, default_value = "bookmarks_reorganised.html", value_name = "FILE")]
    pub html_output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Reuse metadata from an existing JSON output if present
    #[arg(long)]
    pub use_json_cache: bool,

    /// Refetch metadata for every bookmark
    #[arg(long)]
    pub fresh_scrape: bool,

    /// Number of parallel metadata requests (1-64)
    #[arg(long, default_value = "12", value_parser = clap::value_parser!(u8).range(1..=64))]
    pub workers: u8,

    /// Timeout per page fetch in milliseconds
    #[arg(long, default_value = "8000")]
    pub timeout: u64,
}

#[derive(Args, Debug, Clone)]
pub struct LlmArgs {
    /// Model used for categorisation
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Model tried once if the primary model does not exist
    #[arg(long, env = "OPENAI_FALLBACK_MODEL", default_value = DEFAULT_MODEL)]
    pub fallback_model: String,

    /// API key for the completion service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Bookmarks per model request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch_size: usize,

    /// Attempts per batch before giving up
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: u32,

    /// Text file with reorganisation hints sent with every batch
    #[arg(long, value_name = "FILE")]
    pub instruction_file: Option<PathBuf>,

    /// Text file appended to the system prompt
    #[arg(long, value_name = "FILE")]
    pub system_instruction_file: Option<PathBuf>,

    /// Timeout per model request in milliseconds
    #[arg(long, default_value = "120000")]
    pub llm_timeout: u64,
}

/// Parse the export and write the JSON records
#[derive(Args, Debug)]
pub struct ParseArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub json: JsonOutputArgs,
}

/// Parse, then fetch page metadata
#[derive(Args, Debug)]
pub struct MetadataArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub json: JsonOutputArgs,
    #[command(flatten)]
    pub scrape: ScrapeArgs,
}

/// Full pipeline: parse, metadata, reorganise, render, validate
#[derive(Args, Debug)]
pub struct OrganiseArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub json: JsonOutputArgs,
    #[command(flatten)]
    pub html: HtmlOutputArgs,
    #[command(flatten)]
    pub scrape: ScrapeArgs,
    #[command(flatten)]
    pub llm: LlmArgs,
}

/// Rebuild the HTML from reorganised JSON records
#[derive(Args, Debug)]
pub struct HtmlArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub json: JsonOutputArgs,
    #[command(flatten)]
    pub html: HtmlOutputArgs,
}

/// Validate a reorganised HTML file against the export
#[derive(Args, Debug)]
pub struct CompareArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub html: HtmlOutputArgs,
}

/// Summary printed to stdout when a command finishes (compact)
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub command: &'static str,
    pub bookmarks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_reused: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_fetched: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_output: Option<PathBuf>,
    pub validated: bool,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    fn new(command: &'static str, bookmarks: usize) -> Self {
        Self {
            command,
            bookmarks,
            metadata_reused: None,
            metadata_fetched: None,
            model: None,
            json_output: None,
            html_output: None,
            validated: false,
            finished_at: Utc::now(),
        }
    }

    fn emit(mut self) -> Result<()> {
        self.finished_at = Utc::now();
        println!("{}", serde_json::to_string(&self)?);
        Ok(())
    }
}

/// Run the parse command
pub async fn run_parse(args: ParseArgs) -> Result<()> {
    let input = resolve_input(&args.input)?;
    let (records, _) = parse_stage(&input, &args.json.json_output, None)?;
    info!("{STAGE_PERSIST} JSON export complete; parse-only run finished");

    let mut report = RunReport::new("parse", records.len());
    report.json_output = Some(args.json.json_output);
    report.emit()
}

/// Run the metadata command
pub async fn run_metadata(args: MetadataArgs) -> Result<()> {
    let input = resolve_input(&args.input)?;
    let json_path = &args.json.json_output;
    let (mut records, reused) = parse_stage(&input, json_path, Some(&args.scrape))?;

    let fetched = enrich_stage(&mut records, &args.scrape).await?;
    write_snapshot(&records, json_path)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;
    info!("{STAGE_ENRICH} Metadata enrichment complete; metadata-only run finished");

    let mut report = RunReport::new("metadata", records.len());
    report.metadata_reused = Some(reused);
    report.metadata_fetched = Some(fetched);
    report.json_output = Some(args.json.json_output);
    report.emit()
}

/// Run the full organise pipeline
pub async fn run_organise(args: OrganiseArgs) -> Result<()> {
    let input = resolve_input(&args.input)?;
    let json_path = &args.json.json_output;
    let html_path = &args.html.html_output;

    // Fail on configuration problems before any network traffic.
    let user_instructions = load_instructions(args.llm.instruction_file.as_deref()).await?;
    let system_extension = load_instructions(args.llm.system_instruction_file.as_deref()).await?;
    let client = build_client(&args.llm)?;

    let (mut records, reused) = parse_stage(&input, json_path, Some(&args.scrape))?;
    let fetched = enrich_stage(&mut records, &args.scrape).await?;
    write_snapshot(&records, json_path)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;

    let config = OrganiserConfig {
        model: args.llm.model.clone(),
        fallback_model: Some(args.llm.fallback_model.clone()),
        batch_size: args.llm.batch_size,
        max_depth: MAX_FOLDER_DEPTH,
        system_prompt_extension: system_extension,
        retry: RetryPolicy {
            max_attempts: args.llm.max_attempts,
            ..RetryPolicy::default()
        },
    };
    let mut organiser = BookmarkOrganiser::new(client, config);

    info!(
        "{STAGE_REORGANISE} Invoking {} for {} bookmarks",
        organiser.session().model,
        records.len()
    );
    organiser
        .reorganise(&mut records, user_instructions.as_deref())
        .await
        .context("Reorganisation failed")?;

    write_snapshot(&records, json_path)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;
    info!(
        "{STAGE_REORGANISE} Building reorganised bookmark HTML at {}",
        html_path.display()
    );
    write_bookmark_html(&records, html_path, MAX_FOLDER_DEPTH)
        .with_context(|| format!("Failed to write {}", html_path.display()))?;

    validate_stage(&input, html_path, Some(json_path))?;

    let mut report = RunReport::new("organise", records.len());
    report.metadata_reused = Some(reused);
    report.metadata_fetched = Some(fetched);
    report.model = Some(organiser.session().model.clone());
    report.json_output = Some(args.json.json_output.clone());
    report.html_output = Some(args.html.html_output.clone());
    report.validated = true;
    report.emit()
}

/// Run the html command
pub async fn run_html(args: HtmlArgs) -> Result<()> {
    let input = resolve_input(&args.input)?;
    let json_path = &args.json.json_output;
    let html_path = &args.html.html_output;

    info!("{STAGE_REORGANISE} Loading reorganised data from {}", json_path.display());
    if !json_path.exists() {
        bail!(
            "JSON cache not found at {}; run the organise command first",
            json_path.display()
        );
    }
    let records = load_snapshot(json_path)
        .with_context(|| format!("Failed to load {}", json_path.display()))?;

    let missing = records.iter().filter(|r| !r.is_reorganised()).count();
    if missing > 0 {
        bail!(
            "JSON cache does not contain reorganised locations for {} of {} bookmarks; \
             run the organise command to regenerate them",
            missing,
            records.len()
        );
    }

    write_bookmark_html(&records, html_path, MAX_FOLDER_DEPTH)
        .with_context(|| format!("Failed to write {}", html_path.display()))?;
    validate_stage(&input, html_path, Some(json_path))?;

    let mut report = RunReport::new("html", records.len());
    report.json_output = Some(args.json.json_output.clone());
    report.html_output = Some(args.html.html_output.clone());
    report.validated = true;
    report.emit()
}

/// Run the compare command
pub async fn run_compare(args: CompareArgs) -> Result<()> {
    let input = resolve_input(&args.input)?;
    let html_path = &args.html.html_output;

    info!(
        "{STAGE_VALIDATE} Running comparison between {} and {}",
        input.display(),
        html_path.display()
    );
    if !html_path.exists() {
        bail!("Reorganised bookmark file not found: {}", html_path.display());
    }
    let count = validate_stage(&input, html_path, None)?;

    let mut report = RunReport::new("compare", count);
    report.html_output = Some(args.html.html_output.clone());
    report.validated = true;
    report.emit()
}

fn resolve_input(args: &InputArgs) -> Result<PathBuf> {
    match &args.input {
        Some(path) => Ok(path.clone()),
        None => {
            bail!("No input file provided. Supply --input or set BOOKMARKS_EXPORT_FILE in env.")
        }
    }
}

fn parse_batch_size(s: &str) -> std::result::Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        Ok(_) => Err("batch size must be at least 1".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Read an optional instruction file; a path that does not exist is an error.
async fn load_instructions(path: Option<&Path>) -> Result<Option<String>> {
    let Some(path) = path else {
        return Ok(None);
    };
    if !path.exists() {
        bail!("User instruction file not found: {}", path.display());
    }
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(Some(text))
}

fn build_client(args: &LlmArgs) -> Result<OpenAiClient> {
    let Some(api_key) = args.api_key.clone().filter(|k| !k.trim().is_empty()) else {
        bail!("OPENAI_API_KEY is not set; supply --api-key or set it in the environment");
    };
    let client = OpenAiClient::new(OpenAiConfig {
        api_key,
        base_url: args.base_url.clone(),
        timeout_ms: args.llm_timeout,
    })?;
    Ok(client)
}

/// Parse the export, optionally reuse cached metadata, and persist the records.
///
/// The cache is read before the fresh snapshot overwrites it.
fn parse_stage(
    input: &Path,
    json_path: &Path,
    scrape: Option<&ScrapeArgs>,
) -> Result<(Vec<BookmarkRecord>, usize)> {
    info!("{STAGE_PARSE} Parsing {}", input.display());
    let mut records = parse_bookmark_file(input)
        .with_context(|| format!("Failed to parse bookmark export: {}", input.display()))?;

    let mut reused = 0;
    if let Some(scrape) = scrape.filter(|s| s.use_json_cache) {
        let cache = load_cache(json_path);
        if cache.is_empty() {
            info!(
                "No existing JSON cache at {}; proceeding without reuse",
                json_path.display()
            );
        } else if !scrape.fresh_scrape {
            reused = reuse_metadata(&mut records, &cache);
        }
    }

    info!("{STAGE_PERSIST} Writing intermediate JSON to {}", json_path.display());
    write_snapshot(&records, json_path)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;
    Ok((records, reused))
}

fn load_cache(json_path: &Path) -> HashMap<String, BookmarkRecord> {
    if !json_path.exists() {
        return HashMap::new();
    }
    match load_snapshot(json_path) {
        Ok(cached) => cached.into_iter().map(|r| (r.url.clone(), r)).collect(),
        Err(e) => {
            warn!(
                "Failed to load existing JSON at {} ({}); continuing without cache",
                json_path.display(),
                e
            );
            HashMap::new()
        }
    }
}

/// Copy non-empty cached metadata onto records with the same URL.
fn reuse_metadata(
    records: &mut [BookmarkRecord],
    cache: &HashMap<String, BookmarkRecord>,
) -> usize {
    let mut reused = 0;
    for record in records.iter_mut() {
        if let Some(cached) = cache.get(&record.url).filter(|c| !c.metadata.is_empty()) {
            record.metadata = cached.metadata.clone();
            reused += 1;
        }
    }
    if reused > 0 {
        info!("Reused cached metadata for {} bookmarks", reused);
    }
    reused
}

async fn enrich_stage(records: &mut [BookmarkRecord], scrape: &ScrapeArgs) -> Result<usize> {
    let mode = if scrape.fresh_scrape {
        EnrichMode::All
    } else {
        EnrichMode::OnlyMissing
    };
    let to_fetch = match mode {
        EnrichMode::All => records.len(),
        EnrichMode::OnlyMissing => records.iter().filter(|r| r.metadata.is_empty()).count(),
    };
    if to_fetch == 0 {
        info!(
            "{STAGE_ENRICH} Using cached metadata for all {} bookmarks; skipping scraping",
            records.len()
        );
        return Ok(0);
    }

    info!("{STAGE_ENRICH} Fetching metadata for {} bookmarks", to_fetch);
    let config = MetadataConfig {
        timeout_ms: scrape.timeout,
        workers: scrape.workers as usize,
    };
    Ok(enrich_with_metadata(records, mode, &config).await?)
}

/// Re-parse the export and check the rendered file against it.
fn validate_stage(input: &Path, html_path: &Path, snapshot: Option<&Path>) -> Result<usize> {
    info!("{STAGE_VALIDATE} Running validation checks");
    let original = parse_bookmark_file(input)
        .with_context(|| format!("Failed to parse bookmark export: {}", input.display()))?;
    validate_reorganisation(&original, html_path, snapshot)?;
    info!("{STAGE_VALIDATE} Workflow completed successfully");
    Ok(original.len())
}
