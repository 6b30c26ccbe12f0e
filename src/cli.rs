//! CLI parsing and orchestration. Parses args, opens the story, assembles the book and writes EPUB.
//! Maps errors to exit codes.

use crate::assembler::{assemble_book, AssembleOptions, BookError};
use crate::config::{self, Config};
use crate::epub::{write_epub, EpubError, DEFAULT_STYLESHEET};
use crate::extractor::{open_extractor, resolve_site, Fetcher, HttpClient, ScraperError, Site};
use crate::fetch::{Progress, MAX_CONCURRENT_FETCHES};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Scraper(#[from] ScraperError),

    #[error("{0}")]
    Book(#[from] BookError),

    #[error("{0}")]
    Epub(#[from] EpubError),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Scraper(_) | CliRunError::Book(_) => 2,
            CliRunError::Epub(_) => 3,
        }
    }

    /// True when the run failed because a site could not be reached or answered with an error.
    pub fn is_network(&self) -> bool {
        match self {
            CliRunError::Scraper(e) => e.is_network(),
            CliRunError::Book(e) => e.scraper_error().map_or(false, ScraperError::is_network),
            CliRunError::InvalidInput(_) | CliRunError::Epub(_) => false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ficbind", version)]
#[command(about = "Download a web serial from Wattpad, Chrysanthemum Garden or Foxaholic as an EPUB")]
#[command(
    after_help = "Config file keys (output_dir, user_agent, timeout_secs, max_concurrent_fetches, stylesheet) are read from ./ficbind.toml or the user config dir (ficbind/config.toml). CLI flags override config."
)]
pub struct Args {
    /// Story URL (Wattpad story page, Chrysanthemum Garden novel page or Foxaholic novel page).
    pub url: String,

    /// Override site detection: wattpad (wp), chrysanthemum (cg) or foxaholic (fh).
    #[arg(long, value_parser = parse_site)]
    pub site: Option<Site>,

    /// Output file name, without directory. Default: {story id}.epub in the configured output_dir.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Simultaneous chapter downloads, 1 to 20 (overrides config; default 20).
    #[arg(short, long, value_parser = parse_jobs)]
    pub jobs: Option<usize>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Suppress progress output (errors and warnings only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug logging and full error chain.
    #[arg(long)]
    pub verbose: bool,
}

fn parse_site(s: &str) -> Result<Site, String> {
    match s.to_lowercase().as_str() {
        "wattpad" | "wp" => Ok(Site::Wattpad),
        "chrysanthemum" | "chrysanthemumgarden" | "cg" => Ok(Site::ChrysanthemumGarden),
        "foxaholic" | "fh" | "fox" => Ok(Site::Foxaholic),
        _ => Err(format!(
            "Invalid --site value: '{}'. Use 'wattpad' (wp), 'chrysanthemum' (cg) or 'foxaholic' (fh).",
            s
        )),
    }
}

fn parse_jobs(s: &str) -> Result<usize, String> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid --jobs value: '{}' is not a number", s))?;
    if !(1..=MAX_CONCURRENT_FETCHES).contains(&n) {
        return Err(format!(
            "Invalid --jobs value: {}. Use 1 to {}.",
            n, MAX_CONCURRENT_FETCHES
        ));
    }
    Ok(n)
}

/// `{name}.epub`, without doubling an extension the user already typed.
fn output_file_name(name: &str) -> String {
    let stem = name.trim();
    let has_ext = stem.len() > 5
        && stem
            .get(stem.len() - 5..)
            .map_or(false, |ext| ext.eq_ignore_ascii_case(".epub"));
    if has_ext {
        stem.to_string()
    } else {
        format!("{}.epub", stem)
    }
}

/// Ensure output path parent exists.
fn validate_output_path(path: &Path) -> Result<(), CliRunError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(CliRunError::InvalidInput(format!(
                "Cannot write output: {}: parent directory does not exist.",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Effective run settings after merging CLI flags over config.
#[derive(Debug)]
pub struct RunSettings {
    pub output_dir: PathBuf,
    pub jobs: usize,
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    pub stylesheet: String,
    pub show_progress: bool,
}

impl RunSettings {
    pub fn merge(args: &Args, config: &Config) -> Result<Self, CliRunError> {
        let jobs = args
            .jobs
            .or(config.max_concurrent_fetches)
            .unwrap_or(MAX_CONCURRENT_FETCHES);
        if !(1..=MAX_CONCURRENT_FETCHES).contains(&jobs) {
            return Err(CliRunError::InvalidInput(format!(
                "Invalid max_concurrent_fetches in config: {}. Use 1 to {}.",
                jobs, MAX_CONCURRENT_FETCHES
            )));
        }
        let stylesheet = match &config.stylesheet {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                CliRunError::InvalidInput(format!(
                    "Cannot read stylesheet {}: {}",
                    path.display(),
                    e
                ))
            })?,
            None => DEFAULT_STYLESHEET.to_string(),
        };
        Ok(Self {
            output_dir: config
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
            jobs,
            timeout_secs: args
                .timeout
                .or(config.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            user_agent: args.user_agent.clone().or_else(|| config.user_agent.clone()),
            stylesheet,
            show_progress: !args.quiet,
        })
    }
}

/// Entry point for the CLI. Returns the written path on success; Err with exit code and message on failure.
pub async fn run(args: &Args) -> Result<PathBuf, CliRunError> {
    let site = resolve_site(&args.url, args.site).map_err(|e| match &e {
        ScraperError::InvalidUrl { input, reason } => CliRunError::InvalidInput(format!(
            "Expected a story URL. Example: https://www.wattpad.com/story/12345-title Invalid: {}: {}",
            input, reason
        )),
        ScraperError::UnrecognizedHost { .. } => CliRunError::InvalidInput(e.to_string()),
        _ => CliRunError::Scraper(e),
    })?;

    let config = config::load_config()
        .map_err(CliRunError::InvalidInput)?
        .unwrap_or_default();
    let settings = RunSettings::merge(args, &config)?;

    let mut builder = HttpClient::builder().timeout_secs(settings.timeout_secs);
    if let Some(ua) = &settings.user_agent {
        builder = builder.user_agent(ua.clone());
    }
    let http = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    let path = convert(site, &args.url, args.output.as_deref(), &http, &settings).await?;
    if settings.show_progress {
        eprintln!("Wrote {}", path.display());
    }
    Ok(path)
}

/// Open the story, assemble it and write the EPUB. Nothing is written unless every chapter succeeded.
pub async fn convert(
    site: Site,
    url: &str,
    output_name: Option<&str>,
    http: &dyn Fetcher,
    settings: &RunSettings,
) -> Result<PathBuf, CliRunError> {
    let extractor = open_extractor(site, url, http)
        .await
        .map_err(|e| match e {
            ScraperError::SourceUnrecognized { .. } => CliRunError::InvalidInput(e.to_string()),
            other => CliRunError::Scraper(other),
        })?;

    let output_path = settings
        .output_dir
        .join(output_file_name(output_name.unwrap_or(extractor.id())));
    validate_output_path(&output_path)?;

    let bar: OnceLock<ProgressBar> = OnceLock::new();
    let on_progress = |done: usize, total: usize| {
        let pb = bar.get_or_init(|| {
            let pb = ProgressBar::new(total as u64);
            let style = ProgressStyle::default_bar()
                .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .progress_chars("█▉▊▋▌▍▎▏ ");
            pb.set_style(style);
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        });
        pb.set_position(done as u64);
        pb.set_message(format!("Fetched chapter {}/{}", done, total));
    };

    let progress: Option<Progress<'_>> = if settings.show_progress {
        Some(&on_progress)
    } else {
        None
    };
    let options = AssembleOptions {
        stylesheet: &settings.stylesheet,
        max_concurrent: settings.jobs,
        progress,
    };
    let assembled = assemble_book(extractor.as_ref(), http, &options).await;
    if let Some(pb) = bar.get() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }
    let document = assembled?;

    write_epub(&document, &output_path)?;
    Ok(output_path)
}
