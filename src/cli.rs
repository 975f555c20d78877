//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use resource_harvester::ResourceType;

/// Extract linked documents and images from newsletter HTML.
///
/// Reads HTML from a file (or stdin), prints the discovered resources as a
/// JSON report and, with `--download`, fetches them concurrently.
#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(author, version, about)]
pub struct Args {
    /// HTML file to scan (reads stdin when omitted)
    pub input: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file to read instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base URL for resolving relative references
    #[arg(short = 'b', long)]
    pub base_url: Option<String>,

    /// Keep resources hosted on the base URL's host
    #[arg(long)]
    pub include_internal: bool,

    /// Skip CSS background-image references
    #[arg(long)]
    pub no_backgrounds: bool,

    /// Reject URLs longer than this many characters
    #[arg(long)]
    pub max_url_length: Option<usize>,

    /// Only keep these resource types (comma-separated: pdf,image,document,unknown)
    #[arg(short = 't', long, value_delimiter = ',', value_parser = parse_resource_type)]
    pub types: Vec<ResourceType>,

    /// Download the discovered resources
    #[arg(short = 'd', long)]
    pub download: bool,

    /// Write downloaded files into this directory
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Maximum retry attempts for transient failures (0-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Base retry delay in milliseconds, doubled per retry
    #[arg(long)]
    pub retry_delay: Option<u64>,

    /// Per-attempt timeout in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Per-file size limit in bytes
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// Fail the run when downloads add up to more than this many bytes
    #[arg(long)]
    pub max_total_size: Option<u64>,

    /// Maximum requests per second to the same host (0 to disable)
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u32).range(0..=1000))]
    pub rate_limit: Option<u32>,

    /// Record a SHA-256 digest for each download
    #[arg(long)]
    pub hash: bool,

    /// Skip saving payloads whose content matches an earlier download
    #[arg(long)]
    pub dedupe_by_hash: bool,

    /// Extra request header, as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,
}

fn parse_resource_type(value: &str) -> Result<ResourceType, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "pdf" => Ok(ResourceType::Pdf),
        "image" => Ok(ResourceType::Image),
        "document" => Ok(ResourceType::Document),
        "unknown" => Ok(ResourceType::Unknown),
        other => Err(format!(
            "unknown resource type '{other}' (expected pdf, image, document or unknown)"
        )),
    }
}

fn parse_header(value: &str) -> Result<(String, String), String> {
    let Some((name, header_value)) = value.split_once(':') else {
        return Err(format!("expected \"Name: value\", got '{value}'"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("header name is empty".to_string());
    }
    Ok((name.to_string(), header_value.trim().to_string()))
}
