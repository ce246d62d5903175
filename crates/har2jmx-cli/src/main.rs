//! har2jmx CLI entrypoint
//! Parses command-line arguments and dispatches to the core converter.

// Internal imports (std, crate)
use std::path::PathBuf;

// External imports (alphabetized)
use anyhow::Context;
use clap::Parser;
use har2jmx_core::{
    config::{parse_number_or, parse_start_number},
    AnnotationSourceKind, Config,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "har2jmx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Convert a HAR capture into a JMeter script
    Convert(ConvertArgs),
}

#[derive(clap::Args, Debug, Default)]
pub struct ConvertArgs {
    /// Start from a YAML or TOML configuration file; flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Path or URL of the HAR capture
    ///
    /// Example: --har-in capture.har
    /// Example: --har-in https://example.com/capture.har
    #[arg(long)]
    har_in: Option<String>,
    /// JMeter script to write
    #[arg(long)]
    jmx_out: Option<String>,
    /// Recorded results file to write (testResults XML)
    #[arg(long)]
    record_out: Option<String>,
    /// Keep only URLs matching this regex
    #[arg(long)]
    filter_include: Option<String>,
    /// Drop URLs matching this regex; wins over --filter-include
    #[arg(long)]
    filter_exclude: Option<String>,
    /// Open a new transaction group after this many quiet milliseconds
    /// (single-page captures only, 0 disables)
    #[arg(long)]
    new_tc_after_request_ms: Option<String>,
    /// Add a pause between transaction groups
    #[arg(long)]
    add_pause: Option<bool>,
    /// Remove the Cookie header from samplers
    #[arg(long)]
    remove_cookie: Option<bool>,
    /// Remove If-Modified-Since, If-None-Match and If-Last-Modified headers
    #[arg(long)]
    remove_cache_request: Option<bool>,
    /// Number of the first transaction group
    #[arg(long)]
    page_start_number: Option<String>,
    /// Number of the first sampler
    #[arg(long)]
    sampler_start_number: Option<String>,
    /// Where transaction annotations come from
    #[arg(long, value_enum)]
    annotation_source: Option<AnnotationSourceKind>,
    /// Annotation file for --annotation-source external-csv
    #[arg(long)]
    annotation_file: Option<String>,
    /// Attach requests outside every annotation to the nearest one only
    /// within this many milliseconds (no limit when unset)
    #[arg(long)]
    annotation_tolerance_ms: Option<String>,
    /// Replay WebSocket connections with the WebSocket samplers plugin
    #[arg(long)]
    websocket: Option<bool>,
    /// Add a disabled recorder whose View Results Tree opens --record-out
    #[arg(long)]
    add_result_tree_record: Option<bool>,
}

impl ConvertArgs {
    /// Merge the flags over the configuration file, if any.
    async fn into_config(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .await
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => {
                let har_in = self
                    .har_in
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("--har-in is required without --config"))?;
                let jmx_out = self
                    .jmx_out
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("--jmx-out is required without --config"))?;
                Config::new(har_in, jmx_out)
            }
        };

        if let Some(har_in) = self.har_in {
            config.har_path = har_in;
        }
        if let Some(jmx_out) = self.jmx_out {
            config.jmx_out = jmx_out;
        }
        if self.record_out.is_some() {
            config.record_out = self.record_out;
        }
        if self.filter_include.is_some() {
            config.include_regex = self.filter_include;
        }
        if self.filter_exclude.is_some() {
            config.exclude_regex = self.filter_exclude;
        }
        if let Some(raw) = self.new_tc_after_request_ms {
            config.new_group_after_ms = parse_number_or("new_tc_after_request_ms", &raw, 0);
        }
        if let Some(add_pause) = self.add_pause {
            config.add_pause = add_pause;
        }
        if let Some(remove_cookie) = self.remove_cookie {
            config.remove_cookie = remove_cookie;
        }
        if let Some(remove_cache) = self.remove_cache_request {
            config.remove_cache_headers = remove_cache;
        }
        if let Some(raw) = self.page_start_number {
            config.page_start_number = parse_start_number("page_start_number", &raw);
        }
        if let Some(raw) = self.sampler_start_number {
            config.action_start_number = parse_start_number("sampler_start_number", &raw);
        }
        if let Some(source) = self.annotation_source {
            config.annotation_source = source;
        }
        if self.annotation_file.is_some() {
            config.annotation_path = self.annotation_file;
        }
        if let Some(raw) = self.annotation_tolerance_ms {
            config.annotation_tolerance_ms = match raw.trim().parse::<u64>() {
                Ok(tolerance) => Some(tolerance),
                Err(_) => {
                    tracing::warn!("Can't parse annotation_tolerance_ms value '{}', using no limit", raw);
                    None
                }
            };
        }
        if let Some(websocket) = self.websocket {
            config.websocket = websocket;
        }
        if let Some(add) = self.add_result_tree_record {
            config.add_result_tree_record = add;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Convert(args) => {
            let config = args.into_config().await?;
            tracing::info!(
                har = %config.har_path,
                jmx = %config.jmx_out,
                "Converting HAR capture"
            );

            let summary = har2jmx_core::generate(&config)
                .await
                .with_context(|| format!("Failed to convert {}", config.har_path))?;

            println!(
                "✅ Wrote {} ({} transaction group(s), {} HTTP sampler(s))",
                summary.jmx_path.display(),
                summary.groups,
                summary.samplers
            );
            if let Some(record_path) = summary.record_path {
                println!(
                    "✅ Wrote {} ({} recorded sample(s))",
                    record_path.display(),
                    summary.records
                );
            }
        }
    }

    Ok(())
}
