//! Quikturn command-line entry point
//!
//! Prints logo URLs and fetches single logos or whole batches to disk.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use quikturn_logos::client::{
    BrowserClient, ClientSettings, GetManyOptions, GetOptions, ServerClient,
};
use quikturn_logos::config::{load_config, Config};
use quikturn_logos::{LogoMetadata, LogoRequest, LogoResponse, TokenClass};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Quikturn: company logos by domain name
#[derive(Parser, Debug)]
#[command(name = "quikturn")]
#[command(version)]
#[command(about = "Fetch company logos from the Quikturn logo API", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// API token (qt_/pk_ publishable or sk_ secret)
    #[arg(long, env = "QUIKTURN_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the request URL for a domain without fetching it
    Url {
        domain: String,
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Fetch one logo and write it to a file
    Get {
        domain: String,
        /// Output file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Fetch many logos into a directory (requires a secret token)
    Batch {
        #[arg(required = true)]
        domains: Vec<String>,
        /// Directory the logos are written to
        #[arg(long, value_name = "DIR")]
        out_dir: PathBuf,
        /// Overrides the configured concurrency
        #[arg(long)]
        concurrency: Option<usize>,
        #[command(flatten)]
        request: RequestArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct RequestArgs {
    /// Output width in pixels
    #[arg(long)]
    size: Option<i64>,
    /// Render in greyscale
    #[arg(long)]
    greyscale: bool,
    /// light or dark
    #[arg(long)]
    theme: Option<String>,
    /// png, jpeg, webp or avif
    #[arg(long)]
    format: Option<String>,
    /// full or icon
    #[arg(long)]
    variant: Option<String>,
}

impl RequestArgs {
    fn to_request(&self) -> LogoRequest {
        LogoRequest {
            size: self.size,
            greyscale: self.greyscale,
            theme: self.theme.clone(),
            format: self.format.clone(),
            variant: self.variant.clone(),
            ..LogoRequest::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path).with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => Config::default(),
    };
    let settings = config.client_settings()?;

    let token = cli
        .token
        .as_deref()
        .context("No token given; pass --token or set QUIKTURN_TOKEN")?;

    match &cli.command {
        Command::Url { domain, request } => {
            let request = request.to_request();
            let url = match TokenClass::of(token.trim()) {
                Some(TokenClass::Publishable) => {
                    BrowserClient::with_settings(token, settings)?.url(domain, &request)?
                }
                _ => ServerClient::with_settings(token, settings)?.url(domain, &request)?,
            };
            println!("{}", url);
        }
        Command::Get {
            domain,
            output,
            request,
        } => {
            let options = GetOptions::new(request.to_request());
            let logo = fetch_one(token, settings, domain, &options).await?;
            std::fs::write(output, &logo.bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            if !cli.quiet {
                println!(
                    "Wrote {} ({} bytes, {})",
                    output.display(),
                    logo.bytes.len(),
                    logo.content_type
                );
                print_metadata(&logo.metadata);
            }
        }
        Command::Batch {
            domains,
            out_dir,
            concurrency,
            request,
        } => {
            let mut batch = config.batch_options();
            if let Some(concurrency) = concurrency {
                batch.concurrency = *concurrency;
            }
            let options = GetManyOptions {
                get: GetOptions::new(request.to_request()),
                batch,
            };
            let client = ServerClient::with_settings(token, settings)?;
            handle_batch(&client, domains.clone(), options, out_dir, cli.quiet).await?;
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("quikturn_logos=info,warn"),
            1 => EnvFilter::new("quikturn_logos=debug,info"),
            2 => EnvFilter::new("quikturn_logos=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Fetches one logo with whichever client the token class allows
async fn fetch_one(
    token: &str,
    settings: ClientSettings,
    domain: &str,
    options: &GetOptions,
) -> Result<LogoResponse> {
    if TokenClass::of(token.trim()) == Some(TokenClass::Publishable) {
        let client = BrowserClient::with_settings(token, settings)?;
        let logo = client.get(domain, options).await?;
        let resource = client
            .resolve(&logo.url)
            .context("Logo handle was released before it could be written")?;
        return Ok(LogoResponse {
            bytes: resource.bytes.to_vec(),
            content_type: logo.content_type,
            metadata: logo.metadata,
        });
    }

    let client = ServerClient::with_settings(token, settings)?;
    Ok(client.get(domain, options).await?)
}

/// Handles the batch subcommand: fetches every domain and writes each logo
async fn handle_batch(
    client: &ServerClient,
    domains: Vec<String>,
    mut options: GetManyOptions,
    out_dir: &Path,
    quiet: bool,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let cancel = CancellationToken::new();
    options.batch.cancel = Some(cancel.clone());
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, finishing results already collected");
                cancel.cancel();
            }
        }
    });

    let total = domains.len();
    let mut results = client.get_many(domains, options);
    let (mut succeeded, mut failed) = (0usize, 0usize);

    while let Some(item) = results.next().await {
        let result = item?;
        match &result.outcome {
            Ok(logo) => {
                let file_name = format!("{}.{}", result.domain, extension_for(&logo.content_type));
                let path = out_dir.join(file_name);
                std::fs::write(&path, &logo.bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                succeeded += 1;
                if !quiet {
                    println!("✓ {} -> {}", result.domain, path.display());
                }
            }
            Err(e) => {
                failed += 1;
                if !quiet {
                    println!("✗ {} [{}] {}", result.domain, e.code(), e);
                }
            }
        }
    }

    if !quiet {
        println!();
        println!("=== Batch Summary ===");
        println!("Requested: {}", total);
        println!("Succeeded: {}", succeeded);
        println!("Failed:    {}", failed);
        if succeeded + failed < total {
            println!("Skipped:   {}", total - succeeded - failed);
        }
    }

    if succeeded == 0 && failed > 0 {
        bail!("Every domain in the batch failed");
    }
    Ok(())
}

fn extension_for(content_type: &str) -> &'static str {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    match mime {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/svg+xml" => "svg",
        "image/gif" => "gif",
        _ => "img",
    }
}

fn print_metadata(metadata: &LogoMetadata) {
    println!("Cache:       {:?}", metadata.cache_status);
    println!(
        "Rate limit:  {}/{} remaining",
        metadata.rate_limit_remaining, metadata.rate_limit_limit
    );
    if let Some(reset) = metadata.rate_limit_reset_at() {
        println!("Resets at:   {}", reset.to_rfc3339());
    }
    println!(
        "Quota:       {}/{} remaining",
        metadata.quota_remaining, metadata.quota_limit
    );
    if let Some(attribution) = &metadata.attribution {
        println!(
            "Attribution: required={} status={}",
            attribution.required,
            attribution.status.as_deref().unwrap_or("-")
        );
    }
}
