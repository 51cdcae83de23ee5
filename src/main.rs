//! duty-finder - Import duty and country-of-origin estimates for Amazon products
//!
//! Runs the classification worker, or looks up a product page against it.

use anyhow::Result;
use clap::{Parser, Subcommand};
use duty_finder::amazon::regions::Region;
use duty_finder::commands::{LookupCommand, ResearchCommand, ServeCommand};
use duty_finder::config::{Config, OutputFormat};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "duty-finder",
    version,
    about = "Import duty and country-of-origin estimates for Amazon products",
    long_about = "Scrapes Amazon product pages, classifies them to HS codes, quotes UK duty from a local tariff table and estimates the country of origin."
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (table, json, html)
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the classification worker
    Serve {
        /// Listen address
        #[arg(short, long, env = "DUTY_BIND")]
        bind: Option<String>,

        /// Duty rate used when no tariff entry matches
        #[arg(long, env = "BASELINE_RATE")]
        baseline_rate: Option<f64>,
    },

    /// Estimate duty and origin for a product
    #[command(alias = "l")]
    Lookup {
        /// ASIN or product URL
        #[arg(required_unless_present = "html")]
        target: Option<String>,

        /// Parse a saved product page instead of fetching one
        #[arg(long, conflicts_with = "target")]
        html: Option<PathBuf>,

        /// URL the saved page was taken from
        #[arg(long, requires = "html")]
        url: Option<String>,

        /// Only estimate the country of origin
        #[arg(long)]
        origin_only: bool,

        /// Worker base URL
        #[arg(long, env = "DUTY_API_BASE")]
        api_base: Option<String>,

        /// Amazon region to fetch from
        #[arg(short, long, env = "DUTY_REGION")]
        region: Option<Region>,

        /// Proxy URL (e.g., socks5://host:port)
        #[arg(long, env = "DUTY_PROXY")]
        proxy: Option<String>,

        /// Delay before each page request in milliseconds
        #[arg(long)]
        delay: Option<u64>,
    },

    /// Research where a brand manufactures
    Research {
        /// Brand name
        brand: String,

        /// Product type, to focus the research
        #[arg(short, long)]
        product_type: Option<String>,
    },

    /// List supported regions
    Regions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; the worker reports requests at INFO
    let default_level = match cli.command {
        Commands::Serve { .. } => Level::INFO,
        _ => Level::WARN,
    };
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(default_level.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(format) = cli.format {
        config.format = format;
    }

    match cli.command {
        Commands::Serve { bind, baseline_rate } => {
            if let Some(bind) = bind {
                config.worker.bind = bind;
            }
            if let Some(rate) = baseline_rate {
                config.worker.baseline_rate = rate;
            }

            ServeCommand::new(config).execute().await?;
        }

        Commands::Lookup { target, html, url, origin_only, api_base, region, proxy, delay } => {
            if let Some(api_base) = api_base {
                config.client.api_base = api_base;
            }
            if let Some(region) = region {
                config.client.region = region;
            }
            if let Some(proxy) = proxy {
                config.client.proxy = Some(proxy);
            }
            if let Some(delay) = delay {
                config.client.delay_ms = delay;
            }

            let cmd = LookupCommand::new(config).origin_only(origin_only);
            let output = match (html, target) {
                (Some(path), _) => cmd.execute_file(&path, url.as_deref()).await?,
                (None, Some(target)) => cmd.execute(&target).await?,
                (None, None) => anyhow::bail!("Provide an ASIN, a product URL or --html <file>"),
            };

            println!("{}", output);
        }

        Commands::Research { brand, product_type } => {
            let cmd = ResearchCommand::new(config)?;
            let output = cmd.execute(&brand, product_type.as_deref()).await?;
            println!("{}", output);
        }

        Commands::Regions => {
            println!("Supported Amazon regions:\n");
            println!("{:<6} {:<20}", "Code", "Domain");
            println!("{:-<6} {:-<20}", "", "");

            for region in Region::all() {
                println!("{:<6} {:<20}", region.to_string(), region.domain());
            }
        }
    }

    Ok(())
}
