use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use podcast_proxy::cache::HttpCache;
use podcast_proxy::config::Config;
use podcast_proxy::store::Store;

/// Get the config file path (~/.config/podcast-proxy/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("podcast-proxy")
        .join("config.toml"))
}

/// Get the data directory path (~/.cache/podcast-proxy/)
fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".cache").join("podcast-proxy"))
}

#[derive(Parser, Debug)]
#[command(
    name = "podcast-proxy",
    about = "Podcast RSS feeds for radio shows that only publish HTML listings"
)]
struct Args {
    /// Config file (default: ~/.config/podcast-proxy/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Cache and feed directory, overrides `data_dir` from the config file
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild one program's feed and print it as RSS
    Get {
        /// Strategy name, e.g. franceinter
        strategy: String,
        /// Program name as it appears in the listing URL
        program: String,
    },
    /// Rebuild every stored program
    List,
    /// Show the available strategies
    Strategies,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the RSS
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let registry = config.registry().context("Invalid strategy configuration")?;

    if let Command::Strategies = args.command {
        for name in registry.names() {
            if let Some(strategy) = registry.get(name) {
                println!("{}\t{}", name, strategy.base_url());
            }
        }
        return Ok(());
    }

    let data_dir = match args.data_dir.or_else(|| config.data_dir.clone()) {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .context("Failed to build HTTP client")?;
    let cache = HttpCache::new(data_dir.join("cache"), client)
        .with_ttl(config.cache_ttl())
        .with_head_for_headers(config.head_for_headers)
        .with_max_resource_bytes(config.max_resource_bytes);

    let store = Store::new(&data_dir, &registry, cache)
        .await
        .with_context(|| format!("Failed to open store at {}", data_dir.display()))?;

    match args.command {
        Command::Get { strategy, program } => {
            let program = store
                .get(&strategy, &program)
                .await
                .with_context(|| format!("Failed to build feed for {}/{}", strategy, program))?;
            let rss = program.rss().context("Failed to render RSS")?;
            println!("{}", rss);
        }
        Command::List => {
            let programs = store.list().await.context("Failed to list programs")?;
            if programs.is_empty() {
                eprintln!("No stored programs in {}", store.rss_dir().display());
            }
            for program in programs {
                println!(
                    "{}\t{}\t{} episodes\t{}",
                    program.strategy,
                    program.name,
                    program.feed.items.len(),
                    program.feed.title
                );
            }
        }
        Command::Strategies => {}
    }

    Ok(())
}
