use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use mobileview_core::config::{DEFAULT_CONFIG_PATH, WikiConfig, load_config};
use mobileview_core::{MediaWikiClient, MediaWikiClientConfig, PageService};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "mobileview",
    version,
    about = "Fetch wiki pages as lead plus top-level sections"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Print the normalized page model for one or more titles")]
    Page(PageArgs),
    #[command(about = "Print language links and variants for a title")]
    Languages(LanguagesArgs),
    #[command(about = "Print the resolved configuration")]
    Config,
}

#[derive(Debug, Args)]
struct PageArgs {
    #[arg(required = true)]
    titles: Vec<String>,
}

#[derive(Debug, Args)]
struct LanguagesArgs {
    title: String,
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    config_path: String,
    api_url: Option<String>,
    wiki_url: Option<String>,
    script_path: String,
    user_agent: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&config_path)?;

    match cli.command {
        Commands::Page(PageArgs { titles }) => run_page(&config, &titles),
        Commands::Languages(LanguagesArgs { title }) => run_languages(&config, &title),
        Commands::Config => run_config(&config, &config_path),
    }
}

fn build_service(config: &WikiConfig) -> Result<PageService<MediaWikiClient>> {
    let client = MediaWikiClient::new(MediaWikiClientConfig::from_config(config))?;
    Ok(PageService::new(client, config.script_path()))
}

fn run_page(config: &WikiConfig, titles: &[String]) -> Result<()> {
    let service = build_service(config)?;
    for title in titles {
        let page = service.fetch_page(title)?;
        println!("{}", serde_json::to_string_pretty(&*page)?);
    }
    tracing::info!(
        requests = service.transport().request_count(),
        titles = titles.len(),
        "page fetch complete"
    );
    Ok(())
}

fn run_languages(config: &WikiConfig, title: &str) -> Result<()> {
    let service = build_service(config)?;
    let languages = service.fetch_languages(title)?;
    println!("{}", serde_json::to_string_pretty(&languages)?);
    Ok(())
}

fn run_config(config: &WikiConfig, config_path: &Path) -> Result<()> {
    let report = ConfigReport {
        config_path: normalize_path(config_path),
        api_url: config.api_url(),
        wiki_url: config.wiki_url(),
        script_path: config.script_path(),
        user_agent: config.user_agent(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
