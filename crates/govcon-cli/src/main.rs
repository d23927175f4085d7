use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use govcon_adapters::RfpSummarizer;
use govcon_app::{
    controller_from_config, open_saved_selections, render_dashboard, render_summary,
    summarizer_from_config, AppConfig, FetchOutcome,
};
use govcon_core::{FilterState, Tab};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "govcon")]
#[command(about = "Browse, rank and save government contracting opportunities")]
struct Cli {
    /// Backend base URL (overrides GOVCON_API_BASE_URL).
    #[arg(long, global = true)]
    api_base_url: Option<String>,
    /// Directory holding saved selections (overrides GOVCON_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Read opportunities from a backend-shaped JSON file instead of the API.
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch and list opportunities for a tab.
    List(ListArgs),
    /// Print dashboard counts for the full snapshot.
    Stats(FilterArgs),
    /// Save or unsave an opportunity id.
    Toggle { id: String },
    /// List saved ids.
    Saved {
        /// Fetch the feed and flag saved ids no longer present.
        #[arg(long)]
        check_feed: bool,
    },
    /// Summarize RFP text from a file (`-` for stdin), an opportunity from
    /// the feed, or both.
    Summarize {
        input: Option<String>,
        /// Id of a fetched opportunity whose record is sent along.
        #[arg(long)]
        opportunity: Option<String>,
    },
}

#[derive(Debug, Args, Default)]
struct FilterArgs {
    #[arg(long)]
    naics: Option<String>,
    #[arg(long)]
    set_aside: Option<String>,
    #[arg(long)]
    agency: Option<String>,
    #[arg(long)]
    value_range: Option<String>,
}

impl FilterArgs {
    fn into_filters(self) -> FilterState {
        FilterState {
            set_aside: self.set_aside.unwrap_or_default(),
            naics: self.naics.unwrap_or_default(),
            agency: self.agency.unwrap_or_default(),
            value_range: self.value_range.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Args, Default)]
struct ListArgs {
    #[arg(long, default_value_t = Tab::Matched)]
    tab: Tab,
    #[arg(long, default_value = "")]
    search: String,
    /// Show full details for one opportunity.
    #[arg(long)]
    expand: Option<String>,
    #[command(flatten)]
    filters: FilterArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(url) = cli.api_base_url {
        config.api_base_url = url;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    debug!(?config, "resolved configuration");

    match cli.command.unwrap_or_else(|| Commands::List(ListArgs::default())) {
        Commands::List(args) => list(&config, cli.fixture, args).await,
        Commands::Stats(filters) => stats(&config, cli.fixture, filters).await,
        Commands::Toggle { id } => {
            let mut saved = open_saved_selections(&config.data_dir);
            let now_saved = saved.toggle(&id);
            println!("{id}: {}", if now_saved { "saved" } else { "removed" });
            Ok(())
        }
        Commands::Saved { check_feed } => saved(&config, cli.fixture, check_feed).await,
        Commands::Summarize { input, opportunity } => {
            summarize(&config, cli.fixture, input.as_deref(), opportunity.as_deref()).await
        }
    }
}

async fn list(config: &AppConfig, fixture: Option<PathBuf>, args: ListArgs) -> Result<()> {
    let controller = controller_from_config(config, fixture)?;
    controller.set_tab(args.tab).await;
    controller.set_search(args.search).await;
    if controller.set_filters(args.filters.into_filters()).await.is_none() {
        controller.refresh().await;
    }
    if let Some(id) = &args.expand {
        controller.toggle_expanded(id).await;
    }

    let view = controller.view(Utc::now()).await;
    print!("{}", render_dashboard(&view));
    if view.error.is_some() {
        bail!("opportunity fetch failed");
    }
    Ok(())
}

async fn stats(config: &AppConfig, fixture: Option<PathBuf>, filters: FilterArgs) -> Result<()> {
    let controller = controller_from_config(config, fixture)?;
    let outcome = match controller.set_filters(filters.into_filters()).await {
        Some(outcome) => outcome,
        None => controller.refresh().await,
    };
    if outcome == FetchOutcome::Failed {
        let view = controller.view(Utc::now()).await;
        print!("{}", render_dashboard(&view));
        bail!("opportunity fetch failed");
    }
    let stats = controller.stats(Utc::now()).await;
    println!("total_opportunities: {}", stats.total_opportunities);
    println!("high_matches:        {}", stats.high_matches);
    println!("due_soon:            {}", stats.due_soon);
    println!("saved_count:         {}", stats.saved_count);
    Ok(())
}

async fn saved(config: &AppConfig, fixture: Option<PathBuf>, check_feed: bool) -> Result<()> {
    let controller = controller_from_config(config, fixture)?;
    let stale = if check_feed {
        if controller.refresh().await == FetchOutcome::Failed {
            bail!("opportunity fetch failed; cannot check saved ids against the feed");
        }
        controller.stale_saved_ids().await
    } else {
        Vec::new()
    };

    let ids = controller.saved_ids().await;
    if ids.is_empty() {
        println!("No saved opportunities.");
    }
    for id in ids {
        let note = if stale.contains(&id) { "  (not in current feed)" } else { "" };
        println!("{id}{note}");
    }
    Ok(())
}

async fn summarize(
    config: &AppConfig,
    fixture: Option<PathBuf>,
    input: Option<&str>,
    opportunity_id: Option<&str>,
) -> Result<()> {
    let text = match input {
        Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading RFP text from stdin")?;
            Some(buf)
        }
        Some(path) => Some(std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?),
        None => None,
    };

    let opportunity = match opportunity_id {
        Some(id) => {
            let controller = controller_from_config(config, fixture)?;
            if controller.refresh().await == FetchOutcome::Failed {
                bail!("opportunity fetch failed; cannot look up {id}");
            }
            match controller.opportunity(id).await {
                Some(opp) => Some(opp),
                None => bail!("opportunity {id} is not in the current feed"),
            }
        }
        None => None,
    };
    if text.is_none() && opportunity.is_none() {
        bail!("give an RFP text file, `-` for stdin, or --opportunity <id>");
    }

    let summarizer = summarizer_from_config(config)?;
    let summary = summarizer
        .analyze(text.as_deref(), opportunity.as_ref())
        .await
        .context("summarizing RFP")?;
    print!("{}", render_summary(summary.as_ref()));
    Ok(())
}
