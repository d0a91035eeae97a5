//! # chartsplice CLI
//!
//! Regenerates a chart from a Notion database, re-hosts it on Imgur, and
//! splices it into a Notion page in place of the previous chart.
//!
//! ## Usage
//!
//! ```bash
//! chartsplice [--config ./config/chartsplice.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chartsplice run` | Full refresh of the page |
//! | `chartsplice aggregate` | Print the aggregated data points |
//! | `chartsplice render` | Aggregate and render, print the chart URL |
//! | `chartsplice columns` | List the database's columns |
//! | `chartsplice blocks` | List the page's child blocks |
//! | `chartsplice replace <url>...` | Splice hosted images into the page |
//!
//! Logging is controlled with `RUST_LOG` (default `info`) and written to
//! stderr.

use chartsplice::{commands, config};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

const DEFAULT_CONFIG: &str = "./config/chartsplice.toml";

/// Render a chart from a Notion database and splice it into a Notion page.
///
/// Credentials come from the environment (`NOTION_API_KEY`,
/// `IMGUR_CLIENT_ID`); everything else can also be set in the optional
/// TOML file.
#[derive(Parser)]
#[command(name = "chartsplice", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/chartsplice.toml`, which is skipped when it
    /// does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the page: aggregate, render, re-host, and splice.
    Run {
        #[command(flatten)]
        chart: ChartArgs,
    },

    /// Aggregate the database and print the data points.
    Aggregate {
        #[command(flatten)]
        chart: ChartArgs,
    },

    /// Aggregate and render, printing the chart URL.
    Render {
        #[command(flatten)]
        chart: ChartArgs,
    },

    /// List the column names of the database.
    Columns,

    /// List the child blocks of the page.
    Blocks,

    /// Replace the page's images with already-hosted image URLs.
    Replace {
        /// Image URLs, placed into the page's image positions in order.
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

/// Chart overrides shared by the data commands.
#[derive(Args)]
struct ChartArgs {
    /// Chart.js chart type (`pie`, `bar`, `doughnut`, ...).
    #[arg(long)]
    chart_type: Option<String>,

    /// `percentage` or `raw`.
    #[arg(long)]
    plot_type: Option<String>,

    /// Select property to group rows by.
    #[arg(long)]
    group_by: Option<String>,

    /// Plot rows one-to-one, labeled by this title property.
    #[arg(long)]
    direct: Option<String>,
}

impl ChartArgs {
    fn apply(self, cfg: &mut config::Config) -> anyhow::Result<()> {
        if let Some(v) = self.chart_type {
            cfg.chart.chart_type = v;
        }
        if let Some(v) = self.plot_type {
            cfg.chart.plot_type = v;
        }
        if let Some(v) = self.group_by {
            cfg.chart.group_by = v;
        }
        if let Some(v) = self.direct {
            cfg.chart.label_field = Some(v);
        }
        config::validate(cfg)
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Validated once the command's own overrides are in place.
    let mut cfg = match &cli.config {
        Some(path) => config::read_config(path, true)?,
        None => config::read_config(&PathBuf::from(DEFAULT_CONFIG), false)?,
    };

    match cli.command {
        Commands::Run { chart } => {
            chart.apply(&mut cfg)?;
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, cancelling refresh");
                    on_signal.cancel();
                }
            });
            commands::run_refresh(&cfg, &cancel).await?;
        }
        Commands::Aggregate { chart } => {
            chart.apply(&mut cfg)?;
            commands::run_aggregate(&cfg).await?;
        }
        Commands::Render { chart } => {
            chart.apply(&mut cfg)?;
            commands::run_render(&cfg).await?;
        }
        Commands::Columns => {
            config::validate(&cfg)?;
            commands::run_columns(&cfg).await?;
        }
        Commands::Blocks => {
            config::validate(&cfg)?;
            commands::run_blocks(&cfg).await?;
        }
        Commands::Replace { urls } => {
            config::validate(&cfg)?;
            commands::run_replace(&cfg, urls).await?;
        }
    }

    Ok(())
}
