use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use ldp_dashboard::{aggregator, report, server, thumbnails};

#[derive(Parser)]
#[command(name = "ldp-dashboard")]
#[command(author = "LDP Team")]
#[command(version = "0.1.0")]
#[command(about = "Test results dashboard and PDF reporting service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dashboard web server
    Serve {
        /// Server port
        #[arg(long, default_value = "5000")]
        port: u16,

        /// Results directory to serve
        #[arg(short, long, default_value = "results")]
        results_dir: PathBuf,
    },

    /// Render a PDF report without starting the server
    Report {
        /// Results directory
        #[arg(short, long, default_value = "results")]
        results_dir: PathBuf,

        /// Output PDF path
        #[arg(short, long, default_value = "TestReport.pdf")]
        output: PathBuf,

        /// Export scope (latest, all, features, date_range)
        #[arg(long, default_value = "latest")]
        scope: String,

        /// Inclusive start timestamp for date_range scope
        #[arg(long)]
        start_date: Option<String>,

        /// Inclusive end timestamp for date_range scope
        #[arg(long)]
        end_date: Option<String>,

        /// Feature allow-list for the features scope (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        features: Option<Vec<String>>,

        /// Skip the evidence/screenshot section
        #[arg(long, default_value = "false")]
        no_screenshots: bool,
    },

    /// Remove thumbnail caches under the results directory
    CleanThumbnails {
        /// Results directory
        #[arg(short, long, default_value = "results")]
        results_dir: PathBuf,

        /// Only remove stale entries instead of everything
        #[arg(long, default_value = "false")]
        stale_only: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, results_dir } => {
            println!(
                "{} Starting dashboard for: {}",
                "▶".green().bold(),
                results_dir.display().to_string().cyan()
            );
            let config = server::ServerConfig { port, results_dir };
            let dashboard = server::DashboardServer::new(config);
            dashboard.start().await?;
        }

        Commands::Report {
            results_dir,
            output,
            scope,
            start_date,
            end_date,
            features,
            no_screenshots,
        } => {
            println!(
                "{} Rendering {} report from: {}",
                "📊".to_string().blue(),
                scope.cyan(),
                results_dir.display()
            );

            let options = aggregator::ExportOptions {
                scope,
                include_summary: true,
                include_screenshots: !no_screenshots,
                include_details: true,
                start_date,
                end_date,
                features: features.unwrap_or_default(),
            };
            let runs = aggregator::collect_runs(&results_dir);
            let runs = aggregator::filter_runs(runs, &options);
            if runs.is_empty() {
                println!("{} No runs matched the requested scope.", "⚠️".yellow());
            }

            let fonts = report::FontConfig::detect();
            let cache = thumbnails::ThumbnailCache::standard();
            let renderer = report::Renderer {
                results_root: &results_dir,
                fonts: &fonts,
                thumbnails: &cache,
            };
            let bytes = renderer.dashboard_report(&runs, &options).await?;
            std::fs::write(&output, &bytes)?;

            println!(
                "{} Report saved: {} ({} KB)",
                "✅".green().bold(),
                output.display().to_string().cyan(),
                bytes.len() / 1024
            );
        }

        Commands::CleanThumbnails {
            results_dir,
            stale_only,
        } => {
            if stale_only {
                let removed = thumbnails::cleanup_stale(&results_dir)?;
                println!(
                    "{} Removed {} stale thumbnail(s)",
                    "🧹".to_string().blue(),
                    removed
                );
            } else {
                let removed = thumbnails::clear_cache(&results_dir, false)?;
                println!(
                    "{} Removed {} thumbnail folder(s)",
                    "🧹".to_string().blue(),
                    removed
                );
            }
        }
    }

    Ok(())
}
