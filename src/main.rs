mod db;
mod error;
mod export;
mod fetch;
mod parser;
mod pipeline;
mod reconcile;
mod report;
mod schedule;
mod settings;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(name = "gold_price_scraper", about = "Daily gold price scraper with deduplicated CSV export")]
struct Cli {
    /// Config file (default: ./gold_price.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// SQLite history path (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Export CSV path (overrides config)
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, extract, persist and export once
    Run,
    /// Rewrite the export file from stored history
    Export,
    /// Most recently scraped export rows
    List {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show history statistics
    Stats,
    /// Run daily at a fixed time, with interactive commands on stdin
    Watch {
        /// Time of day, HH:MM (default from config)
        #[arg(long, value_parser = settings::parse_time_of_day)]
        at: Option<NaiveTime>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = settings::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    if let Some(out) = cli.out {
        settings.export_path = out;
    }

    tracing::debug!(?settings, "Loaded configuration");

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;

    let result = match cli.command {
        Commands::Run => {
            let client = fetch::build_client(&settings)?;
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
            pb.set_message(format!("Scraping {}", settings.url));
            pb.enable_steady_tick(Duration::from_millis(120));

            let cycle = pipeline::run_cycle(&client, &conn, &settings).await;
            pb.finish_and_clear();
            report::print_cycle(&cycle);
            if cycle.is_ok() {
                println!("Export: {}", settings.export_path.display());
            }
            Ok(())
        }
        Commands::Export => {
            match pipeline::re_export(&conn, &settings.export_path) {
                Ok(0) => println!("No history to export. Run 'run' first."),
                Ok(n) => println!("Exported {} rows to {}", n, settings.export_path.display()),
                Err(e) => println!("Export failed: {}", e),
            }
            Ok(())
        }
        Commands::List { limit } => {
            let rows = pipeline::recent_rows(&conn, limit)?;
            report::print_rows(&rows);
            Ok(())
        }
        Commands::Stats => {
            let s = db::get_stats(&conn)?;
            report::print_stats(&s);
            Ok(())
        }
        Commands::Watch { at } => {
            let client = fetch::build_client(&settings)?;
            let scheduler = schedule::Scheduler::new(at.unwrap_or(settings.daily_at));
            println!(
                "Watching {} daily at {}",
                settings.url,
                scheduler.daily_at().format("%H:%M")
            );
            schedule::watch(&client, &conn, &settings, scheduler).await
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", report::format_duration(elapsed));
    }

    result
}
