use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sales_dashboard::data::SalesCache;
use sales_dashboard::models::DateRange;
use sales_dashboard::report::{self, LeaderboardSettings};
use sales_dashboard::ReportResult;

#[derive(Parser)]
#[command(name = "sales-dashboard")]
#[command(about = "Sales KPIs, breakdowns and leaderboards from a cleaned sales dataset", long_about = None)]
struct Cli {
    /// Cleaned sales CSV with sale_date, product_id, customer_id, quantity, revenue, profit_margin
    #[arg(
        long,
        global = true,
        env = "SALES_DATA_PATH",
        default_value = "./data/cleaned/cleaned_sales.csv"
    )]
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ViewArgs {
    /// First sale date to include (defaults to the earliest in the dataset)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last sale date to include (defaults to the latest in the dataset)
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Reference day for the leaderboards (defaults to today)
    #[arg(long)]
    as_of: Option<NaiveDate>,
    #[arg(long, default_value_t = 7)]
    trailing_days: i64,
    #[arg(long, default_value_t = 5)]
    limit: usize,
}

impl ViewArgs {
    fn settings(&self) -> LeaderboardSettings {
        LeaderboardSettings {
            trailing_days: self.trailing_days,
            limit: self.limit,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print KPIs and leaderboards
    Summary {
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, default_value = "sales_report.md")]
        out: PathBuf,
    },
    /// Export the report datasets as JSON
    Export {
        #[command(flatten)]
        view: ViewArgs,
        /// Destination file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "sales_dashboard=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cache = SalesCache::new(&cli.data);

    match cli.command {
        Commands::Summary { view } => {
            let report = run_report(&mut cache, &view)?;
            print_summary(&report, view.settings());
        }
        Commands::Report { view, out } => {
            let report = run_report(&mut cache, &view)?;
            let markdown = report::render_markdown(&report, view.settings());
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { view, out } => {
            let report = run_report(&mut cache, &view)?;
            let json = serde_json::to_string_pretty(&report)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    tracing::info!(path = %path.display(), "exported report");
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

fn run_report(cache: &mut SalesCache, view: &ViewArgs) -> anyhow::Result<ReportResult> {
    let records = cache.records()?;
    let as_of = view.as_of.unwrap_or_else(|| Local::now().date_naive());

    let range = DateRange::resolve(view.from, view.to, &records, as_of)?;
    tracing::debug!(path = %cache.path().display(), %range, "building report");

    Ok(report::build_report(
        &records,
        range,
        as_of,
        view.settings(),
    ))
}

fn print_summary(report: &ReportResult, settings: LeaderboardSettings) {
    println!(
        "Sales from {} ({} records, as of {}):",
        report.range, report.record_count, report.as_of
    );

    match &report.kpis {
        Some(kpis) => {
            println!("- total revenue {}", report::format_amount(kpis.total_revenue));
            println!("- total profit {}", report::format_amount(kpis.total_profit));
            println!("- average margin {:.2}", kpis.average_margin);
            println!("- top product ID {}", kpis.top_product_id);
        }
        None => println!("No sales found for this range."),
    }

    println!(
        "Top products over the last {} days:",
        settings.trailing_days
    );
    if report.top_recent_products.is_empty() {
        println!("- none");
    }
    for entry in &report.top_recent_products {
        println!("- product {} with {} units", entry.key, entry.total);
    }

    println!("Top customers this month:");
    if report.top_monthly_customers.is_empty() {
        println!("- none");
    }
    for entry in &report.top_monthly_customers {
        println!(
            "- customer {} with {}",
            entry.key,
            report::format_amount(entry.total)
        );
    }
}
