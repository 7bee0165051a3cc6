use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use salescope_core::analysis::AnalysisResults;
use salescope_core::config::PipelineConfig;
use salescope_core::{outputs, pipeline};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sales reconciliation and KPI pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and write every artifact
    Run(RunArgs),
    /// Reconcile only: write the master dataset and the cleaning report
    Clean(RunArgs),
    /// Recompute KPIs in memory and write the analysis document only
    Analyze(RunArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the three raw source CSVs
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory for pipeline artifacts
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Abort on the first degenerate KPI instead of skipping it
    #[arg(long)]
    strict_kpis: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let config = load_config(&args)?;
            let (run, artifacts) =
                pipeline::run_pipeline(&config).context("pipeline run failed")?;
            print_summary(&run.results);
            info!(
                master = %artifacts.master_csv.display(),
                analysis = %artifacts.analysis_json.display(),
                report = %artifacts.cleaning_report_json.display(),
                "done"
            );
            Ok(())
        }
        Command::Clean(args) => {
            let config = load_config(&args)?;
            let reconciled = pipeline::reconcile(&config).context("reconciliation failed")?;
            let master = outputs::write_clean_csv(&reconciled.clean, &config.output_dir)?;
            let report =
                outputs::write_cleaning_report_json(&reconciled.report, &config.output_dir)?;
            info!(
                rows = reconciled.clean.height(),
                master = %master.display(),
                report = %report.display(),
                "clean dataset written"
            );
            Ok(())
        }
        Command::Analyze(args) => {
            let config = load_config(&args)?;
            let run = pipeline::execute(&config).context("analysis failed")?;
            let path = outputs::write_analysis_json(&run.results, &config.output_dir)?;
            print_summary(&run.results);
            info!(analysis = %path.display(), "analysis document written");
            Ok(())
        }
    }
}

fn load_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(dir) = &args.out_dir {
        config = config.with_output_dir(dir);
    }
    if args.strict_kpis {
        config.analysis.strict_kpis = true;
    }
    Ok(config)
}

fn print_summary(results: &AnalysisResults) {
    if let Some(summary) = &results.summary {
        println!(
            "Total revenue ${:.2} across {} orders (avg ${:.2})",
            summary.total_revenue, summary.total_orders, summary.avg_order_value
        );
    }

    if let Some(quarterly) = &results.quarterly {
        let mut table = Table::new();
        table.set_header(vec!["Quarter", "Revenue"]);
        for entry in &quarterly.quarterly_revenue {
            table.add_row(vec![
                format!("Q{}", entry.quarter),
                format!("{:.2}", entry.revenue),
            ]);
        }
        println!("{table}");
        println!("Q3 → Q4 growth: {:+.1}%", quarterly.q4_vs_q3_growth_pct);
    }

    if let Some(categories) = &results.categories {
        let mut table = Table::new();
        table.set_header(vec!["Top category", "Revenue", "Share %"]);
        for entry in &categories.top3_categories {
            table.add_row(vec![
                entry.category.clone(),
                format!("{:.2}", entry.total_revenue),
                format!("{:.1}", entry.revenue_share_pct),
            ]);
        }
        println!("{table}");
    }

    if let Some(channels) = &results.channels {
        let mut table = Table::new();
        table.set_header(vec!["Channel", "Revenue", "Share %"]);
        for entry in &channels.channel_revenue {
            table.add_row(vec![
                entry.channel.clone(),
                format!("{:.2}", entry.total_revenue),
                format!("{:.1}", entry.share_pct),
            ]);
        }
        println!("{table}");
    }

    if let Some(test) = &results.stats_tests {
        println!(
            "Q4 vs rest: t = {:.4}, p = {:.6}, d = {:.4} ({})",
            test.t_statistic,
            test.p_value,
            test.cohens_d,
            if test.significant {
                "significant at the configured alpha"
            } else {
                "not significant"
            }
        );
    }

    for skipped in &results.skipped_kpis {
        println!("KPI '{}' skipped: {}", skipped.kpi, skipped.reason);
    }
}
