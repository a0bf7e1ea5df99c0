use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rdx_core::FilterPolicy;
use rdx_fixtures::{generate_missing, FixtureConfig};
use rdx_pipeline::{report_digest_markdown, PipelineConfig, RediscoveryPipeline};
use rdx_web::{export_filtered_csv, load_match_view, MatchFilter};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rdx-cli")]
#[command(about = "Candidate rediscovery command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Match not-hired candidates against hired peers and save the match table.
    Run(RunArgs),
    /// Write seeded synthetic input tables that are missing from the data directory.
    Generate(GenerateArgs),
    /// Export a filtered copy of the match table.
    Export(ExportArgs),
    Serve,
    /// Print a markdown digest of recent runs.
    Report {
        #[arg(long, default_value_t = 5)]
        runs: usize,
    },
}

#[derive(Debug, Args, Default)]
struct RunArgs {
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// `score` or `sentiment`.
    #[arg(long)]
    policy: Option<FilterPolicy>,
    #[arg(long)]
    highlights: bool,
    /// `hash` or `fastembed`.
    #[arg(long)]
    embedder: Option<String>,
    #[arg(long)]
    generate_missing: bool,
    /// Fail when feedback references no application.
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 60)]
    applicants: usize,
    #[arg(long, default_value_t = 8)]
    requisitions: usize,
}

#[derive(Debug, Args)]
struct ExportArgs {
    /// Match table to read; defaults to the configured output.
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long = "family", value_delimiter = ',')]
    families: Vec<String>,
    #[arg(long = "location", value_delimiter = ',')]
    locations: Vec<String>,
    #[arg(long)]
    min_score: Option<f64>,
    #[arg(long)]
    max_score: Option<f64>,
    #[arg(long)]
    out: PathBuf,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn apply_run_args(mut config: PipelineConfig, args: RunArgs) -> PipelineConfig {
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(policy) = args.policy {
        config.policy = policy;
    }
    if let Some(embedder) = args.embedder {
        config.embedder = embedder;
    }
    config.highlights |= args.highlights;
    config.strict_references |= args.strict;
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = PipelineConfig::from_env()?;

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            let generate = args.generate_missing;
            let config = apply_run_args(config, args);
            if generate {
                let report = generate_missing(&config.data_dir, &FixtureConfig::default()).await?;
                info!(written = report.written.len(), kept = report.kept.len(), "filled in missing input tables");
            }
            info!(
                data_dir = %config.data_dir.display(),
                policy = %config.policy,
                embedder = %config.embedder,
                highlights = config.highlights,
                "starting rediscovery run"
            );
            let summary = RediscoveryPipeline::from_config(config)?.run_once().await?;
            info!(
                run_id = %summary.run_id,
                matches = summary.counts.matches,
                evaluated = summary.counts.evaluated,
                embedding_failures = summary.counts.embedding_failures,
                "rediscovery run finished"
            );
            if summary.counts.matches == 0 {
                warn!(output = %summary.output_path, "no rediscovery matches");
                println!(
                    "no rediscovery matches found; wrote header-only {}",
                    summary.output_path
                );
            } else {
                println!(
                    "{} rediscovery matches saved to {}",
                    summary.counts.matches, summary.output_path
                );
            }
        }
        Commands::Generate(args) => {
            let data_dir = args.data_dir.unwrap_or(config.data_dir);
            let fixtures = FixtureConfig {
                seed: args.seed,
                applicants: args.applicants,
                requisitions: args.requisitions,
            };
            let report = generate_missing(&data_dir, &fixtures).await?;
            info!(
                seed = fixtures.seed,
                written = report.written.len(),
                kept = report.kept.len(),
                "fixture generation finished"
            );
            println!(
                "wrote {} fixture file(s) to {} (kept {} existing)",
                report.written.len(),
                data_dir.display(),
                report.kept.len()
            );
        }
        Commands::Export(args) => {
            let input = args.input.unwrap_or_else(|| config.output_path());
            let data_dir = args.data_dir.unwrap_or(config.data_dir);
            let filter = MatchFilter {
                families: args.families,
                locations: args.locations,
                min_score: args.min_score,
                max_score: args.max_score,
            };
            let table = load_match_view(&input, &data_dir)?;
            let rows = filter.apply(&table.rows).len();
            let bytes = export_filtered_csv(&table, &filter)?;
            if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            tokio::fs::write(&args.out, bytes)
                .await
                .with_context(|| format!("writing {}", args.out.display()))?;
            info!(rows, input = %input.display(), out = %args.out.display(), "exported filtered matches");
            println!("exported {rows} row(s) to {}", args.out.display());
        }
        Commands::Serve => {
            info!("starting dashboard");
            rdx_web::serve_from_env().await?;
        }
        Commands::Report { runs } => {
            println!("{}", report_digest_markdown(runs, Some(config.workspace_root))?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn linked_crates_report_their_package_names() {
        assert_eq!(rdx_fixtures::CRATE_NAME, "rdx-fixtures");
        assert_eq!(rdx_web::CRATE_NAME, "rdx-web");
    }

    #[test]
    fn run_flags_override_config() {
        let cli = Cli::try_parse_from([
            "rdx-cli", "run", "--policy", "sentiment", "--highlights", "--strict", "--data-dir", "/tmp/in",
        ])
        .unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        let config = apply_run_args(PipelineConfig::default(), args);
        assert_eq!(config.policy, FilterPolicy::SentimentThreshold);
        assert!(config.highlights);
        assert!(config.strict_references);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/in"));
    }

    #[test]
    fn export_accepts_repeated_filters() {
        let cli = Cli::try_parse_from([
            "rdx-cli", "export", "--family", "Engineering", "--family", "Design", "--location", "Austin,Remote", "--min-score", "0.75", "--out", "x.csv",
        ])
        .unwrap();
        let Some(Commands::Export(args)) = cli.command else {
            panic!("expected export command");
        };
        assert_eq!(args.families, vec!["Engineering", "Design"]);
        assert_eq!(args.locations, vec!["Austin", "Remote"]);
        assert_eq!(args.min_score, Some(0.75));
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(Cli::try_parse_from(["rdx-cli", "run", "--policy", "vibes"]).is_err());
    }
}
