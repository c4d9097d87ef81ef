use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use expocrawl_core::config::DEFAULT_CONFIG_FILE;
use expocrawl_core::{Config, OutputFormat, SqlSnippet};
use expocrawl_dbt::{ExposureStore, Manifest, ManifestStore};
use expocrawl_engine::{BuildOptions, CrawlOutcome, Crawler, DashboardOutcome};
use expocrawl_platform::{DashboardPlatform, TableauClient, TableauCredentials, TableauSettings};
use expocrawl_sql::{RelationRegistry, SqlModelMatcher};

/// expocrawl - dbt exposures from dashboard SQL
#[derive(Parser)]
#[command(name = "expocrawl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: expocrawl.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl Tableau workbooks and register exposures
    Tableau {
        /// Path to dbt manifest.json
        #[arg(long, value_name = "PATH")]
        manifest_path: PathBuf,

        /// dbt package the exposures belong to (default: the manifest's project)
        #[arg(long, value_name = "NAME")]
        dbt_package_name: Option<String>,

        /// Tableau project whose workbooks are skipped (repeatable)
        #[arg(long = "ignore-project", value_name = "NAME")]
        ignore_projects: Vec<String>,

        /// Write the updated manifest here instead of in place
        #[arg(short, long, value_name = "PATH", conflicts_with = "yml_path")]
        output: Option<PathBuf>,

        /// Write a dbt properties file here instead of updating the manifest
        #[arg(short, long, value_name = "PATH")]
        yml_path: Option<PathBuf>,

        /// Also write a JSON crawl report
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },

    /// Show which relations SQL files reference
    Models {
        /// Path to dbt manifest.json
        #[arg(long, value_name = "PATH")]
        manifest_path: PathBuf,

        /// SQL files to scan
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Flags of the `tableau` command that override the config file
#[derive(Debug, Default)]
struct Overrides {
    dbt_package_name: Option<String>,
    ignore_projects: Vec<String>,
    output: Option<PathBuf>,
    yml_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Credentials may live in a .env file; a missing file is fine
    dotenvy::dotenv().ok();

    let mut config = load_config(cli.config.as_deref(), cli.verbose)?;
    config.verbose |= cli.verbose;
    apply_env(&mut config, |key| std::env::var(key).ok());

    init_tracing(config.verbose);

    match cli.command {
        Commands::Tableau {
            manifest_path,
            dbt_package_name,
            ignore_projects,
            output,
            yml_path,
            report,
        } => {
            apply_overrides(
                &mut config,
                Overrides {
                    dbt_package_name,
                    ignore_projects,
                    output,
                    yml_path,
                },
            );
            config.validate()?;
            tableau_command(&config, &manifest_path, report.as_deref()).await
        }
        Commands::Models {
            manifest_path,
            files,
        } => models_command(&manifest_path, &files),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    if let Some(path) = path {
        return Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        return Config::from_file(default_path)
            .with_context(|| format!("Failed to load config {}", default_path.display()));
    }

    if verbose {
        eprintln!("{}", "No config file found, using defaults".yellow());
    }
    Ok(Config::default())
}

/// Server URL and site from the environment take precedence over the file
fn apply_env(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("TABLEAU_URL").filter(|v| !v.is_empty()) {
        config.tableau.server_url = Some(url);
    }
    if let Some(site) = lookup("TABLEAU_SITE") {
        config.tableau.site = Some(site);
    }
}

fn apply_overrides(config: &mut Config, overrides: Overrides) {
    if let Some(name) = overrides.dbt_package_name {
        config.dbt_package_name = Some(name);
    }

    config.ignored_projects.extend(overrides.ignore_projects);

    if let Some(yml_path) = overrides.yml_path {
        config.output.format = OutputFormat::Properties;
        config.output.destination = Some(yml_path);
    } else if let Some(output) = overrides.output {
        config.output.format = OutputFormat::Manifest;
        config.output.destination = Some(output);
    }
}

/// Tableau command - crawl workbooks and write exposures
async fn tableau_command(config: &Config, manifest_path: &Path, report_path: Option<&Path>) -> Result<()> {
    tracing::info!(path = %manifest_path.display(), "Loading manifest");
    let mut store = ManifestStore::open(manifest_path, config.output.clone())
        .with_context(|| format!("Failed to load manifest {}", manifest_path.display()))?;

    let package_name = config
        .dbt_package_name
        .clone()
        .or_else(|| store.manifest().project_name().map(str::to_string))
        .context("No dbt package name: pass --dbt-package-name or set dbt_package_name")?;

    let credentials = TableauCredentials::from_env()?;
    let settings = TableauSettings::from_config(&config.tableau, credentials)?;
    let client = TableauClient::sign_in(settings)
        .await
        .context("Failed to sign in to Tableau")?;

    let options = BuildOptions::from_config(config, package_name);
    let result = Crawler::new(&client, options).run(&mut store).await;

    if let Err(e) = client.sign_out().await {
        tracing::warn!(error = %e, "Failed to sign out of Tableau");
    }

    let (outcome, written) = result?;

    if let Some(path) = report_path {
        outcome
            .report()
            .save_to_file(path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        tracing::info!(path = %path.display(), "Wrote crawl report");
    }

    print_summary(&outcome, &written);
    Ok(())
}

/// Models command - scan SQL files against the manifest's relations
fn models_command(manifest_path: &Path, files: &[PathBuf]) -> Result<()> {
    let manifest = Manifest::from_file(manifest_path)
        .with_context(|| format!("Failed to load manifest {}", manifest_path.display()))?;

    let store = ManifestStore::from_manifest(manifest, manifest_path, Default::default());
    let registry = RelationRegistry::build(store.load_relations()?)?;
    let matcher = SqlModelMatcher::new(&registry);

    for file in files {
        let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

        println!("{}", file.display().to_string().bold());
        match matcher.scan(&SqlSnippet::from_bytes(bytes)) {
            Ok(matches) if matches.is_empty() => println!("  {}", "no relations found".dimmed()),
            Ok(matches) => {
                for relation in matches.values() {
                    println!(
                        "  {} {} {}",
                        "✓".green(),
                        relation.dbt_reference(),
                        format!("({})", relation.fqn()).dimmed()
                    );
                }
            }
            Err(e) => println!("  {} {}", "⚠".yellow(), e),
        }
    }

    Ok(())
}

fn print_summary(outcome: &CrawlOutcome, written: &Path) {
    let summary = &outcome.summary;

    println!();
    println!("{}", "Crawl Summary".bold());
    println!("  Relations:           {}", summary.relations);
    println!("  Custom SQL matches:  {}", summary.custom_sql_matches);
    println!("  Native SQL matches:  {}", summary.native_sql_matches);
    println!("  Matched dashboards:  {}", summary.matched_dashboards);
    println!();

    for dashboard in &outcome.dashboards {
        match dashboard {
            DashboardOutcome::Exposed {
                dashboard,
                exposure,
            } => println!(
                "  {} {} → {} ({} relations)",
                "✓".green(),
                dashboard.name,
                exposure.name,
                exposure.depends_on.nodes.len()
            ),
            DashboardOutcome::Excluded {
                dashboard, reason, ..
            } => println!("  {} {} ({})", "⏩".dimmed(), dashboard.name.dimmed(), reason),
            DashboardOutcome::Failed {
                dashboard, error, ..
            } => println!("  {} {}: {}", "✗".red(), dashboard.name, error),
        }
    }

    println!();
    if summary.failed > 0 {
        println!(
            "{} {} exposed, {} excluded, {} failed",
            "⚠".yellow(),
            summary.exposed,
            summary.excluded,
            summary.failed.to_string().red()
        );
    } else {
        println!(
            "{} {} exposed, {} excluded",
            "✓".green(),
            summary.exposed,
            summary.excluded
        );
    }
    println!("{} {}", "Written to:".green(), written.display());
}
