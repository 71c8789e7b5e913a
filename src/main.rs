use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use guide_core::{DateRange, RegionCode};
use std::path::PathBuf;
use std::sync::Arc;
use tally_guide::{Config, FixtureSource, GuideFixture, GuideSession};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tally-guide")]
#[command(version, author = "TigreRoll")]
#[command(about = "Release patterns and viewing guide for tracked streaming shows")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Fixture file with tracked shows, season and provider payloads
    #[arg(short, long, default_value = "demos/sample_fixture.json")]
    fixture: PathBuf,

    /// Config file (defaults to the standard search paths)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the release pattern of every show
    Classify,
    /// Predict the next season start of every show
    Predict {
        /// Reference date (yyyy-mm-dd), defaults to today
        #[arg(long)]
        now: Option<NaiveDate>,
    },
    /// Print a day-by-day guide
    Guide {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        /// Override the configured region
        #[arg(long)]
        region: Option<String>,
    },
    /// List validated shows from the fixture's listing payload
    Discover {
        /// Show at most this many
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Estimate subscription savings for this year
    Savings {
        /// Reference date (yyyy-mm-dd), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

fn init_logging(level: &str, verbose: bool) {
    let default_filter = if verbose {
        "tally_guide=debug,info".to_string()
    } else {
        format!("tally_guide={},warn", level)
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    init_logging(&config.output.log_level, cli.verbose);

    let fixture = GuideFixture::load(&cli.fixture).await?;
    if let Some(region) = &fixture.region {
        config.source.default_region = region.to_string();
    }
    for entry in &fixture.billing {
        config.billing.providers.push(*entry);
    }
    if let Err(e) = config.validate() {
        warn!("Invalid configuration, falling back to defaults: {}", e);
        config = Config::default();
    }
    info!("🚀 {}", config.summary().replace('\n', " "));

    let today = config.today();
    let source = Arc::new(FixtureSource::from_fixture(&fixture));
    let session = GuideSession::new(config, source, fixture.tracked_shows(), today)?;

    match cli.command {
        Commands::Classify => {
            for show in session.shows().await {
                match session.classify_show(show.show_id).await {
                    Ok(result) => println!(
                        "{:>8}  {:<28} {:<22} {:.2}  {}",
                        show.show_id,
                        show.title,
                        result.pattern.to_string(),
                        result.confidence,
                        result.diagnostics.reasoning
                    ),
                    Err(e) => warn!("❌ {}: {}", show.title, e),
                }
            }
        }

        Commands::Predict { now } => {
            let now = now.unwrap_or(today);
            for show in session.shows().await {
                match session.predict(show.show_id, now).await {
                    Ok(Some(date)) => println!("{:<28} next season ~{}", show.title, date),
                    Ok(None) => println!("{:<28} no prediction", show.title),
                    Err(e) => warn!("❌ {}: {}", show.title, e),
                }
            }
        }

        Commands::Guide { from, to, region } => {
            if let Some(region) = region {
                session.set_region(RegionCode::parse(&region)?).await;
            }
            let build = session
                .build_guide(DateRange::new(from, to))
                .await
                .ok_or_else(|| anyhow!("Guide build was superseded"))?;

            for failure in &build.failures {
                warn!("⚠️ Show {} missing from guide: {}", failure.show_id, failure.message);
            }
            for entry in build.index.entries().filter(|e| !e.is_empty()) {
                let episodes: Vec<String> = entry
                    .episodes
                    .iter()
                    .map(|e| format!("{} S{:02}E{:02}", e.show_title, e.season, e.episode))
                    .collect();
                let logos: Vec<&str> = entry.badges.logos.iter().map(|p| p.name.as_str()).collect();
                let resubscribe: Vec<&str> = entry.resubscribe.iter().map(|p| p.name.as_str()).collect();
                println!(
                    "{}  [{}{}]  {}{}",
                    entry.date,
                    logos.join(", "),
                    entry
                        .badges
                        .logo_overflow_label()
                        .map(|label| format!(" {}", label))
                        .unwrap_or_default(),
                    episodes.join("; "),
                    if resubscribe.is_empty() {
                        String::new()
                    } else {
                        format!("  renews: {}", resubscribe.join(", "))
                    }
                );
            }
            info!("📊 {} days, {} episodes", build.index.len(), build.index.episode_count());
        }

        Commands::Discover { limit } => {
            let (listings, report) = fixture.discover();
            for listing in listings.iter().take(limit) {
                let Some(show) = listing.to_tracked_show() else {
                    continue;
                };
                let premiere = listing
                    .first_air_date
                    .map(|date| date.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "{:>8}  {:<28} premiered {:<10}  popularity {:.1}",
                    show.show_id, show.title, premiere, listing.popularity
                );
            }
            info!(
                "🔎 {}/{} listings passed ({} duplicates)",
                report.final_count, report.initial_count, report.duplicates
            );
        }

        Commands::Savings { today: reference } => {
            let reference = reference.unwrap_or(today);
            let estimate = session.estimate_savings(&fixture.costs, reference).await;
            println!(
                "Estimated savings: {}",
                estimate.approx_label(&session.config().savings.currency_symbol)
            );
        }
    }

    Ok(())
}
