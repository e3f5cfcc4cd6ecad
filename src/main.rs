use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use cdr_lookup::cache::{AnyCache, Catalog};
use cdr_lookup::config::CatalogConfig;
use cdr_lookup::core::{parse_date, ResultSet, Timestamp, NO_MATCH};
use clap::{Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cdr-lookup", version, about = "CDR rating lookup caches")]
struct Cli {
    /// 缓存目录配置（TOML）
    #[arg(short, long, default_value = "cdr-lookup.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every configured cache and print the report
    Check,
    /// Print one cache's contents as JSON lines
    Dump {
        #[arg(long)]
        cache: String,
    },
    /// Longest-prefix match
    Prefix {
        #[arg(long)]
        cache: String,
        #[arg(long)]
        group: String,
        number: String,
    },
    /// Origin/destination prefix pair match
    Dual {
        #[arg(long)]
        cache: String,
        #[arg(long)]
        group: String,
        origin: String,
        destination: String,
    },
    /// Numeric range match at a point in time
    Range {
        #[arg(long)]
        cache: String,
        #[arg(long)]
        group: String,
        value: i64,
        /// epoch seconds, "YYYY-MM-DD HH:MM:SS" or YYYYMMDDHHMMSS; defaults to now
        #[arg(long)]
        at: Option<String>,
    },
    /// Validity segment match (closed or open cache)
    Validity {
        #[arg(long)]
        cache: String,
        #[arg(long)]
        group: String,
        #[arg(long)]
        resource: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Tiered rate plan steps, optionally only those in effect at a time
    Rate {
        #[arg(long)]
        cache: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Load all caches, then reload them on SIGHUP until Ctrl-C
    Watch,
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn now() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as Timestamp)
        .unwrap_or(0)
}

fn resolve_time(at: Option<&str>) -> anyhow::Result<Timestamp> {
    match at {
        Some(v) => Ok(parse_date("at", v)?),
        None => Ok(now()),
    }
}

fn print_results(results: Option<&ResultSet>) {
    match results {
        Some(r) => println!("{}", r.join(";")),
        None => println!("{}", NO_MATCH),
    }
}

/// 只加载查询用到的那一个缓存
fn open_one(catalog: &Catalog, cache: &str) -> anyhow::Result<()> {
    catalog
        .reload(cache)
        .with_context(|| format!("loading cache '{}'", cache))?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = CatalogConfig::from_path(&cli.config)
        .with_context(|| format!("reading config {:?}", cli.config))?;
    let catalog = Catalog::from_config(&config);
    info!("cdr-lookup: {} caches configured", catalog.len());

    match cli.command {
        Command::Check => {
            catalog.load_all();
            let report = catalog.report();
            println!("{}", report);
            if report.failed() > 0 {
                anyhow::bail!("{} of {} caches failed to load", report.failed(), catalog.len());
            }
        }
        Command::Dump { cache } => {
            open_one(&catalog, &cache)?;
            for entry in catalog.dump(&cache)? {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
        Command::Prefix {
            cache,
            group,
            number,
        } => {
            open_one(&catalog, &cache)?;
            let index = catalog.prefix(&cache)?;
            print_results(index.match_prefix(&group, &number));
        }
        Command::Dual {
            cache,
            group,
            origin,
            destination,
        } => {
            open_one(&catalog, &cache)?;
            let index = catalog.dual_prefix(&cache)?;
            print_results(index.match_origin_destination(&group, &origin, &destination));
        }
        Command::Range {
            cache,
            group,
            value,
            at,
        } => {
            let at = resolve_time(at.as_deref())?;
            open_one(&catalog, &cache)?;
            let index = catalog.range(&cache)?;
            print_results(index.get_entry(&group, value, at));
        }
        Command::Validity {
            cache,
            group,
            resource,
            at,
        } => {
            let at = resolve_time(at.as_deref())?;
            open_one(&catalog, &cache)?;
            match catalog.get(&cache)? {
                AnyCache::ValidityOpen(_) => {
                    let index = catalog.validity_open(&cache)?;
                    print_results(index.get_validity_segment_match(&group, &resource, at));
                }
                _ => {
                    let index = catalog.validity(&cache)?;
                    print_results(index.get_validity_segment_match(&group, &resource, at));
                }
            }
        }
        Command::Rate { cache, model, at } => {
            open_one(&catalog, &cache)?;
            let plan = catalog.rate_plan(&cache)?;
            match at {
                Some(at) => {
                    let steps = plan.price_model_at(&model, parse_date("at", &at)?);
                    if steps.is_empty() {
                        println!("{}", NO_MATCH);
                    }
                    for step in steps {
                        println!("{}", serde_json::to_string(step)?);
                    }
                }
                None => {
                    let tiers = plan.price_model(&model);
                    if tiers.is_empty() {
                        println!("{}", NO_MATCH);
                    }
                    for tier in tiers {
                        println!("{}", serde_json::to_string(tier)?);
                    }
                }
            }
        }
        Command::Watch => watch(Arc::new(catalog)).await?,
    }

    Ok(())
}

async fn watch(catalog: Arc<Catalog>) -> anyhow::Result<()> {
    let c = catalog.clone();
    tokio::task::spawn_blocking(move || c.load_all()).await?;
    info!("cdr-lookup ready. Send SIGHUP to reload, Ctrl-C to exit");

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut hangup = signal(SignalKind::hangup())?;
        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    info!("SIGHUP received, reloading all caches");
                    let c = catalog.clone();
                    let report = tokio::task::spawn_blocking(move || {
                        c.load_all();
                        c.report()
                    })
                    .await?;
                    if report.failed() > 0 {
                        error!("{} caches kept their previous snapshot", report.failed());
                    }
                    info!("\n{}", report);
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    Ok(())
}
