//! CLI entry point (spec.md §6 "Configuration").
//!
//! `trust-stack run --brand <slug> --scenario <slug> [--config <path>]`
//! wires every module into a [`trust_stack::orchestrator::Services`] and
//! runs one analysis, printing the resulting report as JSON. Grounded in
//! `dropbox-dTOOL`'s binaries for the `clap` derive + `tracing-subscriber`
//! + `dotenvy::dotenv()` startup sequence.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trust_stack::aggregator::TrustSignalsConfig;
use trust_stack::browser::BrowserController;
use trust_stack::classifier::DomainClassifier;
use trust_stack::config::AppEnv;
use trust_stack::cost_tracker::{CostTracker, PricingFile};
use trust_stack::detector::Rubric;
use trust_stack::fetcher::PageFetcher;
use trust_stack::metadata::MetadataExtractor;
use trust_stack::orchestrator::{self, Services};
use trust_stack::rate_limiter::PerDomainRateLimiter;
use trust_stack::scoring_service::LlmScoringService;
use trust_stack::search::{BraveSearchProvider, SerperSearchProvider};
use trust_stack::store;

#[derive(Parser)]
#[command(name = "trust-stack", about = "Brand trust-stack analysis engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one analysis for a brand/scenario pair.
    Run {
        #[arg(long)]
        brand: String,
        #[arg(long)]
        scenario: String,
        /// Path to a JSON file with the run's `config` map (spec.md §6). Uses
        /// an empty config (all defaults) when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Delete runs older than `--days` (spec.md §4.13).
    Prune {
        #[arg(long, default_value_t = 90)]
        days: i64,
    },
}

fn load_json_config(path: Option<PathBuf>) -> anyhow::Result<serde_json::Value> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(serde_json::json!({})),
    }
}

fn load_trust_signals_config() -> anyhow::Result<TrustSignalsConfig> {
    let path = "config/trust_signals.yml";
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&raw)?)
}

fn load_rubric() -> Rubric {
    match std::fs::read_to_string("config/rubric.yml") {
        Ok(raw) => match serde_yaml::from_str::<Vec<String>>(&raw) {
            Ok(ids) => Rubric { enabled_attribute_ids: ids },
            Err(err) => {
                tracing::warn!(%err, "failed to parse config/rubric.yml, using default rubric");
                Rubric::all()
            }
        },
        Err(_) => Rubric::all(),
    }
}

fn load_cost_tracker() -> CostTracker {
    match std::fs::read_to_string("config/llm_pricing.yml") {
        Ok(raw) => match serde_yaml::from_str::<PricingFile>(&raw) {
            Ok(file) => CostTracker::from_pricing_file(file),
            Err(err) => {
                tracing::warn!(%err, "failed to parse config/llm_pricing.yml, using default pricing");
                CostTracker::new()
            }
        },
        Err(_) => CostTracker::new(),
    }
}

async fn build_services(env: &AppEnv) -> anyhow::Result<Services> {
    let pool = store::connect(&env.database_url).await?;
    store::init_db(&pool).await?;

    let http = reqwest::Client::builder().build()?;
    let robots_limiter = PerDomainRateLimiter::new(std::time::Duration::from_millis(200));
    let robots = Arc::new(trust_stack::robots::RobotsCache::new(http.clone(), robots_limiter));

    let browser = if env.use_browser {
        let controller = Arc::new(BrowserController::new(true));
        controller.start().await?;
        Some(controller)
    } else {
        None
    };

    let fetch_limiter = PerDomainRateLimiter::new(std::time::Duration::from_millis(500));
    let fetcher = Arc::new(PageFetcher::new(
        http.clone(),
        fetch_limiter,
        robots.clone(),
        browser,
        env.user_agent.clone(),
        env.fetch_debug_dir.clone().map(PathBuf::from),
    ));

    let classifier = Arc::new(DomainClassifier::new(Default::default()));
    let metadata = MetadataExtractor::new();

    let brave: Option<Arc<dyn trust_stack::search::SearchProvider>> = env.brave_api_key.clone().map(|key| {
        let limiter = PerDomainRateLimiter::new(env.brave_request_interval);
        Arc::new(BraveSearchProvider::new(
            http.clone(),
            limiter,
            key,
            env.brave_api_auth,
            env.brave_api_max_count,
            env.brave_api_timeout,
        )) as Arc<dyn trust_stack::search::SearchProvider>
    });

    let serper: Option<Arc<dyn trust_stack::search::SearchProvider>> = env.serper_api_key.clone().map(|key| {
        let limiter = PerDomainRateLimiter::new(env.serper_request_interval);
        Arc::new(SerperSearchProvider::new(http.clone(), limiter, key, env.serper_api_timeout)) as Arc<dyn trust_stack::search::SearchProvider>
    });

    let scoring = Arc::new(
        LlmScoringService::new(
            std::env::var("OPENAI_API_KEY").ok(),
            std::env::var("ANTHROPIC_API_KEY").ok(),
            std::env::var("GOOGLE_API_KEY").ok(),
            std::env::var("DEEPSEEK_API_KEY").ok(),
            load_cost_tracker(),
        )
        .with_model(std::env::var("TRUST_STACK_SCORING_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string())),
    );

    Ok(Services {
        pool,
        classifier,
        robots,
        fetcher,
        metadata,
        brave,
        serper,
        scoring,
        whois: None,
        trust_signals: load_trust_signals_config().unwrap_or(TrustSignalsConfig { dimensions: Default::default() }),
        rubric: load_rubric(),
        user_agent: env.user_agent.clone(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let env = AppEnv::from_env();

    match cli.command {
        Command::Run { brand, scenario, config } => {
            let services = build_services(&env).await?;
            let config_value = load_json_config(config)?;
            let report = orchestrator::run_analysis(&services, &brand, &scenario, config_value).await?;
            services.scoring.finalize_cost_tracking();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Prune { days } => {
            let pool = store::connect(&env.database_url).await?;
            store::init_db(&pool).await?;
            let deleted = store::prune_old_runs(&pool, days).await?;
            tracing::info!(deleted, days, "pruned old runs");
        }
    }

    Ok(())
}
