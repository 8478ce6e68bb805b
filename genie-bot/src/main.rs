//! genie-bot - Quota-aware posting agent for X

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use libgenie::logging::{LogFormat, LoggingConfig};
use libgenie::{Config, GenieBot, RateLimiter, Result};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Task {
    /// Generate and publish an original post
    Post,
    /// Reply to new mentions
    Mentions,
    /// Reply to a post found by keyword search
    Keyword,
    /// Print quota usage and exit
    Usage,
    /// Lift an active rate limit lockout
    ClearLockout,
    /// Post, keyword reply, then mentions
    All,
}

#[derive(Parser, Debug)]
#[command(name = "genie-bot")]
#[command(version)]
#[command(about = "Quota-aware posting agent for X")]
#[command(long_about = "\
genie-bot - Quota-aware posting agent for X

DESCRIPTION:
    genie-bot generates posts and replies with an AI provider and publishes
    them to X while staying inside the account's posting quotas. Every
    successful publish is recorded in a usage ledger; a 429 from X pauses
    all publishing for the configured lockout window.

USAGE:
    genie-bot --task post
    genie-bot --task usage
    genie-bot --task clear-lockout

CONFIGURATION:
    Configuration file: ~/.config/genie/config.toml (or GENIE_CONFIG)
    Usage ledger:       ~/.local/share/genie/usage.json

    Secrets may come from GENIE_X_ACCESS_TOKEN, GENIE_AI_API_KEY and
    GENIE_AI_FALLBACK_API_KEY instead of the file.

EXIT CODES:
    0 - Success (including runs skipped by the quota)
    1 - Configuration or runtime error
    2 - Authentication error
    3 - Invalid input
")]
struct Cli {
    /// Task to run
    #[arg(short, long, value_enum, default_value_t = Task::All)]
    task: Task,

    /// Configuration file (overrides GENIE_CONFIG)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format (text, json, pretty)
    #[arg(long, value_name = "FORMAT", env = "GENIE_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Log level when RUST_LOG is unset
    #[arg(long, value_name = "LEVEL", env = "GENIE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::new(cli.log_format, cli.log_level.clone(), cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_with(cli.config.as_deref())?;

    match cli.task {
        Task::Usage => {
            let mut limiter = open_limiter(&config)?;
            let decision = limiter.can_post(config.limits.warn_threshold);
            print!("{}", limiter.usage_report());
            println!("{}", decision.message);
        }
        Task::ClearLockout => {
            let mut limiter = open_limiter(&config)?;
            limiter.clear_lockout();
            println!("Rate limit lockout cleared. Publishing is allowed again.");
        }
        task => {
            let mut bot = GenieBot::from_config(&config)?;
            info!("Running task: {:?}", task);

            match task {
                Task::Post => {
                    bot.run_post_task().await;
                }
                Task::Keyword => {
                    bot.run_keyword_task().await;
                }
                Task::Mentions => {
                    if bot.connect().await {
                        let replied = bot.run_mentions_task().await;
                        info!("Replied to {} mention(s)", replied);
                    }
                }
                _ => bot.run_all().await,
            }
        }
    }

    Ok(())
}

fn open_limiter(config: &Config) -> Result<RateLimiter> {
    Ok(RateLimiter::open(config.ledger_path()?, config.quota_limits()))
}
