//! Akiba CLI - preview round-ups, charges and lockout behavior
//!
//! Developer and operator tooling over the same core the wallet uses.
//! Nothing here talks to a live payment gateway.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use akiba_auth::{AuthError, LocalCredentialVerifier, ManualClock, PinAuthorizer, SecurePin};
use akiba_core::{Allocation, AllocationEngine, Money, RoundUpCalculator, RoundUpRule};
use akiba_pay::AkibaConfig;

/// Environment variable naming the config file
const CONFIG_ENV: &str = "AKIBA_CONFIG";

#[derive(Parser)]
#[command(name = "akiba")]
#[command(
    about = "Round-up, charge and PIN lockout tooling for the Akiba wallet",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Config file (falls back to $AKIBA_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a round-up rule against an amount
    RoundUp {
        /// Payment amount, e.g. 123.45
        #[arg(short, long, value_parser = parse_money)]
        amount: Money,

        /// Round up to the nearest multiple of this amount
        #[arg(
            long,
            value_parser = parse_money,
            conflicts_with_all = ["percent_bps", "adaptive_min"]
        )]
        fixed: Option<Money>,

        /// Save this many basis points of the amount
        #[arg(long, conflicts_with = "adaptive_min")]
        percent_bps: Option<u32>,

        /// Smallest adaptive increment
        #[arg(long, value_parser = parse_money, requires = "adaptive_max")]
        adaptive_min: Option<Money>,

        /// Largest adaptive increment
        #[arg(long, value_parser = parse_money, requires = "adaptive_min")]
        adaptive_max: Option<Money>,

        /// Percentage of the round-up kept in the main wallet
        #[arg(long)]
        main_pct: Option<u8>,
    },

    /// Compose the total a user would be asked to authorize
    Charge {
        /// Base payment amount
        #[arg(short, long, value_parser = parse_money)]
        base: Money,

        /// Transaction fee
        #[arg(short, long, value_parser = parse_money, default_value = "0")]
        fee: Money,

        /// Amount the round-up is evaluated against (defaults to the base)
        #[arg(short, long, value_parser = parse_money)]
        amount: Option<Money>,
    },

    /// Print lock durations for each failure count
    LockoutTable {
        /// Highest failure count to show
        #[arg(long, default_value_t = 12)]
        up_to: u32,
    },

    /// Replay PIN attempts against a local verifier
    SimulateLockout {
        /// The correct PIN
        #[arg(long)]
        pin: String,

        /// Comma-separated PINs to try, in order
        #[arg(long, value_delimiter = ',', required = true)]
        attempts: Vec<String>,

        /// Let each lock expire before the next attempt
        #[arg(long)]
        wait_out: bool,
    },

    /// Write a default config file
    InitConfig {
        /// Where to write (defaults to the resolved config path)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "akiba=info,akiba_auth=info,akiba_pay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.clone());

    match cli.command {
        Commands::RoundUp {
            amount,
            fixed,
            percent_bps,
            adaptive_min,
            adaptive_max,
            main_pct,
        } => {
            let mut rule = match (fixed, percent_bps, adaptive_min, adaptive_max) {
                (Some(value), _, _, _) => RoundUpRule::fixed(value),
                (_, Some(bps), _, _) => RoundUpRule::percentage(bps),
                (_, _, Some(min), Some(max)) => RoundUpRule::auto_adaptive(min, max, 30),
                _ => load_config(&config_path)?.round_up,
            };
            if let Some(main) = main_pct {
                let savings = 100u8
                    .checked_sub(main)
                    .with_context(|| format!("main share {}% exceeds 100%", main))?;
                rule = rule.with_allocation(Allocation::new(main, savings)?);
            }
            rule.validate()?;
            round_up(&rule, amount, cli.json)
        }
        Commands::Charge { base, fee, amount } => {
            let config = load_config(&config_path)?;
            charge(&config.round_up, base, fee, amount.unwrap_or(base), cli.json)
        }
        Commands::LockoutTable { up_to } => {
            lockout_table(&load_config(&config_path)?, up_to);
            Ok(())
        }
        Commands::SimulateLockout {
            pin,
            attempts,
            wait_out,
        } => simulate_lockout(&load_config(&config_path)?, &pin, &attempts, wait_out).await,
        Commands::InitConfig { path, force } => init_config(path.unwrap_or(config_path), force),
    }
}

fn load_config(path: &Path) -> Result<AkibaConfig> {
    let config = AkibaConfig::load_or_default(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    debug!("Using config from {}", path.display());
    Ok(config)
}

/// `--config`, then `$AKIBA_CONFIG`, then the platform default
fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(AkibaConfig::default_path)
}

/// Parse a decimal amount like `123`, `123.4` or `123.45` into minor units
fn parse_money(s: &str) -> std::result::Result<Money, String> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (major, fraction) = digits.split_once('.').unwrap_or((digits, ""));

    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if major.is_empty() || !all_digits(major) || !all_digits(fraction) || fraction.len() > 2 {
        return Err(format!("invalid amount {:?}, expected e.g. 123.45", s));
    }

    let major: i64 = major.parse().map_err(|e| format!("invalid amount {:?}: {}", s, e))?;
    let fraction: i64 = format!("{:0<2}", fraction)
        .parse()
        .map_err(|e| format!("invalid amount {:?}: {}", s, e))?;
    let minor = major
        .checked_mul(Money::MINOR_PER_MAJOR)
        .and_then(|m| m.checked_add(fraction))
        .ok_or_else(|| format!("amount {:?} is too large", s))?;

    Ok(Money::from_minor(if negative { -minor } else { minor }))
}

fn round_up(rule: &RoundUpRule, amount: Money, json: bool) -> Result<()> {
    let engine = AllocationEngine::new(RoundUpCalculator::new());
    let breakdown = engine.build_charge(amount, Money::ZERO, rule, amount)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&breakdown.round_up)?);
        return Ok(());
    }

    let calc = &breakdown.round_up;
    println!("Round-up:");
    println!("  Rule: {}", calc.description);
    println!("  Amount: {}", calc.input_amount);
    if let Some(increment) = calc.increment_used {
        println!("  Increment: {}", increment);
    }
    println!("  Round-up: {}", calc.round_up_amount);
    println!("  To main wallet: {}", breakdown.split.main_share);
    println!("  To savings: {}", breakdown.split.savings_share);
    Ok(())
}

fn charge(rule: &RoundUpRule, base: Money, fee: Money, basis: Money, json: bool) -> Result<()> {
    let breakdown = AllocationEngine::default().build_charge(base, fee, rule, basis)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
        return Ok(());
    }

    println!("Charge:");
    println!("  Amount: {}", breakdown.base_amount);
    println!("  Fee: {}", breakdown.fee);
    println!("  Round-up: {} ({})", breakdown.round_up_amount(), breakdown.round_up.description);
    println!("  Total to authorize: {}", breakdown.total_to_authorize);
    Ok(())
}

fn lockout_table(config: &AkibaConfig, up_to: u32) {
    let policy = &config.auth.lockout;
    println!("Failures  Lock (s)  Status");
    for failures in 0..=up_to {
        println!(
            "{:>8}  {:>8}  {}",
            failures,
            policy.lockout_duration_for(failures),
            policy.describe(failures)
        );
    }
}

async fn simulate_lockout(
    config: &AkibaConfig,
    pin: &str,
    attempts: &[String],
    wait_out: bool,
) -> Result<()> {
    let correct = SecurePin::new(pin)?;
    let verifier = Arc::new(LocalCredentialVerifier::new(
        &correct,
        config.auth.local_token_ttl_secs,
    )?);
    let clock = ManualClock::starting_now();
    let authorizer = PinAuthorizer::with_clock(&config.auth, verifier, Arc::new(clock.clone()));
    info!("Simulating {} PIN attempts", attempts.len());

    for (i, attempt) in attempts.iter().enumerate() {
        let candidate = SecurePin::new(attempt.as_str())
            .with_context(|| format!("attempt #{} is not a valid PIN", i + 1))?;

        match authorizer.authorize_for_use(&candidate).await {
            Ok(token) => println!("#{}: accepted, token {}", i + 1, token.fingerprint()),
            Err(AuthError::PinLocked { unlock_at }) => {
                let remaining = authorizer.remaining_lock_seconds().await;
                println!("#{}: locked until {} ({}s)", i + 1, unlock_at, remaining);
                if wait_out {
                    clock.advance_secs(i64::try_from(remaining).unwrap_or(i64::MAX));
                }
            }
            Err(e) => println!("#{}: {}", i + 1, e),
        }
    }

    println!("Failed attempts on record: {}", authorizer.failed_attempts().await);
    Ok(())
}

fn init_config(path: PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }
    write_default_config(&path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn write_default_config(path: &Path) -> Result<()> {
    AkibaConfig::default()
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}
