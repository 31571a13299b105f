mod errors;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ledger::{LedgerStore, RocksDbLedger};
use oracle::{CoinGeckoOracle, EsploraFetcher};
use reconciler::{Config, RefreshOutcome, RefreshService, TracingSink};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use types::{Currency, RefreshError, UserAccount, UserId};

use crate::errors::CliError;

#[derive(Parser)]
#[command(name = "topup", about = "Crypto deposit detection and USD crediting")]
struct Cli {
    /// Path to the service configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Create a user record with per-currency deposit addresses
    RegisterUser {
        user_id: String,
        /// Deposit address as CURRENCY=ADDRESS, repeatable
        #[arg(long = "address", value_parser = parse_address)]
        addresses: Vec<(Currency, String)>,
    },
    /// Show a user's balances and available USD credit
    Profile { user_id: String },
    /// Show a user's deposit addresses
    Addresses { user_id: String },
    /// Detect new deposits on the user's addresses and credit the account
    Refresh { user_id: String },
}

fn parse_address(raw: &str) -> Result<(Currency, String), String> {
    let (ticker, address) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CURRENCY=ADDRESS, got: {raw}"))?;
    let currency = Currency::from_str(ticker)?;
    if address.is_empty() {
        return Err(format!("empty address for {currency}"));
    }
    Ok((currency, address.to_string()))
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(log_dir) = &config.log_file_path {
        if !log_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(log_dir) {
                eprintln!("Failed to create log directory {}: {e}", log_dir.display());
            }
        }
        let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "topup.log");
        let file_layer = fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true);
        registry.with(file_layer).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn print_profile(
    config: &Config,
    ledger: &dyn LedgerStore,
    user_id: &UserId,
) -> Result<(), RefreshError> {
    let account = ledger
        .get_user(user_id)?
        .ok_or_else(|| RefreshError::UnknownUser(user_id.clone()))?;

    println!("User {user_id}");
    for &currency in &config.supported_currencies {
        println!("{currency} balance: {}", account.balances.amount(currency));
    }
    println!("Balance in USD: {}$", account.available_usd());
    Ok(())
}

fn print_addresses(
    config: &Config,
    ledger: &dyn LedgerStore,
    user_id: &UserId,
) -> Result<(), RefreshError> {
    let addresses = ledger.get_addresses(user_id)?;

    println!("Deposit addresses for {user_id}");
    for &currency in &config.supported_currencies {
        match addresses.get(&currency) {
            Some(address) => println!("{currency}: {address}"),
            None => println!("{currency}: (none)"),
        }
    }
    Ok(())
}

async fn run_refresh(config: &Config, ledger: Arc<RocksDbLedger>, user_id: &UserId) {
    let service = RefreshService::new(
        config,
        ledger as Arc<dyn LedgerStore>,
        Box::new(CoinGeckoOracle::new(config.price_api_url.clone())),
        Box::new(EsploraFetcher::new(config.chain_endpoints.clone())),
        Box::new(TracingSink),
    );

    // The refresh action always completes from the user's point of view;
    // failures are logged and reported as a no-op.
    match service.refresh(user_id).await {
        Ok(RefreshOutcome::Credited(event)) => {
            println!("Deposit detected: credited {}$ (gross {}$)", event.net_usd, event.gross_usd);
        }
        Ok(RefreshOutcome::NoDeposit) => println!("No new deposits"),
        Err(RefreshError::TooSoon(secs)) => println!("Balance refreshed recently, retry in {secs}s"),
        Err(RefreshError::AlreadyInFlight) => println!("A refresh is already running"),
        Err(e) => {
            tracing::warn!(user_id = %user_id, "refresh failed: {e}");
            println!("Refresh did not complete, try again later");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if matches!(cli.command, Commands::Init) {
        let config = Config::default();
        config.save(&config_path)?;
        println!("Wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    let config = Config::load(&config_path)?;
    init_logging(&config);

    let ledger = Arc::new(RocksDbLedger::open(&config.database_directory)?);

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::RegisterUser { user_id, addresses } => {
            let user_id = UserId::new(user_id);
            if ledger.get_user(&user_id)?.is_some() {
                println!("User {user_id} already exists");
                return Ok(());
            }
            let addresses: BTreeMap<Currency, String> = addresses.into_iter().collect();
            ledger.insert_user(&UserAccount::new(user_id.clone(), addresses))?;
            println!("Registered user {user_id}");
        }
        Commands::Profile { user_id } => {
            print_profile(&config, &*ledger, &UserId::new(user_id))?;
        }
        Commands::Addresses { user_id } => {
            print_addresses(&config, &*ledger, &UserId::new(user_id))?;
        }
        Commands::Refresh { user_id } => {
            run_refresh(&config, ledger, &UserId::new(user_id)).await;
        }
    }

    Ok(())
}
