use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use atomic_ledger::{
    bin_utils::Service,
    config::{ServiceConfig, StoreConfig},
    executor::TransferError,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Applies a list of transfers to a set of accounts and prints the final balances.
#[derive(Parser)]
#[command(name = "atomic-ledger", version, about, long_about = None)]
struct Cli {
    /// CSV file with `id,owner,balance` rows
    accounts: PathBuf,
    /// CSV file with `from,to,amount` rows
    transfers: PathBuf,
    /// Write the ledger of committed transfers to this file
    #[arg(long)]
    ledger: Option<PathBuf>,
    /// Number of threads executing transfers
    #[arg(long, env = "LEDGER_WORKERS", default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    workers: u16,
    /// How many times a conflicted transfer is executed again
    #[arg(long, env = "LEDGER_CONFLICT_RETRIES", default_value_t = 0)]
    conflict_retries: u32,
    /// How long to wait for an account held by another transfer
    #[arg(long, env = "LEDGER_LOCK_TIMEOUT_MS", default_value_t = 5000)]
    lock_timeout_ms: u64,
    /// How many transfers may be in flight at the same time
    #[arg(long, env = "LEDGER_CONNECTION_LIMIT", default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
    connection_limit: u16,
}

impl Cli {
    fn config(&self) -> ServiceConfig {
        ServiceConfig {
            workers: usize::from(self.workers),
            conflict_retries: self.conflict_retries,
            store: StoreConfig {
                lock_timeout: Duration::from_millis(self.lock_timeout_ms),
                connection_limit: usize::from(self.connection_limit),
            },
        }
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open `{}`", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ledger_output = match &cli.ledger {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create `{}`", path.display()))?;
            Some(Box::new(BufWriter::new(file)) as Box<dyn std::io::Write>)
        }
        None => None,
    };

    let service = Service {
        accounts: open(&cli.accounts)?,
        transfers: open(&cli.transfers)?,
        output: &mut std::io::stdout(),
        ledger_output,
        config: cli.config(),
        error_printer: Box::new(|line: u64, err: &TransferError| {
            match err {
                TransferError::InvalidRequest(err) => {
                    eprintln!("Error at line {line}: {err}")
                }
                TransferError::ConflictRetryable | TransferError::StoreFailure => {
                    eprintln!("Transfer at line {line} failed: {err}")
                }
                TransferError::AccountNotFound { .. } | TransferError::InsufficientFunds => {
                    // these are not technical errors, so we don't need to print them
                }
            }
        }),
    };
    service.run()?;
    Ok(())
}
