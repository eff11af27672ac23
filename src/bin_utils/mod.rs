//! This module could be a separate crate on its own, to bootstrap [`crate::executor`] within
//! a binary, but for simplicity purposes it is included directly in the library.

use std::{
    io::{Read, Write},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use anyhow::{Context, Result};
use csv_parser::{CsvAccountParser, CsvTransferParser};
use csv_printer::print_records;

use crate::{
    command::TransferRequest,
    config::ServiceConfig,
    executor::{TransferError, TransferExecutor},
    ledger::Transfer,
    store::{AccountStore, in_memory_store::InMemoryAccountStore},
};

pub mod csv_parser;
pub mod csv_printer;

pub type ErrorPrinter<'w> = Box<dyn Fn(u64, &TransferError) + Send + Sync + 'w>;

/// Loads accounts, runs every transfer through the executor and prints the
/// resulting balances (and optionally the ledger).
pub struct Service<'w, A, T, W: 'w> {
    pub accounts: A,
    pub transfers: T,
    pub output: &'w mut W,
    pub ledger_output: Option<Box<dyn Write + 'w>>,
    pub config: ServiceConfig,
    pub error_printer: ErrorPrinter<'w>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServiceReport {
    pub committed: usize,
    pub failed: usize,
}

impl<'w, A, T, W> Service<'w, A, T, W>
where
    A: Read,
    T: Read,
    W: Write + 'w,
{
    pub fn run(self) -> Result<ServiceReport> {
        let store = Arc::new(InMemoryAccountStore::new(self.config.store.clone()));
        for (line, row) in CsvAccountParser::new(self.accounts) {
            let row = row.with_context(|| format!("Malformed account at line {line}"))?;
            store
                .open_account(row.id, row.owner, row.balance)
                .with_context(|| format!("Cannot open account at line {line}"))?;
        }

        let requests = CsvTransferParser::new(self.transfers)
            .map(|(line, row)| {
                row.map(|request| (line, request))
                    .with_context(|| format!("Malformed transfer at line {line}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let executor = TransferExecutor::new(Arc::clone(&store));
        let report = run_transfers(
            &executor,
            &requests,
            &self.config,
            &*self.error_printer,
        );
        tracing::info!(
            committed = report.committed,
            failed = report.failed,
            "all transfers processed"
        );

        print_records(self.output, store.accounts()?)?;
        if let Some(ledger_output) = self.ledger_output {
            print_records(ledger_output, store.transfers()?)?;
        }
        Ok(report)
    }
}

/// Workers pick requests in file order, so a single worker processes them sequentially.
fn run_transfers<S: AccountStore>(
    executor: &TransferExecutor<S>,
    requests: &[(u64, TransferRequest)],
    config: &ServiceConfig,
    error_printer: &(dyn Fn(u64, &TransferError) + Send + Sync),
) -> ServiceReport {
    let next = AtomicUsize::new(0);
    let committed = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..config.workers.max(1) {
            s.spawn(|| {
                while let Some((line, request)) = requests.get(next.fetch_add(1, Ordering::Relaxed))
                {
                    match execute_with_retries(executor, request, config.conflict_retries) {
                        Ok(_) => {
                            committed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            error_printer(*line, &err);
                        }
                    }
                }
            });
        }
    });

    ServiceReport {
        committed: committed.into_inner(),
        failed: failed.into_inner(),
    }
}

/// Executes the whole transfer again when it hit a conflict, at most `retries` times.
pub fn execute_with_retries<S: AccountStore>(
    executor: &TransferExecutor<S>,
    request: &TransferRequest,
    retries: u32,
) -> Result<Transfer, TransferError> {
    let mut attempt = 0;
    loop {
        match executor.execute(request) {
            Err(err) if err.is_retryable() && attempt < retries => {
                attempt += 1;
                tracing::debug!(attempt, "retrying conflicted transfer");
            }
            result => return result,
        }
    }
}
