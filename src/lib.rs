/// Account state and balance movements.
/// Balance is modified using events, which are created by handling debits and credits
pub mod account;

/// Transfer requests as they arrive, and validation that turns them into commands
/// executed by [`executor`].
pub mod command;

/// Append-only record of committed transfers.
pub mod ledger;

/// Account store interface, plus "in memory" implementation.
///
/// Every read and write done by a transfer goes through an atomic unit, which either
/// commits as a whole or disappears without a trace.
pub mod store;

/// Executes a single transfer against an [`store::AccountStore`].
pub mod executor;

pub mod config;

/// Ideally, this module should exists on its own crate, as a way to
/// bootstrap core logic. However, it is used by integration tests as well,
/// so it lives here.
pub mod bin_utils;
