use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    account::{Account, AccountId},
    ledger::{PendingTransfer, Transfer, TransferId},
};

pub mod in_memory_store;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Timed out waiting for the lock on account `{0}`")]
    LockTimeout(AccountId),
    #[error("Timed out waiting for a free connection")]
    ConnectionLimit,
    #[error("Account `{0}` is not locked by this unit")]
    NotLocked(AccountId),
    #[error("Balance of account `{0}` would become negative")]
    NegativeBalance(AccountId),
    #[error("Account `{0}` already exists")]
    DuplicateAccount(AccountId),
    #[error("Account `{0}` does not exist")]
    UnknownAccount(AccountId),
    #[error("Account `{0}` still holds funds")]
    NonZeroBalance(AccountId),
    #[error("Store state is poisoned")]
    Poisoned,
    #[error("Store backend failed: {0}")]
    Backend(String),
}

/// Storage of accounts and the transfer ledger.
///
/// All writes made by a transfer happen inside an [`AtomicUnit`]. Reads done
/// directly on the store only observe committed state.
pub trait AccountStore: Send + Sync {
    type Unit<'a>: AtomicUnit
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Unit<'_>, StoreError>;

    fn account(&self, id: &AccountId) -> Result<Option<Account>, StoreError>;

    fn transfer(&self, id: TransferId) -> Result<Option<Transfer>, StoreError>;

    /// All transfers in creation order.
    fn transfers(&self) -> Result<Vec<Transfer>, StoreError>;
}

/// Group of reads and writes that commits or discards as a whole.
///
/// Dropping a unit without committing it discards it.
pub trait AtomicUnit {
    /// Reads an account and keeps it locked until the unit ends, so no other unit
    /// can commit a conflicting write to it in the meantime. `None` if the account
    /// doesn't exist.
    ///
    /// Callers that need several accounts must lock them in ascending id order.
    fn account_for_update(&mut self, id: &AccountId) -> Result<Option<Account>, StoreError>;

    fn update_balance(&mut self, id: &AccountId, balance: Decimal) -> Result<(), StoreError>;

    fn append_transfer(&mut self, transfer: PendingTransfer) -> Result<(), StoreError>;

    /// Makes every pending write visible at once and returns the appended
    /// transfers as they were recorded.
    fn commit(self) -> Result<Vec<Transfer>, StoreError>;

    fn discard(self);
}
