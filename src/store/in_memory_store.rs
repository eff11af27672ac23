use std::{
    collections::{HashMap, HashSet, hash_map::Entry},
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use chrono::Utc;
use rust_decimal::{Decimal, prelude::Zero};

use crate::{
    account::{Account, AccountId},
    config::StoreConfig,
    ledger::{Ledger, PendingTransfer, Transfer, TransferId},
};

use super::{AccountStore, AtomicUnit, StoreError};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    ledger: Ledger,
    locked_rows: HashSet<AccountId>,
    open_units: usize,
}

/// Keeps everything behind a single mutex. Row locks are plain ids in
/// `locked_rows`, waiters park on `released` until the id they need is free.
#[derive(Debug)]
pub struct InMemoryAccountStore {
    tables: Mutex<Tables>,
    released: Condvar,
    config: StoreConfig,
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl InMemoryAccountStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            tables: Mutex::default(),
            released: Condvar::new(),
            config,
        }
    }

    pub fn open_account(
        &self,
        id: AccountId,
        owner: impl Into<String>,
        balance: Decimal,
    ) -> Result<Account, StoreError> {
        let account = Account::new(id.clone(), owner, balance)
            .map_err(|_| StoreError::NegativeBalance(id.clone()))?;
        let mut tables = self.wait_for_row(&id)?;
        match tables.accounts.entry(id) {
            Entry::Occupied(entry) => Err(StoreError::DuplicateAccount(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(account.clone());
                tracing::debug!(account = %account.id(), "account opened");
                Ok(account)
            }
        }
    }

    pub fn rename_account(
        &self,
        id: &AccountId,
        owner: impl Into<String>,
    ) -> Result<Account, StoreError> {
        let mut tables = self.wait_for_row(id)?;
        let account = tables
            .accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownAccount(id.clone()))?;
        account.set_owner(owner.into());
        Ok(account.clone())
    }

    /// Removes an account. Only empty accounts can be closed, otherwise money
    /// would disappear with them.
    pub fn close_account(&self, id: &AccountId) -> Result<Account, StoreError> {
        let mut tables = self.wait_for_row(id)?;
        let Entry::Occupied(entry) = tables.accounts.entry(id.clone()) else {
            return Err(StoreError::UnknownAccount(id.clone()));
        };
        if !entry.get().balance().is_zero() {
            return Err(StoreError::NonZeroBalance(id.clone()));
        }
        tracing::debug!(account = %id, "account closed");
        Ok(entry.remove())
    }

    /// All accounts in ascending id order.
    pub fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        let tables = self.lock_tables()?;
        let mut accounts: Vec<_> = tables.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(accounts)
    }

    fn lock_tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.config.lock_timeout
    }

    fn wait_until<'s>(
        &'s self,
        mut tables: MutexGuard<'s, Tables>,
        deadline: Instant,
        ready: impl Fn(&Tables) -> bool,
        timed_out: impl FnOnce() -> StoreError,
    ) -> Result<MutexGuard<'s, Tables>, StoreError> {
        while !ready(&*tables) {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Err(timed_out());
            };
            let (guard, _) = self
                .released
                .wait_timeout(tables, remaining)
                .map_err(|_| StoreError::Poisoned)?;
            tables = guard;
        }
        Ok(tables)
    }

    /// Waits until no unit holds the row, returning with the tables locked.
    fn wait_for_row(&self, id: &AccountId) -> Result<MutexGuard<'_, Tables>, StoreError> {
        let deadline = self.deadline();
        let tables = self.lock_tables()?;
        self.wait_until(
            tables,
            deadline,
            |t| !t.locked_rows.contains(id),
            || StoreError::LockTimeout(id.clone()),
        )
    }
}

impl AccountStore for InMemoryAccountStore {
    type Unit<'a> = InMemoryUnit<'a>;

    fn begin(&self) -> Result<InMemoryUnit<'_>, StoreError> {
        let deadline = self.deadline();
        let limit = self.config.connection_limit;
        let tables = self.lock_tables()?;
        let mut tables = self.wait_until(
            tables,
            deadline,
            |t| t.open_units < limit,
            || StoreError::ConnectionLimit,
        )?;
        tables.open_units += 1;
        Ok(InMemoryUnit {
            store: self,
            held: Vec::new(),
            balances: HashMap::new(),
            transfers: Vec::new(),
            open: true,
        })
    }

    fn account(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.lock_tables()?.accounts.get(id).cloned())
    }

    fn transfer(&self, id: TransferId) -> Result<Option<Transfer>, StoreError> {
        Ok(self.lock_tables()?.ledger.get(id).cloned())
    }

    fn transfers(&self) -> Result<Vec<Transfer>, StoreError> {
        Ok(self.lock_tables()?.ledger.iter().cloned().collect())
    }
}

/// Pending writes are buffered in the unit and only reach the tables on commit.
#[derive(Debug)]
pub struct InMemoryUnit<'s> {
    store: &'s InMemoryAccountStore,
    held: Vec<AccountId>,
    balances: HashMap<AccountId, Decimal>,
    transfers: Vec<PendingTransfer>,
    open: bool,
}

impl InMemoryUnit<'_> {
    fn holds(&self, id: &AccountId) -> bool {
        self.held.contains(id)
    }

    fn release(&mut self, tables: &mut Tables) {
        if !self.open {
            return;
        }
        for id in self.held.drain(..) {
            tables.locked_rows.remove(&id);
        }
        tables.open_units = tables.open_units.saturating_sub(1);
        self.open = false;
        self.store.released.notify_all();
    }
}

impl AtomicUnit for InMemoryUnit<'_> {
    fn account_for_update(&mut self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        let store = self.store;
        if self.holds(id) {
            let tables = store.lock_tables()?;
            return Ok(tables.accounts.get(id).cloned().map(|mut account| {
                if let Some(balance) = self.balances.get(id) {
                    account.set_balance(*balance);
                }
                account
            }));
        }

        let deadline = store.deadline();
        let tables = store.lock_tables()?;
        if tables.locked_rows.contains(id) {
            tracing::trace!(account = %id, "waiting for row lock");
        }
        let mut tables = store.wait_until(
            tables,
            deadline,
            |t| !t.locked_rows.contains(id),
            || StoreError::LockTimeout(id.clone()),
        )?;
        tables.locked_rows.insert(id.clone());
        self.held.push(id.clone());
        Ok(tables.accounts.get(id).cloned())
    }

    fn update_balance(&mut self, id: &AccountId, balance: Decimal) -> Result<(), StoreError> {
        if !self.holds(id) {
            return Err(StoreError::NotLocked(id.clone()));
        }
        self.balances.insert(id.clone(), balance);
        Ok(())
    }

    fn append_transfer(&mut self, transfer: PendingTransfer) -> Result<(), StoreError> {
        for id in [&transfer.from_account, &transfer.to_account] {
            if !self.holds(id) {
                return Err(StoreError::NotLocked(id.clone()));
            }
        }
        self.transfers.push(transfer);
        Ok(())
    }

    fn commit(mut self) -> Result<Vec<Transfer>, StoreError> {
        let store = self.store;
        let mut tables = store.lock_tables()?;

        // nothing is written unless every pending balance is acceptable
        for (id, balance) in &self.balances {
            if !tables.accounts.contains_key(id) {
                return Err(StoreError::UnknownAccount(id.clone()));
            }
            if *balance < Decimal::zero() {
                return Err(StoreError::NegativeBalance(id.clone()));
            }
        }

        for (id, balance) in self.balances.drain() {
            if let Some(account) = tables.accounts.get_mut(&id) {
                account.set_balance(balance);
            }
        }
        let now = Utc::now();
        let committed = self
            .transfers
            .drain(..)
            .map(|pending| tables.ledger.append(pending, now))
            .collect();
        self.release(&mut tables);
        Ok(committed)
    }

    fn discard(self) {
        drop(self);
    }
}

impl Drop for InMemoryUnit<'_> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if !self.balances.is_empty() || !self.transfers.is_empty() {
            tracing::debug!(
                balances = self.balances.len(),
                transfers = self.transfers.len(),
                "discarding pending writes"
            );
        }
        let store = self.store;
        let mut tables = store
            .tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.release(&mut tables);
    }
}
