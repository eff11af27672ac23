use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use crate::{
    account::{Account, AccountError, AccountId},
    command::{RequestError, Side, TransferCommand, TransferRequest},
    ledger::{PendingTransfer, Transfer, TransferReceipt},
    store::{AccountStore, AtomicUnit, StoreError},
};

/// Errors surfaced to whoever asked for a transfer. Store internals are logged,
/// never carried here.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),
    #[error("{side} account `{id}` does not exist")]
    AccountNotFound { side: Side, id: AccountId },
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Transfer conflicted with another transfer, it can be retried")]
    ConflictRetryable,
    #[error("Transfer could not be completed")]
    StoreFailure,
}

impl TransferError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::ConflictRetryable)
    }
}

impl From<StoreError> for TransferError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockTimeout(_) => {
                tracing::warn!(error = %err, "transfer conflicted");
                TransferError::ConflictRetryable
            }
            err => {
                tracing::error!(error = %err, "store failure");
                TransferError::StoreFailure
            }
        }
    }
}

impl From<AccountError> for TransferError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InsufficientFunds => TransferError::InsufficientFunds,
            err => {
                tracing::error!(error = %err, "balance invariant violated");
                TransferError::StoreFailure
            }
        }
    }
}

/// Runs every transfer as one atomic unit of the store.
///
/// Cheap to share between threads, all coordination happens inside the store.
pub struct TransferExecutor<S> {
    store: Arc<S>,
}

impl<S> Clone for TransferExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> TransferExecutor<S>
where
    S: AccountStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transfer(
        &self,
        from: impl Into<AccountId>,
        to: impl Into<AccountId>,
        amount: Decimal,
    ) -> Result<TransferReceipt, TransferError> {
        let transfer = self.execute(&TransferRequest::new(from, to, amount))?;
        Ok(transfer.receipt())
    }

    #[instrument(level = "debug", skip_all, fields(from = ?request.from, to = ?request.to, amount = ?request.amount))]
    pub fn execute(&self, request: &TransferRequest) -> Result<Transfer, TransferError> {
        let command = TransferCommand::parse(request).inspect_err(|err| {
            tracing::debug!(%err, "transfer request rejected");
        })?;

        let mut unit = self.store.begin()?;
        let result = match Self::apply(&mut unit, &command) {
            Ok(()) => unit.commit().map_err(TransferError::from),
            Err(err) => {
                unit.discard();
                Err(err)
            }
        };

        match result?.pop() {
            Some(transfer) => {
                tracing::info!(transfer_id = %transfer.id, "transfer committed");
                Ok(transfer)
            }
            None => {
                tracing::error!("commit recorded no transfer");
                Err(TransferError::StoreFailure)
            }
        }
    }

    fn apply(unit: &mut S::Unit<'_>, command: &TransferCommand) -> Result<(), TransferError> {
        let (mut from, mut to) = Self::lock_pair(unit, &command.from, &command.to)?;

        let Some(from_account) = from.as_mut() else {
            return Err(Self::not_found(Side::From, &command.from));
        };
        let debit = from_account.handle_debit(command.amount).inspect_err(|_| {
            tracing::debug!(balance = %from_account.balance(), "insufficient funds");
        })?;
        let Some(to_account) = to.as_mut() else {
            return Err(Self::not_found(Side::To, &command.to));
        };
        let credit = to_account.handle_credit(command.amount)?;

        from_account.apply(&debit);
        to_account.apply(&credit);

        unit.update_balance(from_account.id(), from_account.balance())?;
        unit.update_balance(to_account.id(), to_account.balance())?;
        unit.append_transfer(PendingTransfer {
            from_account: command.from.clone(),
            to_account: command.to.clone(),
            amount: command.amount,
        })?;
        Ok(())
    }

    /// Locks both rows in ascending id order, whatever the direction of the
    /// transfer, so two opposite transfers between the same pair never deadlock.
    fn lock_pair(
        unit: &mut S::Unit<'_>,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<(Option<Account>, Option<Account>), StoreError> {
        if from < to {
            let from_account = unit.account_for_update(from)?;
            let to_account = unit.account_for_update(to)?;
            Ok((from_account, to_account))
        } else {
            let to_account = unit.account_for_update(to)?;
            let from_account = unit.account_for_update(from)?;
            Ok((from_account, to_account))
        }
    }

    fn not_found(side: Side, id: &AccountId) -> TransferError {
        tracing::debug!(%side, account = %id, "account not found");
        TransferError::AccountNotFound {
            side,
            id: id.clone(),
        }
    }
}
