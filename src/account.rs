use std::fmt;

use rust_decimal::{Decimal, prelude::Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceEventKind {
    Debited,
    Credited,
}

#[derive(Debug)]
pub struct BalanceEvent {
    amount: Decimal,
    kind: BalanceEventKind,
}

impl BalanceEvent {
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn kind(&self) -> BalanceEventKind {
        self.kind
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Balance of account `{0}` would overflow")]
    BalanceOverflow(AccountId),
    #[error("Account `{0}` cannot be opened with a negative balance")]
    NegativeBalance(AccountId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    id: AccountId,
    owner: String,
    balance: Decimal,
}

impl Account {
    pub fn new(
        id: AccountId,
        owner: impl Into<String>,
        balance: Decimal,
    ) -> Result<Self, AccountError> {
        if balance < Decimal::zero() {
            return Err(AccountError::NegativeBalance(id));
        }
        Ok(Self {
            id,
            owner: owner.into(),
            balance,
        })
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub(crate) fn set_owner(&mut self, owner: String) {
        self.owner = owner;
    }

    pub(crate) fn set_balance(&mut self, balance: Decimal) {
        self.balance = balance;
    }

    /// Events are the source of truth, no validation happens here.
    pub fn apply(&mut self, event: &BalanceEvent) {
        match event.kind {
            BalanceEventKind::Debited => {
                self.balance -= event.amount;
            }
            BalanceEventKind::Credited => {
                self.balance += event.amount;
            }
        }
    }

    pub fn handle_debit(&self, amount: Decimal) -> Result<BalanceEvent, AccountError> {
        if self.balance >= amount {
            Ok(BalanceEvent {
                amount,
                kind: BalanceEventKind::Debited,
            })
        } else {
            Err(AccountError::InsufficientFunds)
        }
    }

    pub fn handle_credit(&self, amount: Decimal) -> Result<BalanceEvent, AccountError> {
        if self.balance.checked_add(amount).is_none() {
            return Err(AccountError::BalanceOverflow(self.id.clone()));
        }
        Ok(BalanceEvent {
            amount,
            kind: BalanceEventKind::Credited,
        })
    }
}
