use std::fmt;

use rust_decimal::{Decimal, prelude::Zero};
use serde::Deserialize;
use thiserror::Error;

use crate::account::AccountId;

/// Which end of a transfer an account is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    From,
    To,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::From => f.write_str("Source"),
            Side::To => f.write_str("Destination"),
        }
    }
}

/// Transfer as it was received, nothing is checked yet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferRequest {
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
    pub amount: Option<Decimal>,
}

impl TransferRequest {
    pub fn new(from: impl Into<AccountId>, to: impl Into<AccountId>, amount: Decimal) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
            amount: Some(amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("{side} account is required")]
    AccountRequired { side: Side },
    #[error("Cannot transfer from account `{0}` to itself")]
    SelfTransfer(AccountId),
    #[error("Amount is required")]
    AmountRequired,
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),
}

impl TransferCommand {
    /// Checks the shape of a request. The first failing check wins:
    /// both accounts present, accounts differ, amount present and positive.
    ///
    /// Account existence and funds are not checked here, they need the store.
    pub fn parse(request: &TransferRequest) -> Result<Self, RequestError> {
        let from = Self::parse_account(request.from.as_ref(), Side::From)?;
        let to = Self::parse_account(request.to.as_ref(), Side::To)?;
        if from == to {
            return Err(RequestError::SelfTransfer(from));
        }
        let Some(amount) = request.amount else {
            return Err(RequestError::AmountRequired);
        };
        if amount <= Decimal::zero() {
            return Err(RequestError::NonPositiveAmount(amount));
        }
        Ok(Self { from, to, amount })
    }

    fn parse_account(id: Option<&AccountId>, side: Side) -> Result<AccountId, RequestError> {
        match id {
            Some(id) if !id.is_blank() => Ok(id.clone()),
            _ => Err(RequestError::AccountRequired { side }),
        }
    }
}
