use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::account::AccountId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TransferId(u64);

impl TransferId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transfer written inside an atomic unit, id and timestamp are assigned on commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub id: TransferId,
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    pub fn receipt(&self) -> TransferReceipt {
        TransferReceipt {
            transfer_id: self.id,
            timestamp: self.created_at,
        }
    }
}

/// What the caller of a transfer gets back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub transfer_id: TransferId,
    pub timestamp: DateTime<Utc>,
}

/// Append-only list of transfers, ordered by creation.
///
/// Ids start at 1 and have no gaps. Timestamps never go backwards, even if the
/// wall clock does.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<Transfer>,
}

impl Ledger {
    pub fn get(&self, id: TransferId) -> Option<&Transfer> {
        self.entries
            .binary_search_by_key(&id, |t| t.id)
            .ok()
            .and_then(|idx| self.entries.get(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transfer> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn append(&mut self, pending: PendingTransfer, now: DateTime<Utc>) -> Transfer {
        let (id, created_at) = match self.entries.last() {
            Some(last) => (TransferId(last.id.0 + 1), now.max(last.created_at)),
            None => (TransferId(1), now),
        };
        let transfer = Transfer {
            id,
            from_account: pending.from_account,
            to_account: pending.to_account,
            amount: pending.amount,
            created_at,
        };
        self.entries.push(transfer.clone());
        transfer
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use rust_decimal::prelude::FromPrimitive;

    use super::*;

    fn pending(amount: u32) -> PendingTransfer {
        PendingTransfer {
            from_account: "a".into(),
            to_account: "b".into(),
            amount: Decimal::from_u32(amount).unwrap(),
        }
    }

    #[test]
    fn append_assigns_sequential_ids() {
        let mut ledger = Ledger::default();
        assert!(ledger.is_empty());
        let now = Utc::now();
        let first = ledger.append(pending(1), now);
        let second = ledger.append(pending(2), now);
        assert_eq!(first.id.get(), 1);
        assert_eq!(second.id.get(), 2);
        assert_eq!(ledger.len(), 2);

        assert_eq!(ledger.get(second.id), Some(&second));
        assert_eq!(ledger.get(TransferId(3)), None);
        assert_eq!(ledger.get(TransferId(0)), None);

        let amounts: Vec<_> = ledger.iter().map(|t| t.amount).collect();
        assert_eq!(
            amounts,
            vec![Decimal::from_u32(1).unwrap(), Decimal::from_u32(2).unwrap()]
        );
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let mut ledger = Ledger::default();
        let now = Utc::now();
        let first = ledger.append(pending(1), now);
        let second = ledger.append(pending(1), now - TimeDelta::seconds(10));
        assert_eq!(second.created_at, first.created_at);
        let third = ledger.append(pending(1), now + TimeDelta::seconds(1));
        assert!(third.created_at > second.created_at);
    }

    #[test]
    fn receipt() {
        let mut ledger = Ledger::default();
        let transfer = ledger.append(pending(5), Utc::now());
        let receipt = transfer.receipt();
        assert_eq!(receipt.transfer_id, transfer.id);
        assert_eq!(receipt.timestamp, transfer.created_at);
    }
}
