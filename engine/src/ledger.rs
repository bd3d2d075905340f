use scrimbase_types::{
    Account, AccountId, EngineError, Key, LedgerTransaction, TxId, TxKind, TxRef, TxStatus, Value,
};
use tracing::debug;

use crate::clock::Clock;
use crate::engine::Engine;
use crate::store::{Store, StoreError};
use crate::txn::Txn;

/// Whether a debit may drive the available balance negative.
///
/// Admin prize corrections may overdraw; user-initiated debits (entry fees,
/// withdrawal holds) never do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Overdraft {
    Deny,
    Allow,
}

impl<S: Store, C: Clock> Engine<S, C> {
    pub(crate) async fn load_account(
        txn: &mut Txn<'_, S>,
        account_id: &AccountId,
    ) -> Result<Account, EngineError> {
        match txn.get(&Key::Account(account_id.clone())).await? {
            Some(Value::Account(account)) => Ok(account),
            Some(_) => Err(EngineError::Unavailable(format!(
                "corrupt record under account key {account_id}"
            ))),
            None => Err(EngineError::NotFound(format!("account {account_id}"))),
        }
    }

    pub(crate) async fn load_ledger_row(
        txn: &mut Txn<'_, S>,
        id: &TxId,
    ) -> Result<LedgerTransaction, EngineError> {
        match txn.get(&Key::Ledger(id.account.clone(), id.seq)).await? {
            Some(Value::Ledger(row)) => Ok(row),
            Some(_) => Err(EngineError::Unavailable(format!(
                "corrupt record under ledger key {id}"
            ))),
            None => Err(EngineError::NotFound(format!("ledger row {id}"))),
        }
    }

    /// Stage a balance change plus its ledger row on an already-loaded
    /// account. The row and the updated account land in the caller's commit,
    /// so the log is always a superset of applied balance changes.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn stage_adjustment(
        &self,
        txn: &mut Txn<'_, S>,
        account_id: &AccountId,
        account: &mut Account,
        amount: i64,
        kind: TxKind,
        status: TxStatus,
        description: String,
        reference: Option<TxRef>,
        overdraft: Overdraft,
    ) -> Result<TxId, EngineError> {
        let new_balance = account.balance.checked_add(amount).ok_or_else(|| {
            EngineError::Invalid(format!("balance overflow on account {account_id}"))
        })?;
        if overdraft == Overdraft::Deny && amount < 0 && new_balance < 0 {
            return Err(EngineError::Invalid(format!(
                "insufficient balance on account {account_id}: {} available, {} required",
                account.balance, -amount
            )));
        }
        account.balance = new_balance;
        let row = LedgerTransaction {
            seq: account.tx_seq,
            account: account_id.clone(),
            amount,
            kind,
            status,
            created_at: self.now_ms(),
            description,
            reference,
        };
        let id = row.id();
        account.tx_seq += 1;
        txn.insert(Key::Ledger(account_id.clone(), row.seq), Value::Ledger(row));
        txn.insert(
            Key::Account(account_id.clone()),
            Value::Account(account.clone()),
        );
        Ok(id)
    }

    /// Apply a signed delta to an account's available balance and return the
    /// new balance.
    ///
    /// Appends exactly one ledger row in the same atomic commit that updates
    /// the cached balance. Debits that would overdraw the account fail
    /// `Invalid` with no side effects.
    pub async fn adjust_balance(
        &self,
        account_id: &AccountId,
        delta: i64,
        kind: TxKind,
        description: &str,
        reference: Option<TxRef>,
    ) -> Result<i64, EngineError> {
        for _ in 0..self.config.cas_retry_limit {
            let mut txn = self.begin();
            let mut account = Self::load_account(&mut txn, account_id).await?;
            self.stage_adjustment(
                &mut txn,
                account_id,
                &mut account,
                delta,
                kind,
                TxStatus::Completed,
                description.to_string(),
                reference.clone(),
                Overdraft::Deny,
            )?;
            let new_balance = account.balance;
            match txn.commit().await {
                Ok(()) => {
                    debug!(account = %account_id, delta, new_balance, ?kind, "balance adjusted");
                    return Ok(new_balance);
                }
                Err(StoreError::Contention { key }) => {
                    debug!(account = %account_id, %key, "contended balance commit; retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::Conflict(format!(
            "contended balance update on account {account_id}"
        )))
    }

    /// Reserve funds for a pending withdrawal.
    ///
    /// Fails `Invalid` when the amount is not positive or exceeds the
    /// available balance; otherwise debits the balance and appends an
    /// `OnHold` row whose id the withdrawal request records.
    pub async fn reserve(&self, account_id: &AccountId, amount: i64) -> Result<TxId, EngineError> {
        if amount <= 0 {
            return Err(EngineError::Invalid(format!(
                "hold amount must be positive, got {amount}"
            )));
        }
        for _ in 0..self.config.cas_retry_limit {
            let mut txn = self.begin();
            let mut account = Self::load_account(&mut txn, account_id).await?;
            let id = self.stage_adjustment(
                &mut txn,
                account_id,
                &mut account,
                -amount,
                TxKind::WithdrawalHold,
                TxStatus::OnHold,
                format!("hold of {amount}"),
                None,
                Overdraft::Deny,
            )?;
            match txn.commit().await {
                Ok(()) => {
                    debug!(account = %account_id, amount, row = %id, "funds reserved");
                    return Ok(id);
                }
                Err(StoreError::Contention { key }) => {
                    debug!(account = %account_id, %key, "contended reserve; retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::Conflict(format!(
            "contended reserve on account {account_id}"
        )))
    }

    /// Finalize a hold after an approved withdrawal (`OnHold -> Completed`).
    pub async fn settle_hold(&self, id: &TxId) -> Result<(), EngineError> {
        for _ in 0..self.config.cas_retry_limit {
            let mut txn = self.begin();
            let row = Self::stage_hold_transition(&mut txn, id, TxStatus::Completed).await?;
            match txn.commit().await {
                Ok(()) => {
                    debug!(row = %id, amount = row.amount, "hold settled");
                    return Ok(());
                }
                Err(StoreError::Contention { key }) => {
                    debug!(row = %id, %key, "contended settle; retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::Conflict(format!(
            "contended settle of hold {id}"
        )))
    }

    /// Refund a hold after a rejected withdrawal: credits the full held
    /// amount back, appends a `WithdrawalRefund` row, and marks the hold
    /// `Refunded`. Returns the new balance.
    pub async fn release_hold(&self, id: &TxId) -> Result<i64, EngineError> {
        for _ in 0..self.config.cas_retry_limit {
            let mut txn = self.begin();
            let hold = Self::stage_hold_transition(&mut txn, id, TxStatus::Refunded).await?;
            let mut account = Self::load_account(&mut txn, &id.account).await?;
            self.stage_adjustment(
                &mut txn,
                &id.account,
                &mut account,
                -hold.amount,
                TxKind::WithdrawalRefund,
                TxStatus::Completed,
                format!("refund of hold {id}"),
                hold.reference.clone(),
                Overdraft::Deny,
            )?;
            let new_balance = account.balance;
            match txn.commit().await {
                Ok(()) => {
                    debug!(row = %id, refunded = -hold.amount, new_balance, "hold released");
                    return Ok(new_balance);
                }
                Err(StoreError::Contention { key }) => {
                    debug!(row = %id, %key, "contended release; retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::Conflict(format!(
            "contended release of hold {id}"
        )))
    }

    /// Stage the hold-status transition, enforcing that the row is currently
    /// on hold. Returns the row as it was before the transition.
    pub(crate) async fn stage_hold_transition(
        txn: &mut Txn<'_, S>,
        id: &TxId,
        next: TxStatus,
    ) -> Result<LedgerTransaction, EngineError> {
        let row = Self::load_ledger_row(txn, id).await?;
        if row.status != TxStatus::OnHold {
            return Err(EngineError::Invalid(format!(
                "ledger row {id} is not on hold (status {:?})",
                row.status
            )));
        }
        let mut updated = row.clone();
        updated.status = next;
        txn.insert(
            Key::Ledger(id.account.clone(), id.seq),
            Value::Ledger(updated),
        );
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{seed_account, test_engine};

    #[tokio::test]
    async fn user_debits_never_overdraw() {
        let engine = test_engine();
        let alice = seed_account(&engine, "acct-alice", |account| account.balance = 40).await;

        let err = engine
            .adjust_balance(&alice, -100, TxKind::EntryFee, "entry fee", None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Invalid(_)));

        // Nothing was appended and the balance is untouched.
        let account = engine.account(&alice).await.expect("account");
        assert_eq!(account.balance, 40);
        assert_eq!(account.tx_seq, 0);
    }

    #[tokio::test]
    async fn reserve_requires_available_balance() {
        let engine = test_engine();
        let bob = seed_account(&engine, "acct-bob", |account| account.balance = 500).await;

        let err = engine.reserve(&bob, 501).await.unwrap_err();
        assert!(matches!(err, EngineError::Invalid(_)));
        let err = engine.reserve(&bob, 0).await.unwrap_err();
        assert!(matches!(err, EngineError::Invalid(_)));

        let hold = engine.reserve(&bob, 500).await.expect("reserve");
        let account = engine.account(&bob).await.expect("account");
        assert_eq!(account.balance, 0);

        let row = engine.ledger(&bob).await.expect("ledger").remove(hold.seq as usize);
        assert_eq!(row.status, TxStatus::OnHold);
        assert_eq!(row.amount, -500);
    }

    #[tokio::test]
    async fn hold_transitions_only_run_once() {
        let engine = test_engine();
        let carol = seed_account(&engine, "acct-carol", |account| account.balance = 300).await;

        let hold = engine.reserve(&carol, 200).await.expect("reserve");
        engine.release_hold(&hold).await.expect("release");
        assert_eq!(engine.account(&carol).await.expect("account").balance, 300);

        // A released hold can be neither settled nor released again.
        let err = engine.settle_hold(&hold).await.unwrap_err();
        assert!(matches!(err, EngineError::Invalid(_)));
        let err = engine.release_hold(&hold).await.unwrap_err();
        assert!(matches!(err, EngineError::Invalid(_)));
        assert_eq!(engine.account(&carol).await.expect("account").balance, 300);
    }
}
