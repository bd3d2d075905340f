use scrimbase_types::{AccountId, EngineError, Key, LedgerTransaction, Value};

use crate::clock::Clock;
use crate::engine::Engine;
use crate::store::Store;

/// Result of replaying an account's ledger against its cached balance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditReport {
    pub account: AccountId,
    pub rows: u64,
    /// Balance recomputed as the sum of every appended row amount.
    pub replayed_balance: i64,
    pub cached_balance: i64,
}

impl AuditReport {
    pub fn consistent(&self) -> bool {
        self.replayed_balance == self.cached_balance
    }
}

impl<S: Store, C: Clock> Engine<S, C> {
    /// List an account's ledger rows in append order.
    pub async fn ledger(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<LedgerTransaction>, EngineError> {
        let mut txn = self.begin();
        let account = Self::load_account(&mut txn, account_id).await?;
        let mut rows = Vec::with_capacity(account.tx_seq as usize);
        for seq in 0..account.tx_seq {
            match txn.get(&Key::Ledger(account_id.clone(), seq)).await? {
                Some(Value::Ledger(row)) => rows.push(row),
                _ => {
                    return Err(EngineError::Unavailable(format!(
                        "missing ledger row {account_id}#{seq}"
                    )));
                }
            }
        }
        Ok(rows)
    }

    /// Recompute an account's balance from the append-only log alone and
    /// compare it to the cached balance. Because every applied balance
    /// change appends exactly one row in the same commit, any divergence
    /// means the store was mutated outside the engine.
    pub async fn audit_account(
        &self,
        account_id: &AccountId,
    ) -> Result<AuditReport, EngineError> {
        let cached_balance = self.account(account_id).await?.balance;
        let rows = self.ledger(account_id).await?;
        let mut replayed_balance: i64 = 0;
        for row in &rows {
            replayed_balance = replayed_balance.checked_add(row.amount).ok_or_else(|| {
                EngineError::Unavailable(format!("ledger sum overflow on {account_id}"))
            })?;
        }
        Ok(AuditReport {
            account: account_id.clone(),
            rows: rows.len() as u64,
            replayed_balance,
            cached_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{seed_account, test_engine};
    use crate::store::Status;
    use scrimbase_types::TxKind;

    #[tokio::test]
    async fn audit_flags_balances_mutated_outside_the_engine() {
        let engine = test_engine();
        let mallory = seed_account(&engine, "acct-mallory", |_| {}).await;
        engine
            .adjust_balance(&mallory, 900, TxKind::Adjustment, "top-up", None)
            .await
            .expect("credit");
        assert!(engine
            .audit_account(&mallory)
            .await
            .expect("audit")
            .consistent());

        // A raw overwrite of the cached balance (the pattern this engine
        // exists to prevent) is caught by the replay.
        let mut tampered = engine.account(&mallory).await.expect("account");
        tampered.balance += 1_000;
        engine
            .store()
            .commit(
                vec![],
                vec![(
                    Key::Account(mallory.clone()),
                    Status::Update(Value::Account(tampered)),
                )],
            )
            .await
            .expect("tamper");

        let report = engine.audit_account(&mallory).await.expect("audit");
        assert!(!report.consistent());
        assert_eq!(report.replayed_balance, 900);
        assert_eq!(report.cached_balance, 1_900);
    }
}
