use scrimbase_types::{
    Account, AccountId, EngineError, Key, Role, TxKind, TxRef, TxStatus, Value,
    WithdrawalDecision, WithdrawalRequest, WithdrawalStatus, BPS_DENOMINATOR,
};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::engine::Engine;
use crate::ledger::Overdraft;
use crate::store::{Store, StoreError};
use crate::txn::Txn;

/// Outcome of a withdrawal resolution. `replayed` is set when the request
/// was already resolved and the recorded outcome is returned instead of
/// being applied again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawalOutcome {
    pub id: u64,
    pub status: WithdrawalStatus,
    pub fee_recipient: Option<AccountId>,
    pub fee_amount: i64,
    pub replayed: bool,
}

impl<S: Store, C: Clock> Engine<S, C> {
    /// Create a withdrawal request on behalf of the user-facing flow.
    ///
    /// Allocates the next request id, moves the amount into an on-hold
    /// ledger row, and persists the `Pending` request — one atomic commit,
    /// so a half-created request cannot exist.
    pub async fn create_withdrawal(
        &self,
        account_id: &AccountId,
        amount: i64,
    ) -> Result<WithdrawalRequest, EngineError> {
        if amount <= 0 {
            return Err(EngineError::Invalid(format!(
                "withdrawal amount must be positive, got {amount}"
            )));
        }
        for _ in 0..self.config.cas_retry_limit {
            let mut txn = self.begin();
            let request_id = match txn.get(&Key::WithdrawalSeq).await? {
                Some(Value::Seq(next)) => next,
                _ => 0,
            };
            let mut account = Self::load_account(&mut txn, account_id).await?;
            let hold = self.stage_adjustment(
                &mut txn,
                account_id,
                &mut account,
                -amount,
                TxKind::WithdrawalHold,
                TxStatus::OnHold,
                format!("hold for withdrawal {request_id}"),
                Some(TxRef::Withdrawal(request_id)),
                Overdraft::Deny,
            )?;
            let request = WithdrawalRequest {
                id: request_id,
                account: account_id.clone(),
                amount,
                status: WithdrawalStatus::Pending,
                hold,
                created_at: self.now_ms(),
                resolved_at: None,
                fee_recipient: None,
                fee_amount: 0,
            };
            txn.insert(Key::WithdrawalSeq, Value::Seq(request_id + 1));
            txn.insert(
                Key::Withdrawal(request_id),
                Value::Withdrawal(request.clone()),
            );
            match txn.commit().await {
                Ok(()) => {
                    info!(request = request_id, account = %account_id, amount, "withdrawal requested");
                    return Ok(request);
                }
                Err(StoreError::Contention { key }) => {
                    debug!(account = %account_id, %key, "contended withdrawal creation; retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::Conflict(format!(
            "contended withdrawal creation for account {account_id}"
        )))
    }

    /// Resolve a pending withdrawal.
    ///
    /// Already-resolved requests are a no-op that returns the recorded
    /// outcome, whatever the new decision — the guard for duplicate admin
    /// clicks and retried network calls. The status read and the status
    /// write share one CAS-guarded commit, so two concurrent resolutions
    /// cannot both apply: the loser re-runs, observes the terminal state,
    /// and reports the recorded outcome.
    pub async fn resolve_withdrawal(
        &self,
        request_id: u64,
        decision: WithdrawalDecision,
    ) -> Result<WithdrawalOutcome, EngineError> {
        for _ in 0..self.config.cas_retry_limit {
            let mut txn = self.begin();
            let mut request = match txn.get(&Key::Withdrawal(request_id)).await? {
                Some(Value::Withdrawal(request)) => request,
                Some(_) => {
                    return Err(EngineError::Unavailable(format!(
                        "corrupt record under withdrawal key {request_id}"
                    )));
                }
                None => {
                    return Err(EngineError::NotFound(format!(
                        "withdrawal request {request_id}"
                    )));
                }
            };
            if request.status.is_terminal() {
                return Ok(WithdrawalOutcome {
                    id: request_id,
                    status: request.status,
                    fee_recipient: request.fee_recipient,
                    fee_amount: request.fee_amount,
                    replayed: true,
                });
            }

            match decision {
                WithdrawalDecision::Approve => {
                    let fee = request
                        .amount
                        .checked_mul(self.config.withdrawal_fee_bps as i64)
                        .map(|scaled| scaled / BPS_DENOMINATOR)
                        .ok_or_else(|| {
                            EngineError::Invalid(format!(
                                "fee computation overflow for withdrawal {request_id}"
                            ))
                        })?;
                    let recipient = self.fee_recipient(&mut txn, &request.account).await?;
                    if fee > 0 {
                        let mut recipient_account =
                            self.load_or_init_fee_sink(&mut txn, &recipient).await?;
                        self.stage_adjustment(
                            &mut txn,
                            &recipient,
                            &mut recipient_account,
                            fee,
                            TxKind::FeePayout,
                            TxStatus::Completed,
                            format!("fee for withdrawal {request_id}"),
                            Some(TxRef::Withdrawal(request_id)),
                            Overdraft::Deny,
                        )?;
                    }
                    // The hold is finalized; the net amount is disbursed
                    // off-platform, so only a zero-amount settle marker is
                    // appended on the requester.
                    Self::stage_hold_transition(&mut txn, &request.hold, TxStatus::Completed)
                        .await?;
                    let mut requester = Self::load_account(&mut txn, &request.account).await?;
                    self.stage_adjustment(
                        &mut txn,
                        &request.account,
                        &mut requester,
                        0,
                        TxKind::WithdrawalSettle,
                        TxStatus::Completed,
                        format!("withdrawal {request_id} settled off-platform"),
                        Some(TxRef::Withdrawal(request_id)),
                        Overdraft::Deny,
                    )?;
                    request.status = WithdrawalStatus::Approved;
                    request.fee_recipient = Some(recipient);
                    request.fee_amount = fee;
                }
                WithdrawalDecision::Reject => {
                    let hold =
                        Self::stage_hold_transition(&mut txn, &request.hold, TxStatus::Refunded)
                            .await?;
                    let mut requester = Self::load_account(&mut txn, &request.account).await?;
                    self.stage_adjustment(
                        &mut txn,
                        &request.account,
                        &mut requester,
                        -hold.amount,
                        TxKind::WithdrawalRefund,
                        TxStatus::Completed,
                        format!("refund for rejected withdrawal {request_id}"),
                        Some(TxRef::Withdrawal(request_id)),
                        Overdraft::Deny,
                    )?;
                    request.status = WithdrawalStatus::Rejected;
                }
            }

            request.resolved_at = Some(self.now_ms());
            let outcome = WithdrawalOutcome {
                id: request_id,
                status: request.status,
                fee_recipient: request.fee_recipient.clone(),
                fee_amount: request.fee_amount,
                replayed: false,
            };
            txn.insert(Key::Withdrawal(request_id), Value::Withdrawal(request));
            match txn.commit().await {
                Ok(()) => {
                    info!(
                        request = request_id,
                        status = ?outcome.status,
                        fee = outcome.fee_amount,
                        fee_recipient = ?outcome.fee_recipient,
                        "withdrawal resolved"
                    );
                    return Ok(outcome);
                }
                Err(StoreError::Contention { key }) => {
                    debug!(request = request_id, %key, "contended resolution; retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::Conflict(format!(
            "contended resolution of withdrawal {request_id}"
        )))
    }

    /// Pick who receives the withdrawal fee: the requester's referring
    /// delegate when that account still exists with the `Delegate` role,
    /// else the platform fee sink.
    async fn fee_recipient(
        &self,
        txn: &mut Txn<'_, S>,
        requester: &AccountId,
    ) -> Result<AccountId, EngineError> {
        let requester_account = Self::load_account(txn, requester).await?;
        if let Some(delegate) = requester_account.referred_by {
            if let Some(Value::Account(delegate_account)) =
                txn.get(&Key::Account(delegate.clone())).await?
            {
                if delegate_account.role == Role::Delegate {
                    return Ok(delegate);
                }
            }
            debug!(requester = %requester, delegate = %delegate, "referring delegate inactive; fee to platform");
        }
        Ok(self.config.fee_sink.clone())
    }

    /// Load a fee recipient account, lazily provisioning the platform sink.
    async fn load_or_init_fee_sink(
        &self,
        txn: &mut Txn<'_, S>,
        account_id: &AccountId,
    ) -> Result<Account, EngineError> {
        match txn.get(&Key::Account(account_id.clone())).await? {
            Some(Value::Account(account)) => Ok(account),
            None if *account_id == self.config.fee_sink => {
                let mut sink = Account::new("platform", self.now_ms());
                sink.role = Role::Admin;
                Ok(sink)
            }
            _ => Err(EngineError::NotFound(format!("account {account_id}"))),
        }
    }
}
