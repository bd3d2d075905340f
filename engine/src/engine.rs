use scrimbase_types::{
    Account, AccountId, EngineError, Key, Value, WithdrawalRequest, CAS_RETRY_LIMIT,
    PLATFORM_FEE_SINK, WITHDRAWAL_FEE_BPS,
};

use crate::clock::{Clock, SystemClock};
use crate::store::Store;
use crate::txn::Txn;

/// Engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Withdrawal fee in basis points.
    pub withdrawal_fee_bps: u16,
    /// Account credited when a withdrawal has no active referring delegate.
    pub fee_sink: AccountId,
    /// Optimistic-commit retry budget before reporting `Conflict`.
    pub cas_retry_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            withdrawal_fee_bps: WITHDRAWAL_FEE_BPS,
            fee_sink: AccountId::from(PLATFORM_FEE_SINK),
            cas_retry_limit: CAS_RETRY_LIMIT,
        }
    }
}

/// The result reconciliation and wallet ledger engine.
///
/// Stateless apart from the backing store: every operation is a short,
/// idempotent-on-retry unit of work committed with compare-and-swap guards.
/// Operations on different keys never block each other; contention on the
/// same key re-runs the losing cycle up to `cas_retry_limit` times.
pub struct Engine<S: Store, C: Clock = SystemClock> {
    pub(crate) store: S,
    pub(crate) clock: C,
    pub(crate) config: EngineConfig,
}

impl<S: Store> Engine<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_parts(store, SystemClock, EngineConfig::default())
    }
}

impl<S: Store, C: Clock> Engine<S, C> {
    pub fn with_parts(store: S, clock: C, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn begin(&self) -> Txn<'_, S> {
        Txn::new(&self.store)
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Fetch an account record.
    pub async fn account(&self, account_id: &AccountId) -> Result<Account, EngineError> {
        let mut txn = self.begin();
        Self::load_account(&mut txn, account_id).await
    }

    /// Fetch a withdrawal request.
    pub async fn withdrawal(&self, request_id: u64) -> Result<WithdrawalRequest, EngineError> {
        let mut txn = self.begin();
        match txn.get(&Key::Withdrawal(request_id)).await? {
            Some(Value::Withdrawal(request)) => Ok(request),
            Some(_) => Err(EngineError::Unavailable(format!(
                "corrupt record under withdrawal key {request_id}"
            ))),
            None => Err(EngineError::NotFound(format!(
                "withdrawal request {request_id}"
            ))),
        }
    }
}
