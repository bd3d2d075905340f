//! Test helpers: deterministic clock, contention injection, and seeded
//! accounts over the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};

use scrimbase_types::{Account, AccountId, Key, Value};

use crate::clock::Clock;
use crate::engine::{Engine, EngineConfig};
use crate::store::{Memory, Status, Store, StoreError, Versioned};

/// Fixed clock so record timestamps are deterministic in tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_ms(&self) -> u64 {
        self.0
    }
}

/// Store wrapper that fails the next `failures` commits with contention
/// before delegating, to exercise the bounded retry path.
pub struct Contended<S> {
    inner: S,
    failures: AtomicUsize,
}

impl<S> Contended<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(0),
        }
    }

    /// Inject contention into the next `failures` commits. Disarmed while
    /// fixtures are being seeded.
    pub fn arm(&self, failures: usize) {
        self.failures.store(failures, Ordering::SeqCst);
    }
}

impl<S: Store> Store for Contended<S> {
    async fn get(&self, key: &Key) -> Result<Option<Versioned>, StoreError> {
        self.inner.get(key).await
    }

    async fn commit(
        &self,
        guards: Vec<(Key, u64)>,
        writes: Vec<(Key, Status)>,
    ) -> Result<(), StoreError> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if injected {
            return Err(StoreError::Contention {
                key: "injected".to_string(),
            });
        }
        self.inner.commit(guards, writes).await
    }
}

/// Engine over a fresh in-memory store with a fixed clock.
pub fn test_engine() -> Engine<Memory, FixedClock> {
    Engine::with_parts(
        Memory::new(),
        FixedClock(1_754_000_000_000),
        EngineConfig::default(),
    )
}

/// Engine whose store can inject commit conflicts (see [`Contended::arm`]).
pub fn contended_engine() -> Engine<Contended<Memory>, FixedClock> {
    Engine::with_parts(
        Contended::new(Memory::new()),
        FixedClock(1_754_000_000_000),
        EngineConfig::default(),
    )
}

/// Seed an account record plus its resolver index rows directly into the
/// store, bypassing the engine. `configure` adjusts the record before it is
/// written (balance, role, referral, resolver fields).
pub async fn seed_account<S: Store, C: Clock>(
    engine: &Engine<S, C>,
    id: &str,
    configure: impl FnOnce(&mut Account),
) -> AccountId {
    let account_id = AccountId::from(id);
    let mut account = Account::new(id, 0);
    configure(&mut account);

    let mut writes = vec![(
        Key::AccountByUsername(account.username.clone()),
        Status::Update(Value::AccountRef(account_id.clone())),
    )];
    if let Some(game_id) = &account.game_id {
        writes.push((
            Key::AccountByGameId(game_id.clone()),
            Status::Update(Value::AccountRef(account_id.clone())),
        ));
    }
    if let Some(game_name) = &account.game_name {
        writes.push((
            Key::AccountByGameName(game_name.clone()),
            Status::Update(Value::AccountRef(account_id.clone())),
        ));
    }
    writes.push((
        Key::Account(account_id.clone()),
        Status::Update(Value::Account(account)),
    ));
    engine
        .store()
        .commit(vec![], writes)
        .await
        .expect("seed account");
    account_id
}
