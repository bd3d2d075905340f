//! Common types for the scrimbase wallet and reconciliation engine.
//!
//! Defines the account/ledger/tournament/withdrawal records persisted in the
//! backing store, the [`Key`]/[`Value`] pairs the store is addressed with,
//! and the error taxonomy shared by the engine and the admin gateway.
//!
//! Records are encoded with `commonware-codec`; HTTP-facing DTOs live with
//! the gateway, not here.

pub mod account;
pub mod codec;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod record;
pub mod tournament;
pub mod withdrawal;

pub use account::{Account, AccountId, Role};
pub use constants::*;
pub use error::{EngineError, ErrorKind};
pub use ledger::{LedgerTransaction, TxId, TxKind, TxRef, TxStatus};
pub use record::{Key, Value};
pub use tournament::{LeaderboardAggregate, MatchParticipant, ParticipantIdentity, Tournament};
pub use withdrawal::{WithdrawalDecision, WithdrawalRequest, WithdrawalStatus};
