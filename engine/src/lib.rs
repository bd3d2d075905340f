//! Scrimbase reconciliation engine.
//!
//! This crate contains the only money-bearing logic on the platform: the
//! append-only wallet ledger, kill/prize delta reconciliation against stored
//! baselines, participant identity resolution, and the withdrawal
//! approval/rejection state machine.
//!
//! ## Correctness requirements
//! - Every balance- or aggregate-bearing record is mutated through
//!   compare-and-swap commits ([`Store::commit`]); plain overwrites are not
//!   available to operations in this crate.
//! - Every applied balance change appends exactly one [`LedgerTransaction`]
//!   row in the same commit, so the log can always recompute the cached
//!   balance (see [`Engine::audit_account`]).
//! - Result edits are expressed as deltas against the stored baseline, never
//!   as absolute overwrites, so repeated saves and concurrent edits to
//!   different matches compose.
//! - Contended commits re-run the whole read-modify-write cycle up to
//!   `cas_retry_limit` times and then surface `EngineError::Conflict`;
//!   a failed operation leaves no partial writes behind.
//!
//! The primary entrypoint is [`Engine`].
//!
//! [`LedgerTransaction`]: scrimbase_types::LedgerTransaction

pub mod audit;
pub mod clock;
pub mod identity;
pub mod ledger;
pub mod results;
pub mod store;
pub mod withdrawals;

mod engine;
mod txn;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

#[cfg(test)]
mod reconciliation_tests;

pub use audit::AuditReport;
pub use clock::{Clock, SystemClock};
pub use engine::{Engine, EngineConfig};
pub use identity::JoinMember;
pub use results::ResultOutcome;
pub use store::{Memory, Status, Store, StoreError, Versioned};
pub use txn::Txn;
pub use withdrawals::WithdrawalOutcome;
