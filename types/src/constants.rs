/// Maximum length of a platform account id (a backing-store document id).
pub const MAX_ACCOUNT_ID_LENGTH: usize = 64;

/// Maximum length of a platform username.
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Maximum length of a player-supplied in-game identifier.
pub const MAX_GAME_ID_LENGTH: usize = 64;

/// Maximum length of an in-game display name.
pub const MAX_GAME_NAME_LENGTH: usize = 64;

/// Maximum length of a tournament name.
pub const MAX_TOURNAMENT_NAME_LENGTH: usize = 96;

/// Maximum length of a ledger row description.
pub const MAX_DESCRIPTION_LENGTH: usize = 256;

/// Withdrawal fee in basis points (5.00%).
pub const WITHDRAWAL_FEE_BPS: u16 = 500;

/// Basis-point denominator for fee math.
pub const BPS_DENOMINATOR: i64 = 10_000;

/// Bounded retry budget for contended optimistic store commits. Exhaustion
/// surfaces as `EngineError::Conflict` to the caller.
pub const CAS_RETRY_LIMIT: usize = 5;

/// Account id of the platform fee sink, credited when a withdrawal has no
/// active referring delegate.
pub const PLATFORM_FEE_SINK: &str = "platform:fee-sink";
