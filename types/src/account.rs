use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};
use thiserror::Error as ThisError;

use crate::codec::{
    opt_string_encode_size, read_opt_string, read_string, string_encode_size, write_opt_string,
    write_string,
};
use crate::constants::{
    MAX_ACCOUNT_ID_LENGTH, MAX_GAME_ID_LENGTH, MAX_GAME_NAME_LENGTH, MAX_USERNAME_LENGTH,
};

/// Platform account identifier (a document id in the backing store).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl Write for AccountId {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.0, writer);
    }
}

impl Read for AccountId {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self(read_string(reader, MAX_ACCOUNT_ID_LENGTH)?))
    }
}

impl EncodeSize for AccountId {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.0)
    }
}

/// Account role on the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    User,
    /// A referrer entitled to the fee share of withdrawals made by users
    /// they referred.
    Delegate,
    Admin,
}

impl Write for Role {
    fn write(&self, writer: &mut impl BufMut) {
        let tag: u8 = match self {
            Role::User => 0,
            Role::Delegate => 1,
            Role::Admin => 2,
        };
        tag.write(writer);
    }
}

impl Read for Role {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Role::User),
            1 => Ok(Role::Delegate),
            2 => Ok(Role::Admin),
            tag => Err(Error::InvalidEnum(tag)),
        }
    }
}

impl EncodeSize for Role {
    fn encode_size(&self) -> usize {
        1
    }
}

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum AccountInvariantError {
    #[error("username too long (len={len}, max={max})")]
    UsernameTooLong { len: usize, max: usize },
    #[error("game id too long (len={len}, max={max})")]
    GameIdTooLong { len: usize, max: usize },
    #[error("game name too long (len={len}, max={max})")]
    GameNameTooLong { len: usize, max: usize },
}

/// Platform account as seen by the ledger engine.
///
/// `balance` is the cached available balance in minor currency units. It is
/// only mutated together with an appended [`crate::LedgerTransaction`] in
/// the same store commit, so the ledger log can always recompute it.
/// Negative balances are reachable only through admin prize corrections.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Account {
    pub balance: i64,
    pub role: Role,
    /// The delegate that referred this account, if any. Drives withdrawal
    /// fee routing.
    pub referred_by: Option<AccountId>,
    pub username: String,
    /// In-game identifier stored on the profile; feeds the resolver index.
    pub game_id: Option<String>,
    /// In-game display name stored on the profile; feeds the resolver index.
    pub game_name: Option<String>,
    /// Next ledger sequence number for this account. Rows `0..tx_seq` exist.
    pub tx_seq: u64,
    pub created_at: u64,
}

impl Account {
    pub fn new(username: impl Into<String>, created_at: u64) -> Self {
        Self {
            balance: 0,
            role: Role::User,
            referred_by: None,
            username: username.into(),
            game_id: None,
            game_name: None,
            tx_seq: 0,
            created_at,
        }
    }

    pub fn validate_invariants(&self) -> Result<(), AccountInvariantError> {
        if self.username.len() > MAX_USERNAME_LENGTH {
            return Err(AccountInvariantError::UsernameTooLong {
                len: self.username.len(),
                max: MAX_USERNAME_LENGTH,
            });
        }
        if let Some(game_id) = &self.game_id {
            if game_id.len() > MAX_GAME_ID_LENGTH {
                return Err(AccountInvariantError::GameIdTooLong {
                    len: game_id.len(),
                    max: MAX_GAME_ID_LENGTH,
                });
            }
        }
        if let Some(game_name) = &self.game_name {
            if game_name.len() > MAX_GAME_NAME_LENGTH {
                return Err(AccountInvariantError::GameNameTooLong {
                    len: game_name.len(),
                    max: MAX_GAME_NAME_LENGTH,
                });
            }
        }
        Ok(())
    }
}

impl Write for Account {
    fn write(&self, writer: &mut impl BufMut) {
        self.balance.write(writer);
        self.role.write(writer);
        self.referred_by.write(writer);
        write_string(&self.username, writer);
        write_opt_string(&self.game_id, writer);
        write_opt_string(&self.game_name, writer);
        self.tx_seq.write(writer);
        self.created_at.write(writer);
    }
}

impl Read for Account {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            balance: i64::read(reader)?,
            role: Role::read(reader)?,
            referred_by: Option::<AccountId>::read(reader)?,
            username: read_string(reader, MAX_USERNAME_LENGTH)?,
            game_id: read_opt_string(reader, MAX_GAME_ID_LENGTH)?,
            game_name: read_opt_string(reader, MAX_GAME_NAME_LENGTH)?,
            tx_seq: u64::read(reader)?,
            created_at: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Account {
    fn encode_size(&self) -> usize {
        self.balance.encode_size()
            + self.role.encode_size()
            + self.referred_by.encode_size()
            + string_encode_size(&self.username)
            + opt_string_encode_size(&self.game_id)
            + opt_string_encode_size(&self.game_name)
            + self.tx_seq.encode_size()
            + self.created_at.encode_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariants_reject_oversized_username() {
        let mut account = Account::new("a".repeat(MAX_USERNAME_LENGTH + 1), 0);
        assert!(matches!(
            account.validate_invariants(),
            Err(AccountInvariantError::UsernameTooLong { .. })
        ));
        account.username = "ok".to_string();
        assert_eq!(account.validate_invariants(), Ok(()));
    }

    #[test]
    fn role_rejects_unknown_tag() {
        let err = Role::read(&mut [7u8].as_slice()).unwrap_err();
        assert!(matches!(err, Error::InvalidEnum(7)));
    }
}
