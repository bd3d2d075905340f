use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};

use crate::account::{Account, AccountId};
use crate::codec::{read_string, string_encode_size, write_string};
use crate::constants::{MAX_GAME_ID_LENGTH, MAX_GAME_NAME_LENGTH, MAX_USERNAME_LENGTH};
use crate::ledger::LedgerTransaction;
use crate::tournament::{LeaderboardAggregate, MatchParticipant, Tournament};
use crate::withdrawal::WithdrawalRequest;

/// Store keys for every record the engine reads or writes.
///
/// The `AccountBy*` keys are single-row resolver indexes maintained
/// alongside the account record, so identity fallback lookups stay single
/// reads on a key-value store.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Account(AccountId),
    AccountByGameId(String),
    AccountByGameName(String),
    AccountByUsername(String),
    Ledger(AccountId, u64),
    Tournament(u64),
    Participant { tournament: u64, game_id: String },
    Leaderboard(String),
    Withdrawal(u64),
    WithdrawalSeq,
}

/// Record values, tagged to match [`Key`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Value {
    Account(Account),
    AccountRef(AccountId),
    Ledger(LedgerTransaction),
    Tournament(Tournament),
    Participant(MatchParticipant),
    Leaderboard(LeaderboardAggregate),
    Withdrawal(WithdrawalRequest),
    Seq(u64),
}

impl Write for Key {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Key::Account(account) => {
                0u8.write(writer);
                account.write(writer);
            }
            Key::AccountByGameId(game_id) => {
                1u8.write(writer);
                write_string(game_id, writer);
            }
            Key::AccountByGameName(game_name) => {
                2u8.write(writer);
                write_string(game_name, writer);
            }
            Key::AccountByUsername(username) => {
                3u8.write(writer);
                write_string(username, writer);
            }
            Key::Ledger(account, seq) => {
                4u8.write(writer);
                account.write(writer);
                seq.write(writer);
            }
            Key::Tournament(id) => {
                5u8.write(writer);
                id.write(writer);
            }
            Key::Participant { tournament, game_id } => {
                6u8.write(writer);
                tournament.write(writer);
                write_string(game_id, writer);
            }
            Key::Leaderboard(game_id) => {
                7u8.write(writer);
                write_string(game_id, writer);
            }
            Key::Withdrawal(id) => {
                8u8.write(writer);
                id.write(writer);
            }
            Key::WithdrawalSeq => 9u8.write(writer),
        }
    }
}

impl Read for Key {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Key::Account(AccountId::read(reader)?)),
            1 => Ok(Key::AccountByGameId(read_string(reader, MAX_GAME_ID_LENGTH)?)),
            2 => Ok(Key::AccountByGameName(read_string(
                reader,
                MAX_GAME_NAME_LENGTH,
            )?)),
            3 => Ok(Key::AccountByUsername(read_string(
                reader,
                MAX_USERNAME_LENGTH,
            )?)),
            4 => Ok(Key::Ledger(AccountId::read(reader)?, u64::read(reader)?)),
            5 => Ok(Key::Tournament(u64::read(reader)?)),
            6 => Ok(Key::Participant {
                tournament: u64::read(reader)?,
                game_id: read_string(reader, MAX_GAME_ID_LENGTH)?,
            }),
            7 => Ok(Key::Leaderboard(read_string(reader, MAX_GAME_ID_LENGTH)?)),
            8 => Ok(Key::Withdrawal(u64::read(reader)?)),
            9 => Ok(Key::WithdrawalSeq),
            tag => Err(Error::InvalidEnum(tag)),
        }
    }
}

impl EncodeSize for Key {
    fn encode_size(&self) -> usize {
        1 + match self {
            Key::Account(account) => account.encode_size(),
            Key::AccountByGameId(game_id) => string_encode_size(game_id),
            Key::AccountByGameName(game_name) => string_encode_size(game_name),
            Key::AccountByUsername(username) => string_encode_size(username),
            Key::Ledger(account, seq) => account.encode_size() + seq.encode_size(),
            Key::Tournament(id) => id.encode_size(),
            Key::Participant { tournament, game_id } => {
                tournament.encode_size() + string_encode_size(game_id)
            }
            Key::Leaderboard(game_id) => string_encode_size(game_id),
            Key::Withdrawal(id) => id.encode_size(),
            Key::WithdrawalSeq => 0,
        }
    }
}

impl Write for Value {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Value::Account(account) => {
                0u8.write(writer);
                account.write(writer);
            }
            Value::AccountRef(account) => {
                1u8.write(writer);
                account.write(writer);
            }
            Value::Ledger(transaction) => {
                2u8.write(writer);
                transaction.write(writer);
            }
            Value::Tournament(tournament) => {
                3u8.write(writer);
                tournament.write(writer);
            }
            Value::Participant(participant) => {
                4u8.write(writer);
                participant.write(writer);
            }
            Value::Leaderboard(aggregate) => {
                5u8.write(writer);
                aggregate.write(writer);
            }
            Value::Withdrawal(request) => {
                6u8.write(writer);
                request.write(writer);
            }
            Value::Seq(seq) => {
                7u8.write(writer);
                seq.write(writer);
            }
        }
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Value::Account(Account::read(reader)?)),
            1 => Ok(Value::AccountRef(AccountId::read(reader)?)),
            2 => Ok(Value::Ledger(LedgerTransaction::read(reader)?)),
            3 => Ok(Value::Tournament(Tournament::read(reader)?)),
            4 => Ok(Value::Participant(MatchParticipant::read(reader)?)),
            5 => Ok(Value::Leaderboard(LeaderboardAggregate::read(reader)?)),
            6 => Ok(Value::Withdrawal(WithdrawalRequest::read(reader)?)),
            7 => Ok(Value::Seq(u64::read(reader)?)),
            tag => Err(Error::InvalidEnum(tag)),
        }
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        1 + match self {
            Value::Account(account) => account.encode_size(),
            Value::AccountRef(account) => account.encode_size(),
            Value::Ledger(transaction) => transaction.encode_size(),
            Value::Tournament(tournament) => tournament.encode_size(),
            Value::Participant(participant) => participant.encode_size(),
            Value::Leaderboard(aggregate) => aggregate.encode_size(),
            Value::Withdrawal(request) => request.encode_size(),
            Value::Seq(seq) => seq.encode_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{DecodeExt, Encode};

    #[test]
    fn ledger_key_orders_by_account_then_seq() {
        let a0 = Key::Ledger(AccountId::from("acct-a"), 0);
        let a1 = Key::Ledger(AccountId::from("acct-a"), 1);
        let b0 = Key::Ledger(AccountId::from("acct-b"), 0);
        assert!(a0 < a1);
        assert!(a1 < b0);
    }

    #[test]
    fn participant_key_survives_codec() {
        let key = Key::Participant {
            tournament: 42,
            game_id: "ign-77".to_string(),
        };
        let decoded = Key::decode(&mut key.encode().as_ref()).expect("decode key");
        assert_eq!(decoded, key);
    }
}
