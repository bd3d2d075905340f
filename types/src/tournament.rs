use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};

use crate::account::AccountId;
use crate::codec::{read_string, string_encode_size, write_string};
use crate::constants::{MAX_GAME_ID_LENGTH, MAX_GAME_NAME_LENGTH, MAX_TOURNAMENT_NAME_LENGTH};

/// Tournament master record.
///
/// Result submission needs this to distinguish an unknown tournament
/// (`NotFound`) from a participant that simply has no baseline yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tournament {
    pub name: String,
    pub entry_fee: i64,
    pub created_at: u64,
}

impl Write for Tournament {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.name, writer);
        self.entry_fee.write(writer);
        self.created_at.write(writer);
    }
}

impl Read for Tournament {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            name: read_string(reader, MAX_TOURNAMENT_NAME_LENGTH)?,
            entry_fee: i64::read(reader)?,
            created_at: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Tournament {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.name)
            + self.entry_fee.encode_size()
            + self.created_at.encode_size()
    }
}

/// How a match participant maps onto a platform account.
///
/// Prize money can only be credited to a `Linked` participant. `Unlinked`
/// carries the in-game identifier only, so call sites cannot reach an
/// account id for it and prize eligibility is enforced by construction
/// instead of scattered null checks. Kill edits remain valid either way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParticipantIdentity {
    Linked(AccountId),
    Unlinked(String),
}

impl ParticipantIdentity {
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            ParticipantIdentity::Linked(account) => Some(account),
            ParticipantIdentity::Unlinked(_) => None,
        }
    }
}

impl Write for ParticipantIdentity {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            ParticipantIdentity::Linked(account) => {
                0u8.write(writer);
                account.write(writer);
            }
            ParticipantIdentity::Unlinked(game_id) => {
                1u8.write(writer);
                write_string(game_id, writer);
            }
        }
    }
}

impl Read for ParticipantIdentity {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(ParticipantIdentity::Linked(AccountId::read(reader)?)),
            1 => Ok(ParticipantIdentity::Unlinked(read_string(
                reader,
                MAX_GAME_ID_LENGTH,
            )?)),
            tag => Err(Error::InvalidEnum(tag)),
        }
    }
}

impl EncodeSize for ParticipantIdentity {
    fn encode_size(&self) -> usize {
        1 + match self {
            ParticipantIdentity::Linked(account) => account.encode_size(),
            ParticipantIdentity::Unlinked(game_id) => string_encode_size(game_id),
        }
    }
}

/// Per-tournament participant baseline, keyed by (tournament id, in-game
/// identifier) in the store.
///
/// `kills` and `prize` hold the most recently recorded values; result saves
/// diff against them and apply only the delta.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchParticipant {
    pub game_name: String,
    pub identity: ParticipantIdentity,
    pub kills: u32,
    pub prize: i64,
    pub joined_at: u64,
}

impl MatchParticipant {
    pub fn new(game_name: impl Into<String>, identity: ParticipantIdentity, joined_at: u64) -> Self {
        Self {
            game_name: game_name.into(),
            identity,
            kills: 0,
            prize: 0,
            joined_at,
        }
    }
}

impl Write for MatchParticipant {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.game_name, writer);
        self.identity.write(writer);
        self.kills.write(writer);
        self.prize.write(writer);
        self.joined_at.write(writer);
    }
}

impl Read for MatchParticipant {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            game_name: read_string(reader, MAX_GAME_NAME_LENGTH)?,
            identity: ParticipantIdentity::read(reader)?,
            kills: u32::read(reader)?,
            prize: i64::read(reader)?,
            joined_at: u64::read(reader)?,
        })
    }
}

impl EncodeSize for MatchParticipant {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.game_name)
            + self.identity.encode_size()
            + self.kills.encode_size()
            + self.prize.encode_size()
            + self.joined_at.encode_size()
    }
}

/// Running kill total across every match ever recorded for an in-game
/// identifier. Invariant: equals the sum of all deltas applied for the key.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct LeaderboardAggregate {
    pub kills: u64,
    pub updated_at: u64,
}

impl Write for LeaderboardAggregate {
    fn write(&self, writer: &mut impl BufMut) {
        self.kills.write(writer);
        self.updated_at.write(writer);
    }
}

impl Read for LeaderboardAggregate {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            kills: u64::read(reader)?,
            updated_at: u64::read(reader)?,
        })
    }
}

impl EncodeSize for LeaderboardAggregate {
    fn encode_size(&self) -> usize {
        self.kills.encode_size() + self.updated_at.encode_size()
    }
}
