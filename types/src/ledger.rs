use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};

use crate::account::AccountId;
use crate::codec::{read_string, string_encode_size, write_string};
use crate::constants::MAX_DESCRIPTION_LENGTH;

/// Ledger row kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxKind {
    /// Debit charged when a team joins a tournament.
    EntryFee,
    /// Signed prize delta from a result save (negative = correction of an
    /// earlier over-award).
    Prize,
    /// Funds reserved for a pending withdrawal.
    WithdrawalHold,
    /// Marker on the request when an approved hold is finalized.
    WithdrawalSettle,
    /// Credit returning a rejected withdrawal's held funds.
    WithdrawalRefund,
    /// Withdrawal fee credited to a delegate or the platform sink.
    FeePayout,
    /// Manual back-office balance adjustment (top-up or correction).
    Adjustment,
}

/// Lifecycle status of a ledger row.
///
/// Rows are append-only; the only permitted in-place transition is
/// `OnHold -> Completed | Refunded`, driven by withdrawal resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    OnHold,
    Completed,
    Refunded,
}

/// Optional link from a ledger row to the record that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxRef {
    Tournament(u64),
    Withdrawal(u64),
}

/// Identifier of one ledger row: the owning account plus its per-account
/// sequence number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxId {
    pub account: AccountId,
    pub seq: u64,
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.account, self.seq)
    }
}

/// One row of the append-only wallet ledger.
///
/// Every applied balance change appends exactly one row carrying the signed
/// delta, in the same atomic commit, so summing `amount` over an account's
/// rows recomputes its cached balance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub seq: u64,
    pub account: AccountId,
    pub amount: i64,
    pub kind: TxKind,
    pub status: TxStatus,
    pub created_at: u64,
    pub description: String,
    pub reference: Option<TxRef>,
}

impl LedgerTransaction {
    pub fn id(&self) -> TxId {
        TxId {
            account: self.account.clone(),
            seq: self.seq,
        }
    }
}

impl Write for TxKind {
    fn write(&self, writer: &mut impl BufMut) {
        let tag: u8 = match self {
            TxKind::EntryFee => 0,
            TxKind::Prize => 1,
            TxKind::WithdrawalHold => 2,
            TxKind::WithdrawalSettle => 3,
            TxKind::WithdrawalRefund => 4,
            TxKind::FeePayout => 5,
            TxKind::Adjustment => 6,
        };
        tag.write(writer);
    }
}

impl Read for TxKind {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(TxKind::EntryFee),
            1 => Ok(TxKind::Prize),
            2 => Ok(TxKind::WithdrawalHold),
            3 => Ok(TxKind::WithdrawalSettle),
            4 => Ok(TxKind::WithdrawalRefund),
            5 => Ok(TxKind::FeePayout),
            6 => Ok(TxKind::Adjustment),
            tag => Err(Error::InvalidEnum(tag)),
        }
    }
}

impl EncodeSize for TxKind {
    fn encode_size(&self) -> usize {
        1
    }
}

impl Write for TxStatus {
    fn write(&self, writer: &mut impl BufMut) {
        let tag: u8 = match self {
            TxStatus::Pending => 0,
            TxStatus::OnHold => 1,
            TxStatus::Completed => 2,
            TxStatus::Refunded => 3,
        };
        tag.write(writer);
    }
}

impl Read for TxStatus {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(TxStatus::Pending),
            1 => Ok(TxStatus::OnHold),
            2 => Ok(TxStatus::Completed),
            3 => Ok(TxStatus::Refunded),
            tag => Err(Error::InvalidEnum(tag)),
        }
    }
}

impl EncodeSize for TxStatus {
    fn encode_size(&self) -> usize {
        1
    }
}

impl Write for TxRef {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            TxRef::Tournament(id) => {
                0u8.write(writer);
                id.write(writer);
            }
            TxRef::Withdrawal(id) => {
                1u8.write(writer);
                id.write(writer);
            }
        }
    }
}

impl Read for TxRef {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(TxRef::Tournament(u64::read(reader)?)),
            1 => Ok(TxRef::Withdrawal(u64::read(reader)?)),
            tag => Err(Error::InvalidEnum(tag)),
        }
    }
}

impl EncodeSize for TxRef {
    fn encode_size(&self) -> usize {
        1 + match self {
            TxRef::Tournament(id) => id.encode_size(),
            TxRef::Withdrawal(id) => id.encode_size(),
        }
    }
}

impl Write for TxId {
    fn write(&self, writer: &mut impl BufMut) {
        self.account.write(writer);
        self.seq.write(writer);
    }
}

impl Read for TxId {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            account: AccountId::read(reader)?,
            seq: u64::read(reader)?,
        })
    }
}

impl EncodeSize for TxId {
    fn encode_size(&self) -> usize {
        self.account.encode_size() + self.seq.encode_size()
    }
}

impl Write for LedgerTransaction {
    fn write(&self, writer: &mut impl BufMut) {
        self.seq.write(writer);
        self.account.write(writer);
        self.amount.write(writer);
        self.kind.write(writer);
        self.status.write(writer);
        self.created_at.write(writer);
        write_string(&self.description, writer);
        self.reference.write(writer);
    }
}

impl Read for LedgerTransaction {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            seq: u64::read(reader)?,
            account: AccountId::read(reader)?,
            amount: i64::read(reader)?,
            kind: TxKind::read(reader)?,
            status: TxStatus::read(reader)?,
            created_at: u64::read(reader)?,
            description: read_string(reader, MAX_DESCRIPTION_LENGTH)?,
            reference: Option::<TxRef>::read(reader)?,
        })
    }
}

impl EncodeSize for LedgerTransaction {
    fn encode_size(&self) -> usize {
        self.seq.encode_size()
            + self.account.encode_size()
            + self.amount.encode_size()
            + self.kind.encode_size()
            + self.status.encode_size()
            + self.created_at.encode_size()
            + string_encode_size(&self.description)
            + self.reference.encode_size()
    }
}
