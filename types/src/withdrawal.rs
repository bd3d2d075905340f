use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};

use crate::account::AccountId;
use crate::ledger::TxId;

/// Withdrawal lifecycle. A request leaves `Pending` exactly once; both
/// terminal states are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }
}

/// Admin decision on a pending withdrawal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WithdrawalDecision {
    Approve,
    Reject,
}

/// A user's request to withdraw funds.
///
/// Created by the user-facing flow together with a `WithdrawalHold` ledger
/// row reserving the amount; resolved exactly once by an admin action.
/// `fee_recipient`/`fee_amount` are recorded at approval so a duplicate
/// resolution can return the original outcome without re-applying it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawalRequest {
    pub id: u64,
    pub account: AccountId,
    pub amount: i64,
    pub status: WithdrawalStatus,
    /// The `WithdrawalHold` ledger row reserving `amount`.
    pub hold: TxId,
    pub created_at: u64,
    pub resolved_at: Option<u64>,
    pub fee_recipient: Option<AccountId>,
    pub fee_amount: i64,
}

impl Write for WithdrawalStatus {
    fn write(&self, writer: &mut impl BufMut) {
        let tag: u8 = match self {
            WithdrawalStatus::Pending => 0,
            WithdrawalStatus::Approved => 1,
            WithdrawalStatus::Rejected => 2,
        };
        tag.write(writer);
    }
}

impl Read for WithdrawalStatus {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(WithdrawalStatus::Pending),
            1 => Ok(WithdrawalStatus::Approved),
            2 => Ok(WithdrawalStatus::Rejected),
            tag => Err(Error::InvalidEnum(tag)),
        }
    }
}

impl EncodeSize for WithdrawalStatus {
    fn encode_size(&self) -> usize {
        1
    }
}

impl Write for WithdrawalRequest {
    fn write(&self, writer: &mut impl BufMut) {
        self.id.write(writer);
        self.account.write(writer);
        self.amount.write(writer);
        self.status.write(writer);
        self.hold.write(writer);
        self.created_at.write(writer);
        self.resolved_at.write(writer);
        self.fee_recipient.write(writer);
        self.fee_amount.write(writer);
    }
}

impl Read for WithdrawalRequest {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: u64::read(reader)?,
            account: AccountId::read(reader)?,
            amount: i64::read(reader)?,
            status: WithdrawalStatus::read(reader)?,
            hold: TxId::read(reader)?,
            created_at: u64::read(reader)?,
            resolved_at: Option::<u64>::read(reader)?,
            fee_recipient: Option::<AccountId>::read(reader)?,
            fee_amount: i64::read(reader)?,
        })
    }
}

impl EncodeSize for WithdrawalRequest {
    fn encode_size(&self) -> usize {
        self.id.encode_size()
            + self.account.encode_size()
            + self.amount.encode_size()
            + self.status.encode_size()
            + self.hold.encode_size()
            + self.created_at.encode_size()
            + self.resolved_at.encode_size()
            + self.fee_recipient.encode_size()
            + self.fee_amount.encode_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!WithdrawalStatus::Pending.is_terminal());
        assert!(WithdrawalStatus::Approved.is_terminal());
        assert!(WithdrawalStatus::Rejected.is_terminal());
    }
}
