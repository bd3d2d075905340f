use scrimbase_types::{Account, AccountId, EngineError, Key, ParticipantIdentity, Value};
use tracing::debug;

use crate::clock::Clock;
use crate::engine::Engine;
use crate::store::{Store, StoreError};
use crate::txn::Txn;

/// One member of a tournament join record, as captured by the join flow.
///
/// `account` is set only for the member who performed the join (the team
/// captain); everyone else is matched through the resolver's fallback chain.
#[derive(Clone, Debug, Default)]
pub struct JoinMember {
    pub account: Option<AccountId>,
    pub game_id: String,
    pub game_name: Option<String>,
    pub username: Option<String>,
}

impl<S: Store, C: Clock> Engine<S, C> {
    /// Resolve a join record to a platform account.
    ///
    /// Resolution order: known joining account id, stored in-game
    /// identifier, exact in-game name, exact platform username. First match
    /// wins; an index row whose target account has been deleted falls
    /// through to the next rule. No match yields `Unlinked`: kill edits
    /// still apply for such a participant, prize edits are rejected.
    pub async fn resolve_participant(
        &self,
        member: &JoinMember,
    ) -> Result<ParticipantIdentity, EngineError> {
        let mut txn = self.begin();
        self.resolve_in_txn(&mut txn, member).await
    }

    pub(crate) async fn resolve_in_txn(
        &self,
        txn: &mut Txn<'_, S>,
        member: &JoinMember,
    ) -> Result<ParticipantIdentity, EngineError> {
        if let Some(account) = &member.account {
            return Ok(ParticipantIdentity::Linked(account.clone()));
        }

        let mut lookups = vec![Key::AccountByGameId(member.game_id.clone())];
        if let Some(game_name) = &member.game_name {
            lookups.push(Key::AccountByGameName(game_name.clone()));
        }
        if let Some(username) = &member.username {
            lookups.push(Key::AccountByUsername(username.clone()));
        }

        for key in lookups {
            let Some(Value::AccountRef(account)) = txn.get(&key).await? else {
                continue;
            };
            // Confirm the index target still exists before linking.
            if let Some(Value::Account(_)) = txn.get(&Key::Account(account.clone())).await? {
                return Ok(ParticipantIdentity::Linked(account));
            }
            debug!(?key, target = %account, "stale resolver index; falling through");
        }
        Ok(ParticipantIdentity::Unlinked(member.game_id.clone()))
    }

    /// Write an account record together with its resolver index rows in one
    /// commit, removing index rows the previous profile no longer claims.
    ///
    /// Monetary fields (`balance`, `tx_seq`) are owned by the ledger and
    /// `created_at` by the first write; all are preserved from the stored
    /// record. The rest of the profile is taken from `record`.
    pub async fn put_account(
        &self,
        account_id: &AccountId,
        record: Account,
    ) -> Result<Account, EngineError> {
        record
            .validate_invariants()
            .map_err(|err| EngineError::Invalid(err.to_string()))?;
        for _ in 0..self.config.cas_retry_limit {
            let mut txn = self.begin();
            let previous = match txn.get(&Key::Account(account_id.clone())).await? {
                Some(Value::Account(account)) => Some(account),
                _ => None,
            };

            let mut next = record.clone();
            next.created_at = previous
                .as_ref()
                .map(|previous| previous.created_at)
                .unwrap_or_else(|| self.now_ms());
            if let Some(previous) = &previous {
                next.balance = previous.balance;
                next.tx_seq = previous.tx_seq;

                if previous.game_id != next.game_id {
                    if let Some(old) = &previous.game_id {
                        txn.delete(Key::AccountByGameId(old.clone()));
                    }
                }
                if previous.game_name != next.game_name {
                    if let Some(old) = &previous.game_name {
                        txn.delete(Key::AccountByGameName(old.clone()));
                    }
                }
                if previous.username != next.username {
                    txn.delete(Key::AccountByUsername(previous.username.clone()));
                }
            }

            if let Some(game_id) = &next.game_id {
                txn.insert(
                    Key::AccountByGameId(game_id.clone()),
                    Value::AccountRef(account_id.clone()),
                );
            }
            if let Some(game_name) = &next.game_name {
                txn.insert(
                    Key::AccountByGameName(game_name.clone()),
                    Value::AccountRef(account_id.clone()),
                );
            }
            txn.insert(
                Key::AccountByUsername(next.username.clone()),
                Value::AccountRef(account_id.clone()),
            );
            txn.insert(
                Key::Account(account_id.clone()),
                Value::Account(next.clone()),
            );

            match txn.commit().await {
                Ok(()) => return Ok(next),
                Err(StoreError::Contention { key }) => {
                    debug!(account = %account_id, %key, "contended profile write; retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::Conflict(format!(
            "contended profile write on account {account_id}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{seed_account, test_engine};
    use crate::store::Status;

    fn member(game_id: &str) -> JoinMember {
        JoinMember {
            account: None,
            game_id: game_id.to_string(),
            game_name: None,
            username: None,
        }
    }

    #[tokio::test]
    async fn known_account_wins_over_every_index() {
        let engine = test_engine();
        seed_account(&engine, "acct-indexed", |account| {
            account.game_id = Some("ign-1".to_string());
        })
        .await;

        let captain = JoinMember {
            account: Some(AccountId::from("acct-captain")),
            game_id: "ign-1".to_string(),
            ..Default::default()
        };
        let identity = engine
            .resolve_participant(&captain)
            .await
            .expect("resolve");
        assert_eq!(
            identity,
            ParticipantIdentity::Linked(AccountId::from("acct-captain"))
        );
    }

    #[tokio::test]
    async fn fallback_order_is_game_id_then_name_then_username() {
        let engine = test_engine();
        seed_account(&engine, "acct-by-game-id", |account| {
            account.game_id = Some("ign-1".to_string());
        })
        .await;
        seed_account(&engine, "acct-by-name", |account| {
            account.game_name = Some("ShadowStrike".to_string());
        })
        .await;
        seed_account(&engine, "acct-by-username", |account| {
            account.username = "shadow".to_string();
        })
        .await;

        let full = JoinMember {
            account: None,
            game_id: "ign-1".to_string(),
            game_name: Some("ShadowStrike".to_string()),
            username: Some("shadow".to_string()),
        };
        assert_eq!(
            engine.resolve_participant(&full).await.expect("resolve"),
            ParticipantIdentity::Linked(AccountId::from("acct-by-game-id"))
        );

        let no_game_id = JoinMember {
            game_id: "ign-unknown".to_string(),
            ..full.clone()
        };
        assert_eq!(
            engine
                .resolve_participant(&no_game_id)
                .await
                .expect("resolve"),
            ParticipantIdentity::Linked(AccountId::from("acct-by-name"))
        );

        let username_only = JoinMember {
            account: None,
            game_id: "ign-unknown".to_string(),
            game_name: None,
            username: Some("shadow".to_string()),
        };
        assert_eq!(
            engine
                .resolve_participant(&username_only)
                .await
                .expect("resolve"),
            ParticipantIdentity::Linked(AccountId::from("acct-by-username"))
        );

        assert_eq!(
            engine
                .resolve_participant(&member("ign-unknown"))
                .await
                .expect("resolve"),
            ParticipantIdentity::Unlinked("ign-unknown".to_string())
        );
    }

    #[tokio::test]
    async fn stale_index_rows_fall_through() {
        let engine = test_engine();
        let gone = seed_account(&engine, "acct-gone", |account| {
            account.game_id = Some("ign-9".to_string());
        })
        .await;
        seed_account(&engine, "acct-alive", |account| {
            account.username = "survivor".to_string();
        })
        .await;

        // Delete the account but leave its index row behind.
        engine
            .store()
            .commit(vec![], vec![(Key::Account(gone), Status::Delete)])
            .await
            .expect("delete account");

        let orphan = JoinMember {
            account: None,
            game_id: "ign-9".to_string(),
            game_name: None,
            username: Some("survivor".to_string()),
        };
        assert_eq!(
            engine.resolve_participant(&orphan).await.expect("resolve"),
            ParticipantIdentity::Linked(AccountId::from("acct-alive"))
        );
    }

    #[tokio::test]
    async fn put_account_moves_indexes_and_keeps_money_fields() {
        let engine = test_engine();
        let id = seed_account(&engine, "acct-move", |account| {
            account.balance = 750;
            account.game_id = Some("ign-old".to_string());
        })
        .await;

        let mut update = engine.account(&id).await.expect("account");
        update.game_id = Some("ign-new".to_string());
        update.balance = 0; // must be ignored
        let stored = engine.put_account(&id, update).await.expect("put");
        assert_eq!(stored.balance, 750);

        assert_eq!(
            engine
                .resolve_participant(&member("ign-new"))
                .await
                .expect("resolve"),
            ParticipantIdentity::Linked(id)
        );
        assert_eq!(
            engine
                .resolve_participant(&member("ign-old"))
                .await
                .expect("resolve"),
            ParticipantIdentity::Unlinked("ign-old".to_string())
        );
    }
}
