use scrimbase_types::{
    EngineError, Key, LeaderboardAggregate, MatchParticipant, ParticipantIdentity, Tournament,
    TxId, TxKind, TxRef, TxStatus, Value, MAX_GAME_ID_LENGTH, MAX_TOURNAMENT_NAME_LENGTH,
};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::engine::Engine;
use crate::identity::JoinMember;
use crate::ledger::Overdraft;
use crate::store::{Store, StoreError};
use crate::txn::Txn;

/// Outcome of a result save. Deltas are what was actually applied; zero
/// deltas mean the save was an idempotent replay with no writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultOutcome {
    pub kill_delta: i64,
    pub kills: u32,
    pub prize_delta: Option<i64>,
    pub prize: Option<i64>,
    /// Ledger row appended for a non-zero prize delta.
    pub prize_row: Option<TxId>,
}

impl<S: Store, C: Clock> Engine<S, C> {
    /// Create a tournament master record.
    pub async fn create_tournament(
        &self,
        tournament_id: u64,
        name: &str,
        entry_fee: i64,
    ) -> Result<(), EngineError> {
        if name.is_empty() || name.len() > MAX_TOURNAMENT_NAME_LENGTH {
            return Err(EngineError::Invalid(format!(
                "tournament name must be 1..={MAX_TOURNAMENT_NAME_LENGTH} bytes"
            )));
        }
        if entry_fee < 0 {
            return Err(EngineError::Invalid(format!(
                "entry fee must be non-negative, got {entry_fee}"
            )));
        }
        for _ in 0..self.config.cas_retry_limit {
            let mut txn = self.begin();
            if txn.get(&Key::Tournament(tournament_id)).await?.is_some() {
                return Err(EngineError::Invalid(format!(
                    "tournament {tournament_id} already exists"
                )));
            }
            txn.insert(
                Key::Tournament(tournament_id),
                Value::Tournament(Tournament {
                    name: name.to_string(),
                    entry_fee,
                    created_at: self.now_ms(),
                }),
            );
            match txn.commit().await {
                Ok(()) => {
                    info!(tournament = tournament_id, name, entry_fee, "tournament created");
                    return Ok(());
                }
                Err(StoreError::Contention { key }) => {
                    debug!(tournament = tournament_id, %key, "contended create; retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::Conflict(format!(
            "contended creation of tournament {tournament_id}"
        )))
    }

    /// Register a team's members for a tournament.
    ///
    /// Each member is resolved and gets a zeroed baseline record; members
    /// already on the roster are left untouched. The entry fee is charged to
    /// the joining account once per join that adds at least one new
    /// participant, all in a single atomic commit.
    pub async fn join_tournament(
        &self,
        tournament_id: u64,
        members: &[JoinMember],
    ) -> Result<Vec<ParticipantIdentity>, EngineError> {
        if members.is_empty() {
            return Err(EngineError::Invalid(
                "join requires at least one member".to_string(),
            ));
        }
        for member in members {
            if member.game_id.is_empty() || member.game_id.len() > MAX_GAME_ID_LENGTH {
                return Err(EngineError::Invalid(format!(
                    "in-game id must be 1..={MAX_GAME_ID_LENGTH} bytes"
                )));
            }
        }
        for _ in 0..self.config.cas_retry_limit {
            let mut txn = self.begin();
            let tournament = Self::load_tournament(&mut txn, tournament_id).await?;

            let mut identities = Vec::with_capacity(members.len());
            let mut captain = None;
            let mut joined = 0usize;
            for member in members {
                if captain.is_none() {
                    captain = member.account.clone();
                }
                let identity = self.resolve_in_txn(&mut txn, member).await?;
                let key = Key::Participant {
                    tournament: tournament_id,
                    game_id: member.game_id.clone(),
                };
                if txn.get(&key).await?.is_none() {
                    let game_name = member
                        .game_name
                        .clone()
                        .unwrap_or_else(|| member.game_id.clone());
                    txn.insert(
                        key,
                        Value::Participant(MatchParticipant::new(
                            game_name,
                            identity.clone(),
                            self.now_ms(),
                        )),
                    );
                    joined += 1;
                }
                identities.push(identity);
            }

            if joined > 0 && tournament.entry_fee > 0 {
                let Some(captain) = captain else {
                    return Err(EngineError::Invalid(
                        "no joining account to charge the entry fee".to_string(),
                    ));
                };
                let mut account = Self::load_account(&mut txn, &captain).await?;
                self.stage_adjustment(
                    &mut txn,
                    &captain,
                    &mut account,
                    -tournament.entry_fee,
                    TxKind::EntryFee,
                    TxStatus::Completed,
                    format!("entry fee for tournament {tournament_id}"),
                    Some(TxRef::Tournament(tournament_id)),
                    Overdraft::Deny,
                )?;
            }

            match txn.commit().await {
                Ok(()) => {
                    info!(tournament = tournament_id, joined, "team joined");
                    return Ok(identities);
                }
                Err(StoreError::Contention { key }) => {
                    debug!(tournament = tournament_id, %key, "contended join; retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::Conflict(format!(
            "contended join of tournament {tournament_id}"
        )))
    }

    /// Save a participant's kill count for one tournament.
    pub async fn apply_kills(
        &self,
        tournament_id: u64,
        game_id: &str,
        kills: i64,
    ) -> Result<ResultOutcome, EngineError> {
        self.submit_result_inner(tournament_id, game_id, Some(kills), None)
            .await
    }

    /// Save a participant's prize amount for one tournament.
    pub async fn apply_prize(
        &self,
        tournament_id: u64,
        game_id: &str,
        prize: i64,
    ) -> Result<ResultOutcome, EngineError> {
        self.submit_result_inner(tournament_id, game_id, None, Some(prize))
            .await
    }

    /// Save a participant's kill count and (optionally) prize amount for one
    /// tournament.
    ///
    /// Both edits are diffed against the stored baseline and applied as
    /// deltas in a single atomic commit: the leaderboard aggregate is
    /// incremented (never set), the prize delta lands on the linked account
    /// with one `Prize` ledger row, and the baseline moves to the new
    /// values. Re-saving unchanged values writes nothing.
    pub async fn submit_match_result(
        &self,
        tournament_id: u64,
        game_id: &str,
        kills: i64,
        prize: Option<i64>,
    ) -> Result<ResultOutcome, EngineError> {
        self.submit_result_inner(tournament_id, game_id, Some(kills), prize)
            .await
    }

    async fn submit_result_inner(
        &self,
        tournament_id: u64,
        game_id: &str,
        kills: Option<i64>,
        prize: Option<i64>,
    ) -> Result<ResultOutcome, EngineError> {
        if game_id.is_empty() || game_id.len() > MAX_GAME_ID_LENGTH {
            return Err(EngineError::Invalid(format!(
                "in-game id must be 1..={MAX_GAME_ID_LENGTH} bytes"
            )));
        }
        let new_kills = match kills {
            Some(kills) if kills < 0 || kills > u32::MAX as i64 => {
                return Err(EngineError::Invalid(format!(
                    "kill count must be a non-negative integer, got {kills}"
                )));
            }
            Some(kills) => Some(kills as u32),
            None => None,
        };

        for _ in 0..self.config.cas_retry_limit {
            let mut txn = self.begin();
            Self::load_tournament(&mut txn, tournament_id).await?;

            let participant_key = Key::Participant {
                tournament: tournament_id,
                game_id: game_id.to_string(),
            };
            let mut participant = match txn.get(&participant_key).await? {
                Some(Value::Participant(participant)) => participant,
                _ => {
                    // First save for this participant: attach linkage now.
                    let member = JoinMember {
                        account: None,
                        game_id: game_id.to_string(),
                        game_name: None,
                        username: None,
                    };
                    let identity = self.resolve_in_txn(&mut txn, &member).await?;
                    MatchParticipant::new(game_id.to_string(), identity, self.now_ms())
                }
            };

            let new_kills = new_kills.unwrap_or(participant.kills);
            let kill_delta = new_kills as i64 - participant.kills as i64;
            let mut prize_delta = None;
            let mut prize_row = None;

            if let Some(new_prize) = prize {
                let delta = new_prize
                    .checked_sub(participant.prize)
                    .ok_or_else(|| EngineError::Invalid("prize delta overflow".to_string()))?;
                if delta != 0 {
                    let account_id = match &participant.identity {
                        ParticipantIdentity::Linked(account) => account.clone(),
                        ParticipantIdentity::Unlinked(game_id) => {
                            return Err(EngineError::Invalid(format!(
                                "prize edit on unlinked participant {game_id}"
                            )));
                        }
                    };
                    let mut account = Self::load_account(&mut txn, &account_id).await?;
                    let description = if account.balance.saturating_add(delta) < 0 {
                        format!(
                            "prize correction for tournament {tournament_id} (overdraws balance)"
                        )
                    } else {
                        format!("prize for tournament {tournament_id}")
                    };
                    let row = self.stage_adjustment(
                        &mut txn,
                        &account_id,
                        &mut account,
                        delta,
                        TxKind::Prize,
                        TxStatus::Completed,
                        description,
                        Some(TxRef::Tournament(tournament_id)),
                        Overdraft::Allow,
                    )?;
                    participant.prize = new_prize;
                    prize_row = Some(row);
                }
                prize_delta = Some(delta);
            }

            if kill_delta == 0 && prize_delta.unwrap_or(0) == 0 {
                // Unchanged resubmission: nothing to write, nothing to retry.
                return Ok(ResultOutcome {
                    kill_delta: 0,
                    kills: new_kills,
                    prize_delta,
                    prize,
                    prize_row: None,
                });
            }

            if kill_delta != 0 {
                let mut aggregate = match txn.get(&Key::Leaderboard(game_id.to_string())).await? {
                    Some(Value::Leaderboard(aggregate)) => aggregate,
                    _ => LeaderboardAggregate::default(),
                };
                aggregate.kills = aggregate.kills.checked_add_signed(kill_delta).ok_or_else(
                    || {
                        EngineError::Invalid(format!(
                            "leaderboard aggregate underflow for {game_id}"
                        ))
                    },
                )?;
                aggregate.updated_at = self.now_ms();
                txn.insert(
                    Key::Leaderboard(game_id.to_string()),
                    Value::Leaderboard(aggregate),
                );
                participant.kills = new_kills;
            }

            txn.insert(participant_key, Value::Participant(participant.clone()));

            let outcome = ResultOutcome {
                kill_delta,
                kills: new_kills,
                prize_delta,
                prize: prize.map(|_| participant.prize),
                prize_row,
            };
            match txn.commit().await {
                Ok(()) => {
                    info!(
                        tournament = tournament_id,
                        game_id,
                        kill_delta,
                        prize_delta = ?prize_delta,
                        "result saved"
                    );
                    return Ok(outcome);
                }
                Err(StoreError::Contention { key }) => {
                    debug!(tournament = tournament_id, game_id, %key, "contended result save; retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::Conflict(format!(
            "contended result save for tournament {tournament_id}, participant {game_id}"
        )))
    }

    /// Fetch the running kill total for an in-game identifier.
    pub async fn leaderboard(&self, game_id: &str) -> Result<LeaderboardAggregate, EngineError> {
        let mut txn = self.begin();
        match txn.get(&Key::Leaderboard(game_id.to_string())).await? {
            Some(Value::Leaderboard(aggregate)) => Ok(aggregate),
            Some(_) => Err(EngineError::Unavailable(format!(
                "corrupt record under leaderboard key {game_id}"
            ))),
            None => Err(EngineError::NotFound(format!(
                "leaderboard entry {game_id}"
            ))),
        }
    }

    pub(crate) async fn load_tournament(
        txn: &mut Txn<'_, S>,
        tournament_id: u64,
    ) -> Result<Tournament, EngineError> {
        match txn.get(&Key::Tournament(tournament_id)).await? {
            Some(Value::Tournament(tournament)) => Ok(tournament),
            Some(_) => Err(EngineError::Unavailable(format!(
                "corrupt record under tournament key {tournament_id}"
            ))),
            None => Err(EngineError::NotFound(format!(
                "tournament {tournament_id}"
            ))),
        }
    }
}
