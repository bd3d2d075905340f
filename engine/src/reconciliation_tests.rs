//! End-to-end reconciliation properties.
//!
//! These tests drive whole admin flows (result saves, withdrawal
//! resolutions) against the in-memory store and assert the money-conserving
//! properties the engine exists for: delta commutativity, idempotent
//! replays, exactly-once fee application, and ledger/balance agreement.

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use scrimbase_types::{
        EngineError, Key, Role, TxKind, TxStatus, Value, WithdrawalDecision, WithdrawalStatus,
        CAS_RETRY_LIMIT, PLATFORM_FEE_SINK,
    };

    use crate::clock::Clock;
    use crate::engine::Engine;
    use crate::identity::JoinMember;
    use crate::mocks::{contended_engine, seed_account, test_engine, Contended, FixedClock};
    use crate::store::{Memory, Store};

    const ACE: &str = "ign-ace";

    async fn participant_baseline<S: Store, C: Clock>(
        engine: &Engine<S, C>,
        tournament: u64,
        game_id: &str,
    ) -> (u32, i64) {
        let record = engine
            .store()
            .get(&Key::Participant {
                tournament,
                game_id: game_id.to_string(),
            })
            .await
            .expect("get participant");
        match record {
            Some(versioned) => match versioned.value {
                Value::Participant(participant) => (participant.kills, participant.prize),
                other => panic!("expected participant, got {other:?}"),
            },
            None => (0, 0),
        }
    }

    #[tokio::test]
    async fn kill_edits_commute_across_interleavings() {
        // Per-tournament edit sequences for the same in-game id. Any
        // interleaving that preserves per-tournament order must converge to
        // the same aggregate: the sum of the final baselines.
        let edits: [(u64, &[i64]); 3] = [(1, &[2, 5, 3]), (2, &[4]), (3, &[7, 1, 1])];
        let expected: i64 = edits.iter().map(|(_, kills)| *kills.last().unwrap()).sum();

        for seed in [11u64, 29, 83] {
            let engine = test_engine();
            for (tournament, _) in &edits {
                engine
                    .create_tournament(*tournament, "Interleaved Cup", 0)
                    .await
                    .expect("create tournament");
            }

            let mut queues: Vec<(u64, Vec<i64>)> = edits
                .iter()
                .map(|(tournament, kills)| (*tournament, kills.to_vec()))
                .collect();
            let mut rng = StdRng::seed_from_u64(seed);
            while queues.iter().any(|(_, queue)| !queue.is_empty()) {
                let pick = rng.gen_range(0..queues.len());
                let (tournament, queue) = &mut queues[pick];
                if queue.is_empty() {
                    continue;
                }
                let kills = queue.remove(0);
                engine
                    .submit_match_result(*tournament, ACE, kills, None)
                    .await
                    .expect("submit kills");
            }

            let aggregate = engine.leaderboard(ACE).await.expect("leaderboard");
            assert_eq!(aggregate.kills as i64, expected, "seed {seed}");
        }
    }

    #[tokio::test]
    async fn resubmitting_unchanged_results_writes_nothing() {
        let engine = test_engine();
        let player = seed_account(&engine, "acct-player", |account| {
            account.game_id = Some(ACE.to_string());
        })
        .await;
        engine
            .create_tournament(1, "Replay Cup", 0)
            .await
            .expect("create tournament");

        let first = engine
            .submit_match_result(1, ACE, 5, Some(100))
            .await
            .expect("first save");
        assert_eq!(first.kill_delta, 5);
        assert_eq!(first.prize_delta, Some(100));

        let rows_after_first = engine.account(&player).await.expect("account").tx_seq;
        let aggregate_after_first = engine.leaderboard(ACE).await.expect("leaderboard");

        let replay = engine
            .submit_match_result(1, ACE, 5, Some(100))
            .await
            .expect("replayed save");
        assert_eq!(replay.kill_delta, 0);
        assert_eq!(replay.prize_delta, Some(0));
        assert_eq!(replay.prize_row, None);

        let account = engine.account(&player).await.expect("account");
        assert_eq!(account.tx_seq, rows_after_first, "no new ledger rows");
        assert_eq!(
            engine.leaderboard(ACE).await.expect("leaderboard"),
            aggregate_after_first
        );
    }

    #[tokio::test]
    async fn corrections_apply_as_signed_deltas() {
        let engine = test_engine();
        let player = seed_account(&engine, "acct-player", |account| {
            account.game_id = Some(ACE.to_string());
        })
        .await;
        engine
            .create_tournament(1, "Correction Cup", 0)
            .await
            .expect("create tournament");

        // Admin saves kills = 3, prize = 500, then corrects to 7 / 300.
        engine
            .submit_match_result(1, ACE, 3, Some(500))
            .await
            .expect("first save");
        let correction = engine
            .submit_match_result(1, ACE, 7, Some(300))
            .await
            .expect("correction");

        assert_eq!(correction.kill_delta, 4);
        assert_eq!(correction.prize_delta, Some(-200));
        assert_eq!(engine.leaderboard(ACE).await.expect("leaderboard").kills, 7);
        assert_eq!(participant_baseline(&engine, 1, ACE).await, (7, 300));

        let account = engine.account(&player).await.expect("account");
        assert_eq!(account.balance, 300);
        let rows = engine.ledger(&player).await.expect("ledger");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].amount, -200);
        assert_eq!(rows[1].kind, TxKind::Prize);
        assert_eq!(rows[1].status, TxStatus::Completed);
    }

    #[tokio::test]
    async fn prize_corrections_may_overdraw_but_are_flagged() {
        let engine = test_engine();
        let player = seed_account(&engine, "acct-player", |account| {
            account.game_id = Some(ACE.to_string());
        })
        .await;
        engine
            .create_tournament(1, "Clawback Cup", 0)
            .await
            .expect("create tournament");

        engine
            .submit_match_result(1, ACE, 0, Some(400))
            .await
            .expect("award");
        // The player already withdrew part of the award.
        engine
            .create_withdrawal(&player, 350)
            .await
            .expect("withdrawal");
        // Correcting the award down overdraws; the row says so.
        engine
            .submit_match_result(1, ACE, 0, Some(100))
            .await
            .expect("clawback");

        let account = engine.account(&player).await.expect("account");
        assert_eq!(account.balance, -250);
        let rows = engine.ledger(&player).await.expect("ledger");
        let clawback = rows.last().expect("clawback row");
        assert_eq!(clawback.amount, -300);
        assert!(clawback.description.contains("overdraws balance"));
    }

    #[tokio::test]
    async fn double_resolution_returns_the_original_outcome() {
        let engine = test_engine();
        let delegate = seed_account(&engine, "acct-delegate", |account| {
            account.role = Role::Delegate;
        })
        .await;
        let requester = seed_account(&engine, "acct-requester", |account| {
            account.referred_by = Some(scrimbase_types::AccountId::from("acct-delegate"));
        })
        .await;
        engine
            .adjust_balance(&requester, 2_000, TxKind::Adjustment, "top-up", None)
            .await
            .expect("fund");

        let request = engine
            .create_withdrawal(&requester, 1_000)
            .await
            .expect("request");

        let first = engine
            .resolve_withdrawal(request.id, WithdrawalDecision::Approve)
            .await
            .expect("approve");
        assert_eq!(first.status, WithdrawalStatus::Approved);
        assert_eq!(first.fee_amount, 50);
        assert_eq!(first.fee_recipient.as_ref(), Some(&delegate));
        assert!(!first.replayed);

        // Duplicate click with the same decision, then a conflicting one.
        let second = engine
            .resolve_withdrawal(request.id, WithdrawalDecision::Approve)
            .await
            .expect("replayed approve");
        let third = engine
            .resolve_withdrawal(request.id, WithdrawalDecision::Reject)
            .await
            .expect("replayed reject");
        for outcome in [&second, &third] {
            assert_eq!(outcome.status, WithdrawalStatus::Approved);
            assert_eq!(outcome.fee_amount, 50);
            assert_eq!(outcome.fee_recipient.as_ref(), Some(&delegate));
            assert!(outcome.replayed);
        }

        // The fee landed exactly once and the hold is finalized.
        assert_eq!(engine.account(&delegate).await.expect("account").balance, 50);
        let requester_rows = engine.ledger(&requester).await.expect("ledger");
        let hold_row = &requester_rows[request.hold.seq as usize];
        assert_eq!(hold_row.status, TxStatus::Completed);
        assert_eq!(
            engine.account(&requester).await.expect("account").balance,
            1_000
        );
    }

    #[tokio::test]
    async fn rejection_restores_the_requesters_balance() {
        let engine = test_engine();
        let requester = seed_account(&engine, "acct-requester", |_| {}).await;
        engine
            .adjust_balance(&requester, 1_500, TxKind::Adjustment, "top-up", None)
            .await
            .expect("fund");

        let request = engine
            .create_withdrawal(&requester, 1_000)
            .await
            .expect("request");
        assert_eq!(
            engine.account(&requester).await.expect("account").balance,
            500
        );

        let outcome = engine
            .resolve_withdrawal(request.id, WithdrawalDecision::Reject)
            .await
            .expect("reject");
        assert_eq!(outcome.status, WithdrawalStatus::Rejected);
        assert_eq!(outcome.fee_amount, 0);

        let account = engine.account(&requester).await.expect("account");
        assert_eq!(account.balance, 1_500, "held amount is conserved");

        let rows = engine.ledger(&requester).await.expect("ledger");
        let hold_row = &rows[request.hold.seq as usize];
        assert_eq!(hold_row.status, TxStatus::Refunded);
        let refund_row = rows.last().expect("refund row");
        assert_eq!(refund_row.kind, TxKind::WithdrawalRefund);
        assert_eq!(refund_row.amount, 1_000);
        assert!(engine
            .audit_account(&requester)
            .await
            .expect("audit")
            .consistent());
    }

    #[tokio::test]
    async fn fees_route_to_the_platform_without_an_active_delegate() {
        let engine = test_engine();
        // Referred, but the referrer lost the delegate role.
        seed_account(&engine, "acct-demoted", |account| {
            account.role = Role::User;
        })
        .await;
        let requester = seed_account(&engine, "acct-requester", |account| {
            account.referred_by = Some(scrimbase_types::AccountId::from("acct-demoted"));
        })
        .await;
        engine
            .adjust_balance(&requester, 1_000, TxKind::Adjustment, "top-up", None)
            .await
            .expect("fund");

        let request = engine
            .create_withdrawal(&requester, 1_000)
            .await
            .expect("request");
        let outcome = engine
            .resolve_withdrawal(request.id, WithdrawalDecision::Approve)
            .await
            .expect("approve");

        let sink = scrimbase_types::AccountId::from(PLATFORM_FEE_SINK);
        assert_eq!(outcome.fee_recipient.as_ref(), Some(&sink));
        // The sink was provisioned lazily and holds exactly the fee.
        let sink_account = engine.account(&sink).await.expect("sink account");
        assert_eq!(sink_account.balance, 50);
        assert_eq!(sink_account.role, Role::Admin);
        assert_eq!(
            engine
                .account(&scrimbase_types::AccountId::from("acct-demoted"))
                .await
                .expect("account")
                .balance,
            0
        );
    }

    #[tokio::test]
    async fn prize_edits_on_unlinked_participants_fail_closed() {
        let engine = test_engine();
        engine
            .create_tournament(1, "Open Cup", 0)
            .await
            .expect("create tournament");
        // Roster entry captured at join time with nothing to match on.
        engine
            .join_tournament(
                1,
                &[JoinMember {
                    account: None,
                    game_id: "ign-ghost".to_string(),
                    game_name: Some("Ghost".to_string()),
                    username: None,
                }],
            )
            .await
            .expect("join");

        let err = engine
            .submit_match_result(1, "ign-ghost", 5, Some(200))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Invalid(_)));

        // The rejected save left nothing behind, kills included.
        assert!(matches!(
            engine.leaderboard("ign-ghost").await.unwrap_err(),
            EngineError::NotFound(_)
        ));
        assert_eq!(participant_baseline(&engine, 1, "ign-ghost").await, (0, 0));

        // Kill-only edits still apply for the unlinked participant.
        engine
            .submit_match_result(1, "ign-ghost", 5, None)
            .await
            .expect("kills only");
        assert_eq!(
            engine.leaderboard("ign-ghost").await.expect("leaderboard").kills,
            5
        );
    }

    #[tokio::test]
    async fn entry_fees_are_charged_once_per_roster() {
        let engine = test_engine();
        let captain = seed_account(&engine, "acct-captain", |_| {}).await;
        engine
            .adjust_balance(&captain, 500, TxKind::Adjustment, "top-up", None)
            .await
            .expect("fund");
        engine
            .create_tournament(1, "Paid Cup", 200)
            .await
            .expect("create tournament");

        let roster = [
            JoinMember {
                account: Some(captain.clone()),
                game_id: "ign-captain".to_string(),
                ..Default::default()
            },
            JoinMember {
                account: None,
                game_id: "ign-wingman".to_string(),
                ..Default::default()
            },
        ];
        engine.join_tournament(1, &roster).await.expect("join");
        assert_eq!(engine.account(&captain).await.expect("account").balance, 300);

        // Re-joining the same roster neither re-creates baselines nor
        // charges the fee again.
        engine.join_tournament(1, &roster).await.expect("re-join");
        let account = engine.account(&captain).await.expect("account");
        assert_eq!(account.balance, 300);
        let fee_rows = engine
            .ledger(&captain)
            .await
            .expect("ledger")
            .into_iter()
            .filter(|row| row.kind == TxKind::EntryFee)
            .count();
        assert_eq!(fee_rows, 1);
    }

    #[tokio::test]
    async fn contention_is_retried_then_surfaced_as_conflict() {
        // Below the budget: the operation succeeds transparently.
        let engine = contended_engine();
        let alice = seed_with_balance(&engine, "acct-alice", 100).await;
        engine.store().arm(CAS_RETRY_LIMIT - 1);
        let balance = engine
            .adjust_balance(&alice, -40, TxKind::EntryFee, "entry fee", None)
            .await
            .expect("retried debit");
        assert_eq!(balance, 60);

        // Sustained contention exhausts the budget and surfaces Conflict.
        let engine = contended_engine();
        let bob = seed_with_balance(&engine, "acct-bob", 100).await;
        engine.store().arm(CAS_RETRY_LIMIT);
        let err = engine
            .adjust_balance(&bob, -40, TxKind::EntryFee, "entry fee", None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        assert_eq!(engine.account(&bob).await.expect("account").balance, 100);
    }

    #[tokio::test]
    async fn ledger_replay_matches_cached_balances_after_a_full_lifecycle() {
        let engine = test_engine();
        let delegate = seed_account(&engine, "acct-delegate", |account| {
            account.role = Role::Delegate;
        })
        .await;
        let player = seed_account(&engine, "acct-player", |account| {
            account.game_id = Some(ACE.to_string());
            account.referred_by = Some(scrimbase_types::AccountId::from("acct-delegate"));
        })
        .await;
        engine
            .adjust_balance(&player, 2_000, TxKind::Adjustment, "top-up", None)
            .await
            .expect("fund");

        engine
            .create_tournament(1, "Season Final", 150)
            .await
            .expect("create tournament");
        engine
            .join_tournament(
                1,
                &[JoinMember {
                    account: Some(player.clone()),
                    game_id: ACE.to_string(),
                    ..Default::default()
                }],
            )
            .await
            .expect("join");
        engine
            .submit_match_result(1, ACE, 9, Some(700))
            .await
            .expect("result");
        engine
            .submit_match_result(1, ACE, 11, Some(650))
            .await
            .expect("correction");

        let approved = engine.create_withdrawal(&player, 800).await.expect("request");
        engine
            .resolve_withdrawal(approved.id, WithdrawalDecision::Approve)
            .await
            .expect("approve");
        let rejected = engine.create_withdrawal(&player, 400).await.expect("request");
        engine
            .resolve_withdrawal(rejected.id, WithdrawalDecision::Reject)
            .await
            .expect("reject");

        for account in [&player, &delegate] {
            let report = engine.audit_account(account).await.expect("audit");
            assert!(
                report.consistent(),
                "{account}: replay {} vs cached {}",
                report.replayed_balance,
                report.cached_balance
            );
        }
        // 2000 - 150 entry + 650 prize - 800 withdrawn (hold settled).
        assert_eq!(engine.account(&player).await.expect("account").balance, 1_700);
        assert_eq!(engine.account(&delegate).await.expect("account").balance, 40);
    }

    async fn seed_with_balance(
        engine: &Engine<Contended<Memory>, FixedClock>,
        id: &str,
        balance: i64,
    ) -> scrimbase_types::AccountId {
        seed_account(engine, id, |account| account.balance = balance).await
    }
}
