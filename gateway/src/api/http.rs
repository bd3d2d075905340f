use axum::{
    extract::{Path, State as AxumState},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use scrimbase_engine::{JoinMember, ResultOutcome, WithdrawalOutcome};
use scrimbase_types::{
    Account, AccountId, EngineError, ErrorKind, LedgerTransaction, ParticipantIdentity, Role,
    TxKind, TxRef, TxStatus, WithdrawalDecision, WithdrawalRequest, WithdrawalStatus,
};

use crate::Gateway;

/// Simple health response for basic liveness checks.
#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

pub(super) async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

/// JSON error body rendered for every failed operation. A success body is
/// never produced alongside one of these.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

fn error_response(err: EngineError) -> Response {
    let status = match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Invalid => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.kind().as_str(),
            message: err.to_string(),
        }),
    )
        .into_response()
}

fn invalid(message: impl Into<String>) -> Response {
    error_response(EngineError::Invalid(message.into()))
}

/// Validates admin authentication via x-admin-token header or Bearer token.
/// Uses the ADMIN_AUTH_TOKEN environment variable; when it is not set, all
/// admin access is blocked.
fn admin_auth_error(headers: &HeaderMap) -> Option<Response> {
    let token = std::env::var("ADMIN_AUTH_TOKEN").unwrap_or_default();
    if token.is_empty() {
        return Some(unauthorized());
    }
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    let header_token = headers
        .get("x-admin-token")
        .and_then(|value| value.to_str().ok());
    if bearer == Some(token.as_str()) || header_token == Some(token.as_str()) {
        None
    } else {
        Some(unauthorized())
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "unauthorized",
            message: "invalid or missing admin token".to_string(),
        }),
    )
        .into_response()
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Delegate => "delegate",
        Role::Admin => "admin",
    }
}

fn tx_kind_str(kind: TxKind) -> &'static str {
    match kind {
        TxKind::EntryFee => "entry_fee",
        TxKind::Prize => "prize",
        TxKind::WithdrawalHold => "withdrawal_hold",
        TxKind::WithdrawalSettle => "withdrawal_settle",
        TxKind::WithdrawalRefund => "withdrawal_refund",
        TxKind::FeePayout => "fee_payout",
        TxKind::Adjustment => "adjustment",
    }
}

fn tx_status_str(status: TxStatus) -> &'static str {
    match status {
        TxStatus::Pending => "pending",
        TxStatus::OnHold => "on_hold",
        TxStatus::Completed => "completed",
        TxStatus::Refunded => "refunded",
    }
}

fn withdrawal_status_str(status: WithdrawalStatus) -> &'static str {
    match status {
        WithdrawalStatus::Pending => "pending",
        WithdrawalStatus::Approved => "approved",
        WithdrawalStatus::Rejected => "rejected",
    }
}

#[derive(Serialize)]
struct AccountResponse {
    id: String,
    balance: i64,
    role: &'static str,
    referred_by: Option<String>,
    username: String,
    game_id: Option<String>,
    game_name: Option<String>,
    transactions: u64,
    created_at: u64,
}

impl AccountResponse {
    fn new(id: &AccountId, account: &Account) -> Self {
        Self {
            id: id.to_string(),
            balance: account.balance,
            role: role_str(account.role),
            referred_by: account.referred_by.as_ref().map(|id| id.to_string()),
            username: account.username.clone(),
            game_id: account.game_id.clone(),
            game_name: account.game_name.clone(),
            transactions: account.tx_seq,
            created_at: account.created_at,
        }
    }
}

#[derive(Serialize)]
struct TxRefResponse {
    kind: &'static str,
    id: u64,
}

#[derive(Serialize)]
struct LedgerRowResponse {
    seq: u64,
    amount: i64,
    kind: &'static str,
    status: &'static str,
    created_at: u64,
    description: String,
    reference: Option<TxRefResponse>,
}

impl From<&LedgerTransaction> for LedgerRowResponse {
    fn from(row: &LedgerTransaction) -> Self {
        Self {
            seq: row.seq,
            amount: row.amount,
            kind: tx_kind_str(row.kind),
            status: tx_status_str(row.status),
            created_at: row.created_at,
            description: row.description.clone(),
            reference: row.reference.as_ref().map(|reference| match reference {
                TxRef::Tournament(id) => TxRefResponse {
                    kind: "tournament",
                    id: *id,
                },
                TxRef::Withdrawal(id) => TxRefResponse {
                    kind: "withdrawal",
                    id: *id,
                },
            }),
        }
    }
}

#[derive(Serialize)]
struct LedgerResponse {
    account: String,
    rows: Vec<LedgerRowResponse>,
}

#[derive(Serialize)]
struct AuditResponse {
    account: String,
    rows: u64,
    replayed_balance: i64,
    cached_balance: i64,
    consistent: bool,
}

#[derive(Serialize)]
struct LeaderboardResponse {
    game_id: String,
    kills: u64,
    updated_at: u64,
}

#[derive(Serialize)]
struct IdentityResponse {
    status: &'static str,
    account: Option<String>,
    game_id: Option<String>,
}

impl From<&ParticipantIdentity> for IdentityResponse {
    fn from(identity: &ParticipantIdentity) -> Self {
        match identity {
            ParticipantIdentity::Linked(account) => Self {
                status: "linked",
                account: Some(account.to_string()),
                game_id: None,
            },
            ParticipantIdentity::Unlinked(game_id) => Self {
                status: "unlinked",
                account: None,
                game_id: Some(game_id.clone()),
            },
        }
    }
}

#[derive(Serialize)]
struct WithdrawalResponse {
    id: u64,
    account: String,
    amount: i64,
    status: &'static str,
    fee_recipient: Option<String>,
    fee_amount: i64,
    created_at: u64,
    resolved_at: Option<u64>,
}

impl From<&WithdrawalRequest> for WithdrawalResponse {
    fn from(request: &WithdrawalRequest) -> Self {
        Self {
            id: request.id,
            account: request.account.to_string(),
            amount: request.amount,
            status: withdrawal_status_str(request.status),
            fee_recipient: request.fee_recipient.as_ref().map(|id| id.to_string()),
            fee_amount: request.fee_amount,
            created_at: request.created_at,
            resolved_at: request.resolved_at,
        }
    }
}

#[derive(Serialize)]
struct ResolutionResponse {
    id: u64,
    status: &'static str,
    fee_recipient: Option<String>,
    fee_amount: i64,
    replayed: bool,
}

impl From<&WithdrawalOutcome> for ResolutionResponse {
    fn from(outcome: &WithdrawalOutcome) -> Self {
        Self {
            id: outcome.id,
            status: withdrawal_status_str(outcome.status),
            fee_recipient: outcome.fee_recipient.as_ref().map(|id| id.to_string()),
            fee_amount: outcome.fee_amount,
            replayed: outcome.replayed,
        }
    }
}

#[derive(Serialize)]
struct ResultResponse {
    kill_delta: i64,
    kills: u32,
    prize_delta: Option<i64>,
    prize: Option<i64>,
    prize_row: Option<String>,
}

impl From<&ResultOutcome> for ResultResponse {
    fn from(outcome: &ResultOutcome) -> Self {
        Self {
            kill_delta: outcome.kill_delta,
            kills: outcome.kills,
            prize_delta: outcome.prize_delta,
            prize: outcome.prize,
            prize_row: outcome.prize_row.as_ref().map(|id| id.to_string()),
        }
    }
}

pub(super) async fn get_account(
    AxumState(gateway): AxumState<Arc<Gateway>>,
    Path(id): Path<String>,
) -> Response {
    let account_id = AccountId::new(id);
    match gateway.engine().account(&account_id).await {
        Ok(account) => Json(AccountResponse::new(&account_id, &account)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(super) async fn get_ledger(
    AxumState(gateway): AxumState<Arc<Gateway>>,
    Path(id): Path<String>,
) -> Response {
    let account_id = AccountId::new(id);
    match gateway.engine().ledger(&account_id).await {
        Ok(rows) => Json(LedgerResponse {
            account: account_id.to_string(),
            rows: rows.iter().map(LedgerRowResponse::from).collect(),
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

pub(super) async fn get_audit(
    AxumState(gateway): AxumState<Arc<Gateway>>,
    Path(id): Path<String>,
) -> Response {
    let account_id = AccountId::new(id);
    match gateway.engine().audit_account(&account_id).await {
        Ok(report) => Json(AuditResponse {
            account: report.account.to_string(),
            rows: report.rows,
            replayed_balance: report.replayed_balance,
            cached_balance: report.cached_balance,
            consistent: report.consistent(),
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

pub(super) async fn get_leaderboard(
    AxumState(gateway): AxumState<Arc<Gateway>>,
    Path(game_id): Path<String>,
) -> Response {
    match gateway.engine().leaderboard(&game_id).await {
        Ok(aggregate) => Json(LeaderboardResponse {
            game_id,
            kills: aggregate.kills,
            updated_at: aggregate.updated_at,
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

pub(super) async fn get_withdrawal(
    AxumState(gateway): AxumState<Arc<Gateway>>,
    Path(id): Path<u64>,
) -> Response {
    match gateway.engine().withdrawal(id).await {
        Ok(request) => Json(WithdrawalResponse::from(&request)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Request body for provisioning or updating an account profile.
#[derive(Debug, Deserialize)]
pub(super) struct PutAccountRequest {
    id: String,
    username: String,
    role: Option<String>,
    referred_by: Option<String>,
    game_id: Option<String>,
    game_name: Option<String>,
}

pub(super) async fn put_account(
    AxumState(gateway): AxumState<Arc<Gateway>>,
    headers: HeaderMap,
    Json(request): Json<PutAccountRequest>,
) -> Response {
    if let Some(denied) = admin_auth_error(&headers) {
        return denied;
    }
    let role = match request.role.as_deref() {
        None | Some("user") => Role::User,
        Some("delegate") => Role::Delegate,
        Some("admin") => Role::Admin,
        Some(other) => return invalid(format!("unknown role {other:?}")),
    };

    let account_id = AccountId::new(request.id);
    let mut record = Account::new(request.username, 0);
    record.role = role;
    record.referred_by = request.referred_by.map(AccountId::new);
    record.game_id = request.game_id;
    record.game_name = request.game_name;

    match gateway.engine().put_account(&account_id, record).await {
        Ok(stored) => Json(AccountResponse::new(&account_id, &stored)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Request body for a manual back-office balance adjustment.
#[derive(Debug, Deserialize)]
pub(super) struct AdjustBalanceRequest {
    amount: i64,
    description: String,
}

#[derive(Serialize)]
struct AdjustBalanceResponse {
    account: String,
    balance: i64,
}

pub(super) async fn adjust_balance(
    AxumState(gateway): AxumState<Arc<Gateway>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<AdjustBalanceRequest>,
) -> Response {
    if let Some(denied) = admin_auth_error(&headers) {
        return denied;
    }
    let account_id = AccountId::new(id);
    match gateway
        .engine()
        .adjust_balance(
            &account_id,
            request.amount,
            TxKind::Adjustment,
            &request.description,
            None,
        )
        .await
    {
        Ok(balance) => Json(AdjustBalanceResponse {
            account: account_id.to_string(),
            balance,
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

/// Request body for creating a tournament.
#[derive(Debug, Deserialize)]
pub(super) struct CreateTournamentRequest {
    id: u64,
    name: String,
    #[serde(default)]
    entry_fee: i64,
}

#[derive(Serialize)]
struct CreateTournamentResponse {
    id: u64,
}

pub(super) async fn create_tournament(
    AxumState(gateway): AxumState<Arc<Gateway>>,
    headers: HeaderMap,
    Json(request): Json<CreateTournamentRequest>,
) -> Response {
    if let Some(denied) = admin_auth_error(&headers) {
        return denied;
    }
    match gateway
        .engine()
        .create_tournament(request.id, &request.name, request.entry_fee)
        .await
    {
        Ok(()) => Json(CreateTournamentResponse { id: request.id }).into_response(),
        Err(err) => error_response(err),
    }
}

/// One roster member in a join request.
#[derive(Debug, Deserialize)]
pub(super) struct JoinMemberRequest {
    account: Option<String>,
    game_id: String,
    game_name: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct JoinRequest {
    members: Vec<JoinMemberRequest>,
}

#[derive(Serialize)]
struct JoinResponse {
    identities: Vec<IdentityResponse>,
}

pub(super) async fn join_tournament(
    AxumState(gateway): AxumState<Arc<Gateway>>,
    headers: HeaderMap,
    Path(tournament_id): Path<u64>,
    Json(request): Json<JoinRequest>,
) -> Response {
    if let Some(denied) = admin_auth_error(&headers) {
        return denied;
    }
    let members = request
        .members
        .into_iter()
        .map(|member| JoinMember {
            account: member.account.map(AccountId::new),
            game_id: member.game_id,
            game_name: member.game_name,
            username: member.username,
        })
        .collect::<Vec<_>>();
    match gateway.engine().join_tournament(tournament_id, &members).await {
        Ok(identities) => Json(JoinResponse {
            identities: identities.iter().map(IdentityResponse::from).collect(),
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

/// Request body for a per-match result save.
#[derive(Debug, Deserialize)]
pub(super) struct SubmitResultRequest {
    game_id: String,
    kills: i64,
    prize: Option<i64>,
}

pub(super) async fn submit_result(
    AxumState(gateway): AxumState<Arc<Gateway>>,
    headers: HeaderMap,
    Path(tournament_id): Path<u64>,
    Json(request): Json<SubmitResultRequest>,
) -> Response {
    if let Some(denied) = admin_auth_error(&headers) {
        return denied;
    }
    match gateway
        .engine()
        .submit_match_result(tournament_id, &request.game_id, request.kills, request.prize)
        .await
    {
        Ok(outcome) => Json(ResultResponse::from(&outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Request body for creating a withdrawal hold.
#[derive(Debug, Deserialize)]
pub(super) struct CreateWithdrawalRequest {
    account: String,
    amount: i64,
}

pub(super) async fn create_withdrawal(
    AxumState(gateway): AxumState<Arc<Gateway>>,
    headers: HeaderMap,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Response {
    if let Some(denied) = admin_auth_error(&headers) {
        return denied;
    }
    let account_id = AccountId::new(request.account);
    match gateway
        .engine()
        .create_withdrawal(&account_id, request.amount)
        .await
    {
        Ok(created) => Json(WithdrawalResponse::from(&created)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Request body for resolving a withdrawal.
#[derive(Debug, Deserialize)]
pub(super) struct ResolveWithdrawalRequest {
    decision: String,
}

pub(super) async fn resolve_withdrawal(
    AxumState(gateway): AxumState<Arc<Gateway>>,
    headers: HeaderMap,
    Path(request_id): Path<u64>,
    Json(request): Json<ResolveWithdrawalRequest>,
) -> Response {
    if let Some(denied) = admin_auth_error(&headers) {
        return denied;
    }
    let decision = match request.decision.as_str() {
        "approve" => WithdrawalDecision::Approve,
        "reject" => WithdrawalDecision::Reject,
        other => return invalid(format!("unknown decision {other:?}")),
    };
    match gateway.engine().resolve_withdrawal(request_id, decision).await {
        Ok(outcome) => Json(ResolutionResponse::from(&outcome)).into_response(),
        Err(err) => error_response(err),
    }
}
