use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    Json,
};
use domain_wrap_core::{is_valid_domain, Metadata, MintState, Token, TokenId};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::{event_keep_alive, event_stream};
use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::wallet::WalletStatus;

#[derive(Debug, Deserialize)]
pub struct MintRequest {
    domain: String,
}

#[derive(Debug, Serialize)]
pub struct MintAccepted {
    attempt_id: u64,
    domain: String,
    token_id: TokenId,
    state: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    #[serde(default)]
    domain: String,
}

#[derive(Debug, Serialize)]
pub struct DomainCheck {
    domain: String,
    valid: bool,
    available: bool,
    next_token_id: TokenId,
}

#[derive(Debug, Serialize)]
pub struct CancelAccepted {
    attempt_id: u64,
}

pub async fn wallet_status(State(state): State<AppState>) -> Json<WalletStatus> {
    Json(state.wallet().status())
}

pub async fn connect_wallet(State(state): State<AppState>) -> Json<WalletStatus> {
    Json(state.wallet().connect())
}

pub async fn disconnect_wallet(State(state): State<AppState>) -> StatusCode {
    state.wallet().disconnect();
    StatusCode::NO_CONTENT
}

pub async fn validate_domain(
    State(state): State<AppState>,
    Query(query): Query<ValidateQuery>,
) -> Json<DomainCheck> {
    let domain = query.domain.trim().to_string();
    let valid = is_valid_domain(&domain);
    let available = valid && !state.workflow().is_minted(&domain);
    Json(DomainCheck {
        domain,
        valid,
        available,
        next_token_id: state.workflow().next_token_id(),
    })
}

/// Starts a mint and returns once it is in flight; completion is reported
/// through the status and event endpoints.
pub async fn submit_mint(
    State(state): State<AppState>,
    payload: Result<Json<MintRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MintAccepted>), ProblemResponse> {
    let Json(request) = payload.map_err(|rejection| {
        counter!("api_requests_total", "route" => "mints", "result" => "invalid_request")
            .increment(1);
        ProblemResponse::from(rejection)
    })?;
    let pending = state.workflow().begin(&request.domain).map_err(|err| {
        counter!("api_requests_total", "route" => "mints", "result" => err.kind()).increment(1);
        ProblemResponse::from(err)
    })?;
    counter!("api_requests_total", "route" => "mints", "result" => "accepted").increment(1);

    let ticket = pending.ticket().clone();
    tokio::spawn(async move {
        // Outcome is logged and published by the workflow.
        let _ = pending.complete().await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(MintAccepted {
            attempt_id: ticket.attempt_id(),
            domain: ticket.domain().to_string(),
            token_id: ticket.token_id(),
            state: "minting",
        }),
    ))
}

pub async fn mint_status(State(state): State<AppState>) -> Json<MintState> {
    Json(state.workflow().status())
}

pub async fn cancel_mint(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CancelAccepted>), ProblemResponse> {
    let attempt_id = state.workflow().cancel()?;
    Ok((StatusCode::ACCEPTED, Json(CancelAccepted { attempt_id })))
}

pub async fn mint_events(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, serde_json::Error>>> {
    debug!(stage = "events", "mint event subscriber attached");
    Sse::new(event_stream(state.workflow().events())).keep_alive(event_keep_alive())
}

pub async fn list_tokens(State(state): State<AppState>) -> Json<Vec<Token>> {
    Json(state.workflow().list_tokens())
}

pub async fn get_token(
    State(state): State<AppState>,
    Path(token_id): Path<TokenId>,
) -> Result<Json<Token>, ProblemResponse> {
    find_token(&state, token_id).map(Json)
}

pub async fn get_token_metadata(
    State(state): State<AppState>,
    Path(token_id): Path<TokenId>,
) -> Result<Json<Metadata>, ProblemResponse> {
    find_token(&state, token_id).map(|token| Json(token.metadata().clone()))
}

/// Transfers are exposed but not supported by the simulation.
pub async fn transfer_token(
    State(state): State<AppState>,
    Path(token_id): Path<TokenId>,
) -> ProblemResponse {
    match find_token(&state, token_id) {
        Ok(token) => ProblemResponse::new(
            StatusCode::NOT_IMPLEMENTED,
            "transfer_unsupported",
            format!("token #{} cannot be transferred in this session", token.token_id()),
        ),
        Err(problem) => problem,
    }
}

fn find_token(state: &AppState, token_id: TokenId) -> Result<Token, ProblemResponse> {
    state.workflow().get_token(token_id).ok_or_else(|| {
        ProblemResponse::new(
            StatusCode::NOT_FOUND,
            "token_not_found",
            format!("no token with id {token_id}"),
        )
    })
}
