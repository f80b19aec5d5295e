use anyhow::anyhow;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State as AxumState},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tombola_engine::{ClaimOutcome, Error, MemoryEngine};
use tombola_types::{
    api::{
        parse_picks, AbandonRequest, AbandonView, ClaimRequest, ClaimResponse, Intent, Param,
        Rejection, SelectRequest, SelectionView, StakeStatus, StateQuery, StateView,
    },
    clamp_index, Card, PlayerId, Stake,
};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{Any, CorsLayer};

pub mod config;
pub mod relay;
mod ws;

pub use config::{Config, ConfigError, PlayerSeed, ValidatedConfig};
pub use relay::{RetryPolicy, WebhookRelay};

/// Per-client request budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    pub per_second: u64,
    pub burst: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            per_second: 50,
            burst: 100,
        }
    }
}

pub struct Api {
    engine: MemoryEngine,
    rate_limit: RateLimit,
}

impl Api {
    pub fn new(engine: MemoryEngine) -> Self {
        Self {
            engine,
            rate_limit: RateLimit::default(),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn engine(&self) -> &MemoryEngine {
        &self.engine
    }

    pub fn router(&self) -> anyhow::Result<Router> {
        // Configure CORS
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);

        // Configure rate limiting: one token every 1/per_second seconds
        let replenish = (1_000_000_000 / self.rate_limit.per_second.max(1)).max(1);
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_nanosecond(replenish)
                .burst_size(self.rate_limit.burst)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow!("invalid rate limit: {:?}", self.rate_limit))?,
        );

        Ok(Router::new()
            .route("/api/game_state", get(game_state))
            .route("/api/stake_state", get(stake_state))
            .route("/api/card/:index", get(card))
            .route("/api/select", post(select))
            .route("/api/claim_bingo", post(claim_bingo))
            .route("/api/abandon", post(abandon))
            .route("/ws/:stake", get(ws::upgrade))
            .layer(cors)
            .layer(GovernorLayer {
                config: governor_conf,
            })
            .with_state(self.engine.clone()))
    }
}

/// An engine error rendered as a JSON rejection.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::InvalidParams(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidParams(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) | Error::NotStarted | Error::NoCard | Error::AlreadyWon => {
                StatusCode::CONFLICT
            }
            Error::UnknownSession(_) | Error::Wallet(_) => {
                tracing::error!(error = %self.0, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Rejection {
            ok: false,
            reason: self.0.reason().to_string(),
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub(crate) fn parse_player(tid: Option<&Param>) -> Result<PlayerId, Error> {
    tid.and_then(Param::as_int)
        .map(|id| PlayerId(id as u64))
        .ok_or_else(|| Error::InvalidParams("tid must be a numeric id".to_string()))
}

pub(crate) fn parse_stake(stake: Option<&Param>) -> Result<Stake, Error> {
    stake
        .and_then(Param::as_int)
        .and_then(|v| Stake::try_from(v).ok())
        .filter(|v| *v > 0)
        .ok_or_else(|| Error::InvalidParams("stake must be a positive integer".to_string()))
}

fn text(value: Option<String>) -> Option<Param> {
    value.map(Param::Text)
}

async fn game_state(
    AxumState(engine): AxumState<MemoryEngine>,
    Query(query): Query<StateQuery>,
) -> ApiResult<StateView> {
    let stake = parse_stake(text(query.stake).as_ref())?;
    let player = match text(query.tid) {
        Some(tid) => Some(parse_player(Some(&tid))?),
        None => None,
    };
    Ok(Json(engine.state(stake, player).await?))
}

async fn stake_state(
    AxumState(engine): AxumState<MemoryEngine>,
    Query(query): Query<StateQuery>,
) -> ApiResult<StakeStatus> {
    let stake = parse_stake(text(query.stake).as_ref())?;
    Ok(Json(engine.stake_status(stake).await?))
}

#[derive(Serialize)]
struct CardView {
    ok: bool,
    index: u16,
    card: Card,
}

async fn card(Path(index): Path<String>) -> ApiResult<CardView> {
    let raw: i64 = index
        .trim()
        .parse()
        .map_err(|_| Error::InvalidParams(format!("card index {index} is not a number")))?;
    Ok(Json(CardView {
        ok: true,
        index: clamp_index(raw),
        card: Card::generate(raw),
    }))
}

async fn select(
    AxumState(engine): AxumState<MemoryEngine>,
    body: Result<Json<SelectRequest>, JsonRejection>,
) -> ApiResult<SelectionView> {
    let Json(request) = body?;
    let player = parse_player(request.tid.as_ref())?;
    let stake = parse_stake(request.stake.as_ref())?;
    let index = match (request.action, request.index.as_ref().and_then(Param::as_int)) {
        (_, Some(index)) => index,
        (Intent::Cancel, None) => 0,
        (Intent::Preview | Intent::Accept, None) => {
            return Err(Error::InvalidParams("index must be a numeric card index".into()).into())
        }
    };
    Ok(Json(
        engine.select(player, stake, index, request.action).await?,
    ))
}

async fn claim_bingo(
    AxumState(engine): AxumState<MemoryEngine>,
    body: Result<Json<ClaimRequest>, JsonRejection>,
) -> ApiResult<ClaimResponse> {
    let Json(request) = body?;
    let player = parse_player(request.tid.as_ref())?;
    let stake = parse_stake(request.stake.as_ref())?;
    let picks = request.picks.as_deref().map(parse_picks);
    let response = match engine.claim_bingo(player, stake, picks).await? {
        ClaimOutcome::Won(notice) => ClaimResponse::Won {
            ok: true,
            pattern: notice.pattern,
            row: notice.row,
            col: notice.col,
            index: notice.index,
            player: notice.winner,
            amount: notice.amount,
        },
        ClaimOutcome::NotBingo => ClaimResponse::NotBingo {
            ok: false,
            reason: "not_bingo".to_string(),
            disqualified: true,
        },
    };
    Ok(Json(response))
}

async fn abandon(
    AxumState(engine): AxumState<MemoryEngine>,
    body: Result<Json<AbandonRequest>, JsonRejection>,
) -> ApiResult<AbandonView> {
    let Json(request) = body?;
    let player = parse_player(request.tid.as_ref())?;
    let stake = parse_stake(request.stake.as_ref())?;
    Ok(Json(engine.abandon(player, stake).await?))
}

#[cfg(test)]
mod tests;
