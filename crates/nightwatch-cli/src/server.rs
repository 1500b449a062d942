//! HTTP surface: the read-only reporting API and the inbound reply webhook.
//!
//! The reporting endpoints read straight from the store; only the reply
//! webhook feeds the engine, through the same channel its timers use.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tower_http::cors::CorsLayer;

use nightwatch_core::{
    CoreError, EngineEvent, KvStore, PhaseController, Roster, SleepHistory, SleepSession,
    StatsConfig, StatsEngine, UserStates,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub roster: Roster,
    pub stats_config: StatsConfig,
    pub tx: UnboundedSender<EngineEvent>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/history", get(all_history))
        .route("/api/stats", get(all_stats))
        .route("/api/status", get(status))
        .route("/api/reply", post(reply))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiError = (StatusCode, String);

fn internal(e: CoreError) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Derived statistics as served to the dashboard.
///
/// `sleepDebt` is reported in signed hours relative to the nightly target;
/// no further display scaling is applied.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsView {
    sleep_debt: f64,
    good_sleep_streak: u32,
    best_streak: u32,
    total_nights: u32,
    good_nights: u32,
    good_night_percentage: f64,
}

#[derive(Serialize)]
struct StatusView {
    phase: String,
    states: HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyBody {
    participant_id: String,
    text: String,
}

async fn all_history(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, Vec<SleepSession>>>, ApiError> {
    let history = SleepHistory::new(state.store.clone());
    let mut data = HashMap::new();
    for p in state.roster.iter() {
        data.insert(p.id.clone(), history.sessions(&p.id).map_err(internal)?);
    }
    Ok(Json(data))
}

async fn all_stats(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, StatsView>>, ApiError> {
    let engine = StatsEngine::new(state.store.clone(), state.stats_config);
    let mut data = HashMap::new();
    for p in state.roster.iter() {
        let stats = engine.load(&p.id).map_err(internal)?;
        data.insert(
            p.id.clone(),
            StatsView {
                sleep_debt: stats.sleep_debt_hours,
                good_sleep_streak: stats.good_sleep_streak,
                best_streak: stats.best_streak,
                total_nights: stats.total_nights,
                good_nights: stats.good_nights,
                good_night_percentage: stats.good_night_percentage(),
            },
        );
    }
    Ok(Json(data))
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusView>, ApiError> {
    let phase = PhaseController::new(state.store.clone())
        .current()
        .map_err(internal)?;
    let states = UserStates::new(state.store.clone())
        .all_raw()
        .map_err(internal)?;
    Ok(Json(StatusView {
        phase: phase.as_str().to_string(),
        states,
    }))
}

async fn reply(
    State(state): State<AppState>,
    Json(body): Json<ReplyBody>,
) -> Result<StatusCode, ApiError> {
    let event = EngineEvent::Reply {
        participant_id: body.participant_id,
        text: body.text,
    };
    state
        .tx
        .send(event)
        .map_err(|_| (StatusCode::SERVICE_UNAVAILABLE, "engine stopped".to_string()))?;
    Ok(StatusCode::ACCEPTED)
}
