use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::AppError;
use crate::AppState;

/// What the shared emitter is doing right now.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitterView {
    pub destination: String,
    pub prefix: String,
    pub sample_rate: f64,
    pub count_calls: bool,
}

/// Fields left out keep their current value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EmitterPatch {
    pub sample_rate: Option<f64>,
    pub prefix: Option<String>,
    pub count_calls: Option<bool>,
}

fn view(state: &AppState) -> Result<EmitterView, AppError> {
    let emitter = state.interceptor.emitter().ok_or(AppError::NotConfigured)?;
    Ok(EmitterView {
        destination: emitter.destination(),
        prefix: emitter.prefix(),
        sample_rate: emitter.sample_rate(),
        count_calls: emitter.counts_calls(),
    })
}

/// `GET /api/emitter`
pub async fn show(State(state): State<Arc<AppState>>) -> Result<Json<EmitterView>, AppError> {
    view(&state).map(Json)
}

/// `PUT /api/emitter`: re-target the running emitter. Connections already
/// handed out pick the new settings up on their next call.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<EmitterPatch>,
) -> Result<Json<EmitterView>, AppError> {
    let emitter = state.interceptor.emitter().ok_or(AppError::NotConfigured)?;

    let mut applied = state.statsd.lock();
    let mut next = applied.clone();
    if let Some(rate) = patch.sample_rate {
        next.sample_rate = rate;
    }
    if let Some(prefix) = patch.prefix {
        next.prefix = prefix;
    }
    if let Some(count) = patch.count_calls {
        next.count_calls = count;
    }

    emitter.reconfigure(&next)?;
    tracing::info!(
        prefix = %next.prefix,
        sample_rate = next.sample_rate,
        count_calls = next.count_calls,
        "Emitter re-targeted"
    );
    *applied = next;
    drop(applied);

    view(&state).map(Json)
}
