use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppError;
use crate::load_generator::{LoadPlan, LoadRun};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Running,
    Finished,
}

/// The current or last run, with the collector's extrapolated call total.
#[derive(Debug, Serialize)]
pub struct LoadView {
    pub phase: Phase,
    pub plan: Option<LoadPlan>,
    pub started_at: Option<DateTime<Utc>>,
    /// Sum over every operation of sampled lines scaled by 1/rate
    pub estimated_calls: f64,
    pub sample_rate: Option<f64>,
}

fn view(state: &AppState, run: Option<&LoadRun>) -> LoadView {
    let phase = match run {
        None => Phase::Idle,
        Some(run) if run.is_finished() => Phase::Finished,
        Some(_) => Phase::Running,
    };
    LoadView {
        phase,
        plan: run.map(|r| r.plan.clone()),
        started_at: run.map(|r| r.started_at),
        estimated_calls: state
            .collector
            .snapshot()
            .namespaces
            .iter()
            .map(|ns| ns.estimated_calls)
            .sum(),
        sample_rate: state.interceptor.emitter().map(|e| e.sample_rate()),
    }
}

/// `POST /api/load`: start a run. The collector is cleared first so its
/// totals describe this run only.
pub async fn start(
    State(state): State<Arc<AppState>>,
    Json(plan): Json<LoadPlan>,
) -> Result<Json<LoadView>, AppError> {
    plan.validate().map_err(AppError::BadRequest)?;

    let mut slot = state.load.lock().await;
    if slot.as_ref().is_some_and(|run| !run.is_finished()) {
        return Err(AppError::AlreadyRunning);
    }

    state.collector.reset();
    let run = LoadRun::start(plan, state.interceptor.clone(), state.db.clone());
    let view = view(&state, Some(&run));
    *slot = Some(run);
    Ok(Json(view))
}

/// `DELETE /api/load`: stop the run and wait for its workers.
pub async fn stop(State(state): State<Arc<AppState>>) -> Json<LoadView> {
    let run = state.load.lock().await.take();
    if let Some(run) = run {
        let plan = run.plan.clone();
        let started_at = run.started_at;
        run.stop().await;
        // A stopped run reads as finished until the next start
        let mut view = view(&state, None);
        view.phase = Phase::Finished;
        view.plan = Some(plan);
        view.started_at = Some(started_at);
        return Json(view);
    }
    Json(view(&state, None))
}

/// `GET /api/load`
pub async fn status(State(state): State<Arc<AppState>>) -> Json<LoadView> {
    let slot = state.load.lock().await;
    Json(view(&state, slot.as_ref()))
}
