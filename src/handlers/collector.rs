use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use super::AppError;
use crate::collector::{CollectorSnapshot, NamespaceView, TailLine};
use crate::AppState;

/// `GET /api/collector`: every namespace with its operations.
pub async fn snapshot(State(state): State<Arc<AppState>>) -> Json<CollectorSnapshot> {
    Json(state.collector.snapshot())
}

/// `GET /api/collector/namespaces/:namespace`
pub async fn namespace(
    State(state): State<Arc<AppState>>,
    Path(namespace): Path<String>,
) -> Result<Json<NamespaceView>, AppError> {
    state
        .collector
        .namespace(&namespace)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("lines for namespace {namespace:?}")))
}

/// `DELETE /api/collector`
pub async fn reset(State(state): State<Arc<AppState>>) -> StatusCode {
    state.collector.reset();
    StatusCode::NO_CONTENT
}

/// `GET /api/collector/tail`: raw lines as the collector receives them.
/// A subscriber that falls behind gets a `lagged` event with the number of
/// lines it missed.
pub async fn tail(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.collector.subscribe()).map(|item| {
        Ok(match item {
            Ok(line) => line_event(line),
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                Event::default().event("lagged").data(missed.to_string())
            }
        })
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn line_event(line: TailLine) -> Event {
    let data = serde_json::to_string(&line).unwrap_or(line.line);
    Event::default().event("line").data(data)
}
