use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::errors::AppError;
use crate::models::Capability;
use crate::state::AppState;

use super::gate;

const KEEPALIVE: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
}

// GET /api/admin/events (SSE)
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource can't set headers, so the token may come in the query.
    let token = gate::bearer_token(&headers)
        .map(str::to_string)
        .or(query.token)
        .ok_or(AppError::Unauthenticated)?;
    let admin = gate::resolve(&state, &token)?;
    admin.require(Capability::Admin)?;

    tracing::info!(admin_id = %admin.user.id, "admin event stream opened");

    let live = BroadcastStream::new(state.events_tx.subscribe()).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok::<_, Infallible>(
                Event::default().data(data).event("booking_event"),
            ))
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "admin event stream lagged");
            None
        }
    });

    let keepalive = IntervalStream::new(tokio::time::interval(KEEPALIVE))
        .map(|_| Ok::<_, Infallible>(Event::default().comment("keepalive")));

    Ok(Sse::new(live.merge(keepalive)))
}
