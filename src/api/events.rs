//! Outbound event stream endpoint
//!
//! Server-sent events bridge over the engine's broadcast channel. This is
//! the boundary the notification subsystem consumes; delivery beyond it is
//! not this server's concern.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use tokio_stream::{wrappers::errors::BroadcastStreamRecvError, Stream, StreamExt};

use crate::error::AppResult;

use super::AuthenticatedActor;

/// Subscribe to the engine's outbound events
#[utoipa::path(
    get,
    path = "/events",
    tag = "events",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Server-sent event stream of engine events"),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn stream_events(
    State(state): State<crate::AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    actor.require_admin()?;

    let stream = state.services.events.stream().filter_map(|received| match received {
        Ok(envelope) => match Event::default()
            .event(envelope.event.name())
            .json_data(&envelope)
        {
            Ok(event) => Some(Ok::<Event, Infallible>(event)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize outbound event");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "event stream consumer lagged");
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
