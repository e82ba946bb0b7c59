//! Server-Sent Events support

use crate::runtime::SseEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert a user's broadcast channel to an SSE stream, led by `init` if given
pub fn sse_stream(
    init: Option<SseEvent>,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = tokio_stream::iter(init);

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, "SSE subscriber lagged; skipping events");
            None
        }
    });

    let events = init
        .chain(broadcasts)
        .filter_map(to_axum_event)
        .map(Ok::<_, Infallible>);

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn event_name(event: &SseEvent) -> &'static str {
    match event {
        SseEvent::Reply { .. } => "reply",
        SseEvent::SessionChanged { .. } => "session_changed",
        SseEvent::TurnDone => "turn_done",
        SseEvent::Error { .. } => "error",
    }
}

fn to_axum_event(event: SseEvent) -> Option<Event> {
    match Event::default().event(event_name(&event)).json_data(&event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode SSE event");
            None
        }
    }
}
