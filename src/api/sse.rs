//! Server-Sent Events support

use crate::runtime::SseEvent;
use crate::state_machine::SessionView;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Stream that starts with an `init` snapshot, then relays runtime updates
pub fn sse_stream(
    init: SessionView,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move {
        Ok(to_axum_event("init", json!({ "type": "init", "session": init })))
    });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(sse_event_to_axum(event))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn sse_event_to_axum(event: SseEvent) -> Event {
    let (event_type, data) = sse_payload(event);
    to_axum_event(event_type, data)
}

fn sse_payload(event: SseEvent) -> (&'static str, serde_json::Value) {
    match event {
        SseEvent::Reveal { text } => ("reveal", json!({ "type": "reveal", "text": text })),
        SseEvent::Message { message } => (
            "message",
            json!({ "type": "message", "message": message }),
        ),
        SseEvent::StateChange { view } => (
            "state_change",
            json!({ "type": "state_change", "session": view }),
        ),
        SseEvent::Error { message } => ("error", json!({ "type": "error", "message": message })),
    }
}

fn to_axum_event(event_type: &str, data: serde_json::Value) -> Event {
    Event::default().event(event_type).data(data.to_string())
}
