//! Server-Sent Events (SSE) broadcaster
//!
//! Streams session and settings events to connected clients. New clients
//! first receive the current session so they can render without polling.

use crate::api::server::AppContext;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use qari_common::events::QariEvent;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    // Subscribe before reading the snapshot so nothing falls in between
    let rx = ctx.state.subscribe_events();
    let initial = QariEvent::SessionChanged {
        session: ctx.state.current_session(),
        timestamp: chrono::Utc::now(),
    };

    let updates = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => to_sse_event(&event),
            Err(e) => {
                // Lagged client: it will catch up from the next SessionChanged
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    let stream = stream::iter(to_sse_event(&initial))
        .chain(updates)
        .map(Ok::<_, Infallible>);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_sse_event(event: &QariEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}
