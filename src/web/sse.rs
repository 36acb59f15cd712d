//! Server-Sent Events (SSE) handler for the live counter feed

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::routes::{ApiQuery, StoreQuery};
use super::AppState;

pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<StoreQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_bus.subscribe();
    let stream = BroadcastStream::new(rx);
    let store_filter = query.store_id.filter(|id| !id.trim().is_empty());

    // Lagged receivers skip the missed snapshots
    let event_stream = stream.filter_map(move |result| {
        let snapshot = result.ok()?;
        if let Some(store) = &store_filter {
            if &snapshot.store_id != store {
                return None;
            }
        }
        let json = serde_json::to_string(&*snapshot).ok()?;
        Some(Ok(Event::default().data(json).event("live")))
    });

    Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
