//! Server-Sent-Events stream
//!
//! Emits `connected` once, then an `update` every 5 s with the last ten
//! poll results and each transmitter's newest stored metrics. Per-tick
//! work is two bounded queries, keeping the interval stable; the stream is
//! dropped when the client goes away.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};

use crate::AppState;

const UPDATE_INTERVAL: Duration = Duration::from_secs(5);
const RESULTS_PER_UPDATE: usize = 10;

pub async fn stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let connected = stream::once(async {
        Ok(Event::default().event("connected").data("{}"))
    });

    let updates = stream::unfold(state, |state| async move {
        tokio::time::sleep(UPDATE_INTERVAL).await;

        let results = state.poller.results(None, RESULTS_PER_UPDATE).await;
        let latest = state
            .store
            .get_all_latest_metrics()
            .await
            .unwrap_or_default();
        let payload = serde_json::json!({
            "results": results,
            "latestMetrics": latest,
        });
        let event = Event::default().event("update").data(payload.to_string());
        Some((Ok(event), state))
    });

    Sse::new(connected.chain(updates)).keep_alive(KeepAlive::default())
}
