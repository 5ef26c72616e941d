// rest/sse.rs — SSE task snapshot stream.
//
// GET /api/tasks/stream
//
// Each observer gets its own stream: a full snapshot of every work order
// immediately on connect, then a fresh snapshot every interval (5s by
// default). Heartbeat comments go out every 15s so idle proxies keep the
// connection open. Disconnect tears the stream down; reconnecting just
// starts a new one.

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures_util::stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::AppContext;

pub async fn tasks_stream(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let secs = ctx.config.notifier.snapshot_interval_secs.max(1);
    // first tick fires immediately, so the connect-time snapshot is free
    let ticker = tokio::time::interval(Duration::from_secs(secs));
    debug!(interval_secs = secs, "task stream observer connected");

    let s = stream::unfold((ctx, ticker), move |(ctx, mut ticker)| async move {
        loop {
            ticker.tick().await;
            let views = match ctx.workflow.list_all_views().await {
                Ok(views) => views,
                Err(e) => {
                    warn!(err = %e, "task snapshot failed — skipping tick");
                    continue;
                }
            };
            let data = match serde_json::to_string(&views) {
                Ok(data) => data,
                Err(e) => {
                    warn!(err = %e, "task snapshot serialization failed");
                    continue;
                }
            };
            let event = Event::default().data(data).event("snapshot");
            return Some((Ok::<Event, Infallible>(event), (ctx, ticker)));
        }
    });

    Sse::new(s).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
