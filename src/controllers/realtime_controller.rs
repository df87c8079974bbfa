use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{Extension, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::Stream;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use crate::{models::CurrentUser, AppState};

// GET /events
pub async fn sse_events(
    State(state): State<AppState>,
    Extension(u): Extension<CurrentUser>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.notifications.subscribe(&u.id);

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        let evt = match rx.recv().await {
            Ok(n) => Event::default()
                .event("priceAlert")
                .json_data(&n)
                .unwrap_or_else(|_| Event::default().event("ping").data("encode")),
            Err(RecvError::Lagged(_)) => Event::default().event("ping").data("lagged"),
            // Channel dropped on sign-out: end the stream.
            Err(RecvError::Closed) => return None,
        };

        Some((Ok(evt), rx))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(20))
            .text("keep-alive"),
    )
}

// GET /toasts
pub async fn get_toasts(
    State(state): State<AppState>,
    Extension(u): Extension<CurrentUser>,
) -> Json<serde_json::Value> {
    let toasts = state.notifications.drain_toasts(&u.id);
    Json(json!({ "toasts": toasts }))
}
