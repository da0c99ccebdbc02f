//! HTTP routes
//!
//! | Path | Description |
//! |------|-------------|
//! | `GET /` | Last published payload per tracked channel |
//! | `POST /publish-prediction` | Publish to `predictions` |
//! | `POST /publish-sub` | Publish to `subs` |
//! | `POST /publish-poll` | Publish a poll answer to `poll-answers` |
//! | `POST /publish-poll-answer` | Publish a poll to `polls` |
//! | `GET /stream?channel=<name>` | SSE stream for a channel |
//! | `GET /stream/:channel` | Same, channel in the path |
//!
//! `/publish-poll` and `/publish-poll-answer` route as deployed clients
//! expect: the poll route carries answers and the answer route carries
//! polls.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{Map, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::broadcast::{Publish, PublishReport};
use crate::error::{Error, Result};
use crate::payload::PayloadKind;
use crate::registry::event::{
    is_valid_channel_name, Event, POLLS_CHANNEL, POLL_ANSWERS_CHANNEL, PREDICTIONS_CHANNEL,
    SUBS_CHANNEL,
};

use super::auth::require_token;
use super::state::RelayState;

/// Build the relay router
pub fn router(state: Arc<RelayState>) -> Router {
    let publish = Router::new()
        .route("/publish-prediction", post(publish_prediction))
        .route("/publish-sub", post(publish_sub))
        .route("/publish-poll", post(publish_poll))
        .route("/publish-poll-answer", post(publish_poll_answer))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_token,
        ));

    let mut stream = Router::new()
        .route("/stream", get(stream_by_query))
        .route("/stream/:channel", get(stream_by_path));
    if state.config.cors_allow_any_origin {
        stream = stream.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET]),
        );
    }

    Router::new()
        .route("/", get(index))
        .merge(publish)
        .merge(stream)
        .with_state(state)
}

async fn index(State(state): State<Arc<RelayState>>) -> Json<Map<String, Value>> {
    Json(state.cache.snapshot_all())
}

async fn publish_prediction(State(state): State<Arc<RelayState>>, body: Bytes) -> Response {
    publish(&state, PayloadKind::Prediction, PREDICTIONS_CHANNEL, &body)
}

async fn publish_sub(State(state): State<Arc<RelayState>>, body: Bytes) -> Response {
    publish(&state, PayloadKind::Sub, SUBS_CHANNEL, &body)
}

async fn publish_poll(State(state): State<Arc<RelayState>>, body: Bytes) -> Response {
    publish(&state, PayloadKind::PollAnswer, POLL_ANSWERS_CHANNEL, &body)
}

async fn publish_poll_answer(State(state): State<Arc<RelayState>>, body: Bytes) -> Response {
    publish(&state, PayloadKind::Poll, POLLS_CHANNEL, &body)
}

fn publish(state: &RelayState, kind: PayloadKind, channel: &str, body: &[u8]) -> Response {
    match parse_and_publish(state, kind, channel, body) {
        Ok(_) => (StatusCode::OK, "OK").into_response(),
        Err(Error::Validation(e)) => {
            tracing::debug!(channel = %channel, error = %e, "Publish body rejected");
            bad_request()
        }
        Err(e) => {
            tracing::error!(channel = %channel, error = %e, "Publish failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

fn parse_and_publish(
    state: &RelayState,
    kind: PayloadKind,
    channel: &str,
    body: &[u8],
) -> Result<PublishReport> {
    let payload = kind.parse(body)?;
    state
        .broadcaster
        .publish(channel, Event::publish(channel, payload))
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    channel: Option<String>,
}

async fn stream_by_query(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<StreamQuery>,
) -> Response {
    match query.channel {
        Some(channel) => open_stream(&state, &channel),
        None => bad_request(),
    }
}

async fn stream_by_path(
    State(state): State<Arc<RelayState>>,
    Path(channel): Path<String>,
) -> Response {
    open_stream(&state, &channel)
}

fn open_stream(state: &RelayState, channel: &str) -> Response {
    if !is_valid_channel_name(channel) {
        return bad_request();
    }

    let permit = match state.stream_permits {
        Some(ref permits) => match Arc::clone(permits).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(channel = %channel, "Stream rejected: limit reached");
                return (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response();
            }
        },
        None => None,
    };

    // Dropped together with the response body when the client disconnects,
    // which closes the subscription and releases the permit.
    let events = state.registry.open(channel).map(move |event| {
        let _permit = &permit;
        Ok::<_, Infallible>(to_sse(&event))
    });

    Sse::new(events).into_response()
}

fn to_sse(event: &Event) -> SseEvent {
    SseEvent::default()
        .event(event.event_type.as_str())
        .data(event.data())
}

fn bad_request() -> Response {
    (StatusCode::BAD_REQUEST, "Bad Request").into_response()
}
