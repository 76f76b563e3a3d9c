//! Router for the UCP proxy API

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{Method, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::BroadcastStream;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;

type SharedState = Arc<AppState>;

/// Forward a commerce request to the merchant named by `baseUrl`.
/// The upstream status code and body pass through untouched; the
/// `debug` block echoes what was actually sent so the caller can
/// inspect it.
async fn proxy(
    axum::Json(payload): axum::Json<public::ProxyRequest>,
) -> Result<Response, ApiError> {
    let Some(base_url) = payload.base_url else {
        return Ok((
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"error": "baseUrl is required"})),
        )
            .into_response());
    };

    let url = format!("{}{}", base_url, payload.path);
    let method = Method::from_bytes(payload.method.as_bytes())?;

    let client = reqwest::Client::new();
    let mut request = client.request(method, &url);
    if let Some(headers) = &payload.headers {
        for (name, value) in headers {
            request = request.header(name, value);
        }
    }
    if let Some(body) = &payload.body {
        request = request.body(serde_json::to_string(body)?);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!("Proxy request to {} failed: {}", url, err);
            return Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({"error": err.to_string()})),
            )
                .into_response());
        }
    };

    let status = StatusCode::from_u16(response.status().as_u16())?;
    let text = response.text().await?;

    // Merchants are not obliged to speak JSON. Wrap anything else so
    // the caller still gets a structured body.
    let data: Value = if text.is_empty() {
        json!({})
    } else {
        serde_json::from_str(&text).unwrap_or_else(|_| json!({"response": text}))
    };

    let body = public::ProxyResponse {
        data,
        debug: public::ProxyDebug {
            sent_headers: payload.headers,
            url,
        },
    };

    Ok((status, axum::Json(body)).into_response())
}

/// Snapshot of every request the commerce client has made, newest
/// first
async fn logs(State(state): State<SharedState>) -> axum::Json<public::LogsResponse> {
    axum::Json(public::LogsResponse {
        logs: state.ucp.logs(),
    })
}

/// Stream log snapshots as they change
async fn logs_stream(
    State(state): State<SharedState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let initial = public::LogsResponse {
        logs: state.ucp.logs(),
    };
    let updates = BroadcastStream::new(state.ucp.subscribe())
        .filter_map(|snapshot| snapshot.ok())
        .map(|logs| snapshot_event(public::LogsResponse { logs }));

    let stream = tokio_stream::once(snapshot_event(initial)).chain(updates);

    Sse::new(stream).keep_alive(
        KeepAlive::default()
            .text("keep-alive")
            .interval(Duration::from_secs(15)),
    )
}

fn snapshot_event(snapshot: public::LogsResponse) -> Result<Event, Infallible> {
    let data = serde_json::to_string(&snapshot).unwrap_or_else(|_| String::from("{}"));
    Ok(Event::default().data(data))
}

/// Create the UCP router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/proxy", post(proxy))
        .route("/logs", get(logs))
        .route("/logs/stream", get(logs_stream))
}
