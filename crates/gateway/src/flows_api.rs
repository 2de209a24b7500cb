//! Flow invocation endpoints.
//!
//! `POST /api/{flow}` and `POST /flows/{flow}` accept `{"data": input}` (a
//! bare input is accepted too) and answer `{"result": output}`. When the
//! client asks for `text/event-stream`, or passes `?stream=true`, chunks are
//! sent as `data: {"message": chunk}` events followed by one final
//! `data: {"result": output}` or `data: {"error": {...}}` event.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use flowdeck_core::error::{Error, FlowError};
use flowdeck_flows::{FlowInfo, FlowSink};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::convert::Infallible;
use tokio::task::AbortHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::warn;

use crate::SharedState;

/// Error body sent to clients, both as JSON and as a final stream event.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

/// A flow error rendered as `{"error": {"status", "message"}}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn http_status(&self) -> StatusCode {
        match &self.0 {
            Error::Flow(FlowError::NotFound(_)) => StatusCode::NOT_FOUND,
            err => match err.status() {
                "INVALID_ARGUMENT" => StatusCode::BAD_REQUEST,
                "RESOURCE_EXHAUSTED" => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": ErrorBody::from(&self.0) });
        (self.http_status(), Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RunQuery {
    #[serde(default)]
    stream: Option<String>,
}

/// Pull the flow input out of a request body.
///
/// An object with a `data` key is unwrapped; anything else is taken as the
/// input itself. An empty body is `null`.
pub fn extract_input(body: &[u8]) -> Result<Value, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| FlowError::InvalidInput(format!("request body is not JSON: {e}")))?;
    Ok(match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    })
}

fn wants_stream(headers: &HeaderMap, query: &RunQuery) -> bool {
    let accepts_sse = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"));
    let query_flag = query
        .stream
        .as_deref()
        .is_some_and(|v| v.is_empty() || v == "true" || v == "1");
    accepts_sse || query_flag
}

/// POST /api/{flow} and /flows/{flow}
pub async fn run_flow(
    State(state): State<SharedState>,
    Path(flow): Path<String>,
    Query(query): Query<RunQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if state.flows.get(&flow).is_none() {
        return Err(Error::from(FlowError::NotFound(flow)).into());
    }
    let input = extract_input(&body)?;

    if wants_stream(&headers, &query) {
        return Ok(stream_flow(state, flow, input).into_response());
    }

    let result = state.flows.run(&flow, input, None).await?;
    Ok(Json(json!({ "result": result })).into_response())
}

/// Aborts the flow task when dropped, so a client that goes away stops the
/// run instead of leaving it calling the model.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn stream_flow(
    state: SharedState,
    flow: String,
    input: Value,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let (sink, rx) = FlowSink::channel();
    let registry = state.flows.clone();
    let handle = tokio::spawn(async move { registry.run(&flow, input, Some(sink)).await });
    let guard = AbortOnDrop(handle.abort_handle());

    let chunks = UnboundedReceiverStream::new(rx).map(move |chunk| {
        let _ = &guard;
        Ok::<_, Infallible>(SseEvent::default().data(json!({ "message": chunk }).to_string()))
    });

    let done = futures::stream::once(async move {
        let payload = match handle.await {
            Ok(Ok(result)) => json!({ "result": result }),
            Ok(Err(e)) => json!({ "error": ErrorBody::from(&e) }),
            Err(e) => {
                warn!(error = %e, "Flow task aborted");
                json!({ "error": { "status": "INTERNAL", "message": e.to_string() } })
            }
        };
        Ok::<_, Infallible>(SseEvent::default().data(payload.to_string()))
    });

    Sse::new(chunks.chain(done)).keep_alive(KeepAlive::default())
}

/// GET /flows
pub async fn list_flows(State(state): State<SharedState>) -> Json<Vec<FlowInfo>> {
    Json(state.flows.list())
}
