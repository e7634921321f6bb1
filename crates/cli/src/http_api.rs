use crate::server_security::require_signature;
use crate::stream::{StreamHub, ToolEvent};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, StatusCode},
    middleware,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Router,
};
use scout_auth::{AuthError, SignatureVerifier};
use scout_mcp::{ToolContext, ToolError};
use scout_protocol::serialize_json;
use serde::Serialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

/// Shared state of the HTTP surface.
#[derive(Clone)]
pub struct HttpState {
    tools: ToolContext,
    verifier: Option<Arc<SignatureVerifier>>,
    hub: StreamHub,
}

impl HttpState {
    /// Without a verifier every protected route answers 500.
    pub fn new(tools: ToolContext, verifier: Option<SignatureVerifier>) -> Self {
        Self {
            tools,
            verifier: verifier.map(Arc::new),
            hub: StreamHub::new(),
        }
    }

    pub fn hub(&self) -> &StreamHub {
        &self.hub
    }

    pub(crate) fn verifier(&self) -> Option<&SignatureVerifier> {
        self.verifier.as_deref()
    }
}

/// `GET /health` is public; everything under `/api` needs a valid signature.
pub fn router(state: HttpState) -> Router {
    let protected = Router::new()
        .route("/tools/:name", post(call_tool))
        .route("/stream", get(event_stream))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_signature,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/api", protected)
        .with_state(state)
}

async fn health() -> Response {
    json_response(StatusCode::OK, &json!({ "status": "ok" }))
}

async fn call_tool(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let args = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(args) => args,
            Err(err) => {
                return tool_error_response(&ToolError::InvalidArguments(format!(
                    "Request body is not valid JSON: {err}"
                )));
            }
        }
    };

    let outcome = state.tools.call(&name, args).await;
    let (result_count, is_error) = match &outcome {
        Ok(reply) => (reply.result_count, false),
        Err(_) => (0, true),
    };
    state.hub.publish(ToolEvent {
        tool: name,
        result_count,
        is_error,
    });

    match outcome {
        Ok(reply) => json_response(StatusCode::OK, &reply.value),
        Err(err) => tool_error_response(&err),
    }
}

async fn event_stream(
    State(state): State<HttpState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.hub.subscribe();
    log::debug!(
        "Stream subscriber connected ({} active)",
        state.hub.subscriber_count()
    );

    let events = BroadcastStream::new(receiver).filter_map(|item| match item {
        Ok(event) => match Event::default().event("tool").json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(err) => {
                log::warn!("Failed to encode stream event: {err}");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            log::debug!("Stream subscriber lagged, skipped {skipped} events");
            None
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

pub(crate) fn status_for(error: &ToolError) -> StatusCode {
    match error {
        ToolError::AccessDenied(_) => StatusCode::FORBIDDEN,
        ToolError::NotFound(_) => StatusCode::NOT_FOUND,
        ToolError::InvalidArguments(_) => StatusCode::BAD_REQUEST,
        ToolError::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn tool_error_response(error: &ToolError) -> Response {
    json_response(status_for(error), &json!({ "error": error.envelope() }))
}

/// 401 with the generic reason for caller mistakes, 500 for server-side key problems.
pub(crate) fn auth_error_response(error: &AuthError) -> Response {
    if error.is_client_error() {
        json_response(
            StatusCode::UNAUTHORIZED,
            &json!({ "error": error.to_string() }),
        )
    } else {
        json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &json!({ "error": "Server authentication is not configured" }),
        )
    }
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match serialize_json(value) {
        Ok(body) => (status, [(CONTENT_TYPE, "application/json")], body).into_response(),
        Err(err) => {
            log::error!("Failed to encode response: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tool_errors_map_to_http_statuses() {
        let cases = [
            (ToolError::AccessDenied("x".into()), StatusCode::FORBIDDEN),
            (ToolError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ToolError::InvalidArguments("x".into()), StatusCode::BAD_REQUEST),
            (
                ToolError::Execution("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(status_for(&error), status, "{error:?}");
        }
    }

    #[test]
    fn auth_rejections_are_unauthorized_but_missing_key_is_a_server_error() {
        assert_eq!(
            auth_error_response(&AuthError::Expired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            auth_error_response(&AuthError::InvalidSignature).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            auth_error_response(&AuthError::MissingPublicKey).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
