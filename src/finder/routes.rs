//! REST endpoints for the expert-finder conversation.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, error, info_span, warn};
use uuid::Uuid;

use crate::error::{ConfigError, EngineError, OracleError};

use super::engine::ConversationEngine;
use super::model::ChatReply;
use super::state::{ConversationState, Message, Turn};

/// Message returned to users for any server-side failure.
pub const GENERIC_FAILURE: &str = "Something went wrong, please try again.";

/// Shared state for chat routes.
#[derive(Clone)]
pub struct ChatRouteState {
    pub engine: Arc<ConversationEngine>,
}

/// Body of `POST /api/chat`. `step` and `answers` are required: the
/// server keeps no conversation state to fall back on.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub step: usize,
    pub answers: Vec<String>,
}

/// Success envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEnvelope {
    pub data: ChatReply,
    pub status: u16,
    pub message: String,
}

/// Failure envelope. `stack` is always null so nothing internal leaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub status: u16,
    pub message: String,
    pub stack: Option<String>,
}

/// Errors surfaced by the chat routes.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => {
                warn!(error = %msg, "Rejected malformed chat request");
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::Engine(EngineError::InvalidState(msg)) => {
                warn!(error = %msg, "Rejected chat turn with invalid state");
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::Engine(EngineError::Oracle(e)) => {
                error!(error = %e, "Oracle failure");
                let status = match e {
                    OracleError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    OracleError::Llm(_) | OracleError::MalformedSynthesis { .. } => {
                        StatusCode::BAD_GATEWAY
                    }
                };
                (status, GENERIC_FAILURE.to_string())
            }
        };

        let body = ErrorEnvelope {
            success: false,
            status: status.as_u16(),
            message,
            stack: None,
        };
        (status, Json(body)).into_response()
    }
}

/// GET /
async fn root() -> &'static str {
    "Backend Running Successfully."
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "expert-finder"
    }))
}

/// POST /api/chat
///
/// Runs one conversation turn. The caller owns `step` and `answers` and must
/// apply `resolve` itself: on `true`, append its last message to `answers`
/// and increment `step`.
async fn send_chat(
    State(state): State<ChatRouteState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatEnvelope>, ApiError> {
    let Json(request) = payload?;
    let request_id = Uuid::new_v4();
    let span = info_span!("chat_turn", %request_id, step = request.step);

    async move {
        let state_in = ConversationState::new(request.step, request.answers);
        let turn = Turn::from_transcript(&request.messages, state_in)?;
        let response = state.engine.advance(&turn).await?;

        Ok::<_, ApiError>(Json(ChatEnvelope {
            data: ChatReply::from(response),
            status: StatusCode::OK.as_u16(),
            message: "Chat response retrieved successfully.".to_string(),
        }))
    }
    .instrument(span)
    .await
}

/// CORS policy for the browser frontend.
pub fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, ConfigError> {
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| ConfigError::InvalidValue {
                key: "EXPERT_FINDER_ALLOWED_ORIGINS".to_string(),
                message: format!("'{origin}': {e}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
            Method::HEAD,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true))
}

/// Build the chat REST routes.
pub fn chat_routes(state: ChatRouteState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/chat", post(send_chat))
        .with_state(state)
}

/// Full application router: routes plus CORS and request tracing.
pub fn app(
    engine: Arc<ConversationEngine>,
    allowed_origins: &[String],
) -> Result<Router, ConfigError> {
    let cors = cors_layer(allowed_origins)?;
    Ok(chat_routes(ChatRouteState { engine }).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::finder::model::tests::profile;
    use crate::finder::model::{ExpertProfile, ReplyKind, Requirements};
    use crate::finder::oracle::Oracle;
    use crate::finder::questions::QuestionSet;

    #[derive(Clone, Copy)]
    enum SynthesisFailure {
        Malformed,
        Timeout,
    }

    struct StubOracle {
        verdict: bool,
        synthesis_failure: Option<SynthesisFailure>,
        validations: AtomicUsize,
    }

    #[async_trait]
    impl Oracle for StubOracle {
        async fn validate(&self, _rule: &str, _answer: &str) -> Result<bool, OracleError> {
            self.validations.fetch_add(1, Ordering::SeqCst);
            Ok(self.verdict)
        }

        async fn synthesize(
            &self,
            _requirements: &Requirements,
        ) -> Result<Vec<ExpertProfile>, OracleError> {
            match self.synthesis_failure {
                Some(SynthesisFailure::Malformed) => {
                    return Err(OracleError::MalformedSynthesis {
                        reason: "trailing characters at line 3".into(),
                    });
                }
                Some(SynthesisFailure::Timeout) => {
                    return Err(OracleError::Timeout {
                        operation: "synthesize",
                        timeout: std::time::Duration::from_secs(30),
                    });
                }
                None => {}
            }
            Ok((0..10).map(|i| profile(&format!("Expert {i}"))).collect())
        }
    }

    fn router(
        verdict: bool,
        synthesis_failure: Option<SynthesisFailure>,
    ) -> (Router, Arc<StubOracle>) {
        let oracle = Arc::new(StubOracle {
            verdict,
            synthesis_failure,
            validations: AtomicUsize::new(0),
        });
        let engine = Arc::new(ConversationEngine::new(
            QuestionSet::default(),
            oracle.clone(),
        ));
        let origins = vec!["http://localhost:5173".to_string()];
        (app(engine, &origins).unwrap(), oracle)
    }

    async fn post_chat(router: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn opening_message_returns_first_question() {
        let (router, oracle) = router(true, None);
        let (status, body) = post_chat(
            router,
            serde_json::json!({
                "messages": [{"type": "user", "text": "I want to search expert"}],
                "step": 0,
                "answers": []
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], 200);
        assert_eq!(body["message"], "Chat response retrieved successfully.");
        assert_eq!(body["data"]["type"], "question");
        assert_eq!(body["data"]["resolve"], false);
        assert_eq!(
            body["data"]["content"],
            QuestionSet::default().get(0).unwrap().prompt.as_str()
        );
        assert_eq!(oracle.validations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn final_turn_returns_result_with_experts() {
        let (router, _) = router(true, None);
        let (status, body) = post_chat(
            router,
            serde_json::json!({
                "messages": [
                    {"type": "user", "text": "hi"},
                    {"type": "ai", "text": "sector?"},
                    {"type": "user", "text": "Fintech"},
                    {"type": "ai", "text": "skills?"},
                    {"type": "user", "text": "Python"},
                    {"type": "ai", "text": "countries?"},
                    {"type": "user", "text": "Germany"}
                ],
                "step": 2,
                "answers": ["Fintech", "Python"]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let reply: ChatReply = serde_json::from_value(body["data"].clone()).unwrap();
        assert_eq!(reply.kind, ReplyKind::Result);
        assert_eq!(reply.resolve, Some(true));
        assert_eq!(reply.expert.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn invalid_state_is_bad_request() {
        let (router, oracle) = router(true, None);
        let (status, body) = post_chat(
            router,
            serde_json::json!({
                "messages": [{"type": "user", "text": "a"}, {"type": "user", "text": "b"}],
                "step": 2,
                "answers": ["only one"]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], 400);
        assert!(body["stack"].is_null());
        assert_eq!(oracle.validations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_body_uses_error_envelope() {
        let (router, _) = router(true, None);
        let (status, body) = post_chat(router, serde_json::json!({"step": -1})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn oracle_failure_hides_detail() {
        let (router, _) = router(true, Some(SynthesisFailure::Malformed));
        let (status, body) = post_chat(
            router,
            serde_json::json!({
                "messages": [{"type": "user", "text": "x"}, {"type": "user", "text": "Germany"}],
                "step": 2,
                "answers": ["Fintech", "Python"]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["message"], GENERIC_FAILURE);
        assert!(!body.to_string().contains("trailing characters"));
    }

    #[tokio::test]
    async fn oracle_timeout_is_gateway_timeout() {
        let (router, _) = router(true, Some(SynthesisFailure::Timeout));
        let (status, body) = post_chat(
            router,
            serde_json::json!({
                "messages": [{"type": "user", "text": "x"}, {"type": "user", "text": "Germany"}],
                "step": 2,
                "answers": ["Fintech", "Python"]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], 504);
        assert_eq!(body["message"], GENERIC_FAILURE);
        assert!(body["stack"].is_null());
    }

    #[tokio::test]
    async fn missing_state_is_bad_request() {
        let (router, oracle) = router(true, None);
        let (status, body) = post_chat(
            router,
            serde_json::json!({
                "messages": [{"type": "user", "text": "hi"}, {"type": "user", "text": "Fintech"}]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("step"));
        assert_eq!(oracle.validations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn root_reports_running() {
        let (router, _) = router(true, None);
        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"Backend Running Successfully.");
    }

    #[tokio::test]
    async fn cors_allows_configured_origin_only() {
        let (router, _) = router(true, None);
        let preflight = |origin: &str| {
            Request::builder()
                .method("OPTIONS")
                .uri("/api/chat")
                .header("origin", origin)
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap()
        };

        let allowed = router
            .clone()
            .oneshot(preflight("http://localhost:5173"))
            .await
            .unwrap();
        assert_eq!(
            allowed.headers()["access-control-allow-origin"],
            "http://localhost:5173"
        );

        let denied = router
            .oneshot(preflight("http://evil.example"))
            .await
            .unwrap();
        assert!(
            denied
                .headers()
                .get("access-control-allow-origin")
                .is_none()
        );
    }

    #[test]
    fn cors_rejects_unparseable_origin() {
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
