use crate::models::chat::ChatRequest;
use crate::relay::{ parse_turns, Relay, RelayError };
use crate::slo::{ SloClient, SloError, SloQuery };
use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    body::{ Body, Bytes },
    routing::{ get, post },
    Router,
    extract::{ State, Query },
    response::{ IntoResponse, Response },
    http::{ header, StatusCode },
    Json,
};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{ Any, CorsLayer };
use tower_http::services::ServeDir;
use log::{ info, error };

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), details: None, url: None }
    }

    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub slo: Arc<SloClient>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (code, body) = match self {
            RelayError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            RelayError::Misconfigured(msg) => {
                error!("Relay misconfigured: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new("LLM API key not configured"))
            }
            RelayError::Upstream(e) =>
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("LLM API error").with_details(e.to_string()),
                ),
        };
        (code, Json(body)).into_response()
    }
}

impl IntoResponse for SloError {
    fn into_response(self) -> Response {
        let (code, body) = match self {
            SloError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            SloError::Misconfigured =>
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(SloError::Misconfigured.to_string())),
            SloError::Upstream { status, details, url } => {
                let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (code, ErrorResponse { error: "SLO API error".into(), details: Some(details), url: Some(url) })
            }
            other => {
                error!("SLO API error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error").with_details(other.to_string()),
                )
            }
        };
        (code, Json(body)).into_response()
    }
}

pub fn router(state: AppState, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/llm", post(llm_handler))
        .route("/api/slo", get(slo_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    addr: &str,
    state: AppState,
    static_dir: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    let app = router(state, static_dir);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
        e
    })?;
    info!("DaCapo SLO Chat server running on http://{}", addr);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn llm_handler(State(state): State<AppState>, body: Bytes) -> Result<Response, RelayError> {
    let request: ChatRequest = serde_json
        ::from_slice(&body)
        .map_err(|_| RelayError::InvalidRequest("Messages array is required".into()))?;
    let turns = parse_turns(request.messages)?;
    let events = state.relay.relay(&turns).await?;

    let body = Body::from_stream(events.map(|event| Ok::<_, Infallible>(event.to_sse())));
    Ok(
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            body,
        ).into_response()
    )
}

async fn slo_handler(
    State(state): State<AppState>,
    Query(query): Query<SloQuery>,
) -> Result<Json<Value>, SloError> {
    let data = state.slo.fetch(&query).await?;
    Ok(Json(data))
}
