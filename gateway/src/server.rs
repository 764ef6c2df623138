use std::fmt::Display;
use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::assistant::graph::report_graph;
use crate::configuration::Settings;
use crate::driver::{PlanFeedback, ResearchDriver};
use crate::graph::GraphError;
use crate::llm::{LlmError, Message};
use crate::toolbox::{HttpToolbox, Toolbox};

pub const GREETING: &str = "Hello from FastAPI on Azure!";

#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    toolbox: Arc<dyn Toolbox>,
    research: Arc<ResearchDriver>,
}

impl AppState {
    pub fn new(settings: Settings, toolbox: Arc<dyn Toolbox>) -> Self {
        let research = ResearchDriver::new(report_graph(toolbox.clone()), settings.max_plan_resumes);
        Self {
            settings: Arc::new(settings),
            toolbox,
            research: Arc::new(research),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    request: String,
}

#[derive(Debug, Deserialize)]
pub struct ResearchParams {
    request: String,
    feedback: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LlmResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResearchResponse {
    pub response: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    detail: String,
}

// Every failure surfaces as its message under `detail`.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn internal(err: impl Display) -> Self {
        let detail = err.to_string();
        error!("request failed: {}", detail);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorDetail { detail: self.detail })).into_response()
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        ApiError::internal(err)
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        ApiError::internal(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: rejection.body_text(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(read_root))
        .route("/query", get(query_llm))
        .route("/dr", get(deep_research))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let toolbox = Arc::new(HttpToolbox::new(
        reqwest::Client::new(),
        settings.credentials.clone(),
        settings.ollama_url.clone(),
    ));
    let addr = settings.bind_addr();
    let app = build_router(AppState::new(settings, toolbox));

    let listener = TcpListener::bind(&addr).await?;
    info!("Starting server on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn read_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": GREETING }))
}

async fn query_llm(
    State(state): State<AppState>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<LlmResponse>, ApiError> {
    let Query(params) = params?;
    info!(
        provider = %state.settings.query_provider,
        model = %state.settings.query_model,
        "forwarding query"
    );

    let llm = state
        .toolbox
        .chat_model(state.settings.query_provider, &state.settings.query_model)?;
    let response = llm.invoke(&[Message::user(params.request)]).await?;
    Ok(Json(LlmResponse { response }))
}

async fn deep_research(
    State(state): State<AppState>,
    params: Result<Query<ResearchParams>, QueryRejection>,
) -> Result<Json<ResearchResponse>, ApiError> {
    let Query(params) = params?;
    info!(topic = %params.request, "starting deep research");

    let response = state
        .research
        .run(
            &params.request,
            &state.settings.research,
            PlanFeedback::from_param(params.feedback),
        )
        .await?;
    Ok(Json(ResearchResponse { response }))
}
