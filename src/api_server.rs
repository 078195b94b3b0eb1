use anyhow::{anyhow, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use log::{debug, error, info};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::tools::ToolRegistry;

// API state shared across handlers
pub struct ApiState {
    pub tools: Arc<ToolRegistry>,
}

/// Body of `POST /invoke`.
#[derive(Debug, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

async fn health_check() -> &'static str {
    "OK"
}

async fn list_tools_handler(State(state): State<Arc<ApiState>>) -> Json<Value> {
    Json(json!({ "tools": state.tools.descriptors() }))
}

async fn invoke_handler(
    State(state): State<Arc<ApiState>>,
    Json(call): Json<ToolCall>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    debug!("Invoke request: {:?}", call);
    match state.tools.invoke(&call.tool, call.args).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            error!("Tool {} failed: {}", call.tool, e);
            Err((e.status_code(), Json(e.to_result())))
        }
    }
}

pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/tools", get(list_tools_handler))
        .route("/invoke", post(invoke_handler))
        .layer(cors)
        .with_state(state)
}

// Create and start the API server
pub async fn start_api_server(addr: SocketAddr, tools: Arc<ToolRegistry>) -> Result<()> {
    let app = router(Arc::new(ApiState { tools }));

    let listener =
        TcpListener::bind(addr).await.map_err(|e| anyhow!("Failed to bind to {}: {}", addr, e))?;
    info!("Tool endpoint listening on http://{}", addr);

    axum::serve(listener, app).await.map_err(|e| anyhow!("Failed to start API server: {}", e))?;

    Ok(())
}
