//! HTTP request API
//!
//! `POST /api/v1/chat` drives one request through orchestration and the
//! engine. The governor is flagged busy for the duration so background
//! cycles never overlap request traffic.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use noesis_core::analytics::event_types;
use noesis_core::models::{ChatRequest, MasterResponse};
use noesis_core::Runtime;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub async fn run(runtime: Arc<Runtime>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", runtime.config.host, runtime.config.port);
    let app = Router::new()
        .route("/api/v1/chat", post(chat))
        .with_state(runtime);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("request API listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn chat(
    State(runtime): State<Arc<Runtime>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<MasterResponse>, (StatusCode, String)> {
    if request.query.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "query must not be empty".to_string()));
    }

    runtime.governor.set_busy();
    let result = handle_chat(&runtime, &request).await;
    runtime.governor.set_idle();

    match result {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            error!("chat request failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("internal server error: {}", e),
            ))
        }
    }
}

async fn handle_chat(
    runtime: &Runtime,
    request: &ChatRequest,
) -> noesis_core::Result<MasterResponse> {
    let cancel = CancellationToken::new();

    let affective_state = runtime.affective.assess(&request.query, None);
    runtime.analytics.publish(
        event_types::AFFECTIVE_STATE,
        serde_json::to_value(&affective_state).unwrap_or_default(),
    );

    let decision = runtime
        .orchestrator
        .decide(&request.query, &affective_state.summary(), &cancel)
        .await?;

    let response = runtime.engine.run(&request.query, decision, &cancel).await;

    // Feed the interaction into working memory; sessions flush to disk
    // for the offline consolidation cycle.
    runtime.observe_prediction_error(serde_json::json!({
        "query": request.query,
        "final_answer": response.final_answer,
        "session_id": request.session_id,
    }));

    Ok(response)
}
