//! Webhook intake runtime: authenticates inbound hub events, classifies
//! them, schedules detached tagging work, and exposes the audit ledger.
//!
//! The intake path (secret check, parse, classify, enqueue) is synchronous
//! and fast; everything that talks to the agent runs on the worker pool and
//! is only ever visible through `/operations`.

mod event_processing;
mod operation_ledger;
mod secret_validation;
mod tag_agent;
mod tag_extraction;
mod task_scheduler;
mod webhook_event;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use curator_core::{collapse_whitespace, truncate_chars};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use event_processing::{ProcessingContext, WorkItem};
pub use operation_ledger::{
    OperationLedger, OperationRecord, OperationStatus, TagToolCallResult,
    OPERATION_SCHEMA_VERSION,
};
pub use secret_validation::{validate_webhook_secret, WEBHOOK_SECRET_HEADER};
pub use tag_agent::{LlmTagAgent, LlmTagAgentConfig, TagAgent};
pub use tag_extraction::extract_candidate_tags;
pub use task_scheduler::TaskScheduler;
pub use webhook_event::{
    classify_event, parse_inbound_event, AcceptedEvent, EventDisposition, InboundEvent,
    ACCEPTED_ACTION, ACCEPTED_SCOPE,
};

const SERVICE_NAME: &str = "curator-webhook";
const OPERATIONS_WINDOW_LIMIT: usize = 50;
const COMMENT_PREVIEW_MAX_CHARS: usize = 140;

#[derive(Debug, Clone)]
/// Public struct `WebhookRuntimeConfig` used across Curator components.
pub struct WebhookRuntimeConfig {
    pub bind: String,
    pub webhook_secret: Option<String>,
    pub hub_token: Option<String>,
    pub hub_api_base: Option<String>,
    pub inference_api_base: String,
    pub model: String,
    pub request_timeout_ms: u64,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub ledger_capacity: usize,
}

impl Default for WebhookRuntimeConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            webhook_secret: None,
            hub_token: None,
            hub_api_base: None,
            inference_api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            request_timeout_ms: 30_000,
            worker_count: 4,
            queue_capacity: 64,
            ledger_capacity: 256,
        }
    }
}

/// Shared state behind every handler; owns the ledger, the scheduler handle,
/// and the agent adapter.
pub struct WebhookRuntimeState {
    webhook_secret: Option<String>,
    hub_token_configured: bool,
    worker_count: usize,
    queue_capacity: usize,
    ledger: OperationLedger,
    scheduler: TaskScheduler,
    agent: Arc<dyn TagAgent>,
}

impl WebhookRuntimeState {
    pub fn ledger(&self) -> &OperationLedger {
        &self.ledger
    }
}

/// Builds the runtime state with the production LLM-backed agent adapter.
pub fn build_webhook_runtime_state(
    config: &WebhookRuntimeConfig,
) -> Result<Arc<WebhookRuntimeState>> {
    let agent = LlmTagAgent::from_config(&LlmTagAgentConfig {
        hub_token: config.hub_token.clone(),
        hub_api_base: config.hub_api_base.clone(),
        inference_api_base: config.inference_api_base.clone(),
        model: config.model.clone(),
        request_timeout_ms: config.request_timeout_ms,
    })
    .context("failed to construct tagging agent")?;
    Ok(build_webhook_runtime_state_with_agent(config, Arc::new(agent)))
}

/// Builds the runtime state around a caller-supplied agent adapter. The
/// worker pool is spawned here and drains until the state is dropped.
pub fn build_webhook_runtime_state_with_agent(
    config: &WebhookRuntimeConfig,
    agent: Arc<dyn TagAgent>,
) -> Arc<WebhookRuntimeState> {
    let ledger = OperationLedger::new(config.ledger_capacity);
    let scheduler = TaskScheduler::start(
        config.queue_capacity,
        config.worker_count,
        ProcessingContext {
            ledger: ledger.clone(),
            agent: agent.clone(),
        },
    );

    Arc::new(WebhookRuntimeState {
        webhook_secret: config.webhook_secret.clone(),
        hub_token_configured: config
            .hub_token
            .as_deref()
            .map(str::trim)
            .is_some_and(|token| !token.is_empty()),
        worker_count: config.worker_count.max(1),
        queue_capacity: config.queue_capacity.max(1),
        ledger,
        scheduler,
        agent,
    })
}

/// Assembles the HTTP surface over the shared state.
pub fn build_webhook_router(state: Arc<WebhookRuntimeState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/operations", get(handle_operations))
        .route("/webhook", post(handle_webhook))
        .route("/simulate", post(handle_simulate))
        .with_state(state)
}

/// Runs the webhook runtime until ctrl-c.
pub async fn run_webhook_runtime(config: WebhookRuntimeConfig) -> Result<()> {
    let bind_addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}': expected host:port", config.bind))?;
    let state = build_webhook_runtime_state(&config)?;

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind webhook runtime on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve webhook runtime listen address")?;

    println!(
        "webhook runtime listening: addr={} workers={} queue_capacity={} secret_configured={} hub_token_configured={}",
        local_addr,
        state.worker_count,
        state.queue_capacity,
        state.webhook_secret.is_some(),
        state.hub_token_configured,
    );

    let app = build_webhook_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("webhook runtime server exited unexpectedly")?;
    Ok(())
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        })),
    )
        .into_response()
}

async fn handle_webhook(
    State(state): State<Arc<WebhookRuntimeState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    if !validate_webhook_secret(provided, state.webhook_secret.as_deref()) {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "webhook_secret_invalid",
            "missing or incorrect webhook secret",
        );
    }

    let event = match parse_inbound_event(&body) {
        Ok(event) => event,
        Err(error) => {
            warn!("webhook payload dropped: {error}");
            return error_response(
                StatusCode::BAD_REQUEST,
                "webhook_payload_invalid",
                &format!("payload did not parse: {error}"),
            );
        }
    };

    process_authorized_event(&state, event)
}

#[derive(Debug, Clone, Deserialize)]
struct SimulateRequest {
    repo_name: String,
    discussion_title: String,
    comment_content: String,
}

/// Same-process simulation entry point: synthesizes an accepted-shaped event
/// and drives it through the same pipeline as `/webhook`, minus the secret
/// gate.
async fn handle_simulate(
    State(state): State<Arc<WebhookRuntimeState>>,
    Json(request): Json<SimulateRequest>,
) -> Response {
    let synthesized = json!({
        "event": { "action": ACCEPTED_ACTION, "scope": ACCEPTED_SCOPE },
        "comment": {
            "content": request.comment_content,
            "author": { "id": "simulator" }
        },
        "discussion": { "title": request.discussion_title, "num": 0 },
        "repo": { "name": request.repo_name }
    });
    let event = match parse_inbound_event(synthesized.to_string().as_bytes()) {
        Ok(event) => event,
        Err(error) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "webhook_payload_invalid",
                &format!("synthesized payload did not parse: {error}"),
            );
        }
    };

    process_authorized_event(&state, event)
}

fn process_authorized_event(state: &Arc<WebhookRuntimeState>, event: InboundEvent) -> Response {
    match classify_event(&event) {
        EventDisposition::Ignored { reason } => {
            info!(reason = %reason, "webhook event ignored");
            (
                StatusCode::OK,
                Json(json!({ "status": "ignored", "reason": reason })),
            )
                .into_response()
        }
        EventDisposition::Accepted => match AcceptedEvent::from_inbound(event) {
            Ok(accepted) => accept_event(state, accepted),
            Err(message) => {
                warn!("webhook payload dropped: {message}");
                error_response(
                    StatusCode::BAD_REQUEST,
                    "webhook_payload_incomplete",
                    &message,
                )
            }
        },
    }
}

fn accept_event(state: &Arc<WebhookRuntimeState>, accepted: AcceptedEvent) -> Response {
    let preview = truncate_chars(
        &collapse_whitespace(&accepted.comment_content),
        COMMENT_PREVIEW_MAX_CHARS,
    );
    let operation_id = state.ledger.append(
        accepted.repo_name.clone(),
        accepted.discussion_num,
        accepted.author_id.clone(),
        preview,
    );

    match state.scheduler.try_enqueue(WorkItem {
        operation_id,
        event: accepted,
    }) {
        Ok(()) => {
            info!(operation_id, "webhook event accepted");
            (
                StatusCode::OK,
                Json(json!({ "status": "accepted", "operation_id": operation_id })),
            )
                .into_response()
        }
        Err(item) => {
            state
                .ledger
                .fail(item.operation_id, "task queue full; operation rejected");
            warn!(
                operation_id = item.operation_id,
                "task queue full; webhook event rejected"
            );
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "task_queue_full",
                "task queue is full; retry later",
            )
        }
    }
}

async fn handle_health(State(state): State<Arc<WebhookRuntimeState>>) -> Response {
    let secret_configured = state.webhook_secret.is_some();
    let agent_ready = state.agent.is_configured();
    let status = if secret_configured && state.hub_token_configured && agent_ready {
        "ok"
    } else {
        "degraded"
    };
    (
        StatusCode::OK,
        Json(json!({
            "status": status,
            "secret_configured": secret_configured,
            "hub_token_configured": state.hub_token_configured,
            "agent_ready": agent_ready,
            "workers": state.worker_count,
            "queue_capacity": state.queue_capacity,
        })),
    )
        .into_response()
}

async fn handle_operations(State(state): State<Arc<WebhookRuntimeState>>) -> Response {
    let operations = state.ledger.snapshot(OPERATIONS_WINDOW_LIMIT);
    (
        StatusCode::OK,
        Json(json!({
            "ledger_size": state.ledger.len(),
            "total_appended": state.ledger.total_appended(),
            "operations": operations,
        })),
    )
        .into_response()
}

async fn handle_index() -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": ["/", "/health", "/operations", "/webhook", "/simulate"],
        })),
    )
        .into_response()
}
