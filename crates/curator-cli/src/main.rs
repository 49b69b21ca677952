//! The `curator` binary: flag/env configuration and the serve loop.

use anyhow::Result;
use clap::Parser;
use curator_webhook_runtime::{run_webhook_runtime, WebhookRuntimeConfig};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "curator",
    about = "Webhook-driven repository auto-tagging service",
    version
)]
struct Cli {
    #[arg(
        long,
        env = "CURATOR_BIND",
        default_value = "127.0.0.1:8787",
        help = "host:port the webhook runtime listens on"
    )]
    bind: String,

    #[arg(
        long = "webhook-secret",
        env = "CURATOR_WEBHOOK_SECRET",
        help = "Shared secret expected in the x-webhook-secret header. When absent the intake rejects every delivery and /health reports degraded."
    )]
    webhook_secret: Option<String>,

    #[arg(
        long = "hub-token",
        env = "CURATOR_HUB_TOKEN",
        help = "Credential for the hub tag API and the inference route. When absent accepted events are recorded as errors and /health reports degraded."
    )]
    hub_token: Option<String>,

    #[arg(
        long = "hub-api-base",
        env = "CURATOR_HUB_API_BASE",
        help = "Base URL of the hub tag API, e.g. https://hub.internal.example"
    )]
    hub_api_base: Option<String>,

    #[arg(
        long = "inference-api-base",
        env = "CURATOR_INFERENCE_API_BASE",
        default_value = "https://api.openai.com/v1",
        help = "Base URL of the OpenAI-compatible inference API"
    )]
    inference_api_base: String,

    #[arg(
        long,
        env = "CURATOR_MODEL",
        default_value = "gpt-4o-mini",
        help = "Model used by the tagging agent"
    )]
    model: String,

    #[arg(
        long = "request-timeout-ms",
        env = "CURATOR_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        help = "Timeout for hub and inference requests"
    )]
    request_timeout_ms: u64,

    #[arg(
        long,
        env = "CURATOR_WORKERS",
        default_value_t = 4,
        help = "Background workers draining the task queue"
    )]
    workers: usize,

    #[arg(
        long = "queue-capacity",
        env = "CURATOR_QUEUE_CAPACITY",
        default_value_t = 64,
        help = "Bounded task queue depth; a full queue rejects deliveries with 503"
    )]
    queue_capacity: usize,

    #[arg(
        long = "ledger-capacity",
        env = "CURATOR_LEDGER_CAPACITY",
        default_value_t = 256,
        help = "Operation records kept in memory for /operations"
    )]
    ledger_capacity: usize,
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}


#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    run_webhook_runtime(WebhookRuntimeConfig {
        bind: cli.bind,
        webhook_secret: cli.webhook_secret,
        hub_token: cli.hub_token,
        hub_api_base: cli.hub_api_base,
        inference_api_base: cli.inference_api_base,
        model: cli.model,
        request_timeout_ms: cli.request_timeout_ms,
        worker_count: cli.workers,
        queue_capacity: cli.queue_capacity,
        ledger_capacity: cli.ledger_capacity,
    })
    .await
}
