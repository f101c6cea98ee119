use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Deserialize)]
struct LlmRequest {
    prompt: String,
}

#[derive(Serialize)]
struct LlmResponse {
    output: String,
}

#[derive(Clone)]
struct AppState {
    attempt_count: Arc<AtomicUsize>,
    fail_attempts: usize,
}

const MALFORMED_OUTPUT: &str =
    "Sure! Here are some great questions for your form:\n1. What is your name?\n2. Why do you want this job?";

// Wrapped in a fence on purpose; real models often do this.
const QUESTIONS_OUTPUT: &str = r#"```json
[
  { "text": "What is your full name?", "type": "text" },
  { "text": "How many years of professional experience do you have?", "type": "number" },
  { "text": "Describe the most complex project you have shipped.", "type": "textarea" },
  { "text": "Which seniority level fits you best?", "type": "radio", "options": ["Junior", "Mid", "Senior"] },
  { "text": "Which languages have you used in production?", "type": "checkbox", "options": ["Rust", "Go", "Python"] },
  { "text": "What is your preferred contact email?", "type": "email", "options": ["ignored"] },
  { "text": "When could you start?", "type": "date" },
  { "text": "Upload your CV", "type": "upload" }
]
```"#;

async fn llm(State(state): State<AppState>, Json(req): Json<LlmRequest>) -> Json<LlmResponse> {
    let attempt = state.attempt_count.fetch_add(1, Ordering::SeqCst) + 1;
    let preview: String = req.prompt.chars().take(200).collect();
    info!(attempt, %preview, "mock LLM received prompt");

    // Fail first N attempts to exercise the format error path
    let output = if attempt <= state.fail_attempts {
        info!("returning malformed output");
        MALFORMED_OUTPUT
    } else {
        info!("returning question array");
        QUESTIONS_OUTPUT
    };

    Json(LlmResponse {
        output: output.to_string(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    formwright::telemetry::init_tracing()?;

    let port = std::env::var("MOCK_LLM_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8081);

    let fail_attempts = std::env::var("MOCK_LLM_FAIL_ATTEMPTS")
        .ok()
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(1);

    let state = AppState {
        attempt_count: Arc::new(AtomicUsize::new(0)),
        fail_attempts,
    };

    let app = Router::new().route("/llm", post(llm)).with_state(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("mock LLM server listening on http://{addr}");
    info!("will fail first {fail_attempts} attempt(s)");
    info!("point LLM_BASE_URL at http://localhost:{port}/llm");

    axum::serve(listener, app).await?;
    Ok(())
}
