use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::GenerationError;
use crate::prompt::GenerationRequest;
use crate::question::Candidate;
use crate::response;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Anything that can turn a prompt into raw generated text.
pub trait QuestionGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

/// Build the prompt, call the generator and parse its reply.
#[instrument(skip_all, fields(title = %request.title, min = request.min_question_count))]
pub async fn generate_candidates<G: QuestionGenerator>(
    generator: &G,
    request: &GenerationRequest,
) -> Result<Vec<Candidate>, GenerationError> {
    let prompt = request.render();
    debug!(%prompt, "constructed prompt");

    let raw = generator.generate(&prompt).await?;
    debug!(%raw, "raw generation output");

    let candidates = response::parse(&raw)?;
    info!(count = candidates.len(), "generated question suggestions");
    Ok(candidates)
}

enum Backend {
    /// Google Generative Language API.
    Gemini {
        api_key: SecretString,
        model: String,
        base_url: String,
    },
    /// Plain `{prompt}` -> `{output}` endpoint, e.g. the bundled mock server.
    Endpoint { url: String },
}

pub struct LlmClient {
    http: Client,
    backend: Backend,
    timeout: Duration,
}

impl LlmClient {
    pub fn gemini(api_key: String, model: String, timeout: Duration) -> Self {
        Self::gemini_at(GEMINI_BASE_URL.to_string(), api_key, model, timeout)
    }

    /// Gemini client against a non-default API root, e.g. a regional proxy.
    pub fn gemini_at(base_url: String, api_key: String, model: String, timeout: Duration) -> Self {
        Self::with_backend(
            Backend::Gemini {
                api_key: SecretString::from(api_key),
                model,
                base_url,
            },
            timeout,
        )
    }

    pub fn endpoint(url: String, timeout: Duration) -> Self {
        Self::with_backend(Backend::Endpoint { url }, timeout)
    }

    /// Every call is bounded by `timeout`; an unanswered request surfaces as
    /// [`GenerationError::Transport`].
    fn with_backend(backend: Backend, timeout: Duration) -> Self {
        let http = Client::builder()
            .http1_only()
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            backend,
            timeout,
        }
    }

    pub fn describe(&self) -> String {
        match &self.backend {
            Backend::Gemini { model, .. } => format!("gemini ({model})"),
            Backend::Endpoint { url } => format!("endpoint {url}"),
        }
    }

    async fn call_gemini(
        &self,
        api_key: &SecretString,
        model: &str,
        base_url: &str,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }

        #[derive(Serialize)]
        struct Content<'a> {
            parts: Vec<Part<'a>>,
        }

        #[derive(Serialize)]
        struct GenerateRequest<'a> {
            contents: Vec<Content<'a>>,
        }

        #[derive(Deserialize)]
        struct GenerateResponse {
            #[serde(default)]
            candidates: Vec<ResponseCandidate>,
        }

        #[derive(Deserialize)]
        struct ResponseCandidate {
            content: Option<ResponseContent>,
        }

        #[derive(Deserialize)]
        struct ResponseContent {
            #[serde(default)]
            parts: Vec<ResponsePart>,
        }

        #[derive(Deserialize)]
        struct ResponsePart {
            text: Option<String>,
        }

        let url = format!("{}/models/{}:generateContent", base_url.trim_end_matches('/'), model);

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key.expose_secret())
            .timeout(self.timeout)
            .json(&GenerateRequest {
                contents: vec![Content {
                    parts: vec![Part { text: prompt }],
                }],
            })
            .send()
            .await
            .map_err(|e| GenerationError::Transport(format!("{e}. URL: {url}")))?;

        let resp = check_status(resp).await?;

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Transport(format!("unreadable reply: {e}")))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }

    async fn call_endpoint(&self, url: &str, prompt: &str) -> Result<String, GenerationError> {
        #[derive(Serialize)]
        struct LlmRequest<'a> {
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct LlmResponse {
            output: String,
        }

        let resp = self
            .http
            .post(url)
            .header("Connection", "close")
            .timeout(self.timeout)
            .json(&LlmRequest { prompt })
            .send()
            .await
            .map_err(|e| GenerationError::Transport(format!("{e}. URL: {url}")))?;

        let resp = check_status(resp).await?;

        let body: LlmResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Transport(format!("unreadable reply: {e}")))?;
        Ok(body.output)
    }
}

impl QuestionGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        match &self.backend {
            Backend::Gemini {
                api_key,
                model,
                base_url,
            } => self.call_gemini(api_key, model, base_url, prompt).await,
            Backend::Endpoint { url } => self.call_endpoint(url, prompt).await,
        }
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, GenerationError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(GenerationError::Service { status, body })
}
