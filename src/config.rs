use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::llm::LlmClient;
use crate::store::{FirebaseStore, MemoryStore, Store};

/// Server configuration. Every option can also come from the environment.
#[derive(Parser, Clone)]
#[command(name = "formwright")]
#[command(about = "Weighted form builder with AI question suggestions")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// API key for the Gemini generation service
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-pro")]
    pub gemini_model: String,

    /// Plain {prompt} -> {output} generation endpoint; takes precedence over Gemini
    #[arg(long, env = "LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    /// Seconds to wait for the generation service before giving up
    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value_t = 60)]
    pub llm_timeout_secs: u64,

    /// Firebase Realtime Database URL; forms stay in memory when unset
    #[arg(long, env = "FIREBASE_DATABASE_URL")]
    pub firebase_database_url: Option<String>,

    /// Auth token or secret appended to Firebase writes
    #[arg(long, env = "FIREBASE_AUTH", hide_env_values = true)]
    pub firebase_auth: Option<String>,

    /// Base URL used when building share links
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Directory with the frontend files served at `/`
    #[arg(long, env = "STATIC_DIR", default_value = "public")]
    pub static_dir: PathBuf,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn public_base_url(&self) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs.max(1))
    }

    /// The generation client, or `None` when generation is disabled.
    pub fn generator(&self) -> Option<LlmClient> {
        let timeout = self.llm_timeout();
        if let Some(url) = non_blank(&self.llm_base_url) {
            return Some(LlmClient::endpoint(url, timeout));
        }
        non_blank(&self.gemini_api_key)
            .map(|key| LlmClient::gemini(key, self.gemini_model.clone(), timeout))
    }

    pub fn store(&self) -> Store {
        match non_blank(&self.firebase_database_url) {
            Some(url) => Store::Firebase(FirebaseStore::new(url, non_blank(&self.firebase_auth))),
            None => Store::Memory(MemoryStore::new()),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
