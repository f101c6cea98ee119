//! HTTP surface: the stateless generation endpoint, the editing-session API
//! and the static frontend.

mod error;
mod extract;
mod handlers;

use std::path::Path;
use std::sync::Arc;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::llm::{LlmClient, QuestionGenerator};
use crate::session::EditingSession;
use crate::store::Store;

pub use error::AppError;

pub type SharedSession = Arc<Mutex<EditingSession>>;

/// Shared state behind every handler.
pub struct AppState<G = LlmClient> {
    pub generator: Option<Arc<G>>,
    pub store: Arc<Store>,
    pub sessions: Arc<DashMap<Uuid, SharedSession>>,
    pub base_url: String,
}

impl<G> Clone for AppState<G> {
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
            store: self.store.clone(),
            sessions: self.sessions.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

impl<G> AppState<G> {
    pub fn new(generator: Option<G>, store: Store, base_url: String) -> Self {
        Self {
            generator: generator.map(Arc::new),
            store: Arc::new(store),
            sessions: Arc::new(DashMap::new()),
            base_url,
        }
    }

    pub(crate) fn session(&self, id: Uuid) -> Result<SharedSession, AppError> {
        self.sessions
            .get(&id)
            .map(|s| s.value().clone())
            .ok_or(AppError::SessionNotFound)
    }
}

/// API routes without the static file fallback.
pub fn api_router<G: QuestionGenerator + 'static>(state: AppState<G>) -> Router {
    Router::new()
        .route("/generate-questions", post(handlers::generate_questions::<G>))
        .route("/sessions", post(handlers::create_session::<G>))
        .route(
            "/sessions/:id",
            get(handlers::get_session::<G>).delete(handlers::delete_session::<G>),
        )
        .route("/sessions/:id/details", put(handlers::update_details::<G>))
        .route("/sessions/:id/parameters", put(handlers::save_parameters::<G>))
        .route("/sessions/:id/questions", post(handlers::add_question::<G>))
        .route(
            "/sessions/:id/questions/:qid",
            patch(handlers::edit_question::<G>).delete(handlers::remove_question::<G>),
        )
        .route(
            "/sessions/:id/questions/:qid/options",
            post(handlers::add_option::<G>),
        )
        .route(
            "/sessions/:id/questions/:qid/options/:index",
            delete(handlers::remove_option::<G>),
        )
        .route("/sessions/:id/generate", post(handlers::generate_for_session::<G>))
        .route(
            "/sessions/:id/suggestions/:batch/:position/accept",
            post(handlers::accept_suggestion::<G>),
        )
        .route(
            "/sessions/:id/suggestions/:batch/:position/reject",
            post(handlers::reject_suggestion::<G>),
        )
        .route("/sessions/:id/publish", post(handlers::publish::<G>))
        .route("/forms/:form_id", get(handlers::get_form::<G>))
        .with_state(state)
}

/// Full application: API, static frontend and middleware.
pub fn build_router<G: QuestionGenerator + 'static>(state: AppState<G>, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api_router(state)
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
