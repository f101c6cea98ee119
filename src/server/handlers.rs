use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use super::extract::ApiJson;
use super::{AppError, AppState};
use crate::error::GenerationError;
use crate::form::{FormId, QuestionEdit};
use crate::llm::{generate_candidates, QuestionGenerator};
use crate::parameter::ParameterSet;
use crate::prompt::GenerationRequest;
use crate::question::{Candidate, QuestionId};
use crate::review::CandidateRef;
use crate::session::{EditingSession, Published, SessionView};
use crate::store::StoredForm;

#[derive(Debug, Deserialize)]
pub struct ParameterInput {
    pub name: String,
    pub percentage: i64,
    #[serde(default = "included_by_default")]
    pub included: bool,
}

fn included_by_default() -> bool {
    true
}

fn parameter_set(inputs: &[ParameterInput]) -> Result<ParameterSet, AppError> {
    let mut set = ParameterSet::new();
    for p in inputs {
        set.add(&p.name, p.percentage)?;
        if !p.included {
            set.set_included(&p.name, false)?;
        }
    }
    Ok(set)
}

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub parameters: Vec<ParameterInput>,
}

/// Stateless generation: prompt in, normalized candidates out.
pub async fn generate_questions<G: QuestionGenerator + 'static>(
    State(state): State<AppState<G>>,
    ApiJson(body): ApiJson<GenerateBody>,
) -> Result<Json<Vec<Candidate>>, AppError> {
    let generator = state.generator.ok_or(GenerationError::Unavailable)?;
    let parameters = parameter_set(&body.parameters)?;
    parameters.check_budget()?;

    info!(title = %body.title, parameters = parameters.len(), "received generation request");
    let request = GenerationRequest::new(&body.title, &body.instructions, &parameters);
    let candidates = generate_candidates(generator.as_ref(), &request).await?;
    Ok(Json(candidates))
}

pub async fn create_session<G>(
    State(state): State<AppState<G>>,
) -> (StatusCode, Json<SessionView>) {
    let session = EditingSession::new();
    let view = session.view();
    state
        .sessions
        .insert(session.id(), Arc::new(Mutex::new(session)));
    info!(session = %view.id, "session started");
    (StatusCode::CREATED, Json(view))
}

pub async fn get_session<G>(
    State(state): State<AppState<G>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(id)?;
    let view = session.lock().await.view();
    Ok(Json(view))
}

/// End a session. A generation request still running for it finishes into
/// the dropped session and its result is discarded.
pub async fn delete_session<G>(
    State(state): State<AppState<G>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .remove(&id)
        .ok_or(AppError::SessionNotFound)?;
    info!(session = %id, "session ended");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct DetailsBody {
    pub title: String,
    #[serde(default)]
    pub instructions: String,
}

pub async fn update_details<G>(
    State(state): State<AppState<G>>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<DetailsBody>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(id)?;
    let mut s = session.lock().await;
    s.set_details(body.title, body.instructions);
    Ok(Json(s.view()))
}

#[derive(Debug, Deserialize)]
pub struct ParametersBody {
    pub parameters: Vec<ParameterInput>,
}

pub async fn save_parameters<G>(
    State(state): State<AppState<G>>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<ParametersBody>,
) -> Result<Json<SessionView>, AppError> {
    let parameters = parameter_set(&body.parameters)?;
    let session = state.session(id)?;
    let mut s = session.lock().await;
    s.save_parameters(parameters)?;
    Ok(Json(s.view()))
}

pub async fn add_question<G>(
    State(state): State<AppState<G>>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let session = state.session(id)?;
    let mut s = session.lock().await;
    s.add_question();
    Ok((StatusCode::CREATED, Json(s.view())))
}

pub async fn edit_question<G>(
    State(state): State<AppState<G>>,
    Path((id, qid)): Path<(Uuid, String)>,
    ApiJson(edit): ApiJson<QuestionEdit>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(id)?;
    let mut s = session.lock().await;
    s.edit_question(&QuestionId::from(qid.as_str()), edit)?;
    Ok(Json(s.view()))
}

pub async fn remove_question<G>(
    State(state): State<AppState<G>>,
    Path((id, qid)): Path<(Uuid, String)>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(id)?;
    let mut s = session.lock().await;
    s.remove_question(&QuestionId::from(qid.as_str()))?;
    Ok(Json(s.view()))
}

#[derive(Debug, Deserialize)]
pub struct OptionBody {
    pub text: String,
}

pub async fn add_option<G>(
    State(state): State<AppState<G>>,
    Path((id, qid)): Path<(Uuid, String)>,
    ApiJson(body): ApiJson<OptionBody>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(id)?;
    let mut s = session.lock().await;
    s.add_option(&QuestionId::from(qid.as_str()), body.text)?;
    Ok(Json(s.view()))
}

pub async fn remove_option<G>(
    State(state): State<AppState<G>>,
    Path((id, qid, index)): Path<(Uuid, String, usize)>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(id)?;
    let mut s = session.lock().await;
    s.remove_option(&QuestionId::from(qid.as_str()), index)?;
    Ok(Json(s.view()))
}

/// Generate suggestions for a session.
///
/// The session lock is released while the service is working. The round trip
/// runs in its own task, so the in-flight marker is cleared even if the
/// client goes away.
pub async fn generate_for_session<G: QuestionGenerator + 'static>(
    State(state): State<AppState<G>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let generator = state.generator.clone().ok_or(GenerationError::Unavailable)?;
    let session = state.session(id)?;
    let ticket = session.lock().await.begin_generation()?;
    let ticket_id = ticket.id;

    let task_session = session.clone();
    let task = tokio::spawn(async move {
        let prompt = ticket.request.render();
        let outcome = generator.generate(&prompt).await;
        task_session.lock().await.finish_generation(ticket.id, outcome)
    });
    let finished = match task.await {
        Ok(finished) => finished,
        Err(e) => {
            session.lock().await.abandon_generation(ticket_id);
            return Err(AppError::Internal(format!("generation task failed: {e}")));
        }
    };

    // The session may have been ended while the service was working.
    if !state.sessions.contains_key(&id) {
        return Err(AppError::SessionNotFound);
    }
    finished?;

    let view = session.lock().await.view();
    Ok(Json(view))
}

pub async fn accept_suggestion<G>(
    State(state): State<AppState<G>>,
    Path((id, batch, position)): Path<(Uuid, u64, usize)>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(id)?;
    let mut s = session.lock().await;
    s.accept(CandidateRef { batch, position })?;
    Ok(Json(s.view()))
}

pub async fn reject_suggestion<G>(
    State(state): State<AppState<G>>,
    Path((id, batch, position)): Path<(Uuid, u64, usize)>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(id)?;
    let mut s = session.lock().await;
    s.reject(CandidateRef { batch, position })?;
    Ok(Json(s.view()))
}

/// Publish the draft. Local edits are not blocked while the store works.
pub async fn publish<G>(
    State(state): State<AppState<G>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Published>, AppError> {
    use crate::store::DocumentStore;

    let session = state.session(id)?;
    let record = session.lock().await.prepare_publish()?;
    let form_id = state.store.push(&record).await?;
    let published = session
        .lock()
        .await
        .record_published(form_id, &state.base_url);
    info!(session = %id, form_id = %published.form_id, "form published");
    Ok(Json(published))
}

pub async fn get_form<G>(
    State(state): State<AppState<G>>,
    Path(form_id): Path<String>,
) -> Result<Json<StoredForm>, AppError> {
    let store = state.store.memory().ok_or(AppError::FormNotFound)?;
    store
        .get(&FormId(form_id))?
        .map(Json)
        .ok_or(AppError::FormNotFound)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use axum::Router;
    use serde_json::{json, Value};
    use tokio::sync::Notify;
    use tower::ServiceExt;

    use crate::error::GenerationError;
    use crate::llm::testing::ScriptedGenerator;
    use crate::llm::QuestionGenerator;
    use crate::server::{api_router, AppState};
    use crate::store::{MemoryStore, Store};

    fn app(generator: Option<ScriptedGenerator>) -> Router {
        app_with(generator)
    }

    fn app_with<G: QuestionGenerator + 'static>(generator: Option<G>) -> Router {
        api_router(AppState::new(
            generator,
            Store::Memory(MemoryStore::new()),
            "http://forms.test".into(),
        ))
    }

    /// Holds every generation call until the test releases it.
    #[derive(Default)]
    struct Gate {
        started: Notify,
        release: Notify,
    }

    struct GatedGenerator(Arc<Gate>);

    impl QuestionGenerator for GatedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.0.started.notify_one();
            self.0.release.notified().await;
            Ok(r#"[{"text":"late"}]"#.into())
        }
    }

    struct CrashingGenerator;

    impl QuestionGenerator for CrashingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            panic!("generator crashed")
        }
    }

    async fn titled_session(app: &Router) -> String {
        let (_, view) = call(app, Method::POST, "/sessions", None).await;
        let base = format!("/sessions/{}", view["id"].as_str().unwrap());
        let (status, _) = call(
            app,
            Method::PUT,
            &format!("{base}/details"),
            Some(json!({ "title": "Warehouse Lead" })),
        )
        .await;
        assert_eq!(status, 200);
        base
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (u16, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status().as_u16();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn generation_disabled_without_generator() {
        let app = app(None);
        let (status, body) = call(
            &app,
            Method::POST,
            "/generate-questions",
            Some(json!({ "title": "T", "instructions": "", "parameters": [] })),
        )
        .await;
        assert_eq!(status, 503);
        assert_eq!(body["code"], "GENERATION_UNAVAILABLE");

        let (status, _) = call(&app, Method::POST, "/sessions", None).await;
        assert_eq!(status, 201);
    }

    #[tokio::test]
    async fn stateless_generation_returns_normalized_candidates() {
        let app = app(Some(ScriptedGenerator::ok(
            "```json\n[{\"text\":\"Q1\",\"type\":\"radio\"},{\"text\":\"Q2\"}]\n```",
        )));
        let (status, body) = call(
            &app,
            Method::POST,
            "/generate-questions",
            Some(json!({
                "title": "Analyst",
                "instructions": "generate 2 questions",
                "parameters": [{ "name": "Excel", "percentage": 40 }]
            })),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(
            body,
            json!([
                { "text": "Q1", "type": "radio", "options": [], "required": false },
                { "text": "Q2", "type": "text", "required": false }
            ])
        );
    }

    #[tokio::test]
    async fn stateless_generation_reports_bad_output_and_bad_weights() {
        let app = app(Some(ScriptedGenerator::ok("no json here")));
        let (status, body) = call(
            &app,
            Method::POST,
            "/generate-questions",
            Some(json!({ "title": "T", "parameters": [{ "name": "A", "percentage": 20 }] })),
        )
        .await;
        assert_eq!(status, 502);
        assert_eq!(body["code"], "GENERATION_FORMAT");

        let (status, body) = call(
            &app,
            Method::POST,
            "/generate-questions",
            Some(json!({ "title": "T", "parameters": [{ "name": "A", "percentage": 120 }] })),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["code"], "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn full_session_flow() {
        let app = app(Some(ScriptedGenerator::ok(
            r#"[{"text":"Team size?","type":"number"},{"text":"Stack","type":"checkbox","options":["Rust","Go"]}]"#,
        )));

        let (_, view) = call(&app, Method::POST, "/sessions", None).await;
        let id = view["id"].as_str().unwrap().to_string();
        let base = format!("/sessions/{id}");

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("{base}/details"),
            Some(json!({ "title": "Lead Engineer", "instructions": "generate 2 questions" })),
        )
        .await;
        assert_eq!(status, 200);

        let (status, view) = call(
            &app,
            Method::PUT,
            &format!("{base}/parameters"),
            Some(json!({ "parameters": [
                { "name": "Experience", "percentage": 50 },
                { "name": "Education", "percentage": 30, "included": false }
            ] })),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(view["totalWeight"], 50);

        let (status, view) = call(&app, Method::POST, &format!("{base}/generate"), None).await;
        assert_eq!(status, 200);
        assert_eq!(view["generating"], false);
        let suggestions = view["suggestions"].as_array().unwrap();
        assert_eq!(suggestions.len(), 2);
        let batch = suggestions[1]["ref"]["batch"].as_u64().unwrap();

        let (status, view) = call(
            &app,
            Method::POST,
            &format!("{base}/suggestions/{batch}/1/accept"),
            None,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(view["questions"][0]["text"], "Stack");
        assert_eq!(view["questions"][0]["options"], json!(["Rust", "Go"]));

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("{base}/suggestions/{batch}/1/accept"),
            None,
        )
        .await;
        assert_eq!(status, 409);
        assert_eq!(body["code"], "STALE_CANDIDATE");

        let (status, view) = call(
            &app,
            Method::POST,
            &format!("{base}/suggestions/{batch}/0/reject"),
            None,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(view["showNoSuggestions"], true);
        assert_eq!(view["questions"].as_array().unwrap().len(), 1);

        let (status, published) = call(&app, Method::POST, &format!("{base}/publish"), None).await;
        assert_eq!(status, 200);
        let form_id = published["formId"].as_str().unwrap();
        assert_eq!(
            published["links"]["results"],
            format!("http://forms.test/results.html?formId={form_id}")
        );

        let (status, form) = call(&app, Method::GET, &format!("/forms/{form_id}"), None).await;
        assert_eq!(status, 200);
        assert_eq!(form["title"], "Lead Engineer");
        assert_eq!(form["questions"][0]["type"], "checkbox");
    }

    #[tokio::test]
    async fn question_editing_over_http() {
        let app = app(None);
        let (_, view) = call(&app, Method::POST, "/sessions", None).await;
        let base = format!("/sessions/{}", view["id"].as_str().unwrap());

        let (status, view) = call(&app, Method::POST, &format!("{base}/questions"), None).await;
        assert_eq!(status, 201);
        let qid = view["questions"][0]["id"].as_str().unwrap().to_string();

        let (status, view) = call(
            &app,
            Method::PATCH,
            &format!("{base}/questions/{qid}"),
            Some(json!({ "text": "Shift?", "type": "radio", "options": ["Day", "Night"] })),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(view["questions"][0]["options"], json!(["Day", "Night"]));

        let (_, view) = call(
            &app,
            Method::POST,
            &format!("{base}/questions/{qid}/options"),
            Some(json!({ "text": "Weekend" })),
        )
        .await;
        assert_eq!(view["questions"][0]["options"], json!(["Day", "Night", "Weekend"]));

        let (_, view) = call(&app, Method::DELETE, &format!("{base}/questions/{qid}/options/0"), None).await;
        assert_eq!(view["questions"][0]["options"], json!(["Night", "Weekend"]));

        let (_, view) = call(
            &app,
            Method::PATCH,
            &format!("{base}/questions/{qid}"),
            Some(json!({ "type": "date" })),
        )
        .await;
        assert_eq!(view["questions"][0]["options"], json!([]));

        let (status, body) = call(&app, Method::POST, &format!("{base}/publish"), None).await;
        assert_eq!(status, 422);
        assert_eq!(body["code"], "EMPTY_TITLE");

        let (status, _) = call(&app, Method::DELETE, &format!("{base}/questions/{qid}"), None).await;
        assert_eq!(status, 200);
        let (status, _) = call(&app, Method::DELETE, &format!("{base}/questions/{qid}"), None).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn over_budget_parameters_and_unknown_sessions() {
        let app = app(None);
        let (_, view) = call(&app, Method::POST, "/sessions", None).await;
        let base = format!("/sessions/{}", view["id"].as_str().unwrap());

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("{base}/parameters"),
            Some(json!({ "parameters": [
                { "name": "A", "percentage": 70 },
                { "name": "B", "percentage": 40 }
            ] })),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["code"], "OVER_BUDGET");

        let (status, _) = call(&app, Method::DELETE, &base, None).await;
        assert_eq!(status, 204);
        let (status, body) = call(&app, Method::GET, &base, None).await;
        assert_eq!(status, 404);
        assert_eq!(body["code"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn session_ended_during_generation_is_reported_gone() {
        let gate = Arc::new(Gate::default());
        let app = app_with(Some(GatedGenerator(gate.clone())));
        let base = titled_session(&app).await;

        let pending = tokio::spawn({
            let app = app.clone();
            let uri = format!("{base}/generate");
            async move { call(&app, Method::POST, &uri, None).await }
        });
        gate.started.notified().await;

        let (status, _) = call(&app, Method::DELETE, &base, None).await;
        assert_eq!(status, 204);
        gate.release.notify_one();

        let (status, body) = pending.await.unwrap();
        assert_eq!(status, 404);
        assert_eq!(body["code"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn crashed_generation_task_does_not_leave_session_generating() {
        let app = app_with(Some(CrashingGenerator));
        let base = titled_session(&app).await;

        let (status, body) = call(&app, Method::POST, &format!("{base}/generate"), None).await;
        assert_eq!(status, 500);
        assert_eq!(body["code"], "INTERNAL_ERROR");

        let (_, view) = call(&app, Method::GET, &base, None).await;
        assert_eq!(view["generating"], false);

        let (status, body) = call(&app, Method::POST, &format!("{base}/generate"), None).await;
        assert_eq!(status, 500);
        assert_eq!(body["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn malformed_bodies_use_the_error_envelope() {
        let app = app(None);
        let base = titled_session(&app).await;

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("{base}/parameters"),
            Some(json!({ "parameters": [{ "name": "A", "percentage": "lots" }] })),
        )
        .await;
        assert_eq!(status, 422);
        assert_eq!(body["code"], "INVALID_BODY");
        assert!(body["error"].as_str().unwrap().contains("percentage"));

        let (_, view) = call(&app, Method::POST, &format!("{base}/questions"), None).await;
        let qid = view["questions"][0]["id"].as_str().unwrap().to_string();
        let (status, body) = call(
            &app,
            Method::PATCH,
            &format!("{base}/questions/{qid}"),
            Some(json!({ "type": "dropdown" })),
        )
        .await;
        assert_eq!(status, 422);
        assert_eq!(body["code"], "INVALID_BODY");

        let (status, body) = call(&app, Method::PUT, &format!("{base}/details"), None).await;
        assert_eq!(status, 415);
        assert_eq!(body["code"], "INVALID_BODY");
    }
}
