//! One form-editing session: the parameter set, the draft, the staged
//! suggestions and the id counter, owned together for the session's lifetime.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{FormError, GenerationError, ParameterError, ReviewError, SessionError};
use crate::form::{FormDraft, FormId, FormRecord, QuestionEdit, ShareLinks};
use crate::llm::QuestionGenerator;
use crate::parameter::{Parameter, ParameterSet, WEIGHT_BUDGET};
use crate::prompt::GenerationRequest;
use crate::question::{Candidate, IdAllocator, Question, QuestionId};
use crate::response;
use crate::review::{CandidateRef, SuggestionReview};
use crate::store::DocumentStore;

/// Permission to run one generation request for a session.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    pub id: u64,
    pub request: GenerationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Published {
    pub form_id: FormId,
    pub links: ShareLinks,
}

#[derive(Debug)]
pub struct EditingSession {
    id: Uuid,
    parameters: ParameterSet,
    draft: FormDraft,
    review: SuggestionReview,
    ids: IdAllocator,
    tickets_issued: u64,
    in_flight: Option<u64>,
    published: Option<Published>,
}

impl Default for EditingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditingSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            parameters: ParameterSet::new(),
            draft: FormDraft::default(),
            review: SuggestionReview::new(),
            ids: IdAllocator::default(),
            tickets_issued: 0,
            in_flight: None,
            published: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn draft(&self) -> &FormDraft {
        &self.draft
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn review(&self) -> &SuggestionReview {
        &self.review
    }

    /// Direct access for incremental edits; the budget is checked when the
    /// set is saved or used for generation.
    pub fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }

    /// Replace the parameter set, refusing one whose included weight is over budget.
    pub fn save_parameters(&mut self, parameters: ParameterSet) -> Result<(), ParameterError> {
        parameters.check_budget()?;
        info!(session = %self.id, count = parameters.len(), total = parameters.total_weight(), "saved parameters");
        self.parameters = parameters;
        Ok(())
    }

    pub fn set_details(&mut self, title: impl Into<String>, instructions: impl Into<String>) {
        self.draft.set_details(title, instructions);
    }

    pub fn add_question(&mut self) -> QuestionId {
        let id = self.ids.next_id();
        self.draft.add_blank(id.clone());
        id
    }

    pub fn edit_question(&mut self, id: &QuestionId, edit: QuestionEdit) -> Result<&Question, FormError> {
        self.draft.edit(id, edit)
    }

    pub fn remove_question(&mut self, id: &QuestionId) -> Result<Question, FormError> {
        self.draft.remove(id)
    }

    pub fn add_option(&mut self, id: &QuestionId, option: impl Into<String>) -> Result<(), FormError> {
        self.draft.add_option(id, option)
    }

    pub fn remove_option(&mut self, id: &QuestionId, index: usize) -> Result<String, FormError> {
        self.draft.remove_option(id, index)
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a generation request. Only one may be in flight at a time.
    pub fn begin_generation(&mut self) -> Result<GenerationTicket, SessionError> {
        if self.in_flight.is_some() {
            return Err(GenerationError::InFlight.into());
        }
        if self.draft.title().trim().is_empty() {
            return Err(FormError::EmptyTitle.into());
        }
        self.parameters.check_budget()?;

        self.tickets_issued += 1;
        let id = self.tickets_issued;
        self.in_flight = Some(id);
        Ok(GenerationTicket {
            id,
            request: GenerationRequest::new(
                self.draft.title(),
                self.draft.instructions(),
                &self.parameters,
            ),
        })
    }

    /// Complete the request identified by `ticket` with the service's outcome.
    ///
    /// On success the parsed suggestions replace the staging set and the new
    /// batch number is returned. On any failure the draft and staging set are
    /// left as they were.
    pub fn finish_generation(
        &mut self,
        ticket: u64,
        outcome: Result<String, GenerationError>,
    ) -> Result<u64, SessionError> {
        if self.in_flight != Some(ticket) {
            warn!(session = %self.id, ticket, "discarding superseded generation result");
            return Err(GenerationError::Superseded.into());
        }
        self.in_flight = None;

        let candidates = response::parse(&outcome?)?;
        Ok(self.review.stage(candidates))
    }

    /// Drop the in-flight marker for `ticket` without staging anything, for
    /// a round trip that ended without an outcome.
    pub fn abandon_generation(&mut self, ticket: u64) {
        if self.in_flight == Some(ticket) {
            warn!(session = %self.id, ticket, "generation abandoned");
            self.in_flight = None;
        }
    }

    /// Run a whole generation round trip while owning the session.
    pub async fn generate<G: QuestionGenerator>(&mut self, generator: &G) -> Result<u64, SessionError> {
        let ticket = self.begin_generation()?;
        let outcome = generator.generate(&ticket.request.render()).await;
        self.finish_generation(ticket.id, outcome)
    }

    /// Stage suggestions obtained elsewhere (e.g. the stateless endpoint).
    pub fn stage(&mut self, candidates: Vec<Candidate>) -> u64 {
        self.review.stage(candidates)
    }

    pub fn accept(&mut self, r: CandidateRef) -> Result<QuestionId, ReviewError> {
        let result = self.review.accept(r, &mut self.draft, &mut self.ids);
        if let Err(e) = &result {
            warn!(session = %self.id, error = %e, "ignoring accept");
        }
        result
    }

    pub fn reject(&mut self, r: CandidateRef) -> Result<Candidate, ReviewError> {
        let result = self.review.reject(r);
        if let Err(e) = &result {
            warn!(session = %self.id, error = %e, "ignoring reject");
        }
        result
    }

    /// Validate the draft and project it into its publish format.
    pub fn prepare_publish(&self) -> Result<FormRecord, FormError> {
        self.draft.to_record()
    }

    pub fn record_published(&mut self, form_id: FormId, base_url: &str) -> Published {
        let published = Published {
            links: ShareLinks::new(base_url, &form_id),
            form_id,
        };
        self.published = Some(published.clone());
        published
    }

    pub async fn publish<S: DocumentStore>(
        &mut self,
        store: &S,
        base_url: &str,
    ) -> Result<Published, SessionError> {
        let record = self.prepare_publish()?;
        let form_id = store.push(&record).await?;
        info!(session = %self.id, form_id = %form_id, "published form");
        Ok(self.record_published(form_id, base_url))
    }

    /// Pure projection of the session state for rendering.
    pub fn view(&self) -> SessionView {
        let total_weight = self.parameters.total_weight();
        let suggestions: Vec<SuggestionView> = self
            .review
            .pending()
            .map(|(r, c)| SuggestionView {
                r,
                candidate: c.clone(),
            })
            .collect();

        SessionView {
            id: self.id,
            title: self.draft.title().to_string(),
            instructions: self.draft.instructions().to_string(),
            questions: self.draft.questions().to_vec(),
            parameters: self.parameters.iter().cloned().collect(),
            total_weight,
            over_budget: total_weight > WEIGHT_BUDGET,
            show_no_questions: self.draft.questions().is_empty(),
            show_no_suggestions: suggestions.is_empty(),
            suggestions,
            generating: self.is_generating(),
            published: self.published.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub title: String,
    pub instructions: String,
    pub questions: Vec<Question>,
    pub parameters: Vec<Parameter>,
    pub total_weight: u32,
    pub over_budget: bool,
    pub suggestions: Vec<SuggestionView>,
    pub generating: bool,
    pub show_no_questions: bool,
    pub show_no_suggestions: bool,
    pub published: Option<Published>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestionView {
    #[serde(rename = "ref")]
    pub r: CandidateRef,
    #[serde(flatten)]
    pub candidate: Candidate,
}
