use thiserror::Error;

use crate::question::QuestionId;
use crate::review::CandidateRef;

/// Errors raised while editing the weighted parameter set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("weight {weight} for parameter '{name}' is outside 0..=100")]
    InvalidWeight { name: String, weight: i64 },

    #[error("parameter '{0}' already exists")]
    DuplicateParameter(String),

    #[error("parameter name must not be empty")]
    EmptyName,

    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("total weight {total}% exceeds 100%")]
    OverBudget { total: u32 },
}

/// Errors on the question generation path.
///
/// None of these leave the form draft or the staged suggestions modified.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation output is not a JSON array of questions: {reason}")]
    Format {
        reason: String,
        raw: String,
        cleaned: String,
    },

    #[error("generation service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("generation service is not configured")]
    Unavailable,

    #[error("generation service unreachable: {0}")]
    Transport(String),

    #[error("generation service returned no text")]
    EmptyResponse,

    #[error("a generation request is already in flight")]
    InFlight,

    #[error("generation result arrived for a superseded request")]
    Superseded,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("suggestion {0} is no longer pending")]
    StaleCandidate(CandidateRef),
}

/// Errors raised by form draft edits and publish-time validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("form title must not be blank")]
    EmptyTitle,

    #[error("form has no questions")]
    NoQuestions,

    #[error("question {0} not found")]
    QuestionNotFound(QuestionId),

    #[error("question {0} does not take options")]
    OptionsNotAllowed(QuestionId),

    #[error("question {id} has no option at index {index}")]
    OptionNotFound { id: QuestionId, index: usize },
}

/// Errors from the document store that receives published forms.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to encode form: {0}")]
    Codec(String),

    #[error("document store unreachable: {0}")]
    Transport(String),

    #[error("document store rejected write ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("document store reply was malformed: {0}")]
    MalformedReply(String),
}

/// Any error an editing session operation can produce.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
