use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ReviewError;
use crate::form::FormDraft;
use crate::question::{Candidate, IdAllocator, Question, QuestionId};

/// Addresses one staged suggestion: the batch it was staged in plus its
/// position within that batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateRef {
    pub batch: u64,
    pub position: usize,
}

impl fmt::Display for CandidateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.batch, self.position)
    }
}

/// Holds the suggestions waiting for accept/reject.
///
/// Slots keep their position after a neighbour is reviewed, so refs handed
/// out for a batch stay valid until that batch is replaced.
#[derive(Debug, Default)]
pub struct SuggestionReview {
    batch: u64,
    slots: Vec<Option<Candidate>>,
}

impl SuggestionReview {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the staging set wholesale. Unreviewed suggestions from the
    /// previous batch are discarded.
    pub fn stage(&mut self, candidates: Vec<Candidate>) -> u64 {
        let discarded = self.pending().count();
        self.batch += 1;
        self.slots = candidates.into_iter().map(Some).collect();
        debug!(batch = self.batch, staged = self.slots.len(), discarded, "staged suggestions");
        self.batch
    }

    /// Move a suggestion into the draft under a fresh id.
    pub fn accept(
        &mut self,
        r: CandidateRef,
        draft: &mut FormDraft,
        ids: &mut IdAllocator,
    ) -> Result<QuestionId, ReviewError> {
        let candidate = self.take(r)?;
        let question = Question::from_candidate(ids.next_id(), candidate);
        let id = question.id.clone();
        draft.merge(question);
        Ok(id)
    }

    /// Discard a suggestion. The draft is not touched.
    pub fn reject(&mut self, r: CandidateRef) -> Result<Candidate, ReviewError> {
        self.take(r)
    }

    pub fn get(&self, r: CandidateRef) -> Option<&Candidate> {
        if r.batch != self.batch {
            return None;
        }
        self.slots.get(r.position).and_then(Option::as_ref)
    }

    /// Pending suggestions with their refs, in staged order.
    pub fn pending(&self) -> impl Iterator<Item = (CandidateRef, &Candidate)> {
        let batch = self.batch;
        self.slots.iter().enumerate().filter_map(move |(position, slot)| {
            slot.as_ref()
                .map(|c| (CandidateRef { batch, position }, c))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.pending().next().is_none()
    }

    pub fn batch(&self) -> u64 {
        self.batch
    }

    fn take(&mut self, r: CandidateRef) -> Result<Candidate, ReviewError> {
        if r.batch != self.batch {
            return Err(ReviewError::StaleCandidate(r));
        }
        self.slots
            .get_mut(r.position)
            .and_then(Option::take)
            .ok_or(ReviewError::StaleCandidate(r))
    }
}
