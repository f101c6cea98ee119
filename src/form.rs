use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FormError;
use crate::question::{Question, QuestionId, QuestionType};

/// The form being edited: title, instructions and ordered questions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormDraft {
    title: String,
    instructions: String,
    questions: Vec<Question>,
}

/// A partial update to a question. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionEdit {
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<QuestionType>,
    pub options: Option<Vec<String>>,
    pub required: Option<bool>,
}

impl FormDraft {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    pub fn set_details(&mut self, title: impl Into<String>, instructions: impl Into<String>) {
        self.title = title.into();
        self.instructions = instructions.into();
    }

    /// Append a blank `text` question, as the manual "add question" action does.
    pub fn add_blank(&mut self, id: QuestionId) -> &Question {
        self.questions.push(Question::blank(id));
        &self.questions[self.questions.len() - 1]
    }

    /// Append a question accepted from review.
    pub fn merge(&mut self, question: Question) {
        self.questions.push(question);
    }

    /// Apply an edit. A type change clears the option list before any
    /// options in the same edit are applied.
    pub fn edit(&mut self, id: &QuestionId, edit: QuestionEdit) -> Result<&Question, FormError> {
        let idx = self.require(id)?;

        let current = &self.questions[idx];
        let kind = edit.kind.unwrap_or(current.kind);
        if edit.options.is_some() && !kind.takes_options() {
            return Err(FormError::OptionsNotAllowed(id.clone()));
        }

        let q = &mut self.questions[idx];
        if let Some(text) = edit.text {
            q.text = text;
        }
        if kind != q.kind {
            q.kind = kind;
            q.options.clear();
        }
        if let Some(options) = edit.options {
            q.options = options;
        }
        if let Some(required) = edit.required {
            q.required = required;
        }
        Ok(&self.questions[idx])
    }

    pub fn remove(&mut self, id: &QuestionId) -> Result<Question, FormError> {
        let idx = self.require(id)?;
        Ok(self.questions.remove(idx))
    }

    pub fn add_option(&mut self, id: &QuestionId, option: impl Into<String>) -> Result<(), FormError> {
        let q = self.choice_question(id)?;
        q.options.push(option.into());
        Ok(())
    }

    pub fn remove_option(&mut self, id: &QuestionId, index: usize) -> Result<String, FormError> {
        let q = self.choice_question(id)?;
        if index >= q.options.len() {
            return Err(FormError::OptionNotFound {
                id: id.clone(),
                index,
            });
        }
        Ok(q.options.remove(index))
    }

    /// Publish-time checks.
    pub fn validate_for_publish(&self) -> Result<(), FormError> {
        if self.title.trim().is_empty() {
            return Err(FormError::EmptyTitle);
        }
        if self.questions.is_empty() {
            return Err(FormError::NoQuestions);
        }
        Ok(())
    }

    /// Validate and project the draft into its publish format.
    pub fn to_record(&self) -> Result<FormRecord, FormError> {
        self.validate_for_publish()?;
        Ok(FormRecord {
            title: self.title.clone(),
            instructions: self.instructions.clone(),
            questions: self.questions.clone(),
            created_at: ServerTimestamp,
        })
    }

    fn require(&self, id: &QuestionId) -> Result<usize, FormError> {
        self.questions
            .iter()
            .position(|q| &q.id == id)
            .ok_or_else(|| FormError::QuestionNotFound(id.clone()))
    }

    fn choice_question(&mut self, id: &QuestionId) -> Result<&mut Question, FormError> {
        let idx = self.require(id)?;
        let q = &mut self.questions[idx];
        if !q.kind.takes_options() {
            return Err(FormError::OptionsNotAllowed(id.clone()));
        }
        Ok(q)
    }
}

/// The document handed to the store on publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRecord {
    pub title: String,
    pub instructions: String,
    pub questions: Vec<Question>,
    pub created_at: ServerTimestamp,
}

/// Placeholder the store replaces with its own clock.
///
/// Serializes as `{".sv": "timestamp"}`, the Realtime Database server value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTimestamp;

#[derive(Serialize, Deserialize)]
struct ServerValue {
    #[serde(rename = ".sv")]
    sv: String,
}

impl Serialize for ServerTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ServerValue {
            sv: "timestamp".to_string(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ServerTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = ServerValue::deserialize(deserializer)?;
        if value.sv != "timestamp" {
            return Err(serde::de::Error::custom(format!(
                "unsupported server value '{}'",
                value.sv
            )));
        }
        Ok(ServerTimestamp)
    }
}

/// Identifier the store assigned to a published form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormId(pub String);

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shareable links for a published form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinks {
    pub respond: String,
    pub results: String,
}

impl ShareLinks {
    pub fn new(base_url: &str, id: &FormId) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            respond: format!("{base}/form.html?formId={id}"),
            results: format!("{base}/results.html?formId={id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::IdAllocator;
    use serde_json::json;

    fn draft_with_radio() -> (FormDraft, QuestionId) {
        let mut ids = IdAllocator::default();
        let mut draft = FormDraft::default();
        draft.set_details("Hiring", "Be brief");
        let id = draft.add_blank(ids.next_id()).id.clone();
        draft
            .edit(
                &id,
                QuestionEdit {
                    text: Some("Seniority?".into()),
                    kind: Some(QuestionType::Radio),
                    options: Some(vec!["Junior".into(), "Senior".into()]),
                    required: Some(true),
                },
            )
            .unwrap();
        (draft, id)
    }

    #[test]
    fn type_change_resets_options() {
        let (mut draft, id) = draft_with_radio();
        assert_eq!(draft.question(&id).unwrap().options.len(), 2);

        let q = draft
            .edit(
                &id,
                QuestionEdit {
                    kind: Some(QuestionType::Checkbox),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(q.kind, QuestionType::Checkbox);
        assert!(q.options.is_empty());
        assert!(q.required);
    }

    #[test]
    fn same_type_edit_keeps_options() {
        let (mut draft, id) = draft_with_radio();
        draft
            .edit(
                &id,
                QuestionEdit {
                    kind: Some(QuestionType::Radio),
                    text: Some("Level?".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(draft.question(&id).unwrap().options.len(), 2);
    }

    #[test]
    fn options_rejected_on_non_choice_types() {
        let (mut draft, id) = draft_with_radio();
        let before = draft.clone();
        let err = draft
            .edit(
                &id,
                QuestionEdit {
                    kind: Some(QuestionType::Email),
                    options: Some(vec!["x".into()]),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err, FormError::OptionsNotAllowed(id.clone()));
        assert_eq!(draft, before);

        draft
            .edit(&id, QuestionEdit { kind: Some(QuestionType::Email), ..Default::default() })
            .unwrap();
        assert_eq!(
            draft.add_option(&id, "y"),
            Err(FormError::OptionsNotAllowed(id.clone()))
        );
    }

    #[test]
    fn option_level_edits() {
        let (mut draft, id) = draft_with_radio();
        draft.add_option(&id, "Staff").unwrap();
        assert_eq!(draft.remove_option(&id, 0).unwrap(), "Junior");
        assert_eq!(draft.question(&id).unwrap().options, vec!["Senior", "Staff"]);
        assert_eq!(
            draft.remove_option(&id, 5),
            Err(FormError::OptionNotFound { id: id.clone(), index: 5 })
        );
    }

    #[test]
    fn remove_and_missing_ids() {
        let (mut draft, id) = draft_with_radio();
        draft.remove(&id).unwrap();
        assert!(draft.questions().is_empty());
        assert_eq!(
            draft.remove(&id),
            Err(FormError::QuestionNotFound(id.clone()))
        );
    }

    #[test]
    fn publish_validation() {
        let (mut draft, id) = draft_with_radio();
        draft.set_details("  ", "x");
        let before = draft.clone();
        assert_eq!(draft.to_record(), Err(FormError::EmptyTitle));
        assert_eq!(draft, before);

        draft.set_details("Hiring", "");
        draft.remove(&id).unwrap();
        assert_eq!(draft.to_record(), Err(FormError::NoQuestions));
    }

    #[test]
    fn record_carries_server_timestamp_placeholder() {
        let (draft, _) = draft_with_radio();
        let v = serde_json::to_value(draft.to_record().unwrap()).unwrap();
        assert_eq!(v["title"], "Hiring");
        assert_eq!(v["instructions"], "Be brief");
        assert_eq!(v["createdAt"], json!({ ".sv": "timestamp" }));
        assert_eq!(v["questions"][0]["type"], "radio");

        let back: FormRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back.created_at, ServerTimestamp);
    }

    #[test]
    fn share_links_use_form_id_query() {
        let links = ShareLinks::new("https://forms.example.com/", &FormId("-Nabc".into()));
        assert_eq!(links.respond, "https://forms.example.com/form.html?formId=-Nabc");
        assert_eq!(links.results, "https://forms.example.com/results.html?formId=-Nabc");
    }
}
