use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Answer types a form question can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    #[default]
    Text,
    Textarea,
    Number,
    Email,
    Date,
    File,
    Radio,
    Checkbox,
}

impl QuestionType {
    pub const ALL: [QuestionType; 8] = [
        QuestionType::Text,
        QuestionType::Textarea,
        QuestionType::Number,
        QuestionType::Email,
        QuestionType::Date,
        QuestionType::File,
        QuestionType::Radio,
        QuestionType::Checkbox,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::Textarea => "textarea",
            QuestionType::Number => "number",
            QuestionType::Email => "email",
            QuestionType::Date => "date",
            QuestionType::File => "file",
            QuestionType::Radio => "radio",
            QuestionType::Checkbox => "checkbox",
        }
    }

    /// Only choice types carry an options list.
    pub fn takes_options(self) -> bool {
        matches!(self, QuestionType::Radio | QuestionType::Checkbox)
    }

    /// Case-insensitive lookup; surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session-unique question identifier (`q1`, `q2`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QuestionId {
    fn from(s: &str) -> Self {
        QuestionId(s.to_string())
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out question ids; ids are never reused for the allocator's lifetime.
#[derive(Debug, Default)]
pub struct IdAllocator {
    issued: u64,
}

impl IdAllocator {
    pub fn next_id(&mut self) -> QuestionId {
        self.issued += 1;
        QuestionId(format!("q{}", self.issued))
    }
}

/// A question in the authoritative form draft.
///
/// `options` is empty unless `kind` is a choice type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub options: Vec<String>,
    pub required: bool,
}

impl Question {
    pub fn blank(id: QuestionId) -> Self {
        Self {
            id,
            text: String::new(),
            kind: QuestionType::Text,
            options: Vec::new(),
            required: false,
        }
    }

    pub fn from_candidate(id: QuestionId, candidate: Candidate) -> Self {
        let options = if candidate.kind.takes_options() {
            candidate.options.unwrap_or_default()
        } else {
            Vec::new()
        };
        Self {
            id,
            text: candidate.text,
            kind: candidate.kind,
            options,
            required: candidate.required,
        }
    }
}

/// A suggested question that has been normalized but not yet reviewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub required: bool,
}

/// A repair applied while normalizing a generated question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correction {
    MissingText,
    NonStringText { found: &'static str },
    MissingType,
    NonStringType { found: &'static str },
    UnknownType(String),
    OptionsDropped { kind: QuestionType },
    OptionsMissing { kind: QuestionType },
    OptionsMalformed { kind: QuestionType, found: &'static str },
    NonBoolRequired { found: &'static str },
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correction::MissingText => write!(f, "missing text, using empty string"),
            Correction::NonStringText { found } => {
                write!(f, "text was {found}, using its JSON rendering")
            }
            Correction::MissingType => write!(f, "missing type, defaulting to 'text'"),
            Correction::NonStringType { found } => {
                write!(f, "type was {found}, defaulting to 'text'")
            }
            Correction::UnknownType(t) => write!(f, "unknown type '{t}', defaulting to 'text'"),
            Correction::OptionsDropped { kind } => {
                write!(f, "type is {kind} but options were given, ignoring options")
            }
            Correction::OptionsMissing { kind } => {
                write!(f, "type is {kind} but options are missing, using empty list")
            }
            Correction::OptionsMalformed { kind, found } => write!(
                f,
                "type is {kind} but options were {found}, using empty list"
            ),
            Correction::NonBoolRequired { found } => {
                write!(f, "required was {found}, treating as false")
            }
        }
    }
}

/// Outcome of [`validate`]: always a usable candidate plus what was repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    pub candidate: Candidate,
    pub corrections: Vec<Correction>,
}

/// Normalize one loosely-typed question object into a [`Candidate`].
///
/// Never fails. Generated output is untrusted free text, so every deviation
/// is repaired and reported rather than rejected.
pub fn validate(object: &Map<String, Value>) -> Validated {
    let mut corrections = Vec::new();

    let text = match object.get("text") {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => {
            corrections.push(Correction::MissingText);
            String::new()
        }
        Some(other) => {
            corrections.push(Correction::NonStringText {
                found: value_type_name(other),
            });
            other.to_string()
        }
    };

    let kind = match object.get("type") {
        Some(Value::String(s)) => QuestionType::parse(s).unwrap_or_else(|| {
            corrections.push(Correction::UnknownType(s.clone()));
            QuestionType::Text
        }),
        None | Some(Value::Null) => {
            corrections.push(Correction::MissingType);
            QuestionType::Text
        }
        Some(other) => {
            corrections.push(Correction::NonStringType {
                found: value_type_name(other),
            });
            QuestionType::Text
        }
    };

    let raw_options = object.get("options");
    let options = if kind.takes_options() {
        match raw_options {
            Some(Value::Array(items)) => match string_items(items) {
                Some(opts) => Some(opts),
                None => {
                    corrections.push(Correction::OptionsMalformed {
                        kind,
                        found: "an array with non-string items",
                    });
                    Some(Vec::new())
                }
            },
            None | Some(Value::Null) => {
                corrections.push(Correction::OptionsMissing { kind });
                Some(Vec::new())
            }
            Some(other) => {
                corrections.push(Correction::OptionsMalformed {
                    kind,
                    found: value_type_name(other),
                });
                Some(Vec::new())
            }
        }
    } else {
        if raw_options.is_some() {
            corrections.push(Correction::OptionsDropped { kind });
        }
        None
    };

    let required = match object.get("required") {
        Some(Value::Bool(b)) => *b,
        None | Some(Value::Null) => false,
        Some(other) => {
            corrections.push(Correction::NonBoolRequired {
                found: value_type_name(other),
            });
            false
        }
    };

    Validated {
        candidate: Candidate {
            text,
            kind,
            options,
            required,
        },
        corrections,
    }
}

fn string_items(items: &[Value]) -> Option<Vec<String>> {
    items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

pub(crate) fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
