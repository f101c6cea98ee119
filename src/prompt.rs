use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::parameter::{Parameter, ParameterSet};
use crate::question::QuestionType;

/// Question count used when the instructions do not ask for one.
pub const DEFAULT_MIN_QUESTIONS: u32 = 7;

const NO_PARAMETERS: &str =
    "No specific parameters provided. Generate general questions relevant to the title and instructions.";

static COUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+questions\b").expect("count pattern is valid"));

/// Everything needed to ask the generation service for questions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub title: String,
    pub instructions: String,
    pub parameters: Vec<Parameter>,
    pub min_question_count: u32,
}

impl GenerationRequest {
    /// Snapshot the included parameters and derive the question count.
    pub fn new(title: &str, instructions: &str, parameters: &ParameterSet) -> Self {
        Self {
            title: title.to_string(),
            instructions: instructions.to_string(),
            parameters: parameters.included().cloned().collect(),
            min_question_count: min_question_count(instructions),
        }
    }

    /// Render the natural-language prompt. Pure: equal requests render equal text.
    pub fn render(&self) -> String {
        let mut s = String::new();

        s.push_str("You are an AI assistant that generates questions for a form, specifically for hiring or applications.\n");
        s.push_str("Generate form questions based on the following criteria and priorities:\n\n");

        s.push_str(&format!("**Form Title:** {}\n", self.title));
        let instructions = if self.instructions.trim().is_empty() {
            "None provided."
        } else {
            self.instructions.as_str()
        };
        s.push_str(&format!("**Special Instructions:** {instructions}\n"));
        s.push_str("**Key Skills/Parameters and their importance weightage (Total weightage is 100%):**\n");
        s.push_str(&parameter_lines(&self.parameters));
        s.push_str("\n\n");

        s.push_str(&format!(
            "Generate exactly {} questions, or more if needed to cover the parameters adequately.\n",
            self.min_question_count
        ));
        s.push_str("Ensure the number and focus of the questions are proportional to the importance weightages of the parameters provided. ");
        s.push_str("For example, if 'Work Experience' has a 50% weightage, approximately half of the generated questions should focus on work history, past projects, roles, etc. ");
        s.push_str("If a parameter has 0% weightage, generate no questions related to that parameter.\n\n");

        let allowed: Vec<String> = QuestionType::ALL
            .iter()
            .map(|t| format!("'{}'", t.as_str()))
            .collect();
        s.push_str(&format!(
            "For each question, provide a suggested answer type from the following list: {}.\n",
            allowed.join(", ")
        ));
        s.push_str("If the suggested type is 'radio' or 'checkbox', provide a reasonable list of relevant options as an array of strings.\n\n");

        s.push_str("Format the output strictly as a JSON array of objects. Each object must have the following keys:\n");
        s.push_str("- 'text': The question text (string).\n");
        s.push_str("- 'type': The suggested answer type (string from the allowed list).\n");
        s.push_str("- 'options': An array of strings (only required for 'radio' and 'checkbox' types). If the type is not 'radio' or 'checkbox', this key should be omitted or be an empty array.\n\n");

        s.push_str("Example JSON format:\n");
        s.push_str(EXAMPLE_OUTPUT);
        s.push('\n');
        s.push_str("Ensure the output is valid JSON and contains only the array of question objects. ");
        s.push_str("Do not include any introductory or concluding text outside the JSON array.\n");

        s
    }
}

/// Build the prompt for a form in one step.
pub fn build_prompt(title: &str, instructions: &str, parameters: &ParameterSet) -> String {
    GenerationRequest::new(title, instructions, parameters).render()
}

/// Number written right before the word "questions", else the default.
///
/// Zero or an overflowing number counts as unparsable.
pub fn min_question_count(instructions: &str) -> u32 {
    COUNT_PATTERN
        .captures(instructions)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MIN_QUESTIONS)
}

fn parameter_lines(parameters: &[Parameter]) -> String {
    if parameters.is_empty() {
        return NO_PARAMETERS.to_string();
    }
    parameters
        .iter()
        .map(|p| format!("- {}: {}% importance", p.name, p.weight))
        .collect::<Vec<_>>()
        .join("\n")
}

const EXAMPLE_OUTPUT: &str = r#"[
  {
    "text": "What is your full name?",
    "type": "text"
  },
  {
    "text": "Describe your previous work experience.",
    "type": "textarea"
  },
  {
    "text": "What is your preferred contact email?",
    "type": "email"
  },
  {
    "text": "Which programming languages are you proficient in?",
    "type": "checkbox",
    "options": ["Python", "JavaScript", "Java"]
  }
]"#;
