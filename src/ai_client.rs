// Client for the generative text API used by quiz question generation.
// The model's output is never trusted: we parse, fall back to a regex
// extraction, and normalize every question before handing it back.

use regex_lite::Regex;
use serde_json::{json, Value};
use std::fmt;

use crate::models::QuizQuestion;

const AI_API_BASE: &str = "https://generativelanguage.googleapis.com";
const AI_MODEL: &str = "gemini-1.5-flash";

/// Uploaded documents are clipped before being prepended to the prompt.
pub const MAX_DOCUMENT_CHARS: usize = 50_000;

#[derive(Debug)]
pub enum AiError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    InvalidResponse(String),
    MalformedOutput,
}

impl fmt::Display for AiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiError::Http(e) => write!(f, "http error: {e}"),
            AiError::Api { status, body } => {
                write!(f, "ai api error status={status} body={body}")
            }
            AiError::InvalidResponse(e) => write!(f, "invalid response: {e}"),
            AiError::MalformedOutput => write!(f, "model returned no usable questions"),
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

fn base_url() -> String {
    std::env::var("AI_API_BASE_URL").unwrap_or_else(|_| AI_API_BASE.to_string())
}

pub fn build_prompt(topic: Option<&str>, document: Option<&str>, count: usize) -> String {
    let mut prompt = String::new();

    if let Some(document) = document {
        let clipped: String = document.chars().take(MAX_DOCUMENT_CHARS).collect();
        prompt.push_str("Use the following source material:\n\n");
        prompt.push_str(&clipped);
        prompt.push_str("\n\n");
    }

    match topic {
        Some(topic) => prompt.push_str(&format!(
            "Generate {count} multiple-choice questions on the topic \"{topic}\"."
        )),
        None => prompt.push_str(&format!(
            "Generate {count} multiple-choice questions from the source material above."
        )),
    }

    prompt.push_str(
        "\nRespond with raw JSON only, no markdown fences and no commentary, \
         in exactly this shape:\n\
         {\"questions\":[{\"question\":\"...\",\"options\":[\"...\",\"...\",\"...\",\"...\"],\
         \"correct_answer\":0,\"explanation\":\"...\"}]}\n\
         Every question must have exactly 4 options and correct_answer is the \
         zero-based index of the right option.",
    );

    prompt
}

/// Direct parse first; otherwise pull the first `{...}` block mentioning
/// "questions" out of whatever prose the model wrapped around it.
pub fn extract_questions_value(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        if value.get("questions").is_some() {
            return Some(value);
        }
    }

    let re = Regex::new(r#"(?s)\{.*"questions".*\}"#).ok()?;
    let block = re.find(raw)?.as_str();
    let value = serde_json::from_str::<Value>(block).ok()?;
    value.get("questions")?;
    Some(value)
}

/// Forces every question into shape; missing fields get placeholders and the
/// answer index is clamped into range.
pub fn normalize_questions(value: &Value) -> Vec<QuizQuestion> {
    let Some(items) = value.get("questions").and_then(|q| q.as_array()) else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| {
            let question = item
                .get("question")
                .and_then(|v| v.as_str())
                .unwrap_or("Untitled question")
                .to_string();

            let mut options: Vec<String> = item
                .get("options")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|o| o.as_str().map(|s| s.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            while options.len() < 2 {
                options.push(format!("Option {}", options.len() + 1));
            }

            let correct_answer = item
                .get("correct_answer")
                .and_then(|v| v.as_u64())
                .map(|i| i as usize)
                .unwrap_or(0)
                .min(options.len() - 1);

            let explanation = item
                .get("explanation")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());

            QuizQuestion {
                question,
                options,
                correct_answer,
                explanation,
            }
        })
        .collect()
}

async fn generate_raw(api_key: &str, prompt: &str) -> Result<String, AiError> {
    let client = reqwest::Client::new();

    let resp = client
        .post(format!(
            "{}/v1beta/models/{}:generateContent",
            base_url(),
            AI_MODEL
        ))
        .header("x-goog-api-key", api_key)
        .json(&json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        }))
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(AiError::Api {
            status: status.as_u16(),
            body,
        });
    }

    let parsed: Value = serde_json::from_str(&body)
        .map_err(|e| AiError::InvalidResponse(format!("{e}; body={body}")))?;

    parsed
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|c| c.pointer("/content/parts/0/text"))
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| AiError::InvalidResponse(format!("no text candidate; body={body}")))
}

pub async fn generate_questions(
    api_key: &str,
    topic: Option<&str>,
    document: Option<&str>,
    count: usize,
) -> Result<Vec<QuizQuestion>, AiError> {
    let prompt = build_prompt(topic, document, count);
    let raw = generate_raw(api_key, &prompt).await?;

    let value = extract_questions_value(&raw).ok_or(AiError::MalformedOutput)?;
    let questions = normalize_questions(&value);
    if questions.is_empty() {
        return Err(AiError::MalformedOutput);
    }

    Ok(questions)
}
