//! Client for the remote text-analysis model.
//!
//! All request functions degrade to empty results: a missing credential,
//! a transport error, a non-success status or a malformed reply yields
//! `""` / default structs, never an error to the caller.

use serde_json::Value;

use crate::html;
use crate::types::{GlossaryEntry, Insights};

/// Chat-completions endpoint used when `GROQ_API_URL` is not set.
const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Model used when `GROQ_MODEL` is not set.
const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

const SYSTEM_PROMPT: &str = "You are a highly efficient assistant for a notes app, \
capable of processing and summarizing content of any length. \
Always provide concise but meaningful responses.";

/// Longest note text (in chars) sent to the model; longer input is truncated.
const MAX_INPUT_CHARS: usize = 8000;

/// Upper bound on tags kept from an insights reply.
const MAX_TAGS: usize = 5;

/// Upper bound on grammar issues kept from a grammar-check reply.
const MAX_GRAMMAR_ISSUES: usize = 20;

/// HTTP client for the model endpoint.
#[derive(Debug, Clone)]
pub struct InsightClient {
    api_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl InsightClient {
    /// Create the client from environment variables. A missing
    /// `GROQ_API_KEY` is not an error — every request is then skipped.
    pub fn from_env() -> Self {
        let api_url =
            std::env::var("GROQ_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let model = std::env::var("GROQ_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let api_key = std::env::var("GROQ_API_KEY").ok();
        Self::new(api_url, model, api_key)
    }

    /// Create with explicit configuration.
    pub fn new(api_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            api_url: api_url.into(),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Send one prompt and return the model's reply text, or `""` on any
    /// failure (missing credential, transport, status, empty choices).
    pub async fn request(&self, prompt: &str) -> String {
        let Some(key) = self.api_key.as_deref() else {
            return String::new();
        };
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.3,
            "max_tokens": 1024,
        });
        let res = match self
            .client
            .post(&self.api_url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                tracing::warn!("Model request failed: {e}");
                return String::new();
            }
        };
        if !res.status().is_success() {
            tracing::warn!("Model endpoint returned {}", res.status());
            return String::new();
        }
        let data: Value = match res.json().await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Model reply was not JSON: {e}");
                return String::new();
            }
        };
        reply_text(&data)
    }

    /// Summary + tags + glossary for one note.
    pub async fn insights(&self, note_html: &str) -> Insights {
        let clean = truncate_chars(&html::strip_markup(note_html), MAX_INPUT_CHARS);
        let prompt = format!(
            "Analyze this text and provide insights in JSON format. Important rules:\n\
             1. Never modify or rewrite any words or terms from the original text\n\
             2. Keep ambiguous terms exactly as they appear (e.g., if \"Dev\" appears, don't expand it to \"Developer\")\n\
             3. For the glossary, if a term has multiple meanings, list them all without changing the original term\n\
             4. Provide a factual summary without rephrasing technical terms or abbreviations\n\
             \n\
             Respond strictly in this JSON format:\n\
             {{\n\
               \"summary\": \"Direct summary using original terms\",\n\
               \"tags\": [\"tag1\", \"tag2\", \"tag3\"],\n\
               \"glossary\": [{{\"term\": \"exact term as written\", \"definition\": \"meaning(s) while preserving ambiguity\"}}]\n\
             }}\n\
             \n\
             Text to analyze: {clean}"
        );
        parse_insights(&self.request(&prompt).await)
    }

    /// Translate one note into `target_lang`, returning only the text.
    pub async fn translate(&self, note_html: &str, target_lang: &str) -> String {
        let clean = html::flatten_tags(note_html);
        let prompt = format!(
            "Translate the note into {target_lang}. Output only the translated text.\n\n{clean}"
        );
        self.request(&prompt).await.trim().to_string()
    }

    /// Literal offending phrases found in one note, suitable for exact
    /// substring highlighting.
    pub async fn grammar_check(&self, note_html: &str) -> Vec<String> {
        let clean = html::flatten_tags(note_html);
        let prompt = format!(
            "Check this text for grammar errors and respond with a JSON array of exact error phrases. \
             Example: For \"I is happy and they is sad\", respond with [\"I is\", \"they is\"]. \
             Include enough context in each phrase to understand the error.\n\
             \n\
             Input text: {clean}\n\
             \n\
             Response format must be a valid JSON array of strings, like: [\"error phrase 1\", \"error phrase 2\"]"
        );
        parse_grammar(&self.request(&prompt).await)
    }
}

/// Pull the reply text out of a chat-completions payload, `""` if the
/// shape is anything other than expected.
fn reply_text(data: &Value) -> String {
    data["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

/// Parse the strict-JSON insights reply. The model's output is untrusted:
/// any shape mismatch yields the all-empty default, never a partial panic.
fn parse_insights(raw: &str) -> Insights {
    let Ok(parsed) = serde_json::from_str::<Value>(raw) else {
        return Insights::default();
    };
    let summary = parsed["summary"].as_str().unwrap_or_default().to_string();
    let tags = parsed["tags"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|t| t.as_str())
                .take(MAX_TAGS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let glossary = parsed["glossary"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|g| {
                    Some(GlossaryEntry {
                        term: g["term"].as_str()?.to_string(),
                        definition: g["definition"].as_str().unwrap_or_default().to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Insights {
        summary,
        tags,
        glossary,
    }
}

/// Parse the grammar reply: a JSON array of strings. Anything else — or
/// any non-string element — is dropped.
fn parse_grammar(raw: &str) -> Vec<String> {
    let Ok(parsed) = serde_json::from_str::<Value>(raw) else {
        return Vec::new();
    };
    parsed
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .take(MAX_GRAMMAR_ISSUES)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Truncate to `max` chars, marking the cut with an ellipsis.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_insights_accepts_well_formed_replies() {
        let raw = r#"{
            "summary": "About Rust.",
            "tags": ["rust", "notes"],
            "glossary": [{"term": "ownership", "definition": "move semantics"}]
        }"#;
        let insights = parse_insights(raw);
        assert_eq!(insights.summary, "About Rust.");
        assert_eq!(insights.tags, ["rust", "notes"]);
        assert_eq!(insights.glossary.len(), 1);
        assert_eq!(insights.glossary[0].term, "ownership");
    }

    #[test]
    fn parse_insights_caps_tags_at_five() {
        let raw = r#"{"summary": "s", "tags": ["1","2","3","4","5","6","7"], "glossary": []}"#;
        assert_eq!(parse_insights(raw).tags.len(), 5);
    }

    #[test]
    fn parse_insights_skips_malformed_glossary_entries() {
        let raw = r#"{"summary": "s", "tags": [], "glossary": [
            {"term": "good", "definition": "kept"},
            {"definition": "no term"},
            "not an object"
        ]}"#;
        let glossary = parse_insights(raw).glossary;
        assert_eq!(glossary.len(), 1);
        assert_eq!(glossary[0].term, "good");
    }

    #[test]
    fn parse_insights_collapses_garbage_to_empty() {
        for raw in ["", "not json at all", "[1,2,3]", "\"just a string\""] {
            let insights = parse_insights(raw);
            assert_eq!(insights.summary, "");
            assert!(insights.tags.is_empty());
            assert!(insights.glossary.is_empty());
        }
    }

    #[test]
    fn parse_grammar_keeps_strings_and_caps_at_twenty() {
        let long: Vec<String> = (0..30).map(|i| format!("\"issue {i}\"")).collect();
        let raw = format!("[{}]", long.join(","));
        assert_eq!(parse_grammar(&raw).len(), 20);

        assert_eq!(parse_grammar(r#"["I is", 42, "they is"]"#), ["I is", "they is"]);
    }

    #[test]
    fn parse_grammar_rejects_non_arrays() {
        assert!(parse_grammar(r#"{"issues": []}"#).is_empty());
        assert!(parse_grammar("nonsense").is_empty());
    }

    #[test]
    fn reply_text_requires_the_full_choice_shape() {
        let ok = serde_json::json!({
            "choices": [{"message": {"content": "hello"}}]
        });
        assert_eq!(reply_text(&ok), "hello");

        for bad in [
            serde_json::json!({}),
            serde_json::json!({"choices": []}),
            serde_json::json!({"choices": [{"message": {}}]}),
        ] {
            assert_eq!(reply_text(&bad), "");
        }
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 8000), "short");
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        let long = "x".repeat(MAX_INPUT_CHARS + 10);
        let cut = truncate_chars(&long, MAX_INPUT_CHARS);
        assert_eq!(cut.chars().count(), MAX_INPUT_CHARS + 3);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn missing_credential_skips_the_request() {
        let client = InsightClient::new("http://localhost:1/never-called", "m", None);
        let reply = tokio::runtime::Runtime::new()
            .expect("runtime")
            .block_on(client.request("prompt"));
        assert_eq!(reply, "");
    }
}
