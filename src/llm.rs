//! Language-model "ask" collaborator.
//!
//! The engine never calls a model itself. [`ChatSession`](crate::chat::ChatSession)
//! hands search results to a [`LanguageModel`] unmodified as `context`;
//! this module turns them into a prompt and, for [`OllamaModel`], into a
//! single non-streaming `POST /api/generate`.
//!
//! Greetings and very short messages skip the instruction and context
//! entirely and go to the model verbatim.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::models::SearchResult;

/// Answer language requested by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Auto,
    En,
    Es,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Auto => "auto",
            Language::En => "en",
            Language::Es => "es",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            Language::Es => {
                "Answer in Spanish, referencing official laws and standards from Spain and the USA."
            }
            Language::En => "Answer in English, referencing official frameworks and laws from the USA, EU, and international sources.",
            Language::Auto => "Always answer in English, referencing official frameworks and laws from the USA, EU, and international sources.",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Language::Auto),
            "en" => Ok(Language::En),
            "es" => Ok(Language::Es),
            other => bail!("unknown language '{}' (expected auto, en, or es)", other),
        }
    }
}

const GREETINGS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "how are you",
    "good morning",
    "good afternoon",
    "good evening",
    "what's up",
    "yo",
    "sup",
];

/// True for greetings and messages of four words or fewer.
///
/// Greeting keywords are matched as substrings of the lowercased message,
/// so `"this"` counts as containing `"hi"`.
pub fn is_conversational(query: &str) -> bool {
    let lower = query.to_lowercase();
    GREETINGS.iter().any(|g| lower.contains(g)) || query.split_whitespace().count() <= 4
}

/// Build the prompt sent to the model.
pub fn build_prompt(query: &str, context: &[SearchResult], language: Language) -> String {
    if is_conversational(query) {
        return query.to_string();
    }
    let mut prompt = format!("{}\nQuestion: {}", language.instruction(), query);
    if !context.is_empty() {
        prompt.push_str("\nContext:\n");
        let joined: Vec<&str> = context.iter().map(|c| c.content.as_str()).collect();
        prompt.push_str(&joined.join("\n---\n"));
    }
    prompt
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn ask(&self, question: &str, context: &[SearchResult], language: Language)
        -> Result<String>;
}

/// A model that refuses every request. Used when `llm.provider = "disabled"`.
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn ask(&self, _question: &str, _context: &[SearchResult], _language: Language) -> Result<String> {
        bail!("Language model is disabled (set llm.provider = \"ollama\")")
    }
}

/// Local model served by Ollama.
pub struct OllamaModel {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn ask(&self, question: &str, context: &[SearchResult], language: Language) -> Result<String> {
        let prompt = build_prompt(question, context, language);
        debug!(model = %self.model, prompt_chars = prompt.len(), "asking ollama");

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("Could not connect to Ollama at {}: {}", self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Ollama error {}: {}", status, text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_generate_response(&json)
    }
}

fn parse_generate_response(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing 'response'"))
}

pub fn create_model(config: &LlmConfig) -> Result<Box<dyn LanguageModel>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaModel::new(config)?)),
        "disabled" => Ok(Box::new(DisabledModel)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn ctx(content: &str) -> SearchResult {
        SearchResult {
            content: content.to_string(),
            metadata: ChunkMetadata::new("doc.txt"),
            score: 0.9,
        }
    }

    #[test]
    fn language_parses_and_displays() {
        assert_eq!("ES".parse::<Language>().unwrap(), Language::Es);
        assert_eq!(Language::En.to_string(), "en");
        assert!("fr".parse::<Language>().is_err());
        assert_eq!(
            serde_json::to_string(&Language::Auto).unwrap(),
            "\"auto\""
        );
    }

    #[test]
    fn greetings_and_short_messages_are_conversational() {
        assert!(is_conversational("Hello there, could you please explain your purpose"));
        assert!(is_conversational("thanks a lot"));
        // "hi" inside "this" still counts
        assert!(is_conversational("Explain this control objective for the auditors today"));
        assert!(!is_conversational(
            "Explain the access review requirements for privileged accounts"
        ));
    }

    #[test]
    fn conversational_prompt_is_verbatim() {
        let prompt = build_prompt("hey", &[ctx("ignored")], Language::Es);
        assert_eq!(prompt, "hey");
    }

    #[test]
    fn prompt_joins_context_with_separators() {
        let q = "Explain the access review requirements for privileged accounts";
        let prompt = build_prompt(q, &[ctx("first"), ctx("second")], Language::Es);
        assert_eq!(
            prompt,
            format!(
                "Answer in Spanish, referencing official laws and standards from Spain and the USA.\nQuestion: {}\nContext:\nfirst\n---\nsecond",
                q
            )
        );

        let bare = build_prompt(q, &[], Language::Auto);
        assert!(bare.starts_with("Always answer in English"));
        assert!(!bare.contains("Context:"));
    }

    #[test]
    fn generate_response_parsing() {
        let json = serde_json::json!({"model": "llama3:8b", "response": "42", "done": true});
        assert_eq!(parse_generate_response(&json).unwrap(), "42");
        assert!(parse_generate_response(&serde_json::json!({"done": true})).is_err());
    }

    #[tokio::test]
    async fn disabled_model_errors() {
        assert!(DisabledModel.ask("q", &[], Language::Auto).await.is_err());
    }
}
