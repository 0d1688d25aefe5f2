//! One chat turn over the retrieval engine.
//!
//! `respond` searches, writes the audit line, asks the model with the
//! search results as context, and records the exchange back into the index
//! so later questions can recall it.

use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use crate::engine::RetrievalEngine;
use crate::exchange_log::ExchangeLog;
use crate::llm::{Language, LanguageModel};
use crate::models::SearchResult;

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub answer: String,
    /// Distinct `metadata.source` values of the context, in rank order.
    pub sources: Vec<String>,
    pub context: Vec<SearchResult>,
}

pub struct ChatSession<'a> {
    engine: &'a RetrievalEngine,
    model: &'a dyn LanguageModel,
    log: Option<ExchangeLog>,
}

impl<'a> ChatSession<'a> {
    pub fn new(engine: &'a RetrievalEngine, model: &'a dyn LanguageModel) -> Self {
        Self {
            engine,
            model,
            log: None,
        }
    }

    pub fn with_log(mut self, log: ExchangeLog) -> Self {
        self.log = Some(log);
        self
    }

    pub async fn respond(
        &self,
        question: &str,
        k: usize,
        page: usize,
        language: Language,
    ) -> Result<ChatReply> {
        let context = self.engine.search(question, k, page).await?;

        if let Some(log) = &self.log {
            // audit failures never block an answer
            if let Err(e) = log.append(question, &context, language) {
                warn!(error = %e, path = %log.path().display(), "failed to append exchange log");
            }
        }

        let answer = self.model.ask(question, &context, language).await?;
        self.engine.record_exchange(question, &answer).await?;

        Ok(ChatReply {
            answer,
            sources: distinct_sources(&context),
            context,
        })
    }
}

fn distinct_sources(context: &[SearchResult]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for result in context {
        let source = &result.metadata.source;
        if !source.is_empty() && !sources.contains(source) {
            sources.push(source.clone());
        }
    }
    sources
}
