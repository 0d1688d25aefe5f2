//! `recall ask` and `recall remember`.

use anyhow::Result;
use context_recall::chat::ChatSession;
use context_recall::config::Config;
use context_recall::exchange_log::ExchangeLog;
use context_recall::llm::{create_model, Language};
use context_recall::RetrievalEngine;

pub async fn run_ask(
    engine: &RetrievalEngine,
    config: &Config,
    question: &str,
    k: usize,
    language: Language,
) -> Result<()> {
    let model = create_model(&config.llm)?;
    let session = ChatSession::new(engine, model.as_ref())
        .with_log(ExchangeLog::new(&config.log.exchange_log));

    let reply = session.respond(question, k, 1, language).await?;
    println!("{}", reply.answer.trim());
    if !reply.sources.is_empty() {
        println!();
        println!("Sources: {}", reply.sources.join(", "));
    }
    Ok(())
}

pub async fn run_remember(engine: &RetrievalEngine, question: &str, answer: &str) -> Result<()> {
    engine.record_exchange(question, answer).await?;
    println!("Recorded exchange.");
    Ok(())
}
