//! `recall search` and `recall batch` output.

use anyhow::Result;
use context_recall::batch::BatchOptions;
use context_recall::models::SearchResult;
use context_recall::RetrievalEngine;

fn excerpt(content: &str, max_chars: usize) -> String {
    let flat = content.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut)
}

fn print_results(results: &[SearchResult], first_rank: usize) {
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {}",
            first_rank + i,
            result.score,
            result.metadata.source
        );
        println!("    excerpt: \"{}\"", excerpt(&result.content, 240));
        println!();
    }
}

pub async fn run_search(
    engine: &RetrievalEngine,
    query: &str,
    k: usize,
    page: usize,
    json: bool,
) -> Result<()> {
    let results = engine.search(query, k, page).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let first_rank = page.saturating_sub(1) * k + 1;
    print_results(&results, first_rank);
    Ok(())
}

pub async fn run_batch(
    engine: &RetrievalEngine,
    queries: &[String],
    k: usize,
    flatten: bool,
) -> Result<()> {
    let batch = engine
        .batch_search(queries, k, BatchOptions::default())
        .await;

    if flatten {
        // completion order, like a single concatenated result list
        let flat = batch.flatten()?;
        println!("{}", serde_json::to_string_pretty(&flat)?);
        return Ok(());
    }

    let failures = batch.failures();
    for outcome in batch.in_submission_order() {
        println!("== {}", outcome.query);
        match &outcome.results {
            Ok(results) if results.is_empty() => {
                println!("No results.");
                println!();
            }
            Ok(results) => print_results(results, 1),
            Err(e) => {
                println!("error: {}", e);
                println!();
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} queries failed", failures, queries.len());
    }
    Ok(())
}
