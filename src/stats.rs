//! `recall stats`: entry counts per source.

use anyhow::Result;
use context_recall::config::Config;
use context_recall::RetrievalEngine;

pub async fn run_stats(engine: &RetrievalEngine, config: &Config) -> Result<()> {
    let stats = engine.stats().await?;
    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Context Recall Index Stats");
    println!("==========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Embedding:   {}", engine.index().provider().model_name());
    println!();
    println!("  Entries:     {}", stats.total);

    if !stats.per_source.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<40} {:>8}", "SOURCE", "ENTRIES");
        println!("  {}", "-".repeat(49));
        for (source, count) in &stats.per_source {
            println!("  {:<40} {:>8}", source, count);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
