//! `harvest ledger`: summarize a ledger snapshot.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use harvester::{LedgerSnapshot, ResourceCategory};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: ResourceCategory,
    pub resources: usize,
    /// Full collections including re-collections
    pub collections: u64,
    pub last_collected_at: Option<DateTime<Utc>>,
}

pub fn summarize(snapshot: &LedgerSnapshot) -> Vec<CategorySummary> {
    ResourceCategory::COLLECTIBLE
        .into_iter()
        .map(|category| {
            let records: Vec<_> = snapshot.for_category(category).collect();
            CategorySummary {
                category,
                resources: records.len(),
                collections: records.iter().map(|r| u64::from(r.collections)).sum(),
                last_collected_at: records.iter().map(|r| r.collected_at).max(),
            }
        })
        .collect()
}

pub async fn run(path: &Path, json: bool, verbose: bool) -> Result<()> {
    let snapshot = LedgerSnapshot::load(path)
        .await
        .with_context(|| format!("Failed to load ledger {}", path.display()))?;
    let summary = summarize(&snapshot);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let taken = snapshot
        .taken_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());
    println!("{} {} (taken {})", "Ledger".bold(), path.display(), taken.dimmed());
    for row in &summary {
        let last = row
            .last_collected_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<14} {:>5} resources {:>6} collections  last {}",
            row.category.to_string().cyan(),
            row.resources,
            row.collections,
            last
        );
        if verbose {
            for record in snapshot.for_category(row.category) {
                println!(
                    "      {} {} x{}",
                    record.fingerprint.short().dimmed(),
                    record.key,
                    record.collections
                );
            }
        }
    }
    Ok(())
}
