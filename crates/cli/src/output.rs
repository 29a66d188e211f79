use anyhow::Result;
use kb_search::{IndexReport, QuestionContext, SearchHit, SearchOutcome, ServiceState};
use kb_vector_store::Fingerprint;
use serde::Serialize;
use std::path::PathBuf;

const PREVIEW_CHARS: usize = 160;

#[derive(Serialize)]
pub struct FingerprintReport {
    pub fingerprint: Fingerprint,
    pub chunks: usize,
    pub root: PathBuf,
}

#[derive(Serialize)]
struct IndexOutput<'a> {
    #[serde(flatten)]
    report: &'a IndexReport,
    state: ServiceState,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_index(report: &IndexReport, state: ServiceState, json: bool) -> Result<()> {
    if json {
        return print_json(&IndexOutput { report, state });
    }
    let source = match report.source {
        kb_search::IndexSource::Cache => "cache",
        kb_search::IndexSource::Provider => "provider",
    };
    println!(
        "Indexed {} chunks (dim {}) from {source} via {}",
        report.chunks, report.dimension, report.provider_id
    );
    println!("Fingerprint: {}", report.fingerprint);
    Ok(())
}

pub fn print_outcome(outcome: &SearchOutcome, json: bool) -> Result<()> {
    if json {
        return print_json(outcome);
    }
    if outcome.mode == kb_search::RetrievalMode::KeywordFallback {
        println!("(keyword fallback: query could not be embedded)");
    }
    if outcome.hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (rank, hit) in outcome.hits.iter().enumerate() {
        print_hit(rank + 1, hit);
    }
    Ok(())
}

pub fn print_context(context: &QuestionContext, json: bool) -> Result<()> {
    if json {
        return print_json(context);
    }
    for entry in &context.sources {
        println!("Q: {}", entry.question);
        if entry.sources.is_empty() {
            println!("   (no sources)");
        }
        for source in &entry.sources {
            println!("   - {source}");
        }
    }
    println!();
    println!("{} unique chunks:", context.chunks.len());
    for (rank, hit) in context.chunks.iter().enumerate() {
        print_hit(rank + 1, hit);
    }
    Ok(())
}

pub fn print_fingerprint(report: &FingerprintReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    println!("{}", report.fingerprint);
    println!("{} chunks under {}", report.chunks, report.root.display());
    Ok(())
}

fn print_hit(rank: usize, hit: &SearchHit) {
    println!(
        "{rank:>2}. [{}] {:.3}  {}",
        hit.priority, hit.score, hit.id
    );
    println!("    {}", preview(&hit.content));
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}
