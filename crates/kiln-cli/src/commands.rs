use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

use kiln_config::Config;
use kiln_core::{DocumentSummary, EmbeddingProvider, ObserverMode};
use kiln_enrich::HashEmbeddingProvider;
use kiln_store::Repository;

use crate::cli::ObserverModeArg;

pub fn open_repository(config: &Config) -> Result<Repository> {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbeddingProvider::new());
    let repo = Repository::open(&config.storage.database_path, embedder)
        .context("failed to open kiln store")?;
    Ok(repo)
}

/// Parse and upsert `path`: a single file, or every file under a directory
/// tree whose extension matches `config.watch.extensions`.
pub fn ingest(config: &Config, repo: &Repository, path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("path does not exist: {}", path.display());
    }

    let files = if path.is_dir() {
        collect_matching_files(path, &config.watch.extensions)
    } else {
        vec![path.to_path_buf()]
    };

    for file in &files {
        let bytes = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let parsed = kiln_parser::parse_markdown(&bytes);
        repo.upsert(&file.to_string_lossy(), &parsed)?;
    }

    println!("ingested {} document(s)", files.len());
    Ok(())
}

fn collect_matching_files(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let lowered: Vec<String> = extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();
    let mut files = Vec::new();
    walk(root, &lowered, &mut files);
    files
}

fn walk(dir: &Path, extensions: &[String], files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, extensions, files);
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|ext| ext == &e.to_lowercase()))
            .unwrap_or(false)
        {
            files.push(path);
        }
    }
}

pub fn watch(
    config: &Config,
    repo: &Repository,
    mode: Option<ObserverModeArg>,
    iterations: Option<u64>,
    duration_secs: Option<u64>,
) -> Result<()> {
    let mode = match mode {
        Some(ObserverModeArg::Polling) => ObserverMode::Polling,
        Some(ObserverModeArg::Push) => ObserverMode::Push,
        Some(ObserverModeArg::Auto) | None => ObserverMode::Auto,
    };

    let result = kiln_watch::run(
        repo,
        mode,
        &config.watch.roots,
        &config.watch.extensions,
        std::time::Duration::from_millis(1000),
        std::time::Duration::from_millis(config.watch.debounce_ms),
        iterations,
        duration_secs.map(std::time::Duration::from_secs),
    )?;

    println!(
        "observer run complete: {} created, {} modified, {} deleted",
        result.created, result.modified, result.deleted
    );
    Ok(())
}

pub fn search(repo: &Repository, query: &str, limit: usize) -> Result<()> {
    let results = repo.search(query, limit)?;
    print_summary_table(&results);
    Ok(())
}

pub fn semantic(repo: &Repository, query: &str, limit: usize) -> Result<()> {
    let results = repo.semantic_search(query, limit)?;
    print_summary_table(&results);
    Ok(())
}

fn print_summary_table(results: &[DocumentSummary]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec!["id", "title", "path", "updated_at"]);
    for doc in results {
        table.add_row(vec![
            doc.id.to_string(),
            doc.title.clone(),
            doc.path.clone(),
            doc.updated_at.to_rfc3339(),
        ]);
    }
    println!("{table}");
}

pub fn get_doc(
    repo: &Repository,
    id: i64,
    content: bool,
    max_tokens: Option<u32>,
    section: Option<&str>,
) -> Result<()> {
    match repo.get_document(id, content, max_tokens, section)? {
        Some(detail) => {
            println!("{}", serde_json::to_string_pretty(&detail)?);
            Ok(())
        }
        None => bail!("document not found: {id}"),
    }
}

pub fn stats(repo: &Repository) -> Result<()> {
    let stats = repo.system_stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

pub async fn check_links(repo: &Repository, document_id: i64, check_external: bool) -> Result<()> {
    let path = repo
        .get_document(document_id, false, None, None)?
        .map(|d| d.path)
        .with_context(|| format!("document not found: {document_id}"))?;

    let results = repo.validate_links(document_id, &path, check_external).await?;

    let broken = results
        .iter()
        .filter(|r| r.status == kiln_core::LinkStatus::Broken)
        .count();
    println!("{}", serde_json::to_string_pretty(&results)?);
    if broken > 0 {
        bail!("{broken} broken link(s) found");
    }
    Ok(())
}
