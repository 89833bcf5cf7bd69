//! Markdown knowledge-base indexing: discover, chunk, embed, store
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::chunker::chunk_text;
use crate::db::{DocumentMetadata, DocumentStore, NewDocument};
use crate::llm::Embedder;

lazy_static! {
    static ref TITLE_REGEX: Regex = Regex::new(r"(?m)^#\s+(.+)$").unwrap();
}

const DEFAULT_CATEGORY: &str = "general";
const DEFAULT_TITLE: &str = "Untitled";

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct IndexReport {
    pub files_found: usize,
    pub files_processed: usize,
    pub chunks_created: usize,
    pub failures: usize,
}

pub struct DocumentIndexer<'a> {
    store: &'a DocumentStore,
    embedder: &'a dyn Embedder,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl<'a> DocumentIndexer<'a> {
    pub fn new(
        store: &'a DocumentStore,
        embedder: &'a dyn Embedder,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self { store, embedder, chunk_size, chunk_overlap }
    }

    /// Rebuilds the document table from every `*.md` file under `root`.
    /// Existing chunks are replaced in one transaction once all files have
    /// been embedded; a file that fails is skipped and counted. When no file
    /// succeeds the stored chunks are left untouched and an error is returned.
    pub async fn index_directory(&self, root: &Path) -> anyhow::Result<IndexReport> {
        if !root.is_dir() {
            return Err(anyhow::anyhow!("Documentation directory not found: {}", root.display()));
        }
        let files = find_markdown_files(root)?;
        info!("Found {} markdown files under {}", files.len(), root.display());

        let mut report = IndexReport { files_found: files.len(), ..Default::default() };
        let mut documents = Vec::new();

        for path in &files {
            match self.prepare_file(root, path).await {
                Ok(mut chunks) => {
                    info!("Prepared {} ({} chunks)", display_source(root, path), chunks.len());
                    report.files_processed += 1;
                    report.chunks_created += chunks.len();
                    documents.append(&mut chunks);
                }
                Err(e) => {
                    error!("Failed to index {}: {}", path.display(), e);
                    report.failures += 1;
                }
            }
        }

        if report.files_found > 0 && report.files_processed == 0 {
            return Err(anyhow::anyhow!(
                "All {} files failed to index; keeping the existing documents",
                report.files_found
            ));
        }

        self.store.replace_all(&documents)?;
        crate::metrics::set_indexed_documents(documents.len());
        info!(
            "Indexing complete: {}/{} files, {} chunks, {} failures",
            report.files_processed, report.files_found, report.chunks_created, report.failures
        );
        Ok(report)
    }

    async fn prepare_file(&self, root: &Path, path: &Path) -> anyhow::Result<Vec<NewDocument>> {
        let content = tokio::fs::read_to_string(path).await?;
        let chunks = chunk_text(&content, self.chunk_size, self.chunk_overlap)?;
        if chunks.is_empty() {
            warn!("{} is empty, nothing to index", path.display());
            return Ok(Vec::new());
        }

        let embeddings = self.embedder.embed(&chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(anyhow::anyhow!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            ));
        }

        let title = extract_title(&content);
        let category = category_for(root, path);
        let source = display_source(root, path);
        let total = chunks.len();
        debug!("{}: title '{}', category '{}'", source, title, category);

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (chunk, embedding))| NewDocument {
                content: chunk,
                metadata: DocumentMetadata {
                    source: source.clone(),
                    category: category.clone(),
                    title: title.clone(),
                    section: (total > 1).then(|| format!("Part {}/{}", i + 1, total)),
                },
                embedding,
            })
            .collect())
    }
}

/// All `*.md` files below `root`, sorted for a stable indexing order.
pub fn find_markdown_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "md") {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

pub fn extract_title(content: &str) -> String {
    TITLE_REGEX
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// Immediate parent directory name, or `general` for files at the root.
fn category_for(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .ok()
        .and_then(|rel| rel.parent())
        .and_then(|parent| parent.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

fn display_source(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
