//! Ingest command: chunk local files and add them to a collection.

use crate::app::AppContext;
use crate::cli::Output;
use crate::error::RagChatError;
use crate::tools::{chunk_pages, IngestReport};
use anyhow::Result;
use std::path::Path;
use tracing::warn;

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Split one file into documents: PDFs page by page, anything else as UTF-8 text.
async fn documents_for(path: &Path, ctx: &AppContext) -> crate::error::Result<Vec<String>> {
    let tools = &ctx.settings.tools;
    if is_pdf(path) {
        let chunks = ctx
            .tools
            .context()
            .pdf_chunker(
                &path.to_string_lossy(),
                tools.pdf_max_pages,
                tools.pdf_max_tokens_per_chunk,
            )
            .await?;
        return Ok(chunks.chunks);
    }

    let text = tokio::fs::read_to_string(path).await?;
    let chunks = chunk_pages(&[text], tools.pdf_max_tokens_per_chunk as usize);
    if chunks.is_empty() {
        return Err(RagChatError::InvalidInput(format!("{} has no text", path.display())));
    }
    Ok(chunks)
}

/// Run the ingest command.
pub async fn run_ingest(
    collection: &str,
    files: &[std::path::PathBuf],
    create: bool,
    ctx: &AppContext,
) -> Result<()> {
    if create && ctx.tools.context().create_collection(collection).await? {
        Output::info(&format!("Created collection '{}'.", collection));
    }
    if !ctx.vector_store.collection_exists(collection).await? {
        Output::error(&format!("Collection '{}' does not exist.", collection));
        Output::info("Pass --create or run: ragchat collections create <name>");
        return Err(RagChatError::CollectionNotFound(collection.to_string()).into());
    }

    let pb = Output::progress_bar(files.len() as u64, "Ingesting");
    let mut reports: Vec<IngestReport> = Vec::new();
    let mut skipped = 0;

    for path in files {
        pb.set_message(path.display().to_string());
        let documents = match documents_for(path, ctx).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                pb.println(format!("  skipped {}: {}", path.display(), e));
                skipped += 1;
                pb.inc(1);
                continue;
            }
        };
        let report = ctx.tools.context().add_documents(collection, &documents).await?;
        if !report.failures.is_empty() {
            pb.println(format!("  {}: {}", path.display(), report));
        }
        reports.push(report);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let ingested: usize = reports.iter().map(|r| r.ingested).sum();
    let submitted: usize = reports.iter().map(|r| r.submitted()).sum();
    if ingested == 0 {
        Output::warning(&format!("Nothing was added to '{}'.", collection));
    } else {
        Output::success(&format!(
            "Added {} of {} chunk(s) from {} file(s) to '{}'.",
            ingested,
            submitted,
            files.len() - skipped,
            collection
        ));
    }
    if skipped > 0 {
        Output::warning(&format!("{} file(s) skipped.", skipped));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::test_support::{test_context, ScriptedModel};

    #[test]
    fn test_pdf_detection() {
        assert!(is_pdf(Path::new("a/report.PDF")));
        assert!(!is_pdf(Path::new("notes.txt")));
        assert!(!is_pdf(Path::new("pdf")));
    }

    #[tokio::test]
    async fn test_text_files_are_chunked_and_added() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "VPN access needs a token.\n\nParking renews in January.").unwrap();
        let missing = dir.path().join("missing.txt");

        let ctx = test_context(Settings::default(), ScriptedModel::new(vec![]));
        run_ingest("docs", &[notes, missing], true, &ctx).await.unwrap();

        let info = ctx.vector_store.collection_info("docs").await.unwrap();
        assert_eq!(info.points, 1);
    }

    #[tokio::test]
    async fn test_requires_existing_collection() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "text").unwrap();

        let ctx = test_context(Settings::default(), ScriptedModel::new(vec![]));
        assert!(run_ingest("docs", &[notes], false, &ctx).await.is_err());
        assert!(ctx.vector_store.list_collections().await.unwrap().is_empty());
    }
}
