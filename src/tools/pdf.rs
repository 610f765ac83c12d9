//! `pdf_chunker`: page-capped PDF text extraction and token-bounded chunking.
//!
//! A token is a non-whitespace word-boundary segment (UAX #29). Chunks are packed
//! greedily from paragraphs; a paragraph over budget is split into sentences, and a
//! sentence over budget into runs of tokens. Every token of the extracted text lands
//! in exactly one chunk.

use super::ToolContext;
use crate::error::{RagChatError, Result};
use lopdf::Document;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use unicode_segmentation::UnicodeSegmentation;

/// Result of chunking a PDF.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfChunks {
    pub file: String,
    pub pages_read: usize,
    pub total_pages: usize,
    pub chunks: Vec<String>,
}

impl std::fmt::Display for PdfChunks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Extracted {} chunk(s) from {} of {} page(s) of {}.",
            self.chunks.len(),
            self.pages_read,
            self.total_pages,
            self.file
        )?;
        for (i, chunk) in self.chunks.iter().enumerate() {
            write!(f, "\n\n[{}] {}", i + 1, chunk)?;
        }
        Ok(())
    }
}

/// Number of tokens in `text`.
pub fn count_tokens(text: &str) -> usize {
    text.split_word_bounds()
        .filter(|segment| !segment.trim().is_empty())
        .count()
}

/// Text of the first `max_pages` pages, plus the document's page count.
pub fn extract_pages(path: &Path, max_pages: usize) -> Result<(Vec<String>, usize)> {
    let doc = Document::load(path)
        .map_err(|e| RagChatError::Pdf(format!("Failed to load {}: {}", path.display(), e)))?;

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    let total = page_numbers.len();

    let mut pages = Vec::with_capacity(total.min(max_pages));
    for number in page_numbers.into_iter().take(max_pages) {
        match doc.extract_text(&[number]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                warn!("Could not extract page {} of {}: {}", number, path.display(), e);
                pages.push(String::new());
            }
        }
    }

    Ok((pages, total))
}

fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

/// Split into pieces of at most `max` tokens without losing any.
fn split_tokens(text: &str, max: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut tokens = 0;

    for segment in text.split_word_bounds() {
        let is_token = !segment.trim().is_empty();
        if is_token && tokens == max {
            pieces.push(current.trim().to_string());
            current.clear();
            tokens = 0;
        }
        current.push_str(segment);
        if is_token {
            tokens += 1;
        }
    }
    if tokens > 0 {
        pieces.push(current.trim().to_string());
    }
    pieces
}

/// Pieces of a paragraph that each fit in `max` tokens.
fn units(paragraph: &str, max: usize) -> Vec<String> {
    if count_tokens(paragraph) <= max {
        return vec![paragraph.to_string()];
    }

    let mut out = Vec::new();
    for sentence in paragraph.unicode_sentences() {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        if count_tokens(sentence) <= max {
            out.push(sentence.to_string());
        } else {
            out.extend(split_tokens(sentence, max));
        }
    }
    out
}

/// Pack page texts into chunks of at most `max_tokens` tokens each.
pub fn chunk_pages(pages: &[String], max_tokens: usize) -> Vec<String> {
    let max = max_tokens.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0;

    for paragraph in pages.iter().flat_map(|page| paragraphs(page)) {
        for (i, unit) in units(&paragraph, max).into_iter().enumerate() {
            let n = count_tokens(&unit);
            if n == 0 {
                continue;
            }
            if current_tokens > 0 && current_tokens + n > max {
                chunks.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            if !current.is_empty() {
                current.push_str(if i == 0 { "\n\n" } else { " " });
            }
            current.push_str(&unit);
            current_tokens += n;
        }
    }
    if current_tokens > 0 {
        chunks.push(current);
    }
    chunks
}

impl ToolContext {
    #[instrument(skip(self))]
    pub async fn pdf_chunker(
        &self,
        file_path: &str,
        max_pages: u32,
        max_tokens_per_chunk: u32,
    ) -> Result<PdfChunks> {
        let path = PathBuf::from(shellexpand::tilde(file_path).as_ref());
        if !path.is_file() {
            return Err(RagChatError::Pdf(format!("File not found: {}", file_path)));
        }

        let extract_path = path.clone();
        let (pages, total_pages) = tokio::task::spawn_blocking(move || {
            extract_pages(&extract_path, max_pages as usize)
        })
        .await
        .map_err(|e| RagChatError::Pdf(format!("Extraction task failed: {}", e)))??;

        let chunks = chunk_pages(&pages, max_tokens_per_chunk as usize);
        if chunks.is_empty() {
            return Err(RagChatError::Pdf(format!(
                "No extractable text in {}",
                path.display()
            )));
        }

        info!(
            "Chunked {} of {} page(s) of {} into {} chunk(s)",
            pages.len(),
            total_pages,
            path.display(),
            chunks.len()
        );

        Ok(PdfChunks {
            file: path.display().to_string(),
            pages_read: pages.len(),
            total_pages,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolSettings;
    use crate::test_support::HashEmbedder;
    use crate::vector_store::MemoryVectorStore;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use std::sync::Arc;

    fn write_pdf(path: &Path, page_texts: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in page_texts {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_count_tokens() {
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens("   \n "), 0);
        assert_eq!(count_tokens("Hello, world."), 4);
    }

    #[test]
    fn test_small_text_is_one_chunk() {
        let pages = vec!["First paragraph.\n\nSecond paragraph.".to_string()];
        let chunks = chunk_pages(&pages, 650);
        assert_eq!(chunks, vec!["First paragraph.\n\nSecond paragraph."]);
    }

    #[test]
    fn test_chunks_respect_limit_and_keep_every_token() {
        let long_sentence = words(1200);
        let pages = vec![
            format!("Intro sentence one. Intro sentence two.\n\n{}", long_sentence),
            format!("{}\n\nShort tail paragraph.", words(300)),
        ];
        let total: usize = pages.iter().map(|p| count_tokens(p)).sum();

        let chunks = chunk_pages(&pages, 100);
        assert!(chunks.len() >= 15);
        for chunk in &chunks {
            let n = count_tokens(chunk);
            assert!(n > 0 && n <= 100, "chunk has {} tokens", n);
        }
        assert_eq!(chunks.iter().map(|c| count_tokens(c)).sum::<usize>(), total);
        assert!(chunks[0].starts_with("Intro sentence one."));
        assert!(chunks.last().unwrap().ends_with("Short tail paragraph."));
    }

    #[test]
    fn test_oversized_paragraph_splits_on_sentences() {
        let paragraph = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota.";
        let chunks = chunk_pages(&[paragraph.to_string()], 8);
        assert_eq!(
            chunks,
            vec!["Alpha beta gamma. Delta epsilon zeta.", "Eta theta iota."]
        );
    }

    #[test]
    fn test_blank_pages_produce_nothing() {
        assert!(chunk_pages(&["".to_string(), "  \n\n ".to_string()], 10).is_empty());
    }

    #[test]
    fn test_extract_respects_page_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three.pdf");
        write_pdf(&path, &["Page one text", "Page two text", "Page three text"]);

        let (pages, total) = extract_pages(&path, 2).unwrap();
        assert_eq!(total, 3);
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("Page one"));
        assert!(pages.iter().all(|p| !p.contains("three")));
    }

    #[test]
    fn test_extract_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, "just text").unwrap();
        assert!(matches!(extract_pages(&path, 5), Err(RagChatError::Pdf(_))));
    }

    #[tokio::test]
    async fn test_pdf_chunker_tool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        write_pdf(&path, &["Remote work is allowed on Fridays"]);

        let ctx = ToolContext::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(HashEmbedder::new(8)),
            ToolSettings::default(),
        );
        let result = ctx
            .pdf_chunker(path.to_str().unwrap(), 15, 650)
            .await
            .unwrap();
        assert_eq!(result.pages_read, 1);
        assert_eq!(result.chunks.len(), 1);
        assert!(result.chunks[0].contains("Fridays"));
        assert!(result.to_string().contains("\n\n[1] "));

        let missing = ctx.pdf_chunker("/no/such/file.pdf", 15, 650).await;
        assert!(matches!(missing, Err(RagChatError::Pdf(_))));
    }
}
