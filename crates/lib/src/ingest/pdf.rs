//! PDF text extraction, page by page.
//!
//! Parsing is CPU-bound, so the whole document is handed to a blocking
//! worker. Empty pages are logged and skipped; surviving pages are joined
//! with blank-line separators before windowed chunking.

use super::LoaderError;
use crate::text::clean_text;
use pdf::file::FileOptions;
use std::path::Path;
use tracing::{info, warn};

pub(super) async fn load_text(path: &Path) -> Result<String, LoaderError> {
    let data = tokio::fs::read(path).await?;
    let pages = tokio::task::spawn_blocking(move || extract_pages(&data))
        .await
        .map_err(|e| LoaderError::Parse(format!("PDF extraction task failed: {e}")))??;

    if pages.is_empty() {
        return Err(LoaderError::NoContent(
            "PDF file does not contain extractable text".to_string(),
        ));
    }

    info!(pages = pages.len(), path = %path.display(), "loaded PDF dataset");
    Ok(pages.join("\n\n"))
}

fn extract_pages(data: &[u8]) -> Result<Vec<String>, LoaderError> {
    let file = FileOptions::cached()
        .load(data)
        .map_err(|e| LoaderError::Parse(format!("Failed to open PDF: {e}")))?;
    let resolver = file.resolver();

    let mut pages = Vec::new();
    for page_num in 0..file.num_pages() {
        let page = file
            .get_page(page_num)
            .map_err(|e| LoaderError::Parse(format!("Failed to read PDF page: {e}")))?;

        let mut page_text = String::new();
        if let Some(content) = &page.contents {
            let operations = content
                .operations(&resolver)
                .map_err(|e| LoaderError::Parse(format!("Failed to decode PDF page: {e}")))?;
            for op in operations.iter() {
                match op {
                    pdf::content::Op::TextDraw { text } => {
                        page_text.push_str(&text.to_string_lossy());
                    }
                    pdf::content::Op::TextDrawAdjusted { array } => {
                        for item in array.iter() {
                            if let pdf::content::TextDrawAdjusted::Text(text) = item {
                                page_text.push_str(&text.to_string_lossy());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        let cleaned = clean_text(&page_text);
        if cleaned.is_empty() {
            warn!(page = page_num + 1, "empty PDF page");
        } else {
            pages.push(cleaned);
        }
    }

    Ok(pages)
}
