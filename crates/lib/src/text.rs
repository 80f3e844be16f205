//! Text sanitation applied to every ingestion and chunking path.

use unicode_normalization::UnicodeNormalization;

/// Code points removed outright before whitespace collapsing: NUL, the
/// byte-order mark and the zero-width family carry no textual content but
/// survive naive extraction from PDFs and scraped HTML.
const STRIPPED_CODE_POINTS: [char; 5] = ['\u{0000}', '\u{FEFF}', '\u{200B}', '\u{200C}', '\u{200D}'];

/// Returns text normalized for chunking and embedding.
///
/// Applies compatibility-form Unicode normalization (NFKC), drops the code
/// points listed in [`STRIPPED_CODE_POINTS`], and collapses every run of
/// whitespace (newlines included) into a single space with outer trim.
/// Pure, total and idempotent; empty input yields the empty string.
pub fn clean_text(text: &str) -> String {
    let normalized: String = text
        .nfkc()
        .filter(|c| !STRIPPED_CODE_POINTS.contains(c))
        .collect();
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}
