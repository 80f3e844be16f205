//! CSV extraction: one structured text row per record.
//!
//! Each non-empty data row becomes a single chunk of the form
//! `Row <i>: <header_1>: <v1>; <header_2>: <v2>; ...` so the character
//! window chunker never splits a record.

use super::LoaderError;
use crate::text::clean_text;
use std::path::Path;
use tracing::info;

pub(super) fn load_rows(path: &Path) -> Result<Vec<String>, LoaderError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| LoaderError::Parse(format!("Failed to read CSV: {e}")))?;

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LoaderError::Parse(format!("Failed to parse CSV: {e}")))?;
        let cells: Vec<String> = record.iter().map(|cell| cell.trim().to_string()).collect();
        if cells.iter().any(|cell| !cell.is_empty()) {
            raw_rows.push(cells);
        }
    }

    if raw_rows.is_empty() {
        return Err(LoaderError::NoContent("CSV file is empty".to_string()));
    }

    // Blank headers get a synthesized column name.
    let headers: Vec<String> = raw_rows[0]
        .iter()
        .enumerate()
        .map(|(index, header)| {
            let header = header.trim();
            if header.is_empty() {
                format!("column_{}", index + 1)
            } else {
                header.to_string()
            }
        })
        .collect();

    let mut structured_rows = Vec::new();
    for (index, row) in raw_rows[1..].iter().enumerate() {
        let mut fields = Vec::new();
        for (column_index, value) in row.iter().enumerate() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let header = headers
                .get(column_index)
                .cloned()
                .unwrap_or_else(|| format!("column_{}", column_index + 1));
            fields.push(format!("{header}: {value}"));
        }

        if fields.is_empty() {
            continue;
        }
        structured_rows.push(clean_text(&format!("Row {}: {}", index + 1, fields.join("; "))));
    }

    if structured_rows.is_empty() {
        return Err(LoaderError::NoContent(
            "CSV file does not contain meaningful rows".to_string(),
        ));
    }

    info!(rows = structured_rows.len(), path = %path.display(), "loaded CSV dataset");
    Ok(structured_rows)
}
