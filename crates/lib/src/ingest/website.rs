//! Website fetching with scheme fallback and visible-text extraction.
//!
//! Per-URL failures are tolerated as long as at least one URL yields text;
//! when every URL fails the errors are aggregated into one message.

use super::LoaderError;
use crate::text::clean_text;
use reqwest::Client;
use scraper::Html;
use std::time::Duration;
use tracing::{info, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/123.0 Safari/537.36";
const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Candidate URLs in fetch order: the supplied scheme first, then the
/// opposite one. Scheme-less inputs try https before http.
pub(super) fn candidate_urls(url: &str) -> Vec<String> {
    if let Some(rest) = url.strip_prefix("https://") {
        vec![url.to_string(), format!("http://{rest}")]
    } else if let Some(rest) = url.strip_prefix("http://") {
        vec![url.to_string(), format!("https://{rest}")]
    } else {
        vec![format!("https://{url}"), format!("http://{url}")]
    }
}

pub(super) async fn load_from_urls(client: &Client, urls: &[String]) -> Result<String, LoaderError> {
    let mut contents: Vec<String> = Vec::new();
    let mut failures: Vec<String> = Vec::new();

    for url in urls {
        let stripped = url.trim();
        if stripped.is_empty() {
            continue;
        }

        let mut text_block: Option<String> = None;
        let mut last_error: Option<String> = None;

        for candidate in candidate_urls(stripped) {
            match fetch_visible_text(client, &candidate).await {
                Ok(text) if !text.is_empty() => {
                    info!(url = %candidate, chars = text.len(), "fetched website content");
                    text_block = Some(text);
                    break;
                }
                Ok(_) => {
                    last_error = Some("no textual content".to_string());
                }
                Err(error) => {
                    warn!(url = %candidate, %error, "failed to fetch URL");
                    last_error = Some(error.to_string());
                }
            }
        }

        match text_block {
            Some(text) => contents.push(text),
            None => failures.push(format!(
                "{stripped}: {}",
                last_error.unwrap_or_else(|| "no textual content".to_string())
            )),
        }
    }

    if contents.is_empty() {
        if failures.is_empty() {
            return Err(LoaderError::NoContent(
                "No content retrieved from provided URLs".to_string(),
            ));
        }
        let mut summary = failures.iter().take(3).cloned().collect::<Vec<_>>().join("; ");
        if failures.len() > 3 {
            summary.push_str(&format!(" (and {} more errors)", failures.len() - 3));
        }
        return Err(LoaderError::Fetch(format!(
            "Unable to retrieve content from provided URLs: {summary}"
        )));
    }

    if !failures.is_empty() {
        warn!(
            failed = failures.len(),
            loaded = contents.len(),
            "some URLs failed to load"
        );
    }

    Ok(contents.join("\n\n"))
}

async fn fetch_visible_text(client: &Client, url: &str) -> Result<String, reqwest::Error> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
        .header(reqwest::header::ACCEPT, HTML_ACCEPT)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;
    let body = response.text().await?;
    Ok(strip_html(&body))
}

/// Strips HTML markup down to the document's visible text.
pub(super) fn strip_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    clean_text(&text)
}
