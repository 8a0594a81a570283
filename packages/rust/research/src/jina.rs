//! Jina Reader: fetch a page's readable content through `r.jina.ai`.

use reqwest::Client;
use reqwest::header::ACCEPT;

use offercopilot_shared::{OfferCopilotError, Result};

/// Maximum characters kept from a reader response.
pub const MAX_READER_CHARS: usize = 5000;

/// Build the reader URL for `target` (the page URL is appended verbatim).
pub(crate) fn reader_url(base: &str, target: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), target)
}

/// Fetch `target` through the reader and truncate the body.
pub(crate) async fn read(client: &Client, base: &str, target: &str) -> Result<String> {
    let response = client
        .get(reader_url(base, target))
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| OfferCopilotError::Network(format!("Jina Reader request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(OfferCopilotError::Provider(format!(
            "Jina Reader error: {}",
            status.as_u16()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| OfferCopilotError::Network(format!("Jina Reader body: {e}")))?;

    Ok(truncate_chars(&body, MAX_READER_CHARS))
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_url_appends_target() {
        assert_eq!(
            reader_url("https://r.jina.ai/", "http://a.com/x"),
            "https://r.jina.ai/http://a.com/x"
        );
    }

    #[test]
    fn truncates_on_char_boundary() {
        let text = "ação".repeat(2000);
        let cut = truncate_chars(&text, MAX_READER_CHARS);
        assert_eq!(cut.chars().count(), MAX_READER_CHARS);

        assert_eq!(truncate_chars("curto", MAX_READER_CHARS), "curto");
    }
}
