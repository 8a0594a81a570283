//! Tavily semantic search.

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use offercopilot_shared::{OfferCopilotError, Result};

/// Raw results kept when Tavily returns no answer.
const MAX_RAW_RESULTS: usize = 5;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    include_answer: bool,
    include_domains: [&'a str; 0],
    exclude_domains: [&'a str; 0],
}

/// Parsed search response. Results stay as raw JSON so the fallback
/// serialization keeps every field Tavily sent.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub results: Vec<Value>,
}

/// `"results": null` reads the same as a missing list.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl SearchResponse {
    /// Section text: the answer when present, else the first raw results as JSON.
    pub fn data(&self) -> String {
        match self.answer.as_deref() {
            Some(answer) if !answer.is_empty() => answer.to_string(),
            _ => {
                let top = &self.results[..self.results.len().min(MAX_RAW_RESULTS)];
                serde_json::to_string(top).unwrap_or_default()
            }
        }
    }

    /// URL of the first result, if it has one.
    pub fn first_url(&self) -> Option<&str> {
        self.results
            .first()
            .and_then(|r| r.get("url"))
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
    }
}

/// POST one search with `include_answer` and no domain filters.
pub(crate) async fn search(
    client: &Client,
    url: &str,
    api_key: &str,
    query: &str,
) -> Result<SearchResponse> {
    let body = SearchRequest {
        api_key,
        query,
        include_answer: true,
        include_domains: [],
        exclude_domains: [],
    };

    let response = client
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(|e| OfferCopilotError::Network(format!("Tavily request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(OfferCopilotError::Provider(format!(
            "Tavily API error: {}",
            status.as_u16()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| OfferCopilotError::parse(format!("invalid Tavily response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> SearchResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn answer_wins() {
        let r = response(json!({"answer": "resumo", "results": [{"url": "http://a"}]}));
        assert_eq!(r.data(), "resumo");
        assert_eq!(r.first_url(), Some("http://a"));
    }

    #[test]
    fn falls_back_to_top_five_results() {
        let results: Vec<Value> = (0..7).map(|i| json!({"url": format!("http://{i}")})).collect();
        let r = response(json!({"answer": "", "results": results}));

        let data: Vec<Value> = serde_json::from_str(&r.data()).unwrap();
        assert_eq!(data.len(), 5);
        assert_eq!(data[4]["url"], "http://4");
    }

    #[test]
    fn no_results_serializes_empty_list() {
        let r = response(json!({}));
        assert_eq!(r.data(), "[]");
        assert_eq!(r.first_url(), None);
    }

    #[test]
    fn null_results_keep_the_answer() {
        let r: SearchResponse =
            serde_json::from_str(r#"{"answer":"resumo","results":null}"#).unwrap();
        assert_eq!(r.data(), "resumo");
        assert_eq!(r.first_url(), None);

        let r = response(json!({"answer": null, "results": null}));
        assert_eq!(r.data(), "[]");
    }

    #[test]
    fn first_result_without_url() {
        let r = response(json!({"results": [{"title": "no link"}, {"url": "http://b"}]}));
        assert_eq!(r.first_url(), None);
    }

    #[test]
    fn request_shape() {
        let body = SearchRequest {
            api_key: "tvly",
            query: "q",
            include_answer: true,
            include_domains: [],
            exclude_domains: [],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "api_key": "tvly",
                "query": "q",
                "include_answer": true,
                "include_domains": [],
                "exclude_domains": []
            })
        );
    }
}
