use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::time::Duration;

use super::{ SearchError, SearchOutcome, WebSearch };
use crate::cli::Args;

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilyResponse {
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    content: String,
}

pub struct TavilySearch {
    http: HttpClient,
    api_key: String,
    base_url: String,
}

impl TavilySearch {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, SearchError> {
        if api_key.trim().is_empty() {
            return Err(SearchError::Config("search API key is empty".into()));
        }
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { http, api_key, base_url })
    }

    pub fn from_args(args: &Args) -> Result<Self, SearchError> {
        Self::new(
            args.search_api_key.clone(),
            args.search_base_url.clone(),
            Duration::from_secs(args.http_timeout_secs)
        )
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchOutcome, SearchError> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let req = TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: "basic",
            include_answer: true,
            max_results,
        };
        let resp = self.http
            .post(&url)
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json::<TavilyResponse>()
            .await?;

        Ok(SearchOutcome {
            answer: resp.answer,
            excerpts: resp.results
                .into_iter()
                .map(|r| r.content)
                .filter(|c| !c.trim().is_empty())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{ routing::post, Json, Router };
    use serde_json::{ json, Value };

    #[tokio::test]
    async fn maps_answer_and_results() {
        let app = Router::new().route(
            "/search",
            post(|Json(body): Json<Value>| async move {
                let echoed = body["max_results"].clone();
                Json(
                    json!({
                        "answer": "42",
                        "results": [
                            {"title": "t1", "url": "u1", "content": "first excerpt"},
                            {"title": "t2", "url": "u2", "content": ""},
                            {"title": "t3", "url": "u3", "content": format!("asked for {}", echoed)}
                        ]
                    })
                )
            })
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let search = TavilySearch::new(
            "tvly-test".into(),
            format!("http://{}", addr),
            Duration::from_secs(5)
        ).unwrap();
        let outcome = search.search("meaning of life", 3).await.unwrap();
        assert_eq!(outcome.answer.as_deref(), Some("42"));
        assert_eq!(outcome.excerpts, vec!["first excerpt".to_string(), "asked for 3".to_string()]);
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(TavilySearch::new(" ".into(), "http://x".into(), Duration::from_secs(1)).is_err());
    }
}
