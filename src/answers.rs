//! Answer bodies by ID, from the Stack Exchange API or the live question page.

use serde::Deserialize;

use crate::app::AppError;
use crate::config::AnswersConfig;
use crate::scrape::{extract_answer_body, PageSource, ScrapeError};

const MISSING_BODY: &str = "Answer body not found.";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    items: Vec<ApiAnswer>,
}

#[derive(Debug, Deserialize)]
struct ApiAnswer {
    body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnswerApi {
    api_url: String,
    site: String,
    filter: String,
}

impl AnswerApi {
    pub fn new(config: &AnswersConfig) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            site: config.site.clone(),
            filter: config.filter.clone(),
        }
    }

    pub fn answer_url(&self, answer_id: u64) -> String {
        format!("{}/answers/{answer_id}", self.api_url)
    }

    /// HTML body of the answer, as returned by the API.
    pub fn fetch_answer(&self, answer_id: u64) -> Result<String, AppError> {
        let url = self.answer_url(answer_id);
        log::debug!("{url}: requesting answer");

        let client = reqwest::blocking::Client::new();
        let resp = client
            .get(&url)
            .query(&[("site", self.site.as_str()), ("filter", self.filter.as_str())])
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "answers api returned {status}: {text}"
            )));
        }

        let payload: ApiResponse = resp.json()?;
        let answer = payload
            .items
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Answer not found.".to_string()))?;

        Ok(answer.body.unwrap_or_else(|| MISSING_BODY.to_string()))
    }
}

/// Accepted (or first) answer body from the live question page.
pub fn scrape_answer(source: &dyn PageSource, question_id: u64) -> Result<String, AppError> {
    let html = source.fetch(question_id).map_err(|err| match err {
        ScrapeError::Http(status) if status == reqwest::StatusCode::NOT_FOUND => {
            AppError::NotFound(format!("Question {question_id} not found."))
        }
        err => AppError::Upstream(err.to_string()),
    })?;

    extract_answer_body(&html)
        .ok_or_else(|| AppError::NotFound("Answer not found on the page.".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::HttpPageSource;
    use crate::tests::spawn_mock;
    use axum::{
        extract::{Path, Query},
        routing::get,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::time::Duration;

    fn api(addr: std::net::SocketAddr) -> AnswerApi {
        AnswerApi::new(&AnswersConfig {
            api_url: format!("http://{addr}/2.3/"),
            ..Default::default()
        })
    }

    fn mock_api() -> std::net::SocketAddr {
        let router = Router::new().route(
            "/2.3/answers/:id",
            get(
                |Path(id): Path<u64>, Query(params): Query<HashMap<String, String>>| async move {
                    let items: Value = match id {
                        42 => json!([{"answer_id": 42, "body": format!("<p>site={} filter={}</p>", params["site"], params["filter"])}]),
                        43 => json!([{"answer_id": 43}]),
                        _ => json!([]),
                    };
                    Json(json!({"items": items, "has_more": false}))
                },
            ),
        );
        spawn_mock(router)
    }

    #[test]
    fn test_fetch_answer_returns_first_body() {
        let addr = mock_api();
        let body = api(addr).fetch_answer(42).unwrap();
        assert_eq!(body, "<p>site=stackoverflow filter=!nO_c2es(N5</p>");
    }

    #[test]
    fn test_fetch_answer_without_items_is_not_found() {
        let addr = mock_api();
        assert!(matches!(api(addr).fetch_answer(1), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_fetch_answer_without_body_uses_placeholder() {
        let addr = mock_api();
        assert_eq!(api(addr).fetch_answer(43).unwrap(), MISSING_BODY);
    }

    #[test]
    fn test_fetch_answer_upstream_error() {
        let router = Router::new().route(
            "/2.3/answers/:id",
            get(|| async { (axum::http::StatusCode::BAD_GATEWAY, "throttled") }),
        );
        let addr = spawn_mock(router);

        let err = api(addr).fetch_answer(42).unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
        assert!(err.to_string().contains("throttled"));
    }

    #[test]
    fn test_fetch_answer_unreachable() {
        let api = AnswerApi::new(&AnswersConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        });
        assert!(matches!(api.fetch_answer(42), Err(AppError::Reqwest(_))));
    }

    #[test]
    fn test_scrape_answer() {
        let router = Router::new()
            .route(
                "/questions/10",
                get(|| async {
                    axum::response::Html(
                        r#"<html><body>
                        <div class="question"><div class="s-prose js-post-body">q</div></div>
                        <div class="answer accepted-answer"><div class="s-prose js-post-body"><p>yes</p></div></div>
                        </body></html>"#,
                    )
                }),
            )
            .route(
                "/questions/11",
                get(|| async { axum::response::Html("<html><body>no answers</body></html>") }),
            );
        let addr = spawn_mock(router);
        let source = HttpPageSource::new(&format!("http://{addr}"), Duration::from_secs(5), "ua");

        assert_eq!(scrape_answer(&source, 10).unwrap(), "<p>yes</p>");
        assert!(matches!(scrape_answer(&source, 11), Err(AppError::NotFound(_))));
        assert!(matches!(scrape_answer(&source, 12), Err(AppError::NotFound(_))));
    }
}
