use std::error::Error;
use std::time::Duration;

use reqwest::StatusCode;

use crate::config::ScraperConfig;

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("HTTP error {0}")]
    Http(StatusCode),

    #[error("request failed: {0}")]
    Request(String),
}

/// Retrieves the raw HTML of a question page.
pub trait PageSource: Send + Sync {
    fn fetch(&self, question_id: u64) -> Result<String, ScrapeError>;
}

/// Fetches `{base_url}/questions/{id}` with a browser user agent and a fixed timeout.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

fn get_error(error: &reqwest::Error) -> String {
    match error.source() {
        Some(e) => match e.source() {
            Some(e) => e.to_string(),
            None => e.to_string(),
        },
        None => error.to_string(),
    }
}

impl HttpPageSource {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            user_agent: user_agent.to_string(),
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
        )
    }

    pub fn question_url(&self, question_id: u64) -> String {
        format!("{}/questions/{question_id}", self.base_url)
    }
}

impl PageSource for HttpPageSource {
    fn fetch(&self, question_id: u64) -> Result<String, ScrapeError> {
        let url = self.question_url(question_id);

        let client = reqwest::blocking::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .build()
            .map_err(|err| ScrapeError::Request(get_error(&err)))?;

        log::debug!("{url}: requesting");

        let resp = client
            .get(&url)
            .send()
            .map_err(|err| ScrapeError::Request(get_error(&err)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Http(status));
        }

        let bytes = resp
            .bytes()
            .map_err(|err| ScrapeError::Request(get_error(&err)))?;

        Ok(String::from_utf8_lossy(&bytes).to_string())
    }
}
