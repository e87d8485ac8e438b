use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::{
    answers::{self, AnswerApi},
    app::AppError,
    config::Config,
    llm::LlmClient,
    scrape::{HttpPageSource, PageSource},
    semantic::{Collection, Embedder, EmbeddingModel, QueryHit},
};

/// Everything a query needs, loaded once at startup and shared read-only.
pub struct AppContext {
    embedder: Arc<dyn Embedder>,
    collection: Collection,
    answers: AnswerApi,
    page_source: Box<dyn PageSource>,
    llm: LlmClient,
}

impl AppContext {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        collection: Collection,
        answers: AnswerApi,
        page_source: Box<dyn PageSource>,
        llm: LlmClient,
    ) -> Self {
        Self {
            embedder,
            collection,
            answers,
            page_source,
            llm,
        }
    }

    /// Load the embedding model and open the persisted collection.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = EmbeddingModel::new(
            &config.embedding.model,
            config.resolve(&config.embedding.cache_dir),
            Some(Duration::from_secs(config.embedding.download_timeout_secs)),
        )
        .context("failed to load embedding model")?;

        let collection = Collection::open(
            &config.resolve(&config.index.path),
            &config.index.collection,
            embedder.model_id_hash(),
            embedder.dimensions(),
        )
        .context("failed to open collection")?;

        Ok(Self::new(
            Arc::new(embedder),
            collection,
            AnswerApi::new(&config.answers),
            Box::new(HttpPageSource::from_config(&config.scraper)),
            LlmClient::new(&config.llm),
        ))
    }

    /// Nearest questions to `query`, nearest first.
    pub fn search(&self, query: &str, num_results: usize) -> Result<Vec<QueryHit>, AppError> {
        if query.is_empty() {
            return Err(AppError::InvalidInput("Query cannot be empty.".to_string()));
        }

        let embedding = self.embedder.embed(query)?;
        let hits = self.collection.query(&embedding, num_results)?;

        log::debug!("'{query}': {} hits", hits.len());
        Ok(hits)
    }

    pub fn fetch_answer(&self, answer_id: u64) -> Result<String, AppError> {
        self.answers.fetch_answer(answer_id)
    }

    pub fn scrape_answer(&self, question_id: u64) -> Result<String, AppError> {
        answers::scrape_answer(self.page_source.as_ref(), question_id)
    }

    pub fn generate_answer(&self, prompt: &str) -> Result<String, AppError> {
        if prompt.is_empty() {
            return Err(AppError::InvalidInput("Prompt cannot be empty.".to_string()));
        }

        self.llm.generate(prompt)
    }
}
