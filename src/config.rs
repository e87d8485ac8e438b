use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::storage::{self, StorageManager};

const CONFIG_FILE: &str = "config.yaml";

/// Default embedding model, the same one the dataset was originally embedded with.
const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_SCRAPE_END: u64 = 2_000_000;
const DEFAULT_SCRAPE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SCRAPE_DELAY_SECS: u64 = 5;
const DEFAULT_SAVE_EVERY: u64 = 5;
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Where the vector collection lives.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index directory, relative to the base directory unless absolute
    #[serde(default = "default_index_path")]
    pub path: String,

    /// Name of the collection inside the index directory
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            collection: default_collection(),
        }
    }
}

fn default_index_path() -> String {
    "vector_db".to_string()
}

fn default_collection() -> String {
    "stackoverflow".to_string()
}

/// Configuration for the embedding model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Directory downloaded model files are cached in
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            cache_dir: default_cache_dir(),
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_cache_dir() -> String {
    ".cache".to_string()
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Line-delimited JSON dataset
    #[serde(default = "default_dataset")]
    pub dataset: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

fn default_dataset() -> String {
    "stackoverflow-data-idf.json".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Site root, question pages live at `{base_url}/questions/{id}`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_data_file")]
    pub data_file: String,

    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,

    /// Last ID scanned when `--end` is not given
    #[serde(default = "default_scrape_end")]
    pub default_end: u64,

    #[serde(default = "default_scrape_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause between two consecutive page requests
    #[serde(default = "default_scrape_delay_secs")]
    pub delay_secs: u64,

    /// Write the corpus after this many processed IDs
    #[serde(default = "default_save_every")]
    pub save_every: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            data_file: default_data_file(),
            checkpoint_file: default_checkpoint_file(),
            default_end: DEFAULT_SCRAPE_END,
            timeout_secs: DEFAULT_SCRAPE_TIMEOUT_SECS,
            delay_secs: DEFAULT_SCRAPE_DELAY_SECS,
            save_every: DEFAULT_SAVE_EVERY,
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://stackoverflow.com".to_string()
}

fn default_data_file() -> String {
    "data.json".to_string()
}

fn default_checkpoint_file() -> String {
    "last_scraped.txt".to_string()
}

fn default_scrape_end() -> u64 {
    DEFAULT_SCRAPE_END
}

fn default_scrape_timeout_secs() -> u64 {
    DEFAULT_SCRAPE_TIMEOUT_SECS
}

fn default_scrape_delay_secs() -> u64 {
    DEFAULT_SCRAPE_DELAY_SECS
}

fn default_save_every() -> u64 {
    DEFAULT_SAVE_EVERY
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Stack Exchange API settings used to fetch answer bodies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswersConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_site")]
    pub site: String,

    /// Response filter that makes the API include the answer body
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for AnswersConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            site: default_site(),
            filter: default_filter(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.stackexchange.com/2.3".to_string()
}

fn default_site() -> String {
    "stackoverflow".to_string()
}

fn default_filter() -> String {
    "!nO_c2es(N5".to_string()
}

/// Local model-serving endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
        }
    }
}

fn default_llm_endpoint() -> String {
    "http://localhost:11434/api/chat".to_string()
}

fn default_llm_model() -> String {
    "llama3".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub answers: AnswersConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.index.collection.trim().is_empty() {
            bail!("index.collection must not be empty");
        }

        if self.ingest.batch_size == 0 {
            bail!("ingest.batch_size must be greater than 0");
        }

        if self.embedding.download_timeout_secs == 0 {
            bail!("embedding.download_timeout_secs must be greater than 0");
        }

        let scraper = &self.scraper;
        if scraper.timeout_secs == 0 {
            bail!("scraper.timeout_secs must be greater than 0");
        }
        if scraper.save_every == 0 {
            bail!("scraper.save_every must be greater than 0");
        }

        for (name, value) in [
            ("scraper.base_url", &scraper.base_url),
            ("answers.api_url", &self.answers.api_url),
            ("llm.endpoint", &self.llm.endpoint),
        ] {
            url::Url::parse(value).with_context(|| format!("{name} is not a valid url: {value}"))?;
        }

        Ok(())
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path)
            .with_context(|| format!("failed to open config directory {base_path}"))?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            store.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str =
            String::from_utf8(store.read(CONFIG_FILE)?).context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        Path::new(&self.base_path)
    }

    /// Resolves a configured path against the base directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.base_path().join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_config() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().to_str().unwrap();

        let config = Config::load_with(base).unwrap();

        assert!(tmp.path().join(CONFIG_FILE).exists());
        assert_eq!(config.ingest.batch_size, 100);
        assert_eq!(config.index.collection, "stackoverflow");
        assert_eq!(config.scraper.default_end, 2_000_000);
        assert_eq!(config.scraper.delay_secs, 5);
        assert_eq!(config.answers.filter, "!nO_c2es(N5");
    }

    #[test]
    fn test_partial_config_is_filled_and_resaved() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "ingest:\n  batch_size: 7\n").unwrap();

        let config = Config::load_with(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(config.ingest.batch_size, 7);
        assert_eq!(config.ingest.dataset, "stackoverflow-data-idf.json");

        let saved = std::fs::read_to_string(tmp.path().join(CONFIG_FILE)).unwrap();
        assert!(saved.contains("collection: stackoverflow"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "ingest:\n  batch_size: 0\n").unwrap();

        let err = Config::load_with(tmp.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "llm:\n  endpoint: not a url\n").unwrap();

        assert!(Config::load_with(tmp.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_resolve_relative_to_base() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_with(tmp.path().to_str().unwrap()).unwrap();

        assert_eq!(config.resolve("data.json"), tmp.path().join("data.json"));
        assert_eq!(config.resolve("/abs/data.json"), PathBuf::from("/abs/data.json"));
    }
}
