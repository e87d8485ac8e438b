//! A named, persisted collection inside an index directory.

use std::path::{Path, PathBuf};

use crate::question::Metadata;
use crate::semantic::index::{IndexError, QueryHit, VectorEntry, VectorIndex};
use crate::semantic::storage::{VectorStorage, VectorStorageError};

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("collection '{0}' does not exist, run ingestion first")]
    NotFound(String),

    #[error("upsert arrays differ in length: {ids} ids, {documents} documents, {embeddings} embeddings, {metadatas} metadatas")]
    LengthMismatch {
        ids: usize,
        documents: usize,
        embeddings: usize,
        metadatas: usize,
    },

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Storage error: {0}")]
    Storage(#[from] VectorStorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parallel arrays for one upsert call.
#[derive(Debug, Clone, Default)]
pub struct UpsertBatch {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub metadatas: Vec<Metadata>,
}

impl UpsertBatch {
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Write side of a collection, as seen by ingestion.
pub trait VectorStore {
    /// Insert or overwrite every entry of the batch by id.
    fn upsert(&mut self, batch: UpsertBatch) -> Result<(), CollectionError>;

    fn count(&self) -> usize;

    /// Make previous upserts durable.
    fn persist(&self) -> Result<(), CollectionError>;
}

pub struct Collection {
    name: String,
    model_id: [u8; 32],
    index: VectorIndex,
    storage: VectorStorage,
}

fn collection_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.bin"))
}

impl Collection {
    /// Open an existing collection; fails with `NotFound` if it was never persisted.
    pub fn open(
        dir: &Path,
        name: &str,
        model_id: [u8; 32],
        dimensions: usize,
    ) -> Result<Self, CollectionError> {
        let storage = VectorStorage::new(collection_path(dir, name));
        if !storage.exists() {
            return Err(CollectionError::NotFound(name.to_string()));
        }

        let index = storage.load(&model_id, dimensions)?;
        log::info!("loaded {} vectors from collection '{name}'", index.len());

        Ok(Self {
            name: name.to_string(),
            model_id,
            index,
            storage,
        })
    }

    /// Open the collection, creating an empty one if needed.
    ///
    /// A collection written with another model is replaced by a fresh one.
    pub fn open_or_create(
        dir: &Path,
        name: &str,
        model_id: [u8; 32],
        dimensions: usize,
    ) -> Result<Self, CollectionError> {
        std::fs::create_dir_all(dir)?;

        let storage = VectorStorage::new(collection_path(dir, name));

        let index = if storage.exists() {
            match storage.load(&model_id, dimensions) {
                Ok(idx) => {
                    log::info!("loaded {} vectors from collection '{name}'", idx.len());
                    idx
                }
                Err(VectorStorageError::ModelMismatch) => {
                    log::warn!("model changed, creating fresh collection '{name}'");
                    VectorIndex::new(dimensions)
                }
                Err(VectorStorageError::VersionMismatch(file_ver, _)) => {
                    log::warn!("storage version {file_ver} unsupported, creating fresh collection '{name}'");
                    VectorIndex::new(dimensions)
                }
                Err(e) => {
                    log::error!("failed to load collection '{name}': {e}");
                    return Err(e.into());
                }
            }
        } else {
            log::info!("no existing collection '{name}', starting fresh");
            VectorIndex::new(dimensions)
        };

        Ok(Self {
            name: name.to_string(),
            model_id,
            index,
            storage,
        })
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&VectorEntry> {
        self.index.get(id)
    }

    /// Nearest neighbours of `embedding`, nearest first, at most `n_results`.
    pub fn query(&self, embedding: &[f32], n_results: usize) -> Result<Vec<QueryHit>, CollectionError> {
        Ok(self.index.query(embedding, n_results)?)
    }
}

impl VectorStore for Collection {
    fn upsert(&mut self, batch: UpsertBatch) -> Result<(), CollectionError> {
        let UpsertBatch {
            ids,
            documents,
            embeddings,
            metadatas,
        } = batch;

        if ids.len() != documents.len()
            || ids.len() != embeddings.len()
            || ids.len() != metadatas.len()
        {
            return Err(CollectionError::LengthMismatch {
                ids: ids.len(),
                documents: documents.len(),
                embeddings: embeddings.len(),
                metadatas: metadatas.len(),
            });
        }

        for (((id, document), embedding), metadata) in ids
            .into_iter()
            .zip(documents)
            .zip(embeddings)
            .zip(metadatas)
        {
            self.index.upsert(
                id,
                VectorEntry {
                    document,
                    metadata,
                    embedding,
                },
            )?;
        }

        Ok(())
    }

    fn count(&self) -> usize {
        self.index.len()
    }

    fn persist(&self) -> Result<(), CollectionError> {
        self.storage.save(&self.index, &self.model_id)?;
        log::debug!(
            "persisted {} vectors of '{}' to {}",
            self.index.len(),
            self.name,
            self.storage.path().display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::MetadataValue;

    const MODEL: [u8; 32] = [7u8; 32];

    fn batch(items: &[(&str, &str, [f32; 2])]) -> UpsertBatch {
        let mut batch = UpsertBatch::default();
        for (id, doc, emb) in items {
            batch.ids.push(id.to_string());
            batch.documents.push(doc.to_string());
            batch.embeddings.push(emb.to_vec());
            let mut meta = Metadata::new();
            meta.insert("score".into(), MetadataValue::Int(1));
            batch.metadatas.push(meta);
        }
        batch
    }

    #[test]
    fn test_open_missing_collection() {
        let tmp = tempfile::tempdir().unwrap();
        let result = Collection::open(tmp.path(), "stackoverflow", MODEL, 2);
        assert!(matches!(result, Err(CollectionError::NotFound(_))));
    }

    #[test]
    fn test_persist_and_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("vector_db");

        let mut collection = Collection::open_or_create(&dir, "stackoverflow", MODEL, 2).unwrap();
        collection
            .upsert(batch(&[("1", "first", [1.0, 0.0]), ("2", "second", [0.0, 1.0])]))
            .unwrap();
        collection.persist().unwrap();

        let reopened = Collection::open(&dir, "stackoverflow", MODEL, 2).unwrap();
        assert_eq!(reopened.count(), 2);
        assert_eq!(reopened.get("2").unwrap().document, "second");

        let hits = reopened.query(&[1.0, 0.0], 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");
    }

    #[test]
    fn test_upsert_length_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let mut collection = Collection::open_or_create(tmp.path(), "c", MODEL, 2).unwrap();

        let mut bad = batch(&[("1", "first", [1.0, 0.0])]);
        bad.documents.push("extra".into());

        assert!(matches!(
            collection.upsert(bad),
            Err(CollectionError::LengthMismatch { .. })
        ));
        assert_eq!(collection.count(), 0);
    }

    #[test]
    fn test_model_change_starts_fresh() {
        let tmp = tempfile::tempdir().unwrap();

        let mut collection = Collection::open_or_create(tmp.path(), "c", MODEL, 2).unwrap();
        collection.upsert(batch(&[("1", "first", [1.0, 0.0])])).unwrap();
        collection.persist().unwrap();

        let other = Collection::open_or_create(tmp.path(), "c", [9u8; 32], 2).unwrap();
        assert_eq!(other.count(), 0);

        assert!(Collection::open(tmp.path(), "c", [9u8; 32], 2).is_err());
    }
}
