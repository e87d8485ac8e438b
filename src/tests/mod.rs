use std::net::SocketAddr;

use crate::semantic::{Embedder, EmbeddingError};


/// Deterministic bag-of-words embedder: each lowercase token bumps one hashed bucket.
///
/// Texts sharing words end up close; texts with no words in common are orthogonal
/// apart from a small constant bias component that keeps every vector non-zero.
pub struct HashEmbedder {
    pub dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimensions: 64 }
    }
}

impl HashEmbedder {
    fn bucket(&self, token: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % (self.dimensions as u64 - 1)) as usize
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            v[self.bucket(&token.to_lowercase())] += 1.0;
        }
        v[self.dimensions - 1] = 0.01;
        v
    }
}

impl Embedder for HashEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hash-bag-of-words"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Embedder that always fails, for error-path tests.
pub struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::EmbeddingFailed("model unavailable".to_string()))
    }

    fn model_name(&self) -> &str {
        "broken"
    }

    fn dimensions(&self) -> usize {
        8
    }
}

/// Serves `router` on an ephemeral local port from a background thread.
///
/// Callers use blocking reqwest against the returned address, so the test thread
/// itself must not be inside a tokio runtime.
pub fn spawn_mock(router: axum::Router) -> SocketAddr {
    let (tx, rx) = std::sync::mpsc::channel();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build mock runtime");

        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind mock server");
            tx.send(listener.local_addr().expect("mock addr"))
                .expect("test went away");
            axum::serve(listener, router).await.expect("mock server failed");
        });
    });

    rx.recv().expect("mock server did not start")
}

/// A small question dataset in the line-delimited format ingestion reads.
pub const SAMPLE_DATASET: &str = r#"{"id": 1, "title": "How to fix segmentation fault in C", "tags": "c|pointers|segmentation-fault", "score": 42, "answer_count": 3, "view_count": 1200, "creation_date": "2012-03-04T10:20:30Z", "accepted_answer_id": 101}
{"id": 2, "title": "How to center a div in CSS", "tags": "css|html", "score": 17, "answer_count": 5}
{"id": 3, "title": "Python list comprehension with condition", "tags": "python|list", "score": 8}
{"title": "Record without an id"}
{"id": 5, "title": "Why does my C program give a segmentation fault on free", "tags": "c|memory", "score": 4, "owner_display_name": null}
"#;

#[test]
fn test_hash_embedder_is_deterministic() {
    let embedder = HashEmbedder::default();
    assert_eq!(embedder.embed("same text").unwrap(), embedder.embed("same text").unwrap());
    assert_eq!(embedder.embed("").unwrap().len(), 64);
}
