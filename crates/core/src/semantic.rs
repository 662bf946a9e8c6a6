use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::embedding::{EmbeddingCache, EmbeddingOracle};
use crate::error::{PulseError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum SemanticOutcome {
    /// An existing embedded key was close enough.
    Reused { key: String, score: f32 },
    /// The concept was embedded and cached as a new key.
    Cached,
    /// Already embedded earlier; returned unchanged.
    Known,
    /// Oracle failed or timed out; nothing cached.
    Fallback,
}

pub struct SemanticMatcher {
    oracle: Arc<dyn EmbeddingOracle>,
    threshold: f32,
    timeout: Duration,
    cache: Mutex<EmbeddingCache>,
}

impl SemanticMatcher {
    pub fn new(oracle: Arc<dyn EmbeddingOracle>, threshold: f32, timeout: Duration) -> Self {
        Self {
            oracle,
            threshold,
            timeout,
            cache: Mutex::new(EmbeddingCache::default()),
        }
    }

    /// Maps `concept` onto a previously embedded key or registers it. Never
    /// fails: any oracle problem degrades to the literal concept.
    pub async fn resolve(&self, concept: &str) -> (String, SemanticOutcome) {
        if self.cache.lock().contains(concept) {
            return (concept.to_string(), SemanticOutcome::Known);
        }
        let vector = match self.embed_bounded(concept).await {
            Ok(vector) => vector,
            Err(err) => {
                warn!(oracle = self.oracle.name(), concept, error = %err, "embedding fallback");
                return (concept.to_string(), SemanticOutcome::Fallback);
            }
        };
        let mut cache = self.cache.lock();
        if let Some((key, score)) = cache.best_match(&vector) {
            if score >= self.threshold {
                debug!(concept, key, score, "semantic reuse");
                let key = key.to_string();
                return (key.clone(), SemanticOutcome::Reused { key, score });
            }
        }
        cache.insert(concept, vector);
        (concept.to_string(), SemanticOutcome::Cached)
    }

    async fn embed_bounded(&self, text: &str) -> Result<Vec<f32>> {
        match tokio::time::timeout(self.timeout, self.oracle.embed(text)).await {
            Ok(Ok(vector)) if !vector.is_empty() => Ok(vector),
            Ok(Ok(_)) => Err(PulseError::Oracle("empty embedding".to_string())),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(PulseError::OracleTimeout(self.timeout.as_millis() as u64)),
        }
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }
}
