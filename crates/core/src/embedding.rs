use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::Result;

/// Source of concept vectors. Implementations may be slow or unavailable;
/// callers bound every call with a timeout.
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn name(&self) -> &str {
        "oracle"
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PhraseHasherConfig {
    pub dimensions: usize,
    pub seed: u64,
    /// Weight of each adjacent word pair relative to a single word.
    pub pair_weight: f32,
}

impl Default for PhraseHasherConfig {
    fn default() -> Self {
        Self {
            dimensions: 64,
            seed: 1337,
            pair_weight: 0.5,
        }
    }
}

/// Local oracle for concept phrases: words and adjacent word pairs are
/// hashed into signed buckets. Phrases sharing words land close together,
/// word order nudges them apart. Used when no model is configured.
#[derive(Debug, Clone)]
pub struct PhraseHasher {
    config: PhraseHasherConfig,
}

impl PhraseHasher {
    pub fn new(config: PhraseHasherConfig) -> Self {
        Self { config }
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions.max(1)
    }

    pub fn vector_for(&self, phrase: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions()];
        let words: Vec<String> = phrase.split_whitespace().map(str::to_lowercase).collect();
        for word in &words {
            self.add_feature(&mut vector, &[word], 1.0);
        }
        for pair in words.windows(2) {
            self.add_feature(&mut vector, &[&pair[0], &pair[1]], self.config.pair_weight);
        }
        scale_to_unit(&mut vector);
        vector
    }

    fn add_feature(&self, vector: &mut [f32], parts: &[&String], weight: f32) {
        let mut hasher = DefaultHasher::new();
        hasher.write_u64(self.config.seed);
        parts.hash(&mut hasher);
        let hashed = hasher.finish();
        let bucket = (hashed % vector.len() as u64) as usize;
        // top bit picks the sign so colliding features tend to cancel
        let sign = if hashed >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for PhraseHasher {
    fn default() -> Self {
        Self::new(PhraseHasherConfig::default())
    }
}

#[async_trait]
impl EmbeddingOracle for PhraseHasher {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    fn name(&self) -> &str {
        "phrase-hash"
    }
}

/// Canonical key -> vector, in insertion order. Never authoritative for counts.
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    vectors: IndexMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn contains(&self, key: &str) -> bool {
        self.vectors.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, vector: Vec<f32>) {
        self.vectors.insert(key.into(), vector);
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn clear(&mut self) {
        self.vectors.clear();
    }

    /// Most similar cached key by cosine; vectors of a different length are skipped.
    pub fn best_match(&self, vector: &[f32]) -> Option<(&str, f32)> {
        let mut best: Option<(&str, f32)> = None;
        for (key, cached) in &self.vectors {
            if cached.len() != vector.len() {
                continue;
            }
            let score = cosine_similarity(vector, cached);
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((key.as_str(), score));
            }
        }
        best
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut a_norm = 0.0f32;
    let mut b_norm = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}

fn scale_to_unit(vector: &mut [f32]) {
    let length = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if length > 0.0 {
        vector.iter_mut().for_each(|value| *value /= length);
    }
}
