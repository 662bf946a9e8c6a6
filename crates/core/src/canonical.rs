use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingOracle;
use crate::normalization::{concept_phrase, tokens_from};
use crate::rules::classify_rule;
use crate::semantic::{SemanticMatcher, SemanticOutcome};
use crate::similarity::best_match;

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.60;
pub const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.76;
pub const DEFAULT_ORACLE_TIMEOUT_MS: u64 = 900;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub similarity_threshold: f32,
    pub semantic_threshold: f32,
    pub oracle_timeout_ms: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
            oracle_timeout_ms: DEFAULT_ORACLE_TIMEOUT_MS,
        }
    }
}

/// How a submission reached its canonical key.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Rule { rule: &'static str, key: &'static str },
    Similar { key: String, score: f32 },
    Semantic { key: String, score: f32 },
    Literal { key: String },
}

impl Resolution {
    pub fn key(&self) -> &str {
        match self {
            Resolution::Rule { key, .. } => *key,
            Resolution::Similar { key, .. }
            | Resolution::Semantic { key, .. }
            | Resolution::Literal { key } => key.as_str(),
        }
    }

    pub fn into_key(self) -> String {
        match self {
            Resolution::Rule { key, .. } => key.to_string(),
            Resolution::Similar { key, .. }
            | Resolution::Semantic { key, .. }
            | Resolution::Literal { key } => key,
        }
    }
}

pub struct Canonicalizer {
    config: MatchingConfig,
    semantic: Option<SemanticMatcher>,
}

impl Canonicalizer {
    pub fn new(config: MatchingConfig) -> Self {
        Self {
            config,
            semantic: None,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn EmbeddingOracle>) -> Self {
        self.semantic = Some(SemanticMatcher::new(
            oracle,
            self.config.semantic_threshold,
            Duration::from_millis(self.config.oracle_timeout_ms),
        ));
        self
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn semantic_enabled(&self) -> bool {
        self.semantic.is_some()
    }

    /// Resolves raw text against the keys already present in its namespace.
    /// `None` means the text normalized to nothing.
    pub async fn canonicalize(&self, raw: &str, existing: &[String]) -> Option<Resolution> {
        let tokens = tokens_from(raw);
        if tokens.is_empty() {
            return None;
        }
        if let Some(rule) = classify_rule(&tokens) {
            return Some(Resolution::Rule {
                rule: rule.name,
                key: rule.key,
            });
        }
        let concept = concept_phrase(&tokens);
        if let Some(hit) = best_match(
            &tokens,
            existing.iter().map(String::as_str),
            self.config.similarity_threshold,
        ) {
            return Some(Resolution::Similar {
                key: hit.key,
                score: hit.score,
            });
        }
        let Some(semantic) = &self.semantic else {
            return Some(Resolution::Literal { key: concept });
        };
        let (key, outcome) = semantic.resolve(&concept).await;
        Some(match outcome {
            SemanticOutcome::Reused { score, .. } => Resolution::Semantic { key, score },
            _ => Resolution::Literal { key },
        })
    }

    pub fn clear_cache(&self) {
        if let Some(semantic) = &self.semantic {
            semantic.clear();
        }
    }

    pub fn cached_embeddings(&self) -> usize {
        self.semantic.as_ref().map(|s| s.cached_len()).unwrap_or(0)
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(MatchingConfig::default())
    }
}
