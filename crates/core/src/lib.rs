mod canonical;
mod embedding;
mod error;
pub mod normalization;
mod persist;
mod protocol;
pub mod rules;
mod semantic;
pub mod similarity;
mod store;

pub use canonical::{
    Canonicalizer, MatchingConfig, Resolution, DEFAULT_ORACLE_TIMEOUT_MS,
    DEFAULT_SEMANTIC_THRESHOLD, DEFAULT_SIMILARITY_THRESHOLD,
};
pub use embedding::{
    cosine_similarity, EmbeddingCache, EmbeddingOracle, PhraseHasher, PhraseHasherConfig,
};
pub use error::{PulseError, Result};
pub use normalization::{concept_phrase, normalize_tokens, tokens_from};
pub use persist::{
    load_json, load_state, save_json, save_state, PersistedMeta, PersistedRow, PersistedState,
};
pub use protocol::{
    Ack, EventKind, Hello, Prompt, Snapshot, SnapshotItem, SnapshotMeta, SyncReason,
    HELLO_EVENT, STATE_UPDATE_EVENT,
};
pub use rules::{classify, classify_rule, Rule};
pub use semantic::{SemanticMatcher, SemanticOutcome};
pub use similarity::{best_match, jaccard, SimilarMatch};
pub use store::{AggregateEntry, AggregateStore};
