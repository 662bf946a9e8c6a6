use std::collections::HashSet;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarMatch {
    pub key: String,
    pub score: f32,
}

/// Intersection over union. Two empty sets score zero.
pub fn jaccard<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f32 {
    let inter = a.iter().filter(|item| b.contains(*item)).count();
    let union = a.len() + b.len() - inter;
    if union == 0 {
        0.0
    } else {
        inter as f32 / union as f32
    }
}

pub fn key_tokens(key: &str) -> HashSet<&str> {
    key.split(|c: char| c.is_whitespace() || c == '-' || c == '_' || c == '/')
        .filter(|part| !part.is_empty())
        .collect()
}

/// Highest scoring existing key; ties keep the earliest key. Returns `None`
/// when the best score is below `threshold`.
pub fn best_match<'a, I>(tokens: &[String], keys: I, threshold: f32) -> Option<SimilarMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    if tokens.is_empty() {
        return None;
    }
    let candidate: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    let mut best: Option<(&str, f32)> = None;
    for key in keys {
        let score = jaccard(&candidate, &key_tokens(key));
        if score > best.map(|(_, s)| s).unwrap_or(0.0) {
            best = Some((key, score));
        }
    }
    best.filter(|(_, score)| *score >= threshold)
        .map(|(key, score)| SimilarMatch {
            key: key.to_string(),
            score,
        })
}
