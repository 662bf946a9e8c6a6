use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Tokens at or below this many characters are never singularized.
pub const MIN_SINGULARIZE_LEN: usize = 4;

const MAX_PASSES: usize = 16;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // articles, prepositions, pronouns
        "de", "la", "el", "los", "las", "un", "una", "y", "e", "o", "u", "a", "en", "para",
        "por", "con", "del", "al", "que", "me", "mi", "mis", "tu", "tus", "su", "sus", "lo",
        "le", "les", "se", "nos",
        // action verbs: keep the concept, drop the chore
        "hacer", "realizar", "tener", "gestionar", "llevar", "responder", "contestar",
        "redactar", "escribir", "enviar", "leer", "revisar", "preparar", "crear", "rellenar",
        "completar", "tramitar", "procesar", "organizar", "coordinar", "planificar", "agendar",
        "programar", "buscar", "actualizar", "solucionar", "resolver", "atender", "seguir",
        "seguimiento", "pasar", "sacar", "generar", "montar", "armar", "validar", "definir",
        // english
        "the", "an", "of", "to", "for", "and", "or", "in", "on", "at", "with", "my", "our",
        "your", "their", "do", "doing", "make", "making", "write", "writing", "send",
        "sending", "answer", "answering", "reply", "replying", "read", "reading", "review",
        "reviewing", "prepare", "preparing", "handle", "handling", "manage", "managing",
        "update", "updating",
    ]
    .into_iter()
    .collect()
});

struct Synonym {
    pattern: Regex,
    canonical: &'static str,
}

static SYNONYMS: Lazy<Vec<Synonym>> = Lazy::new(|| {
    [
        (r"\b(?:e ?mails?|mails?|mailes|correos?|outlook|inbox)\b", "correo"),
        (r"\b(?:reuniones|reunion|meetings?)\b", "reunion"),
        (r"\b(?:informes?|reportes?|reports?)\b", "informe"),
        (r"\b(?:actas?|minutas?|minutes)\b", "acta"),
        (
            r"\b(?:propuestas?|ofertas?|presupuestos?|cotizacion(?:es)?|proposals?|quotes?|budgets?)\b",
            "propuesta",
        ),
        (r"\b(?:requisitos?|requirements?)\b", "requisito"),
        (r"\b(?:tecnic[oa]s?|technical)\b", "tecnico"),
        (r"\b(?:resumen(?:es)?|resumir|summary|summaries|summarize)\b", "resumen"),
        (r"\b(?:ventas?|sales)\b", "venta"),
        (r"\b(?:comercial(?:es)?|commercial)\b", "comercial"),
    ]
    .into_iter()
    .map(|(pattern, canonical)| Synonym {
        pattern: Regex::new(pattern).expect("valid synonym pattern"),
        canonical,
    })
    .collect()
});

/// Trim, lowercase, strip diacritics, turn every non-alphanumeric run into a
/// single space.
pub fn clean_text(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let mut result = String::with_capacity(lowered.len());
    let mut prev_space = true;
    for ch in lowered.nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            result.push(ch);
            prev_space = false;
        } else if !prev_space {
            result.push(' ');
            prev_space = true;
        }
    }
    result.trim_end().to_string()
}

pub fn apply_synonyms(text: &str) -> String {
    let mut current = text.to_string();
    for synonym in SYNONYMS.iter() {
        if synonym.pattern.is_match(&current) {
            current = synonym
                .pattern
                .replace_all(&current, synonym.canonical)
                .into_owned();
        }
    }
    current
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

pub fn singularize(token: &str) -> &str {
    if token.chars().count() <= MIN_SINGULARIZE_LEN || token.ends_with("ss") {
        return token;
    }
    token
        .strip_suffix("es")
        .or_else(|| token.strip_suffix('s'))
        .unwrap_or(token)
}

fn normalize_pass(input: &str) -> Vec<String> {
    let cleaned = clean_text(input);
    if cleaned.is_empty() {
        return Vec::new();
    }
    let substituted = apply_synonyms(&cleaned);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for token in substituted.split_whitespace() {
        if is_stopword(token) {
            continue;
        }
        let token = singularize(token);
        if token.is_empty() || is_stopword(token) {
            continue;
        }
        if seen.insert(token) {
            out.push(token.to_string());
        }
    }
    out
}

/// Raw text to the ordered, de-duplicated concept tokens. The pass is rerun
/// until it reaches a fixed point, so feeding the output back in is a no-op.
pub fn tokens_from(input: &str) -> Vec<String> {
    let mut tokens = normalize_pass(input);
    for _ in 0..MAX_PASSES {
        let next = normalize_pass(&tokens.join(" "));
        if next == tokens {
            break;
        }
        tokens = next;
    }
    tokens
}

pub fn normalize_tokens(tokens: &[String]) -> Vec<String> {
    tokens_from(&tokens.join(" "))
}

pub fn concept_phrase(tokens: &[String]) -> String {
    tokens.join(" ")
}
