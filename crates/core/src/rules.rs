use std::collections::HashSet;

type TokenSet<'a> = HashSet<&'a str>;

/// A hand-authored concept family. Rules are evaluated in declaration order
/// and the first match wins.
pub struct Rule {
    pub name: &'static str,
    pub key: &'static str,
    matches: fn(&TokenSet) -> bool,
}

impl Rule {
    pub fn matches(&self, tokens: &[String]) -> bool {
        (self.matches)(&token_set(tokens))
    }
}

static RULES: [Rule; 5] = [
    Rule {
        name: "email",
        key: "correo",
        matches: email_family,
    },
    Rule {
        name: "meeting-minutes",
        key: "acta reunion",
        matches: meeting_minutes,
    },
    Rule {
        name: "commercial-proposal",
        key: "propuesta comercial",
        matches: commercial_proposal,
    },
    Rule {
        name: "technical-requirements",
        key: "requisitos tecnicos",
        matches: technical_requirements,
    },
    Rule {
        name: "report",
        key: "informe",
        matches: generic_report,
    },
];

pub fn rules() -> &'static [Rule] {
    &RULES
}

pub fn classify_rule(tokens: &[String]) -> Option<&'static Rule> {
    if tokens.is_empty() {
        return None;
    }
    let set = token_set(tokens);
    RULES.iter().find(|rule| (rule.matches)(&set))
}

pub fn classify(tokens: &[String]) -> Option<&'static str> {
    classify_rule(tokens).map(|rule| rule.key)
}

fn token_set(tokens: &[String]) -> TokenSet<'_> {
    tokens.iter().map(String::as_str).collect()
}

fn email_family(set: &TokenSet<'_>) -> bool {
    set.contains("correo")
}

fn meeting_minutes(set: &TokenSet<'_>) -> bool {
    set.contains("reunion")
        && (set.contains("acta") || set.contains("resumen") || set.contains("informe"))
}

fn commercial_proposal(set: &TokenSet<'_>) -> bool {
    (set.contains("comercial") || set.contains("venta"))
        && (set.contains("propuesta") || set.contains("informe"))
}

fn technical_requirements(set: &TokenSet<'_>) -> bool {
    set.contains("requisito") && set.contains("tecnico")
}

fn generic_report(set: &TokenSet<'_>) -> bool {
    set.contains("informe")
}
