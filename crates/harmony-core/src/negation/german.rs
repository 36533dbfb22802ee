//! German negation: `nicht` after the finite verb, `kein` ↔ `ein`.

use super::Token;

const PRONOUNS: &[&str] = &["ich", "du", "er", "sie", "es", "wir", "ihr", "man"];
const REFLEXIVE: &[&str] = &["mich", "dich", "sich", "uns", "euch", "mir", "dir"];

/// Negate German tokens, or `None` if no rule applies.
pub fn negate_tokens(tokens: &[Token]) -> Option<Vec<Token>> {
    let mut out = tokens.to_vec();

    if let Some(i) = tokens.iter().position(|t| t.lower() == "nicht") {
        let trail = out[i].trail.clone();
        out.remove(i);
        if i > 0 && !trail.is_empty() {
            out[i - 1].trail.push_str(&trail);
        }
        return Some(out);
    }

    if let Some(i) = tokens.iter().position(|t| t.lower().starts_with("kein")) {
        // keine -> eine, Keinen -> Einen
        let rest: String = tokens[i].core.chars().skip(1).collect();
        let replaced = if tokens[i].core.starts_with('K') {
            super::uppercase_first(&rest)
        } else {
            rest
        };
        out[i] = tokens[i].with_core(&replaced);
        return Some(out);
    }

    let p = tokens
        .iter()
        .position(|t| t.trail.is_empty() && PRONOUNS.contains(&t.lower().as_str()))?;
    let verb = p + 1;
    if verb >= tokens.len() {
        return None;
    }

    let mut insert_at = verb + 1;
    while insert_at < tokens.len() && REFLEXIVE.contains(&tokens[insert_at].lower().as_str()) {
        insert_at += 1;
    }
    // Keep sentence-final punctuation on the last word.
    let mut nicht = Token::word("nicht");
    if insert_at == tokens.len() {
        nicht.trail = std::mem::take(&mut out[insert_at - 1].trail);
    }
    out.insert(insert_at, nicht);
    Some(out)
}
