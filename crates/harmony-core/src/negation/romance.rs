//! Negation for Portuguese, Spanish, Italian, and French.
//!
//! Portuguese, Spanish and Italian negate with a single pre-verbal particle.
//! French brackets the verb with `ne … pas`.

use super::{lowercase_first, Token};

/// Particle and subject pronouns for a pre-verbal-particle language.
pub struct ParticleRules {
    pub particle: &'static str,
    pub pronouns: &'static [&'static str],
}

pub const PORTUGUESE: ParticleRules = ParticleRules {
    particle: "não",
    pronouns: &[
        "eu", "tu", "ele", "ela", "nós", "vós", "você", "vocês", "eles", "elas",
    ],
};

pub const SPANISH: ParticleRules = ParticleRules {
    particle: "no",
    pronouns: &[
        "yo", "tú", "tu", "él", "ella", "usted", "nosotros", "nosotras", "vosotros", "vosotras",
        "ustedes", "ellos", "ellas",
    ],
};

pub const ITALIAN: ParticleRules = ParticleRules {
    particle: "non",
    pronouns: &["io", "tu", "lui", "lei", "noi", "voi", "loro"],
};

/// Remove the particle if present; else insert it after the first subject
/// pronoun; else prefix the sentence with it.
pub fn negate_particle(tokens: &[Token], rules: &ParticleRules) -> Option<Vec<Token>> {
    let mut out = tokens.to_vec();

    if let Some(i) = tokens.iter().position(|t| t.lower() == rules.particle) {
        out.remove(i);
        return Some(out);
    }

    if let Some(p) = tokens
        .iter()
        .position(|t| t.trail.is_empty() && rules.pronouns.contains(&t.lower().as_str()))
    {
        if p + 1 < tokens.len() {
            out.insert(p + 1, Token::word(rules.particle));
            return Some(out);
        }
    }

    if let Some(first) = out.first_mut() {
        first.core = lowercase_first(&first.core);
    }
    out.insert(0, Token::word(rules.particle));
    Some(out)
}

const FRENCH_PRONOUNS: &[&str] = &["je", "tu", "il", "elle", "on", "nous", "vous", "ils", "elles"];
const FRENCH_REFLEXIVE: &[&str] = &["me", "te", "se", "nous", "vous"];

/// French `ne … pas` negation.
///
/// Removes `ne`/`n'` and `pas` when present. Otherwise finds a subject
/// pronoun, skips one reflexive pronoun, and brackets the verb.
pub fn negate_french(tokens: &[Token]) -> Option<Vec<Token>> {
    if let Some(out) = remove_french(tokens) {
        return Some(out);
    }

    // Split elided subjects: "J'ai" -> "Je" + "ai".
    let mut expanded: Vec<Token> = Vec::with_capacity(tokens.len() + 1);
    for tok in tokens {
        let lower = tok.lower();
        if let Some(rest) = lower.strip_prefix("j'") {
            if !rest.is_empty() {
                let prefix = if tok.core.starts_with('J') { "Je" } else { "je" };
                let mut subject = Token::word(prefix);
                subject.lead = tok.lead.clone();
                expanded.push(subject);
                let mut verb = tok.with_core(skip_chars(&tok.core, 2));
                verb.lead.clear();
                expanded.push(verb);
                continue;
            }
        }
        expanded.push(tok.clone());
    }

    let p = expanded
        .iter()
        .position(|t| t.trail.is_empty() && FRENCH_PRONOUNS.contains(&t.lower().as_str()))?;
    let mut v = p + 1;
    if v < expanded.len() && FRENCH_REFLEXIVE.contains(&expanded[v].lower().as_str()) && v + 1 < expanded.len() {
        v += 1;
    }
    if v >= expanded.len() {
        return None;
    }

    let starts_with_vowel = |t: &Token| {
        t.lower()
            .chars()
            .next()
            .is_some_and(|c| "aeiouéèêâîôûh".contains(c))
    };

    let mut out = expanded.clone();
    // `pas` goes after the verb, taking over its trailing punctuation.
    let mut verb = out[v].clone();
    let mut pas = Token::word("pas");
    pas.trail = std::mem::take(&mut verb.trail);
    out[v] = verb;
    out.insert(v + 1, pas);

    let first_after_subject = &expanded[p + 1];
    if starts_with_vowel(first_after_subject) {
        let merged = format!("n'{}", first_after_subject.core);
        out[p + 1] = out[p + 1].with_core(&merged);
    } else {
        out.insert(p + 1, Token::word("ne"));
    }
    Some(out)
}

fn remove_french(tokens: &[Token]) -> Option<Vec<Token>> {
    let pas = tokens.iter().position(|t| t.lower() == "pas")?;
    let mut out = tokens.to_vec();

    let pas_trail = out[pas].trail.clone();
    out.remove(pas);
    if pas > 0 && !pas_trail.is_empty() {
        out[pas - 1].trail.push_str(&pas_trail);
    }

    if let Some(ne) = out.iter().position(|t| t.lower() == "ne") {
        out.remove(ne);
    } else if let Some(i) = out.iter().position(|t| t.lower().starts_with("n'")) {
        let stripped = skip_chars(&out[i].core, 2).to_string();
        out[i] = out[i].with_core(&stripped);
        // "Je n'ai" -> "J'ai"
        if i > 0 && out[i - 1].lower() == "je" && !out[i - 1].core.is_empty() {
            let j = if out[i - 1].core.starts_with('J') { "J'" } else { "j'" };
            let merged = format!("{}{}", j, out[i].core);
            out[i - 1] = out[i - 1].with_core(&merged);
            out.remove(i);
        }
    }
    Some(out)
}

/// `s` without its first `n` characters.
fn skip_chars(s: &str, n: usize) -> &str {
    s.char_indices().nth(n).map_or("", |(i, _)| &s[i..])
}
