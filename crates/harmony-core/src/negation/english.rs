//! English negation rules.
//!
//! Applied in order, first match wins:
//!
//! 1. Remove an existing negation (`don't`, `is not`, `cannot`, `never`, `no`).
//! 2. Negate the earliest of: an auxiliary verb (`am` → `am not`), or the
//!    verb after a subject pronoun via do-support (`I feel` → `I don't feel`).
//! 3. Swap the first word found in a small antonym table.

use super::Token;

const AUXILIARIES: &[&str] = &[
    "am", "is", "are", "was", "were", "can", "could", "will", "would", "should", "must", "may",
    "might", "do", "does", "did", "have", "has", "had",
];

const PRONOUNS_PLURAL: &[&str] = &["i", "you", "we", "they"];
const PRONOUNS_SINGULAR: &[&str] = &["he", "she", "it"];

const ADVERBS: &[&str] = &[
    "often", "usually", "sometimes", "always", "really", "still", "just", "also", "generally",
];

const IRREGULAR_PAST: &[(&str, &str)] = &[
    ("felt", "feel"),
    ("got", "get"),
    ("went", "go"),
    ("thought", "think"),
    ("slept", "sleep"),
    ("ate", "eat"),
    ("lost", "lose"),
    ("found", "find"),
    ("made", "make"),
    ("took", "take"),
    ("saw", "see"),
    ("became", "become"),
    ("kept", "keep"),
    ("left", "leave"),
    ("knew", "know"),
    ("began", "begin"),
    ("had", "have"),
];

/// Past participles that differ from the simple past.
const IRREGULAR_PARTICIPLES: &[&str] = &[
    "been", "done", "gone", "seen", "eaten", "taken", "known", "become", "begun", "come",
];

const ANTONYMS: &[(&str, &str)] = &[
    ("happy", "sad"),
    ("calm", "nervous"),
    ("relaxed", "tense"),
    ("good", "bad"),
    ("often", "rarely"),
    ("easy", "hard"),
    ("able", "unable"),
    ("hopeful", "hopeless"),
    ("interested", "uninterested"),
    ("confident", "insecure"),
];

/// Negate English tokens, or `None` if no rule applies.
pub fn negate_tokens(tokens: &[Token]) -> Option<Vec<Token>> {
    remove_negation(tokens)
        .or_else(|| insert_negation(tokens))
        .or_else(|| swap_antonym(tokens))
}

fn remove_negation(tokens: &[Token]) -> Option<Vec<Token>> {
    for (i, tok) in tokens.iter().enumerate() {
        let lower = tok.lower();
        let mut out = tokens.to_vec();
        match lower.as_str() {
            "don't" => {
                out.remove(i);
                return Some(out);
            }
            "doesn't" => {
                out.remove(i);
                inflect_third_person_at(&mut out, i);
                return Some(out);
            }
            "cannot" | "can't" => {
                out[i] = tok.with_core(&match_case(&tok.core, "can"));
                return Some(out);
            }
            "won't" => {
                out[i] = tok.with_core(&match_case(&tok.core, "will"));
                return Some(out);
            }
            "not" => {
                let prev = i.checked_sub(1).map(|p| tokens[p].lower());
                match prev.as_deref() {
                    Some("do") => {
                        out.drain(i - 1..=i);
                    }
                    Some("does") => {
                        out.drain(i - 1..=i);
                        inflect_third_person_at(&mut out, i - 1);
                    }
                    _ => {
                        // `not` owns no punctuation worth keeping except a trailing one.
                        if !tok.trail.is_empty() && i > 0 {
                            out[i - 1].trail.push_str(&tok.trail);
                        }
                        out.remove(i);
                    }
                }
                return Some(out);
            }
            "never" => {
                out[i] = tok.with_core(&match_case(&tok.core, "always"));
                return Some(out);
            }
            "nothing" => {
                out[i] = tok.with_core(&match_case(&tok.core, "something"));
                return Some(out);
            }
            "nobody" => {
                out[i] = tok.with_core(&match_case(&tok.core, "somebody"));
                return Some(out);
            }
            "no" if tok.trail.is_empty() && i + 1 < tokens.len() => {
                out[i] = tok.with_core(&match_case(&tok.core, "some"));
                return Some(out);
            }
            _ => {}
        }
        if let Some(stem) = lower.strip_suffix("n't") {
            // isn't, wasn't, couldn't, haven't, ...
            out[i] = tok.with_core(&match_case(&tok.core, stem));
            return Some(out);
        }
    }
    None
}

fn insert_negation(tokens: &[Token]) -> Option<Vec<Token>> {
    let aux = find_auxiliary(tokens);
    let subject = find_subject_verb(tokens);

    match (aux, subject) {
        (Some(a), Some((p, v))) if p < a && v != a => Some(do_support(tokens, p, v)),
        (Some(a), _) => Some(negate_auxiliary(tokens, a)),
        (None, Some((p, v))) => Some(do_support(tokens, p, v)),
        (None, None) => None,
    }
}

/// Index of the first auxiliary used as one.
///
/// `have`/`has`/`had` count only before a participle; otherwise they are the
/// main verb and take do-support.
fn find_auxiliary(tokens: &[Token]) -> Option<usize> {
    tokens.iter().enumerate().find_map(|(i, t)| {
        let lower = t.lower();
        if !AUXILIARIES.contains(&lower.as_str()) {
            return None;
        }
        if matches!(lower.as_str(), "have" | "has" | "had") {
            let next = tokens[i + 1..]
                .iter()
                .map(Token::lower)
                .find(|w| !ADVERBS.contains(&w.as_str()))
                .unwrap_or_default();
            if !is_participle(&next) {
                return None;
            }
        }
        Some(i)
    })
}

fn is_participle(word: &str) -> bool {
    word.ends_with("ed")
        || word.ends_with("en")
        || IRREGULAR_PARTICIPLES.contains(&word)
        || IRREGULAR_PAST.iter().any(|(past, _)| *past == word)
}

/// `(pronoun index, verb index)` for the first subject pronoun followed by a
/// non-auxiliary verb.
fn find_subject_verb(tokens: &[Token]) -> Option<(usize, usize)> {
    for (p, tok) in tokens.iter().enumerate() {
        let lower = tok.lower();
        if !PRONOUNS_PLURAL.contains(&lower.as_str())
            && !PRONOUNS_SINGULAR.contains(&lower.as_str())
        {
            continue;
        }
        // A pronoun closing a clause ("... for me,") is not a subject.
        if !tok.trail.is_empty() {
            continue;
        }
        let mut v = p + 1;
        while v < tokens.len() && ADVERBS.contains(&tokens[v].lower().as_str()) {
            v += 1;
        }
        let verb = tokens.get(v)?.lower();
        if AUXILIARIES.contains(&verb.as_str()) && !matches!(verb.as_str(), "have" | "has" | "had") {
            continue;
        }
        return Some((p, v));
    }
    None
}

fn negate_auxiliary(tokens: &[Token], a: usize) -> Vec<Token> {
    let tok = &tokens[a];
    let lower = tok.lower();
    let mut out = tokens.to_vec();

    if a == 0 && lower != "am" {
        // Question form: "Do you ..." -> "Don't you ..."
        let contracted = match lower.as_str() {
            "can" => "can't".to_string(),
            "will" => "won't".to_string(),
            "must" => "mustn't".to_string(),
            other => format!("{}n't", other),
        };
        out[a] = tok.with_core(&match_case(&tok.core, &contracted));
        return out;
    }

    match lower.as_str() {
        "can" => out[a] = tok.with_core(&match_case(&tok.core, "cannot")),
        "do" | "does" | "did" => {
            out[a] = tok.with_core(&match_case(&tok.core, &format!("{}n't", lower)));
        }
        _ => {
            let mut aux = tok.clone();
            let trail = std::mem::take(&mut aux.trail);
            let mut not = Token::word("not");
            not.trail = trail;
            out[a] = aux;
            out.insert(a + 1, not);
        }
    }
    out
}

fn do_support(tokens: &[Token], p: usize, v: usize) -> Vec<Token> {
    let pronoun = tokens[p].lower();
    let verb_tok = &tokens[v];
    let verb = verb_tok.lower();
    let mut out = tokens.to_vec();

    let (aux, base) = if let Some(base) = past_to_base(&verb) {
        ("didn't", base)
    } else if PRONOUNS_SINGULAR.contains(&pronoun.as_str()) {
        ("doesn't", third_person_to_base(&verb))
    } else {
        ("don't", verb.clone())
    };

    out[v] = verb_tok.with_core(&match_case(&verb_tok.core, &base));
    out.insert(p + 1, Token::word(aux));
    out
}

fn swap_antonym(tokens: &[Token]) -> Option<Vec<Token>> {
    for (i, tok) in tokens.iter().enumerate() {
        let lower = tok.lower();
        let swapped = ANTONYMS.iter().find_map(|(a, b)| {
            if lower == *a {
                Some(*b)
            } else if lower == *b {
                Some(*a)
            } else {
                None
            }
        });
        if let Some(word) = swapped {
            let mut out = tokens.to_vec();
            out[i] = tok.with_core(&match_case(&tok.core, word));
            return Some(out);
        }
    }
    None
}

fn inflect_third_person_at(tokens: &mut [Token], mut i: usize) {
    while i < tokens.len() && ADVERBS.contains(&tokens[i].lower().as_str()) {
        i += 1;
    }
    if let Some(tok) = tokens.get_mut(i) {
        let inflected = base_to_third_person(&tok.lower());
        tok.core = match_case(&tok.core, &inflected);
    }
}

fn base_to_third_person(verb: &str) -> String {
    match verb {
        "have" => "has".to_string(),
        "be" => "is".to_string(),
        "do" => "does".to_string(),
        "go" => "goes".to_string(),
        _ => {
            if let Some(stem) = verb.strip_suffix('y') {
                if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
                    return format!("{}ies", stem);
                }
            }
            if ["s", "sh", "ch", "x", "z"].iter().any(|s| verb.ends_with(s)) {
                format!("{}es", verb)
            } else {
                format!("{}s", verb)
            }
        }
    }
}

fn third_person_to_base(verb: &str) -> String {
    match verb {
        "has" => "have".to_string(),
        "does" => "do".to_string(),
        "goes" => "go".to_string(),
        "is" => "be".to_string(),
        _ => {
            if let Some(stem) = verb.strip_suffix("ies") {
                return format!("{}y", stem);
            }
            for suffix in ["shes", "ches", "sses", "xes", "zes"] {
                if verb.ends_with(suffix) {
                    return verb[..verb.len() - 2].to_string();
                }
            }
            match verb.strip_suffix('s') {
                Some(stem) if !verb.ends_with("ss") && !stem.is_empty() => stem.to_string(),
                _ => verb.to_string(),
            }
        }
    }
}

fn past_to_base(verb: &str) -> Option<String> {
    if let Some((_, base)) = IRREGULAR_PAST.iter().find(|(past, _)| *past == verb) {
        return Some(base.to_string());
    }
    if verb.len() <= 3 {
        return None;
    }
    if let Some(stem) = verb.strip_suffix("ied") {
        return Some(format!("{}y", stem));
    }
    let stem = verb.strip_suffix("ed")?;
    // stopped -> stop
    let mut rev = stem.chars().rev();
    if let (Some(last), Some(prev)) = (rev.next(), rev.next()) {
        if last == prev && last.is_ascii_alphabetic() && !matches!(last, 'l' | 's' | 'f' | 'z') {
            return Some(stem[..stem.len() - last.len_utf8()].to_string());
        }
    }
    Some(stem.to_string())
}

/// Give `replacement` the capitalisation style of `original`.
fn match_case(original: &str, replacement: &str) -> String {
    if original.chars().next().is_some_and(char::is_uppercase) {
        super::uppercase_first(replacement)
    } else {
        replacement.to_string()
    }
}
