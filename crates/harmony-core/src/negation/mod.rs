//! Rule-based sentence negation.
//!
//! [`negate`] produces a best-effort negated counterpart of a questionnaire
//! item so the matrix builder can probe for opposite polarity. Rules are
//! deterministic and never fail: when no rule applies the input comes back
//! unchanged, which the builder treats as "no negative probe available".
//!
//! | Language | Module | Strategy |
//! |----------|--------|----------|
//! | `en` | [`english`] | contraction/aux removal, `not` insertion, do-support, antonyms |
//! | `pt`, `es`, `it` | [`romance`] | pre-verbal particle (`não`, `no`, `non`) |
//! | `fr` | [`romance`] | `ne … pas` bracketing with elision |
//! | `de` | [`german`] | `nicht` / `kein` |
//!
//! Any other language tag is a no-op.

pub mod english;
pub mod german;
pub mod romance;

/// Negate `text` according to the rules for `language`.
///
/// Language tags are matched on their primary subtag, case-insensitively
/// (`"en-GB"` → `"en"`). Whitespace in the output is normalised to single
/// spaces.
pub fn negate(text: &str, language: &str) -> String {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return text.to_string();
    }

    let negated = match primary_subtag(language).as_str() {
        "en" => english::negate_tokens(&tokens),
        "pt" => romance::negate_particle(&tokens, &romance::PORTUGUESE),
        "es" => romance::negate_particle(&tokens, &romance::SPANISH),
        "it" => romance::negate_particle(&tokens, &romance::ITALIAN),
        "fr" => romance::negate_french(&tokens),
        "de" => german::negate_tokens(&tokens),
        _ => None,
    };

    match negated {
        Some(out) => restore_case(&tokens, out),
        None => text.to_string(),
    }
}

/// True if [`negate`] has a rule set for `language`.
pub fn is_supported(language: &str) -> bool {
    matches!(
        primary_subtag(language).as_str(),
        "en" | "pt" | "es" | "it" | "fr" | "de"
    )
}

fn primary_subtag(language: &str) -> String {
    language
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// A whitespace-delimited word split into leading punctuation, the word
/// itself, and trailing punctuation.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub lead: String,
    pub core: String,
    pub trail: String,
}

impl Token {
    pub fn word(core: &str) -> Self {
        Self {
            lead: String::new(),
            core: core.to_string(),
            trail: String::new(),
        }
    }

    /// Lowercased core with typographic apostrophes folded to `'`.
    pub fn lower(&self) -> String {
        self.core.replace('\u{2019}', "'").to_lowercase()
    }

    /// Copy of this token with a different core, keeping punctuation.
    pub fn with_core(&self, core: &str) -> Self {
        Self {
            lead: self.lead.clone(),
            core: core.to_string(),
            trail: self.trail.clone(),
        }
    }

    fn render(&self) -> String {
        format!("{}{}{}", self.lead, self.core, self.trail)
    }
}

/// Split text into [`Token`]s on whitespace.
pub fn tokenize(text: &str) -> Vec<Token> {
    text.split_whitespace()
        .map(|raw| {
            let is_word = |c: char| c.is_alphanumeric() || c == '\'' || c == '\u{2019}';
            let start = raw.find(is_word).unwrap_or(raw.len());
            let end = raw
                .rfind(is_word)
                .map(|i| i + raw[i..].chars().next().map_or(1, char::len_utf8))
                .unwrap_or(start);
            let end = end.max(start);
            Token {
                lead: raw[..start].to_string(),
                core: raw[start..end].to_string(),
                trail: raw[end..].to_string(),
            }
        })
        .collect()
}

/// Join tokens back into a single-spaced string.
pub fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::render)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Re-apply the original sentence-initial capitalisation to `out`.
///
/// Rules that prefix a word are responsible for lowercasing the old first
/// word themselves.
fn restore_case(original: &[Token], mut out: Vec<Token>) -> String {
    let starts_upper = original
        .iter()
        .find_map(|t| t.core.chars().next())
        .is_some_and(char::is_uppercase);

    if starts_upper {
        if let Some(first) = out.iter_mut().find(|t| !t.core.is_empty()) {
            first.core = uppercase_first(&first.core);
        }
    }
    render(&out)
}

pub(crate) fn uppercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
