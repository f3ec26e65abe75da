//! Query tokenization and token-merging replacements.
//!
//! Only the small slice of text processing the matcher depends on lives here:
//! splitting, lowercasing, per-token replacement rules that may expand one
//! token into several, and the owner mapping that records which original
//! token each replaced token came from.

use crate::config::ReplacementRule;
use crate::error::{GeocodeError, Result};
use regex::Regex;

/// Upper bound on query tokens before replacement.
pub const MAX_QUERY_TOKENS: usize = 20;

/// Token positions a `u32` mask can address. Replacements can expand one
/// token into several; replaced tokens past this bound are dropped.
pub const MAX_TOKEN_POSITIONS: usize = 32;

/// Split `text` into lowercase tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    regex!(r#"[^\s,;:!?"()\[\]{}/\\]+"#)
        .find_iter(text)
        .map(|m| m.as_str().trim_matches('.').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// True when the token is made only of ASCII digits.
pub fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Numeric-class form of a purely numeric token: `9` → `#`, `100` → `1##`.
///
/// Returns `None` for anything that is not purely numeric.
pub fn numeric_class(token: &str) -> Option<String> {
    if !is_numeric(token) {
        return None;
    }
    if token.len() == 1 {
        return Some("#".to_string());
    }
    let mut class = String::with_capacity(token.len());
    class.push_str(&token[..1]);
    class.extend(std::iter::repeat_n('#', token.len() - 1));
    Some(class)
}

/// A query after replacements.
///
/// `tokens[i]` replaced `original[owner[i]]`. `owner` is non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedQuery {
    pub tokens: Vec<String>,
    pub owner: Vec<usize>,
    pub original: Vec<String>,
}

impl TokenizedQuery {
    /// A query with no replacements applied (identity owner mapping).
    pub fn identity(tokens: Vec<String>) -> Self {
        Replacer::default().apply(tokens)
    }

    /// Number of original tokens; the denominator of phrase weights.
    pub fn token_count(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    from: Regex,
    to: String,
}

/// Compiled replacement rules of one source.
#[derive(Debug, Clone, Default)]
pub struct Replacer {
    rules: Vec<CompiledRule>,
}

impl Replacer {
    pub fn new(rules: &[ReplacementRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                let anchored = format!("^(?:{})$", rule.from);
                Regex::new(&anchored)
                    .map(|from| CompiledRule { from, to: rule.to.clone() })
                    .map_err(|error| GeocodeError::InvalidReplacement { pattern: rule.from.clone(), error })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply the first matching rule to every token and record ownership.
    ///
    /// Both replaced positions and their owners stay below
    /// [`MAX_TOKEN_POSITIONS`].
    pub fn apply(&self, original: Vec<String>) -> TokenizedQuery {
        let mut tokens = Vec::with_capacity(original.len());
        let mut owner = Vec::with_capacity(original.len());

        for (idx, token) in original.iter().enumerate() {
            match self.rules.iter().find(|rule| rule.from.is_match(token)) {
                Some(rule) => {
                    let replaced = rule.from.replace(token, rule.to.as_str());
                    for piece in replaced.split_whitespace() {
                        tokens.push(piece.to_string());
                        owner.push(idx);
                    }
                }
                None => {
                    tokens.push(token.clone());
                    owner.push(idx);
                }
            }
        }

        let keep = owner.iter().take(MAX_TOKEN_POSITIONS).take_while(|&&o| o < MAX_TOKEN_POSITIONS).count();
        if keep < tokens.len() {
            tracing::warn!(tokens = tokens.len(), kept = keep, "replaced tokens truncated");
            tokens.truncate(keep);
            owner.truncate(keep);
        }

        TokenizedQuery { tokens, owner, original }
    }

    /// Tokenize and replace `text` into the phrase it is indexed under.
    pub fn phrase(&self, text: &str) -> Vec<String> {
        self.apply(tokenize(text)).tokens
    }
}
