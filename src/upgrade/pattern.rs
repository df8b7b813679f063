use glob::{Pattern, PatternError};
use serde::Deserialize;
use std::fmt;
use tracing::warn;

/// A shell-style wildcard (`*`, `?`, `[...]`, `[!...]`) matched against a
/// whole field value.
///
/// Matching is case-sensitive and `*` also crosses `/`, so field values are
/// treated as plain text rather than paths.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct FieldPattern {
    raw: String,
    compiled: Pattern,
}

impl FieldPattern {
    /// Compile `raw`. Runs of `*` are collapsed first; the glob compiler
    /// reserves `**` for recursive path matching.
    ///
    /// Text the compiler still rejects (typically an unclosed `[`) is retried
    /// with each unclosed `[` taken literally, which is how `fnmatch` reads
    /// it. Well-formed classes keep their meaning.
    pub fn new(raw: &str) -> Result<Self, PatternError> {
        let normalized = collapse_stars(raw);
        let compiled = match Pattern::new(&normalized) {
            Ok(p) => p,
            Err(err) => {
                warn!(
                    pattern = raw,
                    error = %err,
                    "invalid wildcard, matching unclosed `[` literally"
                );
                Pattern::new(&escape_unclosed_brackets(&normalized))
                    .or_else(|_| Pattern::new(&Pattern::escape(raw)))?
            }
        };
        Ok(Self {
            raw: raw.to_string(),
            compiled,
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        self.compiled.matches(value)
    }

    /// The pattern text as it was written in the upgrade list.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for FieldPattern {
    type Error = PatternError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        FieldPattern::new(&raw)
    }
}

impl fmt::Display for FieldPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn collapse_stars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_star = false;
    for c in raw.chars() {
        if c == '*' && prev_star {
            continue;
        }
        prev_star = c == '*';
        out.push(c);
    }
    out
}

/// Rewrite every `[` that does not open a complete class as `[[]`.
///
/// A class is `[` then an optional `!`, at least one member (a leading `]` is
/// a member), then the closing `]`.
fn escape_unclosed_brackets(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '[' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let first_member = if chars.get(i + 1) == Some(&'!') { i + 2 } else { i + 1 };
        let close = chars
            .get(first_member + 1..)
            .and_then(|rest| rest.iter().position(|&c| c == ']'))
            .map(|j| first_member + 1 + j);
        match close {
            Some(end) if first_member < chars.len() => {
                out.extend(&chars[i..=end]);
                i = end + 1;
            }
            _ => {
                out.push_str("[[]");
                i += 1;
            }
        }
    }
    out
}
