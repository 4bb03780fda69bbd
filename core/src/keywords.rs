//! Case-insensitive keyword matching for rule predicates and protection layers.
//!
//! A `KeywordSet` is the declarative form of "label contains one of these
//! substrings". It compiles the keywords once into an Aho-Corasick automaton
//! so a label is scanned in a single pass regardless of keyword count.

use aho_corasick::{AhoCorasick, BuildError};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to compile keyword set: {0}")]
pub struct KeywordError(#[from] BuildError);

#[derive(Debug, Clone)]
pub struct KeywordSet {
    keywords: Vec<String>,
    matcher: AhoCorasick,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Result<Self, KeywordError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keywords: Vec<String> = keywords.into_iter().map(Into::into).collect();
        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&keywords)?;
        Ok(Self { keywords, matcher })
    }

    /// Build from a compile-time keyword list.
    ///
    /// Short static lists are always within the automaton's size limits.
    #[must_use]
    pub fn from_static(keywords: &[&'static str]) -> Self {
        Self::new(keywords.iter().copied()).expect("static keyword set must compile")
    }

    /// Whether `text` contains any keyword (ASCII case-insensitive).
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }

    /// The first keyword found in `text`, by position.
    #[must_use]
    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.matcher
            .find(text)
            .map(|m| self.keywords[m.pattern().as_usize()].as_str())
    }

    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}
