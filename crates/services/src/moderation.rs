//! Stub moderation predicate.
//!
//! Real moderation belongs to a separate collaborator; this filter only
//! withholds messages containing a configured term (case-insensitive).
//! With an empty list nothing is filtered.

use domains::ContentFilter;

#[derive(Debug, Clone, Default)]
pub struct BlocklistFilter {
    terms: Vec<String>,
}

impl BlocklistFilter {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

impl ContentFilter for BlocklistFilter {
    fn is_filtered(&self, message: &str) -> bool {
        if self.terms.is_empty() {
            return false;
        }
        let message = message.to_lowercase();
        self.terms.iter().any(|term| message.contains(term.as_str()))
    }
}
