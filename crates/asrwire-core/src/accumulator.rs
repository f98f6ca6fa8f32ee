//! Transcript accumulation and wake-phrase policy.
//!
//! Incremental recognizers resend the whole hypothesis on every fragment, so
//! the accumulator keeps the latest non-empty fragment instead of appending.

/// Candidate spellings of the wake phrase, stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakePhrases(Vec<String>);

impl WakePhrases {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        )
    }

    /// Case-insensitive containment of any candidate.
    pub fn matches(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.0.iter().any(|p| haystack.contains(p.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for WakePhrases {
    fn default() -> Self {
        Self::new(["任意门", "任意", "hi"])
    }
}

/// Best-known transcript for one session.
#[derive(Debug, Clone, Default)]
pub struct ResultAccumulator {
    latest: Option<String>,
    fragments: usize,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the hypothesis with `fragment`. Empty fragments are ignored.
    /// Returns whether the hypothesis changed.
    pub fn push(&mut self, fragment: &str) -> bool {
        if fragment.is_empty() {
            return false;
        }
        self.fragments += 1;
        self.latest = Some(fragment.to_owned());
        true
    }

    /// `None` if no non-empty fragment was ever received.
    pub fn final_text(&self) -> Option<String> {
        self.latest.clone()
    }

    pub fn latest(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    /// Number of non-empty fragments folded so far.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn contains_wake_phrase(&self, candidates: &WakePhrases) -> bool {
        self.latest
            .as_deref()
            .is_some_and(|text| candidates.matches(text))
    }
}
