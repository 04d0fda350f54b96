/// Keyword filter used by autocomplete and list subscriptions.
///
/// Keywords are separated by whitespace; `_` inside a keyword stands for a
/// literal space. Text to match: `A`, `B`, `C`, `A B`, `B A C`
///
/// | Filter | Matches          |
/// | ------ | ---------------- |
/// | a B    | A B; B A C       |
/// | A_B    | A B              |
pub struct TextFilter {
    keywords: Vec<String>,
}

/// Only this many leading words of a subject earn prefix bonuses.
const SCORED_WORDS: usize = 16;

impl TextFilter {
    pub fn new<S: AsRef<str>>(query: S) -> Self {
        let keywords = query
            .as_ref()
            .to_lowercase()
            .split_whitespace()
            .map(|word| word.replace('_', " "))
            .collect();
        Self { keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// How well `text` matches. 0 means no match; anything above means a
    /// match, higher is better. An empty filter matches everything with 1.
    pub fn score<S: AsRef<str>>(&self, text: S) -> u32 {
        let subject = text.as_ref().to_lowercase().replace('_', " ");

        if !self.keywords.iter().all(|keyword| subject.contains(keyword.as_str())) {
            return 0;
        }

        let mut score = 1;
        for (word, keyword) in subject.split_whitespace().take(SCORED_WORDS).zip(&self.keywords) {
            if word.starts_with(keyword.as_str()) {
                score += 1;
                if word == keyword {
                    score += 2;
                }
            }
        }
        score
    }
}
