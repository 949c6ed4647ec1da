//! Offline word-list sentiment scorer.

const POSITIVE: &[&str] = &[
    "good", "great", "excellent", "love", "enjoy", "happy", "excited", "confident", "challenge",
    "lead", "best", "fun", "좋", "즐겁", "즐거", "행복", "도전", "적극", "자신", "신나", "재미",
    "기대", "사랑", "주도",
];

const NEGATIVE: &[&str] = &[
    "bad", "worry", "afraid", "anxious", "hate", "difficult", "nervous", "careful", "avoid",
    "tired", "sad", "worst", "걱정", "불안", "싫", "어렵", "힘들", "두렵", "피곤", "조심",
    "긴장", "망설",
];

/// Scores text by counting positive and negative cue words.
///
/// Matching is by lowercase substring, which also catches Korean stems with
/// any ending attached. The score is `positive / (positive + negative)`, or
/// 0.5 when no cue appears.
#[derive(Debug, Clone, PartialEq)]
pub struct LexiconSentiment {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl Default for LexiconSentiment {
    fn default() -> Self {
        Self::new(POSITIVE.iter().copied(), NEGATIVE.iter().copied())
    }
}

impl LexiconSentiment {
    pub fn new<P, N>(positive: P, negative: N) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        let lower = |w: String| w.to_lowercase();
        Self {
            positive: positive.into_iter().map(Into::into).map(lower).collect(),
            negative: negative.into_iter().map(Into::into).map(lower).collect(),
        }
    }

    pub fn score(&self, text: &str) -> f64 {
        let text = text.to_lowercase();
        let positive = count_hits(&text, &self.positive) as f64;
        let negative = count_hits(&text, &self.negative) as f64;
        if positive + negative == 0.0 {
            0.5
        } else {
            positive / (positive + negative)
        }
    }
}

fn count_hits(text: &str, words: &[String]) -> usize {
    words.iter().map(|w| text.matches(w.as_str()).count()).sum()
}
