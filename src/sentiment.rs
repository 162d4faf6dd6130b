use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::ConversationTurn;

/// Divides the mean token weight so that the strongest words land near ±1
const SCALE: f64 = 3.0;

const POSITIVE_WORDS: &[(&str, f64)] = &[
    // affection
    ("love", 3.0), ("adore", 3.0), ("cherish", 3.0), ("treasure", 3.0),
    ("beautiful", 2.0), ("amazing", 2.0), ("wonderful", 2.0), ("perfect", 2.0),
    ("sweet", 2.0), ("cute", 2.0), ("adorable", 2.0),
    // happiness
    ("happy", 2.0), ("joy", 2.0), ("excited", 2.0), ("glad", 2.0),
    ("smile", 1.5), ("laugh", 1.5), ("fun", 1.5),
    ("good", 1.0), ("nice", 1.0), ("great", 1.5), ("awesome", 2.0),
    // approval
    ("yes", 1.0), ("sure", 1.0), ("definitely", 1.5), ("absolutely", 2.0),
    ("thanks", 1.5),
    // emoji
    ("❤️", 3.0), ("❤", 3.0), ("💕", 3.0), ("💖", 3.0), ("😍", 2.5), ("🥰", 2.5),
    ("😊", 2.0), ("😄", 2.0), ("😁", 2.0), ("🙂", 1.5), ("✨", 1.5),
    ("💯", 2.0), ("👍", 1.5), ("😘", 2.5),
];

const NEGATIVE_WORDS: &[(&str, f64)] = &[
    // strong
    ("hate", -3.0), ("terrible", -3.0), ("awful", -3.0), ("disgusting", -3.0),
    ("stupid", -2.5), ("dumb", -2.5), ("idiot", -2.5), ("annoying", -2.0),
    // sadness / hurt
    ("sad", -2.0), ("hurt", -2.0), ("cry", -2.0), ("upset", -2.0),
    ("disappointed", -2.0), ("angry", -2.5), ("mad", -2.0),
    // dismissive
    ("whatever", -1.5), ("boring", -1.5), ("meh", -1.0),
    ("no", -1.0), ("stop", -1.5),
    ("bad", -1.5), ("wrong", -1.0), ("worse", -2.0),
    // emoji
    ("😢", -2.0), ("😭", -2.5), ("😠", -2.5), ("😡", -3.0),
    ("🙄", -1.5), ("😒", -1.5), ("💔", -2.5), ("😤", -2.0),
];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.5), ("really", 1.5), ("extremely", 2.0), ("super", 1.5),
    ("so", 1.3), ("totally", 1.5), ("absolutely", 2.0), ("completely", 2.0),
];

const DIMINISHERS: &[(&str, f64)] = &[
    ("kinda", 0.7), ("somewhat", 0.7), ("slightly", 0.6),
    ("maybe", 0.8), ("perhaps", 0.8), ("little", 0.6),
];

/// Fallback weights for emoji that are in neither lexicon
const HAPPY_EMOJI: &[&str] = &["😃", "😀", "😌", "🤗"];
const LOVE_EMOJI: &[&str] = &["💝"];
const SAD_EMOJI: &[&str] = &["😞", "😔", "🥺", "😪"];
const ANGRY_EMOJI: &[&str] = &["🤬"];

const EMOJI_RANGES: &[(u32, u32)] = &[
    (0x1F600, 0x1F64F),
    (0x1F300, 0x1F5FF),
    (0x1F680, 0x1F6FF),
    (0x1F900, 0x1F9FF),
    (0x1F1E0, 0x1F1FF),
    (0x2600, 0x26FF),
    (0x2700, 0x27BF),
];

/// Variation selector and zero-width joiner, kept so emoji sequences survive
const EMOJI_JOINERS: &[char] = &['\u{FE0F}', '\u{200D}'];

fn is_emoji_char(c: char) -> bool {
    let code = c as u32;
    EMOJI_RANGES.iter().any(|(lo, hi)| (*lo..=*hi).contains(&code))
}

fn is_emoji_token(token: &str) -> bool {
    token.chars().any(is_emoji_char)
}

/// Emotional categories detected by keyword containment, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionCategory {
    Affection,
    Playfulness,
    Concern,
    Criticism,
    Appreciation,
    Neutral,
}

impl EmotionCategory {
    /// Declaration order doubles as the tie-break order.
    pub const DETECTABLE: [EmotionCategory; 5] = [
        EmotionCategory::Affection,
        EmotionCategory::Playfulness,
        EmotionCategory::Concern,
        EmotionCategory::Criticism,
        EmotionCategory::Appreciation,
    ];

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            EmotionCategory::Affection => &["love", "care", "miss", "❤️", "💕"],
            EmotionCategory::Playfulness => &["haha", "lol", "fun", "play", "😄"],
            EmotionCategory::Concern => &["okay", "alright", "worry", "hope"],
            EmotionCategory::Criticism => &["wrong", "bad", "terrible", "annoying"],
            EmotionCategory::Appreciation => &["thanks", "grateful", "appreciate", "sweet"],
            EmotionCategory::Neutral => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionCategory::Affection => "affection",
            EmotionCategory::Playfulness => "playfulness",
            EmotionCategory::Concern => "concern",
            EmotionCategory::Criticism => "criticism",
            EmotionCategory::Appreciation => "appreciation",
            EmotionCategory::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for EmotionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which categories matched, independently of the dominant one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionFlags {
    pub affection: bool,
    pub playfulness: bool,
    pub concern: bool,
    pub criticism: bool,
    pub appreciation: bool,
}

impl EmotionFlags {
    fn set(&mut self, category: EmotionCategory) {
        match category {
            EmotionCategory::Affection => self.affection = true,
            EmotionCategory::Playfulness => self.playfulness = true,
            EmotionCategory::Concern => self.concern = true,
            EmotionCategory::Criticism => self.criticism = true,
            EmotionCategory::Appreciation => self.appreciation = true,
            EmotionCategory::Neutral => {}
        }
    }

    pub fn any(&self) -> bool {
        self.affection || self.playfulness || self.concern || self.criticism || self.appreciation
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalContext {
    pub sentiment: f64,
    pub dominant_emotion: EmotionCategory,
    pub flags: EmotionFlags,
    pub intensity: f64,
}

/// Direction of the relationship judged from recent sentiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipTrend {
    New,
    Improving,
    Stable,
    Declining,
}

impl std::fmt::Display for RelationshipTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationshipTrend::New => write!(f, "new"),
            RelationshipTrend::Improving => write!(f, "improving"),
            RelationshipTrend::Stable => write!(f, "stable"),
            RelationshipTrend::Declining => write!(f, "declining"),
        }
    }
}

/// Lexicon-based sentiment scorer. Stateless apart from its fixed tables.
#[derive(Debug, Clone)]
pub struct SentimentScorer {
    positive: HashMap<&'static str, f64>,
    negative: HashMap<&'static str, f64>,
    modifiers: HashMap<&'static str, f64>,
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentScorer {
    pub fn new() -> Self {
        let modifiers = INTENSIFIERS
            .iter()
            .chain(DIMINISHERS.iter())
            .copied()
            .collect();

        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            modifiers,
        }
    }

    /// Lowercase, replace punctuation with spaces, split on whitespace.
    pub fn tokenize(text: &str) -> Vec<String> {
        let normalized: String = text
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c.is_whitespace() || is_emoji_char(c) || EMOJI_JOINERS.contains(&c) {
                    c
                } else {
                    ' '
                }
            })
            .collect();

        normalized.split_whitespace().map(str::to_string).collect()
    }

    /// Score `text` in [-1, 1]. Text without any scoring token is exactly 0.
    pub fn score(&self, text: &str) -> f64 {
        let tokens = Self::tokenize(text);

        let mut total = 0.0;
        let mut scoring_tokens = 0usize;

        for (i, token) in tokens.iter().enumerate() {
            let multiplier = i
                .checked_sub(1)
                .and_then(|prev| self.modifiers.get(tokens[prev].as_str()))
                .copied()
                .unwrap_or(1.0);

            let weight = self
                .positive
                .get(token.as_str())
                .or_else(|| self.negative.get(token.as_str()))
                .map(|w| w * multiplier)
                .or_else(|| Self::emoji_fallback(token));

            if let Some(weight) = weight {
                total += weight;
                scoring_tokens += 1;
            }
        }

        if scoring_tokens == 0 {
            return 0.0;
        }

        (total / scoring_tokens as f64 / SCALE).clamp(-1.0, 1.0)
    }

    fn emoji_fallback(token: &str) -> Option<f64> {
        if !is_emoji_token(token) {
            return None;
        }

        let token = token.trim_end_matches(EMOJI_JOINERS);
        if HAPPY_EMOJI.contains(&token) {
            Some(2.0)
        } else if LOVE_EMOJI.contains(&token) {
            Some(3.0)
        } else if SAD_EMOJI.contains(&token) {
            Some(-2.0)
        } else if ANGRY_EMOJI.contains(&token) {
            Some(-2.5)
        } else {
            None
        }
    }

    /// Keyword categories for `text`. The dominant emotion is the first
    /// matching category in declaration order, not a weighted vote.
    pub fn classify(&self, text: &str, score: f64) -> EmotionalContext {
        let lower = text.to_lowercase();
        let mut flags = EmotionFlags::default();
        let mut dominant = EmotionCategory::Neutral;

        for category in EmotionCategory::DETECTABLE {
            if category.keywords().iter().any(|kw| lower.contains(kw)) {
                flags.set(category);
                if dominant == EmotionCategory::Neutral {
                    dominant = category;
                }
            }
        }

        EmotionalContext {
            sentiment: score,
            dominant_emotion: dominant,
            flags,
            intensity: score.abs(),
        }
    }

    /// Score and classify in one call.
    pub fn analyze(&self, text: &str) -> EmotionalContext {
        let score = self.score(text);
        self.classify(text, score)
    }

    /// Judge the trend from the last ten turns of history.
    ///
    /// Unscored turns count toward the window but contribute nothing.
    pub fn relationship_trend(history: &[ConversationTurn]) -> RelationshipTrend {
        if history.len() < 5 {
            return RelationshipTrend::New;
        }

        let recent = &history[history.len().saturating_sub(10)..];
        let sum: f64 = recent.iter().filter_map(|t| t.sentiment).sum();
        let avg = sum / recent.len() as f64;

        if avg > 0.3 {
            RelationshipTrend::Improving
        } else if avg < -0.3 {
            RelationshipTrend::Declining
        } else {
            RelationshipTrend::Stable
        }
    }
}
