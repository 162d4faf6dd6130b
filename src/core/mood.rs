use serde::{Deserialize, Serialize};

/// Discrete mood label carried by the companion.
///
/// Only `Happy`, `Content`, `Neutral`, `Frustrated` and `Sad` are produced by
/// [`Mood::from_sentiment`]; the remaining labels can appear in restored
/// snapshots and are understood by the proactive rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Excited,
    Content,
    #[default]
    Neutral,
    Thinking,
    Frustrated,
    Sad,
    Lonely,
}

impl Mood {
    /// Map the most recent sentiment sample to a mood. No smoothing.
    pub fn from_sentiment(sentiment: f64) -> Self {
        if sentiment > 0.6 {
            Mood::Happy
        } else if sentiment > 0.3 {
            Mood::Content
        } else if sentiment < -0.6 {
            Mood::Sad
        } else if sentiment < -0.3 {
            Mood::Frustrated
        } else {
            Mood::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Excited => "excited",
            Mood::Content => "content",
            Mood::Neutral => "neutral",
            Mood::Thinking => "thinking",
            Mood::Frustrated => "frustrated",
            Mood::Sad => "sad",
            Mood::Lonely => "lonely",
        }
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
