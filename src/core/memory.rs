use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::mood::Mood;

/// Who produced a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Companion,
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Speaker::User => write!(f, "User"),
            Speaker::Companion => write!(f, "Companion"),
        }
    }
}

/// Optional annotations attached when a turn is recorded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnMetadata {
    pub sentiment: Option<f64>,
    pub emotion_tags: BTreeSet<String>,
}

impl TurnMetadata {
    pub fn scored(sentiment: f64, dominant_emotion: impl Into<String>) -> Self {
        let mut emotion_tags = BTreeSet::new();
        emotion_tags.insert(dominant_emotion.into());
        Self {
            sentiment: Some(sentiment),
            emotion_tags,
        }
    }

    pub fn tagged<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sentiment: None,
            emotion_tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

/// A single utterance in the conversation history. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub mood_at_time: Mood,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f64>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub emotion_tags: BTreeSet<String>,
}

impl ConversationTurn {
    pub fn new(
        speaker: Speaker,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
        mood_at_time: Mood,
        metadata: TurnMetadata,
    ) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp,
            mood_at_time,
            sentiment: metadata.sentiment,
            emotion_tags: metadata.emotion_tags,
        }
    }
}

/// What caused an autonomous thought
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtTrigger {
    Random,
    EmotionalState,
}

/// Something the companion "thought" without being prompted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutonomousThought {
    pub text: String,
    pub trigger: ThoughtTrigger,
    pub timestamp: DateTime<Utc>,
    pub mood_at_time: Mood,
}
