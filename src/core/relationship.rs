use serde::{Deserialize, Serialize};

pub const METRIC_MIN: f64 = -100.0;
pub const METRIC_MAX: f64 = 100.0;

/// How far the relationship with the user has progressed.
///
/// Ordered: a later variant is a closer stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStage {
    #[default]
    Stranger,
    Acquaintance,
    Friend,
    Close,
}

impl std::fmt::Display for RelationshipStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationshipStage::Stranger => write!(f, "stranger"),
            RelationshipStage::Acquaintance => write!(f, "acquaintance"),
            RelationshipStage::Friend => write!(f, "friend"),
            RelationshipStage::Close => write!(f, "close"),
        }
    }
}

/// Affection, trust and familiarity, each kept in [-100, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RelationshipMetrics {
    #[serde(default)]
    pub affection: f64,
    #[serde(default)]
    pub trust: f64,
    #[serde(default)]
    pub familiarity: f64,
}

impl RelationshipMetrics {
    /// Apply one user interaction.
    ///
    /// Hostile turns cost more than friendly turns earn. Familiarity grows on
    /// every call regardless of sentiment.
    pub fn apply_sentiment(&mut self, user_sentiment: f64) {
        if user_sentiment > 0.5 {
            self.affection += 2.0;
            self.trust += 1.0;
        } else if user_sentiment < -0.5 {
            self.affection -= 3.0;
            self.trust -= 2.0;
        }

        self.familiarity += 0.5;
        self.clamp();
    }

    pub fn clamp(&mut self) {
        self.affection = self.affection.clamp(METRIC_MIN, METRIC_MAX);
        self.trust = self.trust.clamp(METRIC_MIN, METRIC_MAX);
        self.familiarity = self.familiarity.clamp(METRIC_MIN, METRIC_MAX);
    }

    /// Highest stage whose thresholds are currently met, if any.
    pub fn qualifying_stage(&self) -> Option<RelationshipStage> {
        if self.affection > 60.0 && self.trust > 50.0 && self.familiarity > 80.0 {
            Some(RelationshipStage::Close)
        } else if self.affection > 30.0 && self.trust > 20.0 && self.familiarity > 40.0 {
            Some(RelationshipStage::Friend)
        } else if self.familiarity > 20.0 {
            Some(RelationshipStage::Acquaintance)
        } else {
            None
        }
    }

    /// Recompute the stage from `current`. Never moves downward.
    pub fn next_stage(&self, current: RelationshipStage) -> RelationshipStage {
        match self.qualifying_stage() {
            Some(stage) if stage > current => stage,
            _ => current,
        }
    }
}
