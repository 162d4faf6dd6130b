use serde::{Deserialize, Serialize};

use crate::core::relationship::{RelationshipMetrics, RelationshipStage};

/// What the companion knows about the single user it talks to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UserProfile {
    pub name: Option<String>,

    pub interests: Vec<String>,

    /// Derived from the relationship metrics; only `reset` lowers it
    pub relationship_stage: RelationshipStage,

    pub preferred_topics: Vec<String>,

    pub dislikes: Vec<String>,
}

impl UserProfile {
    /// Re-derive the stage after a metrics update.
    ///
    /// Returns the new stage when it changed.
    pub fn refresh_stage(&mut self, metrics: &RelationshipMetrics) -> Option<RelationshipStage> {
        let next = metrics.next_stage(self.relationship_stage);
        if next != self.relationship_stage {
            self.relationship_stage = next;
            Some(next)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_stage_reports_upgrade() {
        let mut profile = UserProfile::default();
        let metrics = RelationshipMetrics { affection: 0.0, trust: 0.0, familiarity: 25.0 };

        assert_eq!(profile.refresh_stage(&metrics), Some(RelationshipStage::Acquaintance));
        assert_eq!(profile.refresh_stage(&metrics), None);
        assert_eq!(profile.relationship_stage, RelationshipStage::Acquaintance);
    }

    #[test]
    fn test_partial_profile_fills_defaults() {
        let profile: UserProfile = serde_json::from_str(r#"{"name":"Kana"}"#).unwrap();
        assert_eq!(profile.name.as_deref(), Some("Kana"));
        assert!(profile.interests.is_empty());
        assert_eq!(profile.relationship_stage, RelationshipStage::Stranger);
    }
}
