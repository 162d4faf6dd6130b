pub mod error;
pub mod memory;
pub mod mood;
pub mod profile;
pub mod relationship;
pub mod store;

pub use error::{CompanionError, Result};
pub use memory::{AutonomousThought, ConversationTurn, Speaker, ThoughtTrigger, TurnMetadata};
pub use mood::Mood;
pub use profile::UserProfile;
pub use relationship::{RelationshipMetrics, RelationshipStage};
pub use store::{PersistedSnapshot, SnapshotStore, TrainingExample, TrainingLog, TrainingMetadata};
