use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::{
    AutonomousThought, ConversationTurn, Mood, PersistedSnapshot, RelationshipMetrics,
    RelationshipStage, Result, SnapshotStore, Speaker, ThoughtTrigger, TrainingMetadata,
    TurnMetadata, UserProfile,
};

/// When and how much state is written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistPolicy {
    /// Unsaved turns tolerated before `due_save` hands out a snapshot
    pub save_every: usize,
    /// Turns kept in the snapshot
    pub history_limit: usize,
    /// Autonomous thoughts kept in the snapshot
    pub thought_limit: usize,
}

impl Default for PersistPolicy {
    fn default() -> Self {
        PersistPolicy {
            save_every: 3,
            history_limit: 200,
            thought_limit: 50,
        }
    }
}

/// Read-only aggregate of the companion's state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalitySnapshot {
    pub relationship_stage: RelationshipStage,
    pub metrics: RelationshipMetrics,
    pub mood: Mood,
    pub turn_count: usize,
    pub avg_sentiment: f64,
}

/// A past user utterance worth bringing up again
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryReference {
    pub text: String,
    pub time_ago: String,
}

/// A snapshot taken under the memory lock, written after the lock is released.
pub struct PendingSave {
    store: Arc<SnapshotStore>,
    snapshot: PersistedSnapshot,
    seq: u64,
    turns: usize,
}

impl PendingSave {
    /// Unsaved turns this snapshot covers
    pub fn turns(&self) -> usize {
        self.turns
    }

    /// Write the snapshot unless a newer one already reached disk.
    pub async fn commit(self) -> Result<()> {
        if self.store.write(&self.snapshot, self.seq).await? {
            debug!(path = %self.store.path().display(), seq = self.seq, "Companion memory saved");
        }
        Ok(())
    }
}

/// Sole owner of conversation history, mood and relationship state.
pub struct RelationshipMemory {
    history: Vec<ConversationTurn>,
    profile: UserProfile,
    mood: Mood,
    metrics: RelationshipMetrics,
    thoughts: Vec<AutonomousThought>,
    last_updated: DateTime<Utc>,
    store: Arc<SnapshotStore>,
    policy: PersistPolicy,
    dirty_turns: usize,
    save_seq: u64,
}

impl RelationshipMemory {
    fn fresh(store: SnapshotStore, policy: PersistPolicy) -> Self {
        RelationshipMemory {
            history: Vec::new(),
            profile: UserProfile::default(),
            mood: Mood::default(),
            metrics: RelationshipMetrics::default(),
            thoughts: Vec::new(),
            last_updated: Utc::now(),
            store: Arc::new(store),
            policy,
            dirty_turns: 0,
            save_seq: 0,
        }
    }

    /// Restore from `store`, or start fresh and persist the defaults.
    ///
    /// A missing or unreadable snapshot is never an error for the caller.
    pub async fn load(store: SnapshotStore, policy: PersistPolicy) -> Self {
        let loaded = match store.read().await {
            Ok(Some(snapshot)) => Some(snapshot),
            Ok(None) => None,
            Err(e) => {
                warn!("Discarding unreadable snapshot {}: {}", store.path().display(), e);
                None
            }
        };

        let mut memory = Self::fresh(store, policy);

        match loaded {
            Some(snapshot) => {
                memory.restore(snapshot);
                info!(
                    conversations = memory.history.len(),
                    mood = %memory.mood,
                    affection = memory.metrics.affection,
                    "Companion memory loaded"
                );
            }
            None => {
                info!("Starting with fresh memory");
                if let Err(e) = memory.save().await {
                    warn!("Could not persist fresh memory: {}", e);
                }
            }
        }

        memory
    }

    fn restore(&mut self, snapshot: PersistedSnapshot) {
        self.history = snapshot.history;
        self.profile = snapshot.profile;
        self.mood = snapshot.mood;
        self.metrics = snapshot.relationships;
        self.metrics.clamp();
        self.thoughts = snapshot.autonomous_thoughts;
        self.last_updated = snapshot.last_updated;
        self.dirty_turns = 0;
    }

    /// The durable view of current state, truncated to the policy limits.
    pub fn snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            history: tail(&self.history, self.policy.history_limit).to_vec(),
            profile: self.profile.clone(),
            mood: self.mood,
            relationships: self.metrics,
            autonomous_thoughts: tail(&self.thoughts, self.policy.thought_limit).to_vec(),
            last_updated: Utc::now(),
        }
    }

    /// Take a snapshot to write later and clear the dirty-turn counter.
    ///
    /// Pass the covered turns to `save_failed` if the commit does not succeed.
    pub fn pending_save(&mut self) -> PendingSave {
        self.save_seq += 1;
        let snapshot = self.snapshot();
        self.last_updated = snapshot.last_updated;

        PendingSave {
            store: Arc::clone(&self.store),
            snapshot,
            seq: self.save_seq,
            turns: std::mem::take(&mut self.dirty_turns),
        }
    }

    /// A pending save once enough unsaved turns have piled up.
    pub fn due_save(&mut self) -> Option<PendingSave> {
        if self.dirty_turns < self.policy.save_every.max(1) {
            return None;
        }
        Some(self.pending_save())
    }

    /// Count the turns of a failed commit as unsaved again.
    pub fn save_failed(&mut self, turns: usize) {
        self.dirty_turns += turns;
    }

    /// Write the snapshot. In-memory history is left untouched, also on error.
    pub async fn save(&mut self) -> Result<()> {
        let pending = self.pending_save();
        let turns = pending.turns();
        if let Err(e) = pending.commit().await {
            self.save_failed(turns);
            return Err(e);
        }
        Ok(())
    }

    pub fn record_interaction(&mut self, speaker: Speaker, text: &str, metadata: TurnMetadata) {
        self.record_interaction_at(speaker, text, metadata, Utc::now());
    }

    pub fn record_interaction_at(
        &mut self,
        speaker: Speaker,
        text: &str,
        metadata: TurnMetadata,
        timestamp: DateTime<Utc>,
    ) {
        self.history
            .push(ConversationTurn::new(speaker, text, timestamp, self.mood, metadata));
        self.dirty_turns += 1;
    }

    pub fn update_mood(&mut self, sentiment: f64) -> Mood {
        let mood = Mood::from_sentiment(sentiment);
        if mood != self.mood {
            debug!(from = %self.mood, to = %mood, "Mood changed");
        }
        self.mood = mood;
        mood
    }

    pub fn update_relationship(&mut self, user_sentiment: f64) {
        self.metrics.apply_sentiment(user_sentiment);
        if let Some(stage) = self.profile.refresh_stage(&self.metrics) {
            info!(stage = %stage, "Relationship stage advanced");
        }
    }

    pub fn record_autonomous_thought(&mut self, text: &str, trigger: ThoughtTrigger) {
        self.thoughts.push(AutonomousThought {
            text: text.to_string(),
            trigger,
            timestamp: Utc::now(),
            mood_at_time: self.mood,
        });
    }

    /// The last `limit` turns as `Speaker: text` lines.
    pub fn recent_context(&self, limit: usize) -> String {
        tail(&self.history, limit)
            .iter()
            .map(|turn| format!("{}: {}", turn.speaker, turn.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Only sometimes reference the past, and only once there is one.
    pub fn should_surface_memory<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.history.len() > 10 && rng.gen::<f64>() < 0.3
    }

    /// Pick one of the user's last ten utterances from the past week.
    pub fn pick_recent_memory<R: Rng + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<MemoryReference> {
        if self.history.len() < 5 {
            return None;
        }

        let week = Duration::days(7);
        let candidates: Vec<&ConversationTurn> = self
            .history
            .iter()
            .filter(|t| t.speaker == Speaker::User && now - t.timestamp < week)
            .collect();

        tail(&candidates, 10).choose(rng).map(|turn| MemoryReference {
            text: turn.text.clone(),
            time_ago: format_time_ago(now - turn.timestamp),
        })
    }

    pub fn personality_snapshot(&self) -> PersonalitySnapshot {
        let scored: Vec<f64> = self.history.iter().filter_map(|t| t.sentiment).collect();
        let avg_sentiment = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f64>() / scored.len() as f64
        };

        PersonalitySnapshot {
            relationship_stage: self.profile.relationship_stage,
            metrics: self.metrics,
            mood: self.mood,
            turn_count: self.history.len(),
            avg_sentiment,
        }
    }

    pub fn training_metadata(&self) -> TrainingMetadata {
        TrainingMetadata {
            mood: self.mood,
            relationship_stage: self.profile.relationship_stage,
            affection: self.metrics.affection,
            timestamp: Utc::now(),
        }
    }

    /// Forget everything and persist the blank state.
    pub async fn reset(&mut self) -> Result<()> {
        self.history.clear();
        self.profile = UserProfile::default();
        self.mood = Mood::default();
        self.metrics = RelationshipMetrics::default();
        self.thoughts.clear();
        info!("Companion memory reset");
        self.save().await
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn thoughts(&self) -> &[AutonomousThought] {
        &self.thoughts
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn set_mood(&mut self, mood: Mood) {
        self.mood = mood;
    }

    pub fn metrics(&self) -> &RelationshipMetrics {
        &self.metrics
    }

    pub fn relationship_stage(&self) -> RelationshipStage {
        self.profile.relationship_stage
    }

    /// When the last snapshot was taken
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Timestamp of the most recent user turn
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .rev()
            .find(|t| t.speaker == Speaker::User)
            .map(|t| t.timestamp)
    }

    pub fn dirty_turns(&self) -> usize {
        self.dirty_turns
    }
}

fn tail<T>(items: &[T], limit: usize) -> &[T] {
    &items[items.len().saturating_sub(limit)..]
}

/// Human readable elapsed time using the largest non-zero unit.
pub fn format_time_ago(elapsed: Duration) -> String {
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("{} {} ago", n, unit)
        } else {
            format!("{} {}s ago", n, unit)
        }
    };

    let days = elapsed.num_days();
    let hours = elapsed.num_hours();
    let minutes = elapsed.num_minutes().max(0);

    if days > 0 {
        plural(days, "day")
    } else if hours > 0 {
        plural(hours, "hour")
    } else {
        plural(minutes, "minute")
    }
}
