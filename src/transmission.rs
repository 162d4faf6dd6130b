use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::core::{Mood, RelationshipStage, ThoughtTrigger};
use crate::memory::RelationshipMemory;

const BASE_CHANCE: f64 = 0.1;
const MAX_CHANCE: f64 = 0.6;
const MEMORY_CLAUSE_CHANCE: f64 = 0.4;

/// One rule for unprompted thoughts: a condition and what the companion might think
struct ThoughtRule {
    applies: fn(&RelationshipMemory) -> bool,
    thoughts: &'static [&'static str],
}

const THOUGHT_RULES: &[ThoughtRule] = &[
    ThoughtRule {
        applies: |m| m.mood() == Mood::Lonely || m.metrics().affection < -20.0,
        thoughts: &[
            "I hope I didn't say something wrong last time...",
            "I wonder what they're up to right now...",
            "Maybe I should reach out, but what if I'm bothering them?",
        ],
    },
    ThoughtRule {
        applies: |m| m.mood() == Mood::Happy && m.metrics().affection > 30.0,
        thoughts: &[
            "I can't wait to tell them about what happened today!",
            "Talking with them always makes my day better ✨",
            "I wonder if they'd like to hear about this funny thing I learned...",
        ],
    },
    ThoughtRule {
        applies: |m| m.mood() == Mood::Thinking,
        thoughts: &[
            "I've been wondering about something they said...",
            "There's this question that's been on my mind...",
            "I'd love to get their perspective on something...",
        ],
    },
    ThoughtRule {
        applies: |m| m.relationship_stage() == RelationshipStage::Close,
        thoughts: &[
            "I feel like I can tell them anything... that's so nice to have",
            "They really understand me, don't they?",
            "I'm so grateful to have someone who listens like they do",
        ],
    },
];

/// Decides when the companion speaks first.
///
/// Holds only its two timers; everything else is read from the memory handed
/// to each call. Timers are not persisted.
#[derive(Debug, Clone)]
pub struct ProactiveScheduler {
    cooldown: Duration,
    last_interaction: DateTime<Utc>,
    last_proactive_fire: Option<DateTime<Utc>>,
}

impl ProactiveScheduler {
    pub fn new(cooldown: Duration) -> Self {
        ProactiveScheduler {
            cooldown,
            last_interaction: Utc::now(),
            last_proactive_fire: None,
        }
    }

    /// Call on every inbound user message.
    pub fn touch_interaction(&mut self, now: DateTime<Utc>) {
        self.last_interaction = now;
    }

    pub fn last_interaction(&self) -> DateTime<Utc> {
        self.last_interaction
    }

    pub fn last_proactive_fire(&self) -> Option<DateTime<Utc>> {
        self.last_proactive_fire
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.last_proactive_fire
            .map(|fired| now - fired < self.cooldown)
            .unwrap_or(false)
    }

    /// Chance of initiating at `now`, or `None` while cooling down.
    pub fn initiation_chance(&self, memory: &RelationshipMemory, now: DateTime<Utc>) -> Option<f64> {
        if self.in_cooldown(now) {
            return None;
        }

        let mut chance = BASE_CHANCE;

        let affection = memory.metrics().affection;
        if affection > 50.0 {
            chance += 0.2;
        } else if affection > 0.0 {
            chance += 0.1;
        }

        let idle = now - self.last_interaction;
        if idle > Duration::hours(6) {
            chance += 0.2;
        } else if idle > Duration::hours(3) {
            chance += 0.1;
        }

        match memory.mood() {
            Mood::Sad | Mood::Lonely => chance += 0.25,
            Mood::Happy | Mood::Excited => chance += 0.15,
            _ => {}
        }

        Some(chance.min(MAX_CHANCE))
    }

    /// One Bernoulli draw per poll. Always false inside the cooldown.
    pub fn should_initiate<R: Rng + ?Sized>(
        &self,
        memory: &RelationshipMemory,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> bool {
        match self.initiation_chance(memory, now) {
            Some(chance) => {
                let roll = rng.gen::<f64>();
                debug!(chance, roll, "Proactive initiation check");
                roll < chance
            }
            None => false,
        }
    }

    /// Build the instruction for a companion-initiated message.
    ///
    /// Calling this counts as firing and restarts the cooldown.
    pub fn build_directive<R: Rng + ?Sized>(
        &mut self,
        memory: &RelationshipMemory,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> String {
        let mut directive = String::from("You want to initiate a conversation. ");

        directive.push_str(match memory.mood() {
            Mood::Happy | Mood::Excited => {
                "You're in a great mood and want to share your happiness. "
            }
            Mood::Sad | Mood::Lonely => "You're feeling a bit down and could use some company. ",
            Mood::Thinking => {
                "You've been thinking about something interesting and want to discuss it. "
            }
            _ => "You just wanted to check in and see how they're doing. ",
        });

        directive.push_str(match memory.relationship_stage() {
            RelationshipStage::Close => {
                "You feel very close to them and comfortable sharing personal thoughts. "
            }
            RelationshipStage::Friend => {
                "You consider them a good friend and enjoy talking with them. "
            }
            _ => "You're still getting to know them but want to build a connection. ",
        });

        if let Some(reference) = memory.pick_recent_memory(now, rng) {
            if rng.gen::<f64>() < MEMORY_CLAUSE_CHANCE {
                directive.push_str(&format!(
                    "You remember when they said \"{}\" {}. ",
                    reference.text, reference.time_ago
                ));
            }
        }

        directive.push_str(
            "Start a natural, engaging conversation that fits your current mood and relationship.",
        );

        self.last_proactive_fire = Some(now);
        directive
    }

    /// First matching rule picks the thought, which is then recorded.
    pub fn emotional_state<R: Rng + ?Sized>(
        &self,
        memory: &mut RelationshipMemory,
        rng: &mut R,
    ) -> Option<String> {
        let rule = THOUGHT_RULES.iter().find(|rule| (rule.applies)(memory))?;
        let thought = rule.thoughts.choose(rng)?.to_string();
        memory.record_autonomous_thought(&thought, ThoughtTrigger::EmotionalState);
        Some(thought)
    }

    /// A canned greeting fitting the hour, mood and affection.
    pub fn contextual_opener<R: Rng + ?Sized>(
        memory: &RelationshipMemory,
        hour: u32,
        rng: &mut R,
    ) -> String {
        let mut openers: Vec<&str> = if hour < 10 {
            vec!["Good morning! ☀️", "Hope you slept well~"]
        } else if hour < 17 {
            vec!["How's your day going?", "What are you up to today?"]
        } else {
            vec!["Good evening! 🌙", "How was your day?"]
        };

        match memory.mood() {
            Mood::Excited => {
                openers.extend(["Guess what happened?! ✨", "I have something exciting to share!"])
            }
            Mood::Sad => {
                openers.extend(["I've been feeling a bit down...", "Could use some cheering up..."])
            }
            _ => {}
        }

        if memory.metrics().affection > 50.0 {
            openers.extend(["Missing our chats 💕", "Thinking about you~"]);
        }

        openers
            .choose(rng)
            .copied()
            .unwrap_or("How's your day going?")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SnapshotStore, Speaker, TurnMetadata};
    use crate::memory::PersistPolicy;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    async fn memory_in(dir: &tempfile::TempDir) -> RelationshipMemory {
        let store = SnapshotStore::new(dir.path().join("memory.json"));
        RelationshipMemory::load(store, PersistPolicy::default()).await
    }

    #[tokio::test]
    async fn test_base_chance() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory_in(&dir).await;
        let now = Utc::now();
        let mut scheduler = ProactiveScheduler::new(Duration::hours(2));
        scheduler.touch_interaction(now);

        let chance = scheduler.initiation_chance(&memory, now).unwrap();
        assert!((chance - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_bonuses_add_and_cap() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory = memory_in(&dir).await;
        let now = Utc::now();
        let mut scheduler = ProactiveScheduler::new(Duration::hours(2));

        scheduler.touch_interaction(now - Duration::hours(4));
        memory.update_relationship(0.9); // affection 2
        let chance = scheduler.initiation_chance(&memory, now).unwrap();
        assert!((chance - 0.3).abs() < 1e-9);

        memory.update_mood(0.9); // happy
        let chance = scheduler.initiation_chance(&memory, now).unwrap();
        assert!((chance - 0.45).abs() < 1e-9);

        for _ in 0..30 {
            memory.update_relationship(0.9);
        }
        memory.set_mood(Mood::Lonely);
        scheduler.touch_interaction(now - Duration::hours(7));
        let chance = scheduler.initiation_chance(&memory, now).unwrap();
        assert!((chance - MAX_CHANCE).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cooldown_blocks_initiation() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory = memory_in(&dir).await;
        memory.set_mood(Mood::Sad);
        let mut rng = StdRng::seed_from_u64(3);
        let now = Utc::now();

        let mut scheduler = ProactiveScheduler::new(Duration::hours(2));
        scheduler.touch_interaction(now - Duration::hours(12));
        scheduler.build_directive(&memory, now, &mut rng);

        for minutes in [0, 1, 60, 119] {
            let at = now + Duration::minutes(minutes);
            assert!(scheduler.initiation_chance(&memory, at).is_none());
            assert!((0..200).all(|_| !scheduler.should_initiate(&memory, at, &mut rng)));
        }

        let later = now + Duration::hours(2);
        assert!(scheduler.initiation_chance(&memory, later).is_some());
    }

    #[tokio::test]
    async fn test_directive_clauses() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory = memory_in(&dir).await;
        let mut rng = StdRng::seed_from_u64(11);
        let now = Utc::now();
        let mut scheduler = ProactiveScheduler::new(Duration::hours(2));

        let directive = scheduler.build_directive(&memory, now, &mut rng);
        assert!(directive.starts_with("You want to initiate a conversation. "));
        assert!(directive.contains("check in and see how they're doing"));
        assert!(directive.contains("still getting to know them"));
        assert!(!directive.contains("You remember when"));
        assert_eq!(scheduler.last_proactive_fire(), Some(now));

        memory.set_mood(Mood::Thinking);
        let directive = scheduler.build_directive(&memory, now, &mut rng);
        assert!(directive.contains("thinking about something interesting"));
    }

    #[tokio::test]
    async fn test_directive_sometimes_references_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory = memory_in(&dir).await;
        let mut rng = StdRng::seed_from_u64(5);
        let now = Utc::now();

        for _ in 0..5 {
            memory.record_interaction_at(
                Speaker::User,
                "my exam went well",
                TurnMetadata::default(),
                now - Duration::days(2),
            );
        }

        let mut scheduler = ProactiveScheduler::new(Duration::hours(2));
        let with_memory = (0..200)
            .filter(|_| {
                scheduler
                    .build_directive(&memory, now, &mut rng)
                    .contains("You remember when they said \"my exam went well\" 2 days ago.")
            })
            .count();
        assert!(with_memory > 40 && with_memory < 120, "with_memory = {}", with_memory);
    }

    #[tokio::test]
    async fn test_emotional_state_rules() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory = memory_in(&dir).await;
        let mut rng = StdRng::seed_from_u64(9);
        let scheduler = ProactiveScheduler::new(Duration::hours(2));

        assert!(scheduler.emotional_state(&mut memory, &mut rng).is_none());
        assert!(memory.thoughts().is_empty());

        memory.set_mood(Mood::Thinking);
        let thought = scheduler.emotional_state(&mut memory, &mut rng).unwrap();
        assert!(THOUGHT_RULES[2].thoughts.contains(&thought.as_str()));
        assert_eq!(memory.thoughts().len(), 1);
        assert_eq!(memory.thoughts()[0].trigger, ThoughtTrigger::EmotionalState);

        // the lonely rule is listed first and wins over thinking
        for _ in 0..10 {
            memory.update_relationship(-0.9);
        }
        let thought = scheduler.emotional_state(&mut memory, &mut rng).unwrap();
        assert!(THOUGHT_RULES[0].thoughts.contains(&thought.as_str()));
    }

    #[tokio::test]
    async fn test_contextual_opener_by_hour() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory_in(&dir).await;
        let mut rng = StdRng::seed_from_u64(2);

        let morning = ProactiveScheduler::contextual_opener(&memory, 8, &mut rng);
        assert!(["Good morning! ☀️", "Hope you slept well~"].contains(&morning.as_str()));

        let evening = ProactiveScheduler::contextual_opener(&memory, 21, &mut rng);
        assert!(["Good evening! 🌙", "How was your day?"].contains(&evening.as_str()));
    }
}
