use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Timelike, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ai_provider::{generate_with_timeout, AIProviderClient, Generator};
use crate::config::Config;
use crate::core::{
    AutonomousThought, Mood, RelationshipStage, Result, SnapshotStore, Speaker, TrainingExample,
    TrainingLog, TurnMetadata,
};
use crate::memory::{MemoryReference, PendingSave, RelationshipMemory};
use crate::reply::{parse_reply, AvatarSignal};
use crate::sentiment::{RelationshipTrend, SentimentScorer};
use crate::transmission::ProactiveScheduler;

const CONTEXT_TURNS: usize = 5;
const RECENT_THOUGHTS: usize = 5;

/// State the prompt is conditioned on, captured under the memory lock
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    pub mood: Mood,
    pub relationship_stage: RelationshipStage,
    pub affection: f64,
    pub recent_history: String,
    pub memory_reference: Option<MemoryReference>,
}

/// What the companion is responding to
#[derive(Debug, Clone, Copy)]
pub enum PromptInput<'a> {
    User(&'a str),
    Directive(&'a str),
}

/// Full generation prompt: persona, output contract, state, then the input.
pub fn build_prompt(name: &str, ctx: &PromptContext, input: PromptInput<'_>) -> String {
    let mut prompt = format!(
        "You are {name}, an affectionate and playful AI companion. \
         Stay in character and never say you are an AI.\n\
         React to the user's tone: sweet makes you flirty or shy, mean makes you pouty or defensive, \
         casual makes you playful, serious makes you thoughtful.\n\
         Keep replies short and expressive, and use emojis naturally.\n\n\
         Always answer with valid JSON only:\n\
         {{\"reply\": \"<what {name} says>\", \
         \"expression\": \"<happy|angry|sad|neutral|thinking>\", \
         \"motion\": \"<smile|mouthOpenY|tiltHead|nodHead|blinkLeft>\"}}\n\n"
    );

    prompt.push_str(&format!(
        "Your current mood is {}. Your relationship with the user: {} (affection {:.0}).\n",
        ctx.mood, ctx.relationship_stage, ctx.affection
    ));

    if !ctx.recent_history.is_empty() {
        prompt.push_str(&format!("Recent conversation:\n{}\n", ctx.recent_history));
    }

    if let Some(reference) = &ctx.memory_reference {
        prompt.push_str(&format!(
            "You might mention that {} they told you: \"{}\".\n",
            reference.time_ago, reference.text
        ));
    }

    match input {
        PromptInput::User(message) => prompt.push_str(&format!("\nUser: {}\n", message)),
        PromptInput::Directive(directive) => prompt.push_str(&format!("\n{}\n", directive)),
    }
    prompt.push_str(&format!("{}:", name));

    prompt
}

/// Compact prompt stored in the training log
pub fn training_prompt(name: &str, ctx: &PromptContext, input: PromptInput<'_>) -> String {
    let (label, text) = match input {
        PromptInput::User(message) => ("User", message),
        PromptInput::Directive(directive) => ("Directive", directive),
    };
    format!(
        "Context: Mood={}, Relationship={}, Affection={}\nRecent: {}\n{}: {}\n{}:",
        ctx.mood, ctx.relationship_stage, ctx.affection, ctx.recent_history, label, text, name
    )
}

/// Read-only numbers for a stats panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsView {
    pub mood: Mood,
    pub relationship_stage: RelationshipStage,
    pub affection: f64,
    pub trust: f64,
    pub familiarity: f64,
    pub conversation_count: usize,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    pub avg_sentiment: f64,
    pub trend: RelationshipTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThoughtsView {
    pub current_thought: Option<String>,
    pub recent_autonomous_thoughts: Vec<AutonomousThought>,
}

/// A companion-initiated message and the directive that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct ProactiveMessage {
    pub directive: String,
    pub signal: AvatarSignal,
}

/// Wires the scorer, memory, scheduler and generator together.
///
/// The memory lock is never held across a generation call.
pub struct Companion {
    name: String,
    scorer: SentimentScorer,
    memory: Arc<Mutex<RelationshipMemory>>,
    scheduler: Mutex<ProactiveScheduler>,
    rng: Mutex<StdRng>,
    generator: Arc<dyn Generator>,
    training_log: TrainingLog,
    timeout: StdDuration,
}

impl Companion {
    pub async fn new(config: &Config, generator: Arc<dyn Generator>) -> Self {
        let store = SnapshotStore::new(config.memory_file());
        let memory = RelationshipMemory::load(store, config.persist).await;

        let mut scheduler = ProactiveScheduler::new(config.proactive.cooldown());
        if let Some(last_seen) = memory.last_seen() {
            scheduler.touch_interaction(last_seen);
        }

        Companion {
            name: config.companion_name.clone(),
            scorer: SentimentScorer::new(),
            memory: Arc::new(Mutex::new(memory)),
            scheduler: Mutex::new(scheduler),
            rng: Mutex::new(StdRng::from_entropy()),
            generator,
            training_log: TrainingLog::new(config.training_file()),
            timeout: config.provider.timeout(),
        }
    }

    /// Companion backed by the configured HTTP provider
    pub async fn from_config(config: &Config) -> Self {
        let client = AIProviderClient::new(config.provider.clone());
        Self::new(config, Arc::new(client)).await
    }

    /// Make the stochastic gates reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memory(&self) -> Arc<Mutex<RelationshipMemory>> {
        Arc::clone(&self.memory)
    }

    pub fn training_log(&self) -> &TrainingLog {
        &self.training_log
    }

    fn speaker_names(&self) -> [&str; 2] {
        [self.name.as_str(), "Companion"]
    }

    async fn prompt_context(
        &self,
        memory: &RelationshipMemory,
        surface_memory: bool,
        now: DateTime<Utc>,
    ) -> PromptContext {
        let memory_reference = if surface_memory {
            let mut rng = self.rng.lock().await;
            if memory.should_surface_memory(&mut *rng) {
                memory.pick_recent_memory(now, &mut *rng)
            } else {
                None
            }
        } else {
            None
        };

        PromptContext {
            mood: memory.mood(),
            relationship_stage: memory.relationship_stage(),
            affection: memory.metrics().affection,
            recent_history: memory.recent_context(CONTEXT_TURNS),
            memory_reference,
        }
    }

    /// Full inbound pipeline: score, update state, generate, record the reply.
    ///
    /// Backend failures yield an apology and leave no companion turn behind.
    pub async fn handle_user_message(&self, text: &str) -> AvatarSignal {
        let now = Utc::now();
        let emotion = self.scorer.analyze(text);
        debug!(
            sentiment = emotion.sentiment,
            dominant = %emotion.dominant_emotion,
            "Scored user message"
        );

        self.scheduler.lock().await.touch_interaction(now);

        let ctx = {
            let mut memory = self.memory.lock().await;
            // history and memory reference exclude the message being answered
            let mut ctx = self.prompt_context(&memory, true, now).await;

            memory.record_interaction(
                Speaker::User,
                text,
                TurnMetadata::scored(emotion.sentiment, emotion.dominant_emotion.as_str()),
            );
            ctx.mood = memory.update_mood(emotion.sentiment);
            memory.update_relationship(emotion.sentiment);
            ctx.relationship_stage = memory.relationship_stage();
            ctx.affection = memory.metrics().affection;
            ctx
        };

        let prompt = build_prompt(&self.name, &ctx, PromptInput::User(text));

        let signal = match generate_with_timeout(self.generator.as_ref(), &prompt, self.timeout).await {
            Ok(raw) => {
                let parsed = parse_reply(&raw, &self.speaker_names());
                debug!(confidence = parsed.confidence(), "Parsed generation output");
                let signal = parsed.into_signal();
                self.record_companion_turn(&signal).await;
                self.log_training(&training_prompt(&self.name, &ctx, PromptInput::User(text)), &signal).await;
                signal
            }
            Err(e) => {
                warn!("Generation failed: {}", e);
                AvatarSignal::apology()
            }
        };

        self.persist_opportunistically().await;
        signal
    }

    /// One poll of the proactive loop.
    pub async fn proactive_tick(&self) -> Option<ProactiveMessage> {
        self.proactive_tick_at(Utc::now()).await
    }

    pub async fn proactive_tick_at(&self, now: DateTime<Utc>) -> Option<ProactiveMessage> {
        let (directive, ctx, opener) = {
            let memory = self.memory.lock().await;
            let mut scheduler = self.scheduler.lock().await;
            let mut rng = self.rng.lock().await;

            if !scheduler.should_initiate(&memory, now, &mut *rng) {
                return None;
            }

            let directive = scheduler.build_directive(&memory, now, &mut *rng);
            let opener = ProactiveScheduler::contextual_opener(&memory, now.hour(), &mut *rng);
            drop(rng);

            let ctx = self.prompt_context(&memory, false, now).await;
            (directive, ctx, opener)
        };

        info!("Initiating a conversation");
        let prompt = build_prompt(&self.name, &ctx, PromptInput::Directive(&directive));

        let signal = match generate_with_timeout(self.generator.as_ref(), &prompt, self.timeout).await {
            Ok(raw) => {
                let signal = parse_reply(&raw, &self.speaker_names()).into_signal();
                self.log_training(&training_prompt(&self.name, &ctx, PromptInput::Directive(&directive)), &signal).await;
                signal
            }
            Err(e) => {
                warn!("Proactive generation failed, using opener: {}", e);
                AvatarSignal::new(opener, Some("happy".to_string()), None)
            }
        };

        self.record_companion_turn(&signal).await;
        self.persist_opportunistically().await;

        Some(ProactiveMessage { directive, signal })
    }

    /// Let the companion have an unprompted thought, if its state calls for one.
    pub async fn think(&self) -> Option<String> {
        let mut memory = self.memory.lock().await;
        let scheduler = self.scheduler.lock().await;
        let mut rng = self.rng.lock().await;
        let thought = scheduler.emotional_state(&mut memory, &mut *rng);
        if let Some(thought) = &thought {
            debug!(thought = %thought, "Autonomous thought");
        }
        thought
    }

    async fn record_companion_turn(&self, signal: &AvatarSignal) {
        let mut memory = self.memory.lock().await;
        memory.record_interaction(
            Speaker::Companion,
            &signal.reply,
            TurnMetadata::tagged([signal.expression.clone(), signal.motion.clone()]),
        );
    }

    async fn log_training(&self, prompt: &str, signal: &AvatarSignal) {
        let metadata = self.memory.lock().await.training_metadata();
        let completion = match serde_json::to_string(signal) {
            Ok(completion) => completion,
            Err(e) => {
                warn!("Could not serialize completion: {}", e);
                return;
            }
        };

        let example = TrainingExample {
            id: Uuid::new_v4(),
            prompt: prompt.to_string(),
            completion,
            metadata,
        };
        if let Err(e) = self.training_log.append(&example).await {
            warn!("Could not append training example: {}", e);
        }
    }

    /// Commit a snapshot outside the memory lock. A failed write only warns.
    async fn commit(&self, pending: PendingSave) -> Result<()> {
        let turns = pending.turns();
        let result = pending.commit().await;
        if result.is_err() {
            self.memory.lock().await.save_failed(turns);
        }
        result
    }

    async fn persist_opportunistically(&self) {
        let pending = self.memory.lock().await.due_save();
        if let Some(pending) = pending {
            if let Err(e) = self.commit(pending).await {
                warn!("Could not save companion memory, continuing in memory: {}", e);
            }
        }
    }

    /// Write any unsaved state now.
    pub async fn flush(&self) -> Result<()> {
        let pending = self.memory.lock().await.pending_save();
        self.commit(pending).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.memory.lock().await.reset().await
    }

    pub async fn stats(&self) -> StatsView {
        let memory = self.memory.lock().await;
        let snapshot = memory.personality_snapshot();

        StatsView {
            mood: snapshot.mood,
            relationship_stage: snapshot.relationship_stage,
            affection: snapshot.metrics.affection,
            trust: snapshot.metrics.trust,
            familiarity: snapshot.metrics.familiarity,
            conversation_count: snapshot.turn_count,
            last_seen: memory.last_seen(),
            last_updated: memory.last_updated(),
            avg_sentiment: snapshot.avg_sentiment,
            trend: SentimentScorer::relationship_trend(memory.history()),
        }
    }

    pub async fn thoughts(&self) -> ThoughtsView {
        let memory = self.memory.lock().await;
        let thoughts = memory.thoughts();

        ThoughtsView {
            current_thought: thoughts.last().map(|t| t.text.clone()),
            recent_autonomous_thoughts: thoughts[thoughts.len().saturating_sub(RECENT_THOUGHTS)..]
                .to_vec(),
        }
    }
}
