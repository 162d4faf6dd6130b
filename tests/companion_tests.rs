use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aicompanion::ai_provider::Generator;
use aicompanion::config::Config;
use aicompanion::core::{CompanionError, Mood, RelationshipStage, Result, Speaker};
use aicompanion::{AvatarSignal, Companion};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tempfile::TempDir;

/// Replays canned outputs in order and remembers every prompt it saw.
struct Scripted {
    outputs: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(outputs: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Scripted {
            outputs: Mutex::new(outputs.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn replying(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for Scripted {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompanionError::Generation("script exhausted".to_string())))
    }
}

struct Hanging;

#[async_trait]
impl Generator for Hanging {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("{\"reply\": \"too late\"}".to_string())
    }
}

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config {
        data_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    config.provider.timeout_secs = 1;
    config
}

#[tokio::test]
async fn test_affectionate_message_updates_state() {
    let dir = TempDir::new().unwrap();
    let generator = Scripted::replying(&[
        r#"{"reply": "Ehh?! You're making me blush 😳💕", "expression": "happy", "motion": "smile"}"#,
    ]);
    let companion = Companion::new(&test_config(&dir), generator.clone()).await;

    let signal = companion.handle_user_message("I love you, you're amazing").await;
    assert_eq!(signal.reply, "Ehh?! You're making me blush 😳💕");
    assert_eq!(signal.expression, "happy");
    assert_eq!(signal.motion, "smile");

    let memory = companion.memory();
    let memory = memory.lock().await;
    let history = memory.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].speaker, Speaker::User);
    assert!(history[0].sentiment.unwrap() > 0.6);
    assert!(history[0].emotion_tags.contains("affection"));
    assert_eq!(history[1].speaker, Speaker::Companion);
    assert!(history[1].emotion_tags.contains("happy"));

    assert_eq!(memory.mood(), Mood::Happy);
    assert_eq!(memory.metrics().affection, 2.0);
    assert_eq!(memory.metrics().trust, 1.0);
    assert_eq!(memory.metrics().familiarity, 0.5);

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Your current mood is happy"));
    assert!(prompts[0].ends_with("User: I love you, you're amazing\nAnnie:"));
}

#[tokio::test]
async fn test_training_log_records_completed_turns() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let generator = Scripted::replying(&[r#"{"reply": "Hi there!", "expression": "happy"}"#]);
    let companion = Companion::new(&config, generator).await;

    companion.handle_user_message("hello").await;

    let examples = companion.training_log().read_all().await.unwrap();
    assert_eq!(examples.len(), 1);
    assert!(examples[0].prompt.starts_with("Context: Mood=neutral, Relationship=stranger"));
    assert!(examples[0].prompt.ends_with("User: hello\nAnnie:"));

    let completion: AvatarSignal = serde_json::from_str(&examples[0].completion).unwrap();
    assert_eq!(completion.reply, "Hi there!");
    assert_eq!(completion.motion, "idle");
}

#[tokio::test]
async fn test_timeout_returns_apology_without_companion_turn() {
    let dir = TempDir::new().unwrap();
    let companion = Companion::new(&test_config(&dir), Arc::new(Hanging)).await;

    let signal = companion.handle_user_message("are you there?").await;
    assert_eq!(signal, AvatarSignal::apology());

    let memory = companion.memory();
    let memory = memory.lock().await;
    assert_eq!(memory.history().len(), 1);
    assert_eq!(memory.history()[0].speaker, Speaker::User);
    drop(memory);

    assert!(companion.training_log().read_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_backend_error_returns_apology() {
    let dir = TempDir::new().unwrap();
    let generator = Scripted::new(vec![Err(CompanionError::Generation("connection refused".to_string()))]);
    let companion = Companion::new(&test_config(&dir), generator).await;

    let signal = companion.handle_user_message("hi").await;
    assert_eq!(signal.expression, "sad");
    assert_eq!(signal.motion, "tiltHead");
}

#[tokio::test]
async fn test_malformed_output_is_recovered() {
    let dir = TempDir::new().unwrap();
    let generator = Scripted::replying(&["The character responds warmly.\nAnnie: I'm glad you asked"]);
    let companion = Companion::new(&test_config(&dir), generator).await;

    let signal = companion.handle_user_message("what do you like?").await;
    assert_eq!(signal.reply, "I'm glad you asked");
    assert_eq!(signal.expression, "neutral");
}

#[tokio::test]
async fn test_hostile_messages_lower_affection() {
    let dir = TempDir::new().unwrap();
    let generator = Scripted::replying(&[r#"{"reply": "Hmph!", "expression": "angry"}"#]);
    let companion = Companion::new(&test_config(&dir), generator).await;

    companion.handle_user_message("you are so annoying and boring").await;

    let stats = companion.stats().await;
    assert_eq!(stats.affection, -3.0);
    assert_eq!(stats.trust, -2.0);
    assert!(matches!(stats.mood, Mood::Sad | Mood::Frustrated));
    assert_eq!(stats.relationship_stage, RelationshipStage::Stranger);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let before = {
        let generator = Scripted::replying(&[
            r#"{"reply": "Yay!"}"#,
            r#"{"reply": "Aww, thank you!"}"#,
        ]);
        let companion = Companion::new(&config, generator).await;
        companion.handle_user_message("I love you").await;
        companion.handle_user_message("you're wonderful and sweet").await;
        companion.flush().await.unwrap();
        companion.stats().await
    };

    let companion = Companion::new(&config, Scripted::replying(&[])).await;
    let after = companion.stats().await;
    assert_eq!(after.conversation_count, 4);
    assert_eq!(after.affection, before.affection);
    assert_eq!(after.trust, before.trust);
    assert_eq!(after.familiarity, before.familiarity);
    assert_eq!(after.mood, before.mood);
    assert_eq!(after.last_updated, before.last_updated);
}

#[tokio::test]
async fn test_write_behind_saves_every_few_turns() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.persist.save_every = 4;

    let generator = Scripted::replying(&[r#"{"reply": "one"}"#, r#"{"reply": "two"}"#]);
    let companion = Companion::new(&config, generator).await;

    companion.handle_user_message("first").await;
    assert_eq!(companion.memory().lock().await.dirty_turns(), 2);

    companion.handle_user_message("second").await;
    assert_eq!(companion.memory().lock().await.dirty_turns(), 0);

    let reloaded = Companion::new(&config, Scripted::replying(&[])).await;
    assert_eq!(reloaded.stats().await.conversation_count, 4);
}

#[tokio::test]
async fn test_proactive_fires_once_then_cools_down() {
    let dir = TempDir::new().unwrap();
    let generator = Scripted::replying(&[r#"{"reply": "Hey, I missed you!", "expression": "happy"}"#]);
    let companion = Companion::new(&test_config(&dir), generator.clone())
        .await
        .with_seed(7);

    let later = Utc::now() + ChronoDuration::hours(7);
    let mut fired = None;
    for _ in 0..200 {
        if let Some(message) = companion.proactive_tick_at(later).await {
            fired = Some(message);
            break;
        }
    }

    let message = fired.expect("initiation chance is at least 0.3 after seven idle hours");
    assert_eq!(message.signal.reply, "Hey, I missed you!");
    assert!(message.directive.starts_with("You want to initiate a conversation."));
    assert!(generator.prompts()[0].contains(&message.directive));

    let examples = companion.training_log().read_all().await.unwrap();
    assert_eq!(examples.len(), 1);
    assert!(examples[0].prompt.contains("\nDirective: You want to initiate a conversation."));
    assert!(!examples[0].prompt.contains("User: You want"));

    let memory = companion.memory();
    let history_len = {
        let memory = memory.lock().await;
        assert_eq!(memory.history().last().unwrap().speaker, Speaker::Companion);
        memory.history().len()
    };
    assert_eq!(history_len, 1);

    for _ in 0..50 {
        assert!(companion.proactive_tick_at(later + ChronoDuration::minutes(30)).await.is_none());
    }
}

#[tokio::test]
async fn test_proactive_uses_opener_when_backend_fails() {
    let dir = TempDir::new().unwrap();
    let companion = Companion::new(&test_config(&dir), Scripted::replying(&[]))
        .await
        .with_seed(11);

    let later = Utc::now() + ChronoDuration::hours(7);
    let mut fired = None;
    for _ in 0..200 {
        if let Some(message) = companion.proactive_tick_at(later).await {
            fired = Some(message);
            break;
        }
    }

    let message = fired.expect("initiation chance is at least 0.3 after seven idle hours");
    assert!(!message.signal.reply.is_empty());
    assert_ne!(message.signal, AvatarSignal::apology());
    assert_eq!(companion.stats().await.conversation_count, 1);
}

#[tokio::test]
async fn test_thoughts_follow_mood() {
    let dir = TempDir::new().unwrap();
    let companion = Companion::new(&test_config(&dir), Scripted::replying(&[])).await;

    assert!(companion.think().await.is_none());
    assert!(companion.thoughts().await.current_thought.is_none());

    companion.memory().lock().await.set_mood(Mood::Lonely);
    let thought = companion.think().await.expect("lonely companions always have a thought");

    let view = companion.thoughts().await;
    assert_eq!(view.current_thought.as_deref(), Some(thought.as_str()));
    assert_eq!(view.recent_autonomous_thoughts.len(), 1);
}

#[tokio::test]
async fn test_reset_forgets_everything() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let generator = Scripted::replying(&[r#"{"reply": "Yay!"}"#]);
    let companion = Companion::new(&config, generator).await;

    companion.handle_user_message("I love you").await;
    companion.reset().await.unwrap();

    let stats = companion.stats().await;
    assert_eq!(stats.conversation_count, 0);
    assert_eq!(stats.affection, 0.0);
    assert_eq!(stats.mood, Mood::Neutral);

    let reloaded = Companion::new(&config, Scripted::replying(&[])).await;
    assert_eq!(reloaded.stats().await.conversation_count, 0);
}

#[tokio::test]
async fn test_unwritable_data_dir_still_replies() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let mut config = test_config(&dir);
    config.data_dir = blocker;
    config.persist.save_every = 1;

    let generator = Scripted::replying(&[r#"{"reply": "Still here!"}"#]);
    let companion = Companion::new(&config, generator).await;

    let signal = companion.handle_user_message("hello?").await;
    assert_eq!(signal.reply, "Still here!");

    let memory = companion.memory();
    let memory = memory.lock().await;
    assert_eq!(memory.history().len(), 2);
    assert_eq!(memory.dirty_turns(), 2);
    drop(memory);

    assert!(companion.flush().await.is_err());
    assert_eq!(companion.memory().lock().await.dirty_turns(), 2);
}

#[tokio::test]
async fn test_flush_is_not_undone_by_an_older_snapshot() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let generator = Scripted::replying(&[r#"{"reply": "one"}"#, r#"{"reply": "two"}"#]);
    let companion = Companion::new(&config, generator).await;

    companion.handle_user_message("first").await;
    let older = companion.memory().lock().await.pending_save();
    companion.handle_user_message("second").await;
    companion.flush().await.unwrap();
    older.commit().await.unwrap();

    let reloaded = Companion::new(&config, Scripted::replying(&[])).await;
    assert_eq!(reloaded.stats().await.conversation_count, 4);
}
