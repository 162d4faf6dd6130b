use colored::*;

use crate::core::{Mood, RelationshipStage};
use crate::persona::{StatsView, ThoughtsView};
use crate::reply::AvatarSignal;
use crate::sentiment::RelationshipTrend;

fn mood_label(mood: Mood) -> ColoredString {
    match mood {
        Mood::Happy | Mood::Excited => mood.as_str().green(),
        Mood::Content => mood.as_str().cyan(),
        Mood::Sad | Mood::Lonely => mood.as_str().blue(),
        Mood::Frustrated => mood.as_str().red(),
        Mood::Neutral | Mood::Thinking => mood.as_str().normal(),
    }
}

fn stage_label(stage: RelationshipStage) -> ColoredString {
    let label = stage.to_string();
    match stage {
        RelationshipStage::Close => label.magenta().bold(),
        RelationshipStage::Friend => label.green(),
        RelationshipStage::Acquaintance => label.cyan(),
        RelationshipStage::Stranger => label.normal(),
    }
}

fn trend_label(trend: RelationshipTrend) -> ColoredString {
    let label = trend.to_string();
    match trend {
        RelationshipTrend::Improving => label.green(),
        RelationshipTrend::Declining => label.red(),
        RelationshipTrend::Stable | RelationshipTrend::New => label.normal(),
    }
}

pub fn render_stats(name: &str, stats: &StatsView) -> String {
    let mut out = format!("{}\n", format!("{} Status", name).cyan().bold());
    out.push_str(&format!("Mood: {}\n", mood_label(stats.mood)));
    out.push_str(&format!("Relationship: {}\n", stage_label(stats.relationship_stage)));
    out.push_str(&format!("Affection: {:.1}\n", stats.affection));
    out.push_str(&format!("Trust: {:.1}\n", stats.trust));
    out.push_str(&format!("Familiarity: {:.1}\n", stats.familiarity));
    out.push_str(&format!("Conversations: {}\n", stats.conversation_count));
    out.push_str(&format!("Average sentiment: {:+.2}\n", stats.avg_sentiment));
    out.push_str(&format!("Trend: {}\n", trend_label(stats.trend)));
    match stats.last_seen {
        Some(ts) => out.push_str(&format!("Last seen: {}\n", ts.format("%Y-%m-%d %H:%M UTC"))),
        None => out.push_str(&format!("Last seen: {}\n", "never".dimmed())),
    }
    out.push_str(&format!("Last saved: {}\n", stats.last_updated.format("%Y-%m-%d %H:%M UTC")));
    out
}

pub fn render_thoughts(name: &str, thoughts: &ThoughtsView) -> String {
    let mut out = format!("{}\n", format!("{}'s Thoughts", name).cyan().bold());

    match &thoughts.current_thought {
        Some(thought) => out.push_str(&format!("💭 {}\n", thought.italic())),
        None => out.push_str(&format!("{}\n", "Nothing on their mind right now.".dimmed())),
    }

    if !thoughts.recent_autonomous_thoughts.is_empty() {
        out.push_str(&format!("\n{}\n", "Recent".cyan()));
        for thought in &thoughts.recent_autonomous_thoughts {
            out.push_str(&format!(
                "  {} [{}] {}\n",
                thought.timestamp.format("%m-%d %H:%M"),
                thought.mood_at_time,
                thought.text
            ));
        }
    }
    out
}

/// One chat line with the avatar cues in brackets
pub fn render_reply(name: &str, signal: &AvatarSignal) -> String {
    format!(
        "{}: {} {}",
        name.magenta().bold(),
        signal.reply,
        format!("[{} / {}]", signal.expression, signal.motion).dimmed()
    )
}
