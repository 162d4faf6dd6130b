use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EXPRESSION: &str = "neutral";
pub const DEFAULT_MOTION: &str = "idle";

/// What the avatar layer receives for each completed turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarSignal {
    pub reply: String,
    pub expression: String,
    pub motion: String,
}

impl AvatarSignal {
    pub fn new(reply: impl Into<String>, expression: Option<String>, motion: Option<String>) -> Self {
        AvatarSignal {
            reply: reply.into(),
            expression: expression
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_EXPRESSION.to_string()),
            motion: motion
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MOTION.to_string()),
        }
    }

    /// Reply used when the backend is unreachable or too slow
    pub fn apology() -> Self {
        AvatarSignal {
            reply: "Sorry, I got a little lost in my thoughts... could you say that again? 🥺".to_string(),
            expression: "sad".to_string(),
            motion: "tiltHead".to_string(),
        }
    }

    /// Reply used when nothing usable could be recovered from the output
    pub fn confused() -> Self {
        AvatarSignal {
            reply: "Hmm... I'm not sure what to say to that~".to_string(),
            expression: "thinking".to_string(),
            motion: "tiltHead".to_string(),
        }
    }
}

/// Generation output together with how confidently it was understood
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    /// Well-formed JSON or inline `[exp:..]` / `[motion:..]` tags
    Structured(AvatarSignal),
    /// Reply text salvaged by a heuristic
    PartiallyRecovered(AvatarSignal),
    /// Nothing usable; canned reply
    Fallback(AvatarSignal),
}

impl ParsedReply {
    pub fn signal(&self) -> &AvatarSignal {
        match self {
            ParsedReply::Structured(s)
            | ParsedReply::PartiallyRecovered(s)
            | ParsedReply::Fallback(s) => s,
        }
    }

    pub fn into_signal(self) -> AvatarSignal {
        match self {
            ParsedReply::Structured(s)
            | ParsedReply::PartiallyRecovered(s)
            | ParsedReply::Fallback(s) => s,
        }
    }

    pub fn confidence(&self) -> &'static str {
        match self {
            ParsedReply::Structured(_) => "structured",
            ParsedReply::PartiallyRecovered(_) => "partially_recovered",
            ParsedReply::Fallback(_) => "fallback",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawReply {
    reply: Option<String>,
    expression: Option<String>,
    motion: Option<String>,
}

fn field_regex(field: &'static str, cell: &'static OnceLock<Regex>) -> &'static Regex {
    cell.get_or_init(|| {
        // closing quote optional so truncated output still yields the text
        let pattern = format!(r#""{}"\s*:\s*"((?:[^"\\]|\\.)*)"?"#, field);
        Regex::new(&pattern).expect("static field pattern")
    })
}

fn reply_field() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    field_regex("reply", &CELL)
}

fn expression_field() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    field_regex("expression", &CELL)
}

fn motion_field() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    field_regex("motion", &CELL)
}

fn exp_tag() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"\[exp:(.*?)\]").expect("static tag pattern"))
}

fn motion_tag() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"\[motion:(.*?)\]").expect("static tag pattern"))
}

fn sentence_end() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"^(.+?[.!?…~])(?:\s|$)").expect("static sentence pattern"))
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Undo JSON string escaping; keep the raw text if it isn't valid.
fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

fn strip_tags(text: &str) -> String {
    let without_exp = exp_tag().replace_all(text, "");
    motion_tag().replace_all(&without_exp, "").trim().to_string()
}

/// Expression and motion found anywhere in the output
fn loose_signals(raw: &str) -> (Option<String>, Option<String>) {
    let expression = capture(expression_field(), raw).or_else(|| capture(exp_tag(), raw));
    let motion = capture(motion_field(), raw).or_else(|| capture(motion_tag(), raw));
    (expression, motion)
}

fn parse_json(raw: &str) -> Option<AvatarSignal> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }

    let parsed: RawReply = serde_json::from_str(&raw[start..=end]).ok()?;
    let reply = parsed.reply.map(|r| r.trim().to_string()).filter(|r| !r.is_empty())?;
    Some(AvatarSignal::new(reply, parsed.expression, parsed.motion))
}

fn parse_tags(raw: &str) -> Option<AvatarSignal> {
    let expression = capture(exp_tag(), raw);
    let motion = capture(motion_tag(), raw);
    if expression.is_none() && motion.is_none() {
        return None;
    }

    let reply = strip_tags(raw);
    if reply.is_empty() || reply.contains('{') {
        return None;
    }
    Some(AvatarSignal::new(reply, expression, motion))
}

fn parse_fields(raw: &str) -> Option<AvatarSignal> {
    let reply = capture(reply_field(), raw).map(|r| unescape(&r))?;
    let (expression, motion) = loose_signals(raw);
    Some(AvatarSignal::new(reply, expression, motion))
}

fn parse_dialogue_line(raw: &str, speaker_names: &[&str]) -> Option<AvatarSignal> {
    let names = speaker_names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    let re = Regex::new(&format!(r"(?m)\b(?:{})\s*:\s*(.+)$", names)).ok()?;

    let line = capture(&re, raw)?;
    let reply = strip_tags(line.trim_matches('"'));
    if reply.is_empty() {
        return None;
    }

    let (expression, motion) = loose_signals(raw);
    Some(AvatarSignal::new(reply, expression, motion))
}

fn parse_first_sentence(raw: &str) -> Option<AvatarSignal> {
    // JSON that got this far carried no reply text
    if raw.trim_start().starts_with('{') {
        return None;
    }

    let cleaned: String = strip_tags(raw)
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '"'))
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return None;
    }

    let sentence = capture(sentence_end(), &cleaned).unwrap_or(cleaned);
    let (expression, motion) = loose_signals(raw);
    Some(AvatarSignal::new(sentence, expression, motion))
}

/// Interpret raw generation output, trying each layer only when the previous
/// one yields no reply text.
///
/// `speaker_names` are the labels the model may prefix its dialogue with.
pub fn parse_reply(raw: &str, speaker_names: &[&str]) -> ParsedReply {
    if let Some(signal) = parse_json(raw).or_else(|| parse_tags(raw)) {
        return ParsedReply::Structured(signal);
    }

    let recovered = parse_fields(raw)
        .or_else(|| parse_dialogue_line(raw, speaker_names))
        .or_else(|| parse_first_sentence(raw));

    match recovered {
        Some(signal) => ParsedReply::PartiallyRecovered(signal),
        None => ParsedReply::Fallback(AvatarSignal::confused()),
    }
}
