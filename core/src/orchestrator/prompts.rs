//! Fixed prompt texts

use super::debate::DebateRole;

pub const TITLE_SYSTEM_PROMPT: &str = "You are an assistant that analyzes the contents of an email \
     and creates a short but meaningful email title.";

pub const NEWS_SYSTEM_PROMPT: &str =
    "You are a helpful assistant who helps to find the latest news for a given topic.";

pub const OPENING_CLAUSE: &str =
    "Your opponent hasn't given an opinion yet. You start the discussion.";

pub const DEFAULT_TONE: &str = "official";

/// Tones offered by the playground
pub const TONES: [&str; 4] = ["angry", "ironic", "official", "sad"];

pub fn debate_system_prompt(max_words: usize) -> String {
    format!(
        "This is a game of debate club.\n\
         You will receive a topic and debate it against another chatbot.\n\
         You will be presented with the arguments from another chatbot and respond with yours.\n\
         Response max {max_words} words.\n\
         Use informal tone."
    )
}

/// User message for one debate turn; an empty `opponent` means this side opens
pub fn debate_turn_prompt(topic: &str, role: DebateRole, opponent: &str) -> String {
    let clause = if opponent.is_empty() {
        OPENING_CLAUSE.to_string()
    } else {
        format!("Your opponent statement is: {opponent}")
    };
    format!(
        "The topic is: {topic}. Your role is the {} of this topic. {clause}",
        role.as_str()
    )
}

pub fn tone_system_prompt(tone: &str) -> String {
    format!("You are a helpful assistant. Use {tone} tone in your responses. Respond in Markdown.")
}
