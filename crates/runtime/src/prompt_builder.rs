//! Prompt assembly for the main completion call.
//!
//! Kept separate from [`crate::AgentRuntime`] so the orchestration code only
//! gathers inputs while this module owns the prompt layout.

use kabo_memory::Turn;
use kabo_persona::{PERSONA_DESCRIPTION, PERSONA_INTERESTS, PERSONA_RULE, PersonaState};

pub const FACTS_HEADER: &str = "[Relevant Facts from Memory]";
pub const SUMMARY_LABEL: &str = "[Summary of older conversations]";

// ─── public entry point ──────────────────────────────────────────────────────

/// Everything the prompt needs, gathered before assembly.  Building the
/// prompt itself is synchronous and side-effect free.
pub struct PromptInputs<'a> {
    /// Speaker label for assistant turns and the reply cue.
    pub persona_name: &'a str,
    pub persona: &'a PersonaState,
    pub facts: &'a [String],
    pub history: &'a [Turn],
    pub user_input: &'a str,
    /// Soft reply length stated to the model.
    pub max_tokens: u32,
}

pub fn build_chat_prompt(inputs: &PromptInputs<'_>) -> String {
    let fields = inputs.persona.prompt_fields();
    let mood_style = inputs.persona.mood.description();
    let interests = build_interests_block();
    let facts = build_facts_block(inputs.facts);
    let facts_section = if facts.is_empty() {
        String::new()
    } else {
        format!("{facts}\n\n")
    };
    let conversation = build_history_block(inputs.history, inputs.persona_name);

    format!(
        "{PERSONA_DESCRIPTION}\n\n\
         Mood: {mood}\n{mood_style}\n\n\
         Time: {tod}, Season: {season}, Weekend: {weekend}\n\
         Topic: {topic}\n\n\
         Hobbies & interests (as reflections of her personality):\n{interests}\n\n\
         {PERSONA_RULE} Keep the answer under {max_tokens} tokens.\n\n\
         {facts_section}\
         Conversation so far:\n{conversation}\n\n\
         User: {input}\n\
         {name}:",
        mood = fields.mood,
        tod = fields.time_of_day,
        season = fields.season,
        weekend = fields.is_weekend,
        topic = fields.topic,
        max_tokens = inputs.max_tokens,
        input = inputs.user_input,
        name = inputs.persona_name,
    )
}

// ─── block builders ──────────────────────────────────────────────────────────

/// Retrieved episode summaries under [`FACTS_HEADER`].  Empty results (or
/// only blank ones) give an empty block with no header.
pub fn build_facts_block(facts: &[String]) -> String {
    let lines: Vec<&str> = facts
        .iter()
        .map(|fact| fact.trim())
        .filter(|fact| !fact.is_empty())
        .collect();
    if lines.is_empty() {
        return String::new();
    }
    format!("{FACTS_HEADER}\n{}", lines.join("\n"))
}

pub fn build_history_block(history: &[Turn], persona_name: &str) -> String {
    if history.is_empty() {
        return "(nothing yet)".to_string();
    }
    history
        .iter()
        .map(|turn| match turn {
            Turn::Human(text) => format!("User: {text}"),
            Turn::Assistant(text) => format!("{persona_name}: {text}"),
            Turn::Summary(text) => format!("{SUMMARY_LABEL}\n{text}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_interests_block() -> String {
    PERSONA_INTERESTS
        .iter()
        .map(|interest| format!("- {interest}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ─── tests ───────────────────────────────────────────────────────────────────
