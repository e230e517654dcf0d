//! Persona state machine: mood, time context and topic of the character,
//! recomputed once per conversational turn.

pub mod clock;
pub mod mood;
pub mod state;
pub mod style;
pub mod topic;

pub use clock::{Season, TimeOfDay, resolve_timezone, wall_clock};
pub use mood::{Mood, UnknownMood, classify_mood};
pub use state::{MOOD_DRIFT_PROBABILITY, MoodTransition, PersonaState, PromptFields};
pub use style::{PERSONA_DESCRIPTION, PERSONA_INTERESTS, PERSONA_RULE};
pub use topic::classify_topic;
