use chrono::{Datelike, NaiveDateTime, Timelike};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Season, TimeOfDay, is_weekend};
use crate::mood::{Mood, classify_mood};
use crate::topic::classify_topic;

/// Chance per turn that the mood drifts when no trigger phrase matched.
pub const MOOD_DRIFT_PROBABILITY: f64 = 0.1;

/// The persona's mutable context.  Owned by one orchestrator and updated
/// once per turn before the prompt is built; never rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaState {
    pub mood: Mood,
    pub time_of_day: TimeOfDay,
    pub season: Season,
    pub is_weekend: bool,
    /// Empty until the first update.
    pub topic: String,
}

/// What the mood classifier did on the last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoodTransition {
    Triggered(Mood),
    Drifted(Mood),
    Unchanged,
}

/// Persona fields rendered the way the prompt shows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptFields {
    pub mood: &'static str,
    pub time_of_day: &'static str,
    pub season: &'static str,
    pub is_weekend: &'static str,
    pub topic: String,
}

impl Default for PersonaState {
    fn default() -> Self {
        Self {
            mood: Mood::Neutral,
            time_of_day: TimeOfDay::Morning,
            season: Season::Winter,
            is_weekend: false,
            topic: String::new(),
        }
    }
}

impl PersonaState {
    /// Neutral mood, no topic, clock fields taken from `now`.
    pub fn new(now: &NaiveDateTime) -> Self {
        let mut state = Self::default();
        state.update_clock(now);
        state
    }

    /// Recompute every field for one turn: clock, then mood, then topic.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        input: &str,
        now: &NaiveDateTime,
        rng: &mut R,
    ) -> MoodTransition {
        self.update_clock(now);
        let transition = self.update_mood(input, rng);
        self.update_topic(input);
        debug!(
            mood = %self.mood,
            time_of_day = %self.time_of_day,
            season = %self.season,
            is_weekend = self.is_weekend,
            topic = %self.topic,
            ?transition,
            "persona state updated"
        );
        transition
    }

    pub fn update_clock(&mut self, now: &NaiveDateTime) {
        self.time_of_day = TimeOfDay::from_hour(now.hour());
        self.season = Season::from_month(now.month());
        self.is_weekend = is_weekend(now.weekday());
    }

    pub fn update_mood<R: Rng + ?Sized>(&mut self, input: &str, rng: &mut R) -> MoodTransition {
        if let Some(mood) = classify_mood(input) {
            self.mood = mood;
            return MoodTransition::Triggered(mood);
        }

        if rng.gen_bool(MOOD_DRIFT_PROBABILITY) {
            if let Some(mood) = Mood::ALL.choose(rng) {
                self.mood = *mood;
                return MoodTransition::Drifted(*mood);
            }
        }
        MoodTransition::Unchanged
    }

    pub fn update_topic(&mut self, input: &str) {
        self.topic = classify_topic(input).to_string();
    }

    pub fn prompt_fields(&self) -> PromptFields {
        PromptFields {
            mood: self.mood.label(),
            time_of_day: self.time_of_day.label(),
            season: self.season.label(),
            is_weekend: if self.is_weekend { "yes" } else { "no" },
            topic: if self.topic.is_empty() {
                "none".to_string()
            } else {
                self.topic.clone()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap()
    }

    #[test]
    fn new_state_is_neutral_without_topic() {
        let state = PersonaState::new(&at(2025, 1, 8, 14));
        assert_eq!(state.mood, Mood::Neutral);
        assert_eq!(state.time_of_day, TimeOfDay::Afternoon);
        assert_eq!(state.season, Season::Winter);
        assert!(!state.is_weekend);
        assert!(state.topic.is_empty());
        assert_eq!(state.prompt_fields().topic, "none");
    }

    #[test]
    fn update_derives_clock_fields() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = PersonaState::default();
        // 2024-06-15 is a Saturday.
        state.update("tell me something fun", &at(2024, 6, 15, 19), &mut rng);
        assert_eq!(state.time_of_day, TimeOfDay::Evening);
        assert_eq!(state.season, Season::Summer);
        assert!(state.is_weekend);

        // 2024-11-03 is a Sunday, 2025-01-08 a Wednesday.
        state.update("hi", &at(2024, 11, 3, 4), &mut rng);
        assert_eq!(state.time_of_day, TimeOfDay::Night);
        assert_eq!(state.season, Season::Autumn);
        assert!(state.is_weekend);
        state.update("hi", &at(2025, 1, 8, 8), &mut rng);
        assert_eq!(state.time_of_day, TimeOfDay::Morning);
        assert!(!state.is_weekend);
    }

    #[test]
    fn trigger_sets_mood_and_topic() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = PersonaState::default();
        let transition = state.update("Tell me something fun about music", &at(2025, 1, 8, 9), &mut rng);
        assert_eq!(transition, MoodTransition::Triggered(Mood::Happy));
        assert_eq!(state.mood, Mood::Happy);
        assert_eq!(state.topic, "music");

        let fields = state.prompt_fields();
        assert_eq!(fields.mood, "happy");
        assert_eq!(fields.is_weekend, "no");
        assert_eq!(fields.time_of_day, "morning");
    }

    #[test]
    fn trigger_is_deterministic_across_rng_states() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut state = PersonaState::default();
            state.update_mood("you seem off today", &mut rng);
            assert_eq!(state.mood, Mood::Moody);
        }
    }

    #[test]
    fn drift_happens_about_ten_percent_of_the_time() {
        let mut rng = StdRng::seed_from_u64(0x6b61_626f);
        let trials = 20_000;
        let mut drifted = 0usize;
        let mut changed = 0usize;
        let mut state = PersonaState::default();
        for _ in 0..trials {
            let before = state.mood;
            match state.update_mood("what did you eat today", &mut rng) {
                MoodTransition::Drifted(_) => drifted += 1,
                MoodTransition::Unchanged => assert_eq!(state.mood, before),
                MoodTransition::Triggered(_) => panic!("no trigger phrase in input"),
            }
            if state.mood != before {
                changed += 1;
            }
        }
        let drift_rate = drifted as f64 / trials as f64;
        assert!(
            (0.085..=0.115).contains(&drift_rate),
            "drift rate {drift_rate} outside expected band"
        );
        assert!(changed <= drifted);
    }

    #[test]
    fn topic_is_recomputed_every_turn() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = PersonaState::default();
        state.update("I had a dream", &at(2025, 3, 1, 12), &mut rng);
        assert_eq!(state.topic, "dreams");
        state.update("nothing much", &at(2025, 3, 1, 12), &mut rng);
        assert_eq!(state.topic, "general");
    }
}
