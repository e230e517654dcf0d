pub mod prompt_builder;
mod runtime;

pub use runtime::{AgentRuntime, FALLBACK_REPLY, TurnPhase, build_completion, build_embedder};
