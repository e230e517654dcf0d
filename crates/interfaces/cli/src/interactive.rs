use std::io;
use std::io::Write;

use anyhow::Result;

use kabo_memory::TrimOutcome;
use kabo_runtime::AgentRuntime;

/// One line of input in the chat session.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SessionInput<'a> {
    Empty,
    Help,
    State,
    Clear,
    Trim,
    Exit,
    Unknown(&'a str),
    Message(&'a str),
}

pub(crate) fn parse_line(line: &str) -> SessionInput<'_> {
    let line = line.trim();
    match line {
        "" => SessionInput::Empty,
        "/help" => SessionInput::Help,
        "/state" => SessionInput::State,
        "/clear" => SessionInput::Clear,
        "/trim" => SessionInput::Trim,
        "/exit" | "/quit" => SessionInput::Exit,
        other if other.starts_with('/') => SessionInput::Unknown(other),
        message => SessionInput::Message(message),
    }
}

pub(crate) async fn run_interactive_line_session(runtime: &mut AgentRuntime) -> Result<()> {
    let name = runtime.config.persona.name.clone();
    println!("{name} is listening. Type /help for commands.");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        let bytes = stdin.read_line(&mut line)?;
        if bytes == 0 {
            println!("session closed");
            break;
        }

        match parse_line(&line) {
            SessionInput::Empty => continue,
            SessionInput::Exit => {
                println!("session closed");
                break;
            }
            SessionInput::Help => {
                println!("/help   -- this list");
                println!("/state  -- current mood, time context and topic");
                println!("/trim   -- summarize older conversation now");
                println!("/clear  -- forget the conversation history");
                println!("/exit");
            }
            SessionInput::State => print_state(runtime),
            SessionInput::Clear => {
                runtime.clear_history().await?;
                println!("conversation history cleared");
            }
            SessionInput::Trim => {
                let limit = runtime.config.memory.summary_limit;
                match runtime.trim_history(limit).await {
                    Ok(TrimOutcome::Summarized { folded, kept }) => {
                        println!("summarized {folded} turns, kept {kept}");
                    }
                    Ok(TrimOutcome::Untouched) => {
                        println!("history is within {limit} turns, nothing to trim");
                    }
                    Err(err) => eprintln!("trim failed: {err}"),
                }
            }
            SessionInput::Unknown(command) => {
                println!("unknown command {command}, try /help");
            }
            SessionInput::Message(message) => {
                let reply = runtime.get_response(message).await;
                println!("{name}: {reply}");
            }
        }
    }

    Ok(())
}

fn print_state(runtime: &AgentRuntime) {
    let fields = runtime.persona().prompt_fields();
    let stats = runtime.stats();
    println!("mood: {}", fields.mood);
    println!(
        "time: {}, season: {}, weekend: {}",
        fields.time_of_day, fields.season, fields.is_weekend
    );
    println!("topic: {}", fields.topic);
    println!(
        "memory: {} turns ({} summaries), {} episodes",
        stats.turns.exchange() + stats.turns.summary,
        stats.turns.summary,
        stats.episodes
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_and_messages() {
        assert_eq!(parse_line("   \n"), SessionInput::Empty);
        assert_eq!(parse_line("/help\n"), SessionInput::Help);
        assert_eq!(parse_line("/state"), SessionInput::State);
        assert_eq!(parse_line("/quit"), SessionInput::Exit);
        assert_eq!(parse_line("/dance"), SessionInput::Unknown("/dance"));
        assert_eq!(
            parse_line("  tell me something fun \n"),
            SessionInput::Message("tell me something fun")
        );
    }
}
