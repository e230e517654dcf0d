use std::io;
use std::io::IsTerminal;
use std::io::Write;

use anyhow::{Result, bail};

use kabo_memory::snapshot::read_json_records;
use kabo_memory::{ConversationMemory, EpisodeRecord, MemoryPaths, TrimOutcome, Turn, VectorIndex};
use kabo_runtime::AgentRuntime;

/// Characters shown per line when listing turns and episodes.
const PREVIEW_CHARS: usize = 160;

pub(crate) fn run_memory_stats(paths: &MemoryPaths) -> Result<()> {
    let conversation = ConversationMemory::open(&paths.conversation)?;
    let counts = conversation.counts();
    let episodes = read_json_records::<EpisodeRecord>(&paths.episodes)?.unwrap_or_default();
    let index = VectorIndex::load(&paths.vector_index)?;

    println!("── memory stats ─────────────────────────────────────");
    println!("  directory:    {}", paths.root.display());
    println!("  turns:        {}", conversation.len());
    println!("    human:      {}", counts.human);
    println!("    assistant:  {}", counts.assistant);
    println!("    summary:    {}", counts.summary);
    println!("  episodes:     {}", episodes.len());

    println!();
    println!("── vector index ─────────────────────────────────────");
    match index {
        Some(index) => {
            println!("  entries:      {}", index.len());
            println!(
                "  dimension:    {}",
                index
                    .dimension()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "(empty)".to_string())
            );
            if index.len() != episodes.len() {
                println!("  status:       out of step, rebuilt on next chat");
            }
        }
        None => println!("  (not created yet)"),
    }
    Ok(())
}

pub(crate) fn run_memory_history(paths: &MemoryPaths, persona_name: &str, limit: usize) -> Result<()> {
    let conversation = ConversationMemory::open(&paths.conversation)?;
    if conversation.is_empty() {
        println!("(no conversation history)");
        return Ok(());
    }
    for turn in conversation.recent(limit) {
        println!("{}", format_turn(turn, persona_name));
    }
    Ok(())
}

pub(crate) fn run_memory_episodes(paths: &MemoryPaths, limit: usize) -> Result<()> {
    let episodes = read_json_records::<EpisodeRecord>(&paths.episodes)?.unwrap_or_default();
    if episodes.is_empty() {
        println!("(no archived episodes)");
        return Ok(());
    }
    let start = episodes.len().saturating_sub(limit);
    for (idx, episode) in episodes.iter().enumerate().skip(start) {
        println!("{}", format_episode(idx + 1, episode));
    }
    Ok(())
}

pub(crate) async fn run_memory_search(runtime: &AgentRuntime, query: &str, k: usize) -> Result<()> {
    let hits = runtime.search_episodes(query, k).await?;
    if hits.is_empty() {
        println!("(no matching episodes)");
        return Ok(());
    }
    for (rank, summary) in hits.iter().enumerate() {
        println!("{}. {}", rank + 1, preview(summary));
    }
    Ok(())
}

pub(crate) async fn run_memory_trim(runtime: &mut AgentRuntime, threshold: usize) -> Result<()> {
    match runtime.trim_history(threshold).await? {
        TrimOutcome::Summarized { folded, kept } => {
            println!("history trimmed: {folded} turns summarized, {kept} kept");
        }
        TrimOutcome::Untouched => {
            println!("history is within {threshold} turns, nothing to trim");
        }
    }
    Ok(())
}

pub(crate) async fn run_memory_clear(paths: &MemoryPaths, yes: bool) -> Result<()> {
    let mut conversation = ConversationMemory::open(&paths.conversation)?;

    println!("⚠️  destructive operation: clear conversation history");
    println!("- turns: {}", conversation.len());
    println!("- archived episodes are kept");

    if conversation.is_empty() {
        println!("conversation history is already empty");
        return Ok(());
    }

    if !yes {
        if !io::stdin().is_terminal() {
            bail!("refusing to clear history in non-interactive mode without --yes");
        }

        print!("This permanently deletes {}. Type 'CLEAR' to continue: ", paths.conversation.display());
        io::stdout().flush()?;

        let mut confirmation = String::new();
        io::stdin().read_line(&mut confirmation)?;
        if confirmation.trim() != "CLEAR" {
            println!("clear cancelled");
            return Ok(());
        }
    }

    conversation.clear().await?;
    println!("conversation history cleared");
    Ok(())
}

/// At most `max_chars` Unicode scalar values of `s`, as a sub-slice.
fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut = truncate_str(&flat, PREVIEW_CHARS);
    if cut.len() < flat.len() {
        format!("{cut}…")
    } else {
        flat
    }
}

fn format_turn(turn: &Turn, persona_name: &str) -> String {
    match turn {
        Turn::Human(text) => format!("you: {}", preview(text)),
        Turn::Assistant(text) => format!("{persona_name}: {}", preview(text)),
        Turn::Summary(text) => format!("[summary] {}", preview(text)),
    }
}

fn format_episode(number: usize, episode: &EpisodeRecord) -> String {
    format!("#{number} {}\n    {}", episode.title, preview(&episode.summary))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_str("かぼちゃ", 2), "かぼ");
        assert_eq!(truncate_str("short", 10), "short");
    }

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("two\nlines"), "two lines");
        let long = "a".repeat(PREVIEW_CHARS + 5);
        let shown = preview(&long);
        assert!(shown.ends_with('…'));
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 1);
    }

    #[test]
    fn turns_are_labelled_by_speaker() {
        assert_eq!(format_turn(&Turn::Human("hi".into()), "Kabo-chan"), "you: hi");
        assert_eq!(format_turn(&Turn::Assistant("hey".into()), "Kabo-chan"), "Kabo-chan: hey");
        assert_eq!(format_turn(&Turn::Summary("before".into()), "Kabo-chan"), "[summary] before");
        let episode = EpisodeRecord {
            title: "Conversation about music".to_string(),
            summary: "bass lines".to_string(),
        };
        assert_eq!(format_episode(2, &episode), "#2 Conversation about music\n    bass lines");
    }

    #[tokio::test]
    async fn clear_with_yes_empties_history() {
        let dir = TempDir::new().unwrap();
        let paths = MemoryPaths::new(dir.path());
        let mut conversation = ConversationMemory::open(&paths.conversation).unwrap();
        conversation.append_exchange("hi", "hello").await.unwrap();

        run_memory_clear(&paths, true).await.unwrap();
        assert!(ConversationMemory::open(&paths.conversation).unwrap().is_empty());
    }

    #[test]
    fn read_only_commands_handle_missing_files() {
        let dir = TempDir::new().unwrap();
        let paths = MemoryPaths::new(dir.path().join("fresh"));
        run_memory_stats(&paths).unwrap();
        run_memory_history(&paths, "Kabo-chan", 10).unwrap();
        run_memory_episodes(&paths, 10).unwrap();
        assert!(!paths.root.exists());
    }
}
