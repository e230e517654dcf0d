pub mod archive;
pub mod conversation;
pub mod lock;
pub mod schema;
pub mod snapshot;
pub mod summary;
pub mod vector_index;

use std::path::{Path, PathBuf};

pub use archive::EpisodicArchive;
pub use conversation::{ConversationMemory, TrimOutcome, TurnCounts};
pub use lock::DataDirLock;
pub use schema::{EpisodeRecord, Turn};
pub use summary::{SUMMARY_INSTRUCTION, summarize_turns, summary_prompt};
pub use vector_index::{IndexError, SearchHit, VectorEntry, VectorIndex};

/// File layout of one memory directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPaths {
    pub root: PathBuf,
    pub conversation: PathBuf,
    pub episodes: PathBuf,
    pub vector_index: PathBuf,
}

impl MemoryPaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            conversation: root.join("conversation.json"),
            episodes: root.join("episodes.json"),
            vector_index: root.join("vector_index.json"),
            root,
        }
    }
}

/// Counts reported by `kabo memory stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub turns: TurnCounts,
    pub episodes: usize,
    pub indexed: usize,
    pub dimension: Option<usize>,
}

impl MemoryStats {
    pub fn collect(conversation: &ConversationMemory, archive: &EpisodicArchive) -> Self {
        Self {
            turns: conversation.counts(),
            episodes: archive.len(),
            indexed: archive.index().len(),
            dimension: archive.index().dimension(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_share_one_directory() {
        let paths = MemoryPaths::new("/tmp/kabo");
        assert_eq!(paths.conversation, PathBuf::from("/tmp/kabo/conversation.json"));
        assert_eq!(paths.episodes.parent(), Some(paths.root.as_path()));
        assert!(paths.vector_index.ends_with("vector_index.json"));
    }
}
