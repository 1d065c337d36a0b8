// Queue file parsing and per-item state

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read queue file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Lifecycle of one queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,
    InProgress,
    Succeeded,
    FailedPermanent,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Position in the queue file after filtering, starting at 0
    pub index: usize,
    pub url: String,
    pub status: ItemStatus,
}

impl QueueItem {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            status: ItemStatus::Pending,
        }
    }
}

/// Live status of every entry while a run is in progress, indexed by queue slot
#[derive(Debug, Clone)]
pub struct QueueBoard {
    items: Vec<QueueItem>,
}

impl QueueBoard {
    pub fn new(items: &[QueueItem]) -> Self {
        Self {
            items: items.to_vec(),
        }
    }

    /// Pending -> InProgress; other states are left alone
    pub fn start(&mut self, slot: usize) {
        if let Some(item) = self.items.get_mut(slot) {
            if item.status == ItemStatus::Pending {
                item.status = ItemStatus::InProgress;
            }
        }
    }

    pub fn finish(&mut self, slot: usize, status: ItemStatus) {
        if let Some(item) = self.items.get_mut(slot) {
            item.status = status;
        }
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    pub fn done(&self) -> usize {
        self.items.len() - self.count(ItemStatus::Pending) - self.count(ItemStatus::InProgress)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<QueueItem> {
        self.items
    }
}

/// One URL per line; blank lines and lines starting with `#` are ignored.
/// Only a `#` in the first column marks a comment.
pub fn parse_queue(content: &str) -> Vec<QueueItem> {
    content
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, url)| QueueItem::new(index, url))
        .collect()
}

pub fn load_queue_file(path: &Path) -> Result<Vec<QueueItem>, QueueError> {
    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            QueueError::NotFound(path.to_path_buf())
        } else {
            QueueError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    // tolerate a UTF-8 BOM written by some editors
    Ok(parse_queue(content.trim_start_matches('\u{feff}')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let items = parse_queue("# my list\n\nhttps://youtu.be/a\n   https://youtu.be/b   \n#https://youtu.be/x\nhttps://youtu.be/c\n");
        let urls: Vec<_> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, ["https://youtu.be/a", "https://youtu.be/b", "https://youtu.be/c"]);
        assert_eq!(items[2].index, 2);
        assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
    }

    #[test]
    fn test_indented_hash_is_an_entry() {
        let items = parse_queue("https://youtu.be/a\n  # not a comment\n\t#tab\n");
        let urls: Vec<_> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, ["https://youtu.be/a", "# not a comment", "#tab"]);
        assert_eq!(items[1].index, 1);
        assert_eq!(items[2].index, 2);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_queue("").is_empty());
        assert!(parse_queue("# only comments\n\n").is_empty());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "\u{feff}https://youtu.be/a\r\nhttps://youtu.be/b\r\n").unwrap();

        let items = load_queue_file(file.path()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://youtu.be/a");
        assert_eq!(items[1].url, "https://youtu.be/b");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_queue_file(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, QueueError::NotFound(_)));
    }

    #[test]
    fn test_board_transitions() {
        let mut board = QueueBoard::new(&parse_queue("https://youtu.be/a\nhttps://youtu.be/b\nhttps://youtu.be/c\n"));
        assert_eq!(board.len(), 3);
        assert_eq!(board.count(ItemStatus::Pending), 3);

        board.start(0);
        board.start(1);
        assert_eq!(board.count(ItemStatus::InProgress), 2);
        assert_eq!(board.done(), 0);

        board.finish(0, ItemStatus::Succeeded);
        board.finish(1, ItemStatus::FailedPermanent);
        // a finished item is not restarted
        board.start(1);
        // out of range slots are ignored
        board.start(7);
        assert_eq!(board.done(), 2);
        assert_eq!(board.count(ItemStatus::InProgress), 0);

        let items = board.into_items();
        assert_eq!(items[0].status, ItemStatus::Succeeded);
        assert_eq!(items[1].status, ItemStatus::FailedPermanent);
        assert_eq!(items[2].status, ItemStatus::Pending);
    }
}
