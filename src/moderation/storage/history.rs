//! 历史记录
//!
//! 每次成功过滤都追加一条记录并累加统计，用于事后找回原始内容。
//! 记录只增不减（关闭保护时不回滚），超出上限时淘汰最旧的记录。

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::moderation::config::constants;
use crate::moderation::error::{ModerationError, ModerationResult};
use crate::moderation::pipeline::ContentKind;
use crate::utils::truncate_chars;

/// 过滤统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationStats {
    pub texts_filtered: u64,
    pub images_filtered: u64,
}

impl ModerationStats {
    pub fn increment(&mut self, kind: ContentKind) {
        match kind {
            ContentKind::Text => self.texts_filtered += 1,
            ContentKind::Image => self.images_filtered += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.texts_filtered + self.images_filtered
    }
}

/// 单条历史记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub kind: ContentKind,
    pub preview: String,
    pub original: String,
    pub reasons: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub page_url: String,
    pub domain: String,
}

impl HistoryEntry {
    pub fn new(
        kind: ContentKind,
        original: impl Into<String>,
        reasons: Vec<String>,
        page_url: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        let original = original.into();
        let timestamp = Utc::now();
        Self {
            id: format!("{}-{}", kind, timestamp.timestamp_nanos_opt().unwrap_or_default()),
            kind,
            preview: truncate_chars(original.trim(), constants::HISTORY_PREVIEW_CHARS),
            original,
            reasons,
            timestamp,
            page_url: page_url.into(),
            domain: domain.into(),
        }
    }
}

/// 历史记录存储
pub trait HistorySink {
    /// 追加记录
    fn append(&self, entry: HistoryEntry) -> ModerationResult<()>;

    /// 按类型累加统计
    fn increment(&self, kind: ContentKind) -> ModerationResult<()>;

    /// 全部记录，按时间先后排列
    fn entries(&self) -> ModerationResult<Vec<HistoryEntry>>;

    fn stats(&self) -> ModerationResult<ModerationStats>;
}

/// 内存历史记录
pub struct MemoryHistoryStore {
    limit: usize,
    entries: RefCell<VecDeque<HistoryEntry>>,
    stats: Cell<ModerationStats>,
    closed: Cell<bool>,
}

impl MemoryHistoryStore {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: RefCell::new(VecDeque::new()),
            stats: Cell::new(ModerationStats::default()),
            closed: Cell::new(false),
        }
    }

    /// 模拟扩展上下文被销毁，之后所有写入都会失败
    pub fn close(&self) {
        self.closed.set(true);
    }

    fn ensure_open(&self) -> ModerationResult<()> {
        if self.closed.get() {
            Err(ModerationError::ChannelClosed("历史记录存储已关闭".to_string()))
        } else {
            Ok(())
        }
    }
}

impl HistorySink for MemoryHistoryStore {
    fn append(&self, entry: HistoryEntry) -> ModerationResult<()> {
        self.ensure_open()?;
        let mut entries = self.entries.borrow_mut();
        entries.push_back(entry);
        while entries.len() > self.limit {
            entries.pop_front();
        }
        Ok(())
    }

    fn increment(&self, kind: ContentKind) -> ModerationResult<()> {
        self.ensure_open()?;
        let mut stats = self.stats.get();
        stats.increment(kind);
        self.stats.set(stats);
        Ok(())
    }

    fn entries(&self) -> ModerationResult<Vec<HistoryEntry>> {
        Ok(self.entries.borrow().iter().cloned().collect())
    }

    fn stats(&self) -> ModerationResult<ModerationStats> {
        Ok(self.stats.get())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    entries: Vec<HistoryEntry>,
    #[serde(default)]
    stats: ModerationStats,
}

/// JSON 文件历史记录
pub struct JsonHistoryStore {
    path: PathBuf,
    limit: usize,
}

impl JsonHistoryStore {
    pub fn new(path: impl AsRef<Path>, limit: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            limit: limit.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> ModerationResult<HistoryFile> {
        if !self.path.exists() {
            return Ok(HistoryFile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HistoryFile::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, file: &HistoryFile) -> ModerationResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }
}

impl HistorySink for JsonHistoryStore {
    fn append(&self, entry: HistoryEntry) -> ModerationResult<()> {
        let mut file = self.load()?;
        file.entries.push(entry);
        if file.entries.len() > self.limit {
            let overflow = file.entries.len() - self.limit;
            file.entries.drain(..overflow);
        }
        self.save(&file)
    }

    fn increment(&self, kind: ContentKind) -> ModerationResult<()> {
        let mut file = self.load()?;
        file.stats.increment(kind);
        self.save(&file)
    }

    fn entries(&self) -> ModerationResult<Vec<HistoryEntry>> {
        Ok(self.load()?.entries)
    }

    fn stats(&self) -> ModerationResult<ModerationStats> {
        Ok(self.load()?.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> HistoryEntry {
        HistoryEntry::new(
            ContentKind::Text,
            text,
            vec!["Profanity detected".to_string()],
            "https://example.com/post",
            "example.com",
        )
    }

    #[test]
    fn test_preview_is_truncated() {
        let long = "x".repeat(250);
        let item = entry(&long);
        assert_eq!(item.preview.chars().count(), constants::HISTORY_PREVIEW_CHARS + 1);
        assert_eq!(item.original, long);
    }

    #[test]
    fn test_memory_store_evicts_oldest() {
        let store = MemoryHistoryStore::new(2);
        store.append(entry("first")).unwrap();
        store.append(entry("second")).unwrap();
        store.append(entry("third")).unwrap();

        let originals: Vec<_> = store
            .entries()
            .unwrap()
            .into_iter()
            .map(|item| item.original)
            .collect();
        assert_eq!(originals, vec!["second", "third"]);
    }

    #[test]
    fn test_closed_store_fails() {
        let store = MemoryHistoryStore::new(10);
        store.close();
        assert!(matches!(
            store.append(entry("x")),
            Err(ModerationError::ChannelClosed(_))
        ));
        assert!(store.increment(ContentKind::Image).is_err());
    }

    #[test]
    fn test_json_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");

        let store = JsonHistoryStore::new(&path, 2);
        store.append(entry("one")).unwrap();
        store.append(entry("two")).unwrap();
        store.append(entry("three")).unwrap();
        store.increment(ContentKind::Text).unwrap();
        store.increment(ContentKind::Image).unwrap();

        let reopened = JsonHistoryStore::new(&path, 2);
        assert_eq!(reopened.entries().unwrap().len(), 2);
        assert_eq!(reopened.entries().unwrap()[0].original, "two");
        assert_eq!(
            reopened.stats().unwrap(),
            ModerationStats {
                texts_filtered: 1,
                images_filtered: 1
            }
        );
    }
}
