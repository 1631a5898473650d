//! 存储模块
//!
//! 历史记录与设置。两者都是外部协作方，管道只依赖这里的接口。

pub mod history;
pub mod settings;

pub use history::{HistoryEntry, HistorySink, JsonHistoryStore, MemoryHistoryStore, ModerationStats};
pub use settings::{JsonSettingsStore, MemorySettingsStore, SettingsStore};
